//! Command classification for inbound chat events
//!
//! A `CommandClassifier` holds the bot's identity and a table of trigger
//! patterns compiled once. Classification is a pure function of the event
//! and the table: every trigger is evaluated independently, so a single
//! message may be relevant to more than one listener.

use crate::error::Result;
use crate::types::ChatEvent;
use regex::Regex;
use std::fmt;

/// Tag assigned to an inbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Start recruiting players for a new game
    Deal,
    /// Set one or more whitelisted game parameters
    Config,
    /// Stop the running game after the current hand
    Quit,
    /// Not addressed to the bot, or no trigger matched
    Irrelevant,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Deal => "deal",
            Command::Config => "config",
            Command::Quit => "quit",
            Command::Irrelevant => "irrelevant",
        };
        f.write_str(name)
    }
}

/// Trigger table entry
#[derive(Debug, Clone)]
struct Trigger {
    command: Command,
    pattern: Regex,
}

/// Classifies chat events into `Command`s for one bot identity
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    bot_id: String,
    /// `<@BOTID`, closed by `>` or `|display-name>`
    mention_prefix: String,
    triggers: Vec<Trigger>,
}

impl CommandClassifier {
    /// Build the classifier for the bot with user id `bot_id`
    pub fn new(bot_id: impl Into<String>) -> Result<Self> {
        let bot_id = bot_id.into();
        let mention_prefix = format!("<@{}", bot_id);

        // Table order decides the primary tag returned by `classify`
        let triggers = [
            (Command::Deal, r"(?i)\bdeal\b"),
            (Command::Config, r"(?i)config"),
            (Command::Quit, r"(?i)quit game"),
        ]
        .into_iter()
        .map(|(command, pattern)| -> Result<Trigger> {
            Ok(Trigger {
                command,
                pattern: Regex::new(pattern)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            bot_id,
            mention_prefix,
            triggers,
        })
    }

    /// The bot identity this classifier matches mentions against
    pub fn bot_id(&self) -> &str {
        &self.bot_id
    }

    /// Whether `text` contains a mention of the bot
    pub fn mentions_bot(&self, text: &str) -> bool {
        text.match_indices(&self.mention_prefix).any(|(at, prefix)| {
            matches!(text[at + prefix.len()..].chars().next(), Some('>' | '|'))
        })
    }

    /// Primary classification: the first matching trigger in table order
    pub fn classify(&self, event: &ChatEvent) -> Command {
        self.classify_all(event)
            .into_iter()
            .next()
            .unwrap_or(Command::Irrelevant)
    }

    /// Every trigger the event matches, in table order
    ///
    /// Empty when the event is irrelevant.
    pub fn classify_all(&self, event: &ChatEvent) -> Vec<Command> {
        let Some(text) = self.addressed_text(event) else {
            return Vec::new();
        };
        self.triggers
            .iter()
            .filter(|t| t.pattern.is_match(text))
            .map(|t| t.command)
            .collect()
    }

    /// Whether the event matches one specific trigger
    pub fn matches(&self, event: &ChatEvent, command: Command) -> bool {
        if command == Command::Irrelevant {
            return self.classify_all(event).is_empty();
        }
        let Some(text) = self.addressed_text(event) else {
            return false;
        };
        self.triggers
            .iter()
            .any(|t| t.command == command && t.pattern.is_match(text))
    }

    /// Text of a message event that addresses the bot
    fn addressed_text<'a>(&self, event: &'a ChatEvent) -> Option<&'a str> {
        if !event.is_message() {
            return None;
        }
        let text = event.text.as_deref()?;
        self.mentions_bot(text).then_some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatEvent;

    fn classifier() -> CommandClassifier {
        CommandClassifier::new("UBOT").unwrap()
    }

    fn msg(text: &str) -> ChatEvent {
        ChatEvent::message("C1", "U1", text)
    }

    #[test]
    fn test_deal_requires_mention() {
        let c = classifier();
        assert_eq!(c.classify(&msg("<@UBOT> deal")), Command::Deal);
        assert_eq!(c.classify(&msg("deal")), Command::Irrelevant);
        assert_eq!(c.classify(&msg("<@UOTHER> deal")), Command::Irrelevant);
    }

    #[test]
    fn test_deal_is_word_bounded_and_case_insensitive() {
        let c = classifier();
        assert_eq!(c.classify(&msg("<@UBOT> DEAL me in")), Command::Deal);
        assert_eq!(c.classify(&msg("<@UBOT> Deal!")), Command::Deal);
        assert_eq!(c.classify(&msg("<@UBOT> who is the dealer")), Command::Irrelevant);
        assert_eq!(c.classify(&msg("<@UBOT> ordeal")), Command::Irrelevant);
    }

    #[test]
    fn test_mention_with_display_name() {
        let c = classifier();
        assert!(c.mentions_bot("<@UBOT|dealer> hi"));
        assert!(!c.mentions_bot("<@UBOTX> hi"));
        assert!(!c.mentions_bot("@UBOT hi"));
    }

    #[test]
    fn test_config_is_substring_match() {
        let c = classifier();
        assert_eq!(c.classify(&msg("<@UBOT> config timeout=30")), Command::Config);
        assert_eq!(c.classify(&msg("<@UBOT> reconfigure")), Command::Config);
        assert_eq!(c.classify(&msg("<@UBOT> CONFIG")), Command::Config);
    }

    #[test]
    fn test_quit_requires_full_phrase() {
        let c = classifier();
        assert_eq!(c.classify(&msg("<@UBOT> quit game")), Command::Quit);
        assert_eq!(c.classify(&msg("<@UBOT> Quit Game please")), Command::Quit);
        assert_eq!(c.classify(&msg("<@UBOT> quit")), Command::Irrelevant);
    }

    #[test]
    fn test_independent_triggers() {
        let c = classifier();
        let event = msg("<@UBOT> config timeout=10 and deal");
        assert_eq!(c.classify_all(&event), vec![Command::Deal, Command::Config]);
        assert_eq!(c.classify(&event), Command::Deal);
        assert!(c.matches(&event, Command::Config));
        assert!(c.matches(&event, Command::Deal));
        assert!(!c.matches(&event, Command::Quit));
        assert!(!c.matches(&event, Command::Irrelevant));
    }

    #[test]
    fn test_non_message_events_are_irrelevant() {
        let c = classifier();
        let mut event = ChatEvent::open();
        event.text = Some("<@UBOT> deal".to_string());
        assert_eq!(c.classify(&event), Command::Irrelevant);
        assert!(c.matches(&event, Command::Irrelevant));
    }

    #[test]
    fn test_missing_text_is_irrelevant() {
        let c = classifier();
        let mut event = msg("");
        event.text = None;
        assert_eq!(c.classify(&event), Command::Irrelevant);
    }

    #[test]
    fn test_bot_id_matched_literally() {
        let c = CommandClassifier::new("U.+").unwrap();
        assert!(c.mentions_bot("<@U.+> deal"));
        assert!(!c.mentions_bot("<@UXYZ> deal"));
    }

    #[test]
    fn test_command_display() {
        assert_eq!(Command::Deal.to_string(), "deal");
        assert_eq!(Command::Irrelevant.to_string(), "irrelevant");
    }
}
