//! Player recruitment
//!
//! The poller posts a join prompt to a channel, collects distinct users who
//! answer `yes` in that channel, and completes once the poll window closes,
//! the table is full, or the chat bus ends. The player list is produced
//! exactly once, on completion.

use crate::bus::{Listener, ListenerFilter};
use crate::error::Result;
use crate::provider::ChatProvider;
use crate::types::{Channel, ChatEvent, Player};
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const JOIN_PATTERN: &str = r"(?i)\byes\b";

/// Recruitment limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// How long the join prompt stays open
    pub window: Duration,

    /// Stop early once this many players joined
    pub max_players: usize,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(30),
            max_players: 10,
        }
    }
}

/// Collects players for one game from a channel
pub struct PlayerPoller {
    provider: Arc<dyn ChatProvider>,
    join: Regex,
    options: PollOptions,
}

impl PlayerPoller {
    pub fn new(provider: Arc<dyn ChatProvider>, options: PollOptions) -> Result<Self> {
        Ok(Self {
            provider,
            join: Regex::new(JOIN_PATTERN)?,
            options,
        })
    }

    pub fn options(&self) -> PollOptions {
        self.options
    }

    /// Listener filter for join candidates in `channel`
    pub fn join_filter(channel: &str) -> ListenerFilter {
        ListenerFilter::new("poller").in_channel(channel)
    }

    /// Whether an event asks to join the game
    pub fn is_join(&self, event: &ChatEvent) -> bool {
        event.is_message() && event.user.is_some() && self.join.is_match(event.text())
    }

    /// Run recruitment on `channel` using an already-registered listener
    ///
    /// The listener is consumed and released on return. A directory lookup
    /// failure aborts recruitment with an error.
    pub async fn poll(&self, mut joins: Listener, channel: &Channel) -> Result<Vec<Player>> {
        self.announce(
            &channel.id,
            &format!(
                "Who wants to play? Respond with 'yes' in this channel in the next {} seconds.",
                self.options.window.as_secs()
            ),
        )
        .await;

        let deadline = tokio::time::sleep(self.options.window);
        tokio::pin!(deadline);

        let mut seen = HashSet::new();
        let mut players: Vec<Player> = Vec::new();

        while players.len() < self.options.max_players {
            let event = tokio::select! {
                _ = &mut deadline => break,
                event = joins.next() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            if !self.is_join(&event) {
                continue;
            }
            let Some(user_id) = event.user else {
                continue;
            };
            if !seen.insert(user_id.clone()) {
                tracing::debug!(channel = %channel.id, user = %user_id, "Duplicate join ignored");
                continue;
            }

            let user = self.provider.user(&user_id).await?;
            self.announce(&channel.id, &format!("{} has joined the game.", user.name))
                .await;
            players.push(Player::human(&user));
        }
        drop(joins);

        debug_assert_eq!(
            players.iter().map(|p| &p.id).collect::<HashSet<_>>().len(),
            players.len(),
            "recruited player ids must be unique"
        );

        tracing::info!(
            channel = %channel.id,
            players = players.len(),
            "Recruitment finished"
        );
        Ok(players)
    }

    async fn announce(&self, channel: &str, text: &str) {
        if let Err(e) = self.provider.send(channel, text).await {
            tracing::warn!(channel = %channel, error = %e, "Failed to send recruitment message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ChatBus;
    use crate::command::CommandClassifier;
    use crate::error::DealerError;
    use crate::provider::memory::MemoryChatProvider;

    struct Fixture {
        provider: Arc<MemoryChatProvider>,
        bus: ChatBus,
        poller: PlayerPoller,
        channel: Channel,
    }

    fn fixture(options: PollOptions) -> Fixture {
        let provider = Arc::new(MemoryChatProvider::default());
        for (id, name) in [("U1", "alice"), ("U2", "bob"), ("U3", "carol")] {
            provider.add_user(id, name);
        }
        let classifier = Arc::new(CommandClassifier::new("UDEALER").unwrap());
        Fixture {
            poller: PlayerPoller::new(provider.clone(), options).unwrap(),
            bus: ChatBus::new(classifier, 64),
            provider,
            channel: Channel::public("C1", "general"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_collects_distinct_players_in_order() {
        let f = fixture(PollOptions::default());
        let joins = f.bus.listen(PlayerPoller::join_filter("C1")).unwrap();

        for (user, text) in [
            ("U2", "yes"),
            ("U1", "YES please"),
            ("U2", "yes yes"),
            ("U3", "eyes on this"),
            ("U3", "Yes!"),
        ] {
            f.bus.publish(&ChatEvent::message("C1", user, text));
        }

        let players = f.poller.poll(joins, &f.channel).await.unwrap();
        let ids: Vec<_> = players.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["U2", "U1", "U3"]);
        assert_eq!(players[0].name, "bob");

        let sent = f.provider.messages_to("C1");
        assert!(sent[0].starts_with("Who wants to play?"));
        assert!(sent[0].contains("30 seconds"));
        assert_eq!(sent[1], "bob has joined the game.");
        assert_eq!(sent.len(), 4);
        assert_eq!(f.bus.active_listeners(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignores_other_channels() {
        let f = fixture(PollOptions::default());
        let joins = f.bus.listen(PlayerPoller::join_filter("C1")).unwrap();

        f.bus.publish(&ChatEvent::message("C2", "U1", "yes"));
        f.bus.publish(&ChatEvent::message("C1", "U2", "yes"));

        let players = f.poller.poll(joins, &f.channel).await.unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].id, "U2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_joiners_is_valid() {
        let f = fixture(PollOptions::default());
        let joins = f.bus.listen(PlayerPoller::join_filter("C1")).unwrap();

        let start = tokio::time::Instant::now();
        let players = f.poller.poll(joins, &f.channel).await.unwrap();
        assert!(players.is_empty());
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_max_players() {
        let f = fixture(PollOptions {
            window: Duration::from_secs(60),
            max_players: 2,
        });
        let joins = f.bus.listen(PlayerPoller::join_filter("C1")).unwrap();
        for user in ["U1", "U2", "U3"] {
            f.bus.publish(&ChatEvent::message("C1", user, "yes"));
        }

        let start = tokio::time::Instant::now();
        let players = f.poller.poll(joins, &f.channel).await.unwrap();
        assert_eq!(players.len(), 2);
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_when_bus_closes() {
        let f = fixture(PollOptions::default());
        let joins = f.bus.listen(PlayerPoller::join_filter("C1")).unwrap();
        f.bus.publish(&ChatEvent::message("C1", "U1", "yes"));
        f.bus.close();

        let start = tokio::time::Instant::now();
        let players = f.poller.poll(joins, &f.channel).await.unwrap();
        assert_eq!(players.len(), 1);
        assert!(start.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_user_aborts() {
        let f = fixture(PollOptions::default());
        let joins = f.bus.listen(PlayerPoller::join_filter("C1")).unwrap();
        f.bus.publish(&ChatEvent::message("C1", "U404", "yes"));

        let result = f.poller.poll(joins, &f.channel).await;
        assert!(matches!(result, Err(DealerError::UserNotFound(id)) if id == "U404"));
        assert_eq!(f.bus.active_listeners(), 0);
    }

    #[test]
    fn test_is_join() {
        let f = fixture(PollOptions::default());
        assert!(f.poller.is_join(&ChatEvent::message("C1", "U1", "yes")));
        assert!(f.poller.is_join(&ChatEvent::message("C1", "U1", "oh YES")));
        assert!(!f.poller.is_join(&ChatEvent::message("C1", "U1", "yesterday")));
        assert!(!f.poller.is_join(&ChatEvent::open()));
    }
}
