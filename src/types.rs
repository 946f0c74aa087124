//! Core chat and player types for the a3s-dealer system
//!
//! All types use camelCase JSON serialization for wire compatibility.

use serde::{Deserialize, Serialize};

/// Kind of an inbound chat event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "name")]
pub enum EventKind {
    /// Connection established with the chat platform
    Open,
    /// A message posted to a channel, group, or DM
    Message,
    /// Any other platform event (presence, typing, ...)
    Other(String),
}

/// A single inbound event from the chat platform
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    /// Event kind
    pub kind: EventKind,

    /// Message text, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Channel, group, or DM the event was posted to
    #[serde(default)]
    pub channel: String,

    /// User who produced the event, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Unix timestamp in milliseconds
    pub timestamp: u64,
}

impl ChatEvent {
    /// Create a message event posted by `user` to `channel`
    pub fn message(
        channel: impl Into<String>,
        user: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            kind: EventKind::Message,
            text: Some(text.into()),
            channel: channel.into(),
            user: Some(user.into()),
            timestamp: now_millis(),
        }
    }

    /// Create the "connection established" event
    pub fn open() -> Self {
        Self {
            kind: EventKind::Open,
            text: None,
            channel: String::new(),
            user: None,
            timestamp: now_millis(),
        }
    }

    /// Whether this event is a channel message
    pub fn is_message(&self) -> bool {
        self.kind == EventKind::Message
    }

    /// Message text, or an empty string when the event carries none
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

/// A user record from the chat directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
}

/// Channel flavor as exposed by the chat directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChannelKind {
    Channel,
    Group,
    DirectMessage,
}

/// A channel, private group, or DM record from the chat directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub kind: ChannelKind,
    #[serde(default)]
    pub is_member: bool,
    #[serde(default)]
    pub is_open: bool,
    #[serde(default)]
    pub is_archived: bool,
}

impl Channel {
    /// Create a public channel the bot is a member of
    pub fn public(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ChannelKind::Channel,
            is_member: true,
            is_open: true,
            is_archived: false,
        }
    }

    /// Create an open DM channel
    pub fn direct(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ChannelKind::DirectMessage,
            is_member: true,
            is_open: true,
            is_archived: false,
        }
    }

    /// Whether the bot should consider this channel active at startup
    ///
    /// Channels count when the bot is a member, groups when open and not
    /// archived, DMs when open.
    pub fn is_active(&self) -> bool {
        match self.kind {
            ChannelKind::Channel => self.is_member,
            ChannelKind::Group => self.is_open && !self.is_archived,
            ChannelKind::DirectMessage => self.is_open,
        }
    }
}

/// Who controls a seat at the table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayerKind {
    /// A recruited chat user
    #[default]
    Human,
    /// Scripted AI that mostly checks and calls
    WeakBot,
    /// Scripted AI that raises whenever it can
    AggroBot,
}

/// A seated player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: PlayerKind,
}

impl Player {
    /// Create a human player from a directory record
    pub fn human(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            kind: PlayerKind::Human,
        }
    }

    /// Whether this seat is driven by a chat user
    pub fn is_human(&self) -> bool {
        self.kind == PlayerKind::Human
    }
}

/// Current time in Unix milliseconds
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_event_creation() {
        let event = ChatEvent::message("C1", "U1", "hello");
        assert!(event.is_message());
        assert_eq!(event.channel, "C1");
        assert_eq!(event.user.as_deref(), Some("U1"));
        assert_eq!(event.text(), "hello");
        assert!(event.timestamp > 0);
    }

    #[test]
    fn test_open_event_has_no_text() {
        let event = ChatEvent::open();
        assert_eq!(event.kind, EventKind::Open);
        assert!(!event.is_message());
        assert_eq!(event.text(), "");
    }

    #[test]
    fn test_event_serialization_camel_case() {
        let event = ChatEvent::message("C1", "U1", "deal");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"channel\":\"C1\""));
        assert!(json.contains("\"type\":\"message\""));

        let parsed: ChatEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.kind, EventKind::Message);
        assert_eq!(parsed.text(), "deal");
    }

    #[test]
    fn test_event_without_optional_fields() {
        let json = r#"{"kind": {"type": "open"}, "timestamp": 1700000000000}"#;
        let event: ChatEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, EventKind::Open);
        assert!(event.user.is_none());
        assert!(event.channel.is_empty());
    }

    #[test]
    fn test_channel_activity_rules() {
        let mut channel = Channel::public("C1", "general");
        assert!(channel.is_active());
        channel.is_member = false;
        assert!(!channel.is_active());

        let group = Channel {
            id: "G1".to_string(),
            name: "poker-night".to_string(),
            kind: ChannelKind::Group,
            is_member: true,
            is_open: true,
            is_archived: true,
        };
        assert!(!group.is_active());

        let mut dm = Channel::direct("D1", "alice");
        assert!(dm.is_active());
        dm.is_open = false;
        assert!(!dm.is_active());
    }

    #[test]
    fn test_player_from_user() {
        let user = User {
            id: "U1".to_string(),
            name: "alice".to_string(),
        };
        let player = Player::human(&user);
        assert_eq!(player.id, "U1");
        assert_eq!(player.name, "alice");
        assert!(player.is_human());
    }

    #[test]
    fn test_player_kind_defaults_to_human() {
        let json = r#"{"id": "U1", "name": "alice"}"#;
        let player: Player = serde_json::from_str(json).unwrap();
        assert_eq!(player.kind, PlayerKind::Human);
    }
}
