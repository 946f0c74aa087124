//! Error types for a3s-dealer

use thiserror::Error;

/// Errors that can occur while orchestrating a game session
#[derive(Debug, Error)]
pub enum DealerError {
    /// Chat provider connection failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Outbound message could not be delivered
    #[error("Failed to send message to channel '{channel}': {reason}")]
    Send {
        channel: String,
        reason: String,
    },

    /// Directory lookup miss for a user id
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Directory lookup miss for a channel, group, or DM id
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// Direct-message channel creation failure
    #[error("Failed to open direct message with '{user}': {reason}")]
    DirectMessage {
        user: String,
        reason: String,
    },

    /// Game engine failure
    #[error("Game engine error: {0}")]
    Engine(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Trigger or parameter pattern failed to compile
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Bot token not supplied
    #[error("Bot token not set. Set SLACK_POKER_BOT_TOKEN or provide a token.txt file")]
    NoToken,

    /// Inbound event stream ended
    #[error("Event stream closed")]
    StreamClosed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for dealer operations
pub type Result<T> = std::result::Result<T, DealerError>;
