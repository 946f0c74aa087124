//! Chat provider trait: the core abstraction for chat backends
//!
//! All chat backends (Slack, in-memory, ...) implement `ChatProvider` to
//! give the dealer a uniform API for the inbound event stream, directory
//! lookups, outbound messages, and direct-message channel creation.

use crate::error::{DealerError, Result};
use crate::types::{Channel, ChatEvent, Player, User};
use async_trait::async_trait;
use std::collections::HashMap;

pub mod memory;

/// Core trait for chat backends
///
/// Implementations handle connection and wire details. The `Dealer` uses
/// a provider for everything it observes and says.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Open the inbound event stream
    ///
    /// The stream yields an `Open` event once the connection is established,
    /// followed by channel events in delivery order.
    async fn subscribe(&self) -> Result<Box<dyn Subscription>>;

    /// User id of the bot itself
    fn self_id(&self) -> &str;

    /// Display name of the bot itself
    fn self_name(&self) -> &str;

    /// Team/workspace name
    fn team_name(&self) -> &str;

    /// Look up a user by id
    async fn user(&self, id: &str) -> Result<User>;

    /// Look up a channel, group, or DM by id
    async fn channel(&self, id: &str) -> Result<Channel>;

    /// All channels, groups, and DMs known to the provider
    async fn channels(&self) -> Result<Vec<Channel>>;

    /// Post a message to a channel
    async fn send(&self, channel: &str, text: &str) -> Result<()>;

    /// Open a DM channel with one user, returning its channel id
    async fn open_dm(&self, user: &str) -> Result<String>;

    /// Open DM channels with every human player
    ///
    /// Returns player id → DM channel id. Default implementation opens the
    /// channels concurrently via `open_dm()` and fails if any open fails.
    /// AI seats get no DM.
    async fn open_dms(&self, players: &[Player]) -> Result<HashMap<String, String>> {
        let humans: Vec<&Player> = players.iter().filter(|p| p.is_human()).collect();
        let opened = futures::future::join_all(humans.iter().map(|p| self.open_dm(&p.id))).await;

        humans
            .into_iter()
            .zip(opened)
            .map(|(player, dm)| match dm {
                Ok(dm) => Ok((player.id.clone(), dm)),
                Err(e) => Err(DealerError::DirectMessage {
                    user: player.id.clone(),
                    reason: e.to_string(),
                }),
            })
            .collect()
    }

    /// Provider name (e.g., "slack", "memory")
    fn name(&self) -> &str;
}

/// Async handle on the inbound event stream
#[async_trait]
pub trait Subscription: Send {
    /// Receive the next event, or `None` once the stream has ended
    async fn next(&mut self) -> Result<Option<ChatEvent>>;
}
