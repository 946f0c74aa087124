//! Game engine abstraction
//!
//! The card game itself lives outside this crate. A `GameEngineFactory`
//! builds one `GameEngine` per session from a `GameTable`; the session
//! controller then starts it with the players' DM channels and may ask it to
//! stop cooperatively with `quit()`.

use crate::bus::Listener;
use crate::config::GameConfig;
use crate::error::Result;
use crate::provider::ChatProvider;
use crate::types::{Channel, Player};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a game needs from the session that created it
pub struct GameTable {
    /// Chat backend for table talk and DMs
    pub provider: Arc<dyn ChatProvider>,

    /// Messages posted to the game channel; released with the engine
    pub messages: Listener,

    /// Channel the game is played in
    pub channel: Channel,

    /// Seated players, in seating order
    pub players: Vec<Player>,

    /// Game parameters copied when the session started
    pub config: GameConfig,
}

/// A running game
#[async_trait]
pub trait GameEngine: Send + Sync {
    /// Play the game; resolves when it finishes or stops after `quit()`
    ///
    /// `dms` maps player id → private channel id for every human player.
    async fn start(&self, dms: HashMap<String, String>) -> Result<()>;

    /// Ask the game to stop after the hand in progress
    ///
    /// Must not interrupt a hand. Calling it more than once has no extra effect.
    fn quit(&self);
}

/// Builds a `GameEngine` for each session
pub trait GameEngineFactory: Send + Sync {
    fn create(&self, table: GameTable) -> Result<Arc<dyn GameEngine>>;
}

impl<F> GameEngineFactory for F
where
    F: Fn(GameTable) -> Result<Arc<dyn GameEngine>> + Send + Sync,
{
    fn create(&self, table: GameTable) -> Result<Arc<dyn GameEngine>> {
        self(table)
    }
}
