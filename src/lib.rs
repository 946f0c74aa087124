//! # a3s-dealer
//!
//! Chat-driven card game dealer for the A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-dealer` turns a raw stream of chat events into managed game
//! sessions: it recognizes commands addressed to the bot, recruits players
//! from a channel, enforces that only one session runs per scope, hands the
//! table to a game engine, and handles players quitting. Chat backends and
//! game engines are pluggable.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use a3s_dealer::{Dealer, DealerConfig, GameEngine, GameTable, MemoryChatProvider};
//! use std::sync::Arc;
//!
//! # struct Holdem;
//! # #[async_trait::async_trait]
//! # impl GameEngine for Holdem {
//! #     async fn start(&self, _dms: std::collections::HashMap<String, String>) -> a3s_dealer::Result<()> { Ok(()) }
//! #     fn quit(&self) {}
//! # }
//! # async fn example() -> a3s_dealer::Result<()> {
//! let provider = Arc::new(MemoryChatProvider::default());
//! let engines = Arc::new(|_table: GameTable| -> a3s_dealer::Result<Arc<dyn GameEngine>> {
//!     Ok(Arc::new(Holdem))
//! });
//!
//! let dealer = Dealer::new(provider, engines, DealerConfig::default())?;
//! dealer.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Commands
//!
//! All commands must mention the bot:
//!
//! - `deal`: recruit players and start a game
//! - `config key=value ...`: set whitelisted game parameters (e.g. `timeout=30`)
//! - `quit game`: end the running game after the current hand
//!
//! ## Architecture
//!
//! - **ChatProvider** trait: chat backend (events, directory, messages, DMs)
//! - **ChatBus**: fan-out of inbound messages to scoped, self-releasing listeners
//! - **CommandClassifier**: tags messages as Deal / Config / Quit / Irrelevant
//! - **ConfigStore**: whitelisted game parameters, copied into each session
//! - **PlayerPoller**: collects distinct players from a channel
//! - **SessionController**: admission, quorum, engine hand-off, quit handling
//! - **GameEngine** trait: the card game itself

pub mod bus;
pub mod command;
pub mod config;
pub mod dealer;
pub mod engine;
pub mod error;
pub mod poller;
pub mod provider;
pub mod session;
pub mod types;

// Re-export core types
pub use bus::{ChatBus, Listener, ListenerFilter};
pub use command::{Command, CommandClassifier};
pub use config::{AiSeat, ConfigStore, DealerConfig, GameConfig};
pub use dealer::{ConnectionSummary, Dealer, Dispatch};
pub use engine::{GameEngine, GameEngineFactory, GameTable};
pub use error::{DealerError, Result};
pub use poller::{PlayerPoller, PollOptions};
pub use provider::{ChatProvider, Subscription};
pub use session::{
    Admission, SessionController, SessionInfo, SessionLease, SessionRegistry, SessionScope,
    SessionState,
};
pub use types::{Channel, ChannelKind, ChatEvent, EventKind, Player, PlayerKind, User};

// Re-export providers for convenience
pub use provider::memory::{MemoryChatProvider, MemoryConfig, SentMessage};
