//! Dealer configuration and the game parameter store
//!
//! `DealerConfig` carries the bot's own settings (quorum, delays, poll window,
//! session scope, AI seats). `ConfigStore` holds the whitelisted game
//! parameters users set with `config key=value` and hands out `GameConfig`
//! snapshots to new sessions.

use crate::error::{DealerError, Result};
use crate::session::SessionScope;
use crate::types::{Player, PlayerKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Environment variable holding the bot token
pub const TOKEN_ENV_VAR: &str = "SLACK_POKER_BOT_TOKEN";

/// Fallback file holding the bot token
pub const TOKEN_FILE: &str = "token.txt";

/// `key=value` pairs: ASCII word characters for the key, ASCII digits for the value
const PARAM_PATTERN: &str = r"(?-u:\w*)=([0-9]*)";

/// An AI seat added to every game after polling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSeat {
    /// Display name at the table
    pub name: String,

    /// Which scripted strategy drives the seat
    pub kind: PlayerKind,
}

impl AiSeat {
    /// Seat the AI as a player
    pub fn to_player(&self) -> Player {
        Player {
            id: format!("ai-{}", uuid::Uuid::new_v4()),
            name: self.name.clone(),
            kind: self.kind,
        }
    }
}

/// Settings for the dealer bot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealerConfig {
    /// Game parameters users may set with `config key=value`
    #[serde(default = "default_config_params")]
    pub config_params: Vec<String>,

    /// Minimum number of seated players to start a game
    #[serde(default = "default_min_players")]
    pub min_players: usize,

    /// Pause between opening DMs and starting the game (milliseconds)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// How long players may answer the join prompt (seconds)
    #[serde(default = "default_poll_window_secs")]
    pub poll_window_secs: u64,

    /// Recruitment stops early once this many players joined
    #[serde(default = "default_max_players")]
    pub max_players: usize,

    /// Capacity of the chat bus broadcast buffer
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Key under which session exclusivity is enforced
    #[serde(default)]
    pub scope: SessionScope,

    /// Scripted players seated in every game
    #[serde(default)]
    pub ai_seats: Vec<AiSeat>,
}

fn default_config_params() -> Vec<String> {
    vec!["timeout".to_string()]
}
fn default_min_players() -> usize {
    2
}
fn default_settle_delay_ms() -> u64 {
    2000
}
fn default_poll_window_secs() -> u64 {
    30
}
fn default_max_players() -> usize {
    10
}
fn default_event_buffer() -> usize {
    1024
}

impl Default for DealerConfig {
    fn default() -> Self {
        Self {
            config_params: default_config_params(),
            min_players: default_min_players(),
            settle_delay_ms: default_settle_delay_ms(),
            poll_window_secs: default_poll_window_secs(),
            max_players: default_max_players(),
            event_buffer: default_event_buffer(),
            scope: SessionScope::default(),
            ai_seats: Vec::new(),
        }
    }
}

impl DealerConfig {
    /// Load settings from a JSON file, filling unset fields with defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            DealerError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "Dealer config loaded");
        Ok(config)
    }

    /// Reject settings the session controller cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.min_players < 2 {
            return Err(DealerError::Config(format!(
                "minPlayers must be at least 2, got {}",
                self.min_players
            )));
        }
        if self.max_players < self.min_players {
            return Err(DealerError::Config(format!(
                "maxPlayers ({}) is below minPlayers ({})",
                self.max_players, self.min_players
            )));
        }
        if self.event_buffer == 0 {
            return Err(DealerError::Config("eventBuffer must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_window(&self) -> Duration {
        Duration::from_secs(self.poll_window_secs)
    }

    /// Resolve the bot token from `SLACK_POKER_BOT_TOKEN`, else `token.txt`
    pub fn load_token() -> Result<String> {
        resolve_token(std::env::var(TOKEN_ENV_VAR).ok(), Path::new(TOKEN_FILE))
    }
}

fn resolve_token(from_env: Option<String>, file: &Path) -> Result<String> {
    if let Some(token) = from_env.filter(|t| !t.trim().is_empty()) {
        return Ok(token.trim().to_string());
    }
    match std::fs::read_to_string(file) {
        Ok(contents) if !contents.trim().is_empty() => Ok(contents.trim().to_string()),
        Ok(_) => Err(DealerError::NoToken),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DealerError::NoToken),
        Err(e) => Err(e.into()),
    }
}

/// Immutable copy of the game parameters, taken when a session starts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    values: BTreeMap<String, String>,
}

impl GameConfig {
    /// Raw value of a parameter
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Per-action timeout, if set
    pub fn timeout(&self) -> Option<Duration> {
        self.get("timeout")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Process-wide store of whitelisted game parameters
///
/// Mutations are serialized behind a lock that is never held across
/// an await point.
#[derive(Debug)]
pub struct ConfigStore {
    params: Vec<String>,
    pattern: Regex,
    values: RwLock<BTreeMap<String, String>>,
}

impl ConfigStore {
    /// Create a store accepting only the given parameter names
    pub fn new<I, S>(params: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            params: params.into_iter().map(Into::into).collect(),
            pattern: Regex::new(PARAM_PATTERN)?,
            values: RwLock::new(BTreeMap::new()),
        })
    }

    /// Create a store with the whitelist from `config`
    pub fn from_config(config: &DealerConfig) -> Result<Self> {
        Self::new(config.config_params.iter().cloned())
    }

    /// Whitelisted parameter names
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Apply every valid `key=value` pair found in `text`
    ///
    /// Returns the applied pairs in text order. Pairs with a key outside the
    /// whitelist or an empty value are skipped without error.
    pub fn apply(&self, text: &str) -> Vec<(String, String)> {
        let applied: Vec<(String, String)> = self
            .pattern
            .captures_iter(text)
            .filter_map(|caps| {
                let key = caps.get(1)?.as_str();
                let value = caps.get(2)?.as_str();
                (self.params.iter().any(|p| p == key) && !value.is_empty())
                    .then(|| (key.to_string(), value.to_string()))
            })
            .collect();

        if !applied.is_empty() {
            let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
            for (key, value) in &applied {
                values.insert(key.clone(), value.clone());
                tracing::info!(key = %key, value = %value, "Game parameter set");
            }
        }

        applied
    }

    /// Current raw value of a parameter
    pub fn get(&self, key: &str) -> Option<String> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.get(key).cloned()
    }

    /// Copy the current parameters for a new session
    pub fn snapshot(&self) -> GameConfig {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        GameConfig {
            values: values.clone(),
        }
    }
}
