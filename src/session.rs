//! Session admission and lifecycle
//!
//! A session runs `Idle → Polling → Running → Idle` (or `Polling → Idle`
//! when too few players join). The `SessionRegistry` enforces that at most
//! one session per scope is active; an admitted session is represented by a
//! `SessionLease`, and dropping the lease is the single point where the
//! scope returns to `Idle`.

use crate::bus::{ChatBus, Listener, ListenerFilter};
use crate::command::Command;
use crate::config::{ConfigStore, DealerConfig, GameConfig};
use crate::engine::{GameEngine, GameEngineFactory, GameTable};
use crate::error::{DealerError, Result};
use crate::poller::PlayerPoller;
use crate::provider::ChatProvider;
use crate::types::{Channel, ChatEvent, Player};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

const PROCESS_SCOPE_KEY: &str = "*";

/// Notice sent when a Deal arrives while a game is running
pub const FINISH_RUNNING_GAME: &str = "Please finish the running game first.";

/// Notice sent when recruitment ends below quorum
pub const NOT_ENOUGH_PLAYERS: &str = "Not enough players for a game. Try again later.";

/// Key under which session exclusivity is enforced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionScope {
    /// One session for the whole bot
    #[default]
    Process,
    /// One session per channel
    Channel,
}

impl SessionScope {
    fn key(&self, channel: &str) -> String {
        match self {
            SessionScope::Process => PROCESS_SCOPE_KEY.to_string(),
            SessionScope::Channel => channel.to_string(),
        }
    }
}

/// Lifecycle state of a scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    #[default]
    Idle,
    Polling,
    Running,
}

/// Snapshot of an active session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: String,
    pub channel: String,
    pub state: SessionState,
}

type Sessions = Arc<Mutex<HashMap<String, SessionInfo>>>;

/// Outcome of a Deal admission attempt
#[derive(Debug)]
pub enum Admission {
    /// A new session was created in `Polling`
    Admitted(SessionLease),
    /// The scope is already recruiting
    Polling,
    /// The scope has a game in progress
    Running,
}

/// Active sessions keyed by scope
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    scope: SessionScope,
    sessions: Sessions,
}

impl SessionRegistry {
    pub fn new(scope: SessionScope) -> Self {
        Self {
            scope,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn scope(&self) -> SessionScope {
        self.scope
    }

    /// Admit a new session for `channel` if its scope is idle
    pub fn try_admit(&self, channel: &str) -> Admission {
        let key = self.scope.key(channel);
        let mut sessions = lock(&self.sessions);

        if let Some(active) = sessions.get(&key) {
            return match active.state {
                SessionState::Running => Admission::Running,
                _ => Admission::Polling,
            };
        }

        let info = SessionInfo {
            id: format!("ses-{}", uuid::Uuid::new_v4()),
            channel: channel.to_string(),
            state: SessionState::Polling,
        };
        sessions.insert(key.clone(), info.clone());

        tracing::info!(session = %info.id, channel = %channel, "Session admitted");
        Admission::Admitted(SessionLease {
            id: info.id,
            key,
            channel: info.channel,
            sessions: Arc::clone(&self.sessions),
        })
    }

    /// State of the scope `channel` belongs to
    pub fn state(&self, channel: &str) -> SessionState {
        lock(&self.sessions)
            .get(&self.scope.key(channel))
            .map(|s| s.state)
            .unwrap_or_default()
    }

    /// Number of active (Polling or Running) sessions
    pub fn active(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        lock(&self.sessions).values().cloned().collect()
    }
}

/// Owned handle on an admitted session
///
/// Dropping the lease returns its scope to `Idle`.
#[derive(Debug)]
pub struct SessionLease {
    id: String,
    key: String,
    channel: String,
    sessions: Sessions,
}

impl SessionLease {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn state(&self) -> SessionState {
        lock(&self.sessions)
            .get(&self.key)
            .map(|s| s.state)
            .unwrap_or_default()
    }

    fn set_state(&self, state: SessionState) {
        if let Some(entry) = lock(&self.sessions).get_mut(&self.key) {
            debug_assert_eq!(entry.id, self.id, "lease outlived its registry entry");
            entry.state = state;
        }
        tracing::info!(
            session = %self.id,
            channel = %self.channel,
            state = ?state,
            "Session state changed"
        );
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        let mut sessions = lock(&self.sessions);
        let owned = sessions.get(&self.key).is_some_and(|s| s.id == self.id);
        debug_assert!(owned, "session {} released twice", self.id);
        if owned {
            sessions.remove(&self.key);
        }
        drop(sessions);
        tracing::info!(session = %self.id, channel = %self.channel, "Session released");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives sessions from Deal admission to game completion
pub struct SessionController {
    provider: Arc<dyn ChatProvider>,
    bus: Arc<ChatBus>,
    config_store: Arc<ConfigStore>,
    engines: Arc<dyn GameEngineFactory>,
    poller: PlayerPoller,
    registry: SessionRegistry,
    config: Arc<DealerConfig>,
}

impl SessionController {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        bus: Arc<ChatBus>,
        config_store: Arc<ConfigStore>,
        engines: Arc<dyn GameEngineFactory>,
        poller: PlayerPoller,
        config: Arc<DealerConfig>,
    ) -> Self {
        Self {
            registry: SessionRegistry::new(config.scope),
            provider,
            bus,
            config_store,
            engines,
            poller,
            config,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Handle a Deal trigger posted to `channel_id`
    ///
    /// Admission and the recruitment listener are set up before this
    /// returns, so no join that follows the Deal message can be missed. The
    /// rest of the session runs on the returned task.
    pub async fn admit_deal(self: &Arc<Self>, channel_id: &str) -> Result<Option<JoinHandle<()>>> {
        let channel = self.provider.channel(channel_id).await?;

        let lease = match self.registry.try_admit(&channel.id) {
            Admission::Admitted(lease) => lease,
            Admission::Polling => {
                tracing::debug!(channel = %channel.id, "Deal ignored, recruitment in progress");
                return Ok(None);
            }
            Admission::Running => {
                tracing::debug!(channel = %channel.id, "Deal rejected, game in progress");
                self.notify(&channel.id, FINISH_RUNNING_GAME).await;
                return Ok(None);
            }
        };

        let joins = self.bus.listen(PlayerPoller::join_filter(&channel.id))?;
        let controller = Arc::clone(self);
        Ok(Some(tokio::spawn(async move {
            controller.run_session(lease, channel, joins).await;
        })))
    }

    async fn run_session(&self, lease: SessionLease, channel: Channel, joins: Listener) {
        if let Err(e) = self.drive(&lease, &channel, joins).await {
            tracing::error!(
                session = %lease.id(),
                channel = %channel.id,
                error = %e,
                "Session failed"
            );
            self.notify(&channel.id, &format!("The game could not continue: {}", e))
                .await;
        }
        drop(lease);
    }

    async fn drive(&self, lease: &SessionLease, channel: &Channel, joins: Listener) -> Result<()> {
        let players = self.poller.poll(joins, channel).await?;
        self.on_poll_complete(lease, channel, players).await
    }

    /// Check quorum and hand the table to a new game
    async fn on_poll_complete(
        &self,
        lease: &SessionLease,
        channel: &Channel,
        mut players: Vec<Player>,
    ) -> Result<()> {
        players.extend(self.config.ai_seats.iter().map(|seat| seat.to_player()));

        if players.len() < self.config.min_players {
            tracing::info!(
                session = %lease.id(),
                players = players.len(),
                "Recruitment below quorum, aborting"
            );
            self.notify(&channel.id, NOT_ENOUGH_PLAYERS).await;
            return Ok(());
        }

        lease.set_state(SessionState::Running);
        let config = self.config_store.snapshot();

        self.notify(
            &channel.id,
            &format!("{} players have joined. Starting the game.", players.len()),
        )
        .await;

        self.start_game(lease, channel, players, config).await
    }

    async fn start_game(
        &self,
        lease: &SessionLease,
        channel: &Channel,
        players: Vec<Player>,
        config: GameConfig,
    ) -> Result<()> {
        let mut quit = self.bus.listen(
            ListenerFilter::new("quit")
                .in_channel(&channel.id)
                .command(Command::Quit),
        )?;
        let messages = self
            .bus
            .listen(ListenerFilter::new("table").in_channel(&channel.id))?;

        let engine = self.engines.create(GameTable {
            provider: Arc::clone(&self.provider),
            messages,
            channel: channel.clone(),
            players: players.clone(),
            config,
        })?;

        let play = async {
            let dms = self.provider.open_dms(&players).await?;
            tokio::time::sleep(self.config.settle_delay()).await;
            tracing::info!(session = %lease.id(), players = players.len(), "Game starting");
            engine.start(dms).await
        };
        tokio::pin!(play);

        let mut quit_requested = false;
        let result = loop {
            tokio::select! {
                result = &mut play => break result,
                event = quit.next() => match event {
                    // Single-shot: only the first quit is acted on
                    Some(event) if !quit_requested => {
                        quit_requested = true;
                        self.on_quit(lease, channel, &event, engine.as_ref()).await;
                    }
                    Some(event) => {
                        tracing::debug!(
                            session = %lease.id(),
                            user = ?event.user,
                            "Quit already requested"
                        );
                    }
                    None => {
                        tracing::warn!(session = %lease.id(), "Event stream closed during game");
                        engine.quit();
                        break Err(DealerError::StreamClosed);
                    }
                },
            }
        };
        drop(quit);

        tracing::info!(session = %lease.id(), ok = result.is_ok(), "Game finished");
        result
    }

    async fn on_quit(
        &self,
        lease: &SessionLease,
        channel: &Channel,
        event: &ChatEvent,
        engine: &dyn GameEngine,
    ) {
        let user_id = event.user.as_deref().unwrap_or_default();
        let name = match self.provider.user(user_id).await {
            Ok(user) => user.name,
            Err(e) => {
                tracing::warn!(user = %user_id, error = %e, "Quitting user not in directory");
                user_id.to_string()
            }
        };

        tracing::info!(session = %lease.id(), user = %user_id, "Quit requested");
        self.notify(
            &channel.id,
            &format!(
                "{} has decided to quit. The game will end after this hand.",
                name
            ),
        )
        .await;
        engine.quit();
    }

    async fn notify(&self, channel: &str, text: &str) {
        if let Err(e) = self.provider.send(channel, text).await {
            tracing::warn!(channel = %channel, error = %e, "Failed to send session message");
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Polling => "polling",
            SessionState::Running => "running",
        };
        f.write_str(name)
    }
}
