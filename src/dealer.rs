//! The dealer bot
//!
//! `Dealer` consumes the provider's event stream, publishes every message to
//! the chat bus, classifies it, and dispatches Deal triggers to the session
//! controller and Config triggers to the config store. Quit triggers are
//! handled by the listener the running session registered on the bus.

use crate::bus::ChatBus;
use crate::command::{Command, CommandClassifier};
use crate::config::{ConfigStore, DealerConfig};
use crate::engine::GameEngineFactory;
use crate::error::Result;
use crate::poller::{PlayerPoller, PollOptions};
use crate::provider::ChatProvider;
use crate::session::{SessionController, SessionState};
use crate::types::{ChannelKind, ChatEvent, EventKind};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What the dealer did with one inbound event
#[derive(Debug, Default)]
pub struct Dispatch {
    /// Triggers the event matched, in table order
    pub commands: Vec<Command>,

    /// Game parameters applied by a Config trigger
    pub applied: Vec<(String, String)>,

    /// Task running the session admitted by a Deal trigger
    pub session: Option<JoinHandle<()>>,
}

/// Channels the bot is active in, logged when the connection opens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub team: String,
    pub bot: String,
    pub channels: Vec<String>,
    pub groups: Vec<String>,
    pub dms: Vec<String>,
}

/// Chat bot that recruits players and runs card games
pub struct Dealer {
    provider: Arc<dyn ChatProvider>,
    bus: Arc<ChatBus>,
    config_store: Arc<ConfigStore>,
    sessions: Arc<SessionController>,
}

impl Dealer {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        engines: Arc<dyn GameEngineFactory>,
        config: DealerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let classifier = Arc::new(CommandClassifier::new(provider.self_id())?);
        let bus = Arc::new(ChatBus::new(classifier, config.event_buffer));
        let config_store = Arc::new(ConfigStore::from_config(&config)?);
        let poller = PlayerPoller::new(
            Arc::clone(&provider),
            PollOptions {
                window: config.poll_window(),
                max_players: config.max_players,
            },
        )?;
        let sessions = Arc::new(SessionController::new(
            Arc::clone(&provider),
            Arc::clone(&bus),
            Arc::clone(&config_store),
            engines,
            poller,
            config,
        ));

        Ok(Self {
            provider,
            bus,
            config_store,
            sessions,
        })
    }

    /// Consume the provider's event stream until it ends
    ///
    /// The chat bus is closed on return, which ends any recruitment in
    /// progress.
    pub async fn run(&self) -> Result<()> {
        let mut events = self.provider.subscribe().await?;
        tracing::info!(provider = self.provider.name(), "Dealer listening");

        let result = loop {
            match events.next().await {
                Ok(Some(event)) => {
                    self.handle_event(event).await;
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        self.bus.close();
        tracing::info!("Dealer stopped");
        result
    }

    /// Dispatch one inbound event
    pub async fn handle_event(&self, event: ChatEvent) -> Dispatch {
        match event.kind {
            EventKind::Open => {
                if let Err(e) = self.on_client_opened().await {
                    tracing::warn!(error = %e, "Failed to summarize connection");
                }
                return Dispatch::default();
            }
            EventKind::Other(_) => return Dispatch::default(),
            EventKind::Message => {}
        }

        self.bus.publish(&event);

        let mut dispatch = Dispatch {
            commands: self.bus.classifier().classify_all(&event),
            ..Default::default()
        };

        for command in dispatch.commands.clone() {
            match command {
                Command::Deal => match self.sessions.admit_deal(&event.channel).await {
                    Ok(session) => dispatch.session = session,
                    Err(e) => {
                        tracing::warn!(channel = %event.channel, error = %e, "Deal not admitted");
                    }
                },
                Command::Config => {
                    dispatch.applied = self.apply_config(&event).await;
                }
                Command::Quit => {
                    tracing::debug!(channel = %event.channel, "Quit trigger published to session");
                }
                Command::Irrelevant => {}
            }
        }

        dispatch
    }

    async fn apply_config(&self, event: &ChatEvent) -> Vec<(String, String)> {
        let applied = self.config_store.apply(event.text());
        for (key, value) in &applied {
            let text = format!("Game {} set to {}.", key, value);
            if let Err(e) = self.provider.send(&event.channel, &text).await {
                tracing::warn!(channel = %event.channel, error = %e, "Failed to confirm config");
            }
        }
        applied
    }

    /// Log the team, bot, and the channels the bot is active in
    pub async fn on_client_opened(&self) -> Result<ConnectionSummary> {
        let mut summary = ConnectionSummary {
            team: self.provider.team_name().to_string(),
            bot: self.provider.self_name().to_string(),
            ..Default::default()
        };

        for channel in self.provider.channels().await? {
            if !channel.is_active() {
                continue;
            }
            match channel.kind {
                ChannelKind::Channel => summary.channels.push(channel.name),
                ChannelKind::Group => summary.groups.push(channel.name),
                ChannelKind::DirectMessage => summary.dms.push(channel.name),
            }
        }

        tracing::info!(team = %summary.team, bot = %summary.bot, "Connected");
        if summary.channels.is_empty() {
            tracing::info!("Not a member of any channel");
        } else {
            tracing::info!(channels = %summary.channels.join(", "), "Member of channels");
        }
        if !summary.groups.is_empty() {
            tracing::info!(groups = %summary.groups.join(", "), "Member of groups");
        }
        if !summary.dms.is_empty() {
            tracing::info!(dms = %summary.dms.join(", "), "Open direct messages");
        }

        Ok(summary)
    }

    /// Session state for the scope `channel` belongs to
    pub fn session_state(&self, channel: &str) -> SessionState {
        self.sessions.registry().state(channel)
    }

    /// Number of active sessions
    pub fn active_sessions(&self) -> usize {
        self.sessions.registry().active()
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.config_store
    }

    pub fn bus(&self) -> &ChatBus {
        &self.bus
    }
}
