//! In-memory chat provider
//!
//! Single-process `ChatProvider` for tests and local use. Events are
//! injected with `inject()`, outbound messages are recorded and can be
//! inspected with `sent()` / `messages_to()`.

use crate::error::{DealerError, Result};
use crate::provider::{ChatProvider, Subscription};
use crate::types::{Channel, ChatEvent, User};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// A message recorded by `MemoryChatProvider::send`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: String,
    pub text: String,
}

/// Configuration for the in-memory provider
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Bot user id
    pub self_id: String,
    /// Bot display name
    pub self_name: String,
    /// Team/workspace name
    pub team_name: String,
    /// Inbound event buffer per subscription
    pub buffer: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            self_id: "UDEALER".to_string(),
            self_name: "dealer".to_string(),
            team_name: "a3s".to_string(),
            buffer: 1024,
        }
    }
}

#[derive(Default)]
struct Directory {
    users: HashMap<String, User>,
    channels: HashMap<String, Channel>,
    dm_failures: HashSet<String>,
}

/// In-memory chat backend
pub struct MemoryChatProvider {
    config: MemoryConfig,
    events: Mutex<Option<broadcast::Sender<ChatEvent>>>,
    directory: Mutex<Directory>,
    outbox: Mutex<Vec<SentMessage>>,
    dm_requests: Mutex<Vec<String>>,
}

impl Default for MemoryChatProvider {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

impl MemoryChatProvider {
    pub fn new(config: MemoryConfig) -> Self {
        let (tx, _) = broadcast::channel(config.buffer.max(1));
        Self {
            config,
            events: Mutex::new(Some(tx)),
            directory: Mutex::new(Directory::default()),
            outbox: Mutex::new(Vec::new()),
            dm_requests: Mutex::new(Vec::new()),
        }
    }

    /// Register a user in the directory
    pub fn add_user(&self, id: impl Into<String>, name: impl Into<String>) {
        let user = User {
            id: id.into(),
            name: name.into(),
        };
        lock(&self.directory).users.insert(user.id.clone(), user);
    }

    /// Register a channel, group, or DM in the directory
    pub fn add_channel(&self, channel: Channel) {
        lock(&self.directory).channels.insert(channel.id.clone(), channel);
    }

    /// Make `open_dm` fail for one user
    pub fn fail_dm_for(&self, user: impl Into<String>) {
        lock(&self.directory).dm_failures.insert(user.into());
    }

    /// Deliver an event to every live subscription
    ///
    /// Returns the number of subscriptions that received it.
    pub fn inject(&self, event: ChatEvent) -> usize {
        lock(&self.events)
            .as_ref()
            .and_then(|tx| tx.send(event).ok())
            .unwrap_or(0)
    }

    /// End the inbound stream for every subscription
    pub fn close(&self) {
        lock(&self.events).take();
    }

    /// Every message sent so far, in order
    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.outbox).clone()
    }

    /// Texts sent to one channel, in order
    pub fn messages_to(&self, channel: &str) -> Vec<String> {
        lock(&self.outbox)
            .iter()
            .filter(|m| m.channel == channel)
            .map(|m| m.text.clone())
            .collect()
    }

    /// User ids for which a DM channel was requested, in order
    pub fn dm_requests(&self) -> Vec<String> {
        lock(&self.dm_requests).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl ChatProvider for MemoryChatProvider {
    async fn subscribe(&self) -> Result<Box<dyn Subscription>> {
        let rx = lock(&self.events)
            .as_ref()
            .map(|tx| tx.subscribe())
            .ok_or(DealerError::StreamClosed)?;
        Ok(Box::new(MemorySubscription {
            stream: BroadcastStream::new(rx),
        }))
    }

    fn self_id(&self) -> &str {
        &self.config.self_id
    }

    fn self_name(&self) -> &str {
        &self.config.self_name
    }

    fn team_name(&self) -> &str {
        &self.config.team_name
    }

    async fn user(&self, id: &str) -> Result<User> {
        lock(&self.directory)
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| DealerError::UserNotFound(id.to_string()))
    }

    async fn channel(&self, id: &str) -> Result<Channel> {
        lock(&self.directory)
            .channels
            .get(id)
            .cloned()
            .ok_or_else(|| DealerError::ChannelNotFound(id.to_string()))
    }

    async fn channels(&self) -> Result<Vec<Channel>> {
        let mut channels: Vec<Channel> =
            lock(&self.directory).channels.values().cloned().collect();
        channels.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(channels)
    }

    async fn send(&self, channel: &str, text: &str) -> Result<()> {
        lock(&self.outbox).push(SentMessage {
            channel: channel.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn open_dm(&self, user: &str) -> Result<String> {
        lock(&self.dm_requests).push(user.to_string());

        let mut directory = lock(&self.directory);
        if directory.dm_failures.contains(user) {
            return Err(DealerError::Connection(format!("im.open rejected for {}", user)));
        }
        let name = directory
            .users
            .get(user)
            .map(|u| u.name.clone())
            .ok_or_else(|| DealerError::UserNotFound(user.to_string()))?;

        let id = format!("D{}", user);
        directory
            .channels
            .entry(id.clone())
            .or_insert_with(|| Channel::direct(id.clone(), name));
        Ok(id)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Subscription handle returned by `MemoryChatProvider::subscribe`
pub struct MemorySubscription {
    stream: BroadcastStream<ChatEvent>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next(&mut self) -> Result<Option<ChatEvent>> {
        loop {
            match self.stream.next().await {
                Some(Ok(event)) => return Ok(Some(event)),
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    tracing::warn!(skipped, "Memory subscription lagged, events dropped");
                }
                None => return Ok(None),
            }
        }
    }
}
