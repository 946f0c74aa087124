//! Chat bus: fan-out of the inbound event stream to scoped listeners
//!
//! The dealer publishes every inbound message to the `ChatBus`. Sessions
//! register `Listener`s with a `ListenerFilter` (channel, trigger) and
//! receive matching events in arrival order. A listener is released
//! exactly once, when its handle is dropped, so every exit path of a
//! session releases what it registered.

use crate::command::{Command, CommandClassifier};
use crate::error::{DealerError, Result};
use crate::types::ChatEvent;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

type Registry = Arc<Mutex<HashMap<String, ListenerFilter>>>;

/// Which events a listener receives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerFilter {
    /// Human-readable purpose, used in logs (e.g., "poller", "quit")
    pub label: String,

    /// Only events posted to this channel
    pub channel: Option<String>,

    /// Only events matching this trigger
    pub command: Option<Command>,
}

impl ListenerFilter {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// Restrict to one channel
    pub fn in_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Restrict to one trigger
    pub fn command(mut self, command: Command) -> Self {
        self.command = Some(command);
        self
    }

    fn accepts(&self, event: &ChatEvent, classifier: &CommandClassifier) -> bool {
        if let Some(channel) = &self.channel {
            if &event.channel != channel {
                return false;
            }
        }
        match self.command {
            Some(command) => classifier.matches(event, command),
            None => true,
        }
    }
}

/// Fan-out hub for inbound chat messages
///
/// Thread-safe; listeners may be registered from any task.
pub struct ChatBus {
    classifier: Arc<CommandClassifier>,
    sender: Mutex<Option<broadcast::Sender<ChatEvent>>>,

    /// Live listeners (listener_id → filter)
    listeners: Registry,
}

impl ChatBus {
    /// Create a bus buffering up to `capacity` undelivered events per listener
    pub fn new(classifier: Arc<CommandClassifier>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            classifier,
            sender: Mutex::new(Some(sender)),
            listeners: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Deliver an event to every live listener
    ///
    /// Returns the number of listeners the event was queued for, before
    /// filtering. Events published with no listeners are dropped.
    pub fn publish(&self, event: &ChatEvent) -> usize {
        lock(&self.sender)
            .as_ref()
            .and_then(|tx| tx.send(event.clone()).ok())
            .unwrap_or(0)
    }

    /// Register a listener
    ///
    /// The listener only sees events published after this call.
    pub fn listen(&self, filter: ListenerFilter) -> Result<Listener> {
        let receiver = lock(&self.sender)
            .as_ref()
            .map(|tx| tx.subscribe())
            .ok_or(DealerError::StreamClosed)?;

        let id = format!("lst-{}", uuid::Uuid::new_v4());
        lock(&self.listeners).insert(id.clone(), filter.clone());

        tracing::debug!(
            listener = %id,
            label = %filter.label,
            channel = ?filter.channel,
            command = ?filter.command,
            "Listener registered"
        );

        Ok(Listener {
            id,
            filter,
            receiver,
            classifier: Arc::clone(&self.classifier),
            registry: Arc::clone(&self.listeners),
        })
    }

    /// End the stream: listeners drain what is queued, then see `None`
    pub fn close(&self) {
        if lock(&self.sender).take().is_some() {
            tracing::info!("Chat bus closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.sender).is_none()
    }

    /// Number of listeners not yet released
    pub fn active_listeners(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Filters of all live listeners
    pub fn list_listeners(&self) -> Vec<ListenerFilter> {
        lock(&self.listeners).values().cloned().collect()
    }

    pub fn classifier(&self) -> &CommandClassifier {
        &self.classifier
    }
}

/// A registered, filtered view of the chat bus
///
/// Dropping the handle releases the listener.
pub struct Listener {
    id: String,
    filter: ListenerFilter,
    receiver: broadcast::Receiver<ChatEvent>,
    classifier: Arc<CommandClassifier>,
    registry: Registry,
}

impl Listener {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn filter(&self) -> &ListenerFilter {
        &self.filter
    }

    /// Receive the next matching event, or `None` once the bus is closed
    pub async fn next(&mut self) -> Option<ChatEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.accepts(&event, &self.classifier) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        listener = %self.id,
                        label = %self.filter.label,
                        skipped,
                        "Listener lagged, events dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let removed = lock(&self.registry).remove(&self.id);
        debug_assert!(removed.is_some(), "listener {} released twice", self.id);
        tracing::debug!(listener = %self.id, label = %self.filter.label, "Listener released");
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
