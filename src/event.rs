use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::logging::{Logger, MessageType};

/// Phase of a driver operation an event reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriverEventKind {
    /// Raised before the wrapped operation runs
    Action,
    /// Raised after the wrapped operation succeeded
    Completed,
    /// Raised when the wrapped operation (or event delivery) failed
    Error,
    /// Extra detail such as request or response content
    Verbose,
}

/// Structured notification emitted by event-firing drivers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub kind: DriverEventKind,
    pub message: String,
    pub stack_trace: Option<String>,
}

impl DriverEvent {
    pub fn new(source: &str, kind: DriverEventKind, message: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            source: source.to_string(),
            kind,
            message: message.into(),
            stack_trace: None,
        }
    }

    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }
}

/// Synchronous event subscriber
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &DriverEvent) -> Result<(), EventError>;
}

impl<F> EventListener for F
where
    F: Fn(&DriverEvent) -> Result<(), EventError> + Send + Sync,
{
    fn on_event(&self, event: &DriverEvent) -> Result<(), EventError> {
        self(event)
    }
}

/// Event subscription handle for asynchronous consumers
pub struct EventSubscription {
    pub filter: EventFilter,
    receiver: broadcast::Receiver<DriverEvent>,
}

impl EventSubscription {
    pub async fn recv(&mut self) -> Result<DriverEvent, EventError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(EventError::ChannelClosed);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Skipped {} driver events due to slow consumer", skipped);
                }
            }
        }
    }

    /// Next matching event that is already queued, if any
    pub fn try_recv(&mut self) -> Option<DriverEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    log::warn!("Skipped {} driver events due to slow consumer", skipped);
                }
                Err(_) => return None,
            }
        }
    }
}

/// Event filter for subscription filtering
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub kinds: Option<Vec<DriverEventKind>>,
    pub sources: Option<Vec<String>>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kinds(mut self, kinds: Vec<DriverEventKind>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn matches(&self, event: &DriverEvent) -> bool {
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }

        if let Some(ref sources) = self.sources {
            if !sources.contains(&event.source) {
                return false;
            }
        }

        true
    }
}

/// Per-test event hub shared by every event-firing driver of the test
pub struct EventBus {
    sender: broadcast::Sender<DriverEvent>,
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);

        Self {
            sender,
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a synchronous listener
    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners.write().push(listener);
    }

    /// Unregister a listener previously added; returns whether it was found
    pub fn remove_listener(&self, listener: &Arc<dyn EventListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|existing| !std::ptr::addr_eq(Arc::as_ptr(existing), Arc::as_ptr(listener)));
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Subscribe to events with optional filtering
    pub fn subscribe(&self, filter: EventFilter) -> EventSubscription {
        EventSubscription {
            filter,
            receiver: self.sender.subscribe(),
        }
    }

    /// Get current subscriber count
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Deliver an event to every listener and subscriber
    ///
    /// All listeners see the event even when one of them fails; the first
    /// failure is returned.
    pub fn publish(&self, event: DriverEvent) -> Result<(), EventError> {
        let listeners = self.listeners.read().clone();
        let mut first_error = None;

        for listener in listeners {
            if let Err(e) = listener.on_event(&event) {
                first_error.get_or_insert(e);
            }
        }

        // No active receivers is fine
        let _ = self.sender.send(event);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Listener writing events to a test logger
pub struct LoggingListener {
    logger: Arc<dyn Logger>,
}

impl LoggingListener {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }

    fn message_type(kind: DriverEventKind) -> MessageType {
        match kind {
            DriverEventKind::Action => MessageType::Action,
            DriverEventKind::Completed => MessageType::Information,
            DriverEventKind::Error => MessageType::Error,
            DriverEventKind::Verbose => MessageType::Verbose,
        }
    }
}

impl EventListener for LoggingListener {
    fn on_event(&self, event: &DriverEvent) -> Result<(), EventError> {
        let message = match event.stack_trace {
            Some(ref trace) => format!("{}\n{}", event.message, trace),
            None => event.message.clone(),
        };

        self.logger
            .log_message(Self::message_type(event.kind), &message)
            .map_err(|e| EventError::ListenerFailed(e.to_string()))
    }
}

/// Event raising helper used by the event-firing drivers
#[derive(Clone)]
pub struct EventEmitter {
    source: &'static str,
    bus: Arc<EventBus>,
}

impl EventEmitter {
    pub fn new(source: &'static str, bus: Arc<EventBus>) -> Self {
        Self { source, bus }
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn action(&self, message: impl Into<String>) {
        self.raise(DriverEvent::new(self.source, DriverEventKind::Action, message));
    }

    pub fn completed(&self, message: impl Into<String>) {
        self.raise(DriverEvent::new(self.source, DriverEventKind::Completed, message));
    }

    pub fn verbose(&self, message: impl Into<String>) {
        self.raise(DriverEvent::new(self.source, DriverEventKind::Verbose, message));
    }

    /// Raise an error event carrying the error and its source chain
    pub fn error(&self, context: &str, error: &(dyn StdError + 'static)) {
        let event = DriverEvent::new(self.source, DriverEventKind::Error, format!("{}: {}", context, error))
            .with_stack_trace(error_chain(error));
        self.raise(event);
    }

    /// Publish an event; a delivery failure becomes a single error event and
    /// never reaches the caller.
    fn raise(&self, event: DriverEvent) {
        let kind = event.kind;
        if let Err(failure) = self.bus.publish(event) {
            let report = DriverEvent::new(
                self.source,
                DriverEventKind::Error,
                format!("Failed to deliver {:?} event: {}", kind, failure),
            );
            if let Err(e) = self.bus.publish(report) {
                log::error!("{} event delivery failed: {}", self.source, e);
            }
        }
    }
}

/// Render an error and its `source()` chain, one cause per line
pub fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut lines = vec![format!("{:?}", error)];
    let mut current = error.source();
    while let Some(cause) = current {
        lines.push(format!("caused by: {}", cause));
        current = cause.source();
    }
    lines.join("\n")
}

/// Event-related errors
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Event channel closed")]
    ChannelClosed,
    #[error("Event listener failed: {0}")]
    ListenerFailed(String),
}
