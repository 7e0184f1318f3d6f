use async_trait::async_trait;
use runbot_events::{Event, Filter};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
/// Enumerates supported `RelayError` values.
pub enum RelayError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("relay connection closed")]
    ConnectionClosed,
    #[error("relay closed subscription: {0}")]
    SubscriptionClosed(String),
    #[error("relay rejected event {event_id}: {message}")]
    Rejected { event_id: String, message: String },
    #[error("timed out waiting for relay acknowledgement of event {0}")]
    AckTimeout(String),
    #[error("invalid relay message: {0}")]
    Protocol(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates supported `SubscriptionMessage` values.
pub enum SubscriptionMessage {
    Event(Event),
    /// No further stored events will arrive; live events may still follow.
    EndOfStoredEvents,
    /// The relay terminated the subscription.
    Closed(String),
}

type CloseHook = Box<dyn FnOnce(&str) + Send>;

/// Handle for one open relay query.
///
/// `close` is idempotent and also runs on drop, so the relay side is released
/// on every path, including a caller abandoning the wait.
pub struct Subscription {
    id: String,
    messages: mpsc::UnboundedReceiver<SubscriptionMessage>,
    on_close: Option<CloseHook>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Subscription {
    pub fn new<F>(
        id: impl Into<String>,
        messages: mpsc::UnboundedReceiver<SubscriptionMessage>,
        on_close: F,
    ) -> Self
    where
        F: FnOnce(&str) + Send + 'static,
    {
        Self {
            id: id.into(),
            messages,
            on_close: Some(Box::new(on_close)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_closed(&self) -> bool {
        self.on_close.is_none()
    }

    /// Waits for the next message. `None` means the subscription was closed locally
    /// or the underlying connection went away.
    pub async fn recv(&mut self) -> Option<SubscriptionMessage> {
        if self.is_closed() {
            return None;
        }
        self.messages.recv().await
    }

    pub fn close(&mut self) {
        if let Some(on_close) = self.on_close.take() {
            self.messages.close();
            on_close(&self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
/// Trait contract for `RelaySource` behavior.
pub trait RelaySource: Send + Sync {
    async fn subscribe(&self, filters: Vec<Filter>) -> Result<Subscription, RelayError>;
}

#[async_trait]
/// Trait contract for `RelayPublisher` behavior.
pub trait RelayPublisher: Send + Sync {
    async fn publish(&self, event: &Event) -> Result<(), RelayError>;
}

/// A relay that can be both queried and published to.
pub trait Relay: RelaySource + RelayPublisher {}

impl<T: RelaySource + RelayPublisher + ?Sized> Relay for T {}
