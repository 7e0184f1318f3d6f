//! Websocket relay client.
//!
//! One background task owns the socket. Callers talk to it over a command
//! channel; subscription traffic is routed back through per-subscription
//! channels and publish acknowledgements through oneshot channels.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use runbot_events::{Event, Filter};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use crate::relay_protocol::{parse_relay_message, ClientMessage, RelayMessage};
use crate::{RelayError, RelayPublisher, RelaySource, Subscription, SubscriptionMessage};

pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

static CLIENT_COUNTER: AtomicU64 = AtomicU64::new(1);

type AckSender = oneshot::Sender<Result<(), RelayError>>;

enum ConnectionCommand {
    Subscribe {
        subscription_id: String,
        filters: Vec<Filter>,
        sender: mpsc::UnboundedSender<SubscriptionMessage>,
    },
    Close {
        subscription_id: String,
    },
    Publish {
        event: Event,
        ack: AckSender,
    },
}

#[derive(Debug, Clone)]
/// Cheaply cloneable handle to one relay connection.
pub struct RelayClient {
    client_id: u64,
    commands: mpsc::UnboundedSender<ConnectionCommand>,
    next_subscription: Arc<AtomicU64>,
    publish_timeout: Duration,
}

impl RelayClient {
    pub async fn connect(url: &str) -> Result<Self, RelayError> {
        let (stream, _response) = connect_async(url).await?;
        tracing::info!(relay = url, "relay connected");
        Ok(Self::from_stream(url, stream))
    }

    fn from_stream<S>(url: &str, stream: S) -> Self
    where
        S: Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
            + Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error>
            + Send
            + Unpin
            + 'static,
    {
        let (commands, command_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_connection(url.to_string(), stream, command_rx));
        Self {
            client_id: CLIENT_COUNTER.fetch_add(1, Ordering::Relaxed),
            commands,
            next_subscription: Arc::new(AtomicU64::new(1)),
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    pub fn with_publish_timeout(mut self, publish_timeout: Duration) -> Self {
        self.publish_timeout = publish_timeout;
        self
    }

    /// Resolves once the connection task has stopped.
    pub async fn closed(&self) {
        self.commands.closed().await;
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

#[async_trait]
impl RelaySource for RelayClient {
    async fn subscribe(&self, filters: Vec<Filter>) -> Result<Subscription, RelayError> {
        let subscription_id = format!(
            "runbot-{}-{}",
            self.client_id,
            self.next_subscription.fetch_add(1, Ordering::Relaxed)
        );
        let (sender, messages) = mpsc::unbounded_channel();
        self.commands
            .send(ConnectionCommand::Subscribe {
                subscription_id: subscription_id.clone(),
                filters,
                sender,
            })
            .map_err(|_| RelayError::ConnectionClosed)?;

        let commands = self.commands.clone();
        Ok(Subscription::new(subscription_id, messages, move |id| {
            let _ = commands.send(ConnectionCommand::Close {
                subscription_id: id.to_string(),
            });
        }))
    }
}

#[async_trait]
impl RelayPublisher for RelayClient {
    async fn publish(&self, event: &Event) -> Result<(), RelayError> {
        let (ack, ack_rx) = oneshot::channel();
        self.commands
            .send(ConnectionCommand::Publish {
                event: event.clone(),
                ack,
            })
            .map_err(|_| RelayError::ConnectionClosed)?;

        match tokio::time::timeout(self.publish_timeout, ack_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RelayError::ConnectionClosed),
            Err(_) => Err(RelayError::AckTimeout(event.id.clone())),
        }
    }
}

#[derive(Default)]
struct ConnectionState {
    subscriptions: HashMap<String, mpsc::UnboundedSender<SubscriptionMessage>>,
    pending_acks: HashMap<String, AckSender>,
}

async fn run_connection<S>(
    url: String,
    stream: S,
    mut commands: mpsc::UnboundedReceiver<ConnectionCommand>,
) where
    S: Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut sink, mut source) = stream.split();
    let mut state = ConnectionState::default();

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    tracing::debug!(relay = %url, "all relay handles dropped");
                    let _ = sink.send(WsMessage::Close(None)).await;
                    break;
                };
                if let Err(error) = handle_command(&mut sink, &mut state, command).await {
                    tracing::warn!(relay = %url, %error, "relay write failed");
                    break;
                }
            }
            incoming = source.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => handle_frame(&url, &mut state, &text),
                    Some(Ok(WsMessage::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => handle_frame(&url, &mut state, text),
                        Err(error) => tracing::warn!(relay = %url, %error, "non utf-8 relay frame"),
                    },
                    Some(Ok(WsMessage::Close(_))) | None => {
                        tracing::info!(relay = %url, "relay connection closed");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        tracing::warn!(relay = %url, %error, "relay read failed");
                        break;
                    }
                }
            }
        }
    }
    // Dropping the state ends every subscription stream and fails pending publishes.
}

async fn handle_command<K>(
    sink: &mut K,
    state: &mut ConnectionState,
    command: ConnectionCommand,
) -> Result<(), RelayError>
where
    K: Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    match command {
        ConnectionCommand::Subscribe {
            subscription_id,
            filters,
            sender,
        } => {
            let frame = ClientMessage::Req {
                subscription_id: &subscription_id,
                filters: &filters,
            }
            .to_json()?;
            tracing::debug!(subscription = %subscription_id, "relay REQ");
            state.subscriptions.insert(subscription_id, sender);
            sink.send(WsMessage::Text(frame.into())).await?;
        }
        ConnectionCommand::Close { subscription_id } => {
            if state.subscriptions.remove(&subscription_id).is_some() {
                let frame = ClientMessage::Close {
                    subscription_id: &subscription_id,
                }
                .to_json()?;
                tracing::debug!(subscription = %subscription_id, "relay CLOSE");
                sink.send(WsMessage::Text(frame.into())).await?;
            }
        }
        ConnectionCommand::Publish { event, ack } => {
            let frame = ClientMessage::Event { event: &event }.to_json()?;
            state.pending_acks.retain(|_, pending| !pending.is_closed());
            state.pending_acks.insert(event.id.clone(), ack);
            sink.send(WsMessage::Text(frame.into())).await?;
        }
    }
    Ok(())
}

fn handle_frame(url: &str, state: &mut ConnectionState, text: &str) {
    let message = match parse_relay_message(text) {
        Ok(message) => message,
        Err(error) => {
            tracing::debug!(relay = %url, %error, "ignoring relay frame");
            return;
        }
    };
    match message {
        RelayMessage::Event {
            subscription_id,
            event,
        } => forward(state, &subscription_id, SubscriptionMessage::Event(event)),
        RelayMessage::EndOfStoredEvents { subscription_id } => forward(
            state,
            &subscription_id,
            SubscriptionMessage::EndOfStoredEvents,
        ),
        RelayMessage::Closed {
            subscription_id,
            message,
        } => {
            tracing::warn!(relay = %url, subscription = %subscription_id, %message, "relay closed subscription");
            if let Some(sender) = state.subscriptions.remove(&subscription_id) {
                let _ = sender.send(SubscriptionMessage::Closed(message));
            }
        }
        RelayMessage::Ok {
            event_id,
            accepted,
            message,
        } => {
            if let Some(ack) = state.pending_acks.remove(&event_id) {
                let result = if accepted {
                    Ok(())
                } else {
                    Err(RelayError::Rejected {
                        event_id: event_id.clone(),
                        message,
                    })
                };
                let _ = ack.send(result);
            }
        }
        RelayMessage::Notice { message } => {
            tracing::warn!(relay = %url, %message, "relay notice");
        }
    }
}

fn forward(state: &mut ConnectionState, subscription_id: &str, message: SubscriptionMessage) {
    let delivered = state
        .subscriptions
        .get(subscription_id)
        .map(|sender| sender.send(message).is_ok());
    if delivered == Some(false) {
        state.subscriptions.remove(subscription_id);
    }
}
