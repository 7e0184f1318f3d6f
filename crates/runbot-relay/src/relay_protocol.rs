//! JSON array frames exchanged with relays.

use runbot_events::{Event, Filter};
use serde_json::{json, Value};

use crate::RelayError;

#[derive(Debug, Clone, Copy)]
pub(crate) enum ClientMessage<'a> {
    Req {
        subscription_id: &'a str,
        filters: &'a [Filter],
    },
    Close {
        subscription_id: &'a str,
    },
    Event {
        event: &'a Event,
    },
}

impl ClientMessage<'_> {
    pub(crate) fn to_json(self) -> Result<String, RelayError> {
        let frame = match self {
            Self::Req {
                subscription_id,
                filters,
            } => {
                let mut frame = vec![json!("REQ"), json!(subscription_id)];
                for filter in filters {
                    frame.push(serde_json::to_value(filter)?);
                }
                Value::Array(frame)
            }
            Self::Close { subscription_id } => json!(["CLOSE", subscription_id]),
            Self::Event { event } => json!(["EVENT", serde_json::to_value(event)?]),
        };
        Ok(frame.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RelayMessage {
    Event {
        subscription_id: String,
        event: Event,
    },
    EndOfStoredEvents {
        subscription_id: String,
    },
    Ok {
        event_id: String,
        accepted: bool,
        message: String,
    },
    Notice {
        message: String,
    },
    Closed {
        subscription_id: String,
        message: String,
    },
}

fn string_at(frame: &[Value], index: usize, label: &str) -> Result<String, RelayError> {
    frame
        .get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RelayError::Protocol(format!("missing {label}")))
}

pub(crate) fn parse_relay_message(text: &str) -> Result<RelayMessage, RelayError> {
    let frame = serde_json::from_str::<Vec<Value>>(text)?;
    let label = string_at(&frame, 0, "message type")?;
    match label.as_str() {
        "EVENT" => {
            let subscription_id = string_at(&frame, 1, "subscription id")?;
            let event = frame
                .get(2)
                .cloned()
                .ok_or_else(|| RelayError::Protocol("missing event payload".to_string()))?;
            Ok(RelayMessage::Event {
                subscription_id,
                event: serde_json::from_value(event)?,
            })
        }
        "EOSE" => Ok(RelayMessage::EndOfStoredEvents {
            subscription_id: string_at(&frame, 1, "subscription id")?,
        }),
        "OK" => Ok(RelayMessage::Ok {
            event_id: string_at(&frame, 1, "event id")?,
            accepted: frame.get(2).and_then(Value::as_bool).unwrap_or(false),
            message: string_at(&frame, 3, "message").unwrap_or_default(),
        }),
        "NOTICE" => Ok(RelayMessage::Notice {
            message: string_at(&frame, 1, "message").unwrap_or_default(),
        }),
        "CLOSED" => Ok(RelayMessage::Closed {
            subscription_id: string_at(&frame, 1, "subscription id")?,
            message: string_at(&frame, 2, "message").unwrap_or_default(),
        }),
        other => Err(RelayError::Protocol(format!(
            "unsupported message type `{other}`"
        ))),
    }
}
