//! Relay access for runbot.
//!
//! Exposes the subscribable relay abstraction consumed by the reference-chain
//! resolver, a websocket client implementing it, and the resolver itself.

pub mod reference_chain;
mod relay_client;
mod relay_protocol;
mod relay_source;

pub use reference_chain::{get_source_event, resolve_source_run_event};
pub use relay_client::{RelayClient, DEFAULT_PUBLISH_TIMEOUT};
pub use relay_source::{
    Relay, RelayError, RelayPublisher, RelaySource, Subscription, SubscriptionMessage,
};
