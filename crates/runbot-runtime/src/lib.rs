//! Command dispatcher for runbot.
//!
//! Subscribes to a relay for command notes, runs `/run` and `/rerun` requests
//! against the execution backend and publishes threaded replies.

mod bot_runtime;
mod processed_events;

pub use bot_runtime::{BotRuntime, BotRuntimeConfig};
pub use processed_events::ProcessedEventCache;
