//! Execution backend client for runbot.
//!
//! Wraps the Piston v2 HTTP API behind the `CodeExecutor` trait so the
//! dispatcher can run submitted code without knowing the transport.

mod client;
mod retry;
mod types;

pub use client::{PistonClient, PistonConfig};
pub use retry::RetryPolicy;
pub use types::{
    CodeExecutor, ExecuteRequest, ExecutionResult, PistonError, Runtime, ScriptFile, StageResult,
};
