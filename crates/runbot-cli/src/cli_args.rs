use std::time::Duration;

use clap::{ArgAction, Parser};
use runbot_piston::{PistonConfig, RetryPolicy};
use runbot_runtime::BotRuntimeConfig;

const DEFAULT_PISTON_URL: &str = "https://emkc.org/api/v2/piston";

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_relay_url(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        return Ok(trimmed.to_string());
    }
    Err("relay url must start with ws:// or wss://".to_string())
}

#[derive(Debug, Parser)]
#[command(
    name = "runbot",
    about = "Relay bot that runs /run code snippets on a Piston backend and replies in thread",
    version
)]
/// Command-line configuration for the runbot binary.
pub(crate) struct Cli {
    #[arg(
        long = "relay-url",
        env = "RUNBOT_RELAY_URL",
        value_parser = parse_relay_url,
        help = "Websocket url of the relay to listen on and publish replies to"
    )]
    pub(crate) relay_url: String,

    #[arg(
        long = "secret-key",
        env = "RUNBOT_SECRET_KEY",
        hide_env_values = true,
        help = "Bot secret key as 64 hex characters"
    )]
    pub(crate) secret_key: String,

    #[arg(
        long = "piston-url",
        env = "RUNBOT_PISTON_URL",
        default_value = DEFAULT_PISTON_URL,
        help = "Base url of the Piston v2 execution api"
    )]
    pub(crate) piston_url: String,

    #[arg(
        long = "request-timeout-ms",
        env = "RUNBOT_REQUEST_TIMEOUT_MS",
        default_value_t = 15_000,
        value_parser = parse_positive_u64,
        help = "HTTP timeout for execution backend requests"
    )]
    pub(crate) request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "RUNBOT_RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = parse_positive_usize,
        help = "Maximum attempts for retryable execution backend failures (408/409/425/429/5xx/transport)"
    )]
    pub(crate) retry_max_attempts: usize,

    #[arg(
        long = "compile-timeout-ms",
        env = "RUNBOT_COMPILE_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64,
        help = "Compile stage time limit passed to the backend"
    )]
    pub(crate) compile_timeout_ms: u64,

    #[arg(
        long = "run-timeout-ms",
        env = "RUNBOT_RUN_TIMEOUT_MS",
        default_value_t = 3_000,
        value_parser = parse_positive_u64,
        help = "Run stage time limit passed to the backend"
    )]
    pub(crate) run_timeout_ms: u64,

    #[arg(
        long = "max-hops",
        env = "RUNBOT_MAX_HOPS",
        default_value_t = 8,
        help = "Maximum reply-chain lookups when resolving the source of a /rerun"
    )]
    pub(crate) max_hops: usize,

    #[arg(
        long = "resolution-timeout-ms",
        env = "RUNBOT_RESOLUTION_TIMEOUT_MS",
        default_value_t = 0,
        help = "Wall-clock limit for resolving one /rerun (0 disables the limit)"
    )]
    pub(crate) resolution_timeout_ms: u64,

    #[arg(
        long = "max-concurrent-commands",
        env = "RUNBOT_MAX_CONCURRENT_COMMANDS",
        default_value_t = 4,
        value_parser = parse_positive_usize,
        help = "Maximum commands handled at the same time"
    )]
    pub(crate) max_concurrent_commands: usize,

    #[arg(
        long = "processed-event-cap",
        env = "RUNBOT_PROCESSED_EVENT_CAP",
        default_value_t = 4_096,
        value_parser = parse_positive_usize,
        help = "Maximum processed event ids to retain for duplicate delivery protection"
    )]
    pub(crate) processed_event_cap: usize,

    #[arg(
        long = "max-reply-chars",
        env = "RUNBOT_MAX_REPLY_CHARS",
        default_value_t = 4_000,
        value_parser = parse_positive_usize,
        help = "Replies longer than this many characters are truncated"
    )]
    pub(crate) max_reply_chars: usize,

    #[arg(
        long = "mentions-only",
        env = "RUNBOT_MENTIONS_ONLY",
        action = ArgAction::SetTrue,
        help = "Only answer notes that tag the bot's public key"
    )]
    pub(crate) mentions_only: bool,

    #[arg(
        long = "reconnect-delay-ms",
        env = "RUNBOT_RECONNECT_DELAY_MS",
        default_value_t = 5_000,
        help = "Delay before reconnecting after the relay connection drops"
    )]
    pub(crate) reconnect_delay_ms: u64,
}

impl Cli {
    pub(crate) fn piston_config(&self) -> PistonConfig {
        PistonConfig {
            api_base: self.piston_url.clone(),
            request_timeout_ms: self.request_timeout_ms,
            retry: RetryPolicy {
                max_attempts: self.retry_max_attempts,
                ..RetryPolicy::default()
            },
        }
    }

    pub(crate) fn runtime_config(&self) -> BotRuntimeConfig {
        BotRuntimeConfig {
            compile_timeout_ms: self.compile_timeout_ms,
            run_timeout_ms: self.run_timeout_ms,
            max_hops: self.max_hops,
            resolution_timeout: (self.resolution_timeout_ms > 0)
                .then(|| Duration::from_millis(self.resolution_timeout_ms)),
            max_concurrent_commands: self.max_concurrent_commands,
            processed_event_cap: self.processed_event_cap,
            max_reply_chars: self.max_reply_chars,
            mentions_only: self.mentions_only,
        }
    }

    pub(crate) fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
