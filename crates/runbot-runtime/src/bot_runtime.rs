use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use runbot_commands::{
    build_script, command_kind, compose_reply_post, format_execution_result, parse_rerun_command,
    parse_run_command, render_help_text, render_language_list, render_malformed_command,
    render_rerun_not_found, CommandKind, LanguageTable, ParsedCommand, RerunRequest,
};
use runbot_core::{clamp_to_now, current_unix_timestamp, truncate_for_reply};
use runbot_events::{Event, EventSigner, Filter, KIND_TEXT_NOTE};
use runbot_piston::{CodeExecutor, ExecuteRequest};
use runbot_relay::{resolve_source_run_event, Relay, SubscriptionMessage};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::ProcessedEventCache;

/// Version requested for languages missing from the runtime table; the backend
/// then reports the unknown language itself.
const ANY_VERSION: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Runtime configuration for the command dispatcher.
pub struct BotRuntimeConfig {
    pub compile_timeout_ms: u64,
    pub run_timeout_ms: u64,
    pub max_hops: usize,
    pub resolution_timeout: Option<Duration>,
    pub max_concurrent_commands: usize,
    pub processed_event_cap: usize,
    pub max_reply_chars: usize,
    pub mentions_only: bool,
}

impl Default for BotRuntimeConfig {
    fn default() -> Self {
        Self {
            compile_timeout_ms: 10_000,
            run_timeout_ms: 3_000,
            max_hops: 8,
            resolution_timeout: None,
            max_concurrent_commands: 4,
            processed_event_cap: 4_096,
            max_reply_chars: 4_000,
            mentions_only: false,
        }
    }
}

#[derive(Clone)]
/// Dispatches `/run` and `/rerun` notes from a relay to the execution backend.
///
/// Cloning is cheap and clones share the processed-event cache, so one runtime
/// can serve successive relay connections without handling an event twice.
pub struct BotRuntime {
    executor: Arc<dyn CodeExecutor>,
    signer: Arc<dyn EventSigner>,
    languages: Arc<LanguageTable>,
    config: BotRuntimeConfig,
    processed: Arc<Mutex<ProcessedEventCache>>,
    resume_since: Arc<AtomicU64>,
}

impl BotRuntime {
    pub fn new(
        executor: Arc<dyn CodeExecutor>,
        signer: Arc<dyn EventSigner>,
        languages: Arc<LanguageTable>,
        config: BotRuntimeConfig,
    ) -> Self {
        let processed = ProcessedEventCache::new(config.processed_event_cap);
        Self {
            executor,
            signer,
            languages,
            config,
            processed: Arc::new(Mutex::new(processed)),
            resume_since: Arc::new(AtomicU64::new(current_unix_timestamp())),
        }
    }

    pub fn public_key_hex(&self) -> &str {
        self.signer.public_key_hex()
    }

    /// Live command feed: text notes newer than the latest accepted command.
    pub fn subscription_filter(&self) -> Filter {
        let filter = Filter::new()
            .kind(KIND_TEXT_NOTE)
            .since(self.resume_since.load(Ordering::Relaxed));
        if self.config.mentions_only {
            filter.pubkey_ref(self.signer.public_key_hex())
        } else {
            filter
        }
    }

    /// Serves commands from `relay` until its command subscription ends.
    ///
    /// Returns `Ok(())` when the connection goes away and an error when the
    /// relay refuses or closes the subscription. In-flight commands are awaited
    /// before returning.
    pub async fn run(&self, relay: Arc<dyn Relay>) -> Result<()> {
        let mut subscription = relay
            .subscribe(vec![self.subscription_filter()])
            .await
            .context("failed to subscribe to command notes")?;
        tracing::info!(
            subscription = subscription.id(),
            bot = self.public_key_hex(),
            "listening for commands"
        );

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_commands.max(1)));
        let mut tasks = JoinSet::new();
        let outcome = loop {
            let Some(message) = subscription.recv().await else {
                tracing::info!("relay connection ended");
                break Ok(());
            };
            let event = match message {
                SubscriptionMessage::Event(event) => event,
                SubscriptionMessage::EndOfStoredEvents => {
                    tracing::debug!("caught up with stored command notes");
                    continue;
                }
                SubscriptionMessage::Closed(message) => {
                    break Err(anyhow!("relay closed the command subscription: {message}"));
                }
            };
            if !self.accept_event(&event)? {
                continue;
            }

            let permit = permits
                .clone()
                .acquire_owned()
                .await
                .context("command semaphore closed")?;
            let runtime = self.clone();
            let relay = relay.clone();
            tasks.spawn(async move {
                let _permit = permit;
                if let Err(error) = runtime.handle_event(relay.as_ref(), &event).await {
                    tracing::warn!(event = %event.id, "abandoned command: {error:#}");
                }
            });
            while let Some(joined) = tasks.try_join_next() {
                log_task_outcome(joined);
            }
        };

        subscription.close();
        while let Some(joined) = tasks.join_next().await {
            log_task_outcome(joined);
        }
        outcome
    }

    /// Applies the feed rules and records the event as processed when it is accepted.
    fn accept_event(&self, event: &Event) -> Result<bool> {
        if event.kind != KIND_TEXT_NOTE || command_kind(&event.content).is_none() {
            return Ok(false);
        }
        let bot = self.public_key_hex();
        if event.pubkey == bot {
            tracing::debug!(event = %event.id, "skipping own note");
            return Ok(false);
        }
        if self.config.mentions_only && !event.pubkey_references().contains(&bot) {
            return Ok(false);
        }

        let fresh = self
            .processed
            .lock()
            .map_err(|_| anyhow!("processed event cache lock is poisoned"))?
            .mark_processed(&event.id);
        if !fresh {
            tracing::debug!(event = %event.id, "skipping duplicate command");
            return Ok(false);
        }
        self.resume_since
            .fetch_max(clamp_to_now(event.created_at), Ordering::Relaxed);
        Ok(true)
    }

    /// Answers one command note and publishes the reply.
    pub async fn handle_event(&self, relay: &dyn Relay, event: &Event) -> Result<Event> {
        let reply_text = match command_kind(&event.content) {
            Some(CommandKind::Run) => self.run_command_reply(&event.content, None).await?,
            Some(CommandKind::Rerun) => self.rerun_command_reply(relay, event).await?,
            None => return Err(anyhow!("event {} carries no command", event.id)),
        };
        let reply_text = truncate_for_reply(&reply_text, self.config.max_reply_chars);
        let reply = compose_reply_post(&reply_text, event, self.signer.as_ref())
            .context("failed to sign reply")?;
        relay
            .publish(&reply)
            .await
            .with_context(|| format!("failed to publish reply to {}", event.id))?;
        tracing::info!(event = %event.id, reply = %reply.id, "command handled");
        Ok(reply)
    }

    async fn run_command_reply(
        &self,
        content: &str,
        overrides: Option<RerunRequest>,
    ) -> Result<String> {
        let (language, args, code, stdin) = match parse_run_command(content) {
            Some(ParsedCommand::Help) => return Ok(render_help_text()),
            Some(ParsedCommand::List) => return Ok(render_language_list(&self.languages)),
            Some(ParsedCommand::Run {
                language,
                args,
                code,
                stdin,
            }) if !language.is_empty() => (language, args, code, stdin),
            _ => return Ok(render_malformed_command()),
        };
        let (args, stdin) = match overrides {
            Some(RerunRequest { args, stdin }) => (args, stdin),
            None => (args, stdin),
        };

        let (backend_language, version) = match self.languages.resolve(&language) {
            Some(entry) => (entry.language.clone(), entry.version.clone()),
            None => (language.clone(), ANY_VERSION.to_string()),
        };
        let request = ExecuteRequest {
            language: backend_language,
            version,
            files: vec![build_script(&code, &self.languages, &language)],
            args,
            stdin,
            compile_timeout: self.config.compile_timeout_ms,
            run_timeout: self.config.run_timeout_ms,
        };
        tracing::debug!(
            language = %request.language,
            version = %request.version,
            args = request.args.len(),
            "executing submitted code"
        );
        let result = self
            .executor
            .execute(request)
            .await
            .with_context(|| format!("failed to execute {language} code"))?;
        Ok(format_execution_result(&result))
    }

    async fn rerun_command_reply(&self, relay: &dyn Relay, event: &Event) -> Result<String> {
        let request = parse_rerun_command(&event.content);
        let mut log_hop = |hop: usize, ancestor: &Event| {
            tracing::debug!(rerun = %event.id, hop, ancestor = %ancestor.id, "followed reply chain");
        };
        let resolution =
            resolve_source_run_event(relay, event, self.config.max_hops, Some(&mut log_hop));
        let resolved = match self.config.resolution_timeout {
            Some(limit) => match tokio::time::timeout(limit, resolution).await {
                Ok(resolved) => resolved,
                Err(_) => {
                    tracing::warn!(rerun = %event.id, ?limit, "reply chain resolution timed out");
                    return Ok(render_rerun_not_found());
                }
            },
            None => resolution.await,
        }
        .with_context(|| format!("failed to resolve the source of {}", event.id))?;

        match resolved.filter(Event::has_valid_id) {
            Some(source) => self.run_command_reply(&source.content, Some(request)).await,
            None => Ok(render_rerun_not_found()),
        }
    }
}

fn log_task_outcome(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(error) = joined {
        tracing::warn!("command task failed: {error}");
    }
}
