use std::sync::Arc;

use anyhow::{Context, Result};
use runbot_commands::LanguageTable;
use runbot_events::{EventSigner, Secp256k1SchnorrSigner};
use runbot_piston::{CodeExecutor, PistonClient};
use runbot_relay::{Relay, RelayClient};
use runbot_runtime::BotRuntime;

use crate::cli_args::Cli;

/// Loads the backend language table, then serves the relay until Ctrl-C,
/// reconnecting after every dropped connection.
pub(crate) async fn run_bot(cli: Cli) -> Result<()> {
    let signer = Secp256k1SchnorrSigner::from_secret_hex(&cli.secret_key)
        .context("invalid --secret-key")?;
    let executor =
        PistonClient::new(cli.piston_config()).context("failed to build execution backend client")?;
    let runtimes = executor
        .runtimes()
        .await
        .with_context(|| format!("failed to load runtimes from {}", cli.piston_url))?;
    let languages = LanguageTable::from_runtimes(&runtimes);
    if languages.is_empty() {
        tracing::warn!("execution backend reported no runtimes");
    }
    tracing::info!(
        runtimes = runtimes.len(),
        bot = signer.public_key_hex(),
        "runbot starting"
    );

    let runtime = BotRuntime::new(
        Arc::new(executor),
        Arc::new(signer),
        Arc::new(languages),
        cli.runtime_config(),
    );
    let reconnect_delay = cli.reconnect_delay();

    loop {
        match RelayClient::connect(&cli.relay_url).await {
            Ok(client) => {
                let relay: Arc<dyn Relay> = Arc::new(client);
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("runbot shutdown requested");
                        return Ok(());
                    }
                    outcome = runtime.run(relay) => match outcome {
                        Ok(()) => tracing::warn!(relay = %cli.relay_url, "relay connection dropped"),
                        Err(error) => tracing::warn!(relay = %cli.relay_url, "relay session failed: {error:#}"),
                    }
                }
            }
            Err(error) => {
                tracing::warn!(relay = %cli.relay_url, "failed to connect to relay: {error}");
            }
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("runbot shutdown requested");
                return Ok(());
            }
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }
}
