mod bootstrap_helpers;
mod bot_launch;
mod cli_args;

use anyhow::Result;
use clap::Parser;

use crate::bootstrap_helpers::init_tracing;
use crate::bot_launch::run_bot;
use crate::cli_args::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run_bot(cli).await
}
