//! Tradepoint admin client - command line entry point
//!
//! Loads settings, installs logging and runs one subcommand against the
//! session core.

mod cli;
mod commands;
mod settings;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;

const DEFAULT_LOG_FILTER: &str = "tradepoint=info,warn";

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let loaded = settings::load(cli.config.as_deref())?;
    let settings = settings::finish(loaded, cli.api_url, cli.storage)?;
    tracing::debug!(api = %settings.api_base_url, "settings loaded");

    commands::run(cli.command, &settings).await
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
