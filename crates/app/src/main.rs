use clap::Parser;
use services::{AppServices, Clock};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod config;
mod prompt;
mod take;

use crate::cli::Cli;
use crate::config::{DEFAULT_LOG_FILTER, PortalConfig, prepare_sqlite_file};
use crate::prompt::Prompt;

fn init_tracing(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = PortalConfig::from_env()?.apply_overrides(&cli)?;
    init_tracing(&config.log_filter);
    debug!(api_url = %config.api_url, db_url = %config.db_url, "configuration loaded");

    // Local storage only holds the auth session; open it before touching the network.
    prepare_sqlite_file(&config.db_url)?;
    let mut services = AppServices::new(&config.api()?, &config.db_url, Clock::default_clock()).await?;

    let mut prompt = Prompt::stdin();
    commands::dispatch(&mut services, cli.command, &mut prompt).await
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
