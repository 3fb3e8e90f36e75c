//! Main Entrypoint for the Coach CLI
//!
//! This binary is responsible for:
//! 1. Parsing the command line and loading configuration from the environment.
//! 2. Initializing logging on stderr, leaving stdout for the coach's message.
//! 3. Wiring the session store, tools, and runner.
//! 4. Executing the requested command.

use anyhow::Context;
use clap::Parser;
use coach_service::{
    app::App,
    cli::{Cli, Command},
    config::Config,
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    // Commands that never reach the model do not need an API key.
    let mut config =
        Config::load(cli.command.uses_reasoning()).context("Failed to load configuration")?;
    if let Some(store) = cli.store.clone() {
        config.session_store_path = store;
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    info!(
        provider = ?config.provider,
        store = %config.session_store_path.display(),
        "Configuration loaded"
    );

    // --- 3. Wire the Application ---
    let app = App::build(&config, cli.command.uses_reasoning()).await?;

    // --- 4. Execute ---
    match cli.command {
        Command::Run { user, .. } => {
            let message = app.runner.run(&user).await?;
            println!("{}", message);
        }
        Command::Feedback { user, text } => {
            let message = app.tools.record_feedback(&user, &text).await?;
            println!("{}", message);
        }
        Command::Status { user } => {
            let record = app.store.get(&user).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Reset { user } => {
            app.store.remove(&user).await?;
            println!("Session for {} has been reset.", user);
        }
    }

    Ok(())
}
