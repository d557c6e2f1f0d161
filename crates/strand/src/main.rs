//! `strand` binary: loads settings, initialises logging and runs one command.

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use strand::cli::{self, Cli};
use strand::logging::init_subscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(strand_settings::settings_path);
    let settings = strand_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("failed to load settings: {}", settings_path.display()))?;
    init_subscriber(&settings.logging.level);

    let db_path = cli::resolve_db_path(
        args.db_path.as_deref(),
        &settings,
        &strand_settings::strand_home(),
    );
    tracing::debug!(path = %db_path.display(), "opening database");
    let pool = cli::open_pool(&db_path, &settings)?;

    let output = cli::execute(pool, args.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
