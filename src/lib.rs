pub mod cli;
pub mod core;
pub mod providers;

use crate::cli::fetch::FetchOptions;
use crate::core::config::AppConfig;
use anyhow::Result;
use tracing::{debug, info};

pub enum AppCommand {
    Fetch(FetchOptions),
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("tcsunat starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Fetch(options) => cli::fetch::run(options, &config).await,
    }
}
