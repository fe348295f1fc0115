use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use tcsunat::cli::fetch::{FetchOptions, OutputFormat};
use tcsunat::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Fetch the SUNAT USD to PEN exchange rate
    Fetch {
        /// Date of the rate as YYYY-MM-DD, defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// API bearer token
        #[arg(short, long, env = "SUNAT_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
}

impl From<Commands> for tcsunat::AppCommand {
    fn from(cmd: Commands) -> tcsunat::AppCommand {
        match cmd {
            Commands::Fetch {
                date,
                token,
                timeout,
                format,
            } => tcsunat::AppCommand::Fetch(FetchOptions {
                date,
                token,
                timeout_secs: timeout,
                format,
            }),
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => tcsunat::cli::setup::setup(),
        Some(cmd) => tcsunat::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
