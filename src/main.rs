use anyhow::Result;
use clap::{Parser, Subcommand};
use fxfeed::core::config::AppConfig;
use fxfeed::core::log::init_logging;

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

impl From<Commands> for fxfeed::AppCommand {
    fn from(cmd: Commands) -> fxfeed::AppCommand {
        match cmd {
            Commands::Run => fxfeed::AppCommand::Run,
            Commands::Once => fxfeed::AppCommand::Once,
            Commands::History { limit } => fxfeed::AppCommand::History { limit },
            Commands::Show { attempt_id } => fxfeed::AppCommand::Show { attempt_id },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Poll the rates feed until interrupted (default)
    Run,
    /// Fetch and store the feed once, then exit
    Once,
    /// Display the most recent requests
    History {
        /// Number of requests to show
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },
    /// Display the rates stored for a request
    Show {
        /// Request id as listed by `history`
        attempt_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Setup) = cli.command {
        init_logging(cli.verbose, None)?;
        return fxfeed::cli::setup::setup();
    }

    let config = AppConfig::load(cli.config_path.as_deref())?;
    init_logging(cli.verbose, config.log_file.as_deref())?;

    let shutdown_rx = fxfeed::shutdown_on(tokio::signal::ctrl_c());

    let command = cli.command.map_or(fxfeed::AppCommand::Run, Into::into);
    let result = fxfeed::run_command(command, &config, shutdown_rx).await;

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
