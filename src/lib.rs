pub mod cli;
pub mod core;
pub mod providers;
pub mod scheduler;
pub mod store;

use crate::core::AttemptId;
use crate::core::config::AppConfig;
use crate::core::store::RateStore;
use crate::providers::CbrProvider;
use crate::scheduler::{CycleOutcome, Poller};
use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Poll the feed until shutdown.
    Run,
    /// Run a single cycle and exit.
    Once,
    History { limit: i64 },
    Show { attempt_id: AttemptId },
}

/// Connects to the database, executes `command` and always releases the
/// connection before returning.
pub async fn run_command(
    command: AppCommand,
    config: &AppConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    debug!("Loaded config: {config:#?}");

    let store = store::connect(&config.database.database_url())
        .await
        .context("Connect to database failed")?;
    let result = dispatch(command, config, store.as_ref(), shutdown).await;
    store.close().await;
    result
}

/// Returns a receiver that turns true once `signal` resolves. If listening
/// fails the sender is held forever, so the service keeps running.
pub fn shutdown_on<F>(signal: F) -> watch::Receiver<bool>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => {
                info!("Shutdown requested, finishing current cycle");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!("Unable to listen for shutdown signal: {e}");
                let _sender = shutdown_tx;
                std::future::pending::<()>().await;
            }
        }
    });
    shutdown_rx
}

async fn dispatch(
    command: AppCommand,
    config: &AppConfig,
    store: &dyn RateStore,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    match command {
        AppCommand::Run | AppCommand::Once => {
            store
                .ensure_schema()
                .await
                .context("Failed to create tables")?;

            let feed = CbrProvider::new(&config.api_url, config.api_timeout())
                .context("Failed to build HTTP client")?;
            let poller = Poller::new(&feed, store, config.fetch_interval());

            if command == AppCommand::Once {
                match poller.run_cycle().await {
                    CycleOutcome::Stored { attempt_id, rates } => {
                        info!(request_id = attempt_id, rates, "Cycle finished");
                    }
                    outcome => anyhow::bail!("Cycle did not store rates: {outcome:?}"),
                }
            } else {
                poller.run(shutdown).await;
            }
            Ok(())
        }
        AppCommand::History { limit } => cli::history::display_history(store, limit).await,
        AppCommand::Show { attempt_id } => cli::history::display_rates(store, attempt_id).await,
    }
}
