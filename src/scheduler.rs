//! The fetch → parse → persist cycle and the timed loop around it.
use crate::core::{AttemptId, AttemptStatus, RateFeed, RateStore};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Sleeping until the next cycle.
    Idle,
    /// A cycle is in flight.
    Running,
}

/// What a single cycle left behind in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Attempt recorded as `success` with all of its rates.
    Stored { attempt_id: AttemptId, rates: usize },
    /// Fetch or parse failed; `attempt_id` is the `failed` row if it could be written.
    FeedFailed {
        attempt_id: Option<AttemptId>,
        kind: &'static str,
    },
    /// The feed was fine but persisting it was not.
    PersistFailed { attempt_id: Option<AttemptId> },
}

pub struct Poller<'a> {
    feed: &'a dyn RateFeed,
    store: &'a dyn RateStore,
    interval: Duration,
    state: watch::Sender<PollerState>,
}

impl<'a> Poller<'a> {
    pub fn new(feed: &'a dyn RateFeed, store: &'a dyn RateStore, interval: Duration) -> Self {
        let (state, _) = watch::channel(PollerState::Idle);
        Self {
            feed,
            store,
            interval,
            state,
        }
    }

    pub fn state(&self) -> PollerState {
        *self.state.borrow()
    }

    /// Observe state transitions, e.g. to wait for an in-flight cycle.
    pub fn subscribe(&self) -> watch::Receiver<PollerState> {
        self.state.subscribe()
    }

    /// Runs one cycle to completion. Never fails: every error ends up in the
    /// log and, where possible, in the audit table.
    pub async fn run_cycle(&self) -> CycleOutcome {
        self.state.send_replace(PollerState::Running);
        let outcome = self.cycle().await;
        self.state.send_replace(PollerState::Idle);
        outcome
    }

    async fn cycle(&self) -> CycleOutcome {
        let url = self.feed.url();

        let records = match self.feed.fetch_rates().await {
            Ok(records) => records,
            Err(e) => {
                error!(kind = e.kind(), "Fetching rates failed: {e}");
                let attempt_id = self.record_attempt(url, AttemptStatus::Failed).await;
                return CycleOutcome::FeedFailed {
                    attempt_id,
                    kind: e.kind(),
                };
            }
        };

        if records.is_empty() {
            warn!("Feed contained no currencies");
        }

        let Some(attempt_id) = self.record_attempt(url, AttemptStatus::Success).await else {
            error!("Failed to create request record in database");
            return CycleOutcome::PersistFailed { attempt_id: None };
        };

        match self.store.record_rates(attempt_id, &records).await {
            Ok(()) => {
                info!(
                    request_id = attempt_id,
                    "Data successfully saved to database"
                );
                CycleOutcome::Stored {
                    attempt_id,
                    rates: records.len(),
                }
            }
            Err(e) => {
                // The `success` row is already committed and stays without rates.
                error!(request_id = attempt_id, kind = e.kind(), "Failed to save rates: {e}");
                CycleOutcome::PersistFailed {
                    attempt_id: Some(attempt_id),
                }
            }
        }
    }

    async fn record_attempt(&self, url: &str, status: AttemptStatus) -> Option<AttemptId> {
        match self.store.record_attempt(url, status).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!(%status, kind = e.kind(), "Failed to record request: {e}");
                None
            }
        }
    }

    /// Cycles until `shutdown` turns true or its sender is dropped. Shutdown
    /// is only observed between cycles; an in-flight cycle always completes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            url = self.feed.url(),
            "Run service"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            info!("--- ({}) ---", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
            self.run_cycle().await;

            info!(
                "Wait {} seconds until the next request...",
                self.interval.as_secs()
            );
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!("Shutdown channel closed, stopping");
                        break;
                    }
                }
            }
        }

        info!("Service stopped");
    }
}
