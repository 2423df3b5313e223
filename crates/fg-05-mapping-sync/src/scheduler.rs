//! # Sync Scheduler
//!
//! Runs the synchronizer on a fixed interval. Runs never overlap: a tick
//! that arrives while a run is in progress is dropped, and a manual trigger
//! during a run is refused with `AlreadyRunning`.

use crate::domain::{SyncError, SyncReport};
use crate::ports::MappingSyncApi;
use fg_01_communication_log::{CommunicationDetail, CommunicationLogApi, LogOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Plugin name of the synchronizer's log entries.
pub const SYNC_PLUGIN_NAME: &str = "mapping-sync";

/// Clears the in-progress flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Single-flight periodic driver of a `MappingSyncApi`.
pub struct SyncScheduler {
    sync: Arc<dyn MappingSyncApi>,
    interval: Duration,
    running: AtomicBool,
    log: Option<Arc<dyn CommunicationLogApi>>,
}

impl SyncScheduler {
    /// Scheduler running `sync` every `interval`.
    pub fn new(sync: Arc<dyn MappingSyncApi>, interval: Duration) -> Self {
        Self {
            sync,
            interval,
            running: AtomicBool::new(false),
            log: None,
        }
    }

    /// Record each run in `log`.
    pub fn with_log(mut self, log: Arc<dyn CommunicationLogApi>) -> Self {
        self.log = Some(log);
        self
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run once now, unless a run is already in progress.
    ///
    /// ## Errors
    ///
    /// - `AlreadyRunning`: another run has not finished
    /// - whatever the run itself fails with
    pub async fn trigger(&self) -> Result<SyncReport, SyncError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("[fg-05] Run already in progress");
            return Err(SyncError::AlreadyRunning);
        }
        let _guard = RunGuard(&self.running);

        let handle = self.log.as_ref().and_then(|log| {
            let detail = CommunicationDetail::PluginCall {
                plugin: SYNC_PLUGIN_NAME.to_string(),
                function: "run_once".to_string(),
            };
            log.begin("Identifier mapping synchronization", None, detail)
                .map_err(|e| warn!(error = %e, "[fg-05] Cannot log synchronization run"))
                .ok()
        });

        let result = self.sync.run_once().await;

        if let (Some(log), Some(handle)) = (self.log.as_ref(), handle) {
            let outcome = match &result {
                Ok(report) => LogOutcome::success(report.to_string()),
                Err(e) => LogOutcome::failure("Synchronization failed", e.to_string()),
            };
            if let Err(e) = log.complete(handle, outcome) {
                warn!(error = %e, "[fg-05] Cannot complete synchronization log entry");
            }
        }
        result
    }

    /// Tick until `shutdown` changes. The first run starts immediately.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = self.interval.as_secs(), "[fg-05] Sync scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.trigger().await {
                        Ok(report) => debug!(%report, "[fg-05] Scheduled run done"),
                        Err(SyncError::AlreadyRunning) => {}
                        Err(e) => error!(error = %e, "[fg-05] Scheduled run failed"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("[fg-05] Shutdown signal received");
                    break;
                }
            }
        }
    }
}
