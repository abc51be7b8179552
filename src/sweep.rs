//! Sweep Coordinator and Background Sweeper
//!
//! Reads hide expired bins lazily but never delete them. If nobody writes to
//! an expired bin again, it would occupy storage forever. The sweep reclaims
//! them eagerly: it scans a namespace/set and runs the module's atomic
//! `clean` function against every record it visits.
//!
//! ## Guarantees
//!
//! - Each record is purged in its own atomic call, so the sweep can run next
//!   to ordinary traffic without extra locking.
//! - A failing record is reported and skipped; the sweep carries on.
//! - Re-running a sweep only removes bins that are still expired, so an
//!   interrupted sweep can simply be started again.
//!
//! ## Adaptive Frequency
//!
//! [`ExpirySweeper`] runs sweeps periodically on a Tokio task. If many
//! records needed purging it sweeps more often; if none did it backs off.

use crate::codec::Value;
use crate::config::{ApplyPolicy, ScanPolicy, SweeperConfig};
use crate::error::{Error, Result};
use crate::executor::function;
use crate::store::{Key, RecordStore, ScanAction};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// Outcome of one sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Records the purge was attempted on
    pub records_scanned: u64,
    /// Records that had at least one bin removed
    pub records_purged: u64,
    /// Total bins removed
    pub bins_purged: u64,
    /// Records whose purge failed, with the reason
    pub failures: Vec<(Key, Error)>,
    /// The sweep was cancelled before the scan finished
    pub cancelled: bool,
}

impl SweepReport {
    /// Returns true if no record failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turns a report with failures into [`Error::PartialSweepFailure`].
    pub fn into_result(self) -> Result<Self> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(Error::PartialSweepFailure {
                failed: self.failures.len(),
                scanned: self.records_scanned,
            })
        }
    }
}

/// Runs purge calls across a collection.
#[derive(Clone)]
pub struct SweepCoordinator {
    store: Arc<dyn RecordStore>,
    module: String,
    policy: ApplyPolicy,
}

impl std::fmt::Debug for SweepCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweepCoordinator")
            .field("module", &self.module)
            .field("policy", &self.policy)
            .finish()
    }
}

impl SweepCoordinator {
    pub fn new(store: Arc<dyn RecordStore>, module: impl Into<String>, policy: ApplyPolicy) -> Self {
        Self {
            store,
            module: module.into(),
            policy,
        }
    }

    /// Sweeps `namespace`/`set`, removing expired bins among `bins`.
    ///
    /// Fails only when the scan itself cannot run; per-record failures end up
    /// in the report.
    pub fn sweep(
        &self,
        scan: &ScanPolicy,
        namespace: &str,
        set: &str,
        bins: &[String],
    ) -> Result<SweepReport> {
        self.run(scan, namespace, set, bins, None)
    }

    /// Like [`sweep`](Self::sweep), but stops issuing purge calls once
    /// `cancel` reads `true`.
    pub fn sweep_until(
        &self,
        scan: &ScanPolicy,
        namespace: &str,
        set: &str,
        bins: &[String],
        cancel: &watch::Receiver<bool>,
    ) -> Result<SweepReport> {
        self.run(scan, namespace, set, bins, Some(cancel))
    }

    fn run(
        &self,
        scan: &ScanPolicy,
        namespace: &str,
        set: &str,
        bins: &[String],
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        if bins.is_empty() {
            debug!(namespace, set, "Sweep skipped, no bins named");
            return Ok(report);
        }

        let args: Vec<Value> = bins.iter().map(|b| Value::from(b.as_str())).collect();
        let mut scan = scan.clone();
        if scan.bin_names.is_empty() {
            scan.bin_names = bins.to_vec();
        }

        debug!(namespace, set, bins = ?bins, "Sweep started");

        self.store.scan(&scan, namespace, set, &mut |key, _record| {
            if cancel.is_some_and(|rx| *rx.borrow()) {
                report.cancelled = true;
                return ScanAction::Stop;
            }

            report.records_scanned += 1;
            match self
                .store
                .execute_atomic(&self.policy, key, &self.module, function::CLEAN, &args)
            {
                Ok(Value::Integer(0)) => {}
                Ok(Value::Integer(n)) if n > 0 => {
                    trace!(key = %key, purged = n, "Expired bins purged");
                    report.records_purged += 1;
                    report.bins_purged += n as u64;
                }
                Ok(other) => {
                    warn!(key = %key, result = %other, "Unexpected purge result");
                    report.failures.push((
                        key.clone(),
                        Error::UnexpectedResponse(format!("clean returned {}", other)),
                    ));
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Purge failed");
                    report.failures.push((key.clone(), e));
                }
            }
            ScanAction::Continue
        })?;

        info!(
            namespace,
            set,
            scanned = report.records_scanned,
            purged_records = report.records_purged,
            purged_bins = report.bins_purged,
            failures = report.failures.len(),
            cancelled = report.cancelled,
            "Sweep finished"
        );

        Ok(report)
    }
}

/// What the background sweeper sweeps.
#[derive(Debug, Clone)]
pub struct SweepTarget {
    pub scan: ScanPolicy,
    pub namespace: String,
    pub set: String,
    pub bins: Vec<String>,
}

impl SweepTarget {
    pub fn new(namespace: impl Into<String>, set: impl Into<String>, bins: &[&str]) -> Self {
        Self {
            scan: ScanPolicy::default(),
            namespace: namespace.into(),
            set: set.into(),
            bins: bins.iter().map(|b| b.to_string()).collect(),
        }
    }
}

/// A handle to the running background sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped. A sweep
/// in progress stops at the next record.
#[derive(Debug)]
pub struct ExpirySweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Starts the sweeper as a background task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        coordinator: Arc<SweepCoordinator>,
        target: SweepTarget,
        config: SweeperConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            namespace = %target.namespace,
            set = %target.set,
            interval_ms = config.base_interval.as_millis(),
            "Background expiry sweeper started"
        );

        tokio::spawn(sweeper_loop(coordinator, target, config, shutdown_rx));

        Self { shutdown_tx }
    }

    /// Stops the sweeper.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if !*self.shutdown_tx.borrow() {
            let _ = self.shutdown_tx.send(true);
            info!("Background expiry sweeper stopped");
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
async fn sweeper_loop(
    coordinator: Arc<SweepCoordinator>,
    target: SweepTarget,
    config: SweeperConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut current_interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(current_interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let sweep_coordinator = Arc::clone(&coordinator);
        let sweep_target = target.clone();
        let cancel = shutdown_rx.clone();

        // Store calls block, keep them off the async workers.
        let outcome = tokio::task::spawn_blocking(move || {
            sweep_coordinator.sweep_until(
                &sweep_target.scan,
                &sweep_target.namespace,
                &sweep_target.set,
                &sweep_target.bins,
                &cancel,
            )
        })
        .await;

        let report = match outcome {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                warn!(error = %e, "Sweep could not run");
                continue;
            }
            Err(e) => {
                warn!(error = %e, "Sweep task failed");
                continue;
            }
        };

        if report.cancelled {
            debug!("Sweep cancelled by shutdown");
            return;
        }

        if report.records_scanned > 0 {
            let purge_rate = report.records_purged as f64 / report.records_scanned as f64;

            if purge_rate > config.speedup_threshold {
                current_interval = (current_interval / 2).max(config.min_interval);
                debug!(
                    purged = report.records_purged,
                    rate = %format!("{:.2}%", purge_rate * 100.0),
                    new_interval_ms = current_interval.as_millis(),
                    "High purge rate, speeding up sweeper"
                );
            } else if purge_rate < config.slowdown_threshold && report.records_purged == 0 {
                current_interval = (current_interval * 2).min(config.max_interval);
                trace!(
                    new_interval_ms = current_interval.as_millis(),
                    "Low purge rate, slowing down sweeper"
                );
            }
        }
    }
}
