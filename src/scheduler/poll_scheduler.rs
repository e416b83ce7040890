use crate::aggregator::{ConsolidatedReport, LogProcessor};
use crate::error::{CycleError, WriteError};
use crate::links::LinkSource;
use crate::monitoring::{CycleMonitor, CycleOutcome};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Runs poll cycles on a fixed interval until stopped
///
/// The first cycle runs as soon as the scheduler starts. Cycles run inline in
/// a single task, so a slow cycle delays the next tick instead of overlapping
/// it; ticks missed meanwhile are skipped.
pub struct PollScheduler {
    runner: CycleRunner,
    interval: Duration,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// State shared between the scheduler handle and its task
#[derive(Clone)]
struct CycleRunner {
    processor: Arc<LogProcessor>,
    links: Arc<dyn LinkSource>,
    in_progress: Arc<AtomicBool>,
    monitor: CycleMonitor,
}

/// Clears the in-progress flag when a cycle ends, including by panic
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PollScheduler {
    /// Create a new PollScheduler
    ///
    /// # Arguments
    ///
    /// * `processor` - Processes the loaded items and writes the report
    /// * `links` - Source of link items, consulted at the start of every cycle
    /// * `interval` - Time between cycle starts; must be non-zero
    pub fn new(processor: LogProcessor, links: Arc<dyn LinkSource>, interval: Duration) -> Self {
        Self {
            runner: CycleRunner {
                processor: Arc::new(processor),
                links,
                in_progress: Arc::new(AtomicBool::new(false)),
                monitor: CycleMonitor::new(),
            },
            interval,
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    /// Stop together with `parent`: cancelling it also stops this scheduler
    pub fn with_parent(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    /// Use an existing monitor instead of a fresh one
    pub fn with_monitor(mut self, monitor: CycleMonitor) -> Self {
        self.runner.monitor = monitor;
        self
    }

    pub fn monitor(&self) -> &CycleMonitor {
        &self.runner.monitor
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Create the output directory and spawn the polling task
    ///
    /// Calling `start` on a running or stopped scheduler does nothing.
    ///
    /// # Errors
    ///
    /// Returns `WriteError` if the output directory cannot be created.
    pub async fn start(&mut self) -> Result<(), WriteError> {
        if self.handle.is_some() || self.cancel.is_cancelled() {
            warn!("Scheduler already started, ignoring start request");
            return Ok(());
        }

        self.runner.processor.writer().ensure_dir().await?;

        let runner = self.runner.clone();
        let cancel = self.cancel.clone();
        let period = self.interval;

        info!("Starting poll scheduler with interval {:?}", period);

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Poll scheduler received cancellation");
                        break;
                    }
                    _ = ticker.tick() => {
                        runner.run_once().await;
                    }
                }
            }
        }));

        Ok(())
    }

    /// Stop scheduling and wait for the task to exit
    ///
    /// A cycle already in flight runs to completion; no cycle starts after
    /// this returns.
    pub async fn stop(&mut self) {
        self.cancel.cancel();

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("Poll scheduler task ended abnormally: {}", e);
            }
            info!("Poll scheduler stopped");
        }
    }

    /// Run one cycle now, unless another cycle is in flight
    pub async fn run_once(&self) -> CycleOutcome {
        self.runner.run_once().await
    }
}

impl CycleRunner {
    async fn run_once(&self) -> CycleOutcome {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Previous poll cycle still running, skipping this one");
            self.monitor.record_skipped();
            return CycleOutcome::Skipped;
        }
        let _guard = InFlightGuard(&self.in_progress);

        let timer = self.monitor.start_cycle();
        match self.run_cycle().await {
            Ok(report) => {
                timer.complete(&report.summary);
                CycleOutcome::Completed
            }
            Err(e) => {
                error!("Poll cycle failed: {}", e);
                timer.fail(&e);
                CycleOutcome::Failed
            }
        }
    }

    async fn run_cycle(&self) -> Result<ConsolidatedReport, CycleError> {
        let items = self.links.load()?;
        debug!("Polling {} link items", items.len());
        self.processor.process_links(&items).await
    }
}
