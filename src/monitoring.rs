//! Self-monitoring of poll cycles
//!
//! Tracks when the last cycle ran, how long it took, how it ended and what it
//! found, plus running counters. The `/health` endpoint serves a snapshot.

use crate::aggregator::Summary;
use crate::events::{serialize_iso, Timestamp};
use chrono::Utc;
use log::{debug, warn};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Consecutive failures after which every further failure is logged as a warning
const FAILURE_WARN_THRESHOLD: u64 = 3;

/// How a cycle that actually ran ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    /// The report was written
    Completed,
    /// Loading links, the window or writing the report failed
    Failed,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&CycleOutcome::from(*self), f)
    }
}

/// How a poll attempt ended, including attempts that never ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleOutcome {
    Completed,
    Failed,
    /// Another cycle was still in flight
    Skipped,
}

impl From<RunOutcome> for CycleOutcome {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Completed => CycleOutcome::Completed,
            RunOutcome::Failed => CycleOutcome::Failed,
        }
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::Completed => write!(f, "completed"),
            CycleOutcome::Failed => write!(f, "failed"),
            CycleOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

/// Details of the most recent cycle that actually ran
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CycleRecord {
    #[serde(serialize_with = "serialize_iso")]
    pub started_at: Timestamp,
    pub duration_ms: u64,
    pub outcome: RunOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_errors: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_links: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_links: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Point-in-time view of the monitor
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    pub last_cycle: Option<CycleRecord>,
    pub completed_cycles: u64,
    pub failed_cycles: u64,
    pub skipped_cycles: u64,
    pub consecutive_failures: u64,
}

/// Shared, cloneable cycle monitor
///
/// Clones observe and update the same state.
#[derive(Debug, Clone, Default)]
pub struct CycleMonitor {
    state: Arc<Mutex<MonitorSnapshot>>,
}

impl CycleMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing a cycle
    pub fn start_cycle(&self) -> CycleTimer {
        CycleTimer {
            started_at: Utc::now(),
            start_time: Instant::now(),
            monitor: self.clone(),
        }
    }

    /// Count a cycle that did not run because another was in flight
    pub fn record_skipped(&self) {
        let mut state = self.state.lock().unwrap();
        state.skipped_cycles += 1;
        debug!("Cycle skipped, total skipped: {}", state.skipped_cycles);
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        self.state.lock().unwrap().clone()
    }

    fn record(&self, record: CycleRecord) {
        let mut state = self.state.lock().unwrap();

        match record.outcome {
            RunOutcome::Completed => {
                state.completed_cycles += 1;
                state.consecutive_failures = 0;
            }
            RunOutcome::Failed => {
                state.failed_cycles += 1;
                state.consecutive_failures += 1;
                if state.consecutive_failures >= FAILURE_WARN_THRESHOLD {
                    warn!(
                        "{} consecutive poll cycles have failed",
                        state.consecutive_failures
                    );
                }
            }
        }

        debug!("Cycle {} in {}ms", record.outcome, record.duration_ms);
        state.last_cycle = Some(record);
    }
}

/// Measures one cycle and records it on the monitor when finished
pub struct CycleTimer {
    started_at: Timestamp,
    start_time: Instant,
    monitor: CycleMonitor,
}

impl CycleTimer {
    fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Record a cycle that wrote its report
    pub fn complete(self, summary: &Summary) {
        let record = CycleRecord {
            started_at: self.started_at,
            duration_ms: self.elapsed_ms(),
            outcome: RunOutcome::Completed,
            total_errors: Some(summary.total_errors),
            processed_links: Some(summary.processed_links),
            failed_links: Some(summary.failed_links),
            error: None,
        };
        self.monitor.record(record);
    }

    /// Record a cycle that failed as a whole
    pub fn fail(self, error: &dyn fmt::Display) {
        let record = CycleRecord {
            started_at: self.started_at,
            duration_ms: self.elapsed_ms(),
            outcome: RunOutcome::Failed,
            total_errors: None,
            processed_links: None,
            failed_links: None,
            error: Some(error.to_string()),
        };
        self.monitor.record(record);
    }
}
