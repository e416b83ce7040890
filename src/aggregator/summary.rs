//! Per-target results, the cycle summary and the consolidated report
//!
//! The summary is a pure reduction over [`LinkResult`]s: counters only grow
//! within a cycle and every cycle starts from [`Summary::default`].

use crate::events::{serialize_iso, ErrorEntry, NormalizedLogRecord, TimeWindow, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of a successful fetch for one target
#[derive(Debug, Clone, PartialEq)]
pub struct LinkResult {
    pub org_key: String,
    /// Display name after the connector-name policy
    pub connector_name: String,
    /// Connector name exactly as listed in the links file
    pub raw_connector_name: String,
    pub logs: Vec<NormalizedLogRecord>,
    /// Query actually sent to the backend
    pub query: String,
    pub original_link: Option<String>,
}

impl LinkResult {
    /// Raw per-target view of this result
    pub fn target_report(&self, generated_at: Timestamp, window_minutes: u64) -> TargetReport<'_> {
        TargetReport {
            org_key: &self.org_key,
            connector_name: &self.raw_connector_name,
            generated_at,
            window_minutes,
            query: &self.query,
            count: self.logs.len(),
            items: &self.logs,
        }
    }

    /// Tag every record with this target's identity
    pub fn into_entries(self) -> Vec<ErrorEntry> {
        let LinkResult {
            org_key,
            connector_name,
            logs,
            original_link,
            ..
        } = self;

        logs.into_iter()
            .map(|record| ErrorEntry {
                record,
                org_key: org_key.clone(),
                connector_name: connector_name.clone(),
                datadog_link: original_link.clone(),
            })
            .collect()
    }
}

/// Raw records of one target, written next to the consolidated report
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetReport<'a> {
    pub org_key: &'a str,
    pub connector_name: &'a str,
    #[serde(serialize_with = "serialize_iso")]
    pub generated_at: Timestamp,
    pub window_minutes: u64,
    pub query: &'a str,
    pub count: usize,
    pub items: &'a [NormalizedLogRecord],
}

/// Grouped counts for one poll cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_errors: usize,
    pub by_org: BTreeMap<String, usize>,
    pub by_integration: BTreeMap<String, usize>,
    pub by_status: BTreeMap<String, usize>,
    pub processed_links: usize,
    pub failed_links: usize,
}

impl Summary {
    /// Count a successfully fetched target, including one with no records
    pub fn record_success(&mut self, result: &LinkResult) {
        self.processed_links += 1;

        let count = result.logs.len();
        if count == 0 {
            return;
        }

        self.total_errors += count;
        *self.by_org.entry(result.org_key.clone()).or_insert(0) += count;
        *self
            .by_integration
            .entry(result.connector_name.clone())
            .or_insert(0) += count;

        for log in &result.logs {
            *self.by_status.entry(log.status_key().to_string()).or_insert(0) += 1;
        }
    }

    /// Count a target whose fetch failed
    pub fn record_failure(&mut self) {
        self.failed_links += 1;
    }
}

/// The consolidated artifact written at the end of every cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedReport {
    #[serde(serialize_with = "serialize_iso")]
    pub generated_at: Timestamp,
    pub window_minutes: u64,
    pub time_range: TimeWindow,
    pub summary: Summary,
    pub errors: Vec<ErrorEntry>,
}
