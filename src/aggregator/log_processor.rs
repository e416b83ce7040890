use super::summary::{ConsolidatedReport, LinkResult, Summary};
use crate::backend::LogFetchClient;
use crate::error::{BackendError, CycleError};
use crate::events::{TimeWindow, Timestamp};
use crate::links::{resolve_connector_name, resolve_query, LinkItem};
use crate::output::ReportWriter;
use chrono::Utc;
use log::{debug, error, info, warn};

/// Runs one poll cycle over a list of link items
///
/// Every target shares a single time window computed when the cycle starts.
/// Targets are fetched one after another; a failing target is counted and
/// logged without affecting the others. Each fetched target gets its own raw
/// report as soon as it completes. The merged report is written once, after
/// the last target, even when it holds no errors.
pub struct LogProcessor {
    client: LogFetchClient,
    writer: ReportWriter,
    window_minutes: u64,
    max_logs_per_query: usize,
}

impl LogProcessor {
    /// Create a new LogProcessor
    ///
    /// # Arguments
    ///
    /// * `client` - Fetch client wrapping the log search backend
    /// * `writer` - Destination of the consolidated report
    /// * `window_minutes` - Length of the search window ending at cycle start
    /// * `max_logs_per_query` - Cap on records fetched per target
    pub fn new(
        client: LogFetchClient,
        writer: ReportWriter,
        window_minutes: u64,
        max_logs_per_query: usize,
    ) -> Self {
        Self {
            client,
            writer,
            window_minutes,
            max_logs_per_query,
        }
    }

    pub fn writer(&self) -> &ReportWriter {
        &self.writer
    }

    /// Process all items with a window ending now and write the report
    pub async fn process_links(&self, items: &[LinkItem]) -> Result<ConsolidatedReport, CycleError> {
        self.process_links_at(items, Utc::now()).await
    }

    /// Process all items with a window ending at `now` and write the report
    ///
    /// # Errors
    ///
    /// Returns `CycleError::Window` when the window cannot end at `now` and
    /// `CycleError::Write` when the report cannot be persisted. Per-target
    /// failures are folded into `summary.failedLinks`.
    pub async fn process_links_at(
        &self,
        items: &[LinkItem],
        now: Timestamp,
    ) -> Result<ConsolidatedReport, CycleError> {
        let window = TimeWindow::ending_at(now, self.window_minutes)?;
        let report = self.build_report(items, window).await;

        let path = self.writer.write(&report).await?;
        info!(
            "Consolidated {} errors from {} integrations",
            report.summary.total_errors, report.summary.processed_links
        );
        info!("Saved to: {}", path.display());

        Ok(report)
    }

    /// Fetch every item and merge the results
    ///
    /// Only the per-target raw reports are written here; a target whose raw
    /// report cannot be written still counts as processed.
    pub async fn build_report(&self, items: &[LinkItem], window: TimeWindow) -> ConsolidatedReport {
        let mut summary = Summary::default();
        let mut errors = Vec::new();

        for item in items {
            match self.process_link_item(item, &window).await {
                Ok(Some(result)) => {
                    self.write_target(&result).await;
                    summary.record_success(&result);
                    errors.extend(result.into_entries());
                }
                Ok(None) => {}
                Err(e) => {
                    summary.record_failure();
                    error!("[fail] {}: {}", item.label(), e);
                }
            }
        }

        ConsolidatedReport {
            generated_at: Utc::now(),
            window_minutes: self.window_minutes,
            time_range: window,
            summary,
            errors,
        }
    }

    async fn write_target(&self, result: &LinkResult) {
        let report = result.target_report(Utc::now(), self.window_minutes);
        match self.writer.write_target(&report).await {
            Ok(path) => debug!("Saved raw logs to: {}", path.display()),
            Err(e) => warn!(
                "Failed to save raw logs for {}/{}: {}",
                result.org_key, result.raw_connector_name, e
            ),
        }
    }

    /// Resolve and fetch a single target
    ///
    /// Returns `Ok(None)` when the item is skipped: it lacks an org key or a
    /// connector name, or it has no query to run.
    pub async fn process_link_item(
        &self,
        item: &LinkItem,
        window: &TimeWindow,
    ) -> Result<Option<LinkResult>, BackendError> {
        let Some((org_key, connector_name)) = item.identity() else {
            warn!("Skipping item without orgKey/connectorName: {:?}", item);
            return Ok(None);
        };

        let raw_connector_name = connector_name.to_string();
        let connector_name = resolve_connector_name(connector_name);

        let Some(query) = resolve_query(item) else {
            warn!("Skipping item without query/link: {}", item.label());
            return Ok(None);
        };

        let logs = self
            .client
            .fetch_logs(&query, window, self.max_logs_per_query)
            .await?;

        info!("[ok] {}/{} -> {} logs", org_key, connector_name, logs.len());

        Ok(Some(LinkResult {
            org_key: org_key.to_string(),
            connector_name,
            raw_connector_name,
            logs,
            query,
            original_link: item.link.clone(),
        }))
    }
}
