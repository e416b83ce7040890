use super::{LogSearchBackend, RawLog, SearchRequest};
use crate::error::BackendError;
use crate::events::{NormalizedLogRecord, TimeWindow};
use log::debug;
use std::sync::Arc;

/// Number of records requested per page
pub const PAGE_SIZE: usize = 100;

/// Paginated log fetch over a [`LogSearchBackend`]
///
/// Walks the backend's cursor until the data runs out or the result cap is
/// reached, then normalizes every collected record.
#[derive(Clone)]
pub struct LogFetchClient {
    backend: Arc<dyn LogSearchBackend>,
}

impl LogFetchClient {
    pub fn new(backend: Arc<dyn LogSearchBackend>) -> Self {
        Self { backend }
    }

    /// Fetch at most `max_results` records matching `query` inside `window`
    ///
    /// Records are requested in ascending timestamp order, [`PAGE_SIZE`] at a
    /// time. Fetching stops at the first empty page, when the cap is reached
    /// (the last page is truncated), or when the response carries no cursor.
    ///
    /// # Errors
    ///
    /// Returns the backend's error as soon as any page request fails; records
    /// from earlier pages are discarded.
    pub async fn fetch_logs(
        &self,
        query: &str,
        window: &TimeWindow,
        max_results: usize,
    ) -> Result<Vec<NormalizedLogRecord>, BackendError> {
        let mut collected: Vec<RawLog> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        while collected.len() < max_results {
            let request = SearchRequest {
                query: query.to_string(),
                from: window.from_iso(),
                to: window.to_iso(),
                limit: PAGE_SIZE,
                cursor: cursor.take(),
            };

            let page = self.backend.search(&request).await?;
            pages += 1;

            if page.records.is_empty() {
                break;
            }

            let remaining = max_results - collected.len();
            collected.extend(page.records.into_iter().take(remaining));

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!(
            "Fetched {} records in {} page(s) for query: {}",
            collected.len(),
            pages,
            query
        );

        Ok(collected.into_iter().map(NormalizedLogRecord::from).collect())
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use chrono::Utc;
    use quickcheck_macros::quickcheck;

    fn fetch(available: usize, max_results: usize) -> (usize, usize) {
        let backend = Arc::new(MockBackend::new().with_logs("q", vec![RawLog::default(); available]));
        let client = LogFetchClient::new(backend.clone());
        let window = TimeWindow::ending_at(Utc::now(), 5).unwrap();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let records = runtime
            .block_on(client.fetch_logs("q", &window, max_results))
            .unwrap();
        (records.len(), backend.call_count())
    }

    #[quickcheck]
    fn prop_never_exceeds_cap(available: u16, max_results: u16) -> bool {
        let available = available as usize % 1000;
        let max_results = max_results as usize % 1000;
        let (returned, _) = fetch(available, max_results);
        returned <= max_results
    }

    #[quickcheck]
    fn prop_fewer_only_when_exhausted(available: u16, max_results: u16) -> bool {
        let available = available as usize % 1000;
        let max_results = max_results as usize % 1000;
        let (returned, _) = fetch(available, max_results);
        returned == available.min(max_results)
    }

    #[quickcheck]
    fn prop_requests_only_needed_pages(available: u16, max_results: u16) -> bool {
        let available = available as usize % 1000;
        let max_results = max_results as usize % 1000;
        let (_, calls) = fetch(available, max_results);
        let wanted = available.min(max_results);
        let expected = if max_results == 0 {
            0
        } else if wanted == 0 {
            1
        } else {
            // The mock omits the cursor on its last page.
            wanted.div_ceil(PAGE_SIZE)
        };
        calls == expected
    }
}
