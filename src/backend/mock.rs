use super::{LogSearchBackend, RawLog, SearchPage, SearchRequest};
use crate::error::BackendError;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted results for one query
#[derive(Debug, Clone)]
enum Script {
    /// A flat result set paged by the request's limit; the cursor is the next offset
    Logs(Vec<RawLog>),
    /// Explicit pages; a request's cursor selects the page after the one that returned it
    Pages(Vec<SearchPage>),
}

/// Mock backend for testing and development
///
/// Serves scripted results per query, can fail specific pages, and records
/// every request it receives. Queries without a script return an empty page.
#[derive(Default)]
pub struct MockBackend {
    scripts: HashMap<String, Script>,
    failures: HashMap<(String, usize), BackendError>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<SearchRequest>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `logs` for `query`, paged by the request limit
    ///
    /// # Example
    /// ```
    /// use ddwatch::backend::{MockBackend, RawLog};
    ///
    /// let backend = MockBackend::new().with_logs("service:api", vec![RawLog::default(); 3]);
    /// ```
    pub fn with_logs(mut self, query: &str, logs: Vec<RawLog>) -> Self {
        self.scripts.insert(query.to_string(), Script::Logs(logs));
        self
    }

    /// Serve exactly these pages for `query`
    pub fn with_pages(mut self, query: &str, pages: Vec<SearchPage>) -> Self {
        self.scripts.insert(query.to_string(), Script::Pages(pages));
        self
    }

    /// Fail the request for page `page` (0-based) of `query`
    pub fn failing_on_page(mut self, query: &str, page: usize, error: BackendError) -> Self {
        self.failures.insert((query.to_string(), page), error);
        self
    }

    /// Delay every response (useful for overlapping-cycle tests)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the number of times search() has been called
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Requests received so far, in order
    pub fn calls(&self) -> Vec<SearchRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Resolve a request against the script for its query
    fn respond(&self, request: &SearchRequest) -> Result<SearchPage, BackendError> {
        let Some(script) = self.scripts.get(&request.query) else {
            return Ok(SearchPage::default());
        };

        match script {
            Script::Logs(logs) => {
                let offset = match &request.cursor {
                    None => 0,
                    Some(cursor) => cursor.parse::<usize>().map_err(|_| {
                        BackendError::InvalidResponse(format!("Unknown cursor: {}", cursor))
                    })?,
                };
                let limit = request.limit.max(1);
                self.check_failure(&request.query, offset / limit)?;

                let end = (offset + limit).min(logs.len());
                let records = logs.get(offset..end).map(<[RawLog]>::to_vec).unwrap_or_default();
                let next_cursor = (offset + limit < logs.len()).then(|| (offset + limit).to_string());

                Ok(SearchPage {
                    records,
                    next_cursor,
                })
            }
            Script::Pages(pages) => {
                let index = match &request.cursor {
                    None => 0,
                    Some(_) => {
                        pages
                            .iter()
                            .position(|page| page.next_cursor == request.cursor)
                            .ok_or_else(|| {
                                BackendError::InvalidResponse(format!(
                                    "Unknown cursor: {:?}",
                                    request.cursor
                                ))
                            })?
                            + 1
                    }
                };
                self.check_failure(&request.query, index)?;

                Ok(pages.get(index).cloned().unwrap_or_default())
            }
        }
    }

    fn check_failure(&self, query: &str, page: usize) -> Result<(), BackendError> {
        match self.failures.get(&(query.to_string(), page)) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl LogSearchBackend for MockBackend {
    fn search<'a>(
        &'a self,
        request: &'a SearchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<SearchPage, BackendError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(request.clone());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.respond(request)
        })
    }
}
