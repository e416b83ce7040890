use super::{LogSearchBackend, RawLog, SearchPage, SearchRequest};
use crate::error::BackendError;
use log::warn;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Datadog Logs v2 search backend
///
/// Issues `POST /api/v2/logs/events/search` requests authenticated with an
/// API key and an application key.
pub struct DatadogBackend {
    client: Client,
    api_key: String,
    app_key: String,
    base_url: String,
}

/// Request body for the logs search endpoint
#[derive(Debug, Serialize)]
struct SearchBody<'a> {
    filter: SearchFilter<'a>,
    sort: &'static str,
    page: PageParams<'a>,
}

#[derive(Debug, Serialize)]
struct SearchFilter<'a> {
    query: &'a str,
    from: &'a str,
    to: &'a str,
}

#[derive(Debug, Serialize)]
struct PageParams<'a> {
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
}

/// Response format from the logs search endpoint
///
/// Entries stay untyped until [`DatadogBackend::into_page`] so one malformed
/// entry cannot reject the whole page.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
    #[serde(default)]
    meta: Option<ResponseMeta>,
}

#[derive(Debug, Deserialize)]
struct ResponseMeta {
    #[serde(default)]
    page: Option<ResponsePage>,
}

#[derive(Debug, Deserialize)]
struct ResponsePage {
    #[serde(default)]
    after: Option<String>,
}

/// Error format from the Datadog API
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

impl DatadogBackend {
    /// Create a backend for a Datadog site (e.g. `datadoghq.com`, `datadoghq.eu`)
    ///
    /// # Errors
    ///
    /// Returns `BackendError::HttpError` if the HTTP client cannot be built.
    pub fn new(site: &str, api_key: String, app_key: String) -> Result<Self, BackendError> {
        Self::with_base_url(format!("https://api.{}", site), api_key, app_key)
    }

    /// Create a backend with a custom base URL (proxies, local fakes)
    pub fn with_base_url(
        base_url: String,
        api_key: String,
        app_key: String,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BackendError::HttpError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            app_key,
            base_url,
        })
    }

    /// Format the logs search endpoint URL
    fn api_url(&self) -> String {
        format!(
            "{}/api/v2/logs/events/search",
            self.base_url.trim_end_matches('/')
        )
    }

    fn build_body(request: &SearchRequest) -> SearchBody<'_> {
        SearchBody {
            filter: SearchFilter {
                query: &request.query,
                from: &request.from,
                to: &request.to,
            },
            sort: "timestamp",
            page: PageParams {
                limit: request.limit,
                cursor: request.cursor.as_deref(),
            },
        }
    }

    /// Turn an error response body into a readable message
    fn error_message(body: &str) -> String {
        match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(parsed) if !parsed.errors.is_empty() => parsed.errors.join("; "),
            _ => body.to_string(),
        }
    }

    fn into_page(response: SearchResponse) -> SearchPage {
        let records = response
            .data
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<RawLog>(entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping malformed log entry: {}", e);
                    None
                }
            })
            .collect();

        SearchPage {
            records,
            next_cursor: response
                .meta
                .and_then(|meta| meta.page)
                .and_then(|page| page.after),
        }
    }
}

impl LogSearchBackend for DatadogBackend {
    fn search<'a>(
        &'a self,
        request: &'a SearchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<SearchPage, BackendError>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.api_url())
                .header("DD-API-KEY", &self.api_key)
                .header("DD-APPLICATION-KEY", &self.app_key)
                .json(&Self::build_body(request))
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        BackendError::Timeout
                    } else {
                        BackendError::HttpError(format!("HTTP request failed: {}", e))
                    }
                })?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(BackendError::ApiError {
                    status: status.as_u16(),
                    message: Self::error_message(&error_text),
                });
            }

            let parsed: SearchResponse = response.json().await.map_err(|e| {
                BackendError::InvalidResponse(format!("Failed to parse logs response: {}", e))
            })?;

            Ok(Self::into_page(parsed))
        })
    }
}
