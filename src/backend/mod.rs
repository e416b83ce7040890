//! Log search backend contract and the paginated fetch client built on it

/// Paginated fetch with result cap and normalization
pub mod client;

/// Datadog Logs v2 search backend
pub mod datadog;

/// Scripted backend for tests and local development
pub mod mock;

pub use client::{LogFetchClient, PAGE_SIZE};
pub use datadog::DatadogBackend;
pub use mock::MockBackend;

use crate::error::BackendError;
use crate::events::NormalizedLogRecord;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;

/// One page request against the log search API
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    /// Window start, ISO-8601
    pub from: String,
    /// Window end, ISO-8601
    pub to: String,
    pub limit: usize,
    /// Cursor returned with the previous page; `None` for the first page
    pub cursor: Option<String>,
}

/// One page of results and the cursor for the next one, if any
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub records: Vec<RawLog>,
    pub next_cursor: Option<String>,
}

/// Log entry as returned by the search API
///
/// Field types are not trusted: scalar values of the wrong type are
/// stringified and anything else reads as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawLog {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: Option<RawLogAttributes>,
}

/// Attribute block of a [`RawLog`]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawLogAttributes {
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub service: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub ddsource: Option<String>,
    #[serde(default, deserialize_with = "lenient_tags")]
    pub tags: Option<Vec<String>>,
    /// Custom attributes attached to the entry
    #[serde(default, deserialize_with = "lenient_object")]
    pub attributes: Option<Map<String, Value>>,
}

fn scalar_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_string(Value::deserialize(deserializer)?))
}

/// Tags as a list of scalars; a lone scalar becomes a one-element list
fn lenient_tags<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(items.into_iter().filter_map(scalar_string).collect()),
        other => scalar_string(other).map(|tag| vec![tag]),
    })
}

fn lenient_object<'de, D>(deserializer: D) -> Result<Option<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => Some(map),
        _ => None,
    })
}

impl From<RawLog> for NormalizedLogRecord {
    fn from(raw: RawLog) -> Self {
        let attrs = raw.attributes.unwrap_or_default();

        // The custom-attribute ddsource wins over the reserved one when set.
        let nested_ddsource = attrs
            .attributes
            .as_ref()
            .and_then(|custom| custom.get("ddsource"))
            .and_then(Value::as_str)
            .filter(|source| !source.is_empty())
            .map(str::to_string);

        NormalizedLogRecord {
            timestamp: attrs.timestamp,
            status: attrs.status,
            service: attrs.service,
            host: attrs.host,
            message: attrs.message,
            ddsource: nested_ddsource.or(attrs.ddsource),
            tags: attrs.tags.unwrap_or_default(),
        }
    }
}

/// Trait for log search backend implementations
pub trait LogSearchBackend: Send + Sync {
    fn search<'a>(
        &'a self,
        request: &'a SearchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<SearchPage, BackendError>> + Send + 'a>>;
}
