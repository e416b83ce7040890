use crate::error::LinkSourceError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One monitored target as written in the links file
///
/// Every field is optional on the wire; items lacking an org key or a
/// connector name are skipped by the processor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkItem {
    #[serde(default)]
    pub org_key: Option<String>,
    #[serde(default)]
    pub connector_name: Option<String>,
    /// Saved-search URL carrying the query in its `query` parameter
    #[serde(default)]
    pub link: Option<String>,
    /// Explicit query; takes precedence over `link` when non-blank
    #[serde(default)]
    pub query: Option<String>,
}

impl LinkItem {
    /// Org key and connector name, if both are present and non-empty
    pub fn identity(&self) -> Option<(&str, &str)> {
        let org_key = self.org_key.as_deref().filter(|s| !s.is_empty())?;
        let connector_name = self.connector_name.as_deref().filter(|s| !s.is_empty())?;
        Some((org_key, connector_name))
    }

    /// `org/connector` label for log lines, tolerating missing fields
    pub fn label(&self) -> String {
        format!(
            "{}/{}",
            self.org_key.as_deref().unwrap_or("?"),
            self.connector_name.as_deref().unwrap_or("?")
        )
    }
}

/// Supplier of monitoring targets, consulted once per poll cycle
#[cfg_attr(test, mockall::automock)]
pub trait LinkSource: Send + Sync {
    fn load(&self) -> Result<Vec<LinkItem>, LinkSourceError>;
}

/// Link source backed by a JSON file, re-read on every cycle
#[derive(Debug, Clone)]
pub struct FileLinkSource {
    path: PathBuf,
}

impl FileLinkSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LinkSource for FileLinkSource {
    fn load(&self) -> Result<Vec<LinkItem>, LinkSourceError> {
        let raw = std::fs::read_to_string(&self.path)?;
        let items = parse_links(&raw)?;
        debug!("Loaded {} link items from {}", items.len(), self.path.display());
        Ok(items)
    }
}

impl LinkSource for Vec<LinkItem> {
    fn load(&self) -> Result<Vec<LinkItem>, LinkSourceError> {
        Ok(self.clone())
    }
}

/// Parse the contents of a links file
///
/// The document must be a JSON array. Elements that do not have the shape of a
/// [`LinkItem`] are dropped with a warning instead of failing the whole cycle.
///
/// # Errors
///
/// Returns `LinkSourceError::ParseError` for invalid JSON and
/// `LinkSourceError::NotAnArray` when the top-level value is not an array.
pub fn parse_links(raw: &str) -> Result<Vec<LinkItem>, LinkSourceError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let serde_json::Value::Array(entries) = value else {
        return Err(LinkSourceError::NotAnArray);
    };

    let mut items = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<LinkItem>(entry) {
            Ok(item) => items.push(item),
            Err(e) => warn!("Skipping malformed link entry #{}: {}", index, e),
        }
    }

    Ok(items)
}
