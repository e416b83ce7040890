//! Persistence of the consolidated report and the per-target raw reports
//!
//! Every file is written to a temporary file next to it and then renamed over
//! `errors.json`, so readers never observe a half-written file. The per-target
//! files live in `<data_dir>/<orgKey>/<connectorName>/errors.json`.

use crate::aggregator::{ConsolidatedReport, TargetReport};
use crate::error::WriteError;
use log::debug;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// File name of the consolidated report inside the data directory
pub const REPORT_FILE_NAME: &str = "errors.json";

const TEMP_FILE_NAME: &str = ".errors.json.tmp";

/// Writes [`ConsolidatedReport`]s into a data directory
#[derive(Debug, Clone)]
pub struct ReportWriter {
    data_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Full path of the report file
    pub fn report_path(&self) -> PathBuf {
        self.data_dir.join(REPORT_FILE_NAME)
    }

    /// Create the data directory (and parents) if missing
    pub async fn ensure_dir(&self) -> Result<(), WriteError> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        Ok(())
    }

    /// Directory holding the raw report of one target
    ///
    /// Both names are reduced to a single safe path component first.
    pub fn target_dir(&self, org_key: &str, connector_name: &str) -> PathBuf {
        self.data_dir
            .join(path_component(org_key))
            .join(path_component(connector_name))
    }

    /// Replace the report file with `report`
    ///
    /// # Errors
    ///
    /// Returns `WriteError` if serialization, the temporary write or the rename fails.
    /// A failed write leaves the previous report untouched.
    pub async fn write(&self, report: &ConsolidatedReport) -> Result<PathBuf, WriteError> {
        self.write_json(&self.data_dir, report).await
    }

    /// Replace the raw report of one target, creating its directory if needed
    pub async fn write_target(&self, report: &TargetReport<'_>) -> Result<PathBuf, WriteError> {
        let dir = self.target_dir(report.org_key, report.connector_name);
        self.write_json(&dir, report).await
    }

    async fn write_json<T: Serialize>(&self, dir: &Path, value: &T) -> Result<PathBuf, WriteError> {
        tokio::fs::create_dir_all(dir).await?;

        let json = serde_json::to_vec_pretty(value)?;
        let tmp_path = dir.join(TEMP_FILE_NAME);
        let path = dir.join(REPORT_FILE_NAME);

        tokio::fs::write(&tmp_path, &json).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        debug!("Wrote {} bytes to {}", json.len(), path.display());
        Ok(path)
    }
}

/// Map an arbitrary name to one directory name that stays inside its parent
fn path_component(name: &str) -> String {
    let mut component: String = name
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();

    if component.starts_with('.') {
        component.replace_range(..1, "_");
    }
    if component.is_empty() {
        component.push('_');
    }
    component
}
