//! Core record types shared by the fetch client, the aggregator and the report writer
//!
//! Raw backend payloads are normalized into [`NormalizedLogRecord`] once, then tagged
//! with their target's identity as an [`ErrorEntry`] when merged into a report.

use crate::error::WindowError;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Format a timestamp the way the log API and the report expect it
/// (`2024-05-01T10:00:00.000Z`).
pub fn to_iso(timestamp: &Timestamp) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn serialize_iso<S: Serializer>(
    timestamp: &Timestamp,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_iso(timestamp))
}

/// Search window shared by every target of one poll cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    #[serde(serialize_with = "serialize_iso")]
    pub from: Timestamp,
    #[serde(serialize_with = "serialize_iso")]
    pub to: Timestamp,
}

impl TimeWindow {
    /// Window covering the `minutes` leading up to `now`
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::Utc;
    /// use ddwatch::events::TimeWindow;
    ///
    /// let now = Utc::now();
    /// let window = TimeWindow::ending_at(now, 5).unwrap();
    /// assert_eq!(window.to, now);
    /// assert_eq!((window.to - window.from).num_minutes(), 5);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `WindowError` when the window reaches outside the representable
    /// time range.
    pub fn ending_at(now: Timestamp, minutes: u64) -> Result<Self, WindowError> {
        let from = i64::try_from(minutes)
            .ok()
            .and_then(TimeDelta::try_minutes)
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or(WindowError { minutes })?;

        Ok(Self { from, to: now })
    }

    pub fn from_iso(&self) -> String {
        to_iso(&self.from)
    }

    pub fn to_iso(&self) -> String {
        to_iso(&self.to)
    }
}

/// Compact shape of one log entry returned by the backend
///
/// Fields the backend did not send are omitted from the serialized form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NormalizedLogRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ddsource: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Status bucket used for summary counts when a record carries no status
pub const UNKNOWN_STATUS: &str = "unknown";

impl NormalizedLogRecord {
    /// Status key for the `byStatus` summary bucket
    pub fn status_key(&self) -> &str {
        match self.status.as_deref() {
            Some(status) if !status.is_empty() => status,
            _ => UNKNOWN_STATUS,
        }
    }
}

/// A normalized record tagged with the target it was fetched for
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEntry {
    #[serde(flatten)]
    pub record: NormalizedLogRecord,
    pub org_key: String,
    pub connector_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datadog_link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_time_window_bounds() {
        let window = TimeWindow::ending_at(fixed_now(), 5).unwrap();
        assert_eq!(window.from_iso(), "2024-05-01T09:55:00.000Z");
        assert_eq!(window.to_iso(), "2024-05-01T10:00:00.000Z");
    }

    #[test]
    fn test_time_window_serializes_iso_millis() {
        let window = TimeWindow::ending_at(fixed_now(), 15).unwrap();
        let json = serde_json::to_value(window).unwrap();
        assert_eq!(json["from"], "2024-05-01T09:45:00.000Z");
        assert_eq!(json["to"], "2024-05-01T10:00:00.000Z");

        let back: TimeWindow = serde_json::from_value(json).unwrap();
        assert_eq!(back, window);
    }

    #[test]
    fn test_time_window_out_of_range() {
        assert_eq!(
            TimeWindow::ending_at(fixed_now(), 1_000_000_000_000),
            Err(WindowError {
                minutes: 1_000_000_000_000
            })
        );
        assert!(TimeWindow::ending_at(fixed_now(), u64::MAX).is_err());
    }

    #[test]
    fn test_normalized_record_omits_missing_fields() {
        let record = NormalizedLogRecord {
            status: Some("error".to_string()),
            ..Default::default()
        };

        let json = serde_json::to_value(&record).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(json["status"], "error");
        assert_eq!(json["tags"], serde_json::json!([]));
    }

    #[test]
    fn test_status_key_defaults_to_unknown() {
        let mut record = NormalizedLogRecord::default();
        assert_eq!(record.status_key(), "unknown");

        record.status = Some(String::new());
        assert_eq!(record.status_key(), "unknown");

        record.status = Some("warn".to_string());
        assert_eq!(record.status_key(), "warn");
    }

    #[test]
    fn test_error_entry_flattens_record() {
        let entry = ErrorEntry {
            record: NormalizedLogRecord {
                message: Some("boom".to_string()),
                tags: vec!["env:prod".to_string()],
                ..Default::default()
            },
            org_key: "o1".to_string(),
            connector_name: "svc-sub-v1".to_string(),
            datadog_link: None,
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["message"], "boom");
        assert_eq!(json["orgKey"], "o1");
        assert_eq!(json["connectorName"], "svc-sub-v1");
        assert!(json.get("datadogLink").is_none());
        assert_eq!(json["tags"][0], "env:prod");
    }
}
