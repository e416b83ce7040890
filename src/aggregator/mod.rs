//! Per-cycle processing of link items into a consolidated report

/// Link processing loop for one poll cycle
pub mod log_processor;

/// Result, summary and report types
pub mod summary;

pub use log_processor::LogProcessor;
pub use summary::{ConsolidatedReport, LinkResult, Summary, TargetReport};
