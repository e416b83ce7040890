/// Error types for link loading, log search, report writing and configuration
pub mod error;

/// Core record and time-window types
pub mod events;

/// Link items, query derivation and connector naming
pub mod links;

/// Log search backends and the paginated fetch client
pub mod backend;

/// Per-cycle processing and the consolidated report
pub mod aggregator;

/// Persistence of the consolidated and per-target reports
pub mod output;

/// Poll cycle self-monitoring
pub mod monitoring;

/// Interval-driven poll scheduler
pub mod scheduler;

/// HTTP server for health, the report and the data directory
pub mod server;

/// Configuration management
pub mod config;

// Re-export commonly used types
pub use error::{
    BackendError, ConfigError, CycleError, LinkSourceError, WindowError, WriteError,
};
