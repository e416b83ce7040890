//! Runtime configuration: TOML file, then environment overrides, then validation

/// Configuration structs, file loading and validation
pub mod settings;

/// Environment-variable overrides
pub mod env_overrides;

pub use env_overrides::apply_env_overrides;
pub use settings::{
    Config, DatadogConfig, PathsConfig, PollingConfig, ServerConfig, MAX_WINDOW_MINUTES,
};
