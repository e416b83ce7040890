use thiserror::Error;

/// Errors that can occur while loading the link source
#[derive(Error, Debug)]
pub enum LinkSourceError {
    #[error("Failed to read links file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse links file: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Links file must contain a JSON array")]
    NotAnArray,
}

/// Errors that can occur while querying the log search backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Log API returned error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Request timeout")]
    Timeout,
}

/// Errors that can occur while persisting the consolidated report
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    SerializeError(#[from] serde_json::Error),
}

/// A search window that cannot be represented as a time range
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Search window of {minutes} minutes is out of range")]
pub struct WindowError {
    pub minutes: u64,
}

/// Errors that abort a whole poll cycle
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Link source error: {0}")]
    LinkSource(#[from] LinkSourceError),

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error("Report write error: {0}")]
    Write(#[from] WriteError),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
