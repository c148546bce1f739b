//! Error types for the Interact telemetry engine

use thiserror::Error;

/// Errors that can occur while configuring or driving the engine
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Invalid TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Identity store error: {0}")]
    IdentityError(String),

    #[error("Failed to parse trace: {0}")]
    ParseError(String),

    #[error("Invalid trace: {0}")]
    InvalidTrace(String),
}
