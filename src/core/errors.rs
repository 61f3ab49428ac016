// src/core/errors.rs

//! Defines the primary error type for the entire application.

use thiserror::Error;

/// The main error enum, representing all possible failures within the autoscaler.
/// Using `thiserror` allows for clean error definitions and automatic `From` trait implementations.
#[derive(Error, Debug)]
pub enum ScaleError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable '{0}'")]
    MissingEnv(String),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidEnv { key: String, reason: String },

    #[error("Secret store error: {0}")]
    Secrets(String),

    #[error("Master HTTP client error: {0}")]
    MasterTransport(String),

    #[error("Master returned status {status} for {url}")]
    MasterStatus { status: u16, url: String },

    #[error("Slot '{0}' already exists on the master")]
    SlotExists(String),

    #[error("Executor '{0}' is unknown to the master")]
    ExecutorNotFound(String),

    #[error("Unexpected master response: {0}")]
    MalformedResponse(String),

    #[error("VM provider error: {0}")]
    Provider(String),
}

impl From<reqwest::Error> for ScaleError {
    fn from(e: reqwest::Error) -> Self {
        ScaleError::MasterTransport(e.to_string())
    }
}

impl From<serde_json::Error> for ScaleError {
    fn from(e: serde_json::Error) -> Self {
        ScaleError::MalformedResponse(e.to_string())
    }
}

impl From<url::ParseError> for ScaleError {
    fn from(e: url::ParseError) -> Self {
        ScaleError::Config(format!("Invalid URL: {e}"))
    }
}
