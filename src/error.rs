//! Error types for Driftguard

use thiserror::Error;

/// Errors that can occur in the decision and delivery pipeline
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Malformed observation frame: {0}")]
    MalformedFrame(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("Classifier timed out after {0} ms")]
    ClassifierTimeout(u64),

    #[error("Classifier returned malformed hint: {0}")]
    MalformedHint(String),

    #[error("Focus store error: {0}")]
    StoreError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
