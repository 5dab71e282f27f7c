//! Error types for the deployment layer.

use thiserror::Error;

/// Result type alias for deployment operations.
pub type DeployResult<T> = Result<T, DeployError>;

/// Errors that can occur during deployment handling.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid deploy configuration: {0}")]
    InvalidConfig(String),

    #[error("Store error: {0}")]
    Store(#[from] slavko_store::StoreError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DeployError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
