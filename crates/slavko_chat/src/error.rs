//! Error types for the chat layer.

use thiserror::Error;

/// Result type alias for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;

/// Errors that can occur while driving a chat session.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("LLM not configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY")]
    NotConfigured,

    #[error("LLM error: {0}")]
    Llm(String),

    /// Authentication credentials rejected by the transport. Surfaced
    /// distinctly so the caller can prompt for credential re-selection.
    #[error("{0}")]
    Credential(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] slavko_protocol::ProtocolError),

    #[error("Store error: {0}")]
    Store(#[from] slavko_store::StoreError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Known transport phrases that indicate a credential problem rather
/// than a generic failure.
const CREDENTIAL_PHRASES: &[&str] = &[
    "API key not valid",
    "API_KEY_INVALID",
    "Requested entity was not found.",
    "API keys are not supported by this API",
    "invalid x-api-key",
    "Incorrect API key provided",
];

/// Whether a transport failure message points at bad credentials.
pub fn is_credential_failure(message: &str) -> bool {
    CREDENTIAL_PHRASES.iter().any(|p| message.contains(p))
}
