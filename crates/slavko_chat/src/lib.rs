//! # slavko_chat - Chat session driver for SlavkoShell
//!
//! Owns the conversation side of the shell:
//!
//! - **Transcript** ([`history`]): persisted chat history with a capped
//!   context window for the LLM.
//! - **Transport** ([`llm`]): streaming OpenAI/Anthropic completions
//!   behind the [`CompletionSource`] seam.
//! - **Driver** ([`shell`]): one cancellable stream at a time, prose into
//!   the transcript, directives onto the protocol bus, and the error
//!   taxonomy (credential failures surfaced distinctly, one visible
//!   error marker per failed attempt).

pub mod error;
pub mod history;
pub mod llm;
pub mod shell;
pub mod types;

pub use error::{is_credential_failure, ChatError, ChatResult};
pub use history::{ChatHistory, HISTORY_CONTEXT_LIMIT};
pub use llm::{CompletionSource, LlmClient, LlmProvider, TextStream};
pub use shell::{ChatShell, ChatView, NullView};
pub use types::{ChatMessage, ChatRole, MessageKind};
