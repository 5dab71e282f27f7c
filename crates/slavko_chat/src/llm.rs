//! Streaming LLM transport.
//!
//! Supports OpenAI and Anthropic chat completions over SSE, selected via
//! environment variables. The adapter yields raw text fragments; line
//! reassembly and directive recognition happen downstream in the stream
//! processor.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;

use slavko_protocol::{ProtocolError, ProtocolResult};

use crate::error::{is_credential_failure, ChatError, ChatResult};
use crate::types::{ChatMessage, ChatRole};

/// Fragment stream handed to the stream processor.
pub type TextStream = BoxStream<'static, ProtocolResult<String>>;

/// Anything that can stream a chat completion. The shell depends on this
/// seam, not on a concrete transport.
#[async_trait]
pub trait CompletionSource: Send + Sync {
    /// Start streaming a reply to `prompt` given the trailing history.
    async fn stream_chat(&self, history: &[ChatMessage], prompt: &str) -> ChatResult<TextStream>;
}

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Anthropic,
}

/// Streaming LLM client.
pub struct LlmClient {
    provider: LlmProvider,
    api_key: String,
    model: String,
    system_prompt: Option<String>,
    client: reqwest::Client,
}

impl LlmClient {
    /// Create a client with explicit configuration.
    pub fn new(provider: LlmProvider, api_key: String, model: Option<String>) -> Self {
        let default_model = match provider {
            LlmProvider::OpenAI => "gpt-5-mini".to_string(),
            LlmProvider::Anthropic => "claude-sonnet-4.5".to_string(),
        };

        Self {
            provider,
            api_key,
            model: model.unwrap_or(default_model),
            system_prompt: None,
            client: reqwest::Client::new(),
        }
    }

    /// Create a client from environment variables.
    ///
    /// Checks in order:
    /// 1. OPENAI_API_KEY
    /// 2. ANTHROPIC_API_KEY
    ///
    /// `SLAVKO_LLM_MODEL` overrides the default model.
    pub fn from_env() -> ChatResult<Self> {
        let custom_model = std::env::var("SLAVKO_LLM_MODEL").ok();

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            if !api_key.is_empty() {
                return Ok(Self::new(LlmProvider::OpenAI, api_key, custom_model));
            }
        }

        if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
            if !api_key.is_empty() {
                return Ok(Self::new(LlmProvider::Anthropic, api_key, custom_model));
            }
        }

        Err(ChatError::NotConfigured)
    }

    /// Set the system prompt sent with every completion.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn open_stream(
        &self,
        history: &[ChatMessage],
        prompt: &str,
    ) -> ChatResult<reqwest::Response> {
        let request = match self.provider {
            LlmProvider::OpenAI => {
                let mut messages = Vec::new();
                if let Some(system) = &self.system_prompt {
                    messages.push(OpenAIMessage {
                        role: "system".to_string(),
                        content: system.clone(),
                    });
                }
                messages.extend(history.iter().map(|m| OpenAIMessage {
                    role: role_tag(m.role).to_string(),
                    content: m.content.clone(),
                }));
                messages.push(OpenAIMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                });

                self.client
                    .post("https://api.openai.com/v1/chat/completions")
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .header("Content-Type", "application/json")
                    .json(&OpenAIRequest {
                        model: self.model.clone(),
                        messages,
                        stream: true,
                    })
            }
            LlmProvider::Anthropic => {
                let mut messages: Vec<AnthropicMessage> = history
                    .iter()
                    .map(|m| AnthropicMessage {
                        role: role_tag(m.role).to_string(),
                        content: m.content.clone(),
                    })
                    .collect();
                messages.push(AnthropicMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                });

                self.client
                    .post("https://api.anthropic.com/v1/messages")
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", "2023-06-01")
                    .header("Content-Type", "application/json")
                    .json(&AnthropicRequest {
                        model: self.model.clone(),
                        max_tokens: 4096,
                        system: self.system_prompt.clone(),
                        messages,
                        stream: true,
                    })
            }
        };

        // Retry transient failures on the initial connection: network
        // errors, 5xx and rate limits. Exponential backoff: 1s, 2s, 4s.
        const MAX_RETRIES: u32 = 3;
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = std::time::Duration::from_secs(1 << attempt);
                tokio::time::sleep(delay).await;
            }

            let attempt_request = match request.try_clone() {
                Some(r) => r,
                None => return Err(ChatError::Llm("request body not retryable".to_string())),
            };
            let response = match attempt_request.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(ChatError::Llm(format!("Network error: {}", e)));
                    continue;
                }
            };

            let status = response.status();

            if status.is_server_error() || status.as_u16() == 429 {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(ChatError::Llm(format!(
                    "LLM API error {} (attempt {}/{}): {}",
                    status,
                    attempt + 1,
                    MAX_RETRIES,
                    body
                )));
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let detail = format!("LLM API error {}: {}", status, body);
                if status.as_u16() == 401 || status.as_u16() == 403 || is_credential_failure(&detail)
                {
                    return Err(ChatError::Credential(detail));
                }
                return Err(ChatError::Llm(detail));
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or_else(|| ChatError::Llm("Max retries exceeded".to_string())))
    }
}

#[async_trait]
impl CompletionSource for LlmClient {
    async fn stream_chat(&self, history: &[ChatMessage], prompt: &str) -> ChatResult<TextStream> {
        let response = self.open_stream(history, prompt).await?;
        tracing::debug!(model = %self.model, "completion stream opened");
        Ok(sse_text_stream(self.provider, response))
    }
}

fn role_tag(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Model => "assistant",
    }
}

// Decode an SSE byte stream into text fragments.
fn sse_text_stream(provider: LlmProvider, response: reqwest::Response) -> TextStream {
    struct SseState {
        provider: LlmProvider,
        bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
        buffer: String,
        queue: VecDeque<String>,
        failed: bool,
    }

    let state = SseState {
        provider,
        bytes: response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed(),
        buffer: String::new(),
        queue: VecDeque::new(),
        failed: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if state.failed {
                return None;
            }
            if let Some(text) = state.queue.pop_front() {
                return Some((Ok(text), state));
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.push_str(&String::from_utf8_lossy(&chunk));
                    while let Some(idx) = state.buffer.find('\n') {
                        let line: String = state.buffer.drain(..=idx).collect();
                        if let Some(text) = parse_sse_line(state.provider, line.trim()) {
                            state.queue.push_back(text);
                        }
                    }
                }
                Some(Err(err)) => {
                    state.failed = true;
                    return Some((
                        Err(ProtocolError::Transport(err.to_string())),
                        state,
                    ));
                }
                None => return None,
            }
        }
    })
    .boxed()
}

// One SSE line in, a text fragment out (or nothing: keep-alives, event
// names, terminators and empty deltas are all skipped).
fn parse_sse_line(provider: LlmProvider, line: &str) -> Option<String> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    let value: Value = serde_json::from_str(data).ok()?;

    let text = match provider {
        LlmProvider::OpenAI => value
            .get("choices")?
            .get(0)?
            .get("delta")?
            .get("content")?
            .as_str()?
            .to_string(),
        LlmProvider::Anthropic => {
            if value.get("type")?.as_str()? != "content_block_delta" {
                return None;
            }
            value.get("delta")?.get("text")?.as_str()?.to_string()
        }
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_detection() {
        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("ANTHROPIC_API_KEY");

        assert!(matches!(
            LlmClient::from_env(),
            Err(ChatError::NotConfigured)
        ));

        std::env::set_var("OPENAI_API_KEY", "test-key");
        let client = LlmClient::from_env().unwrap();
        assert_eq!(client.provider(), LlmProvider::OpenAI);
        std::env::remove_var("OPENAI_API_KEY");

        std::env::set_var("ANTHROPIC_API_KEY", "test-key");
        let client = LlmClient::from_env().unwrap();
        assert_eq!(client.provider(), LlmProvider::Anthropic);
        std::env::remove_var("ANTHROPIC_API_KEY");
    }

    #[test]
    fn test_default_models() {
        let openai = LlmClient::new(LlmProvider::OpenAI, "key".to_string(), None);
        assert_eq!(openai.model(), "gpt-5-mini");

        let anthropic = LlmClient::new(LlmProvider::Anthropic, "key".to_string(), None);
        assert_eq!(anthropic.model(), "claude-sonnet-4.5");
    }

    #[test]
    fn test_custom_model() {
        let client = LlmClient::new(
            LlmProvider::OpenAI,
            "key".to_string(),
            Some("gpt-4o-mini".to_string()),
        );
        assert_eq!(client.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_parse_openai_sse_line() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#;
        assert_eq!(
            parse_sse_line(LlmProvider::OpenAI, line),
            Some("Hello".to_string())
        );
        assert_eq!(parse_sse_line(LlmProvider::OpenAI, "data: [DONE]"), None);
        assert_eq!(parse_sse_line(LlmProvider::OpenAI, ": keep-alive"), None);
        assert_eq!(
            parse_sse_line(
                LlmProvider::OpenAI,
                r#"data: {"choices":[{"delta":{}}]}"#
            ),
            None
        );
    }

    #[test]
    fn test_parse_anthropic_sse_line() {
        let line = r#"data: {"type":"content_block_delta","delta":{"type":"text_delta","text":"Hi"}}"#;
        assert_eq!(
            parse_sse_line(LlmProvider::Anthropic, line),
            Some("Hi".to_string())
        );
        let other = r#"data: {"type":"message_start"}"#;
        assert_eq!(parse_sse_line(LlmProvider::Anthropic, other), None);
        assert_eq!(
            parse_sse_line(LlmProvider::Anthropic, "event: content_block_delta"),
            None
        );
    }
}
