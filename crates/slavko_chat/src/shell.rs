//! Chat shell: drives one streaming reply at a time.
//!
//! The shell owns the transcript and the wiring between the model's
//! fragment stream and the rest of the system: prose lands in the
//! transcript (and on the live view), directives go to the protocol bus.
//! Starting a new stream cancels the one still in flight for this
//! session; a cancelled stream leaves no protocol-level side effects
//! beyond the messages it fully emitted before the cancel.

use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use slavko_protocol::{
    parse_line, process, Module, Notifier, ProtocolBus, ProtocolError, SlavkoMessage, Status,
    StreamOutcome, StreamSink, ToastLevel,
};
use slavko_store::KvStore;

use crate::error::{is_credential_failure, ChatError, ChatResult};
use crate::history::ChatHistory;
use crate::llm::CompletionSource;
use crate::types::ChatMessage;

/// Live rendering seam: receives prose fragments as they stream in.
/// Pure consumer; nothing feeds back into the shell.
pub trait ChatView: Send + Sync {
    fn prose(&self, message_id: &str, chunk: &str);
}

/// View that drops everything. Useful headless and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullView;

impl ChatView for NullView {
    fn prose(&self, _message_id: &str, _chunk: &str) {}
}

/// The chat session driver.
pub struct ChatShell {
    bus: Arc<ProtocolBus>,
    source: Arc<dyn CompletionSource>,
    history: Mutex<ChatHistory>,
    view: Arc<dyn ChatView>,
    notifier: Arc<dyn Notifier>,
    active: Mutex<Option<(u64, CancellationToken)>>,
    stream_seq: std::sync::atomic::AtomicU64,
}

impl ChatShell {
    pub fn new(
        bus: Arc<ProtocolBus>,
        source: Arc<dyn CompletionSource>,
        store: Arc<dyn KvStore>,
        view: Arc<dyn ChatView>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            bus,
            source,
            history: Mutex::new(ChatHistory::load(store)),
            view,
            notifier,
            active: Mutex::new(None),
            stream_seq: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Snapshot of the transcript.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.history.lock().expect("history lock").messages().to_vec()
    }

    /// Cancel the stream currently in flight, if any. Cooperative: the
    /// stream stops at its next check point.
    pub fn cancel_active(&self) {
        if let Some((_, token)) = self.active.lock().expect("active lock").as_ref() {
            token.cancel();
        }
    }

    /// Send a user message and stream the reply.
    pub async fn send(&self, prompt: &str) -> ChatResult<StreamOutcome> {
        self.stream_and_process(prompt, false).await
    }

    /// Stream the scripted boot prompt without recording a user message.
    pub async fn boot(&self, initial_prompt: &str) -> ChatResult<StreamOutcome> {
        self.stream_and_process(initial_prompt, true).await
    }

    /// Wipe the transcript and announce it on the bus.
    pub fn clear_history(&self) {
        self.history.lock().expect("history lock").clear();
        self.bus.emit(
            SlavkoMessage::new(Module::Session, Status::Done)
                .with_action("CLEAR")
                .with_payload(json!("Chat history cleared.")),
        );
        self.notifier
            .toast(ToastLevel::Info, "Chat history cleared.");
    }

    async fn stream_and_process(
        &self,
        prompt: &str,
        is_initial: bool,
    ) -> ChatResult<StreamOutcome> {
        // One active stream per session: replace (and cancel) the prior
        // token before doing anything observable.
        let cancel = CancellationToken::new();
        let seq = self
            .stream_seq
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        if let Some((_, prior)) = self
            .active
            .lock()
            .expect("active lock")
            .replace((seq, cancel.clone()))
        {
            prior.cancel();
        }

        let (context, model_id) = {
            let mut history = self.history.lock().expect("history lock");
            let context = if is_initial { Vec::new() } else { history.recent() };
            if !is_initial {
                history.push(ChatMessage::user(prompt));
            }
            let placeholder = ChatMessage::thinking();
            let model_id = placeholder.id.clone();
            history.push(placeholder);
            (context, model_id)
        };

        let result = match self.source.stream_chat(&context, prompt).await {
            Ok(stream) => {
                let mut sink = ShellSink {
                    shell: self,
                    model_id: model_id.clone(),
                };
                process(stream, &cancel, &mut sink).await.map_err(Into::into)
            }
            Err(err) => Err(err),
        };

        // Only the stream we started may clear the active slot; a newer
        // stream may already have replaced it.
        {
            let mut active = self.active.lock().expect("active lock");
            if active.as_ref().is_some_and(|(s, _)| *s == seq) {
                *active = None;
            }
        }

        match result {
            Ok(StreamOutcome::Completed) => Ok(StreamOutcome::Completed),
            Ok(StreamOutcome::Cancelled) => {
                // Not an error: drop the placeholder and stay quiet.
                self.history
                    .lock()
                    .expect("history lock")
                    .remove(&model_id);
                tracing::debug!("stream aborted by user");
                Ok(StreamOutcome::Cancelled)
            }
            Err(err) => Err(self.fail_stream(&model_id, err)),
        }
    }

    // Exactly one user-visible error indicator per failed attempt: the
    // placeholder becomes the error marker, the failure is announced on
    // the bus, and generic failures also toast.
    fn fail_stream(&self, model_id: &str, err: ChatError) -> ChatError {
        let (classified, user_message) = match err {
            ChatError::Credential(detail) => {
                let user_message = "Your authentication credentials are not valid. \
                                    Please select a valid API key to continue."
                    .to_string();
                (ChatError::Credential(detail), user_message)
            }
            ChatError::Protocol(ProtocolError::Transport(detail))
                if is_credential_failure(&detail) =>
            {
                let user_message = "Your authentication credentials are not valid. \
                                    Please select a valid API key to continue."
                    .to_string();
                (ChatError::Credential(detail), user_message)
            }
            other => {
                let user_message = other.to_string();
                self.notifier.toast(ToastLevel::Error, &user_message);
                (other, user_message)
            }
        };

        self.history
            .lock()
            .expect("history lock")
            .mark_error(model_id, &user_message);

        self.bus.emit(
            SlavkoMessage::new(Module::Kernel, Status::Error)
                .with_action("STREAM_FAIL")
                .with_payload(json!({
                    "source": "stream_and_process",
                    "message": user_message,
                })),
        );

        classified
    }
}

// Routes one stream's lines: prose into the transcript and live view,
// directives onto the bus. The flush path gives a trailing directive
// with no newline its one chance to land as a message.
struct ShellSink<'a> {
    shell: &'a ChatShell,
    model_id: String,
}

impl StreamSink for ShellSink<'_> {
    fn prose(&mut self, text: &str) {
        self.shell
            .history
            .lock()
            .expect("history lock")
            .append_content(&self.model_id, text);
        self.shell.view.prose(&self.model_id, text);
    }

    fn directive(&mut self, message: SlavkoMessage) {
        self.shell.bus.emit(message);
    }

    fn flush(&mut self, partial: &str) {
        if partial.trim().is_empty() {
            return;
        }
        match parse_line(partial) {
            Some(message) => self.shell.bus.emit(message),
            None => self.prose(partial),
        }
    }
}
