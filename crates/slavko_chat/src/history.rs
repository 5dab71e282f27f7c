//! Chat history with whole-collection persistence.

use std::sync::Arc;

use slavko_store::{keys, KvStore, KvStoreExt};

use crate::types::{ChatMessage, MessageKind};

/// Only this many trailing messages are sent along as LLM context.
pub const HISTORY_CONTEXT_LIMIT: usize = 20;

/// The chat transcript. Every mutation persists the whole collection.
pub struct ChatHistory {
    store: Arc<dyn KvStore>,
    messages: Vec<ChatMessage>,
}

impl ChatHistory {
    /// Load the persisted transcript, or start empty.
    pub fn load(store: Arc<dyn KvStore>) -> Self {
        let messages = match store.load_json::<Vec<ChatMessage>>(keys::HISTORY) {
            Ok(Some(messages)) => messages,
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::warn!("failed to load chat history, starting empty: {err}");
                Vec::new()
            }
        };
        Self { store, messages }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The trailing window used as LLM context.
    pub fn recent(&self) -> Vec<ChatMessage> {
        let skip = self.messages.len().saturating_sub(HISTORY_CONTEXT_LIMIT);
        self.messages[skip..].to_vec()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.persist();
    }

    /// Append streamed text to a message, clearing its `thinking` marker
    /// on the first chunk.
    pub fn append_content(&mut self, id: &str, chunk: &str) {
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == id) {
            if message.kind == Some(MessageKind::Thinking) {
                message.kind = None;
            }
            message.content.push_str(chunk);
            self.persist();
        }
    }

    /// Replace a message body with an error indicator.
    pub fn mark_error(&mut self, id: &str, text: &str) {
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == id) {
            message.kind = Some(MessageKind::Error);
            message.content = text.to_string();
            self.persist();
        }
    }

    /// Drop a message entirely, e.g. the placeholder of a cancelled
    /// stream.
    pub fn remove(&mut self, id: &str) {
        self.messages.retain(|m| m.id != id);
        self.persist();
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.persist();
    }

    fn persist(&self) {
        if let Err(err) = self.store.save_json(keys::HISTORY, &self.messages) {
            tracing::warn!("failed to persist chat history: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slavko_store::MemoryStore;

    fn history() -> ChatHistory {
        ChatHistory::load(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_push_and_reload() {
        let store = Arc::new(MemoryStore::new());
        let mut history = ChatHistory::load(Arc::clone(&store) as Arc<dyn KvStore>);
        history.push(ChatMessage::user("hello"));
        history.push(ChatMessage::model("hi"));

        let reloaded = ChatHistory::load(store as Arc<dyn KvStore>);
        assert_eq!(reloaded.messages().len(), 2);
        assert_eq!(reloaded.messages()[0].content, "hello");
    }

    #[test]
    fn test_recent_is_capped() {
        let mut history = history();
        for i in 0..30 {
            history.push(ChatMessage::user(format!("msg {i}")));
        }
        let recent = history.recent();
        assert_eq!(recent.len(), HISTORY_CONTEXT_LIMIT);
        assert_eq!(recent[0].content, "msg 10");
        assert_eq!(recent.last().unwrap().content, "msg 29");
    }

    #[test]
    fn test_append_clears_thinking_marker() {
        let mut history = history();
        let placeholder = ChatMessage::thinking();
        let id = placeholder.id.clone();
        history.push(placeholder);

        history.append_content(&id, "Hello");
        history.append_content(&id, " world");

        let message = &history.messages()[0];
        assert_eq!(message.content, "Hello world");
        assert_eq!(message.kind, None);
    }

    #[test]
    fn test_mark_error_and_remove() {
        let mut history = history();
        let placeholder = ChatMessage::thinking();
        let id = placeholder.id.clone();
        history.push(placeholder);

        history.mark_error(&id, "boom");
        assert_eq!(history.messages()[0].kind, Some(MessageKind::Error));
        assert_eq!(history.messages()[0].content, "boom");

        history.remove(&id);
        assert!(history.is_empty());
        // Removing a missing id is a no-op.
        history.remove(&id);
    }
}
