//! Session state — the per-conversation transcript window.
//!
//! A session pins the system prompt at position 0 and keeps a sliding window
//! of the most recent messages behind it. Older history is trimmed as new
//! messages arrive, so a long-lived conversation never grows without bound.

use nimbus_core::message::{ConversationId, Message, Role};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// A single conversation's mutable state.
pub struct Session {
    pub id: ConversationId,
    messages: Vec<Message>,
    model_override: Option<String>,
    messages_since_refresh: usize,
    max_messages: usize,
}

impl Session {
    /// Create a session seeded with a system prompt.
    pub fn new(id: ConversationId, system_prompt: &str, max_messages: usize) -> Self {
        Self {
            id,
            messages: vec![Message::system(system_prompt)],
            model_override: None,
            messages_since_refresh: 0,
            max_messages,
        }
    }

    /// Append a message and trim the window.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.messages_since_refresh += 1;
        self.trim();
    }

    /// Keep the system prompt plus the `max_messages` most recent messages.
    fn trim(&mut self) {
        let cap = self.max_messages + 1;
        while self.messages.len() > cap {
            self.messages.remove(1);
        }
        // A tool result must never lead the window without its parent
        // assistant message; drop orphans left behind by the trim.
        while self.messages.len() > 1 && self.messages[1].role == Role::Tool {
            self.messages.remove(1);
        }
    }

    /// Replace the pinned system prompt and reset the refresh counter.
    pub fn set_system_prompt(&mut self, prompt: &str) {
        if self.messages.is_empty() || self.messages[0].role != Role::System {
            self.messages.insert(0, Message::system(prompt));
        } else {
            self.messages[0] = Message::system(prompt);
        }
        self.messages_since_refresh = 0;
        debug!(session = %self.id, "System prompt refreshed");
    }

    /// Whether enough messages have accumulated to warrant a prompt rebuild.
    pub fn needs_refresh(&self, interval: usize) -> bool {
        interval > 0 && self.messages_since_refresh >= interval
    }

    /// Clone the current transcript for a provider request.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn set_model_override(&mut self, model: Option<String>) {
        self.model_override = model;
    }

    pub fn model_override(&self) -> Option<&str> {
        self.model_override.as_deref()
    }
}

/// In-memory store of all active sessions, keyed by conversation.
///
/// All access goes through an async mutex; the service holds the lock only
/// for short, non-blocking mutations. Provider calls never run under it.
pub struct SessionStore {
    sessions: Mutex<HashMap<ConversationId, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn contains(&self, id: &ConversationId) -> bool {
        self.sessions.lock().await.contains_key(id)
    }

    /// Insert a new session if absent. An existing session is left untouched.
    pub async fn create(&self, id: &ConversationId, system_prompt: &str, max_messages: usize) {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(id.clone())
            .or_insert_with(|| Session::new(id.clone(), system_prompt, max_messages));
    }

    pub async fn push(&self, id: &ConversationId, message: Message) {
        if let Some(session) = self.sessions.lock().await.get_mut(id) {
            session.push(message);
        }
    }

    /// Transcript snapshot, or empty if the session does not exist.
    pub async fn snapshot(&self, id: &ConversationId) -> Vec<Message> {
        self.sessions
            .lock()
            .await
            .get(id)
            .map(Session::snapshot)
            .unwrap_or_default()
    }

    pub async fn set_system_prompt(&self, id: &ConversationId, prompt: &str) {
        if let Some(session) = self.sessions.lock().await.get_mut(id) {
            session.set_system_prompt(prompt);
        }
    }

    pub async fn needs_refresh(&self, id: &ConversationId, interval: usize) -> bool {
        self.sessions
            .lock()
            .await
            .get(id)
            .is_some_and(|s| s.needs_refresh(interval))
    }

    pub async fn set_model(&self, id: &ConversationId, model: Option<String>) {
        if let Some(session) = self.sessions.lock().await.get_mut(id) {
            session.set_model_override(model);
        }
    }

    pub async fn model(&self, id: &ConversationId) -> Option<String> {
        self.sessions
            .lock()
            .await
            .get(id)
            .and_then(|s| s.model_override().map(String::from))
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_core::message::MessageToolCall;

    fn session(max: usize) -> Session {
        Session::new(ConversationId::from("test"), "You are a test agent.", max)
    }

    #[test]
    fn system_prompt_is_first_message() {
        let s = session(50);
        assert_eq!(s.len(), 1);
        assert_eq!(s.snapshot()[0].role, Role::System);
    }

    #[test]
    fn trim_keeps_system_and_recent() {
        let mut s = session(4);
        for i in 0..10 {
            s.push(Message::user(format!("message {i}")));
        }
        let msgs = s.snapshot();
        assert_eq!(msgs.len(), 5);
        assert_eq!(msgs[0].role, Role::System);
        assert_eq!(msgs[1].content, "message 6");
        assert_eq!(msgs[4].content, "message 9");
    }

    #[test]
    fn trim_drops_orphaned_tool_results() {
        let mut s = session(3);
        s.push(Message::user("run something"));
        s.push(Message::assistant_with_calls(
            "",
            vec![MessageToolCall {
                id: "call_1".into(),
                name: "shell".into(),
                arguments: "{}".into(),
            }],
        ));
        s.push(Message::tool_result("call_1", "ok"));
        // Pushing two more evicts the assistant message carrying the call;
        // the now-orphaned tool result must go with it.
        s.push(Message::assistant("done"));
        s.push(Message::user("next"));
        let msgs = s.snapshot();
        assert!(msgs.iter().all(|m| m.role != Role::Tool));
        assert_eq!(msgs[0].role, Role::System);
    }

    #[test]
    fn refresh_counter_tracks_pushes() {
        let mut s = session(50);
        assert!(!s.needs_refresh(3));
        s.push(Message::user("one"));
        s.push(Message::assistant("two"));
        s.push(Message::user("three"));
        assert!(s.needs_refresh(3));

        s.set_system_prompt("Updated prompt.");
        assert!(!s.needs_refresh(3));
        assert_eq!(s.snapshot()[0].content, "Updated prompt.");
    }

    #[test]
    fn model_override_round_trip() {
        let mut s = session(50);
        assert!(s.model_override().is_none());
        s.set_model_override(Some("openai/gpt-4o".into()));
        assert_eq!(s.model_override(), Some("openai/gpt-4o"));
        s.set_model_override(None);
        assert!(s.model_override().is_none());
    }

    #[tokio::test]
    async fn store_create_is_idempotent() {
        let store = SessionStore::new();
        let id = ConversationId::from("conv");
        store.create(&id, "prompt A", 50).await;
        store.push(&id, Message::user("hello")).await;
        store.create(&id, "prompt B", 50).await;

        let msgs = store.snapshot(&id).await;
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].content, "prompt A");
    }

    #[tokio::test]
    async fn store_snapshot_of_missing_session_is_empty() {
        let store = SessionStore::new();
        let msgs = store.snapshot(&ConversationId::from("ghost")).await;
        assert!(msgs.is_empty());
    }
}
