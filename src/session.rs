//! Conversation sessions.
//!
//! Each session keeps only the most recent exchanges so that the context sent
//! to the model stays bounded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Default number of exchanges kept per session.
pub const DEFAULT_MAX_HISTORY: usize = 2;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => f.write_str("User"),
            Role::Assistant => f.write_str("Assistant"),
        }
    }
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Bounded, ordered record of prior exchanges.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    messages: Vec<Message>,
    max_history: usize,
}

impl ConversationHistory {
    /// Keep at most `max_history` exchanges (twice as many messages).
    pub fn new(max_history: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_history,
        }
    }

    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
        let limit = self.max_history * 2;
        if self.messages.len() > limit {
            let excess = self.messages.len() - limit;
            self.messages.drain(..excess);
        }
    }

    /// Record one user question and the assistant's answer.
    pub fn add_exchange(&mut self, user: &str, assistant: &str) {
        self.add_message(Role::User, user);
        self.add_message(Role::Assistant, assistant);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Render as `"Role: content"` lines, oldest first. Empty history renders
    /// as an empty string.
    pub fn format(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Per-session conversation histories.
///
/// Appends to one session are serialized by that session's own lock, so
/// independent sessions never contend.
pub struct SessionManager {
    max_history: usize,
    sessions: RwLock<HashMap<String, Arc<Mutex<ConversationHistory>>>>,
}

impl SessionManager {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create an empty session and return its id.
    pub async fn create_session(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.sessions.write().await.insert(
            id.clone(),
            Arc::new(Mutex::new(ConversationHistory::new(self.max_history))),
        );
        debug!("Created session {}", id);
        id
    }

    /// Whether `session_id` was issued by this manager and is still live.
    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Formatted history for a session, or `None` when it has no messages.
    pub async fn formatted_history(&self, session_id: &str) -> Option<String> {
        let sessions = self.sessions.read().await;
        let history = sessions.get(session_id)?.lock().await;
        (!history.is_empty()).then(|| history.format())
    }

    /// Append an exchange to a live session. Unknown ids are ignored so that
    /// clients cannot grow the session map with ids of their own.
    pub async fn add_exchange(&self, session_id: &str, user: &str, assistant: &str) -> bool {
        let Some(history) = self.sessions.read().await.get(session_id).cloned() else {
            debug!("Ignoring exchange for unknown session {}", session_id);
            return false;
        };
        history.lock().await.add_exchange(user, assistant);
        true
    }

    /// Messages currently retained for a session.
    pub async fn messages(&self, session_id: &str) -> Vec<Message> {
        let sessions = self.sessions.read().await;
        match sessions.get(session_id) {
            Some(history) => history.lock().await.messages().to_vec(),
            None => Vec::new(),
        }
    }

    /// Forget a session's history. Returns whether it existed.
    pub async fn clear_session(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_last_two_exchanges() {
        let mut history = ConversationHistory::new(2);
        history.add_exchange("q1", "a1");
        history.add_exchange("q2", "a2");
        history.add_exchange("q3", "a3");

        let contents: Vec<&str> = history.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q2", "a2", "q3", "a3"]);
        assert_eq!(history.messages()[0].role, Role::User);
    }

    #[test]
    fn test_format() {
        let mut history = ConversationHistory::new(2);
        assert_eq!(history.format(), "");

        history.add_exchange("What is MCP?", "A protocol.");
        assert_eq!(history.format(), "User: What is MCP?\nAssistant: A protocol.");
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let manager = SessionManager::default();
        let id = manager.create_session().await;
        assert_eq!(manager.formatted_history(&id).await, None);

        manager.add_exchange(&id, "hello", "hi").await;
        assert_eq!(
            manager.formatted_history(&id).await.as_deref(),
            Some("User: hello\nAssistant: hi")
        );

        assert!(manager.clear_session(&id).await);
        assert!(!manager.clear_session(&id).await);
        assert!(manager.messages(&id).await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_created() {
        let manager = SessionManager::new(1);
        assert!(!manager.add_exchange("client-chosen", "q1", "a1").await);
        assert!(!manager.contains("client-chosen").await);
        assert!(manager.messages("client-chosen").await.is_empty());
        assert_eq!(manager.session_count().await, 0);

        let id = manager.create_session().await;
        assert!(manager.contains(&id).await);
        assert!(manager.add_exchange(&id, "q1", "a1").await);
        assert!(manager.add_exchange(&id, "q2", "a2").await);

        let messages = manager.messages(&id).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "q2");
        assert_eq!(manager.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_appends_stay_paired() {
        let manager = Arc::new(SessionManager::new(50));
        let id = manager.create_session().await;

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let manager = manager.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    manager
                        .add_exchange(&id, &format!("q{}", i), &format!("a{}", i))
                        .await;
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let messages = manager.messages(&id).await;
        assert_eq!(messages.len(), 40);
        for pair in messages.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[0].content[1..], pair[1].content[1..]);
        }
    }
}
