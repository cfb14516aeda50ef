//! In-memory session store.
//!
//! Holds the list of chat sessions and the active session id. The store is
//! the only owner of session data; callers get clones and push changes back
//! through the mutation methods so the denormalized fields stay consistent.

use super::model::{ChatSession, Message, SessionSummary, Source};
use crate::error::{DocChatError, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    /// Sessions in display order, most recently created first
    sessions: Vec<ChatSession>,
    /// Id of the currently active session
    active_id: Option<String>,
    /// Per-session request generation, for discarding stale query replies
    generations: HashMap<String, u64>,
}

/// Thread-safe store for chat sessions.
///
/// `ChatStore` is responsible for:
/// - Creating and deleting sessions
/// - Tracking the active session
/// - Appending, resolving, and removing messages
/// - Keeping `message_count`, `last_message`, and `updated_at` consistent
/// - Issuing per-session request generations
#[derive(Default)]
pub struct ChatStore {
    inner: RwLock<Inner>,
}

impl ChatStore {
    /// Creates an empty store with no active session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new session, inserts it at the front of the list, and makes
    /// it active.
    pub async fn create_session(&self, title: impl Into<String>) -> ChatSession {
        let session = ChatSession::new(title);
        let mut inner = self.inner.write().await;
        inner.active_id = Some(session.id.clone());
        inner.sessions.insert(0, session.clone());
        session
    }

    /// Lists all sessions in display order.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let inner = self.inner.read().await;
        inner.sessions.iter().map(SessionSummary::from).collect()
    }

    /// Lists sessions whose title or last message contains `query`,
    /// case-insensitively. An empty query matches everything.
    pub async fn search(&self, query: &str) -> Vec<SessionSummary> {
        let needle = query.to_lowercase();
        let inner = self.inner.read().await;
        inner
            .sessions
            .iter()
            .filter(|s| {
                s.title.to_lowercase().contains(&needle)
                    || s.last_message.to_lowercase().contains(&needle)
            })
            .map(SessionSummary::from)
            .collect()
    }

    /// Returns a session by id.
    pub async fn get(&self, session_id: &str) -> Option<ChatSession> {
        let inner = self.inner.read().await;
        inner.sessions.iter().find(|s| s.id == session_id).cloned()
    }

    /// Returns the id of the currently active session.
    pub async fn active_id(&self) -> Option<String> {
        self.inner.read().await.active_id.clone()
    }

    /// Returns the currently active session.
    pub async fn active(&self) -> Option<ChatSession> {
        let inner = self.inner.read().await;
        let id = inner.active_id.as_deref()?;
        inner.sessions.iter().find(|s| s.id == id).cloned()
    }

    /// Makes an existing session active.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if no session has the given id.
    pub async fn set_active(&self, session_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.sessions.iter().any(|s| s.id == session_id) {
            return Err(DocChatError::not_found("session", session_id));
        }
        inner.active_id = Some(session_id.to_string());
        Ok(())
    }

    /// Deletes a session.
    ///
    /// Deleting the active session activates the first remaining session in
    /// the updated list, or clears the active id when the list is empty.
    /// Deleting a non-active session leaves the active id untouched.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if no session has the given id.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let before = inner.sessions.len();
        inner.sessions.retain(|s| s.id != session_id);
        if inner.sessions.len() == before {
            return Err(DocChatError::not_found("session", session_id));
        }
        inner.generations.remove(session_id);
        if inner.active_id.as_deref() == Some(session_id) {
            let next = inner.sessions.first().map(|s| s.id.clone());
            inner.active_id = next;
        }
        Ok(())
    }

    /// Appends a message to a session and updates the denormalized fields.
    ///
    /// `last_message` tracks the most recent user message only.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if no session has the given id.
    pub async fn append_message(&self, session_id: &str, message: Message) -> Result<()> {
        let mut inner = self.inner.write().await;
        let session = find_mut(&mut inner.sessions, session_id)?;
        if message.is_user() {
            session.last_message = message.content.clone();
        }
        session.messages.push(message);
        session.message_count = session.messages.len();
        session.updated_at = chrono::Utc::now().to_rfc3339();
        Ok(())
    }

    /// Replaces a pending message with its final content and sources.
    ///
    /// The slot is replaced with a fresh `Message` value; finalized messages
    /// are never mutated in place.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if the session or message does not exist,
    /// or an `InvalidInput` error if the message is not pending.
    pub async fn resolve_message(
        &self,
        session_id: &str,
        message_id: &str,
        content: impl Into<String>,
        sources: Vec<Source>,
    ) -> Result<Message> {
        let mut inner = self.inner.write().await;
        let session = find_mut(&mut inner.sessions, session_id)?;
        let slot = session
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| DocChatError::not_found("message", message_id))?;
        if !slot.is_pending() {
            return Err(DocChatError::invalid_input(format!(
                "message '{}' is already complete",
                message_id
            )));
        }
        let mut resolved = Message::assistant(content, sources);
        resolved.id = message_id.to_string();
        *slot = resolved.clone();
        session.updated_at = chrono::Utc::now().to_rfc3339();
        Ok(resolved)
    }

    /// Removes a message from a session (used to drop the placeholder of a
    /// superseded query).
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if the session or message does not exist.
    pub async fn remove_message(&self, session_id: &str, message_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let session = find_mut(&mut inner.sessions, session_id)?;
        let before = session.messages.len();
        session.messages.retain(|m| m.id != message_id);
        if session.messages.len() == before {
            return Err(DocChatError::not_found("message", message_id));
        }
        session.message_count = session.messages.len();
        Ok(())
    }

    /// Starts a new query generation for a session and returns its token.
    ///
    /// A reply whose token no longer matches [`ChatStore::generation`] at
    /// completion time is stale and must be discarded.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if no session has the given id.
    pub async fn begin_query(&self, session_id: &str) -> Result<u64> {
        let mut inner = self.inner.write().await;
        if !inner.sessions.iter().any(|s| s.id == session_id) {
            return Err(DocChatError::not_found("session", session_id));
        }
        let generation = inner
            .generations
            .entry(session_id.to_string())
            .and_modify(|g| *g += 1)
            .or_insert(1);
        Ok(*generation)
    }

    /// Returns the current query generation for a session (0 if none issued).
    pub async fn generation(&self, session_id: &str) -> u64 {
        let inner = self.inner.read().await;
        inner.generations.get(session_id).copied().unwrap_or(0)
    }
}

fn find_mut<'a>(sessions: &'a mut [ChatSession], session_id: &str) -> Result<&'a mut ChatSession> {
    sessions
        .iter_mut()
        .find(|s| s.id == session_id)
        .ok_or_else(|| DocChatError::not_found("session", session_id))
}
