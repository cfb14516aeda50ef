//! Session domain model.
//!
//! This module contains the core chat entities: sessions, messages, and the
//! sources cited by an answer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    /// Message typed by the user.
    User,
    /// Answer produced by the RAG backend.
    Assistant,
    /// Client-generated notice (e.g. upload annotations).
    System,
}

/// Completion state of a message.
///
/// A message is `Pending` between the moment a query is issued and the moment
/// its reply arrives. Once `Complete`, a message is never mutated again; the
/// store replaces the pending slot wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    Pending,
    Complete,
}

/// A document excerpt cited by an assistant answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Unique identifier for the source
    pub id: String,
    /// Title of the source document
    pub title: String,
    /// Excerpt supporting the answer
    pub excerpt: String,
    /// Optional link to the source document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A single message in a session's conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier within the session
    pub id: String,
    /// The role of the message sender
    pub role: MessageRole,
    /// The content of the message (empty while pending)
    pub content: String,
    /// Timestamp when the message was created (ISO 8601 format)
    pub timestamp: String,
    /// Completion state
    pub status: MessageStatus,
    /// Sources cited by the answer, if any
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl Message {
    /// Creates a completed user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::complete(MessageRole::User, content, Vec::new())
    }

    /// Creates a completed assistant message with its cited sources.
    pub fn assistant(content: impl Into<String>, sources: Vec<Source>) -> Self {
        Self::complete(MessageRole::Assistant, content, sources)
    }

    /// Creates a completed system notice.
    pub fn system(content: impl Into<String>) -> Self {
        Self::complete(MessageRole::System, content, Vec::new())
    }

    /// Creates a pending assistant placeholder awaiting a gateway reply.
    pub fn pending() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: MessageRole::Assistant,
            content: String::new(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            status: MessageStatus::Pending,
            sources: Vec::new(),
        }
    }

    fn complete(role: MessageRole, content: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            status: MessageStatus::Complete,
            sources,
        }
    }

    /// Whether this message was typed by the user.
    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }

    /// Whether this message is still awaiting its final content.
    pub fn is_pending(&self) -> bool {
        self.status == MessageStatus::Pending
    }
}

/// A chat session in the client's session list.
///
/// A session contains:
/// - The ordered conversation history
/// - Denormalized sidebar fields (`last_message`, `message_count`)
/// - The timestamp of the last activity
///
/// `message_count` always equals `messages.len()`; the store maintains the
/// pair on every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique session identifier (UUID format)
    pub id: String,
    /// Human-readable session title
    pub title: String,
    /// Preview of the most recent user message
    pub last_message: String,
    /// Timestamp of the last activity (ISO 8601 format)
    pub updated_at: String,
    /// Number of messages in the conversation
    pub message_count: usize,
    /// Ordered conversation history
    pub messages: Vec<Message>,
}

impl ChatSession {
    /// Creates a new, empty session with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            last_message: String::new(),
            updated_at: chrono::Utc::now().to_rfc3339(),
            message_count: 0,
            messages: Vec::new(),
        }
    }
}

/// Sidebar view of a session: everything except the message history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub last_message: String,
    pub updated_at: String,
    pub message_count: usize,
}

impl From<&ChatSession> for SessionSummary {
    fn from(session: &ChatSession) -> Self {
        Self {
            id: session.id.clone(),
            title: session.title.clone(),
            last_message: session.last_message.clone(),
            updated_at: session.updated_at.clone(),
            message_count: session.message_count,
        }
    }
}
