//! Document domain model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Backend processing status of an uploaded document.
///
/// The only legal transitions are `Processing -> Ready` and
/// `Processing -> Error`; both target states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Accepted by the backend, indexing in progress
    Processing,
    /// Indexed and available for retrieval
    Ready,
    /// Backend processing failed
    Error,
}

impl DocumentStatus {
    /// Whether no further automatic transition occurs from this state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Error => "error",
        };
        write!(f, "{}", label)
    }
}

/// A document known to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Unique identifier for the document
    pub id: String,
    /// Original filename
    pub name: String,
    /// File size in bytes
    pub size: u64,
    /// MIME type of the file
    pub mime_type: String,
    /// Timestamp when the file was uploaded (Unix seconds)
    pub uploaded_at: i64,
    /// Backend processing status
    pub status: DocumentStatus,
    /// Who uploaded the file, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
}

impl DocumentRecord {
    /// Creates a record for a freshly uploaded document, status `Processing`.
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            uploaded_at: chrono::Utc::now().timestamp(),
            status: DocumentStatus::Processing,
            uploader: None,
        }
    }

    /// Sets the uploader on a new record.
    pub fn with_uploader(mut self, uploader: impl Into<String>) -> Self {
        self.uploader = Some(uploader.into());
        self
    }
}

/// Aggregate figures over the document list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    /// Total number of documents
    pub total: usize,
    /// Sum of document sizes in bytes
    pub total_bytes: u64,
    /// Documents indexed and ready
    pub ready: usize,
    /// Documents still processing
    pub processing: usize,
    /// Documents whose processing failed
    pub error: usize,
}
