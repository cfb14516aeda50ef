//! Upload gateway contract.
//!
//! One multipart `POST {base_url}/upload-document` with a single part named
//! `file`. The HTTP status decides the outcome; on failure the optional JSON
//! `detail` field supplies the user-facing reason.

use async_trait::async_trait;

/// A file staged for upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Filename sent in the multipart part
    pub file_name: String,
    /// MIME type of the part
    pub mime_type: String,
    /// File content
    pub bytes: Vec<u8>,
}

impl UploadRequest {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

/// Result of one upload exchange.
///
/// Both application-level rejections (non-success status) and transport
/// failures surface as `Failed`; nothing is thrown past the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The backend accepted the document.
    Accepted,
    /// The upload did not go through; `reason` is ready for display.
    Failed { reason: String },
}

impl UploadOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Boundary component translating an upload intent into one HTTP exchange.
#[async_trait]
pub trait UploadGateway: Send + Sync {
    async fn submit_upload(&self, request: UploadRequest) -> UploadOutcome;
}
