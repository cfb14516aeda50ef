//! Chat-path document upload.

use docchat_core::document::{DocumentRecord, DocumentStore};
use docchat_core::error::Result;
use docchat_core::session::{ChatStore, Message};
use docchat_gateway::upload::{UploadGateway, UploadOutcome, UploadRequest};
use std::path::Path;
use std::sync::Arc;

/// Result of a chat-path upload, ready for toast-level display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadReport {
    /// The document was accepted; a record is registered and a chat
    /// annotation appended.
    Accepted { document: DocumentRecord },
    /// The upload did not go through.
    Failed { reason: String },
}

impl UploadReport {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Uploads a document from the chat input and records the result.
///
/// This path performs no client-side validation; the file goes straight to
/// the upload gateway (the bulk drop-zone flow is the validated one). On
/// acceptance the document is registered and marked ready — there is no
/// status-refresh contract with the backend, so readiness is optimistic.
pub struct UploadService {
    documents: Arc<DocumentStore>,
    sessions: Arc<ChatStore>,
    gateway: Arc<dyn UploadGateway>,
    uploader: Option<String>,
}

impl UploadService {
    /// Creates a new `UploadService`.
    ///
    /// # Arguments
    ///
    /// * `documents` - The document store new records land in
    /// * `sessions` - The session store receiving upload annotations
    /// * `gateway` - The upload gateway client
    pub fn new(
        documents: Arc<DocumentStore>,
        sessions: Arc<ChatStore>,
        gateway: Arc<dyn UploadGateway>,
    ) -> Self {
        Self {
            documents,
            sessions,
            gateway,
            uploader: None,
        }
    }

    /// Records an uploader name on every registered document.
    pub fn with_uploader(mut self, uploader: impl Into<String>) -> Self {
        self.uploader = Some(uploader.into());
        self
    }

    /// Uploads a file and, on acceptance, registers the document and appends
    /// an annotation to the session's conversation.
    ///
    /// # Errors
    ///
    /// Returns an `Io` error when the file cannot be read and a `NotFound`
    /// error when the session does not exist. Gateway failures are not
    /// errors; they surface in the returned report.
    pub async fn upload_from_chat(&self, session_id: &str, path: &Path) -> Result<UploadReport> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let size = bytes.len() as u64;

        let outcome = self
            .gateway
            .submit_upload(UploadRequest::new(file_name.clone(), mime_type.clone(), bytes))
            .await;

        match outcome {
            UploadOutcome::Accepted => {
                let mut record = DocumentRecord::new(file_name.clone(), size, mime_type);
                if let Some(uploader) = &self.uploader {
                    record = record.with_uploader(uploader.clone());
                }
                let document_id = self.documents.insert(record).await;

                self.sessions
                    .append_message(
                        session_id,
                        Message::system(format!(
                            "Document '{}' uploaded successfully.",
                            file_name
                        )),
                    )
                    .await?;

                // No polling contract exists; acceptance is the last word we
                // get from the backend.
                self.documents.mark_ready(&document_id).await?;
                let document = self
                    .documents
                    .get(&document_id)
                    .await
                    .expect("document registered above");
                tracing::info!(%file_name, "document uploaded");
                Ok(UploadReport::Accepted { document })
            }
            UploadOutcome::Failed { reason } => {
                tracing::warn!(%file_name, "upload failed: {}", reason);
                Ok(UploadReport::Failed {
                    reason: format!("Failed to upload {}: {}", file_name, reason),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docchat_core::document::DocumentStatus;
    use std::io::Write;

    struct MockUploadGateway {
        outcome: UploadOutcome,
    }

    #[async_trait]
    impl UploadGateway for MockUploadGateway {
        async fn submit_upload(&self, _request: UploadRequest) -> UploadOutcome {
            self.outcome.clone()
        }
    }

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    fn service(outcome: UploadOutcome) -> (Arc<DocumentStore>, Arc<ChatStore>, UploadService) {
        let documents = Arc::new(DocumentStore::new());
        let sessions = Arc::new(ChatStore::new());
        let service = UploadService::new(
            documents.clone(),
            sessions.clone(),
            Arc::new(MockUploadGateway { outcome }),
        );
        (documents, sessions, service)
    }

    #[tokio::test]
    async fn test_accepted_upload_registers_ready_document_and_annotation() {
        let (documents, sessions, service) = service(UploadOutcome::Accepted);
        let session = sessions.create_session("Upload").await;
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "notes.txt", b"hello");

        let report = service.upload_from_chat(&session.id, &path).await.unwrap();
        let UploadReport::Accepted { document } = report else {
            panic!("expected acceptance");
        };
        assert_eq!(document.name, "notes.txt");
        assert_eq!(document.size, 5);
        assert_eq!(document.status, DocumentStatus::Ready);
        assert_eq!(documents.list().await.len(), 1);

        let loaded = sessions.get(&session.id).await.unwrap();
        assert_eq!(loaded.message_count, 1);
        assert!(!loaded.messages[0].is_user());
        assert!(loaded.messages[0].content.contains("notes.txt"));
        assert_eq!(loaded.message_count, loaded.messages.len());
    }

    #[tokio::test]
    async fn test_failed_upload_registers_nothing() {
        let (documents, sessions, service) = service(UploadOutcome::Failed {
            reason: "503 Service Unavailable".to_string(),
        });
        let session = sessions.create_session("Upload").await;
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "notes.txt", b"hello");

        let report = service.upload_from_chat(&session.id, &path).await.unwrap();
        let UploadReport::Failed { reason } = report else {
            panic!("expected failure");
        };
        assert!(reason.contains("notes.txt"));
        assert!(reason.contains("503 Service Unavailable"));

        assert!(documents.list().await.is_empty());
        assert_eq!(sessions.get(&session.id).await.unwrap().message_count, 0);
    }

    #[tokio::test]
    async fn test_uploader_name_is_recorded() {
        let (documents, sessions, service) = service(UploadOutcome::Accepted);
        let service = service.with_uploader("ana");
        let session = sessions.create_session("Upload").await;
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "report.pdf", b"%PDF-");

        service.upload_from_chat(&session.id, &path).await.unwrap();
        let listed = documents.list().await;
        assert_eq!(listed[0].uploader.as_deref(), Some("ana"));
    }

    #[tokio::test]
    async fn test_unreadable_file_is_io_error() {
        let (_documents, sessions, service) = service(UploadOutcome::Accepted);
        let session = sessions.create_session("Upload").await;

        let err = service
            .upload_from_chat(&session.id, Path::new("/nonexistent/nope.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, docchat_core::DocChatError::Io { .. }));
    }
}
