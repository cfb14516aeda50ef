//! In-memory document store.

use super::model::{DocumentRecord, DocumentStats, DocumentStatus};
use crate::error::{DocChatError, Result};
use tokio::sync::RwLock;

/// Thread-safe store for document records.
///
/// Status updates go through [`DocumentStore::mark_ready`] and
/// [`DocumentStore::mark_error`], which enforce that only a `Processing`
/// document may change state.
#[derive(Default)]
pub struct DocumentStore {
    documents: RwLock<Vec<DocumentRecord>>,
}

impl DocumentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record at the front of the list and returns its id.
    pub async fn insert(&self, record: DocumentRecord) -> String {
        let id = record.id.clone();
        let mut documents = self.documents.write().await;
        documents.insert(0, record);
        id
    }

    /// Lists all documents in display order.
    pub async fn list(&self) -> Vec<DocumentRecord> {
        self.documents.read().await.clone()
    }

    /// Lists documents whose name contains `query`, case-insensitively.
    pub async fn search(&self, query: &str) -> Vec<DocumentRecord> {
        let needle = query.to_lowercase();
        let documents = self.documents.read().await;
        documents
            .iter()
            .filter(|d| d.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// Returns a document by id.
    pub async fn get(&self, document_id: &str) -> Option<DocumentRecord> {
        let documents = self.documents.read().await;
        documents.iter().find(|d| d.id == document_id).cloned()
    }

    /// Marks a processing document as ready.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if the document does not exist, or an
    /// `InvalidTransition` error if it is not in the `Processing` state.
    pub async fn mark_ready(&self, document_id: &str) -> Result<()> {
        self.transition(document_id, DocumentStatus::Ready).await
    }

    /// Marks a processing document as failed.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if the document does not exist, or an
    /// `InvalidTransition` error if it is not in the `Processing` state.
    pub async fn mark_error(&self, document_id: &str) -> Result<()> {
        self.transition(document_id, DocumentStatus::Error).await
    }

    async fn transition(&self, document_id: &str, to: DocumentStatus) -> Result<()> {
        let mut documents = self.documents.write().await;
        let record = documents
            .iter_mut()
            .find(|d| d.id == document_id)
            .ok_or_else(|| DocChatError::not_found("document", document_id))?;
        if record.status != DocumentStatus::Processing {
            return Err(DocChatError::invalid_transition(
                document_id,
                record.status.to_string(),
                to.to_string(),
            ));
        }
        record.status = to;
        Ok(())
    }

    /// Deletes a document.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if no document has the given id.
    pub async fn delete(&self, document_id: &str) -> Result<()> {
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|d| d.id != document_id);
        if documents.len() == before {
            return Err(DocChatError::not_found("document", document_id));
        }
        Ok(())
    }

    /// Computes aggregate figures over the document list.
    pub async fn stats(&self) -> DocumentStats {
        let documents = self.documents.read().await;
        let mut stats = DocumentStats {
            total: documents.len(),
            ..DocumentStats::default()
        };
        for record in documents.iter() {
            stats.total_bytes += record.size;
            match record.status {
                DocumentStatus::Ready => stats.ready += 1,
                DocumentStatus::Processing => stats.processing += 1,
                DocumentStatus::Error => stats.error += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, size: u64) -> DocumentRecord {
        DocumentRecord::new(name, size, "application/pdf")
    }

    #[tokio::test]
    async fn test_insert_puts_newest_first() {
        let store = DocumentStore::new();
        store.insert(record("old.pdf", 10)).await;
        let newest = store.insert(record("new.pdf", 20)).await;

        let listed = store.list().await;
        assert_eq!(listed[0].id, newest);
    }

    #[tokio::test]
    async fn test_processing_to_ready_and_error() {
        let store = DocumentStore::new();
        let ready_id = store.insert(record("a.pdf", 1)).await;
        let error_id = store.insert(record("b.pdf", 1)).await;

        store.mark_ready(&ready_id).await.unwrap();
        store.mark_error(&error_id).await.unwrap();

        assert_eq!(store.get(&ready_id).await.unwrap().status, DocumentStatus::Ready);
        assert_eq!(store.get(&error_id).await.unwrap().status, DocumentStatus::Error);
    }

    #[tokio::test]
    async fn test_terminal_states_reject_further_transitions() {
        let store = DocumentStore::new();
        let id = store.insert(record("a.pdf", 1)).await;
        store.mark_ready(&id).await.unwrap();

        let err = store.mark_error(&id).await.unwrap_err();
        assert!(err.is_invalid_transition());
        let err = store.mark_ready(&id).await.unwrap_err();
        assert!(err.is_invalid_transition());
    }

    #[tokio::test]
    async fn test_search_matches_name_case_insensitively() {
        let store = DocumentStore::new();
        store.insert(record("Q3_Financial_Report.pdf", 1)).await;
        store.insert(record("Employee_Handbook.docx", 1)).await;

        assert_eq!(store.search("financial").await.len(), 1);
        assert_eq!(store.search("HANDBOOK").await.len(), 1);
        assert_eq!(store.search("missing").await.len(), 0);
    }

    #[tokio::test]
    async fn test_stats_counts_by_status() {
        let store = DocumentStore::new();
        let a = store.insert(record("a.pdf", 100)).await;
        let b = store.insert(record("b.pdf", 200)).await;
        store.insert(record("c.pdf", 300)).await;
        store.mark_ready(&a).await.unwrap();
        store.mark_error(&b).await.unwrap();

        let stats = store.stats().await;
        assert_eq!(stats.total, 3);
        assert_eq!(stats.total_bytes, 600);
        assert_eq!(stats.ready, 1);
        assert_eq!(stats.error, 1);
        assert_eq!(stats.processing, 1);
    }

    #[tokio::test]
    async fn test_delete_unknown_document_is_not_found() {
        let store = DocumentStore::new();
        assert!(store.delete("missing").await.unwrap_err().is_not_found());
    }
}
