//! Validated bulk upload queue.
//!
//! Files admitted to the queue move through
//! `Pending -> Uploading (progress 0-100) -> Success | Error`; a failed file
//! goes back to `Pending` only via an explicit retry. Queued files are
//! processed strictly sequentially: file N+1 does not leave `Pending` before
//! file N reaches a terminal state.

use docchat_core::error::{DocChatError, Result};
use docchat_core::upload::{UploadConstraints, ValidationError};
use docchat_gateway::upload::{UploadGateway, UploadOutcome, UploadRequest};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Per-file state in the bulk queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueuedState {
    /// Admitted, waiting its turn
    Pending,
    /// In flight, progress in percent
    Uploading { progress: u8 },
    /// Uploaded and accepted
    Success,
    /// Upload failed; retryable
    Error { reason: String },
}

impl QueuedState {
    /// Whether no further automatic transition occurs from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading { .. } => "uploading",
            Self::Success => "success",
            Self::Error { .. } => "error",
        }
    }
}

/// A file admitted to the bulk queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedFile {
    /// Queue entry id
    pub id: String,
    /// Original filename
    pub name: String,
    /// Path the bytes are read from at upload time
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Current state
    pub state: QueuedState,
}

/// Outcome of admitting a file to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enqueued {
    /// Admitted; `file_id` addresses the queue entry
    Accepted { file_id: String },
    /// Rejected before any network call
    Rejected { error: ValidationError },
}

/// Callback invoked on every queue state change.
pub type ProgressObserver = Arc<dyn Fn(&str, &QueuedState) + Send + Sync>;

/// The bulk "Upload Documents" drop-zone flow.
///
/// `BulkUploader` is responsible for:
/// - Validating candidate files against the configured constraints
/// - Driving each admitted file through its upload state machine
/// - Serializing queue drains so files upload one at a time, in order
/// - Re-running individual files on explicit retry, independently of a
///   drain in progress
pub struct BulkUploader {
    gateway: Arc<dyn UploadGateway>,
    constraints: UploadConstraints,
    /// Pacing between progress steps while a file is staged
    step_delay: Duration,
    queue: RwLock<Vec<QueuedFile>>,
    /// Held for the whole of a drain, so two drains cannot interleave
    drain_lock: Mutex<()>,
    observer: Option<ProgressObserver>,
}

impl BulkUploader {
    /// Creates a new `BulkUploader`.
    ///
    /// # Arguments
    ///
    /// * `gateway` - The upload gateway client
    /// * `constraints` - Validation limits for admitted files
    /// * `step_delay` - Pacing between progress steps
    pub fn new(
        gateway: Arc<dyn UploadGateway>,
        constraints: UploadConstraints,
        step_delay: Duration,
    ) -> Self {
        Self {
            gateway,
            constraints,
            step_delay,
            queue: RwLock::new(Vec::new()),
            drain_lock: Mutex::new(()),
            observer: None,
        }
    }

    /// Registers a callback invoked on every queue state change.
    pub fn with_observer(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Validates a file and admits it to the queue.
    ///
    /// Rejections happen before any network call and carry the rule that
    /// failed; they are part of the normal flow, not errors.
    ///
    /// # Errors
    ///
    /// Returns an `Io` error when the file's metadata cannot be read.
    pub async fn enqueue(&self, path: &Path) -> Result<Enqueued> {
        let metadata = tokio::fs::metadata(path).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let size = metadata.len();

        let mut queue = self.queue.write().await;
        if let Some(error) = self.constraints.validate(&name, size, queue.len()) {
            tracing::debug!(%name, "file rejected: {}", error);
            return Ok(Enqueued::Rejected { error });
        }

        let file = QueuedFile {
            id: Uuid::new_v4().to_string(),
            name,
            path: path.to_path_buf(),
            size,
            state: QueuedState::Pending,
        };
        let file_id = file.id.clone();
        queue.push(file);
        Ok(Enqueued::Accepted { file_id })
    }

    /// Returns a snapshot of the queue.
    pub async fn queue(&self) -> Vec<QueuedFile> {
        self.queue.read().await.clone()
    }

    /// Uploads every pending file, one at a time, in queue order.
    pub async fn process_all(&self) {
        let _guard = self.drain_lock.lock().await;
        while let Some(file_id) = self.next_pending().await {
            self.upload_one(&file_id).await;
        }
    }

    /// Resets a failed file to `Pending` and immediately re-runs it,
    /// independently of the other queued files: a drain in progress is
    /// neither waited on nor disturbed. The file is claimed atomically, so
    /// it cannot also be picked up by the drain.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if no queue entry has the given id, or an
    /// `InvalidTransition` error if the entry is not in the `Error` state.
    pub async fn retry(&self, file_id: &str) -> Result<()> {
        {
            let mut queue = self.queue.write().await;
            let file = queue
                .iter_mut()
                .find(|f| f.id == file_id)
                .ok_or_else(|| DocChatError::not_found("upload", file_id))?;
            if !matches!(file.state, QueuedState::Error { .. }) {
                return Err(DocChatError::invalid_transition(
                    file_id,
                    file.state.label(),
                    QueuedState::Pending.label(),
                ));
            }
            file.state = QueuedState::Pending;
        }
        self.notify(file_id, &QueuedState::Pending).await;

        self.upload_one(file_id).await;
        Ok(())
    }

    async fn next_pending(&self) -> Option<String> {
        let queue = self.queue.read().await;
        queue
            .iter()
            .find(|f| f.state == QueuedState::Pending)
            .map(|f| f.id.clone())
    }

    /// Drives one file from `Pending` to a terminal state.
    async fn upload_one(&self, file_id: &str) {
        // Whoever flips Pending -> Uploading owns the file; a concurrent
        // drain or retry that lost the race backs off here.
        if !self.claim(file_id).await {
            return;
        }
        let Some(file) = self.snapshot(file_id).await else {
            return;
        };

        let bytes = match tokio::fs::read(&file.path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                self.set_state(
                    file_id,
                    QueuedState::Error {
                        reason: format!("could not read file: {}", err),
                    },
                )
                .await;
                return;
            }
        };

        // Staged progress: ten paced steps while the file is prepared, the
        // POST itself completes the bar.
        for step in 1..=10u8 {
            if !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }
            self.set_state(
                file_id,
                QueuedState::Uploading {
                    progress: step * 10,
                },
            )
            .await;
        }

        let mime_type = mime_guess::from_path(&file.path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let outcome = self
            .gateway
            .submit_upload(UploadRequest::new(file.name.clone(), mime_type, bytes))
            .await;

        let terminal = match outcome {
            UploadOutcome::Accepted => QueuedState::Success,
            UploadOutcome::Failed { reason } => QueuedState::Error { reason },
        };
        self.set_state(file_id, terminal).await;
    }

    /// Atomically takes a file from `Pending` to `Uploading`, returning
    /// whether this caller won the claim.
    async fn claim(&self, file_id: &str) -> bool {
        let claimed = {
            let mut queue = self.queue.write().await;
            match queue.iter_mut().find(|f| f.id == file_id) {
                Some(file) if file.state == QueuedState::Pending => {
                    file.state = QueuedState::Uploading { progress: 0 };
                    true
                }
                _ => false,
            }
        };
        if claimed {
            self.notify(file_id, &QueuedState::Uploading { progress: 0 })
                .await;
        }
        claimed
    }

    async fn snapshot(&self, file_id: &str) -> Option<QueuedFile> {
        let queue = self.queue.read().await;
        queue.iter().find(|f| f.id == file_id).cloned()
    }

    async fn set_state(&self, file_id: &str, state: QueuedState) {
        {
            let mut queue = self.queue.write().await;
            if let Some(file) = queue.iter_mut().find(|f| f.id == file_id) {
                file.state = state.clone();
            }
        }
        self.notify(file_id, &state).await;
    }

    async fn notify(&self, file_id: &str, state: &QueuedState) {
        if let Some(observer) = &self.observer {
            observer(file_id, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockUploadGateway {
        /// Outcomes handed out per call; the last one repeats
        outcomes: Vec<UploadOutcome>,
        calls: AtomicUsize,
        /// Park the given call (0-based) until notified
        gate: Option<(usize, Arc<tokio::sync::Notify>)>,
    }

    impl MockUploadGateway {
        fn accepting() -> Self {
            Self {
                outcomes: vec![UploadOutcome::Accepted],
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        fn failing_once(reason: &str) -> Self {
            Self {
                outcomes: vec![
                    UploadOutcome::Failed {
                        reason: reason.to_string(),
                    },
                    UploadOutcome::Accepted,
                ],
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        fn gated_on_call(mut self, call: usize, gate: Arc<tokio::sync::Notify>) -> Self {
            self.gate = Some((call, gate));
            self
        }
    }

    #[async_trait]
    impl UploadGateway for MockUploadGateway {
        async fn submit_upload(&self, _request: UploadRequest) -> UploadOutcome {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some((gated_call, gate)) = &self.gate {
                if call == *gated_call {
                    gate.notified().await;
                }
            }
            self.outcomes
                .get(call)
                .or_else(|| self.outcomes.last())
                .cloned()
                .expect("mock gateway needs at least one outcome")
        }
    }

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn uploader(gateway: MockUploadGateway, constraints: UploadConstraints) -> BulkUploader {
        BulkUploader::new(Arc::new(gateway), constraints, Duration::ZERO)
    }

    fn recording_observer() -> (ProgressObserver, Arc<StdMutex<Vec<(String, QueuedState)>>>) {
        let events: Arc<StdMutex<Vec<(String, QueuedState)>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = events.clone();
        let observer: ProgressObserver = Arc::new(move |file_id, state| {
            sink.lock().unwrap().push((file_id.to_string(), state.clone()));
        });
        (observer, events)
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected_before_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "big.pdf", &[0u8; 64]);
        let constraints = UploadConstraints {
            max_file_size: 16,
            ..UploadConstraints::default()
        };
        let uploader = uploader(MockUploadGateway::accepting(), constraints);

        let Enqueued::Rejected { error } = uploader.enqueue(&path).await.unwrap() else {
            panic!("expected rejection");
        };
        assert!(matches!(error, ValidationError::FileTooLarge { .. }));
        assert!(uploader.queue().await.is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "report.csv", b"a,b");
        let constraints = UploadConstraints {
            accepted_extensions: vec![".pdf".to_string(), ".docx".to_string()],
            ..UploadConstraints::default()
        };
        let uploader = uploader(MockUploadGateway::accepting(), constraints);

        let Enqueued::Rejected { error } = uploader.enqueue(&path).await.unwrap() else {
            panic!("expected rejection");
        };
        assert_eq!(
            error.to_string(),
            "File type not supported. Accepted types: .pdf, .docx"
        );
    }

    #[tokio::test]
    async fn test_batch_limit_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let constraints = UploadConstraints {
            max_files: 2,
            ..UploadConstraints::default()
        };
        let uploader = uploader(MockUploadGateway::accepting(), constraints);

        for i in 0..2 {
            let path = write_file(&dir, &format!("doc{}.pdf", i), b"x");
            assert!(matches!(
                uploader.enqueue(&path).await.unwrap(),
                Enqueued::Accepted { .. }
            ));
        }
        let path = write_file(&dir, "one-more.pdf", b"x");
        let Enqueued::Rejected { error } = uploader.enqueue(&path).await.unwrap() else {
            panic!("expected rejection");
        };
        assert_eq!(error.to_string(), "Maximum 2 files allowed");
    }

    #[tokio::test]
    async fn test_files_upload_strictly_sequentially() {
        let dir = tempfile::tempdir().unwrap();
        let (observer, events) = recording_observer();
        let uploader = BulkUploader::new(
            Arc::new(MockUploadGateway::accepting()),
            UploadConstraints::default(),
            Duration::ZERO,
        )
        .with_observer(observer);

        let mut ids = Vec::new();
        for i in 0..3 {
            let path = write_file(&dir, &format!("doc{}.pdf", i), b"content");
            let Enqueued::Accepted { file_id } = uploader.enqueue(&path).await.unwrap() else {
                panic!("expected acceptance");
            };
            ids.push(file_id);
        }

        uploader.process_all().await;

        let queue = uploader.queue().await;
        assert!(queue.iter().all(|f| f.state == QueuedState::Success));

        // No event for a later file may appear before the previous file's
        // terminal event.
        let events = events.lock().unwrap();
        for pair in ids.windows(2) {
            let first_terminal = events
                .iter()
                .position(|(id, state)| *id == pair[0] && state.is_terminal())
                .expect("file reached a terminal state");
            let next_start = events
                .iter()
                .position(|(id, _)| *id == pair[1])
                .expect("next file was processed");
            assert!(first_terminal < next_start);
        }
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let (observer, events) = recording_observer();
        let uploader = BulkUploader::new(
            Arc::new(MockUploadGateway::accepting()),
            UploadConstraints::default(),
            Duration::ZERO,
        )
        .with_observer(observer);

        let path = write_file(&dir, "doc.pdf", b"content");
        uploader.enqueue(&path).await.unwrap();
        uploader.process_all().await;

        let events = events.lock().unwrap();
        let mut last = 0u8;
        for (_, state) in events.iter() {
            if let QueuedState::Uploading { progress } = state {
                assert!(*progress >= last);
                last = *progress;
            }
        }
        assert_eq!(last, 100);
    }

    #[tokio::test]
    async fn test_failed_file_can_be_retried() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = uploader(
            MockUploadGateway::failing_once("backend busy"),
            UploadConstraints::default(),
        );
        let path = write_file(&dir, "doc.pdf", b"content");
        let Enqueued::Accepted { file_id } = uploader.enqueue(&path).await.unwrap() else {
            panic!("expected acceptance");
        };

        uploader.process_all().await;
        let queue = uploader.queue().await;
        assert!(matches!(
            &queue[0].state,
            QueuedState::Error { reason } if reason == "backend busy"
        ));

        uploader.retry(&file_id).await.unwrap();
        let queue = uploader.queue().await;
        assert_eq!(queue[0].state, QueuedState::Success);
    }

    #[tokio::test]
    async fn test_retry_does_not_wait_for_a_running_drain() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(tokio::sync::Notify::new());
        // Call 0: the first file fails. Call 1: the drain parks on the
        // second file until notified. Call 2: the retried file succeeds.
        let gateway = MockUploadGateway::failing_once("boom").gated_on_call(1, gate.clone());
        let uploader = Arc::new(BulkUploader::new(
            Arc::new(gateway),
            UploadConstraints::default(),
            Duration::ZERO,
        ));

        let failed_path = write_file(&dir, "failed.pdf", b"content");
        let Enqueued::Accepted { file_id: failed_id } =
            uploader.enqueue(&failed_path).await.unwrap()
        else {
            panic!("expected acceptance");
        };
        uploader.process_all().await;

        let slow_path = write_file(&dir, "slow.pdf", b"content");
        let Enqueued::Accepted { file_id: slow_id } = uploader.enqueue(&slow_path).await.unwrap()
        else {
            panic!("expected acceptance");
        };
        let drain = {
            let uploader = uploader.clone();
            tokio::spawn(async move { uploader.process_all().await })
        };

        // Wait until the drain is parked inside the gateway on the slow file.
        loop {
            let queue = uploader.queue().await;
            let slow = queue.iter().find(|f| f.id == slow_id).unwrap();
            if matches!(slow.state, QueuedState::Uploading { progress: 100 }) {
                break;
            }
            tokio::task::yield_now().await;
        }

        // The retry must finish while the drain is still blocked.
        uploader.retry(&failed_id).await.unwrap();
        let queue = uploader.queue().await;
        assert_eq!(
            queue.iter().find(|f| f.id == failed_id).unwrap().state,
            QueuedState::Success
        );
        assert!(matches!(
            queue.iter().find(|f| f.id == slow_id).unwrap().state,
            QueuedState::Uploading { .. }
        ));

        gate.notify_one();
        drain.await.unwrap();
        let queue = uploader.queue().await;
        assert_eq!(
            queue.iter().find(|f| f.id == slow_id).unwrap().state,
            QueuedState::Success
        );
    }

    #[tokio::test]
    async fn test_retry_requires_error_state() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = uploader(MockUploadGateway::accepting(), UploadConstraints::default());
        let path = write_file(&dir, "doc.pdf", b"content");
        let Enqueued::Accepted { file_id } = uploader.enqueue(&path).await.unwrap() else {
            panic!("expected acceptance");
        };

        let err = uploader.retry(&file_id).await.unwrap_err();
        assert!(err.is_invalid_transition());

        uploader.process_all().await;
        let err = uploader.retry(&file_id).await.unwrap_err();
        assert!(err.is_invalid_transition());
    }

    #[tokio::test]
    async fn test_retry_unknown_file_is_not_found() {
        let uploader = uploader(MockUploadGateway::accepting(), UploadConstraints::default());
        assert!(uploader.retry("missing").await.unwrap_err().is_not_found());
    }
}
