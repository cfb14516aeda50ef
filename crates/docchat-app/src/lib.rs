//! Orchestration services for the docchat client.
//!
//! This crate wires the stores to the gateway clients: sending chat
//! messages, the chat-path document upload, and the validated bulk upload
//! queue. The presentation layer talks to these services and renders store
//! state; it never owns entities or sees a raw gateway failure.

pub mod bulk;
pub mod chat;
pub mod uploader;

pub use bulk::{BulkUploader, Enqueued, ProgressObserver, QueuedFile, QueuedState};
pub use chat::ChatService;
pub use uploader::{UploadReport, UploadService};
