//! Gateway clients for the RAG backend.
//!
//! This crate is the only place that talks to the outside world: one JSON
//! query endpoint and one multipart upload endpoint, both consumed as black
//! boxes. Failures never cross the gateway boundary as errors; they are
//! folded into the reply types.

pub mod client;
pub mod query;
pub mod upload;

pub use client::RagApiClient;
pub use query::{QueryGateway, QueryReply};
pub use upload::{UploadGateway, UploadOutcome, UploadRequest};
