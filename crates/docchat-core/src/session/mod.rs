//! Chat session domain: models and the in-memory session store.

pub mod model;
pub mod store;

pub use model::{ChatSession, Message, MessageRole, MessageStatus, SessionSummary, Source};
pub use store::ChatStore;
