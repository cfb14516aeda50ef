//! Client-side validation for the bulk upload flow.
//!
//! Validation runs before any network call; a rejected file is never sent to
//! the backend. The chat-path upload deliberately skips these checks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Limits applied to files entering the bulk upload queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConstraints {
    /// Maximum file size in bytes
    pub max_file_size: u64,
    /// Accepted extensions, lowercase and dot-prefixed (".pdf", ".docx", ...)
    pub accepted_extensions: Vec<String>,
    /// Maximum number of files in one batch
    pub max_files: usize,
}

impl Default for UploadConstraints {
    fn default() -> Self {
        Self {
            max_file_size: 50 * BYTES_PER_MB,
            accepted_extensions: [".pdf", ".docx", ".txt", ".csv", ".xlsx", ".pptx"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_files: 10,
        }
    }
}

/// Why a file was rejected before upload.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("File size exceeds {limit_mb}MB limit")]
    FileTooLarge { limit_mb: u64 },

    #[error("File type not supported. Accepted types: {accepted}")]
    UnsupportedType { accepted: String },

    #[error("Maximum {max} files allowed")]
    TooManyFiles { max: usize },
}

impl UploadConstraints {
    /// Checks a candidate file against the constraints.
    ///
    /// `queued` is the number of files already admitted to the batch. Returns
    /// `None` when the file may be queued, or the first failed rule
    /// (size, then type, then count) otherwise.
    pub fn validate(&self, name: &str, size: u64, queued: usize) -> Option<ValidationError> {
        if size > self.max_file_size {
            return Some(ValidationError::FileTooLarge {
                limit_mb: self.max_file_size / BYTES_PER_MB,
            });
        }

        if !self.accepts_extension(name) {
            return Some(ValidationError::UnsupportedType {
                accepted: self.accepted_extensions.join(", "),
            });
        }

        if queued >= self.max_files {
            return Some(ValidationError::TooManyFiles {
                max: self.max_files,
            });
        }

        None
    }

    /// Whether the file's extension (substring after the last `.`,
    /// lowercased) is accepted.
    fn accepts_extension(&self, name: &str) -> bool {
        let Some((_, ext)) = name.rsplit_once('.') else {
            return false;
        };
        let ext = format!(".{}", ext.to_lowercase());
        self.accepted_extensions.iter().any(|a| *a == ext)
    }
}
