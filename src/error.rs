//! Error types for auto-unrar
//!
//! This module provides the error hierarchy used throughout the crate:
//! - [`Error`]: the crate-wide error with configuration, I/O, watcher and extraction variants
//! - [`ExtractionError`]: archive-level failures with the archive path attached
//!
//! Per-path failures never leave the orchestration task that produced them; they are
//! folded into an [`ExtractionOutcome`](crate::types::ExtractionOutcome) and logged.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for auto-unrar operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for auto-unrar
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "watch_root")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive extraction error
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Folder watching error
    #[error("folder watch error: {0}")]
    FolderWatch(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

impl From<notify::Error> for Error {
    fn from(e: notify::Error) -> Self {
        Error::FolderWatch(e.to_string())
    }
}

/// Archive-level errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Archive extraction failed (corrupt archive, unreadable volume, write failure, ...)
    #[error("extraction failed for {archive}: {reason}")]
    ExtractionFailed {
        /// The archive file that failed to extract
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// The archive is encrypted and cannot be opened without a password
    #[error("archive {archive} is encrypted")]
    WrongPassword {
        /// The encrypted archive that could not be opened
        archive: PathBuf,
    },

    /// Invalid path encountered while preparing extraction
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// The invalid path that was encountered
        path: PathBuf,
        /// The reason the path is invalid
        reason: String,
    },

    /// The file is not an archive format this crate handles
    #[error("unsupported archive: {archive}")]
    UnsupportedArchive {
        /// The file that was handed to an extractor
        archive: PathBuf,
    },
}
