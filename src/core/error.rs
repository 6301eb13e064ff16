//! Error types for the photo sync tool
//!
//! Local, recoverable conditions (unreadable entries, undecodable images,
//! malformed sidecars, cache problems) are absorbed where they occur and
//! counted in the run statistics. Only root-level failures propagate
//! through these types to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the photo sync tool
#[derive(Error, Debug)]
pub enum SyncError {
    /// General I/O error
    #[error("IO error: {0}")]
    IoError(String),

    /// A root directory required for the run could not be opened.
    /// This is the only condition that aborts a run outright.
    #[error("Directory not found or not readable: {0}")]
    RootNotFound(PathBuf),

    /// Failed to parse a sidecar metadata file
    #[error("Invalid sidecar '{path}': {message}")]
    SidecarError { path: PathBuf, message: String },

    /// Signature cache could not be written
    #[error("Cache write failed: {0}")]
    CacheError(String),

    /// The external metadata writer (exiftool) reported a failure
    #[error("Metadata writer error: {0}")]
    WriterError(String),

    /// exiftool is not installed or not on PATH
    #[error("exiftool not found. Install it to write metadata (macOS: brew install exiftool).")]
    ExifToolMissing,
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SyncError>;

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::IoError(err.to_string())
    }
}
