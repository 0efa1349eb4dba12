//! Error types for the dircontxt library
//!
//! This module defines every error that can surface from a snapshot run, an
//! archive read, or an ignore-rule compile. Recoverable conditions (a single
//! unreadable file, an invalid ignore line) are logged and recorded by the
//! component that hits them; only the variants below ever cross an API
//! boundary as `Err`.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the dircontxt library
pub type Result<T> = std::result::Result<T, DctxError>;

/// Main error type for all dircontxt operations
#[derive(Debug, Error)]
pub enum DctxError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Walk directory error from walkdir crate
    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// The finished archive could not be moved into place
    #[error("Failed to persist archive: {0}")]
    Persist(#[from] tempfile::PersistError),

    /// The walk root could not be stat'ed or enumerated
    #[error("Cannot read directory {path:?}: {source}")]
    RootUnreadable {
        /// Path of the walk root
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },

    /// A path that must be a directory is something else
    #[error("Not a directory: {0:?}")]
    NotADirectory(PathBuf),

    /// The snapshot target cannot be used to derive artifact names
    #[error("Invalid snapshot target: {0:?}")]
    InvalidTarget(PathBuf),

    /// Archive does not start with the expected signature
    #[error("Invalid archive signature")]
    InvalidSignature,

    /// Archive ended before a complete record could be read
    #[error("Archive is truncated")]
    TruncatedArchive,

    /// A stored or candidate path exceeds the archive's path limit
    #[error("Path too long: {len} bytes exceeds limit of {limit} bytes")]
    PathTooLong {
        /// Actual path length in bytes
        len: usize,
        /// Maximum allowed length
        limit: usize,
    },

    /// First record of the archive is not the root directory
    #[error("Archive root is not a directory")]
    RootNotDirectory,

    /// Structural inconsistency inside the archive header
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    /// Destination capacity is smaller than the stored content
    #[error("Buffer too small: need {needed} bytes, capacity is {capacity}")]
    BufferTooSmall {
        /// Stored content size
        needed: u64,
        /// Capacity offered by the caller
        capacity: usize,
    },

    /// A content read was requested for a directory node
    #[error("Not a file: {0}")]
    NotAFile(String),

    /// No node with the requested path exists in the archive
    #[error("Path not found in archive: {0}")]
    PathNotFound(String),

    /// Ignore pattern that cannot be compiled
    #[error("Invalid ignore pattern: {0}")]
    InvalidPattern(String),

    /// Clipboard tool missing or failed
    #[error("Clipboard error: {0}")]
    Clipboard(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DctxError {
    /// Create a corrupt-archive error with a custom message
    pub fn corrupt(msg: impl Into<String>) -> Self {
        DctxError::CorruptArchive(msg.into())
    }

    /// Create a clipboard error with a custom message
    pub fn clipboard(msg: impl Into<String>) -> Self {
        DctxError::Clipboard(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        DctxError::Internal(msg.into())
    }

    /// Map an I/O error raised while decoding an archive.
    ///
    /// An unexpected end of stream means the archive is truncated; every
    /// other failure is passed through unchanged.
    pub(crate) fn from_archive_io(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            DctxError::TruncatedArchive
        } else {
            DctxError::Io(err)
        }
    }

    /// Check if this error indicates a damaged or foreign archive
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            DctxError::InvalidSignature
                | DctxError::TruncatedArchive
                | DctxError::RootNotDirectory
                | DctxError::CorruptArchive(_)
                | DctxError::PathTooLong { .. }
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            DctxError::InvalidSignature => {
                "File is not a dircontxt archive (signature mismatch).".to_string()
            }
            DctxError::TruncatedArchive => {
                "Archive is incomplete. Re-run the snapshot to regenerate it.".to_string()
            }
            DctxError::RootUnreadable { path, .. } => {
                format!("Cannot read {:?}. Check that it exists and is readable.", path)
            }
            DctxError::Clipboard(msg) => {
                format!(
                    "{}. Install pbcopy, wl-copy, xclip or xsel, or run without --clipboard.",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }
}
