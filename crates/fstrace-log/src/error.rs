use std::io;
use std::path::PathBuf;

use fstrace_types::Oid;

/// Errors produced while opening, reading or writing a transaction log.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The path is missing or is not a regular file.
    #[error("must specify an existing storage file")]
    InvalidSource { path: PathBuf },

    /// The file does not start with a known magic.
    #[error("invalid log magic: expected FS21 or FS30, got {actual:?}")]
    InvalidMagic { actual: String },

    /// Structural inconsistency found while scanning.
    #[error("malformed log at offset {offset}: {reason}")]
    Malformed { offset: u64, reason: String },

    /// A metadata field does not fit its 16-bit length prefix.
    #[error("{field} is too long for the log format: {len} bytes")]
    FieldTooLong { field: &'static str, len: usize },

    /// Store records need a payload; use a back-pointer record for "no data".
    #[error("empty payload for oid {0}")]
    EmptyPayload(Oid),

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl LogError {
    pub(crate) fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        Self::Malformed {
            offset,
            reason: reason.into(),
        }
    }

    /// `true` for errors describing a structurally broken log.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. } | Self::InvalidMagic { .. })
    }
}

/// Convenience alias used throughout the log crate.
pub type LogResult<T> = Result<T, LogError>;
