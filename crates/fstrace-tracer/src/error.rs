use fstrace_log::LogError;

/// Errors that abort a trace.
///
/// Undecodable payloads never surface here: they degrade to `<unknown>`
/// types and empty reference lists.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// The log could not be opened or is structurally broken.
    #[error(transparent)]
    Log(#[from] LogError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TraceError {
    /// `true` if the storage path was missing or not a regular file.
    pub fn is_invalid_source(&self) -> bool {
        matches!(self, Self::Log(LogError::InvalidSource { .. }))
    }

    /// `true` if the scan stopped on a structurally broken log.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Log(e) if e.is_malformed())
    }
}

/// Result alias for tracer operations.
pub type TraceResult<T> = Result<T, TraceError>;
