/// Errors produced while decoding or encoding object payloads.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("empty payload")]
    Empty,

    #[error("unsupported payload format version {0}")]
    UnsupportedVersion(u8),

    #[error("payload decode failed: {0}")]
    Decode(String),

    #[error("payload encode failed: {0}")]
    Encode(String),
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
