use serde::{Deserialize, Serialize};

/// Configuration for [`crate::LogReader`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Capacity of the buffered file reader in bytes (default: 64 KiB).
    pub buffer_capacity: usize,
    /// Largest payload a single data record may carry (default: 256 MiB).
    /// Longer records are reported as malformed instead of being allocated.
    pub max_payload_len: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 64 * 1024,
            max_payload_len: 256 * 1024 * 1024,
        }
    }
}
