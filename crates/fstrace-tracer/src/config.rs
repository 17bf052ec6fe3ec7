use fstrace_log::ReaderConfig;
use serde::{Deserialize, Serialize};

use crate::error::{TraceError, TraceResult};

/// Configuration for a [`crate::Tracer`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Settings for the underlying log reader.
    pub reader: ReaderConfig,
}

impl TraceConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    ///
    /// ```toml
    /// [reader]
    /// buffer_capacity = 1048576
    /// max_payload_len = 16777216
    /// ```
    pub fn from_toml_str(s: &str) -> TraceResult<Self> {
        toml::from_str(s).map_err(|e| TraceError::Config(e.to_string()))
    }
}
