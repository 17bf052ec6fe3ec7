use std::fmt;

use serde::{Deserialize, Serialize};

/// Placeholder rendered wherever a type name could not be recovered.
pub const UNKNOWN_TYPE: &str = "<unknown>";

/// Dotted type name of a persistent object, e.g. `persistent.mapping.PersistentMapping`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeName(String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Join a module path and a type name with a dot.
    pub fn from_parts(module: &str, name: &str) -> Self {
        if module.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{module}.{name}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last dotted component.
    pub fn short_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Debug for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeName({})", self.0)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// The name itself, or [`UNKNOWN_TYPE`] when absent.
pub fn display_or_unknown(name: Option<&TypeName>) -> &str {
    name.map_or(UNKNOWN_TYPE, TypeName::as_str)
}
