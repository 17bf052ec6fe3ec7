use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::compact_hex;
use crate::error::TypeError;

/// Persistent object identifier.
///
/// An `Oid` names one object across all of its revisions. On disk it is
/// stored as 8 big-endian bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Oid(u64);

impl Oid {
    /// The root object id.
    pub const ZERO: Self = Self(0);

    /// Wrap a raw integer.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw integer value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The 8-byte big-endian form used on disk.
    pub const fn to_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Decode from the 8-byte big-endian form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; 8] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: 8,
            actual: bytes.len(),
        })?;
        Ok(Self(u64::from_be_bytes(arr)))
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({self})")
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", compact_hex(self.0))
    }
}

impl From<u64> for Oid {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Oid> for u64 {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

/// Accepts `0x`-prefixed hex (`0x1f`) or plain decimal (`31`).
impl FromStr for Oid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(digits) => u64::from_str_radix(digits, 16),
            None => s.parse::<u64>(),
        };
        parsed
            .map(Self)
            .map_err(|e| TypeError::InvalidOid(format!("{s:?}: {e}")))
    }
}
