//! Foundation types for fstrace.
//!
//! Every other fstrace crate depends on `fstrace-types`.
//!
//! # Key Types
//!
//! - [`Oid`] — 64-bit persistent object identifier
//! - [`Tid`] — 64-bit transaction identifier that doubles as a packed wall-clock timestamp
//! - [`TimeStamp`] — decoded, display-only form of a [`Tid`]
//! - [`TypeName`] — dotted type name recovered from a payload, where one can be recovered

pub mod error;
pub mod oid;
pub mod tid;
pub mod type_name;

pub use error::TypeError;
pub use oid::Oid;
pub use tid::{Tid, TimeStamp};
pub use type_name::{display_or_unknown, TypeName, UNKNOWN_TYPE};

/// Render a 64-bit id as compact hex: big-endian, leading zeros stripped,
/// padded back to an even digit count, `00` for zero.
pub(crate) fn compact_hex(value: u64) -> String {
    let full = hex::encode(value.to_be_bytes());
    let trimmed = full.trim_start_matches('0');
    if trimmed.is_empty() {
        "00".to_string()
    } else if trimmed.len() % 2 == 1 {
        format!("0{trimmed}")
    } else {
        trimmed.to_string()
    }
}
