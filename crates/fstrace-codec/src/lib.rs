//! Payload introspection for fstrace.
//!
//! The tracer never interprets object state itself. It asks two questions
//! of every payload, through the traits in [`traits`]:
//!
//! - [`TypeResolver`]: what type of object is this?
//! - [`ReferenceExtractor`]: which other objects does it point at?
//!
//! [`ObjectCodec`] answers both for the payload format defined in
//! [`payload`]; other encodings plug in by implementing the traits.

pub mod error;
pub mod payload;
pub mod traits;

pub use error::{CodecError, CodecResult};
pub use payload::{ObjectCodec, ObjectPayload, PAYLOAD_FORMAT_VERSION};
pub use traits::{PersistentRef, ReferenceExtractor, TypeResolver};
