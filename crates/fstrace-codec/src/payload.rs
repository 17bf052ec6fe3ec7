//! The default object payload format.
//!
//! ```text
//! payload := version u8 | bincode(WirePayload)
//! WirePayload { class: bytes, refs: Vec<WireRef>, state: bytes }
//! WireRef     := Bare(oid) | Typed(oid, class bytes)
//! ```
//!
//! `class` comes first so the type of an object can be read without
//! decoding the rest. Class names are UTF-8; an empty or non-UTF-8 class
//! decodes as unknown rather than failing.

use bincode::Options;
use fstrace_types::{Oid, TypeName};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CodecError, CodecResult};
use crate::traits::{PersistentRef, ReferenceExtractor, TypeResolver};

/// Leading byte of every payload in this format.
pub const PAYLOAD_FORMAT_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
enum WireRef {
    Bare(u64),
    Typed(u64, Vec<u8>),
}

#[derive(Serialize, Deserialize)]
struct WirePayload {
    class: Vec<u8>,
    refs: Vec<WireRef>,
    state: Vec<u8>,
}

/// Prefix of [`WirePayload`] needed to resolve the type.
#[derive(Deserialize)]
struct WireHeader {
    class: Vec<u8>,
}

/// Prefix of [`WirePayload`] needed to extract references.
#[derive(Deserialize)]
struct WireRefs {
    _class: Vec<u8>,
    refs: Vec<WireRef>,
}

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

fn decode_prefix<'a, T: Deserialize<'a>>(payload: &'a [u8]) -> CodecResult<T> {
    let body = match payload.split_first() {
        None => return Err(CodecError::Empty),
        Some((&PAYLOAD_FORMAT_VERSION, body)) => body,
        Some((&version, _)) => return Err(CodecError::UnsupportedVersion(version)),
    };
    wire_options()
        .with_limit(body.len() as u64)
        .deserialize(body)
        .map_err(|e| CodecError::Decode(e.to_string()))
}

fn class_name(bytes: Vec<u8>) -> Option<TypeName> {
    String::from_utf8(bytes)
        .ok()
        .filter(|name| !name.is_empty())
        .map(TypeName::from)
}

impl WireRef {
    fn into_ref(self) -> PersistentRef {
        match self {
            Self::Bare(oid) => PersistentRef::untyped(Oid::new(oid)),
            Self::Typed(oid, class) => PersistentRef {
                oid: Oid::new(oid),
                type_name: class_name(class),
            },
        }
    }
}

/// Decode only the type name of a payload.
pub fn decode_header(payload: &[u8]) -> CodecResult<Option<TypeName>> {
    let header: WireHeader = decode_prefix(payload)?;
    Ok(class_name(header.class))
}

/// Decode the references held by a payload, in encoding order.
pub fn decode_references(payload: &[u8]) -> CodecResult<Vec<PersistentRef>> {
    let refs: WireRefs = decode_prefix(payload)?;
    Ok(refs.refs.into_iter().map(WireRef::into_ref).collect())
}

/// A decoded (or to-be-encoded) object payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectPayload {
    pub type_name: TypeName,
    pub references: Vec<PersistentRef>,
    /// Opaque object state.
    pub state: Vec<u8>,
}

impl ObjectPayload {
    pub fn new(type_name: impl Into<TypeName>) -> Self {
        Self {
            type_name: type_name.into(),
            references: Vec::new(),
            state: Vec::new(),
        }
    }

    /// Add a reference that records the target's type.
    pub fn with_typed_reference(mut self, oid: Oid, type_name: impl Into<TypeName>) -> Self {
        self.references.push(PersistentRef::typed(oid, type_name));
        self
    }

    /// Add a reference that records only the target's oid.
    pub fn with_untyped_reference(mut self, oid: Oid) -> Self {
        self.references.push(PersistentRef::untyped(oid));
        self
    }

    pub fn with_state(mut self, state: Vec<u8>) -> Self {
        self.state = state;
        self
    }

    /// Serialize into the wire format.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let wire = WirePayload {
            class: self.type_name.as_str().as_bytes().to_vec(),
            refs: self
                .references
                .iter()
                .map(|r| match &r.type_name {
                    Some(name) => WireRef::Typed(r.oid.get(), name.as_str().as_bytes().to_vec()),
                    None => WireRef::Bare(r.oid.get()),
                })
                .collect(),
            state: self.state.clone(),
        };
        let mut out = vec![PAYLOAD_FORMAT_VERSION];
        wire_options()
            .serialize_into(&mut out, &wire)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(out)
    }

    /// Fully decode a payload. Undecodable class names are rejected here;
    /// use [`ObjectCodec`] for best-effort inspection.
    pub fn decode(payload: &[u8]) -> CodecResult<Self> {
        let wire: WirePayload = decode_prefix(payload)?;
        let type_name = class_name(wire.class)
            .ok_or_else(|| CodecError::Decode("missing or invalid class name".into()))?;
        Ok(Self {
            type_name,
            references: wire.refs.into_iter().map(WireRef::into_ref).collect(),
            state: wire.state,
        })
    }
}

/// Best-effort introspection of [`ObjectPayload`]-formatted payloads.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjectCodec;

impl TypeResolver for ObjectCodec {
    fn resolve(&self, payload: &[u8]) -> Option<TypeName> {
        match decode_header(payload) {
            Ok(name) => name,
            Err(e) => {
                debug!(error = %e, "payload header not decodable");
                None
            }
        }
    }
}

impl ReferenceExtractor for ObjectCodec {
    fn extract(&self, payload: &[u8]) -> CodecResult<Vec<PersistentRef>> {
        decode_references(payload)
    }
}
