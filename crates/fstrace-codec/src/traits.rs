use fstrace_types::{Oid, TypeName};

use crate::error::CodecResult;

/// A persistent reference found inside a payload.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PersistentRef {
    /// The referenced object.
    pub oid: Oid,
    /// Type of the referenced object, when the encoding carries it.
    ///
    /// Some reference encodings store only the oid. `None` here is a
    /// permanent property of those encodings, not a decoding failure.
    pub type_name: Option<TypeName>,
}

impl PersistentRef {
    pub fn typed(oid: Oid, type_name: impl Into<TypeName>) -> Self {
        Self {
            oid,
            type_name: Some(type_name.into()),
        }
    }

    pub fn untyped(oid: Oid) -> Self {
        Self {
            oid,
            type_name: None,
        }
    }
}

/// Recovers the type name of the object a payload describes.
///
/// Implementations must never fail: an unrecognizable header yields `None`.
pub trait TypeResolver {
    fn resolve(&self, payload: &[u8]) -> Option<TypeName>;
}

/// Extracts the persistent references held by a payload, in encoding order.
///
/// An `Err` means the reference set as a whole could not be decoded; callers
/// treat it as "no references" and carry on.
pub trait ReferenceExtractor {
    fn extract(&self, payload: &[u8]) -> CodecResult<Vec<PersistentRef>>;
}

impl<T: TypeResolver + ?Sized> TypeResolver for Box<T> {
    fn resolve(&self, payload: &[u8]) -> Option<TypeName> {
        (**self).resolve(payload)
    }
}

impl<T: ReferenceExtractor + ?Sized> ReferenceExtractor for Box<T> {
    fn extract(&self, payload: &[u8]) -> CodecResult<Vec<PersistentRef>> {
        (**self).extract(payload)
    }
}
