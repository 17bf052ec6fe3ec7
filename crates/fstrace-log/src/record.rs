use fstrace_types::{Oid, Tid};

use crate::format::TransactionStatus;

/// Metadata of one transaction, decoded eagerly from its header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionMeta {
    pub tid: Tid,
    /// Byte offset of the transaction header in the file.
    pub offset: u64,
    /// Header length field (`tlen`): the transaction without its trailer.
    pub length: u64,
    pub status: TransactionStatus,
    pub user: String,
    pub description: String,
    /// Opaque extension bytes, passed through undecoded.
    pub extension: Vec<u8>,
}

/// One object revision inside a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataRecord {
    pub oid: Oid,
    pub tid: Tid,
    /// Byte offset of this record's header in the file.
    pub offset: u64,
    /// Offset of the previous record for the same oid, 0 if none.
    pub prev: u64,
    /// New object state. `None` for back-pointer records.
    pub payload: Option<Vec<u8>>,
    /// Present when the record carries no payload. 0 marks a deletion or an
    /// undone creation.
    pub back_pointer: Option<u64>,
}

impl DataRecord {
    /// `true` if this record carries new object state.
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }
}
