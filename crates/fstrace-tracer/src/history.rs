//! Per-oid history accumulated during a scan.

use std::sync::Arc;

use fstrace_log::TransactionMeta;
use fstrace_types::{Oid, Tid, TypeName};
use serde::Serialize;

/// Transaction metadata shared by every event it produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransactionInfo {
    pub tid: Tid,
    /// Offset of the transaction header.
    pub offset: u64,
    pub user: String,
    pub description: String,
}

impl From<&TransactionMeta> for TransactionInfo {
    fn from(meta: &TransactionMeta) -> Self {
        Self {
            tid: meta.tid,
            offset: meta.offset,
            user: meta.user.clone(),
            description: meta.description.clone(),
        }
    }
}

/// The traced oid was given new state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewRevision {
    pub type_name: Option<TypeName>,
    /// Offset of the data record.
    pub offset: u64,
}

/// One side of a reference edge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReferenceEvent {
    /// The oid on the other end of the edge.
    pub oid: Oid,
    pub type_name: Option<TypeName>,
    /// Offset of the data record holding the reference.
    pub offset: u64,
}

/// Everything that happened to one traced oid within one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevisionEvent {
    pub transaction: Arc<TransactionInfo>,
    pub new_revision: Option<NewRevision>,
    /// Outgoing references, in encounter order.
    pub references: Vec<ReferenceEvent>,
    /// Incoming references, in encounter order.
    pub referenced_by: Vec<ReferenceEvent>,
}

impl RevisionEvent {
    fn new(transaction: Arc<TransactionInfo>) -> Self {
        Self {
            transaction,
            new_revision: None,
            references: Vec::new(),
            referenced_by: Vec::new(),
        }
    }

    /// Tid of the owning transaction.
    pub fn tid(&self) -> Tid {
        self.transaction.tid
    }
}

/// History of one traced oid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OidHistory {
    oid: Oid,
    /// Type of the revision with the highest tid whose type resolved.
    type_name: Option<(Tid, TypeName)>,
    /// Type recorded by the latest typed reference to this oid.
    type_hint: Option<TypeName>,
    events: Vec<RevisionEvent>,
}

impl OidHistory {
    pub(crate) fn new(oid: Oid) -> Self {
        Self {
            oid,
            type_name: None,
            type_hint: None,
            events: Vec::new(),
        }
    }

    pub fn oid(&self) -> Oid {
        self.oid
    }

    /// Best known type: from the object's newest resolved revision by tid,
    /// else from a typed reference to it.
    pub fn type_name(&self) -> Option<&TypeName> {
        self.type_name
            .as_ref()
            .map(|(_, name)| name)
            .or(self.type_hint.as_ref())
    }

    /// Events in ascending tid order (file order among equal tids).
    pub fn events(&self) -> &[RevisionEvent] {
        &self.events
    }

    /// Number of transactions that touched this oid.
    pub fn revision_count(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub(crate) fn record_new_revision(
        &mut self,
        txn: &Arc<TransactionInfo>,
        type_name: Option<TypeName>,
        offset: u64,
    ) {
        if let Some(name) = &type_name {
            let newer = self
                .type_name
                .as_ref()
                .map_or(true, |(tid, _)| txn.tid >= *tid);
            if newer {
                self.type_name = Some((txn.tid, name.clone()));
            }
        }
        self.event_mut(txn).new_revision = Some(NewRevision { type_name, offset });
    }

    pub(crate) fn record_reference(&mut self, txn: &Arc<TransactionInfo>, reference: ReferenceEvent) {
        self.event_mut(txn).references.push(reference);
    }

    pub(crate) fn record_referenced_by(
        &mut self,
        txn: &Arc<TransactionInfo>,
        reference: ReferenceEvent,
    ) {
        self.event_mut(txn).referenced_by.push(reference);
    }

    pub(crate) fn record_type_hint(&mut self, type_name: TypeName) {
        self.type_hint = Some(type_name);
    }

    /// Order events by tid. The sort is stable, so transactions sharing a
    /// tid keep file order.
    pub(crate) fn freeze(&mut self) {
        self.events.sort_by_key(RevisionEvent::tid);
    }

    /// Event for `txn`, created on first touch. Records of one transaction
    /// arrive contiguously, so only the last event can match.
    fn event_mut(&mut self, txn: &Arc<TransactionInfo>) -> &mut RevisionEvent {
        let current = matches!(
            self.events.last(),
            Some(last) if last.transaction.offset == txn.offset
        );
        if !current {
            self.events.push(RevisionEvent::new(Arc::clone(txn)));
        }
        let last = self.events.len() - 1;
        &mut self.events[last]
    }
}

/// Counters collected during a scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub transactions: u64,
    pub data_records: u64,
    /// Records without a payload (back-pointers and deletions).
    pub back_pointers: u64,
    /// Payloads whose reference list could not be decoded.
    pub undecodable_reference_sets: u64,
    /// Type resolutions that yielded no name.
    pub unresolved_types: u64,
}
