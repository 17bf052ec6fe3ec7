use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use fstrace_types::{Oid, Tid};
use tracing::debug;

use crate::error::{LogError, LogResult};
use crate::format::{
    DataHeader, TransactionHeader, TransactionStatus, BACK_POINTER_LEN, DATA_HEADER_LEN,
    FILE_HEADER_LEN, MAGIC, TRANSACTION_HEADER_LEN,
};

/// One data record queued in a [`PendingTransaction`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingRecord {
    /// New object state.
    Store { oid: Oid, payload: Vec<u8> },
    /// No new state; points at an earlier record (0 marks a deletion).
    BackPointer { oid: Oid, target: u64 },
}

impl PendingRecord {
    fn oid(&self) -> Oid {
        match self {
            Self::Store { oid, .. } | Self::BackPointer { oid, .. } => *oid,
        }
    }

    fn encoded_len(&self) -> u64 {
        DATA_HEADER_LEN
            + match self {
                Self::Store { payload, .. } => payload.len() as u64,
                Self::BackPointer { .. } => BACK_POINTER_LEN,
            }
    }
}

/// A transaction to be appended by [`LogWriter::commit`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingTransaction {
    pub user: String,
    pub description: String,
    pub extension: Vec<u8>,
    /// Explicit tid. When `None` the writer picks one from the wall clock.
    pub tid: Option<Tid>,
    pub status: TransactionStatus,
    pub records: Vec<PendingRecord>,
}

impl PendingTransaction {
    /// An empty committed transaction with no user.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            user: String::new(),
            description: description.into(),
            extension: Vec::new(),
            tid: None,
            status: TransactionStatus::Committed,
            records: Vec::new(),
        }
    }

    /// Set the user name.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Use `tid` verbatim, even if it is not after the previous transaction.
    pub fn with_tid(mut self, tid: Tid) -> Self {
        self.tid = Some(tid);
        self
    }

    /// Set the status byte written to the header.
    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the opaque extension bytes.
    pub fn with_extension(mut self, extension: Vec<u8>) -> Self {
        self.extension = extension;
        self
    }

    /// Queue new state for `oid`.
    pub fn store(mut self, oid: Oid, payload: Vec<u8>) -> Self {
        self.records.push(PendingRecord::Store { oid, payload });
        self
    }

    /// Queue a record that reuses the state stored at `target`.
    pub fn back_pointer(mut self, oid: Oid, target: u64) -> Self {
        self.records.push(PendingRecord::BackPointer { oid, target });
        self
    }

    /// Queue a deletion of `oid`.
    pub fn delete(self, oid: Oid) -> Self {
        self.back_pointer(oid, 0)
    }
}

/// Where a committed transaction landed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommittedTransaction {
    pub tid: Tid,
    /// Offset of the transaction header.
    pub offset: u64,
    /// Header length field; the trailer sits at `offset + length`.
    pub length: u64,
    /// Offset of each data record, in the order they were queued.
    pub record_offsets: Vec<u64>,
}

/// Appends transactions to a new log file.
///
/// This is a fixture builder, not a storage engine: there is no locking,
/// no index and no crash recovery. It exists so that logs with known
/// offsets can be produced for inspection and tests.
pub struct LogWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    /// Offset at which the next transaction will be written.
    offset: u64,
    last_tid: Tid,
    /// Most recent data record offset per oid, for `prev` pointers.
    last_record: HashMap<Oid, u64>,
}

impl LogWriter {
    /// Create (or truncate) the log at `path` and write the file magic.
    pub fn create(path: impl AsRef<Path>) -> LogResult<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(MAGIC)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            offset: FILE_HEADER_LEN,
            last_tid: Tid::ZERO,
            last_record: HashMap::new(),
        })
    }

    /// Append one transaction and flush it.
    pub fn commit(&mut self, txn: PendingTransaction) -> LogResult<CommittedTransaction> {
        let ulen = field_len("user", txn.user.len())?;
        let dlen = field_len("description", txn.description.len())?;
        let elen = field_len("extension", txn.extension.len())?;

        let tid = match txn.tid {
            Some(tid) => tid,
            None => Tid::now().later_than(self.last_tid),
        };
        let offset = self.offset;

        let mut header = TransactionHeader {
            tid,
            tlen: 0,
            status: txn.status,
            ulen,
            dlen,
            elen,
        };
        let records_len: u64 = txn.records.iter().map(PendingRecord::encoded_len).sum();
        header.tlen = TRANSACTION_HEADER_LEN + header.metadata_len() + records_len;

        let mut buf = Vec::with_capacity(header.tlen as usize + 8);
        buf.extend_from_slice(&header.encode());
        buf.extend_from_slice(txn.user.as_bytes());
        buf.extend_from_slice(txn.description.as_bytes());
        buf.extend_from_slice(&txn.extension);

        let mut record_offsets = Vec::with_capacity(txn.records.len());
        let mut touched = Vec::with_capacity(txn.records.len());
        for record in &txn.records {
            let oid = record.oid();
            let record_offset = offset + buf.len() as u64;
            let prev = touched
                .iter()
                .rev()
                .find(|(o, _)| *o == oid)
                .map(|(_, at)| *at)
                .or_else(|| self.last_record.get(&oid).copied())
                .unwrap_or(0);

            let plen = match record {
                PendingRecord::Store { payload, .. } => {
                    if payload.is_empty() {
                        return Err(LogError::EmptyPayload(oid));
                    }
                    payload.len() as u64
                }
                PendingRecord::BackPointer { .. } => 0,
            };
            let data_header = DataHeader {
                oid,
                tid,
                prev,
                tpos: offset,
                vlen: 0,
                plen,
            };
            buf.extend_from_slice(&data_header.encode());
            match record {
                PendingRecord::Store { payload, .. } => buf.extend_from_slice(payload),
                PendingRecord::BackPointer { target, .. } => {
                    buf.extend_from_slice(&target.to_be_bytes())
                }
            }

            record_offsets.push(record_offset);
            touched.push((oid, record_offset));
        }
        buf.extend_from_slice(&header.tlen.to_be_bytes());

        self.writer.write_all(&buf)?;
        self.writer.flush()?;

        self.offset += buf.len() as u64;
        self.last_tid = self.last_tid.max(tid);
        self.last_record.extend(touched);

        debug!(tid = %tid, offset, records = record_offsets.len(), "transaction committed");
        Ok(CommittedTransaction {
            tid,
            offset,
            length: header.tlen,
            record_offsets,
        })
    }

    /// Offset at which the next transaction will be written.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Path of the log being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and sync the file to disk.
    pub fn finish(mut self) -> LogResult<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

fn field_len(field: &'static str, len: usize) -> LogResult<u16> {
    u16::try_from(len).map_err(|_| LogError::FieldTooLong { field, len })
}
