use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use fstrace_types::Tid;
use tracing::{debug, warn};

use crate::config::ReaderConfig;
use crate::error::{LogError, LogResult};
use crate::format::{
    is_known_magic, DataHeader, TransactionHeader, TransactionStatus, DATA_HEADER_LEN,
    FILE_HEADER_LEN, TRAILER_LEN, TRANSACTION_HEADER_LEN,
};
use crate::record::{DataRecord, TransactionMeta};

/// Bounds of the transaction whose data records are currently being read.
#[derive(Clone, Copy, Debug)]
struct OpenTransaction {
    offset: u64,
    tid: Tid,
    length: u64,
    /// Offset of the next unread data record.
    cursor: u64,
    /// Offset of the trailer; data records end here.
    data_end: u64,
}

/// Forward-only reader over a transaction log.
///
/// Transactions are produced in file order by [`LogReader::next_transaction`];
/// each one lends out the reader to walk its data records lazily. Nothing is
/// buffered beyond the current record, so arbitrarily large logs can be
/// scanned. The reader cannot be rewound: open a new one for another pass.
///
/// Any error leaves the reader exhausted; later calls yield nothing.
pub struct LogReader {
    path: PathBuf,
    file: BufReader<File>,
    file_len: u64,
    config: ReaderConfig,
    /// Physical position of `file`.
    pos: u64,
    /// Offset of the next transaction header.
    next_offset: u64,
    open: Option<OpenTransaction>,
    last_tid: Option<Tid>,
    exhausted: bool,
}

impl LogReader {
    /// Open the log at `path` with the default configuration.
    pub fn open(path: impl AsRef<Path>) -> LogResult<Self> {
        Self::open_with_config(path, ReaderConfig::default())
    }

    /// Open the log at `path`.
    ///
    /// Fails with [`LogError::InvalidSource`] if `path` is not an existing
    /// regular file, and with [`LogError::InvalidMagic`] if the file does not
    /// start with a known magic. A zero-length file is an empty log.
    pub fn open_with_config(path: impl AsRef<Path>, config: ReaderConfig) -> LogResult<Self> {
        let path = path.as_ref();
        Self::validate_source(path)?;

        let file = File::open(path)?;
        let file_len = file.metadata()?.len();

        let mut reader = Self {
            path: path.to_path_buf(),
            file: BufReader::with_capacity(config.buffer_capacity, file),
            file_len,
            config,
            pos: 0,
            next_offset: FILE_HEADER_LEN,
            open: None,
            last_tid: None,
            exhausted: file_len == 0,
        };

        if file_len == 0 {
            debug!(path = %path.display(), "empty storage file");
            return Ok(reader);
        }

        let mut magic = [0u8; FILE_HEADER_LEN as usize];
        let available = file_len.min(FILE_HEADER_LEN) as usize;
        reader.read_exact_at(0, &mut magic[..available])?;
        if available < magic.len() || !is_known_magic(&magic) {
            return Err(LogError::InvalidMagic {
                actual: String::from_utf8_lossy(&magic[..available]).into_owned(),
            });
        }

        debug!(path = %path.display(), file_len, "opened storage file");
        Ok(reader)
    }

    /// Check that `path` names an existing regular file.
    pub fn validate_source(path: &Path) -> LogResult<()> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => Ok(()),
            _ => Err(LogError::InvalidSource {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the log file when it was opened.
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Advance to the next transaction.
    ///
    /// Data records the caller did not read from the previous transaction
    /// are skipped, and its trailer is verified before moving on. Returns
    /// `Ok(None)` at the end of the log, or at a trailing transaction that
    /// is still in progress. An in-progress transaction followed by more
    /// data is malformed.
    pub fn next_transaction(&mut self) -> LogResult<Option<TransactionRecord<'_>>> {
        match self.advance() {
            Ok(Some(meta)) => Ok(Some(TransactionRecord { meta, reader: self })),
            Ok(None) => Ok(None),
            Err(e) => {
                self.poison();
                Err(e)
            }
        }
    }

    fn advance(&mut self) -> LogResult<Option<TransactionMeta>> {
        self.close_open_transaction()?;
        if self.exhausted || self.next_offset >= self.file_len {
            self.exhausted = true;
            return Ok(None);
        }

        let offset = self.next_offset;
        let remaining = self.file_len - offset;
        if remaining < TRANSACTION_HEADER_LEN {
            return Err(LogError::malformed(
                offset,
                format!("truncated transaction header: only {remaining} bytes left"),
            ));
        }

        let mut buf = [0u8; TRANSACTION_HEADER_LEN as usize];
        self.read_exact_at(offset, &mut buf)?;
        let header = TransactionHeader::decode(&buf, offset)?;

        if header.status == TransactionStatus::InProgress {
            // Only the tail may be in progress. Its length may still be
            // unwritten, so a bogus or overlong tlen is accepted here.
            let end = offset
                .checked_add(header.tlen)
                .and_then(|e| e.checked_add(TRAILER_LEN));
            if matches!(end, Some(e) if e < self.file_len) {
                return Err(LogError::malformed(
                    offset,
                    "in-progress transaction is not the last in the log",
                ));
            }
            warn!(offset, tid = %header.tid, "transaction still in progress; ending scan");
            self.exhausted = true;
            return Ok(None);
        }

        let min_len = TRANSACTION_HEADER_LEN + header.metadata_len();
        if header.tlen < min_len {
            return Err(LogError::malformed(
                offset,
                format!(
                    "transaction length {} is shorter than its header ({min_len} bytes)",
                    header.tlen
                ),
            ));
        }
        let end = offset
            .checked_add(header.tlen)
            .and_then(|e| e.checked_add(TRAILER_LEN))
            .filter(|&e| e <= self.file_len)
            .ok_or_else(|| {
                LogError::malformed(
                    offset,
                    format!(
                        "transaction length {} runs past end of file ({} bytes)",
                        header.tlen, self.file_len
                    ),
                )
            })?;

        let mut field_offset = offset + TRANSACTION_HEADER_LEN;
        let user = self.read_vec(field_offset, u64::from(header.ulen))?;
        field_offset += u64::from(header.ulen);
        let description = self.read_vec(field_offset, u64::from(header.dlen))?;
        field_offset += u64::from(header.dlen);
        let extension = self.read_vec(field_offset, u64::from(header.elen))?;

        if let Some(last) = self.last_tid {
            if header.tid <= last {
                warn!(offset, tid = %header.tid, previous = %last, "transaction ids are not increasing");
            }
        }
        self.last_tid = Some(header.tid);

        self.open = Some(OpenTransaction {
            offset,
            tid: header.tid,
            length: header.tlen,
            cursor: offset + min_len,
            data_end: offset + header.tlen,
        });
        self.next_offset = end;

        Ok(Some(TransactionMeta {
            tid: header.tid,
            offset,
            length: header.tlen,
            status: header.status,
            user: String::from_utf8_lossy(&user).into_owned(),
            description: String::from_utf8_lossy(&description).into_owned(),
            extension,
        }))
    }

    fn close_open_transaction(&mut self) -> LogResult<()> {
        let Some(txn) = self.open.take() else {
            return Ok(());
        };
        let mut buf = [0u8; TRAILER_LEN as usize];
        self.read_exact_at(txn.data_end, &mut buf)?;
        let trailer = u64::from_be_bytes(buf);
        if trailer != txn.length {
            return Err(LogError::malformed(
                txn.data_end,
                format!(
                    "trailer length {trailer} does not match header length {} of transaction at {}",
                    txn.length, txn.offset
                ),
            ));
        }
        Ok(())
    }

    fn read_record(&mut self) -> LogResult<Option<DataRecord>> {
        let Some(txn) = self.open else {
            return Ok(None);
        };
        if txn.cursor >= txn.data_end {
            return Ok(None);
        }

        let offset = txn.cursor;
        if txn.data_end - offset < DATA_HEADER_LEN {
            return Err(LogError::malformed(
                offset,
                format!("data record header overruns transaction at {}", txn.offset),
            ));
        }

        let mut buf = [0u8; DATA_HEADER_LEN as usize];
        self.read_exact_at(offset, &mut buf)?;
        let header = DataHeader::decode(&buf);

        if header.tid != txn.tid {
            return Err(LogError::malformed(
                offset,
                format!(
                    "data record tid {} does not match transaction tid {}",
                    header.tid, txn.tid
                ),
            ));
        }
        if header.tpos != txn.offset {
            return Err(LogError::malformed(
                offset,
                format!(
                    "data record points at transaction {} instead of {}",
                    header.tpos, txn.offset
                ),
            ));
        }
        if header.plen > self.config.max_payload_len {
            return Err(LogError::malformed(
                offset,
                format!(
                    "payload of {} bytes exceeds limit of {}",
                    header.plen, self.config.max_payload_len
                ),
            ));
        }

        let body = offset + DATA_HEADER_LEN + header.version_len();
        let end = body
            .checked_add(header.body_len())
            .filter(|&e| e <= txn.data_end)
            .ok_or_else(|| LogError::malformed(offset, "data record overruns its transaction"))?;

        if header.vlen > 0 {
            debug!(offset, oid = %header.oid, "skipping legacy version data");
        }

        let (payload, back_pointer) = if header.plen == 0 {
            let mut ptr = [0u8; 8];
            self.read_exact_at(body, &mut ptr)?;
            (None, Some(u64::from_be_bytes(ptr)))
        } else {
            (Some(self.read_vec(body, header.plen)?), None)
        };

        if let Some(open) = self.open.as_mut() {
            open.cursor = end;
        }

        Ok(Some(DataRecord {
            oid: header.oid,
            tid: header.tid,
            offset,
            prev: header.prev,
            payload,
            back_pointer,
        }))
    }

    fn poison(&mut self) {
        self.open = None;
        self.exhausted = true;
    }

    fn seek_to(&mut self, offset: u64) -> LogResult<()> {
        if offset != self.pos {
            // Relative seeks keep the buffer when the target is already in it.
            self.file.seek_relative(offset as i64 - self.pos as i64)?;
            self.pos = offset;
        }
        Ok(())
    }

    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> LogResult<()> {
        self.seek_to(offset)?;
        match self.file.read_exact(buf) {
            Ok(()) => {
                self.pos += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                self.resync()?;
                Err(LogError::malformed(offset, "unexpected end of file"))
            }
            Err(e) => {
                self.resync()?;
                Err(e.into())
            }
        }
    }

    fn read_vec(&mut self, offset: u64, len: u64) -> LogResult<Vec<u8>> {
        let mut buf = vec![0u8; len as usize];
        self.read_exact_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Re-learn the physical position after a failed read.
    fn resync(&mut self) -> LogResult<()> {
        self.pos = self.file.stream_position()?;
        Ok(())
    }
}

impl std::fmt::Debug for LogReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogReader")
            .field("path", &self.path)
            .field("file_len", &self.file_len)
            .field("next_offset", &self.next_offset)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

/// A transaction produced by [`LogReader::next_transaction`].
///
/// Holds the reader until dropped; its data records are read on demand.
pub struct TransactionRecord<'r> {
    meta: TransactionMeta,
    reader: &'r mut LogReader,
}

impl<'r> TransactionRecord<'r> {
    pub fn meta(&self) -> &TransactionMeta {
        &self.meta
    }

    pub fn tid(&self) -> Tid {
        self.meta.tid
    }

    /// Offset of the transaction header.
    pub fn offset(&self) -> u64 {
        self.meta.offset
    }

    /// Read the next data record, or `None` once the transaction is exhausted.
    pub fn next_record(&mut self) -> LogResult<Option<DataRecord>> {
        let result = self.reader.read_record();
        if result.is_err() {
            self.reader.poison();
        }
        result
    }

    /// Iterate over the remaining data records.
    pub fn records(&mut self) -> DataRecords<'_, 'r> {
        DataRecords {
            txn: self,
            done: false,
        }
    }
}

/// Iterator over the data records of one transaction. Stops after the first error.
pub struct DataRecords<'t, 'r> {
    txn: &'t mut TransactionRecord<'r>,
    done: bool,
}

impl Iterator for DataRecords<'_, '_> {
    type Item = LogResult<DataRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.txn.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
