//! On-disk layout of the transaction log.
//!
//! ```text
//! file        := magic transaction*
//! magic       := "FS21" | "FS30"
//! transaction := header[23] user[ulen] description[dlen] extension[elen]
//!                data_record* trailer[8]
//! header      := tid u64 | tlen u64 | status u8 | ulen u16 | dlen u16 | elen u16
//! trailer     := tlen u64   (repeats the header length)
//! data_record := dheader[42] [legacy[16] version[vlen]] (payload[plen] | back_pointer[8])
//! dheader     := oid u64 | tid u64 | prev u64 | tpos u64 | vlen u16 | plen u64
//! ```
//!
//! All integers are big-endian. `tlen` counts the transaction from its first
//! header byte up to, but excluding, the trailer, so the next transaction
//! starts at `pos + tlen + 8`. A data record with `plen == 0` carries an
//! 8-byte back-pointer instead of a payload.

use fstrace_types::{Oid, Tid};
use serde::{Deserialize, Serialize};

use crate::error::{LogError, LogResult};

/// Magic written by the current format revision.
pub const MAGIC: &[u8; 4] = b"FS21";
/// Magic of the otherwise identical later revision.
pub const MAGIC_ALT: &[u8; 4] = b"FS30";

pub const FILE_HEADER_LEN: u64 = 4;
pub const TRANSACTION_HEADER_LEN: u64 = 23;
pub const TRAILER_LEN: u64 = 8;
pub const DATA_HEADER_LEN: u64 = 42;
pub const BACK_POINTER_LEN: u64 = 8;
/// Bytes preceding the version string of a versioned (legacy) data record.
pub const LEGACY_VERSION_PREFIX_LEN: u64 = 16;

/// Returns `true` if `magic` names a supported format revision.
pub fn is_known_magic(magic: &[u8]) -> bool {
    magic == MAGIC || magic == MAGIC_ALT
}

/// Status byte of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// `' '`: an ordinary committed transaction.
    Committed,
    /// `'p'`: rewritten by a pack.
    Packed,
    /// `'u'`: undone.
    Undone,
    /// `'c'`: still being written. Only valid as the final transaction.
    InProgress,
}

impl TransactionStatus {
    /// The on-disk status byte.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Committed => b' ',
            Self::Packed => b'p',
            Self::Undone => b'u',
            Self::InProgress => b'c',
        }
    }

    /// Parse a status byte; `None` if unknown.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b' ' => Some(Self::Committed),
            b'p' => Some(Self::Packed),
            b'u' => Some(Self::Undone),
            b'c' => Some(Self::InProgress),
            _ => None,
        }
    }
}

/// Fixed-size part of a transaction record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TransactionHeader {
    pub tid: Tid,
    pub tlen: u64,
    pub status: TransactionStatus,
    pub ulen: u16,
    pub dlen: u16,
    pub elen: u16,
}

impl TransactionHeader {
    pub fn decode(buf: &[u8; TRANSACTION_HEADER_LEN as usize], offset: u64) -> LogResult<Self> {
        let status = TransactionStatus::from_byte(buf[16]).ok_or_else(|| {
            LogError::malformed(offset, format!("invalid transaction status byte {:#04x}", buf[16]))
        })?;
        Ok(Self {
            tid: Tid::new(be_u64(&buf[0..8])),
            tlen: be_u64(&buf[8..16]),
            status,
            ulen: be_u16(&buf[17..19]),
            dlen: be_u16(&buf[19..21]),
            elen: be_u16(&buf[21..23]),
        })
    }

    pub fn encode(&self) -> [u8; TRANSACTION_HEADER_LEN as usize] {
        let mut buf = [0u8; TRANSACTION_HEADER_LEN as usize];
        buf[0..8].copy_from_slice(&self.tid.to_bytes());
        buf[8..16].copy_from_slice(&self.tlen.to_be_bytes());
        buf[16] = self.status.as_byte();
        buf[17..19].copy_from_slice(&self.ulen.to_be_bytes());
        buf[19..21].copy_from_slice(&self.dlen.to_be_bytes());
        buf[21..23].copy_from_slice(&self.elen.to_be_bytes());
        buf
    }

    /// Length of the user, description and extension fields together.
    pub fn metadata_len(&self) -> u64 {
        u64::from(self.ulen) + u64::from(self.dlen) + u64::from(self.elen)
    }
}

/// Fixed-size part of a data record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct DataHeader {
    pub oid: Oid,
    pub tid: Tid,
    /// Offset of the previous record for the same oid, 0 if none.
    pub prev: u64,
    /// Offset of the owning transaction header.
    pub tpos: u64,
    pub vlen: u16,
    pub plen: u64,
}

impl DataHeader {
    pub fn decode(buf: &[u8; DATA_HEADER_LEN as usize]) -> Self {
        Self {
            oid: Oid::new(be_u64(&buf[0..8])),
            tid: Tid::new(be_u64(&buf[8..16])),
            prev: be_u64(&buf[16..24]),
            tpos: be_u64(&buf[24..32]),
            vlen: be_u16(&buf[32..34]),
            plen: be_u64(&buf[34..42]),
        }
    }

    pub fn encode(&self) -> [u8; DATA_HEADER_LEN as usize] {
        let mut buf = [0u8; DATA_HEADER_LEN as usize];
        buf[0..8].copy_from_slice(&self.oid.to_bytes());
        buf[8..16].copy_from_slice(&self.tid.to_bytes());
        buf[16..24].copy_from_slice(&self.prev.to_be_bytes());
        buf[24..32].copy_from_slice(&self.tpos.to_be_bytes());
        buf[32..34].copy_from_slice(&self.vlen.to_be_bytes());
        buf[34..42].copy_from_slice(&self.plen.to_be_bytes());
        buf
    }

    /// Bytes between the end of this header and the payload.
    pub fn version_len(&self) -> u64 {
        if self.vlen == 0 {
            0
        } else {
            LEGACY_VERSION_PREFIX_LEN + u64::from(self.vlen)
        }
    }

    /// Bytes occupied by the payload or the back-pointer.
    pub fn body_len(&self) -> u64 {
        if self.plen == 0 {
            BACK_POINTER_LEN
        } else {
            self.plen
        }
    }
}

pub(crate) fn be_u64(bytes: &[u8]) -> u64 {
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(arr)
}

pub(crate) fn be_u16(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}
