//! Sequential access to an append-only transaction log.
//!
//! The log is a sequence of transactions, each holding a header, free-text
//! metadata, the data records written by that transaction and a trailer
//! repeating the transaction length (see [`format`] for the byte layout).
//!
//! # Architecture
//!
//! - **LogReader**: forward-only, streaming scan; transactions are produced
//!   one at a time and lend out the reader to walk their data records
//! - **LogWriter**: minimal appender used to build logs with known offsets
//!
//! The reader never writes and never loads the whole file.

pub mod config;
pub mod error;
pub mod format;
pub mod reader;
pub mod record;
pub mod writer;

pub use config::ReaderConfig;
pub use error::{LogError, LogResult};
pub use format::TransactionStatus;
pub use reader::{DataRecords, LogReader, TransactionRecord};
pub use record::{DataRecord, TransactionMeta};
pub use writer::{CommittedTransaction, LogWriter, PendingRecord, PendingTransaction};
