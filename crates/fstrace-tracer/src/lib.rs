//! Forensic tracing of object identifiers through a transaction log.
//!
//! A [`Tracer`] is pointed at a log file, given the oids of interest and
//! run once. The resulting [`Trace`] holds, per oid, every transaction in
//! which the oid received a new revision, referenced another object, or was
//! referenced by one, including references from objects that are not
//! themselves traced.
//!
//! ```no_run
//! use fstrace_tracer::Tracer;
//!
//! let mut tracer = Tracer::new("var/Data.fs")?;
//! tracer.register_oids([0x00u64, 0x01]);
//! print!("{}", tracer.run()?.report());
//! # Ok::<(), fstrace_tracer::TraceError>(())
//! ```
//!
//! Payloads are interpreted through the [`fstrace_codec`] seams; a payload
//! that cannot be decoded costs its type name or its references, never the
//! scan.

pub mod config;
pub mod error;
pub mod history;
mod report;
pub mod tracer;

pub use config::TraceConfig;
pub use error::{TraceError, TraceResult};
pub use history::{NewRevision, OidHistory, ReferenceEvent, RevisionEvent, ScanStats, TransactionInfo};
pub use tracer::{Trace, Tracer};
