//! The scan driving a trace.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fstrace_codec::{ObjectCodec, ReferenceExtractor, TypeResolver};
use fstrace_log::{DataRecord, LogReader};
use fstrace_types::{Oid, TypeName};
use tracing::{debug, info};

use crate::config::TraceConfig;
use crate::error::TraceResult;
use crate::history::{OidHistory, ReferenceEvent, ScanStats, TransactionInfo};
use crate::report;

/// Collects the oids to trace and runs one pass over a log.
///
/// Consuming `self` in [`Tracer::run`] means oids can no longer be
/// registered once the scan has started, and a tracer runs at most once.
pub struct Tracer {
    path: PathBuf,
    config: TraceConfig,
    oids: BTreeSet<Oid>,
    resolver: Box<dyn TypeResolver + Send + Sync>,
    extractor: Box<dyn ReferenceExtractor + Send + Sync>,
}

impl Tracer {
    /// Create a tracer for the log at `path` with default settings.
    ///
    /// Fails with [`fstrace_log::LogError::InvalidSource`] unless `path`
    /// names an existing regular file. Nothing else is read yet.
    pub fn new(path: impl AsRef<Path>) -> TraceResult<Self> {
        Self::with_config(path, TraceConfig::default())
    }

    /// Create a tracer with explicit settings.
    pub fn with_config(path: impl AsRef<Path>, config: TraceConfig) -> TraceResult<Self> {
        let path = path.as_ref();
        LogReader::validate_source(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            config,
            oids: BTreeSet::new(),
            resolver: Box::new(ObjectCodec),
            extractor: Box::new(ObjectCodec),
        })
    }

    /// Replace the payload codec used to resolve types and references.
    pub fn with_codec<R, E>(mut self, resolver: R, extractor: E) -> Self
    where
        R: TypeResolver + Send + Sync + 'static,
        E: ReferenceExtractor + Send + Sync + 'static,
    {
        self.resolver = Box::new(resolver);
        self.extractor = Box::new(extractor);
        self
    }

    /// Add oids to the traced set. Duplicates are ignored.
    pub fn register_oids<I>(&mut self, oids: I)
    where
        I: IntoIterator,
        I::Item: Into<Oid>,
    {
        self.oids.extend(oids.into_iter().map(Into::into));
    }

    /// Traced oids in ascending order.
    pub fn oids(&self) -> impl Iterator<Item = Oid> + '_ {
        self.oids.iter().copied()
    }

    /// Path of the log to scan.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scan the whole log once and collect the history of every traced oid.
    ///
    /// Structural damage in the log aborts the scan; undecodable payloads
    /// only lose their type or references.
    pub fn run(self) -> TraceResult<Trace> {
        let Tracer {
            path,
            config,
            oids,
            resolver,
            extractor,
        } = self;

        let mut reader = LogReader::open_with_config(&path, config.reader)?;
        let mut scan = Scan {
            resolver: &*resolver,
            extractor: &*extractor,
            histories: oids.into_iter().map(|oid| (oid, OidHistory::new(oid))).collect(),
            stats: ScanStats::default(),
        };
        debug!(path = %path.display(), oids = scan.histories.len(), "trace started");

        while let Some(mut txn) = reader.next_transaction()? {
            scan.stats.transactions += 1;
            let info = Arc::new(TransactionInfo::from(txn.meta()));
            while let Some(record) = txn.next_record()? {
                scan.record(&info, &record);
            }
        }

        let Scan {
            mut histories,
            stats,
            ..
        } = scan;
        for history in histories.values_mut() {
            history.freeze();
        }
        info!(
            path = %path.display(),
            transactions = stats.transactions,
            data_records = stats.data_records,
            back_pointers = stats.back_pointers,
            undecodable_reference_sets = stats.undecodable_reference_sets,
            unresolved_types = stats.unresolved_types,
            "trace complete"
        );
        Ok(Trace {
            path,
            histories,
            stats,
        })
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("path", &self.path)
            .field("config", &self.config)
            .field("oids", &self.oids)
            .finish_non_exhaustive()
    }
}

struct Scan<'c> {
    resolver: &'c (dyn TypeResolver + Send + Sync),
    extractor: &'c (dyn ReferenceExtractor + Send + Sync),
    histories: BTreeMap<Oid, OidHistory>,
    stats: ScanStats,
}

impl Scan<'_> {
    fn record(&mut self, txn: &Arc<TransactionInfo>, record: &DataRecord) {
        let Self {
            resolver,
            extractor,
            histories,
            stats,
        } = self;
        stats.data_records += 1;

        let offset = record.offset;
        let Some(payload) = record.payload.as_deref() else {
            stats.back_pointers += 1;
            if histories.contains_key(&record.oid) {
                debug!(
                    oid = %record.oid,
                    offset,
                    back_pointer = ?record.back_pointer,
                    "record without payload skipped"
                );
            }
            return;
        };

        // Resolved at most once per record, and only when someone needs it.
        let mut source_type: Option<Option<TypeName>> = None;
        let traced = histories.contains_key(&record.oid);
        if let Some(history) = histories.get_mut(&record.oid) {
            let type_name = resolve(*resolver, payload, stats);
            history.record_new_revision(txn, type_name.clone(), offset);
            source_type = Some(type_name);
        }

        let references = match extractor.extract(payload) {
            Ok(references) => references,
            Err(e) => {
                stats.undecodable_reference_sets += 1;
                debug!(oid = %record.oid, offset, error = %e, "references not decodable");
                Vec::new()
            }
        };

        for reference in references {
            if traced {
                if let Some(history) = histories.get_mut(&record.oid) {
                    history.record_reference(
                        txn,
                        ReferenceEvent {
                            oid: reference.oid,
                            type_name: reference.type_name.clone(),
                            offset,
                        },
                    );
                }
            }
            if let Some(target) = histories.get_mut(&reference.oid) {
                let type_name = source_type
                    .get_or_insert_with(|| resolve(*resolver, payload, stats))
                    .clone();
                target.record_referenced_by(
                    txn,
                    ReferenceEvent {
                        oid: record.oid,
                        type_name,
                        offset,
                    },
                );
                if let Some(hint) = reference.type_name {
                    target.record_type_hint(hint);
                }
            }
        }
    }
}

fn resolve(resolver: &dyn TypeResolver, payload: &[u8], stats: &mut ScanStats) -> Option<TypeName> {
    let type_name = resolver.resolve(payload);
    if type_name.is_none() {
        stats.unresolved_types += 1;
    }
    type_name
}

/// Result of a finished scan.
///
/// `Display` renders the report: one section per traced oid, in ascending
/// oid order.
#[derive(Clone, Debug)]
pub struct Trace {
    path: PathBuf,
    histories: BTreeMap<Oid, OidHistory>,
    stats: ScanStats,
}

impl Trace {
    /// The full report as a string.
    pub fn report(&self) -> String {
        self.to_string()
    }

    /// Write the report into `out`.
    pub fn write_report<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        self.histories
            .values()
            .try_for_each(|history| report::write_history(out, history))
    }

    /// History of `oid`, if it was registered.
    pub fn history(&self, oid: impl Into<Oid>) -> Option<&OidHistory> {
        self.histories.get(&oid.into())
    }

    /// Histories in ascending oid order.
    pub fn histories(&self) -> impl Iterator<Item = &OidHistory> {
        self.histories.values()
    }

    /// Traced oids in ascending order.
    pub fn oids(&self) -> impl Iterator<Item = Oid> + '_ {
        self.histories.keys().copied()
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    /// Path of the scanned log.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_report(f)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use fstrace_codec::{CodecError, CodecResult, ObjectPayload, PersistentRef};
    use fstrace_log::{CommittedTransaction, LogWriter, PendingTransaction};
    use fstrace_types::Tid;
    use proptest::prelude::*;
    use tempfile::TempDir;

    use super::*;

    const MAPPING: &str = "persistent.mapping.PersistentMapping";
    const TREE: &str = "BTrees.OOBTree.OOBTree";

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    }

    fn payload(type_name: &str, refs: &[u64]) -> Vec<u8> {
        refs.iter()
            .fold(ObjectPayload::new(type_name), |p, &oid| {
                p.with_untyped_reference(Oid::new(oid))
            })
            .encode()
            .unwrap()
    }

    /// Header line of a transaction block as the report renders it.
    fn tid_line(txn: &CommittedTransaction) -> String {
        format!("    tid {} offset={} {}", txn.tid, txn.offset, txn.tid.timestamp())
    }

    fn trace(path: &Path, oids: &[u64]) -> Trace {
        let mut tracer = Tracer::new(path).unwrap();
        tracer.register_oids(oids.iter().copied());
        tracer.run().unwrap()
    }

    struct Fixture {
        _dir: TempDir,
        path: PathBuf,
        writer: LogWriter,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("Data.fs");
            let writer = LogWriter::create(&path).unwrap();
            Self {
                _dir: dir,
                path,
                writer,
            }
        }

        fn commit(&mut self, txn: PendingTransaction) -> CommittedTransaction {
            self.writer.commit(txn).unwrap()
        }
    }

    #[test]
    fn empty_log_reports_every_oid_as_untouched() {
        init_tracing();
        let fx = Fixture::new();
        let trace = trace(&fx.path, &[0x12_3456, 1, 0]);
        assert_eq!(
            trace.report(),
            "oid 0x00 <unknown> 0 revisions\n\
             \x20   this oid was neither defined nor referenced\n\
             oid 0x01 <unknown> 0 revisions\n\
             \x20   this oid was neither defined nor referenced\n\
             oid 0x123456 <unknown> 0 revisions\n\
             \x20   this oid was neither defined nor referenced\n"
        );
        assert_eq!(trace.stats(), &ScanStats::default());
    }

    #[test]
    fn zero_length_file_is_an_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Data.fs");
        fs::write(&path, b"").unwrap();
        let trace = trace(&path, &[0]);
        assert!(trace.history(0u64).unwrap().is_empty());
    }

    #[test]
    fn no_registered_oids_gives_empty_report() {
        let mut fx = Fixture::new();
        fx.commit(PendingTransaction::new("x").store(Oid::new(0), payload(MAPPING, &[1])));
        let trace = trace(&fx.path, &[]);
        assert_eq!(trace.report(), "");
        assert_eq!(trace.stats().transactions, 1);
    }

    #[test]
    fn creation_transaction() {
        let mut fx = Fixture::new();
        let t1 = fx.commit(
            PendingTransaction::new("initial database creation")
                .store(Oid::new(0), payload(MAPPING, &[])),
        );
        assert_eq!(t1.offset, 4);
        assert_eq!(t1.record_offsets, vec![52]);

        let trace = trace(&fx.path, &[0, 1]);
        let expected = format!(
            "oid 0x00 {MAPPING} 1 revision\n\
             {}\n\
             \x20       tid user=''\n\
             \x20       tid description='initial database creation'\n\
             \x20       new revision {MAPPING} at 52\n\
             oid 0x01 <unknown> 0 revisions\n\
             \x20   this oid was neither defined nor referenced\n",
            tid_line(&t1),
        );
        assert_eq!(trace.report(), expected);
    }

    #[test]
    fn reference_and_back_reference() {
        init_tracing();
        let mut fx = Fixture::new();
        let t1 = fx.commit(
            PendingTransaction::new("initial database creation")
                .store(Oid::new(0), payload(MAPPING, &[])),
        );
        let t2 = fx.commit(
            PendingTransaction::new("added a tree")
                .with_user("admin")
                .store(Oid::new(0), payload(MAPPING, &[1])),
        );
        let t3 = fx.commit(
            PendingTransaction::new("circling back").store(Oid::new(1), payload(TREE, &[0])),
        );
        let r2 = t2.record_offsets[0];
        let r3 = t3.record_offsets[0];

        let trace = trace(&fx.path, &[1, 0, 2]);
        let expected = format!(
            "oid 0x00 {MAPPING} 3 revisions\n\
             {t1}\n\
             \x20       tid user=''\n\
             \x20       tid description='initial database creation'\n\
             \x20       new revision {MAPPING} at 52\n\
             {t2}\n\
             \x20       tid user='admin'\n\
             \x20       tid description='added a tree'\n\
             \x20       new revision {MAPPING} at {r2}\n\
             \x20       references 0x01 <unknown> at {r2}\n\
             {t3}\n\
             \x20       tid user=''\n\
             \x20       tid description='circling back'\n\
             \x20       referenced by 0x01 {TREE} at {r3}\n\
             oid 0x01 {TREE} 2 revisions\n\
             {t2}\n\
             \x20       tid user='admin'\n\
             \x20       tid description='added a tree'\n\
             \x20       referenced by 0x00 {MAPPING} at {r2}\n\
             {t3}\n\
             \x20       tid user=''\n\
             \x20       tid description='circling back'\n\
             \x20       new revision {TREE} at {r3}\n\
             \x20       references 0x00 <unknown> at {r3}\n\
             oid 0x02 <unknown> 0 revisions\n\
             \x20   this oid was neither defined nor referenced\n",
            t1 = tid_line(&t1),
            t2 = tid_line(&t2),
            t3 = tid_line(&t3),
        );
        assert_eq!(trace.report(), expected);
    }

    #[test]
    fn untraced_referrer_still_reported() {
        let mut fx = Fixture::new();
        let t = fx.commit(
            PendingTransaction::new("link")
                .store(Oid::new(9), payload(MAPPING, &[5]))
                .store(Oid::new(8), payload(TREE, &[7])),
        );

        let trace = trace(&fx.path, &[5]);
        let history = trace.history(5u64).unwrap();
        assert_eq!(history.revision_count(), 1);
        let event = &history.events()[0];
        assert!(event.new_revision.is_none());
        assert!(event.references.is_empty());
        assert_eq!(
            event.referenced_by,
            vec![ReferenceEvent {
                oid: Oid::new(9),
                type_name: Some(TypeName::from(MAPPING)),
                offset: t.record_offsets[0],
            }]
        );
        // The referrer's type was needed; the unrelated record's was not.
        assert_eq!(trace.stats().unresolved_types, 0);
    }

    #[test]
    fn edges_between_traced_oids_are_symmetric() {
        let mut fx = Fixture::new();
        fx.commit(
            PendingTransaction::new("graph")
                .store(Oid::new(1), payload(MAPPING, &[2, 3]))
                .store(Oid::new(2), payload(TREE, &[3]))
                .store(Oid::new(3), payload(TREE, &[1])),
        );
        fx.commit(PendingTransaction::new("again").store(Oid::new(2), payload(TREE, &[1])));

        let trace = trace(&fx.path, &[1, 2, 3]);
        for a in trace.histories() {
            for event in a.events() {
                for out in &event.references {
                    let b = trace.history(out.oid).unwrap();
                    let back = b
                        .events()
                        .iter()
                        .filter(|e| e.transaction.offset == event.transaction.offset)
                        .flat_map(|e| &e.referenced_by)
                        .any(|r| r.oid == a.oid() && r.offset == out.offset);
                    assert!(back, "missing back edge {} -> {}", a.oid(), out.oid);
                }
            }
        }
    }

    #[test]
    fn self_reference_lists_both_directions() {
        let mut fx = Fixture::new();
        let t = fx.commit(PendingTransaction::new("loop").store(Oid::new(4), payload(MAPPING, &[4])));
        let trace = trace(&fx.path, &[4]);
        let event = &trace.history(4u64).unwrap().events()[0];
        let at = t.record_offsets[0];
        assert_eq!(event.new_revision.as_ref().unwrap().offset, at);
        assert_eq!(event.references[0].oid, Oid::new(4));
        assert_eq!(event.referenced_by[0].oid, Oid::new(4));
        assert_eq!(event.referenced_by[0].type_name, Some(TypeName::from(MAPPING)));
    }

    #[test]
    fn typed_reference_names_undefined_target() {
        let mut fx = Fixture::new();
        let bytes = ObjectPayload::new(MAPPING)
            .with_typed_reference(Oid::new(5), TREE)
            .encode()
            .unwrap();
        let t = fx.commit(PendingTransaction::new("typed").store(Oid::new(0), bytes));

        let trace = trace(&fx.path, &[0, 5]);
        let report = trace.report();
        assert!(report.contains(&format!("oid 0x05 {TREE} 1 revision\n")));
        assert!(report.contains(&format!(
            "        references 0x05 {TREE} at {}\n",
            t.record_offsets[0]
        )));
    }

    #[test]
    fn later_unresolved_revision_keeps_header_type() {
        let mut fx = Fixture::new();
        fx.commit(PendingTransaction::new("a").store(Oid::new(0), payload(MAPPING, &[])));
        let t = fx.commit(PendingTransaction::new("b").store(Oid::new(0), vec![0xee, 1, 2]));

        let trace = trace(&fx.path, &[0]);
        let report = trace.report();
        assert!(report.starts_with(&format!("oid 0x00 {MAPPING} 2 revisions\n")));
        assert!(report.contains(&format!(
            "        new revision <unknown> at {}\n",
            t.record_offsets[0]
        )));
        assert_eq!(trace.stats().unresolved_types, 1);
        assert_eq!(trace.stats().undecodable_reference_sets, 1);
    }

    #[test]
    fn back_pointer_records_are_skipped() {
        let mut fx = Fixture::new();
        let t1 = fx.commit(PendingTransaction::new("a").store(Oid::new(0), payload(MAPPING, &[])));
        fx.commit(PendingTransaction::new("undo").back_pointer(Oid::new(0), t1.record_offsets[0]));
        fx.commit(PendingTransaction::new("delete").delete(Oid::new(0)));

        // A record without a payload is neither a new revision nor a
        // source of references, so it adds no event.
        let trace = trace(&fx.path, &[0]);
        assert_eq!(trace.history(0u64).unwrap().revision_count(), 1);
        assert_eq!(trace.stats().back_pointers, 2);
        assert_eq!(trace.stats().data_records, 3);
        assert_eq!(trace.stats().transactions, 3);
    }

    #[test]
    fn events_follow_tid_order() {
        let mut fx = Fixture::new();
        let late = fx.commit(
            PendingTransaction::new("late")
                .with_tid(Tid::new(0x03d0_0000_0000_0000))
                .store(Oid::new(0), payload(MAPPING, &[])),
        );
        let early = fx.commit(
            PendingTransaction::new("early")
                .with_tid(Tid::new(0x0300_0000_0000_0000))
                .store(Oid::new(0), payload(MAPPING, &[])),
        );

        let trace = trace(&fx.path, &[0]);
        let offsets: Vec<u64> = trace
            .history(0u64)
            .unwrap()
            .events()
            .iter()
            .map(|e| e.transaction.offset)
            .collect();
        assert_eq!(offsets, vec![early.offset, late.offset]);
    }

    #[test]
    fn header_type_comes_from_highest_tid() {
        let mut fx = Fixture::new();
        fx.commit(
            PendingTransaction::new("late")
                .with_tid(Tid::new(0x03d0_0000_0000_0000))
                .store(Oid::new(0), payload(TREE, &[])),
        );
        fx.commit(
            PendingTransaction::new("early")
                .with_tid(Tid::new(0x0300_0000_0000_0000))
                .store(Oid::new(0), payload(MAPPING, &[])),
        );

        let report = trace(&fx.path, &[0]).report();
        assert!(report.starts_with(&format!("oid 0x00 {TREE} 2 revisions\n")), "{report}");
    }

    #[test]
    fn metadata_is_escaped() {
        let mut fx = Fixture::new();
        fx.commit(
            PendingTransaction::new("it's\nmultiline")
                .with_user("/ \\admin")
                .store(Oid::new(0), payload(MAPPING, &[])),
        );
        let report = trace(&fx.path, &[0]).report();
        assert!(report.contains("        tid user='/ \\\\admin'\n"));
        assert!(report.contains("        tid description='it\\'s\\nmultiline'\n"));
    }

    #[test]
    fn write_report_matches_display() {
        let mut fx = Fixture::new();
        fx.commit(PendingTransaction::new("a").store(Oid::new(0), payload(MAPPING, &[1])));
        let trace = trace(&fx.path, &[0, 1]);
        let mut out = String::new();
        trace.write_report(&mut out).unwrap();
        assert_eq!(out, trace.report());
        assert_eq!(trace.oids().collect::<Vec<_>>(), vec![Oid::new(0), Oid::new(1)]);
    }

    #[test]
    fn missing_path_is_invalid_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = Tracer::new(dir.path().join("nope.fs")).unwrap_err();
        assert!(err.is_invalid_source());
        assert!(err.to_string().contains("must specify an existing storage file"));
    }

    #[test]
    fn directory_is_invalid_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = Tracer::new(dir.path()).unwrap_err();
        assert!(err.is_invalid_source());
    }

    #[test]
    fn malformed_log_aborts_run() {
        let mut fx = Fixture::new();
        fx.commit(PendingTransaction::new("a").store(Oid::new(0), payload(MAPPING, &[])));
        fx.writer.finish().unwrap();
        let len = fs::metadata(&fx.path).unwrap().len();
        let file = fs::OpenOptions::new().write(true).open(&fx.path).unwrap();
        file.set_len(len - 3).unwrap();

        let mut tracer = Tracer::new(&fx.path).unwrap();
        tracer.register_oids([0u64]);
        let err = tracer.run().unwrap_err();
        assert!(err.is_malformed());
        assert!(!err.is_invalid_source());
    }

    #[test]
    fn in_progress_transaction_mid_log_aborts_run() {
        let mut fx = Fixture::new();
        fx.commit(PendingTransaction::new("a").store(Oid::new(0), payload(MAPPING, &[])));
        fx.commit(
            PendingTransaction::new("mid")
                .with_status(fstrace_log::TransactionStatus::InProgress)
                .store(Oid::new(0), payload(MAPPING, &[])),
        );
        fx.commit(PendingTransaction::new("c").store(Oid::new(0), payload(MAPPING, &[])));

        let mut tracer = Tracer::new(&fx.path).unwrap();
        tracer.register_oids([0u64]);
        assert!(tracer.run().unwrap_err().is_malformed());
    }

    #[test]
    fn bad_magic_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Data.fs");
        fs::write(&path, b"FS99").unwrap();
        let tracer = Tracer::new(&path).unwrap();
        assert!(tracer.run().is_err());
    }

    /// Payloads of the form `Type|oid,oid`.
    struct TextCodec;

    impl TypeResolver for TextCodec {
        fn resolve(&self, payload: &[u8]) -> Option<TypeName> {
            let text = std::str::from_utf8(payload).ok()?;
            text.split('|').next().filter(|t| !t.is_empty()).map(TypeName::from)
        }
    }

    impl ReferenceExtractor for TextCodec {
        fn extract(&self, payload: &[u8]) -> CodecResult<Vec<PersistentRef>> {
            let text = std::str::from_utf8(payload).map_err(|e| CodecError::Decode(e.to_string()))?;
            let Some((_, refs)) = text.split_once('|') else {
                return Ok(Vec::new());
            };
            refs.split(',')
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<u64>()
                        .map(|oid| PersistentRef::untyped(Oid::new(oid)))
                        .map_err(|e| CodecError::Decode(e.to_string()))
                })
                .collect()
        }
    }

    #[test]
    fn custom_codec_is_used() {
        let mut fx = Fixture::new();
        fx.commit(PendingTransaction::new("text").store(Oid::new(1), b"Folder|2,3".to_vec()));

        let mut tracer = Tracer::new(&fx.path).unwrap().with_codec(TextCodec, TextCodec);
        tracer.register_oids([3u64]);
        let trace = tracer.run().unwrap();
        let event = &trace.history(3u64).unwrap().events()[0];
        assert_eq!(event.referenced_by[0].oid, Oid::new(1));
        assert_eq!(event.referenced_by[0].type_name, Some(TypeName::from("Folder")));
    }

    #[test]
    fn config_reaches_reader() {
        let mut fx = Fixture::new();
        fx.commit(PendingTransaction::new("big").store(Oid::new(0), vec![1; 512]));
        let config = TraceConfig::from_toml_str("[reader]\nmax_payload_len = 64\n").unwrap();

        let tracer = Tracer::with_config(&fx.path, config).unwrap();
        assert!(tracer.run().unwrap_err().is_malformed());
    }

    fn shared_log() -> (TempDir, PathBuf) {
        let mut fx = Fixture::new();
        fx.commit(PendingTransaction::new("one").store(Oid::new(0), payload(MAPPING, &[1, 2])));
        fx.commit(
            PendingTransaction::new("two")
                .store(Oid::new(1), payload(TREE, &[3]))
                .store(Oid::new(3), payload(TREE, &[0])),
        );
        fx.commit(PendingTransaction::new("three").store(Oid::new(2), payload(MAPPING, &[])));
        let Fixture {
            _dir: dir,
            path,
            writer,
        } = fx;
        writer.finish().unwrap();
        (dir, path)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn registration_order_and_duplicates_do_not_matter(
            oids in proptest::collection::vec(0u64..6, 0..12),
        ) {
            let (_dir, path) = shared_log();

            let mut sorted = oids.clone();
            sorted.sort_unstable();
            sorted.dedup();

            let mut shuffled = Tracer::new(&path).unwrap();
            shuffled.register_oids(oids.iter().rev().copied());
            shuffled.register_oids(oids.iter().copied());
            let mut canonical = Tracer::new(&path).unwrap();
            canonical.register_oids(sorted.iter().copied());

            let a = shuffled.run().unwrap();
            let b = canonical.run().unwrap();
            prop_assert_eq!(a.report(), b.report());
            prop_assert_eq!(a.oids().map(Oid::get).collect::<Vec<_>>(), sorted);
        }

        #[test]
        fn history_does_not_depend_on_other_traced_oids(extra in proptest::collection::vec(0u64..6, 0..6)) {
            let (_dir, path) = shared_log();

            let alone = trace(&path, &[0]);
            let mut oids = extra.clone();
            oids.push(0);
            let together = trace(&path, &oids);
            prop_assert_eq!(alone.history(0u64), together.history(0u64));
        }
    }
}
