//! Plain-text rendering of a finished trace.

use std::fmt::{self, Write};

use fstrace_types::display_or_unknown;

use crate::history::OidHistory;

/// Render one oid section.
pub(crate) fn write_history<W: Write>(out: &mut W, history: &OidHistory) -> fmt::Result {
    let count = history.revision_count();
    writeln!(
        out,
        "oid {} {} {} {}",
        history.oid(),
        display_or_unknown(history.type_name()),
        count,
        if count == 1 { "revision" } else { "revisions" },
    )?;
    if history.is_empty() {
        return writeln!(out, "    this oid was neither defined nor referenced");
    }

    for event in history.events() {
        let txn = &event.transaction;
        writeln!(out, "    tid {} offset={} {}", txn.tid, txn.offset, txn.tid.timestamp())?;
        writeln!(out, "        tid user={}", Quoted(&txn.user))?;
        writeln!(out, "        tid description={}", Quoted(&txn.description))?;

        if let Some(revision) = &event.new_revision {
            writeln!(
                out,
                "        new revision {} at {}",
                display_or_unknown(revision.type_name.as_ref()),
                revision.offset,
            )?;
        }
        for r in &event.references {
            writeln!(
                out,
                "        references {} {} at {}",
                r.oid,
                display_or_unknown(r.type_name.as_ref()),
                r.offset,
            )?;
        }
        for r in &event.referenced_by {
            writeln!(
                out,
                "        referenced by {} {} at {}",
                r.oid,
                display_or_unknown(r.type_name.as_ref()),
                r.offset,
            )?;
        }
    }
    Ok(())
}

/// Single-quoted, escaped metadata text.
///
/// Quotes, backslashes and control characters are escaped so that every
/// report line stays on one line.
pub(crate) struct Quoted<'a>(pub &'a str);

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('\'')?;
        for c in self.0.chars() {
            match c {
                '\\' => f.write_str("\\\\")?,
                '\'' => f.write_str("\\'")?,
                '\n' => f.write_str("\\n")?,
                '\r' => f.write_str("\\r")?,
                '\t' => f.write_str("\\t")?,
                c if c.is_control() => write!(f, "\\x{:02x}", u32::from(c))?,
                c => f.write_char(c)?,
            }
        }
        f.write_char('\'')
    }
}
