//! Persisted patch record schema.
//!
//! A record is written as pretty JSON, one file per fix session. Hunks are
//! stored in application order (descending start offset), with offsets
//! relative to the content identified by `before_hash`. Undoing walks the
//! hunks in reverse order; at that point each hunk's replacement sits at its
//! original `start`, so no offset translation is needed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Lifecycle state of a record. `Planned` records are never written to disk.
pub enum PatchState {
    Planned,
    Persisted,
    Applied,
    Reversed,
}

impl fmt::Display for PatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PatchState::Planned => "planned",
            PatchState::Persisted => "persisted",
            PatchState::Applied => "applied",
            PatchState::Reversed => "reversed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One contiguous replacement at `start..end` of the pre-image.
pub struct Hunk {
    pub start: usize,
    pub end: usize,
    pub original: String,
    pub replacement: String,
}

impl Hunk {
    /// The hunk that undoes this one when applied in reverse order.
    pub fn inverse(&self) -> Hunk {
        Hunk {
            start: self.start,
            end: self.start + self.replacement.len(),
            original: self.replacement.clone(),
            replacement: self.original.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Per-file portion of a record.
pub struct FilePatch {
    pub before_hash: String,
    pub after_hash: String,
    pub hunks: Vec<Hunk>,
}

impl FilePatch {
    /// Swap before/after and reverse hunk order.
    pub fn inverse(&self) -> FilePatch {
        FilePatch {
            before_hash: self.after_hash.clone(),
            after_hash: self.before_hash.clone(),
            hunks: self.hunks.iter().rev().map(Hunk::inverse).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A fix session's edits, sufficient to replay or reverse them.
pub struct PatchRecord {
    /// Sortable identifier; lexicographic order is chronological order.
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub state: PatchState,
    #[serde(default)]
    pub applied_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reversed_at: Option<DateTime<Utc>>,
    /// Keyed by path relative to the project root, `/`-separated.
    pub files: BTreeMap<String, FilePatch>,
}

impl PatchRecord {
    pub fn hunk_count(&self) -> usize {
        self.files.values().map(|f| f.hunks.len()).sum()
    }
}

/// Apply hunks in order to `content`. Returns `None` when a hunk's range is
/// out of bounds, splits a character, or does not hold its `original` text.
pub fn apply_hunks(content: &str, hunks: &[Hunk]) -> Option<String> {
    let mut out = content.to_string();
    for h in hunks {
        if h.start > h.end || h.end > out.len() {
            return None;
        }
        if !out.is_char_boundary(h.start) || !out.is_char_boundary(h.end) {
            return None;
        }
        if out[h.start..h.end] != h.original {
            return None;
        }
        out.replace_range(h.start..h.end, &h.replacement);
    }
    Some(out)
}
