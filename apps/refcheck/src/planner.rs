//! Fix planner: turns selected issues into per-file, non-overlapping edits.
//!
//! Only issues carrying a suggestion become edits. Within one file, spans
//! must not overlap and every issue must have been detected against the same
//! content; otherwise the whole file is left out of the plan and a
//! `PlannerConflict` is reported. Other files are unaffected.

use crate::models::patch::Hunk;
use crate::models::Issue;
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Replace `start..end` (bytes) of `file` with `replacement`.
pub struct Edit {
    pub file: PathBuf,
    pub start: usize,
    pub end: usize,
    pub original: String,
    pub replacement: String,
}

impl Edit {
    pub fn to_hunk(&self) -> Hunk {
        Hunk {
            start: self.start,
            end: self.end,
            original: self.original.clone(),
            replacement: self.replacement.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// A file whose selected issues cannot be turned into a consistent edit set.
pub enum PlannerConflict {
    #[error("{}: edits at {first:?} and {second:?} overlap", file.display())]
    Overlap {
        file: PathBuf,
        first: Range<usize>,
        second: Range<usize>,
    },
    #[error("{}: issues were detected against different versions of the file", file.display())]
    MixedContent { file: PathBuf },
}

impl PlannerConflict {
    pub fn file(&self) -> &Path {
        match self {
            PlannerConflict::Overlap { file, .. } | PlannerConflict::MixedContent { file } => file,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Edits for one file.
pub struct FilePlan {
    /// Hash of the content the edits were computed against.
    pub content_hash: String,
    /// Sorted by descending start offset (application order).
    pub edits: Vec<Edit>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Plan {
    pub files: BTreeMap<PathBuf, FilePlan>,
    pub conflicts: Vec<PlannerConflict>,
    /// Selected issues without a suggestion.
    pub unfixable: usize,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn edit_count(&self) -> usize {
        self.files.values().map(|f| f.edits.len()).sum()
    }
}

/// Build a plan from `issues`. The result does not depend on input order.
pub fn plan(issues: &[Issue]) -> Plan {
    let mut out = Plan::default();
    let mut by_file: BTreeMap<PathBuf, Vec<&Issue>> = BTreeMap::new();
    for is in issues {
        if is.is_fixable() {
            by_file.entry(is.file.clone()).or_default().push(is);
        } else {
            out.unfixable += 1;
        }
    }
    for (file, group) in by_file {
        match plan_file(&file, &group) {
            Ok(fp) => {
                debug!(file = %file.display(), edits = fp.edits.len(), "planned edits");
                out.files.insert(file, fp);
            }
            Err(conflict) => {
                warn!(%conflict, "excluding file from fix");
                out.conflicts.push(conflict);
            }
        }
    }
    out
}

fn plan_file(file: &Path, group: &[&Issue]) -> Result<FilePlan, PlannerConflict> {
    let hash = &group[0].content_hash;
    if group.iter().any(|is| &is.content_hash != hash) {
        return Err(PlannerConflict::MixedContent {
            file: file.to_path_buf(),
        });
    }
    let mut edits: Vec<Edit> = group
        .iter()
        .filter_map(|is| {
            let s = is.suggestion.as_ref()?;
            Some(Edit {
                file: file.to_path_buf(),
                start: is.start,
                end: is.end,
                original: is.original.clone(),
                replacement: s.text.clone(),
            })
        })
        .collect();
    edits.sort_by(|a, b| {
        (a.start, a.end, &a.replacement).cmp(&(b.start, b.end, &b.replacement))
    });
    for pair in edits.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        // equal starts overlap even for empty spans
        if a.end > b.start || a.start == b.start {
            return Err(PlannerConflict::Overlap {
                file: file.to_path_buf(),
                first: a.start..a.end,
                second: b.start..b.end,
            });
        }
    }
    edits.reverse();
    Ok(FilePlan {
        content_hash: hash.clone(),
        edits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::patch::apply_hunks;
    use crate::models::{sample_issue, Suggestion};

    fn fixable(file: &str, start: usize, end: usize, original: &str, text: &str) -> Issue {
        let mut is = sample_issue(file, 1, start + 1);
        is.start = start;
        is.end = end;
        is.original = original.into();
        is.content_hash = "h1".into();
        is.suggestion = Some(Suggestion {
            text: text.into(),
            score: 0.9,
        });
        is
    }

    #[test]
    fn test_overlapping_spans_exclude_only_that_file() {
        let issues = vec![
            fixable("a.md", 5, 15, "img/x.png)", "img/y.png)"),
            fixable("a.md", 10, 20, "png)", "jpg)"),
            fixable("b.md", 0, 5, "a.png", "b.png"),
        ];
        let p = plan(&issues);
        assert_eq!(p.files.len(), 1);
        assert!(p.files.contains_key(&PathBuf::from("b.md")));
        assert_eq!(
            p.conflicts,
            vec![PlannerConflict::Overlap {
                file: PathBuf::from("a.md"),
                first: 5..15,
                second: 10..20,
            }]
        );
        assert!(p.conflicts[0].to_string().contains("a.md"));
    }

    #[test]
    fn test_identical_spans_conflict() {
        let issues = vec![
            fixable("a.md", 5, 10, "x.png", "y.png"),
            fixable("a.md", 5, 10, "x.png", "y.png"),
        ];
        let p = plan(&issues);
        assert!(p.is_empty());
        assert_eq!(p.conflicts.len(), 1);
    }

    #[test]
    fn test_adjacent_spans_do_not_conflict() {
        let issues = vec![
            fixable("a.md", 0, 5, "a.png", "b.png"),
            fixable("a.md", 5, 10, "c.png", "d.png"),
        ];
        let p = plan(&issues);
        assert!(p.conflicts.is_empty());
        let starts: Vec<usize> = p.files[&PathBuf::from("a.md")]
            .edits
            .iter()
            .map(|e| e.start)
            .collect();
        assert_eq!(starts, vec![5, 0]);
    }

    #[test]
    fn test_mixed_content_hashes_conflict() {
        let mut second = fixable("a.md", 20, 25, "c.png", "d.png");
        second.content_hash = "h2".into();
        let issues = vec![fixable("a.md", 0, 5, "a.png", "b.png"), second];
        let p = plan(&issues);
        assert!(p.is_empty());
        assert!(matches!(
            p.conflicts[0],
            PlannerConflict::MixedContent { .. }
        ));
    }

    #[test]
    fn test_unfixable_issues_are_counted_not_planned() {
        let mut bare = sample_issue("a.md", 1, 1);
        bare.suggestion = None;
        let p = plan(&[bare, fixable("a.md", 10, 15, "a.png", "b.png")]);
        assert_eq!(p.unfixable, 1);
        assert_eq!(p.edit_count(), 1);
    }

    #[test]
    fn test_result_independent_of_detection_order() {
        let content = "![](aa.png) ![](bb.png) ![](cc.png)\n";
        let spans = [
            (4, 10, "aa.png", "a.png"),
            (16, 22, "bb.png", "bbbbb.png"),
            (28, 34, "cc.png", "c.png"),
        ];
        let mut issues: Vec<Issue> = spans
            .iter()
            .map(|(s, e, o, r)| fixable("a.md", *s, *e, o, r))
            .collect();
        let forward = plan(&issues);
        issues.reverse();
        issues.swap(0, 1);
        let shuffled = plan(&issues);
        assert_eq!(forward, shuffled);

        let hunks: Vec<Hunk> = forward.files[&PathBuf::from("a.md")]
            .edits
            .iter()
            .map(Edit::to_hunk)
            .collect();
        assert_eq!(
            apply_hunks(content, &hunks).unwrap(),
            "![](a.png) ![](bbbbb.png) ![](c.png)\n"
        );
    }
}
