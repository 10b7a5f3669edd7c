//! Shared data models for scan results and persisted patches.

pub mod patch;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Issue severity. Only `Error` affects the check exit code.
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A candidate replacement for a broken reference.
pub struct Suggestion {
    /// Replacement text, written in the same convention as the original reference.
    pub text: String,
    /// Filename similarity in `[0, 1]`.
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A single detected problem with an exact source location.
///
/// Lines and columns are 1-based; columns count characters and
/// `end_column` is exclusive. `start..end` is the same span as byte offsets
/// into the file content hashed by `content_hash`.
pub struct Issue {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub start: usize,
    pub end: usize,
    pub severity: Severity,
    pub kind: String,
    pub checker: String,
    pub message: String,
    /// The reference text found at `start..end`.
    pub original: String,
    pub suggestion: Option<Suggestion>,
    pub content_hash: String,
}

impl Issue {
    pub fn is_fixable(&self) -> bool {
        self.suggestion.is_some()
    }

    /// `file:line:column` for display.
    pub fn location(&self) -> String {
        format!("{}:{}:{}", self.file.display(), self.line, self.column)
    }

    /// Deterministic report order: file, line, column, then span end and kind.
    pub fn report_order(&self, other: &Issue) -> Ordering {
        self.file
            .cmp(&other.file)
            .then(self.line.cmp(&other.line))
            .then(self.column.cmp(&other.column))
            .then(self.end.cmp(&other.end))
            .then(self.kind.cmp(&other.kind))
            .then(self.checker.cmp(&other.checker))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
/// Aggregated counts used by printers and exit codes.
pub struct Summary {
    pub errors: usize,
    pub warnings: usize,
    pub fixable: usize,
    pub files: usize,
}

impl Summary {
    pub fn from_issues(issues: &[Issue], files: usize) -> Self {
        let mut s = Summary {
            files,
            ..Summary::default()
        };
        for is in issues {
            match is.severity {
                Severity::Error => s.errors += 1,
                Severity::Warning => s.warnings += 1,
            }
            if is.is_fixable() {
                s.fixable += 1;
            }
        }
        s
    }
}

#[derive(Debug, Clone, Serialize)]
/// Output of one collector run.
pub struct ScanReport {
    pub issues: Vec<Issue>,
    pub summary: Summary,
}

impl ScanReport {
    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }

    pub fn fixable(&self) -> Vec<Issue> {
        self.issues.iter().filter(|i| i.is_fixable()).cloned().collect()
    }
}

#[cfg(test)]
pub(crate) fn sample_issue(file: &str, line: usize, column: usize) -> Issue {
    Issue {
        file: PathBuf::from(file),
        line,
        column,
        end_line: line,
        end_column: column + 5,
        start: column - 1,
        end: column + 4,
        severity: Severity::Error,
        kind: "missing-image".into(),
        checker: "image".into(),
        message: "Image not found".into(),
        original: "a.png".into(),
        suggestion: None,
        content_hash: String::new(),
    }
}
