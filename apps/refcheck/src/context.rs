//! Per-run check context and source text helpers.
//!
//! `CheckContext` is built once per run and shared read-only by every
//! checker invocation, including across rayon workers.

use crate::resolve::PathResolver;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
/// Immutable value threaded through every checker and resolver call.
pub struct CheckContext {
    pub root: PathBuf,
    pub resolver: Arc<dyn PathResolver>,
}

impl CheckContext {
    pub fn new(root: impl Into<PathBuf>, resolver: Arc<dyn PathResolver>) -> Self {
        Self {
            root: root.into(),
            resolver,
        }
    }

    /// Path relative to the project root, or the path itself when outside it.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}

impl std::fmt::Debug for CheckContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckContext")
            .field("root", &self.root)
            .field("resolver", &self.resolver.name())
            .finish()
    }
}

/// Hex SHA-256 of file content. Used as the before/after identity of a file.
pub fn content_hash(content: &str) -> String {
    let mut h = Sha256::new();
    h.update(content.as_bytes());
    hex::encode(h.finalize())
}

/// Byte offsets of line starts, for offset to line/column translation.
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(content: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in content.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        Self { starts }
    }

    /// Byte offset where 1-based `line` starts.
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.starts.get(line.checked_sub(1)?).copied()
    }

    /// 1-based line and character column for a byte offset.
    pub fn position(&self, content: &str, offset: usize) -> (usize, usize) {
        let line_idx = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let line_start = self.starts[line_idx];
        let column = content[line_start..offset].chars().count() + 1;
        (line_idx + 1, column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Lines surrounding an issue, numbered from 1.
pub struct ContextLines {
    pub before: Vec<(usize, String)>,
    pub current: (usize, String),
    pub after: Vec<(usize, String)>,
}

/// Collect `before`/`after` lines around 1-based `line`.
pub fn context_lines(content: &str, line: usize, before: usize, after: usize) -> ContextLines {
    let lines: Vec<&str> = content.lines().collect();
    let idx = line.saturating_sub(1);
    let start = idx.saturating_sub(before);
    let end = (idx + after + 1).min(lines.len());
    let grab = |r: std::ops::Range<usize>| -> Vec<(usize, String)> {
        r.filter_map(|i| lines.get(i).map(|l| (i + 1, l.to_string())))
            .collect()
    };
    ContextLines {
        before: grab(start..idx),
        current: (line, lines.get(idx).map(|l| l.to_string()).unwrap_or_default()),
        after: grab((idx + 1).min(end)..end),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable_hex() {
        let a = content_hash("hello");
        assert_eq!(a.len(), 64);
        assert_eq!(a, content_hash("hello"));
        assert_ne!(a, content_hash("hello\n"));
    }

    #[test]
    fn test_line_index_positions_count_chars() {
        let s = "ab\nçé![x](p.png)\n";
        let ix = LineIndex::new(s);
        assert_eq!(ix.position(s, 0), (1, 1));
        assert_eq!(ix.position(s, 3), (2, 1));
        let off = s.find("p.png").unwrap();
        // 'ç' and 'é' are two bytes each but one column each
        assert_eq!(ix.position(s, off), (2, 8));
    }

    #[test]
    fn test_context_lines_clamped_at_edges() {
        let s = "l1\nl2\nl3\nl4";
        let c = context_lines(s, 1, 3, 2);
        assert!(c.before.is_empty());
        assert_eq!(c.current, (1, "l1".to_string()));
        assert_eq!(c.after, vec![(2, "l2".to_string()), (3, "l3".to_string())]);
        let c = context_lines(s, 4, 1, 3);
        assert_eq!(c.before, vec![(3, "l3".to_string())]);
        assert!(c.after.is_empty());
    }
}
