//! Issue collector: runs the configured checkers over every included document.
//!
//! Files are matched by include globs relative to the root, filtered by
//! exclude globs, and scanned in parallel with rayon. Each document is
//! independent; results are merged and sorted by `Issue::report_order`, so
//! two runs over unchanged input produce identical lists.

use crate::checks::{Checker, CheckerFailure};
use crate::context::{content_hash, CheckContext, LineIndex};
use crate::error::{Error, Result};
use crate::models::{Issue, ScanReport, Severity, Summary};
use crate::resolve::PathResolver;
use glob::{glob, Pattern};
use rayon::prelude::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::{debug, warn};

/// Callbacks invoked around a check pass.
pub trait Hooks: Send + Sync {
    fn before_check(&self, _ctx: &CheckContext) {}

    fn after_check(&self, _ctx: &CheckContext, _issues: &[Issue]) {}
}

/// Hooks that do nothing.
pub struct NoHooks;

impl Hooks for NoHooks {}

#[derive(Debug, Default, Clone)]
/// Shell commands run from the project root via `sh -lc`.
///
/// Every command sees `REFCHECK_ROOT`. After-check commands also get
/// `REFCHECK_ISSUES` (issue count) and the issue list as JSON on stdin.
/// A failing command is logged and otherwise ignored.
pub struct ShellHooks {
    pub before_check: Vec<String>,
    pub after_check: Vec<String>,
}

impl ShellHooks {
    fn run(&self, cmd: &str, ctx: &CheckContext, issues: Option<&[Issue]>) {
        let mut command = Command::new("sh");
        command
            .arg("-lc")
            .arg(cmd)
            .current_dir(&ctx.root)
            .env("REFCHECK_ROOT", &ctx.root);
        if let Some(list) = issues {
            command
                .env("REFCHECK_ISSUES", list.len().to_string())
                .stdin(Stdio::piped());
        }
        let mut child = match command.spawn() {
            Ok(c) => c,
            Err(e) => {
                warn!(hook = cmd, error = %e, "failed to start hook");
                return;
            }
        };
        if let (Some(list), Some(mut stdin)) = (issues, child.stdin.take()) {
            let payload = serde_json::to_vec(list).unwrap_or_default();
            if let Err(e) = stdin.write_all(&payload) {
                // hooks are free to ignore stdin
                debug!(hook = cmd, error = %e, "hook closed stdin early");
            }
        }
        match child.wait() {
            Ok(status) if status.success() => debug!(hook = cmd, "hook finished"),
            Ok(status) => warn!(hook = cmd, %status, "hook exited unsuccessfully"),
            Err(e) => warn!(hook = cmd, error = %e, "failed to wait for hook"),
        }
    }
}

impl Hooks for ShellHooks {
    fn before_check(&self, ctx: &CheckContext) {
        for cmd in &self.before_check {
            self.run(cmd, ctx, None);
        }
    }

    fn after_check(&self, ctx: &CheckContext, issues: &[Issue]) {
        for cmd in &self.after_check {
            self.run(cmd, ctx, Some(issues));
        }
    }
}

/// Fully constructed input of a check pass.
pub struct ScanConfig {
    pub root: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Run in this order for every document.
    pub checkers: Vec<Box<dyn Checker>>,
    pub resolver: Arc<dyn PathResolver>,
    pub hooks: Box<dyn Hooks>,
}

impl ScanConfig {
    pub fn context(&self) -> CheckContext {
        CheckContext::new(self.root.clone(), Arc::clone(&self.resolver))
    }
}

/// Run hooks, collect documents and scan them.
pub fn run(config: &ScanConfig) -> Result<ScanReport> {
    let ctx = config.context();
    config.hooks.before_check(&ctx);
    let files = collect_files(&config.root, &config.include, &config.exclude)?;
    debug!(count = files.len(), root = %config.root.display(), "collected documents");
    let report = scan_files(&files, &config.checkers, &ctx);
    config.hooks.after_check(&ctx, &report.issues);
    Ok(report)
}

/// Files under `root` matching any include glob and no exclude glob.
///
/// Exclude globs are matched against the root-relative path with `/`
/// separators. The result is sorted and free of duplicates.
pub fn collect_files(root: &Path, include: &[String], exclude: &[String]) -> Result<Vec<PathBuf>> {
    let excludes = exclude
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| Error::Config(format!("invalid exclude pattern '{}': {}", p, e)))
        })
        .collect::<Result<Vec<_>>>()?;
    let mut files = Vec::new();
    for pat in include {
        let abs = root.join(pat).to_string_lossy().to_string();
        let entries = glob(&abs)
            .map_err(|e| Error::Config(format!("invalid include pattern '{}': {}", pat, e)))?;
        for path in entries.flatten() {
            if !path.is_file() {
                continue;
            }
            let rel = crate::resolve::to_posix(path.strip_prefix(root).unwrap_or(&path));
            if excludes.iter().any(|x| x.matches(&rel)) {
                continue;
            }
            files.push(path);
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// Scan `files` in parallel and merge the results deterministically.
pub fn scan_files(files: &[PathBuf], checkers: &[Box<dyn Checker>], ctx: &CheckContext) -> ScanReport {
    let per_file: Vec<Vec<Issue>> = files
        .par_iter()
        .map(|path| scan_file(path, checkers, ctx))
        .collect();
    let mut issues: Vec<Issue> = per_file.into_iter().flatten().collect();
    for is in issues.iter_mut() {
        is.file = ctx.relative(&is.file).to_path_buf();
    }
    issues.sort_by(|a, b| a.report_order(b));
    let summary = Summary::from_issues(&issues, files.len());
    ScanReport { issues, summary }
}

fn scan_file(path: &Path, checkers: &[Box<dyn Checker>], ctx: &CheckContext) -> Vec<Issue> {
    let content = match fs::read(path).map(String::from_utf8) {
        Ok(Ok(s)) => s,
        Ok(Err(e)) => return vec![read_failure(path, e.as_bytes(), "file is not valid UTF-8".to_string())],
        Err(e) => return vec![read_failure(path, &[], e.to_string())],
    };
    let hash = content_hash(&content);
    let mut out = Vec::new();
    for checker in checkers {
        if !checker.supports_file(path) {
            continue;
        }
        match checker.check(path, &content, ctx) {
            Ok(found) => out.extend(found),
            Err(failure) => {
                warn!(
                    file = %path.display(),
                    checker = checker.name(),
                    line = failure.line,
                    "checker failed; keeping partial results"
                );
                out.push(failure_issue(path, &content, checker.name(), &failure));
                out.extend(failure.partial);
            }
        }
    }
    for is in out.iter_mut() {
        is.content_hash = hash.clone();
    }
    out
}

/// Warning for a document that could not be read. The span covers the first
/// line of whatever bytes were read, and is never empty.
fn read_failure(path: &Path, bytes: &[u8], reason: String) -> Issue {
    warn!(file = %path.display(), %reason, "cannot read document");
    let end = bytes.iter().position(|&b| b == b'\n').unwrap_or(bytes.len()).max(1);
    Issue {
        file: path.to_path_buf(),
        line: 1,
        column: 1,
        end_line: 1,
        end_column: end + 1,
        start: 0,
        end,
        severity: Severity::Warning,
        kind: "read-failure".into(),
        checker: String::new(),
        message: format!("Cannot read document: {}", reason),
        original: String::new(),
        suggestion: None,
        content_hash: String::new(),
    }
}

/// Warning spanning the line the checker gave up at.
fn failure_issue(path: &Path, content: &str, checker: &str, failure: &CheckerFailure) -> Issue {
    let start = LineIndex::new(content).line_start(failure.line).unwrap_or(0);
    let text = content[start..].split('\n').next().unwrap_or("");
    let text = text.strip_suffix('\r').unwrap_or(text);
    Issue {
        file: path.to_path_buf(),
        line: failure.line,
        column: 1,
        end_line: failure.line,
        end_column: text.chars().count().max(1) + 1,
        start,
        end: start + text.len().max(1),
        severity: Severity::Warning,
        kind: "checker-failure".into(),
        checker: checker.to_string(),
        message: failure.message.clone(),
        original: String::new(),
        suggestion: None,
        content_hash: String::new(),
    }
}
