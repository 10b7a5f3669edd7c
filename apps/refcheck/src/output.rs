//! Output rendering for check, fix, undo and list commands.
//!
//! Supports `human` (default) and `json` outputs. JSON objects are composed
//! by pure `compose_*` functions so their shape can be tested directly.

use crate::context::{context_lines, ContextLines};
use crate::models::patch::{PatchRecord, PatchState};
use crate::models::{Issue, ScanReport, Severity};
use crate::planner::PlannerConflict;
use owo_colors::OwoColorize;
use serde_json::json;
use serde_json::Value as JsonVal;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
/// Rendering settings resolved from CLI and config.
pub struct RenderOptions {
    /// `human` or `json`.
    pub output: String,
    /// `auto`, `always` or `never`.
    pub color: String,
    pub context_lines: usize,
    pub show_suggestions: bool,
    /// Human output prints only the summary.
    pub quiet: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            output: "human".into(),
            color: "auto".into(),
            context_lines: 3,
            show_suggestions: true,
            quiet: false,
        }
    }
}

impl RenderOptions {
    pub fn is_json(&self) -> bool {
        self.output == "json"
    }

    pub fn colors(&self) -> bool {
        use_colors(&self.output, &self.color)
    }
}

pub fn use_colors(output: &str, color: &str) -> bool {
    match color {
        "always" => true,
        "never" => false,
        _ => output != "json" && std::env::var_os("NO_COLOR").is_none(),
    }
}

fn stderr_colors() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

pub fn error_prefix() -> String {
    if stderr_colors() {
        "error:".red().bold().to_string()
    } else {
        "error:".to_string()
    }
}

pub fn warn_prefix() -> String {
    if stderr_colors() {
        "warning:".yellow().bold().to_string()
    } else {
        "warning:".to_string()
    }
}

pub fn note_prefix() -> String {
    if stderr_colors() {
        "note:".cyan().bold().to_string()
    } else {
        "note:".to_string()
    }
}

fn pretty(v: &JsonVal) -> String {
    serde_json::to_string_pretty(v).unwrap_or_default()
}

/// Print a scan report. Context lines are read from files under `root`.
pub fn print_scan(report: &ScanReport, root: &Path, opts: &RenderOptions) {
    if opts.is_json() {
        println!("{}", pretty(&compose_scan_json(report)));
        return;
    }
    let color = opts.colors();
    if !opts.quiet {
        for is in &report.issues {
            let content = fs::read_to_string(root.join(&is.file)).ok();
            println!(
                "{}",
                render_issue(
                    is,
                    content.as_deref(),
                    opts.context_lines,
                    opts.show_suggestions,
                    color
                )
            );
        }
    }
    let s = &report.summary;
    let summary = format!(
        "— Summary — errors={} warnings={} fixable={} files={}",
        s.errors, s.warnings, s.fixable, s.files
    );
    if color {
        println!("{}", summary.bold());
    } else {
        println!("{}", summary);
    }
}

/// One issue: header line, optional source context with a marker under the
/// span, and the suggestion.
pub fn render_issue(
    is: &Issue,
    content: Option<&str>,
    context: usize,
    show_suggestion: bool,
    color: bool,
) -> String {
    let (icon, sev) = match is.severity {
        Severity::Error => ("✖", "⟦error⟧"),
        Severity::Warning => ("▲", "⟦warn⟧"),
    };
    let header = if color {
        let (icon, sev) = match is.severity {
            Severity::Error => (icon.red().to_string(), sev.red().bold().to_string()),
            Severity::Warning => (icon.yellow().to_string(), sev.yellow().bold().to_string()),
        };
        format!("{} {} {} ❲{}❳ {}", icon, sev, is.location().bold(), is.kind, is.message)
    } else {
        format!("{} {} {} ❲{}❳ {}", icon, sev, is.location(), is.kind, is.message)
    };
    let mut out = header;
    if let Some(text) = content {
        let ctx = context_lines(text, is.line, context, context);
        out.push('\n');
        out.push_str(&render_context(&ctx, is, color));
    }
    if show_suggestion {
        if let Some(s) = &is.suggestion {
            let line = format!("  → suggestion: {} ({:.2})", s.text, s.score);
            out.push('\n');
            if color {
                out.push_str(&line.green().to_string());
            } else {
                out.push_str(&line);
            }
        }
    }
    out
}

fn render_context(ctx: &ContextLines, is: &Issue, color: bool) -> String {
    let last = ctx
        .after
        .last()
        .map(|(n, _)| *n)
        .unwrap_or(ctx.current.0);
    let width = last.to_string().len();
    let gutter = |n: usize, text: &str, mark: bool| -> String {
        let num = format!("{:>w$}", n, w = width);
        let lead = if mark { ">" } else { " " };
        if color {
            format!("{} {} │ {}", lead, num.bright_black(), text)
        } else {
            format!("{} {} │ {}", lead, num, text)
        }
    };
    let mut lines: Vec<String> = Vec::new();
    for (n, text) in &ctx.before {
        lines.push(gutter(*n, text, false));
    }
    lines.push(gutter(ctx.current.0, &ctx.current.1, true));
    if is.end > is.start {
        let span_end = if is.end_line == is.line {
            is.end_column
        } else {
            ctx.current.1.chars().count() + 1
        };
        let marker = format!(
            "{}{}",
            " ".repeat(is.column.saturating_sub(1)),
            "^".repeat(span_end.saturating_sub(is.column).max(1))
        );
        let marker = if color {
            marker.red().bold().to_string()
        } else {
            marker
        };
        lines.push(format!("  {} │ {}", " ".repeat(width), marker));
    }
    for (n, text) in &ctx.after {
        lines.push(gutter(*n, text, false));
    }
    lines.join("\n")
}

/// Compose the scan JSON object: `{issues, summary}`.
pub fn compose_scan_json(report: &ScanReport) -> JsonVal {
    serde_json::to_value(report).unwrap_or(JsonVal::Null)
}

/// Print planner conflicts to stderr (human) or nothing (json carries them).
pub fn print_conflicts(conflicts: &[PlannerConflict], opts: &RenderOptions) {
    if opts.is_json() {
        return;
    }
    for c in conflicts {
        eprintln!("{} {} (file skipped)", warn_prefix(), c);
    }
}

/// Print a patch record after apply, dry run, undo or redo.
pub fn print_record(
    record: &PatchRecord,
    conflicts: &[PlannerConflict],
    verb: &str,
    opts: &RenderOptions,
) {
    if opts.is_json() {
        println!("{}", pretty(&compose_record_json(record, conflicts)));
        return;
    }
    let color = opts.colors();
    let head = format!(
        "{} patch {} ({} files, {} edits)",
        verb,
        record.id,
        record.files.len(),
        record.hunk_count()
    );
    if color {
        println!("{}", head.green().bold());
    } else {
        println!("{}", head);
    }
    for (file, fp) in &record.files {
        if color {
            println!("{} {}", "---".cyan().bold(), file.bold());
        } else {
            println!("--- {}", file);
        }
        for h in fp.hunks.iter().rev() {
            if color {
                println!("  {} {}", "-".red(), h.original.red());
                println!("  {} {}", "+".green(), h.replacement.green());
            } else {
                println!("  - {}", h.original);
                println!("  + {}", h.replacement);
            }
        }
    }
}

/// Compose a record JSON object including planner conflicts.
pub fn compose_record_json(record: &PatchRecord, conflicts: &[PlannerConflict]) -> JsonVal {
    let conflicts: Vec<JsonVal> = conflicts
        .iter()
        .map(|c| json!({"file": c.file(), "message": c.to_string()}))
        .collect();
    json!({
        "patch": record,
        "conflicts": conflicts,
    })
}

/// Print stored records, newest first.
pub fn print_patch_list(records: &[PatchRecord], opts: &RenderOptions) {
    if opts.is_json() {
        println!("{}", pretty(&compose_patch_list_json(records)));
        return;
    }
    if records.is_empty() {
        println!("no patches recorded");
        return;
    }
    let color = opts.colors();
    for r in records {
        let state = r.state.to_string();
        let state = if color {
            match r.state {
                PatchState::Applied => state.green().to_string(),
                PatchState::Reversed => state.yellow().to_string(),
                _ => state.bright_black().to_string(),
            }
        } else {
            state
        };
        println!(
            "{}  {:<9}  {}  files={} edits={}",
            r.id,
            state,
            r.created_at.format("%Y-%m-%d %H:%M:%S"),
            r.files.len(),
            r.hunk_count()
        );
    }
}

pub fn compose_patch_list_json(records: &[PatchRecord]) -> JsonVal {
    let items: Vec<JsonVal> = records
        .iter()
        .map(|r| {
            json!({
                "id": r.id,
                "state": r.state,
                "created_at": r.created_at,
                "applied_at": r.applied_at,
                "reversed_at": r.reversed_at,
                "files": r.files.keys().collect::<Vec<_>>(),
                "edits": r.hunk_count(),
            })
        })
        .collect();
    json!({"patches": items, "total": records.len()})
}

/// Print available checkers and resolvers.
pub fn print_available(
    checkers: &[(&str, &str)],
    resolvers: &[(&str, &str)],
    opts: &RenderOptions,
) {
    if opts.is_json() {
        let pairs = |v: &[(&str, &str)]| -> Vec<JsonVal> {
            v.iter()
                .map(|(n, d)| json!({"name": n, "description": d}))
                .collect()
        };
        let out = json!({"checkers": pairs(checkers), "resolvers": pairs(resolvers)});
        println!("{}", pretty(&out));
        return;
    }
    let color = opts.colors();
    for (title, items) in [("Checkers", checkers), ("Resolvers", resolvers)] {
        if color {
            println!("{}", title.bold());
        } else {
            println!("{}", title);
        }
        for (name, desc) in items {
            println!("  {:<12} {}", name, desc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::patch::{FilePatch, Hunk};
    use crate::models::{sample_issue, Suggestion, Summary};
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    #[test]
    fn test_compose_scan_json_shape() {
        let mut is = sample_issue("docs/a.md", 3, 10);
        is.suggestion = Some(Suggestion {
            text: "b.png".into(),
            score: 0.8,
        });
        let issues = vec![is];
        let report = ScanReport {
            summary: Summary::from_issues(&issues, 1),
            issues,
        };
        let out = compose_scan_json(&report);
        assert_eq!(out["summary"]["errors"], 1);
        assert_eq!(out["summary"]["fixable"], 1);
        assert_eq!(out["issues"][0]["file"], "docs/a.md");
        assert_eq!(out["issues"][0]["severity"], "error");
        assert_eq!(out["issues"][0]["suggestion"]["text"], "b.png");
        assert_eq!(out["issues"][0]["end_column"], 15);
    }

    #[test]
    fn test_render_issue_marks_span_and_suggestion() {
        let content = "one\nSee ![x](images/screnshot.png) here.\nthree\n";
        let mut is = sample_issue("a.md", 2, 10);
        is.start = content.find("images").unwrap();
        is.end = is.start + "images/screnshot.png".len();
        is.end_column = 30;
        is.suggestion = Some(Suggestion {
            text: "images/screenshot.png".into(),
            score: 0.93,
        });
        let out = render_issue(&is, Some(content), 1, true, false);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].contains("a.md:2:10"));
        assert_eq!(lines[1], "  1 │ one");
        assert_eq!(lines[2], "> 2 │ See ![x](images/screnshot.png) here.");
        assert_eq!(lines[3], format!("    │ {}{}", " ".repeat(9), "^".repeat(20)));
        assert_eq!(lines[4], "  3 │ three");
        assert_eq!(lines[5], "  → suggestion: images/screenshot.png (0.93)");
    }

    #[test]
    fn test_compose_record_and_list_json() {
        let mut files = BTreeMap::new();
        files.insert(
            "a.md".to_string(),
            FilePatch {
                before_hash: "b".into(),
                after_hash: "a".into(),
                hunks: vec![Hunk {
                    start: 1,
                    end: 2,
                    original: "x".into(),
                    replacement: "y".into(),
                }],
            },
        );
        let rec = PatchRecord {
            id: "20240101T000000000000Z".into(),
            created_at: Utc::now(),
            state: PatchState::Applied,
            applied_at: None,
            reversed_at: None,
            files,
        };
        let conflict = PlannerConflict::MixedContent {
            file: PathBuf::from("b.md"),
        };
        let out = compose_record_json(&rec, &[conflict]);
        assert_eq!(out["patch"]["state"], "applied");
        assert_eq!(out["patch"]["files"]["a.md"]["hunks"][0]["replacement"], "y");
        assert_eq!(out["conflicts"][0]["file"], "b.md");

        let list = compose_patch_list_json(&[rec]);
        assert_eq!(list["total"], 1);
        assert_eq!(list["patches"][0]["files"][0], "a.md");
        assert_eq!(list["patches"][0]["edits"], 1);
    }

    #[test]
    fn test_use_colors_respects_mode() {
        assert!(!use_colors("json", "auto"));
        assert!(!use_colors("human", "never"));
        assert!(use_colors("json", "always"));
    }
}
