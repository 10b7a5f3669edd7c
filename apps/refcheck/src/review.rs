//! Interactive review of fixable issues.
//!
//! `review` is a synchronous state machine over a `Prompt`. Each fixable
//! issue ends accepted, skipped, or the session is aborted. Nothing here
//! writes to disk; only a completed session's accepted issues go on to the
//! planner.

use crate::models::Issue;
use crate::output::render_issue;
use owo_colors::OwoColorize;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Skip,
    /// Accept this and every remaining issue.
    AcceptAll,
    Abort,
}

/// Source of decisions for the review loop.
pub trait Prompt {
    /// Decide on `issue`, the `position`-th (1-based) of `total`.
    fn decide(&mut self, position: usize, total: usize, issue: &Issue) -> io::Result<Decision>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewOutcome {
    Completed { accepted: Vec<Issue>, skipped: usize },
    /// Nothing from the session may be applied.
    Aborted { decided: usize },
}

/// Walk the fixable issues in order and collect decisions.
pub fn review<P: Prompt + ?Sized>(issues: &[Issue], prompt: &mut P) -> io::Result<ReviewOutcome> {
    let fixable: Vec<&Issue> = issues.iter().filter(|i| i.is_fixable()).collect();
    let total = fixable.len();
    let mut accepted = Vec::new();
    let mut skipped = 0;
    for (i, is) in fixable.iter().enumerate() {
        match prompt.decide(i + 1, total, is)? {
            Decision::Accept => accepted.push((*is).clone()),
            Decision::Skip => skipped += 1,
            Decision::AcceptAll => {
                accepted.extend(fixable[i..].iter().map(|is| (*is).clone()));
                break;
            }
            Decision::Abort => {
                return Ok(ReviewOutcome::Aborted {
                    decided: accepted.len() + skipped,
                })
            }
        }
    }
    Ok(ReviewOutcome::Completed { accepted, skipped })
}

const HELP: &str = "y accept · n skip · a accept all remaining · q abort (nothing is applied) · d show change · ? help";

/// Line-oriented prompt over any reader/writer pair.
///
/// Empty input skips; end of input aborts.
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
    root: PathBuf,
    context_lines: usize,
    color: bool,
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W, root: impl Into<PathBuf>, context_lines: usize, color: bool) -> Self {
        Self {
            input,
            output,
            root: root.into(),
            context_lines,
            color,
        }
    }

    fn show_change(&mut self, issue: &Issue, content: Option<&str>) -> io::Result<()> {
        let Some(s) = &issue.suggestion else {
            return Ok(());
        };
        let line = content
            .and_then(|c| c.lines().nth(issue.line.saturating_sub(1)))
            .unwrap_or_default();
        let fixed = preview_line(line, issue, &s.text);
        if self.color {
            writeln!(self.output, "  {} {}", "-".red(), line.red())?;
            writeln!(self.output, "  {} {}", "+".green(), fixed.green())
        } else {
            writeln!(self.output, "  - {}", line)?;
            writeln!(self.output, "  + {}", fixed)
        }
    }
}

impl<R: BufRead, W: Write> Prompt for TerminalPrompt<R, W> {
    fn decide(&mut self, position: usize, total: usize, issue: &Issue) -> io::Result<Decision> {
        let content = fs::read_to_string(self.root.join(&issue.file)).ok();
        writeln!(self.output, "[{}/{}]", position, total)?;
        writeln!(
            self.output,
            "{}",
            render_issue(issue, content.as_deref(), self.context_lines, true, self.color)
        )?;
        loop {
            write!(self.output, "Apply this fix? [y,n,a,q,d,?] ")?;
            self.output.flush()?;
            let mut buf = String::new();
            if self.input.read_line(&mut buf)? == 0 {
                writeln!(self.output)?;
                return Ok(Decision::Abort);
            }
            match buf.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(Decision::Accept),
                "" | "n" | "no" => return Ok(Decision::Skip),
                "a" | "all" => return Ok(Decision::AcceptAll),
                "q" | "quit" => return Ok(Decision::Abort),
                "d" | "diff" => self.show_change(issue, content.as_deref())?,
                "?" | "h" | "help" => writeln!(self.output, "{}", HELP)?,
                other => writeln!(self.output, "unknown answer '{}'; {}", other, HELP)?,
            }
        }
    }
}

/// `line` with the issue's column range replaced. Falls back to the first
/// textual occurrence when the range no longer holds the original.
fn preview_line(line: &str, issue: &Issue, replacement: &str) -> String {
    let byte_at = |col: usize| {
        col.checked_sub(1).and_then(|n| {
            line.char_indices()
                .map(|(i, _)| i)
                .chain(std::iter::once(line.len()))
                .nth(n)
        })
    };
    if issue.end_line == issue.line {
        if let (Some(a), Some(b)) = (byte_at(issue.column), byte_at(issue.end_column)) {
            if a <= b && line[a..b] == issue.original {
                return format!("{}{}{}", &line[..a], replacement, &line[b..]);
            }
        }
    }
    line.replacen(&issue.original, replacement, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{sample_issue, Suggestion};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn issues() -> Vec<Issue> {
        (1..=4)
            .map(|n| {
                let mut is = sample_issue("a.md", n, 6);
                if n != 2 {
                    is.suggestion = Some(Suggestion {
                        text: format!("fixed{}.png", n),
                        score: 0.8,
                    });
                }
                is
            })
            .collect()
    }

    struct Scripted(Vec<Decision>);

    impl Prompt for Scripted {
        fn decide(&mut self, _p: usize, _t: usize, _i: &Issue) -> io::Result<Decision> {
            Ok(self.0.remove(0))
        }
    }

    fn lines(outcome: &ReviewOutcome) -> Vec<usize> {
        match outcome {
            ReviewOutcome::Completed { accepted, .. } => accepted.iter().map(|i| i.line).collect(),
            ReviewOutcome::Aborted { .. } => panic!("aborted"),
        }
    }

    #[test]
    fn test_accept_and_skip_only_visit_fixable() {
        let mut p = Scripted(vec![Decision::Skip, Decision::Accept, Decision::Accept]);
        let out = review(&issues(), &mut p).unwrap();
        assert_eq!(lines(&out), vec![3, 4]);
        assert!(matches!(out, ReviewOutcome::Completed { skipped: 1, .. }));
    }

    #[test]
    fn test_accept_all_takes_remaining() {
        let mut p = Scripted(vec![Decision::Skip, Decision::AcceptAll]);
        let out = review(&issues(), &mut p).unwrap();
        assert_eq!(lines(&out), vec![3, 4]);
        assert!(p.0.is_empty());
    }

    #[test]
    fn test_abort_discards_session() {
        let mut p = Scripted(vec![Decision::Accept, Decision::Abort]);
        let out = review(&issues(), &mut p).unwrap();
        assert_eq!(out, ReviewOutcome::Aborted { decided: 1 });
    }

    #[test]
    fn test_terminal_prompt_parses_answers() {
        let tmp = tempdir().unwrap();
        std::fs::write(tmp.path().join("a.md"), "![w](a.png)\nl2\n![x](a.png)\n![y](a.png)\n").unwrap();
        let input = Cursor::new("d\nwhat\ny\n\n?\nY\n");
        let mut out = Vec::new();
        let mut p = TerminalPrompt::new(input, &mut out, tmp.path(), 1, false);
        let res = review(&issues(), &mut p).unwrap();
        assert_eq!(lines(&res), vec![1, 4]);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[1/3]"));
        assert!(text.contains("  + ![w](fixed1.png)"));
        assert!(text.contains("unknown answer 'what'"));
        assert!(text.contains("q abort"));
    }

    #[test]
    fn test_terminal_prompt_eof_aborts() {
        let tmp = tempdir().unwrap();
        let mut out = Vec::new();
        let mut p = TerminalPrompt::new(Cursor::new("y\n"), &mut out, tmp.path(), 0, false);
        let res = review(&issues(), &mut p).unwrap();
        assert_eq!(res, ReviewOutcome::Aborted { decided: 1 });
    }

    #[test]
    fn test_preview_replaces_issue_columns_not_first_match() {
        let mut is = sample_issue("a.md", 1, 12);
        let line = "a.png ![é](a.png) a.png";
        assert_eq!(preview_line(line, &is, "b.png"), "a.png ![é](b.png) a.png");

        // stale columns fall back to the first occurrence
        is.column = 2;
        is.end_column = 7;
        assert_eq!(preview_line(line, &is, "b.png"), "b.png ![é](a.png) a.png");
    }
}
