//! Checkers: scan document content for references and emit issues.
//!
//! A checker is a capability (`Checker`) selected by name from
//! configuration. The markdown checkers share one extraction path: the
//! scanner yields lines outside code, regexes find reference-bearing
//! constructs, and each reference is cleaned, resolved and, when missing,
//! turned into an `Issue` with a fuzzy suggestion.

pub mod image;
pub mod link;
pub mod scan;

pub use image::ImageChecker;
pub use link::LinkChecker;

use crate::context::{CheckContext, LineIndex};
use crate::fuzzy;
use crate::models::{Issue, Severity, Suggestion};
use crate::resolve::{self, is_external, split_reference};
use regex::Regex;
use scan::MarkdownScanner;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("line {line}: {message}")]
/// A checker could not fully parse a document. `partial` holds whatever
/// issues were found before or despite the failure.
pub struct CheckerFailure {
    pub line: usize,
    pub message: String,
    pub partial: Vec<Issue>,
}

/// Capability interface implemented by every checker.
pub trait Checker: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn supports_file(&self, file: &Path) -> bool {
        is_markdown(file)
    }

    /// Issues for `content` of `file`. `content_hash` is left empty and
    /// filled by the collector.
    fn check(&self, file: &Path, content: &str, ctx: &CheckContext)
        -> Result<Vec<Issue>, CheckerFailure>;
}

pub fn is_markdown(file: &Path) -> bool {
    file.extension()
        .map(|e| {
            let e = e.to_string_lossy().to_ascii_lowercase();
            e == "md" || e == "markdown" || e == "mdx"
        })
        .unwrap_or(false)
}

fn default_true() -> bool {
    true
}

fn default_threshold() -> f64 {
    0.6
}

#[derive(Debug, Clone, Deserialize)]
/// Options shared by the markdown reference checkers (`[checkers.<name>]`).
pub struct CheckerOptions {
    #[serde(default = "default_true")]
    pub ignore_external: bool,
    #[serde(default = "default_threshold")]
    pub fuzzy_threshold: f64,
    #[serde(default = "default_true")]
    pub skip_code_blocks: bool,
    #[serde(default = "default_true")]
    pub skip_inline_code: bool,
    #[serde(default = "default_true")]
    pub check_html_img: bool,
    #[serde(default = "default_true")]
    pub check_video: bool,
    #[serde(default)]
    pub check_links: bool,
}

impl Default for CheckerOptions {
    fn default() -> Self {
        Self {
            ignore_external: true,
            fuzzy_threshold: 0.6,
            skip_code_blocks: true,
            skip_inline_code: true,
            check_html_img: true,
            check_video: true,
            check_links: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Reference-bearing syntax.
pub enum Construct {
    MarkdownImage,
    MarkdownLink,
    HtmlImg,
    VideoPoster,
    VideoSrc,
}

impl Construct {
    pub fn kind(self) -> &'static str {
        match self {
            Construct::MarkdownImage | Construct::HtmlImg => "missing-image",
            Construct::VideoPoster | Construct::VideoSrc => "missing-media",
            Construct::MarkdownLink => "broken-link",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Construct::MarkdownImage | Construct::HtmlImg => "Image",
            Construct::VideoPoster => "Video poster",
            Construct::VideoSrc => "Video",
            Construct::MarkdownLink => "Link target",
        }
    }
}

/// Compiled extraction patterns.
pub struct Patterns {
    /// `![alt](path "title")`
    md_image: Regex,
    /// `[text](path)` or an image; `bang` tells them apart.
    md_any: Regex,
    html_img: Regex,
    video_poster: Regex,
    video_src: Regex,
    anchor: Regex,
}

impl Patterns {
    pub fn new() -> Self {
        let re = |p: &str| Regex::new(p).expect("valid reference pattern");
        Self {
            md_image: re(concat!(
                r"!\[(?:[^\[\]]|\[[^\]]*\])*\]\(",
                r#"\s*(?:<(?P<angle>[^>]+)>|(?P<plain>(?:[^()\s"]|\([^()]*\))+))"#,
                r#"(?:\s+["'][^"']*["'])?\s*\)"#,
            )),
            md_any: re(concat!(
                r"(?P<bang>!?)\[(?:[^\[\]]|\[[^\]]*\])*\]\(",
                r#"\s*(?:<(?P<angle>[^>]+)>|(?P<plain>(?:[^()\s"]|\([^()]*\))+))"#,
                r#"(?:\s+["'][^"']*["'])?\s*\)"#,
            )),
            html_img: re(r#"(?i)<img\s+(?:[^>]*?\s+)?src\s*=\s*["'](?P<path>[^"']+)["'][^>]*>"#),
            video_poster: re(
                r#"(?i)<video\s+(?:[^>]*?\s+)?poster\s*=\s*["'](?P<path>[^"']+)["'][^>]*>"#,
            ),
            video_src: re(
                r#"(?i)<(?:video|source)\s+(?:[^>]*?\s+)?src\s*=\s*["'](?P<path>[^"']+)["'][^>]*>"#,
            ),
            anchor: re(r"#[\w-]*$"),
        }
    }
}

impl Default for Patterns {
    fn default() -> Self {
        Self::new()
    }
}

/// A reference occurrence: byte range within a line plus its construct.
struct Site {
    start: usize,
    end: usize,
    construct: Construct,
    angle: bool,
}

fn find_sites(line: &str, pats: &Patterns, constructs: &[Construct]) -> Vec<Site> {
    let mut out = Vec::new();
    if constructs.contains(&Construct::MarkdownImage) {
        for caps in pats.md_image.captures_iter(line) {
            if let Some(m) = caps.name("angle").or_else(|| caps.name("plain")) {
                out.push(Site {
                    start: m.start(),
                    end: m.end(),
                    construct: Construct::MarkdownImage,
                    angle: caps.name("angle").is_some(),
                });
            }
        }
    }
    if constructs.contains(&Construct::MarkdownLink) {
        for caps in pats.md_any.captures_iter(line) {
            if caps.name("bang").map(|m| !m.as_str().is_empty()).unwrap_or(false) {
                continue;
            }
            if let Some(m) = caps.name("angle").or_else(|| caps.name("plain")) {
                out.push(Site {
                    start: m.start(),
                    end: m.end(),
                    construct: Construct::MarkdownLink,
                    angle: caps.name("angle").is_some(),
                });
            }
        }
    }
    let html = [
        (Construct::HtmlImg, &pats.html_img),
        (Construct::VideoPoster, &pats.video_poster),
        (Construct::VideoSrc, &pats.video_src),
    ];
    for (construct, re) in html {
        if !constructs.contains(&construct) {
            continue;
        }
        for caps in re.captures_iter(line) {
            if let Some(m) = caps.name("path") {
                out.push(Site {
                    start: m.start(),
                    end: m.end(),
                    construct,
                    angle: false,
                });
            }
        }
    }
    out.sort_by_key(|s| (s.start, s.end));
    out.dedup_by_key(|s| (s.start, s.end));
    out
}

/// Shared scan used by the markdown checkers.
pub(crate) fn scan_references(
    checker: &str,
    file: &Path,
    content: &str,
    ctx: &CheckContext,
    opts: &CheckerOptions,
    pats: &Patterns,
    constructs: &[Construct],
) -> Result<Vec<Issue>, CheckerFailure> {
    let index = LineIndex::new(content);
    let mut issues = Vec::new();
    let mut scanner = MarkdownScanner::new(content, opts.skip_code_blocks, opts.skip_inline_code);
    for line in scanner.by_ref() {
        for site in find_sites(&line.masked, pats, constructs) {
            let raw = &line.text[site.start..site.end];
            // trim and drop a trailing #anchor, narrowing the span accordingly
            let lead = raw.len() - raw.trim_start().len();
            let mut clean = raw.trim();
            if let Some(m) = pats.anchor.find(clean) {
                clean = &clean[..m.start()];
            }
            if clean.is_empty() {
                continue;
            }
            let start = line.offset + site.start + lead;
            let end = start + clean.len();
            if let Some(issue) = inspect(checker, file, content, &index, ctx, opts, clean, start, end, &site) {
                issues.push(issue);
            }
        }
    }
    if let Some(open) = scanner.unclosed_fence() {
        return Err(CheckerFailure {
            line: open,
            message: format!(
                "code fence opened at line {} is never closed; the rest of the document was not checked",
                open
            ),
            partial: issues,
        });
    }
    Ok(issues)
}

#[allow(clippy::too_many_arguments)]
fn inspect(
    checker: &str,
    file: &Path,
    content: &str,
    index: &LineIndex,
    ctx: &CheckContext,
    opts: &CheckerOptions,
    reference: &str,
    start: usize,
    end: usize,
    site: &Site,
) -> Option<Issue> {
    let construct = site.construct;
    let (line, column) = index.position(content, start);
    let (end_line, end_column) = index.position(content, end);
    let mut issue = Issue {
        file: file.to_path_buf(),
        line,
        column,
        end_line,
        end_column,
        start,
        end,
        severity: Severity::Error,
        kind: construct.kind().to_string(),
        checker: checker.to_string(),
        message: String::new(),
        original: reference.to_string(),
        suggestion: None,
        content_hash: String::new(),
    };
    if is_external(reference) {
        if opts.ignore_external {
            return None;
        }
        issue.severity = Severity::Warning;
        issue.kind = "unverified-external".to_string();
        issue.message = format!("External reference not verified: `{}`", reference);
        return Some(issue);
    }
    if construct == Construct::MarkdownLink && reference.starts_with('?') {
        return None;
    }
    if ctx.resolver.exists(reference, file, ctx) {
        return None;
    }
    issue.message = format!("{} not found: `{}`", construct.noun(), reference);
    let normalized = ctx.resolver.normalize(reference);
    let (_, missing_name) = split_reference(&normalized);
    let candidates = resolve::collect_candidates(reference, file, ctx, opts.fuzzy_threshold);
    let encoded = ctx.resolver.decodes_percent() && normalized != reference.trim_start_matches("./");
    issue.suggestion = fuzzy::suggest(missing_name, &candidates, opts.fuzzy_threshold)
        .map(|m| Suggestion {
            text: styled_reference(&m.reference, site, encoded),
            score: m.score,
        })
        .filter(|s| s.text != reference);
    Some(issue)
}

/// Write a candidate path so it reads back the same way in the replaced
/// position: percent-encoded when the original was, and inside `<...>` when a
/// Markdown destination would otherwise end at whitespace.
fn styled_reference(path: &str, site: &Site, encoded: bool) -> String {
    if encoded {
        return path
            .split('/')
            .map(|seg| urlencoding::encode(seg).into_owned())
            .collect::<Vec<_>>()
            .join("/");
    }
    let markdown = matches!(site.construct, Construct::MarkdownImage | Construct::MarkdownLink);
    if markdown && !site.angle && path.contains(char::is_whitespace) {
        return format!("<{}>", path);
    }
    path.to_string()
}

/// Names and descriptions of the built-in checkers.
pub fn available() -> Vec<(&'static str, &'static str)> {
    let opts = CheckerOptions::default();
    let img = ImageChecker::new(opts.clone());
    let link = LinkChecker::new(opts);
    vec![
        (img.name(), img.description()),
        (link.name(), link.description()),
    ]
}

/// Build a checker by configuration name.
pub fn by_name(name: &str, opts: CheckerOptions) -> Option<Box<dyn Checker>> {
    match name {
        "image" => Some(Box::new(ImageChecker::new(opts))),
        "link" => Some(Box::new(LinkChecker::new(opts))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_sites_markdown_variants() {
        let p = Patterns::new();
        let all = [Construct::MarkdownImage, Construct::MarkdownLink];
        let line = r#"![a](x.png) [t](doc.md) ![b](<with space.png>) ![c](p(1).png "title")"#;
        let sites = find_sites(line, &p, &all);
        let got: Vec<(&str, Construct)> = sites
            .iter()
            .map(|s| (&line[s.start..s.end], s.construct))
            .collect();
        assert_eq!(
            got,
            vec![
                ("x.png", Construct::MarkdownImage),
                ("doc.md", Construct::MarkdownLink),
                ("with space.png", Construct::MarkdownImage),
                ("p(1).png", Construct::MarkdownImage),
            ]
        );
    }

    #[test]
    fn test_find_sites_html_tags() {
        let p = Patterns::new();
        let all = [Construct::HtmlImg, Construct::VideoPoster, Construct::VideoSrc];
        let line = r#"<img alt="x" data-src="no.png" src='a.png' /> <video controls poster="p.jpg" src="v.mp4"></video>"#;
        let mut got: Vec<&str> = find_sites(line, &p, &all)
            .iter()
            .map(|s| &line[s.start..s.end])
            .collect();
        got.sort();
        assert_eq!(got, vec!["a.png", "p.jpg", "v.mp4"]);
    }

    #[test]
    fn test_is_markdown_extensions() {
        assert!(is_markdown(Path::new("a.md")));
        assert!(is_markdown(Path::new("a.MDX")));
        assert!(is_markdown(Path::new("a.markdown")));
        assert!(!is_markdown(Path::new("a.txt")));
    }
}
