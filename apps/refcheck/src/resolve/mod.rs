//! Path resolvers: map a reference string to a filesystem location.
//!
//! Resolvers are pure functions of `(reference, source_file, ctx)` so the
//! collector can call them from any worker. Besides `resolve`/`exists`, a
//! resolver names the directories where a missing asset would be expected
//! (`search_dirs`) and how a found file should be written back as reference
//! text (`reference_for`). Those two feed the fuzzy matcher.

pub mod default;
pub mod post_assets;

pub use default::DefaultResolver;
pub use post_assets::PostAssetResolver;

use crate::context::CheckContext;
use crate::fuzzy::{self, Candidate};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Capability interface for reference resolution.
pub trait PathResolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// `reference` as this resolver reads it. Missing filenames are compared
    /// against candidates in this form.
    fn normalize<'a>(&self, reference: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(reference.trim())
    }

    /// Whether `%XX` escapes in references are decoded before resolving.
    fn decodes_percent(&self) -> bool {
        false
    }

    /// Filesystem location denoted by `reference`, or `None` when it does not
    /// denote a local path (external URLs).
    fn resolve(&self, reference: &str, source_file: &Path, ctx: &CheckContext) -> Option<PathBuf>;

    /// True iff `resolve` yields a path that exists on disk.
    fn exists(&self, reference: &str, source_file: &Path, ctx: &CheckContext) -> bool {
        self.resolve(reference, source_file, ctx)
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    /// Directories whose files are suggestion candidates for a missing reference.
    fn search_dirs(&self, reference: &str, source_file: &Path, ctx: &CheckContext) -> Vec<PathBuf>;

    /// Reference text that would make `candidate` resolve from `source_file`,
    /// written in the same style (rooted or relative) as `reference`.
    fn reference_for(
        &self,
        candidate: &Path,
        reference: &str,
        source_file: &Path,
        ctx: &CheckContext,
    ) -> String;
}

const EXTERNAL_PREFIXES: &[&str] = &[
    "http://", "https://", "//", "ftp://", "ftps://", "mailto:", "tel:", "data:",
];

/// Whether `reference` uses a recognized external URL scheme.
pub fn is_external(reference: &str) -> bool {
    let r = reference.trim();
    EXTERNAL_PREFIXES
        .iter()
        .any(|p| r.get(..p.len()).is_some_and(|s| s.eq_ignore_ascii_case(p)))
}

/// Split a reference into its directory part and filename.
pub fn split_reference(reference: &str) -> (&str, &str) {
    match reference.rfind('/') {
        Some(i) => (&reference[..i], &reference[i + 1..]),
        None => ("", reference),
    }
}

/// Render a relative path with `/` separators, dropping `.` components.
pub fn to_posix(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::CurDir => None,
            Component::ParentDir => Some("..".to_string()),
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Write `candidate` relative to `base`, keeping a leading `./` if the
/// original reference had one.
pub(crate) fn relative_reference(candidate: &Path, base: &Path, reference: &str) -> String {
    let rel = pathdiff::diff_paths(candidate, base).unwrap_or_else(|| candidate.to_path_buf());
    let s = to_posix(&rel);
    if reference.starts_with("./") && !s.starts_with("../") {
        format!("./{}", s)
    } else {
        s
    }
}

/// Rooted reference text (`/a/b.png`) for a file inside the project root.
pub(crate) fn rooted_reference(candidate: &Path, ctx: &CheckContext) -> String {
    let rel = candidate.strip_prefix(&ctx.root).unwrap_or(candidate);
    format!("/{}", to_posix(rel))
}

/// When `dir` is missing, fall back to the most similar sibling directory.
fn existing_or_similar_dir(dir: &Path, threshold: f64) -> Option<PathBuf> {
    if dir.is_dir() {
        return Some(dir.to_path_buf());
    }
    let parent = dir.parent()?;
    let wanted = dir.file_name()?.to_string_lossy().to_string();
    let mut names: Vec<String> = fs::read_dir(parent)
        .ok()?
        .flatten()
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    fuzzy::closest_name(&wanted, &names, threshold).map(|n| parent.join(n))
}

/// Files colocated with the expected location of a missing reference.
///
/// Never scans beyond the resolver's search directories (or their closest
/// sibling when a directory name itself is misspelled).
pub fn collect_candidates(
    reference: &str,
    source_file: &Path,
    ctx: &CheckContext,
    threshold: f64,
) -> Vec<Candidate> {
    let resolver = ctx.resolver.as_ref();
    let (dir_part, _) = split_reference(reference);
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut out = Vec::new();
    for dir in resolver.search_dirs(reference, source_file, ctx) {
        let dir = if dir_part.is_empty() {
            if dir.is_dir() {
                dir
            } else {
                continue;
            }
        } else {
            match existing_or_similar_dir(&dir, threshold) {
                Some(d) => d,
                None => continue,
            }
        };
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.as_path() != source_file)
            .collect();
        files.sort();
        for f in files {
            let Some(name) = f.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            let text = resolver.reference_for(&f, reference, source_file, ctx);
            if seen.insert(text.clone()) {
                out.push(Candidate {
                    name,
                    reference: text,
                });
            }
        }
    }
    out
}

/// Resolver by configuration name.
pub fn by_name(
    name: &str,
    post_dirs: Vec<String>,
    asset_folder_per_post: bool,
) -> Option<Box<dyn PathResolver>> {
    match name {
        "default" => Some(Box::new(DefaultResolver)),
        "post-assets" | "hexo" => Some(Box::new(PostAssetResolver {
            post_dirs,
            asset_folder_per_post,
        })),
        _ => None,
    }
}

/// Names and descriptions of the available resolvers.
pub fn available() -> Vec<(&'static str, &'static str)> {
    let d = DefaultResolver;
    let p = PostAssetResolver::default();
    vec![
        (d.name(), d.description()),
        (p.name(), p.description()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_is_external_schemes() {
        assert!(is_external("https://example.com/a.png"));
        assert!(is_external("HTTP://example.com/a.png"));
        assert!(is_external("//cdn.example.com/a.png"));
        assert!(is_external("data:image/png;base64,AAAA"));
        assert!(is_external("mailto:me@example.com"));
        assert!(!is_external("/images/a.png"));
        assert!(!is_external("images/http.png"));
    }

    #[test]
    fn test_split_reference() {
        assert_eq!(split_reference("a/b/c.png"), ("a/b", "c.png"));
        assert_eq!(split_reference("c.png"), ("", "c.png"));
        assert_eq!(split_reference("/c.png"), ("", "c.png"));
    }

    #[test]
    fn test_collect_candidates_falls_back_to_similar_dir() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("images")).unwrap();
        fs::write(root.join("images/shot.png"), b"x").unwrap();
        fs::write(root.join("doc.md"), "").unwrap();
        let ctx = CheckContext::new(root, Arc::new(DefaultResolver));
        let cands = collect_candidates("imgaes/shot.png", &root.join("doc.md"), &ctx, 0.6);
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].reference, "images/shot.png");
        assert_eq!(cands[0].name, "shot.png");
    }

    #[test]
    fn test_collect_candidates_excludes_source_document() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::write(root.join("doc.md"), "").unwrap();
        fs::write(root.join("doc.png"), b"x").unwrap();
        let ctx = CheckContext::new(root, Arc::new(DefaultResolver));
        let cands = collect_candidates("dco.png", &root.join("doc.md"), &ctx, 0.6);
        let refs: Vec<_> = cands.iter().map(|c| c.reference.as_str()).collect();
        assert_eq!(refs, vec!["doc.png"]);
    }

    #[test]
    fn test_by_name_selects_variant() {
        assert_eq!(by_name("default", vec![], true).unwrap().name(), "default");
        assert_eq!(
            by_name("post-assets", vec!["_posts".into()], true)
                .unwrap()
                .name(),
            "post-assets"
        );
        assert!(by_name("jekyll", vec![], true).is_none());
    }
}
