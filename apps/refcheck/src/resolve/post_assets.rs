//! Blog-engine convention: each post owns a same-named asset folder.
//!
//! `_posts/2024-01-01-hello.md` may reference `cover.png` meaning
//! `_posts/2024-01-01-hello/cover.png`. Non-rooted references from posts try
//! the asset folder first and fall back to the document directory.

use super::{is_external, relative_reference, rooted_reference, split_reference, PathResolver};
use crate::context::CheckContext;
use std::borrow::Cow;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PostAssetResolver {
    /// Directories (relative to root, e.g. `_posts` or `source/_posts`) whose
    /// documents are posts.
    pub post_dirs: Vec<String>,
    pub asset_folder_per_post: bool,
}

impl Default for PostAssetResolver {
    fn default() -> Self {
        Self {
            post_dirs: vec!["_posts".to_string()],
            asset_folder_per_post: true,
        }
    }
}

impl PostAssetResolver {
    fn is_post(&self, source_file: &Path, ctx: &CheckContext) -> bool {
        let Ok(rel) = source_file.strip_prefix(&ctx.root) else {
            return false;
        };
        self.post_dirs
            .iter()
            .map(|d| d.trim_matches('/'))
            .filter(|d| !d.is_empty())
            .any(|d| rel.starts_with(Path::new(d)))
    }

    /// Asset folder for `source_file` if it is a post and the convention is on.
    fn asset_folder(&self, source_file: &Path, ctx: &CheckContext) -> Option<PathBuf> {
        if !self.asset_folder_per_post || !self.is_post(source_file, ctx) {
            return None;
        }
        let stem = source_file.file_stem()?;
        Some(source_dir(source_file).join(stem))
    }
}

fn source_dir(source_file: &Path) -> &Path {
    source_file.parent().unwrap_or_else(|| Path::new("."))
}

impl PathResolver for PostAssetResolver {
    fn name(&self) -> &'static str {
        "post-assets"
    }

    fn description(&self) -> &'static str {
        "Blog posts resolve against their same-named asset folder first"
    }

    /// Percent-decode and drop a leading `./`.
    fn normalize<'a>(&self, reference: &'a str) -> Cow<'a, str> {
        let r = reference.trim();
        let decoded = urlencoding::decode(r).unwrap_or(Cow::Borrowed(r));
        match decoded {
            Cow::Borrowed(s) => Cow::Borrowed(s.strip_prefix("./").unwrap_or(s)),
            Cow::Owned(s) => match s.strip_prefix("./") {
                Some(rest) => Cow::Owned(rest.to_string()),
                None => Cow::Owned(s),
            },
        }
    }

    fn decodes_percent(&self) -> bool {
        true
    }

    fn resolve(&self, reference: &str, source_file: &Path, ctx: &CheckContext) -> Option<PathBuf> {
        if is_external(reference) {
            return None;
        }
        let r = self.normalize(reference);
        if let Some(rest) = r.strip_prefix('/') {
            return Some(ctx.root.join(rest));
        }
        if let Some(folder) = self.asset_folder(source_file, ctx) {
            let p = folder.join(r.as_ref());
            if p.exists() {
                return Some(p);
            }
        }
        Some(source_dir(source_file).join(r.as_ref()))
    }

    fn search_dirs(&self, reference: &str, source_file: &Path, ctx: &CheckContext) -> Vec<PathBuf> {
        let r = self.normalize(reference);
        let (dir, _) = split_reference(&r);
        if r.starts_with('/') {
            return vec![ctx.root.join(dir.trim_start_matches('/'))];
        }
        let mut dirs = vec![source_dir(source_file).join(dir)];
        if let Some(folder) = self.asset_folder(source_file, ctx) {
            dirs.push(folder.join(dir));
        }
        dirs
    }

    fn reference_for(
        &self,
        candidate: &Path,
        reference: &str,
        source_file: &Path,
        ctx: &CheckContext,
    ) -> String {
        let r = reference.trim();
        if r.starts_with('/') {
            return rooted_reference(candidate, ctx);
        }
        if let Some(folder) = self.asset_folder(source_file, ctx) {
            if candidate.starts_with(&folder) {
                return relative_reference(candidate, &folder, r);
            }
        }
        relative_reference(candidate, source_dir(source_file), r)
    }
}
