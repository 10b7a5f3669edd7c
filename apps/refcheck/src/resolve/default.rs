//! Generic relative-path resolution.

use super::{is_external, relative_reference, rooted_reference, split_reference, PathResolver};
use crate::context::CheckContext;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, Copy)]
/// `/x` resolves against the project root, anything else against the
/// directory of the referencing document.
pub struct DefaultResolver;

fn source_dir(source_file: &Path) -> &Path {
    source_file.parent().unwrap_or_else(|| Path::new("."))
}

impl PathResolver for DefaultResolver {
    fn name(&self) -> &'static str {
        "default"
    }

    fn description(&self) -> &'static str {
        "Relative to the document; leading / relative to the project root"
    }

    fn resolve(&self, reference: &str, source_file: &Path, ctx: &CheckContext) -> Option<PathBuf> {
        if is_external(reference) {
            return None;
        }
        let r = reference.trim();
        if let Some(rest) = r.strip_prefix('/') {
            return Some(ctx.root.join(rest));
        }
        Some(source_dir(source_file).join(r))
    }

    fn search_dirs(&self, reference: &str, source_file: &Path, ctx: &CheckContext) -> Vec<PathBuf> {
        let r = reference.trim();
        let (dir, _) = split_reference(r);
        if let Some(rest) = dir.strip_prefix('/') {
            return vec![ctx.root.join(rest)];
        }
        if r.starts_with('/') {
            return vec![ctx.root.clone()];
        }
        vec![source_dir(source_file).join(dir)]
    }

    fn reference_for(
        &self,
        candidate: &Path,
        reference: &str,
        source_file: &Path,
        ctx: &CheckContext,
    ) -> String {
        if reference.trim().starts_with('/') {
            rooted_reference(candidate, ctx)
        } else {
            relative_reference(candidate, source_dir(source_file), reference.trim())
        }
    }
}
