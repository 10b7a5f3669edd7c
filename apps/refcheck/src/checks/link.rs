//! Markdown link target checker.

use super::{
    scan_references, CheckContext, Checker, CheckerFailure, CheckerOptions, Construct, Patterns,
};
use crate::models::Issue;
use std::path::Path;

/// Checks `[text](target)` links to local files. Pure `#anchor` links and
/// external URLs are not checked.
pub struct LinkChecker {
    pub options: CheckerOptions,
    patterns: Patterns,
}

impl LinkChecker {
    pub fn new(options: CheckerOptions) -> Self {
        Self {
            options,
            patterns: Patterns::new(),
        }
    }
}

impl Checker for LinkChecker {
    fn name(&self) -> &'static str {
        "link"
    }

    fn description(&self) -> &'static str {
        "Check local link targets in Markdown"
    }

    fn check(
        &self,
        file: &Path,
        content: &str,
        ctx: &CheckContext,
    ) -> Result<Vec<Issue>, CheckerFailure> {
        scan_references(
            self.name(),
            file,
            content,
            ctx,
            &self.options,
            &self.patterns,
            &[Construct::MarkdownLink],
        )
    }
}
