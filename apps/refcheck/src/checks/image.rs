//! Image and media reference checker.
//!
//! Covers markdown images, HTML `<img src>`, `<video poster>` and
//! `<video>`/`<source>` `src`, plus plain markdown links when `check_links`
//! is enabled.

use super::{
    scan_references, CheckContext, Checker, CheckerFailure, CheckerOptions, Construct, Patterns,
};
use crate::models::Issue;
use std::path::Path;

pub struct ImageChecker {
    pub options: CheckerOptions,
    patterns: Patterns,
}

impl ImageChecker {
    pub fn new(options: CheckerOptions) -> Self {
        Self {
            options,
            patterns: Patterns::new(),
        }
    }

    fn constructs(&self) -> Vec<Construct> {
        let mut v = vec![Construct::MarkdownImage];
        if self.options.check_html_img {
            v.push(Construct::HtmlImg);
        }
        if self.options.check_video {
            v.push(Construct::VideoPoster);
            v.push(Construct::VideoSrc);
        }
        if self.options.check_links {
            v.push(Construct::MarkdownLink);
        }
        v
    }
}

impl Checker for ImageChecker {
    fn name(&self) -> &'static str {
        "image"
    }

    fn description(&self) -> &'static str {
        "Check image and media paths in Markdown and embedded HTML"
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
            &self.constructs(),
        )
    }
}
