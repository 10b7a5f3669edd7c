//! CLI argument parsing via `clap`.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "refcheck",
    version,
    about = "Check image and link references in Markdown, fix them reversibly",
    long_about = "refcheck — find broken image/media references in Markdown, suggest the closest existing file, and apply fixes as undoable patches.\n\nConfiguration precedence: CLI > refcheck.toml > defaults.",
    after_help = "Examples:\n  refcheck check\n  refcheck check --include 'docs/**/*.md' --output json\n  refcheck fix --dry-run\n  refcheck fix --all\n  refcheck undo --list\n  refcheck undo 20240301T101500123456Z",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[arg(long, global = true, help = "Start directory for root detection (default: current dir)")]
    pub root: Option<String>,
    #[arg(long, global = true, help = "Path to refcheck.toml|yaml (skips discovery)")]
    pub config: Option<String>,
    #[arg(short, long, global = true, action = clap::ArgAction::SetTrue, help = "Debug logging to stderr")]
    pub verbose: bool,
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
/// Supported subcommands.
pub enum Commands {
    /// Show version
    #[command(about = "Show version", long_about = "Print the current refcheck version.")]
    Version,
    /// Scan documents and report issues
    #[command(
        about = "Check references",
        long_about = "Scan included documents with the configured checkers. Exits 1 when any error-level issue is found.",
        after_help = "Examples:\n  refcheck check --checker image --checker link\n  refcheck check --exclude 'drafts/**' --quiet"
    )]
    Check {
        #[arg(long, help = "Additional include glob, relative to root (repeatable)")]
        include: Vec<String>,
        #[arg(long, help = "Additional exclude glob, relative to root (repeatable)")]
        exclude: Vec<String>,
        #[arg(long = "checker", help = "Checker to run: image|link (repeatable)")]
        checkers: Vec<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
        #[arg(short, long, action = clap::ArgAction::SetTrue, help = "Print only the summary")]
        quiet: bool,
    },
    /// Review suggestions and apply them as a patch
    #[command(
        about = "Fix references",
        long_about = "Scan, review each fixable issue interactively (or take all with --all), then apply the accepted fixes as one recorded patch.",
        after_help = "Examples:\n  refcheck fix\n  refcheck fix --all --dry-run"
    )]
    Fix {
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Accept every suggestion without prompting")]
        all: bool,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Show the patch without writing anything")]
        dry_run: bool,
        #[arg(long, help = "Additional include glob, relative to root (repeatable)")]
        include: Vec<String>,
        #[arg(long, help = "Additional exclude glob, relative to root (repeatable)")]
        exclude: Vec<String>,
        #[arg(long = "checker", help = "Checker to run: image|link (repeatable)")]
        checkers: Vec<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// Reverse an applied patch
    #[command(
        about = "Undo a patch",
        long_about = "Restore the files touched by a patch. Defaults to the newest applied patch. Fails without changes if any file was modified since.",
        after_help = "Examples:\n  refcheck undo\n  refcheck undo --list"
    )]
    Undo {
        #[arg(help = "Patch id (default: newest applied)")]
        id: Option<String>,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "List recorded patches, newest first")]
        list: bool,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// Re-apply a reversed patch
    #[command(
        about = "Redo a patch",
        long_about = "Re-apply a patch that was undone. Defaults to the newest reversed patch."
    )]
    Redo {
        #[arg(help = "Patch id (default: newest reversed)")]
        id: Option<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// List available checkers and resolvers
    #[command(about = "List checkers and resolvers")]
    List {
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
}
