//! refcheck core library.
//!
//! Finds broken image, media and link references in Markdown documents,
//! suggests the closest existing file, and applies accepted fixes as
//! recorded, reversible patches.
//!
//! High-level modules:
//! - `models`: Issues, summaries and patch records.
//! - `context`: Immutable scan context and source position helpers.
//! - `resolve`: Path resolvers mapping references to files.
//! - `fuzzy`: Similarity scoring and suggestion ranking.
//! - `checks`: Markdown scanner and the image/link checkers.
//! - `runner`: File collection, parallel scanning and hooks.
//! - `planner`: Turns accepted issues into non-overlapping edits.
//! - `patch`: Patch store and apply/undo/redo engine.
//! - `review`: Interactive accept/skip loop.
//! - `config`: Discovery and effective configuration resolution.
//! - `output`: Human/JSON printers.
//! - `cli`: CLI argument parsing (binary uses this).
//! - `error`: Error taxonomy.
pub mod checks;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod fuzzy;
pub mod models;
pub mod output;
pub mod patch;
pub mod planner;
pub mod resolve;
pub mod review;
pub mod runner;

pub use error::{Error, Result};
