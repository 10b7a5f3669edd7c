//! Error taxonomy for the fix/undo engine and configuration layer.
//!
//! Scanning-phase problems never surface here: unresolved references and
//! checker failures become `Issue`s. Everything below aborts the single
//! active operation.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
/// Fatal errors returned by library operations.
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to {action} {}: {source}", path.display())]
    Storage {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("patch record {} is malformed: {source}", path.display())]
    Record {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("conflict in {}: expected content {expected}, found {actual}", path.display())]
    PatchConflict {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("patch {0} not found")]
    PatchNotFound(String),

    #[error("no applied patch to undo")]
    NothingToUndo,

    #[error("no reversed patch to redo")]
    NothingToRedo,

    #[error("patch {id} is {state}, expected {expected}")]
    InvalidState {
        id: String,
        state: String,
        expected: String,
    },

    #[error("another fix or undo is in progress (lock held at {})", .0.display())]
    Locked(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an I/O failure with the action and path that produced it.
    pub fn storage(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Storage {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::PatchConflict { .. })
    }
}
