//! Patch engine: persist, apply, undo and redo fix sessions.
//!
//! A record moves `Planned -> Persisted -> Applied -> Reversed` (and back to
//! `Applied` via redo). Every transition that touches the working tree runs
//! under the store lock and verifies all file hashes before writing anything,
//! so a conflict in one file leaves every file untouched. Writes go through a
//! temp file that keeps the original permissions; if a later write fails,
//! files already written are restored.

pub mod store;

pub use store::{PatchLock, PatchStore};

use crate::context::content_hash;
use crate::error::{Error, Result};
use crate::models::patch::{apply_hunks, FilePatch, PatchRecord, PatchState};
use crate::planner::{Edit, Plan};
use crate::resolve::to_posix;
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// New content for one file, verified and ready to write.
struct Staged {
    path: PathBuf,
    before: String,
    after: String,
}

pub struct PatchEngine {
    root: PathBuf,
    store: PatchStore,
}

impl PatchEngine {
    pub fn new(root: impl Into<PathBuf>, store: PatchStore) -> Self {
        Self {
            root: root.into(),
            store,
        }
    }

    pub fn store(&self) -> &PatchStore {
        &self.store
    }

    pub fn list(&self) -> Result<Vec<PatchRecord>> {
        self.store.list()
    }

    /// Build the `Planned` record for `plan` against the current files.
    ///
    /// Fails with `PatchConflict` when a file no longer matches the content
    /// its issues were detected in.
    pub fn prepare(&self, plan: &Plan) -> Result<PatchRecord> {
        self.stage(plan).map(|(record, _)| record)
    }

    fn stage(&self, plan: &Plan) -> Result<(PatchRecord, Vec<Staged>)> {
        let mut files = BTreeMap::new();
        let mut staged = Vec::new();
        for (file, fp) in &plan.files {
            let path = self.root.join(file);
            let before = read(&path)?;
            let actual = content_hash(&before);
            if actual != fp.content_hash {
                return Err(Error::PatchConflict {
                    path,
                    expected: fp.content_hash.clone(),
                    actual,
                });
            }
            let hunks: Vec<_> = fp.edits.iter().map(Edit::to_hunk).collect();
            let after = apply_hunks(&before, &hunks).ok_or_else(|| Error::PatchConflict {
                path: path.clone(),
                expected: fp.content_hash.clone(),
                actual: actual.clone(),
            })?;
            files.insert(
                self.key(&path),
                FilePatch {
                    before_hash: actual,
                    after_hash: content_hash(&after),
                    hunks,
                },
            );
            staged.push(Staged {
                path,
                before,
                after,
            });
        }
        let now = Utc::now();
        let record = PatchRecord {
            id: self.store.next_id(now),
            created_at: now,
            state: PatchState::Planned,
            applied_at: None,
            reversed_at: None,
            files,
        };
        Ok((record, staged))
    }

    /// Persist and apply `plan`. With `dry_run`, return the `Planned` record
    /// and touch nothing.
    pub fn apply(&self, plan: &Plan, dry_run: bool) -> Result<PatchRecord> {
        if dry_run {
            return self.prepare(plan);
        }
        let _lock = self.store.lock()?;
        let (mut record, staged) = self.stage(plan)?;
        record.state = PatchState::Persisted;
        self.store.save(&record)?;
        info!(id = %record.id, files = record.files.len(), "persisted patch");
        if let Err(e) = write_all(&staged) {
            if let Err(cleanup) = self.store.remove(&record.id) {
                warn!(id = %record.id, error = %cleanup, "failed to remove record after write failure");
            }
            return Err(e);
        }
        record.state = PatchState::Applied;
        record.applied_at = Some(Utc::now());
        self.store.save(&record)?;
        info!(id = %record.id, hunks = record.hunk_count(), "applied patch");
        Ok(record)
    }

    /// Reverse an applied record; defaults to the newest applied one.
    pub fn undo(&self, id: Option<&str>) -> Result<PatchRecord> {
        let _lock = self.store.lock()?;
        let mut record = self.select(id, PatchState::Applied, Error::NothingToUndo)?;
        let inverse: BTreeMap<String, FilePatch> = record
            .files
            .iter()
            .map(|(k, fp)| (k.clone(), fp.inverse()))
            .collect();
        let staged = self.verify(&inverse)?;
        write_all(&staged)?;
        record.state = PatchState::Reversed;
        record.reversed_at = Some(Utc::now());
        self.store.save(&record)?;
        info!(id = %record.id, "reversed patch");
        Ok(record)
    }

    /// Re-apply a reversed record; defaults to the newest reversed one.
    pub fn redo(&self, id: Option<&str>) -> Result<PatchRecord> {
        let _lock = self.store.lock()?;
        let mut record = self.select(id, PatchState::Reversed, Error::NothingToRedo)?;
        let staged = self.verify(&record.files)?;
        write_all(&staged)?;
        record.state = PatchState::Applied;
        record.applied_at = Some(Utc::now());
        record.reversed_at = None;
        self.store.save(&record)?;
        info!(id = %record.id, "re-applied patch");
        Ok(record)
    }

    fn select(&self, id: Option<&str>, wanted: PatchState, none: Error) -> Result<PatchRecord> {
        match id {
            Some(id) => {
                let record = self.store.load(id)?;
                if record.state != wanted {
                    return Err(Error::InvalidState {
                        id: record.id,
                        state: record.state.to_string(),
                        expected: wanted.to_string(),
                    });
                }
                Ok(record)
            }
            None => self
                .store
                .list()?
                .into_iter()
                .find(|r| r.state == wanted)
                .ok_or(none),
        }
    }

    /// Check every file against `before_hash` and compute its `after_hash`
    /// content. Nothing is written.
    fn verify(&self, files: &BTreeMap<String, FilePatch>) -> Result<Vec<Staged>> {
        let mut staged = Vec::new();
        for (key, fp) in files {
            let path = self.root.join(key);
            let before = read(&path)?;
            let actual = content_hash(&before);
            if actual != fp.before_hash {
                return Err(Error::PatchConflict {
                    path,
                    expected: fp.before_hash.clone(),
                    actual,
                });
            }
            let after = apply_hunks(&before, &fp.hunks)
                .filter(|a| content_hash(a) == fp.after_hash)
                .ok_or_else(|| Error::PatchConflict {
                    path: path.clone(),
                    expected: fp.after_hash.clone(),
                    actual: actual.clone(),
                })?;
            staged.push(Staged {
                path,
                before,
                after,
            });
        }
        Ok(staged)
    }

    fn key(&self, path: &Path) -> String {
        to_posix(path.strip_prefix(&self.root).unwrap_or(path))
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::storage("read", path, e))
}

/// Replace `path` with `body` through a same-directory temp file.
///
/// The temp file takes over the existing file's permissions (0644 for new
/// files on unix) and is synced before it is persisted over `path`.
pub(crate) fn write_atomic(path: &Path, body: &str) -> Result<()> {
    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let perms = fs::metadata(path).map(|m| m.permissions()).ok();

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::storage("create temp file in", dir, e))?;
    tmp.write_all(body.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| Error::storage("write", tmp.path(), e))?;

    #[cfg(unix)]
    let perms = {
        use std::os::unix::fs::PermissionsExt;
        perms.or(Some(fs::Permissions::from_mode(0o644)))
    };
    if let Some(perms) = perms {
        fs::set_permissions(tmp.path(), perms)
            .map_err(|e| Error::storage("set permissions on", tmp.path(), e))?;
    }

    tmp.persist(path)
        .map_err(|e| Error::storage("replace", path, e.error))?;

    #[cfg(unix)]
    {
        if let Ok(parent) = fs::File::open(dir) {
            let _ = parent.sync_all();
        }
    }
    Ok(())
}

/// Write every staged file; on failure restore the ones already written.
fn write_all(staged: &[Staged]) -> Result<()> {
    for (i, s) in staged.iter().enumerate() {
        if let Err(e) = write_atomic(&s.path, &s.after) {
            for done in &staged[..i] {
                if let Err(restore) = write_atomic(&done.path, &done.before) {
                    warn!(path = %done.path.display(), error = %restore, "failed to restore file");
                }
            }
            return Err(e);
        }
    }
    Ok(())
}
