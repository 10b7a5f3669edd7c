//! On-disk patch records and the exclusive operation lock.

use crate::error::{Error, Result};
use crate::models::patch::PatchRecord;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

const LOCK_FILE: &str = ".lock";

#[derive(Debug, Clone)]
/// Directory of `<id>.json` records.
pub struct PatchStore {
    dir: PathBuf,
}

impl PatchStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// A fresh sortable id derived from `now`; suffixed `-001`, `-002`, ...
    /// when already taken so string order stays creation order.
    pub fn next_id(&self, now: DateTime<Utc>) -> String {
        let base = now.format("%Y%m%dT%H%M%S%6fZ").to_string();
        if !self.path_for(&base).exists() {
            return base;
        }
        let mut n = 1;
        loop {
            let id = format!("{}-{:03}", base, n);
            if !self.path_for(&id).exists() {
                return id;
            }
            n += 1;
        }
    }

    /// Write `record` atomically (temp file + rename).
    pub fn save(&self, record: &PatchRecord) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::storage("create", &self.dir, e))?;
        let path = self.path_for(&record.id);
        let body = serde_json::to_string_pretty(record).map_err(|source| Error::Record {
            path: path.clone(),
            source,
        })?;
        super::write_atomic(&path, &body)?;
        debug!(id = %record.id, state = %record.state, "saved patch record");
        Ok(())
    }

    pub fn load(&self, id: &str) -> Result<PatchRecord> {
        let path = self.path_for(id);
        let s = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::PatchNotFound(id.to_string()))
            }
            Err(e) => return Err(Error::storage("read", &path, e)),
        };
        serde_json::from_str(&s).map_err(|source| Error::Record { path, source })
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        let path = self.path_for(id);
        fs::remove_file(&path).map_err(|e| Error::storage("remove", &path, e))
    }

    /// All records, newest first. A missing directory is an empty store.
    pub fn list(&self) -> Result<Vec<PatchRecord>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(it) => it,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::storage("list", &self.dir, e)),
        };
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::storage("list", &self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            out.push(self.load(id)?);
        }
        out.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(out)
    }

    /// Take the store-wide lock. Fails with `Error::Locked` if another
    /// operation holds it.
    pub fn lock(&self) -> Result<PatchLock> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::storage("create", &self.dir, e))?;
        let path = self.dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::storage("open", &path, e))?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(path = %path.display(), "acquired patch lock");
                Ok(PatchLock { file, path })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Err(Error::Locked(path)),
            Err(e) => Err(Error::storage("lock", &path, e)),
        }
    }
}

/// Held for the duration of an apply/undo/redo; released on drop.
pub struct PatchLock {
    file: File,
    path: PathBuf,
}

impl Drop for PatchLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!(path = %self.path.display(), "released patch lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::patch::PatchState;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn record(id: &str) -> PatchRecord {
        PatchRecord {
            id: id.into(),
            created_at: Utc::now(),
            state: PatchState::Applied,
            applied_at: None,
            reversed_at: None,
            files: BTreeMap::new(),
        }
    }

    #[test]
    fn test_ids_sort_chronologically_and_stay_unique() {
        let tmp = tempdir().unwrap();
        let store = PatchStore::new(tmp.path());
        let t1 = Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 58).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 1).unwrap();
        let a = store.next_id(t1);
        let b = store.next_id(t2);
        assert!(a < b);
        assert_eq!(a, "20240309T235958000000Z");
        store.save(&record(&a)).unwrap();
        let again = store.next_id(t1);
        assert_eq!(again, format!("{}-001", a));
    }

    #[test]
    fn test_collision_suffixes_keep_string_order() {
        let tmp = tempdir().unwrap();
        let store = PatchStore::new(tmp.path());
        let t = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let mut ids = Vec::new();
        for _ in 0..12 {
            let id = store.next_id(t);
            store.save(&record(&id)).unwrap();
            ids.push(id);
        }
        assert_eq!(ids[10], "20240309T120000000000Z-010");
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(sorted, ids);
        assert_eq!(store.list().unwrap()[0].id, ids[11]);
    }

    #[test]
    fn test_list_newest_first_and_missing_dir_is_empty() {
        let tmp = tempdir().unwrap();
        let store = PatchStore::new(tmp.path().join("patches"));
        assert!(store.list().unwrap().is_empty());
        for id in ["20240101T000000000000Z", "20240301T000000000000Z", "20240201T000000000000Z"] {
            store.save(&record(id)).unwrap();
        }
        let ids: Vec<String> = store.list().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(
            ids,
            vec![
                "20240301T000000000000Z",
                "20240201T000000000000Z",
                "20240101T000000000000Z"
            ]
        );
    }

    #[test]
    fn test_load_missing_and_malformed() {
        let tmp = tempdir().unwrap();
        let store = PatchStore::new(tmp.path());
        assert!(matches!(store.load("nope"), Err(Error::PatchNotFound(_))));
        fs::write(tmp.path().join("bad.json"), "{").unwrap();
        assert!(matches!(store.load("bad"), Err(Error::Record { .. })));
    }

    #[test]
    fn test_lock_is_exclusive_until_dropped() {
        let tmp = tempdir().unwrap();
        let store = PatchStore::new(tmp.path());
        let held = store.lock().unwrap();
        assert!(matches!(store.lock(), Err(Error::Locked(_))));
        drop(held);
        assert!(store.lock().is_ok());
    }
}
