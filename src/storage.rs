//!
//! coursehub durable storage
//! -------------------------
//! Small string key/value storage used to persist credentials between runs.
//! Two backends are provided:
//! - `MemoryStorage`: process-local map; clones share the same entries.
//! - `FileStorage`: a JSON document on disk, rewritten through a temp file and
//!   rename so a crash never leaves a half-written credential file behind. The
//!   file is owner-only on unix.
//!
//! Reads always go to the backing store; nothing here caches values, since another
//! context (or process, for files) may rewrite them at any time.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt storage file {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode storage document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable string key/value storage.
pub trait DurableStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Write several keys; backends that can do so apply them in one write.
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        for (k, v) in entries { self.set(k, v)?; }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        for k in keys { self.remove(k)?; }
        Ok(())
    }

    /// Short description for logs.
    fn describe(&self) -> String;
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }
}

impl DurableStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> { Ok(self.entries.read().get(key).cloned()) }
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        let mut map = self.entries.write();
        for (k, v) in entries { map.insert(k.to_string(), v.to_string()); }
        Ok(())
    }
    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut map = self.entries.write();
        for k in keys { map.remove(*k); }
        Ok(())
    }
    fn describe(&self) -> String { "memory".to_string() }
}

/// On-disk document layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageDocument {
    #[serde(default)]
    entries: HashMap<String, String>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

pub struct FileStorage {
    path: PathBuf,
    // serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into(), write_lock: Mutex::new(()) } }

    pub fn path(&self) -> &Path { &self.path }

    fn io_err(&self, source: std::io::Error) -> StorageError {
        StorageError::Io { path: self.path.display().to_string(), source }
    }

    fn load(&self) -> Result<StorageDocument, StorageError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StorageDocument::default()),
            Err(e) => return Err(self.io_err(e)),
        };
        if text.trim().is_empty() { return Ok(StorageDocument::default()); }
        serde_json::from_str(&text).map_err(|source| StorageError::Decode { path: self.path.display().to_string(), source })
    }

    fn store(&self, mut doc: StorageDocument) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() { std::fs::create_dir_all(dir).map_err(|e| self.io_err(e))?; }
        }
        doc.updated_at = Some(Utc::now());
        let body = serde_json::to_vec_pretty(&doc)?;
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        // unique temp file per write, so concurrent writers never share one
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.io_err(e))?;
        tmp.write_all(&body).map_err(|e| self.io_err(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_err(e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file().set_permissions(std::fs::Permissions::from_mode(0o600)).map_err(|e| self.io_err(e))?;
        }
        tmp.persist(&self.path).map_err(|e| self.io_err(e.error))?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut HashMap<String, String>)) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        let mut doc = self.load()?;
        f(&mut doc.entries);
        self.store(doc)
    }

    /// Time of the last write, if the file exists.
    pub fn updated_at(&self) -> Result<Option<DateTime<Utc>>, StorageError> { Ok(self.load()?.updated_at) }
}

impl DurableStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> { Ok(self.load()?.entries.get(key).cloned()) }
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|m| { m.insert(key.to_string(), value.to_string()); })
    }
    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|m| { m.remove(key); })
    }
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        self.update(|m| { for (k, v) in entries { m.insert(k.to_string(), v.to_string()); } })
    }
    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        self.update(|m| { for k in keys { m.remove(*k); } })
    }
    fn describe(&self) -> String { format!("file:{}", self.path.display()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_clones_share_entries() {
        let a = MemoryStorage::new();
        let b = a.clone();
        a.set("k", "v").unwrap();
        assert_eq!(b.get("k").unwrap().as_deref(), Some("v"));
        b.remove_many(&["k"]).unwrap();
        assert_eq!(a.get("k").unwrap(), None);
    }

    #[test]
    fn file_storage_persists_across_instances() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("tokens.json");
        let s = FileStorage::new(&path);
        assert_eq!(s.get("missing").unwrap(), None);
        s.set_many(&[("a", "1"), ("b", "2")]).unwrap();
        assert!(s.updated_at().unwrap().is_some());

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.get("a").unwrap().as_deref(), Some("1"));
        reopened.remove("a").unwrap();
        assert_eq!(s.get("a").unwrap(), None);
        assert_eq!(s.get("b").unwrap().as_deref(), Some("2"));
        let names: Vec<_> = std::fs::read_dir(path.parent().unwrap()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names, vec![std::ffi::OsString::from("tokens.json")]);
    }

    #[cfg(unix)]
    #[test]
    fn credential_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tokens.json");
        FileStorage::new(&path).set("access_token", "at").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn concurrent_writers_do_not_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tokens.json");
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let path = path.clone();
                // separate instances model separate processes
                std::thread::spawn(move || FileStorage::new(path).set(&format!("k{i}"), "v"))
            })
            .collect();
        for t in threads { t.join().unwrap().unwrap(); }
        let doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(doc["entries"].is_object());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tokens.json");
        std::fs::write(&path, "{not json").unwrap();
        let s = FileStorage::new(&path);
        assert!(matches!(s.get("a"), Err(StorageError::Decode { .. })));
    }
}
