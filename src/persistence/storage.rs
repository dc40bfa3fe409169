use std::collections::HashMap;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Key/blob storage underneath persistence.
///
/// Keys are '/'-separated relative names. `rename` must replace the target
/// atomically: afterwards readers see either the old or the new blob.
pub trait Storage {
    fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>>;
    fn size(&self, key: &str) -> io::Result<Option<u64>>;
    fn write(&mut self, key: &str, data: &[u8]) -> io::Result<()>;
    fn rename(&mut self, from: &str, to: &str) -> io::Result<()>;
    /// Removing a missing key is not an error
    fn remove(&mut self, key: &str) -> io::Result<()>;
}

/// Files under a root directory (the SPIFFS mount point on the device)
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

fn not_found_as_none<T>(result: io::Result<T>) -> io::Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

impl Storage for FsStorage {
    fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        not_found_as_none(fs::read(self.full_path(key)))
    }

    fn size(&self, key: &str) -> io::Result<Option<u64>> {
        not_found_as_none(fs::metadata(self.full_path(key)).map(|m| m.len()))
    }

    fn write(&mut self, key: &str, data: &[u8]) -> io::Result<()> {
        let path = self.full_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&path)?;
        file.write_all(data)?;
        file.sync_all()
    }

    fn rename(&mut self, from: &str, to: &str) -> io::Result<()> {
        fs::rename(self.full_path(from), self.full_path(to))
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        not_found_as_none(fs::remove_file(self.full_path(key))).map(|_| ())
    }
}

/// In-memory storage for tests and host simulation.
///
/// Clones share the same contents, so a test can keep a handle while
/// persistence owns another. `fail_renames` simulates power loss between the
/// temporary write and the rename. `refuse_rename_over` mirrors SPIFFS, which
/// will not rename onto an existing file.
#[derive(Clone, Default)]
pub struct MemStorage {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    writes: Arc<AtomicUsize>,
    fail_renames: Arc<AtomicBool>,
    refuse_rename_over: Arc<AtomicBool>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `write` calls that reached the store
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn fail_renames(&self, fail: bool) {
        self.fail_renames.store(fail, Ordering::Relaxed);
    }

    pub fn refuse_rename_over(&self, refuse: bool) {
        self.refuse_rename_over.store(refuse, Ordering::Relaxed);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).cloned()
    }

    /// Place a blob directly, bypassing the write counter
    pub fn insert(&self, key: &str, data: &[u8]) {
        self.lock().insert(key.to_string(), data.to_vec());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        // A poisoned map still holds consistent blobs, each insert is one call
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Storage for MemStorage {
    fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.get(key))
    }

    fn size(&self, key: &str) -> io::Result<Option<u64>> {
        Ok(self.lock().get(key).map(|b| b.len() as u64))
    }

    fn write(&mut self, key: &str, data: &[u8]) -> io::Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.insert(key, data);
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> io::Result<()> {
        if self.fail_renames.load(Ordering::Relaxed) {
            return Err(io::Error::new(ErrorKind::Interrupted, "power lost before rename"));
        }
        let mut blobs = self.lock();
        if self.refuse_rename_over.load(Ordering::Relaxed) && blobs.contains_key(to) {
            return Err(io::Error::new(
                ErrorKind::AlreadyExists,
                format!("{} exists (SPIFFS_ERR_CONFLICTING_NAME)", to),
            ));
        }
        let data = blobs
            .remove(from)
            .ok_or_else(|| io::Error::new(ErrorKind::NotFound, from.to_string()))?;
        blobs.insert(to.to_string(), data);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_storage_basics() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FsStorage::new(dir.path());

        assert_eq!(storage.read("state.json").unwrap(), None);
        assert_eq!(storage.size("state.json").unwrap(), None);

        storage.write("config/host", b"example.org").unwrap();
        assert_eq!(storage.size("config/host").unwrap(), Some(11));

        storage.write("state.json.tmp", b"{}").unwrap();
        storage.rename("state.json.tmp", "state.json").unwrap();
        assert_eq!(storage.read("state.json").unwrap().as_deref(), Some(&b"{}"[..]));
        assert_eq!(storage.read("state.json.tmp").unwrap(), None);

        storage.remove("state.json").unwrap();
        storage.remove("state.json").unwrap();
        assert_eq!(storage.read("state.json").unwrap(), None);
    }

    #[test]
    fn mem_storage_shares_contents() {
        let handle = MemStorage::new();
        let mut storage = handle.clone();
        storage.write("a", b"1").unwrap();
        assert!(handle.contains("a"));
        assert_eq!(handle.write_count(), 1);

        handle.fail_renames(true);
        assert!(storage.rename("a", "b").is_err());
        assert!(handle.contains("a"));
    }

    #[test]
    fn mem_storage_can_refuse_rename_over() {
        let handle = MemStorage::new();
        let mut storage = handle.clone();
        handle.refuse_rename_over(true);
        storage.write("a", b"1").unwrap();
        storage.write("b", b"2").unwrap();

        let err = storage.rename("a", "b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(handle.get("b").as_deref(), Some(&b"2"[..]));

        storage.remove("b").unwrap();
        storage.rename("a", "b").unwrap();
        assert_eq!(handle.get("b").as_deref(), Some(&b"1"[..]));
    }
}
