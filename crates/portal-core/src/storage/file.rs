use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::KeyValueStore;

/// Storage file name in the data directory
const STORAGE_FILE: &str = "storage.json";

/// Key-value storage backed by a single JSON object on disk.
///
/// Every mutation reads the file, applies the change and writes it back.
/// The mutex serializes those sequences within one process.
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    /// Storage at `<dir>/storage.json`. The directory is created on first write.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::at_path(dir.as_ref().join(STORAGE_FILE))
    }

    pub fn at_path(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_contents(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read storage file: {}", self.path.display()))?;

        if contents.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(contents))
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        match self.read_contents()? {
            Some(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse storage file: {}", self.path.display())),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Like `load`, but an unparseable file yields an empty map and `true`
    /// so the caller rewrites it.
    fn load_for_write(&self) -> Result<(BTreeMap<String, String>, bool)> {
        let Some(contents) = self.read_contents()? else {
            return Ok((BTreeMap::new(), false));
        };
        match serde_json::from_str(&contents) {
            Ok(entries) => Ok((entries, false)),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Storage file is unreadable, starting over"
                );
                Ok((BTreeMap::new(), true))
            }
        }
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create storage directory")?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write storage file: {}", self.path.display()))?;
        debug!(path = %self.path.display(), entries = entries.len(), "Storage saved");
        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> bool) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let (mut entries, discarded) = self.load_for_write()?;
        if f(&mut entries) || discarded {
            self.save(&entries)?;
        }
        Ok(())
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        // Skip the write when nothing changes
        self.modify(|entries| entries.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        assert_eq!(storage.get("auth_token").unwrap(), None);
        // Removing from a missing file does not create it
        storage.remove("auth_token").unwrap();
        assert!(!storage.path().exists());
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("intranet-portal");

        let storage = FileStorage::new(&nested);
        storage.set("auth_token", "abc").unwrap();
        storage.set("auth_expires_at", "2030-01-01T00:00:00Z").unwrap();

        let reopened = FileStorage::new(&nested);
        assert_eq!(reopened.get("auth_token").unwrap().as_deref(), Some("abc"));
        assert_eq!(
            reopened.get("auth_expires_at").unwrap().as_deref(),
            Some("2030-01-01T00:00:00Z")
        );

        reopened.remove("auth_token").unwrap();
        assert_eq!(storage.get("auth_token").unwrap(), None);
        assert!(storage.contains("auth_expires_at").unwrap());
    }

    #[test]
    fn test_corrupt_file_is_an_error_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        std::fs::write(storage.path(), "not json").unwrap();
        assert!(storage.get("auth_token").is_err());
    }

    #[test]
    fn test_corrupt_file_is_replaced_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        std::fs::write(storage.path(), "{truncated").unwrap();
        storage.remove("auth_token").unwrap();
        assert_eq!(storage.get("auth_token").unwrap(), None);
        assert_eq!(std::fs::read_to_string(storage.path()).unwrap().trim(), "{}");

        std::fs::write(storage.path(), "{truncated").unwrap();
        storage.set("auth_token", "abc").unwrap();
        assert_eq!(storage.get("auth_token").unwrap().as_deref(), Some("abc"));
    }
}
