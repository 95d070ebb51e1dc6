//! Durable key-value storage for session persistence.
//!
//! This module provides:
//! - `KeyValueStore`: the string-keyed storage interface the session manager writes to
//! - `MemoryStorage`: process-local storage for tests and ephemeral shells
//! - `FileStorage`: a JSON object on disk, rewritten on every mutation
//!
//! The session manager is the only writer; backends need no transactional
//! guarantees beyond individual operations.

pub mod file;
pub mod memory;

use anyhow::Result;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// String-keyed storage shared between the session manager and its host.
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key is absent
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite a value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Check whether a key is present
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}
