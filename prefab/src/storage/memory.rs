use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{PrefabStorage, StorageError};

#[derive(Default)]
struct Files {
    contents: HashMap<String, String>,
    writes: usize,
}

/// In-memory prefab storage for tests and generated content.
///
/// Cloning yields another handle to the same files, so a test can keep one
/// handle for inspection while the loader and writer use another.
///
/// # Example
///
/// ```ignore
/// let storage = MemoryStorage::new();
/// storage.insert("door.toml", "[This]\nComponent = \"Door\"\n");
/// ```
#[derive(Clone, Default)]
pub struct MemoryStorage {
    files: Arc<RwLock<Files>>,
}

impl MemoryStorage {
    /// Create an empty in-memory provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file without counting it as a write.
    pub fn insert(&self, path: impl Into<String>, text: impl Into<String>) {
        self.files.write().contents.insert(path.into(), text.into());
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.files.read().contents.get(path).cloned()
    }

    /// Number of [`PrefabStorage::write`] calls so far.
    pub fn write_count(&self) -> usize {
        self.files.read().writes
    }
}

impl PrefabStorage for MemoryStorage {
    fn read_to_string(&self, path: &str) -> Result<String, StorageError> {
        self.get(path)
            .ok_or_else(|| StorageError::NotFound(path.to_owned()))
    }

    fn write(&self, path: &str, text: &str) -> Result<(), StorageError> {
        let mut files = self.files.write();
        files.contents.insert(path.to_owned(), text.to_owned());
        files.writes += 1;
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.files.read().contents.contains_key(path)
    }
}
