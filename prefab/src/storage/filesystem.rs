use std::io::Write;
use std::path::PathBuf;

use super::{PrefabStorage, StorageError};

/// Prefab files under a directory on disk.
///
/// Writes go to a temporary file next to the destination, which is then
/// renamed over it. A failed write leaves the previous file intact.
///
/// # Example
///
/// ```ignore
/// let storage = FileSystemStorage::new("./assets/prefabs");
/// // Reads ./assets/prefabs/levels/forest.toml
/// let root = Loader::new(ctx).load(&mut world, "levels/forest.toml")?;
/// ```
pub struct FileSystemStorage {
    root: PathBuf,
}

impl FileSystemStorage {
    /// Create a provider rooted at the given directory.
    ///
    /// The directory does not need to exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl PrefabStorage for FileSystemStorage {
    fn read_to_string(&self, path: &str) -> Result<String, StorageError> {
        std::fs::read_to_string(self.resolve(path)).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(path.to_owned()),
            _ => StorageError::Io(e),
        })
    }

    fn write(&self, path: &str, text: &str) -> Result<(), StorageError> {
        let full_path = self.resolve(path);
        let dir = full_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.root.clone());
        std::fs::create_dir_all(&dir)?;

        let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
        temp.write_all(text.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&full_path).map_err(|e| StorageError::Io(e.error))?;
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }
}
