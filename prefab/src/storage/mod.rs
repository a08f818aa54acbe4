//! Where prefab files live.
//!
//! The loader and writer only see the [`PrefabStorage`] trait. Two
//! providers ship with the crate: [`FileSystemStorage`] for files under a
//! directory and [`MemoryStorage`] for tests and generated content.
//!
//! # Path Contract
//!
//! Paths passed to providers are normalized with [`path::normalize`]:
//! forward slashes, no leading or trailing slashes, no `.` or `..` segments.
//! They are relative to the provider's root.

mod filesystem;
mod memory;
pub mod path;

pub use filesystem::FileSystemStorage;
pub use memory::MemoryStorage;

/// Errors raised by storage providers.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Synchronous whole-file access to prefab text.
pub trait PrefabStorage: Send + Sync {
    /// Read the entire file at `path`.
    fn read_to_string(&self, path: &str) -> Result<String, StorageError>;

    /// Replace the file at `path` with `text`, creating it if needed.
    ///
    /// On failure the previous contents must be left in place.
    fn write(&self, path: &str, text: &str) -> Result<(), StorageError>;

    fn exists(&self, path: &str) -> bool;
}
