//! Lexical helpers for prefab paths.
//!
//! Prefab paths are relative to the storage root and always use forward
//! slashes. Nothing here touches the file system.

use super::StorageError;

/// Normalize a prefab path.
///
/// - Replaces backslashes with forward slashes
/// - Collapses redundant separators (`a///b` → `a/b`)
/// - Drops `.` segments
/// - Folds `..` into the preceding segment
/// - Strips leading and trailing slashes
///
/// Fails if the result is empty or a `..` would climb above the root.
pub fn normalize(path: &str) -> Result<String, StorageError> {
    let replaced = path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();

    for segment in replaced.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(StorageError::InvalidPath(format!(
                        "'{path}' escapes the storage root"
                    )));
                }
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return Err(StorageError::InvalidPath("empty path".into()));
    }

    Ok(segments.join("/"))
}

/// The directory part of a normalized path (`""` for top-level files).
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[..pos],
        None => "",
    }
}

/// Resolve `relative` against the directory `dir` and normalize.
pub fn join(dir: &str, relative: &str) -> Result<String, StorageError> {
    if dir.is_empty() {
        normalize(relative)
    } else {
        normalize(&format!("{dir}/{relative}"))
    }
}

/// Path of `target` as seen from the directory `dir`. Both must be
/// normalized.
pub fn relative(dir: &str, target: &str) -> String {
    let from: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    let to: Vec<&str> = target.split('/').collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<&str> = vec![".."; from.len() - common];
    segments.extend_from_slice(&to[common..]);
    segments.join("/")
}
