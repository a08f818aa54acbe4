//! Record of member assignments applied to one prefab instance.

use std::collections::HashSet;

use crate::path::MemberPath;
use crate::world::ComponentId;

/// A value as it was assigned to a member.
#[derive(Debug, Clone, PartialEq)]
pub enum AppliedValue {
    /// Inline data, in file form.
    Value(toml::Value),
    /// The components a reference member points at after the assignment.
    References(Vec<ComponentId>),
}

/// One assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEntry {
    pub path: MemberPath,
    pub value: AppliedValue,
}

/// Append-only log of assignments.
///
/// A later assignment to the same path appends a new entry; readers use the
/// most recent entry for a path. Entries are never removed or rewritten.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    entries: Vec<ChangeEntry>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: MemberPath, value: AppliedValue) {
        self.entries.push(ChangeEntry { path, value });
    }

    /// Remove the most recent entry. Only used to take back the record of
    /// an edit that was rolled back.
    pub(crate) fn pop(&mut self) -> Option<ChangeEntry> {
        self.entries.pop()
    }

    /// Move every entry of `other` to the end of this set.
    pub fn append(&mut self, other: &mut ChangeSet) {
        self.entries.append(&mut other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChangeEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent value assigned to `path`.
    pub fn latest(&self, path: &MemberPath) -> Option<&AppliedValue> {
        self.entries
            .iter()
            .rev()
            .find(|e| &e.path == path)
            .map(|e| &e.value)
    }

    /// Each assigned path once, in order of first assignment.
    pub fn paths(&self) -> Vec<&MemberPath> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|e| seen.insert(&e.path))
            .map(|e| &e.path)
            .collect()
    }

    /// Like [`paths`](Self::paths), restricted to paths starting at `root`.
    pub fn paths_rooted_at(&self, root: ComponentId) -> Vec<&MemberPath> {
        self.paths()
            .into_iter()
            .filter(|p| p.root() == root)
            .collect()
    }
}
