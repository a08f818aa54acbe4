//! The prefab file model.
//!
//! A prefab file is a TOML table. Top-level keys are entry ids (`"This"`
//! or all-digit strings) plus an optional `FavoriteFields` array. Any other
//! top-level key is a metadata row and is ignored by the engine.
//!
//! ```toml
//! FavoriteFields = ["This.speed", "1.color"]
//!
//! [This]
//! Component = "Player"
//! Values = { speed = 4.5, weapon = "1" }
//!
//! [1]
//! Prefab = "../weapons/sword.toml"
//! Values = { color = [1.0, 0.0, 0.0, 1.0] }
//! ```

use std::fmt;

use uuid::Uuid;

use crate::error::{LoadWarning, PrefabError};

/// Reserved id of a file's root entry.
pub const ROOT_ID: &str = "This";
/// Top-level key holding the favorites list.
pub const FAVORITES_KEY: &str = "FavoriteFields";
/// Entry key declaring a fresh component.
pub const COMPONENT_KEY: &str = "Component";
/// Entry key declaring a nested prefab.
pub const PREFAB_KEY: &str = "Prefab";
/// Entry key holding member values.
pub const VALUES_KEY: &str = "Values";

/// Identifier of an entry within one prefab instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryId {
    /// The reserved root entry `"This"`.
    Root,
    /// A numeric entry id as it appears in the file.
    Numbered(String),
    /// An id minted at runtime by `add_component`. Disjoint from the
    /// numbered ids the writer assigns.
    Generated(Uuid),
}

impl EntryId {
    /// Classify a top-level key. Returns `None` for metadata rows.
    pub fn parse(key: &str) -> Option<EntryId> {
        if key == ROOT_ID {
            Some(EntryId::Root)
        } else if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
            Some(EntryId::Numbered(key.to_owned()))
        } else {
            None
        }
    }

    /// A fresh random id.
    pub fn generate() -> EntryId {
        EntryId::Generated(Uuid::new_v4())
    }

    pub fn is_root(&self) -> bool {
        matches!(self, EntryId::Root)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryId::Root => f.write_str(ROOT_ID),
            EntryId::Numbered(n) => f.write_str(n),
            EntryId::Generated(uuid) => write!(f, "{uuid}"),
        }
    }
}

/// How an entry's component comes into existence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySource {
    /// `Component = "<type name>"`: a default instance of a registered type.
    Component(String),
    /// `Prefab = "<relative path>"`: the root of another prefab file.
    Prefab(String),
}

/// One entry of a prefab file.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefabEntry {
    pub id: EntryId,
    pub source: EntrySource,
    pub values: toml::Table,
}

/// A parsed prefab file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrefabFile {
    /// Entries in file order.
    pub entries: Vec<PrefabEntry>,
    /// Dotted `id.member[.member...]` paths.
    pub favorites: Vec<String>,
    /// Favorites that were not dotted path strings, dropped while parsing.
    pub warnings: Vec<LoadWarning>,
}

impl PrefabFile {
    /// Build the file model from a parsed TOML table.
    ///
    /// `path` is only used in error messages.
    pub fn from_table(path: &str, table: &toml::Table) -> Result<PrefabFile, PrefabError> {
        let mut file = PrefabFile::default();

        for (key, value) in table {
            if key == FAVORITES_KEY {
                parse_favorites(path, value, &mut file);
                continue;
            }
            let Some(id) = EntryId::parse(key) else {
                log::debug!("{path}: skipping metadata row '{key}'");
                continue;
            };
            file.entries.push(parse_entry(path, id, value)?);
        }

        if file.root().is_none() {
            return Err(PrefabError::MissingRootEntry {
                path: path.to_owned(),
            });
        }
        Ok(file)
    }

    /// Parse prefab text.
    pub fn parse(path: &str, text: &str) -> Result<PrefabFile, PrefabError> {
        let table = text
            .parse::<toml::Table>()
            .map_err(|source| PrefabError::Parse {
                path: path.to_owned(),
                source,
            })?;
        Self::from_table(path, &table)
    }

    pub fn root(&self) -> Option<&PrefabEntry> {
        self.entries.iter().find(|e| e.id.is_root())
    }

    /// The TOML table for this file: favorites first, then entries in order.
    pub fn to_table(&self) -> toml::Table {
        let mut table = toml::Table::new();
        if !self.favorites.is_empty() {
            table.insert(
                FAVORITES_KEY.to_owned(),
                toml::Value::Array(
                    self.favorites
                        .iter()
                        .cloned()
                        .map(toml::Value::String)
                        .collect(),
                ),
            );
        }
        for entry in &self.entries {
            let mut row = toml::Table::new();
            let (key, source) = match &entry.source {
                EntrySource::Component(type_name) => (COMPONENT_KEY, type_name),
                EntrySource::Prefab(path) => (PREFAB_KEY, path),
            };
            row.insert(key.to_owned(), toml::Value::String(source.clone()));
            if !entry.values.is_empty() {
                row.insert(
                    VALUES_KEY.to_owned(),
                    toml::Value::Table(entry.values.clone()),
                );
            }
            table.insert(entry.id.to_string(), toml::Value::Table(row));
        }
        table
    }

    /// Encode as TOML text.
    pub fn to_toml_string(&self, path: &str) -> Result<String, PrefabError> {
        toml::to_string(&self.to_table()).map_err(|source| PrefabError::Encode {
            path: path.to_owned(),
            source,
        })
    }
}

/// Malformed items are dropped with a warning; they never fail the file.
fn parse_favorites(path: &str, value: &toml::Value, file: &mut PrefabFile) {
    let mut reject = |item: &toml::Value, reason: &str| {
        file.warnings.push(LoadWarning::UnresolvedFavorite {
            path: path.to_owned(),
            favorite: item.to_string(),
            reason: reason.to_owned(),
        });
    };
    let Some(items) = value.as_array() else {
        reject(value, "expected an array of dotted path strings");
        return;
    };
    let mut favorites = Vec::with_capacity(items.len());
    for item in items {
        match item.as_str() {
            Some(favorite) => favorites.push(favorite.to_owned()),
            None => reject(item, "expected a dotted path string"),
        }
    }
    file.favorites = favorites;
}

fn parse_entry(path: &str, id: EntryId, value: &toml::Value) -> Result<PrefabEntry, PrefabError> {
    let invalid = |reason: &str| PrefabError::InvalidEntry {
        path: path.to_owned(),
        id: id.to_string(),
        reason: reason.to_owned(),
    };

    let row = value.as_table().ok_or_else(|| invalid("not a table"))?;
    let text = |key: &str| -> Result<Option<String>, PrefabError> {
        match row.get(key) {
            None => Ok(None),
            Some(toml::Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(invalid(&format!("'{key}' must be a string"))),
        }
    };

    let source = match (text(COMPONENT_KEY)?, text(PREFAB_KEY)?) {
        (Some(type_name), None) => EntrySource::Component(type_name),
        (None, Some(prefab)) => EntrySource::Prefab(prefab),
        (Some(_), Some(_)) => return Err(invalid("declares both 'Component' and 'Prefab'")),
        (None, None) => return Err(invalid("declares neither 'Component' nor 'Prefab'")),
    };

    let values = match row.get(VALUES_KEY) {
        None => toml::Table::new(),
        Some(toml::Value::Table(values)) => values.clone(),
        Some(_) => return Err(invalid("'Values' must be a table")),
    };

    for key in row.keys() {
        if key != COMPONENT_KEY && key != PREFAB_KEY && key != VALUES_KEY {
            log::debug!("{path}: entry '{id}' ignores unknown field '{key}'");
        }
    }

    Ok(PrefabEntry { id, source, values })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYER: &str = r#"
FavoriteFields = ["This.speed"]

[This]
Component = "Player"
Values = { speed = 4.5, weapon = "1" }

[Editor]
camera = [0, 0, 10]

[1]
Prefab = "../weapons/sword.toml"
"#;

    #[test]
    fn parse_entries_in_file_order() {
        let file = PrefabFile::parse("player.toml", PLAYER).unwrap();
        assert_eq!(file.favorites, ["This.speed"]);
        assert_eq!(file.entries.len(), 2);

        let root = &file.entries[0];
        assert_eq!(root.id, EntryId::Root);
        assert_eq!(root.source, EntrySource::Component("Player".into()));
        assert_eq!(root.values["speed"].as_float(), Some(4.5));

        let sword = &file.entries[1];
        assert_eq!(sword.id, EntryId::Numbered("1".into()));
        assert_eq!(sword.source, EntrySource::Prefab("../weapons/sword.toml".into()));
        assert!(sword.values.is_empty());
    }

    #[test]
    fn entry_id_classification() {
        assert_eq!(EntryId::parse("This"), Some(EntryId::Root));
        assert_eq!(EntryId::parse("42"), Some(EntryId::Numbered("42".into())));
        assert_eq!(EntryId::parse("Editor"), None);
        assert_eq!(EntryId::parse("4a"), None);
        assert_eq!(EntryId::parse(""), None);
        assert_ne!(EntryId::generate(), EntryId::generate());
    }

    #[test]
    fn missing_root() {
        let err = PrefabFile::parse("a.toml", "[1]\nComponent = \"Door\"\n").unwrap_err();
        assert!(matches!(err, PrefabError::MissingRootEntry { path } if path == "a.toml"));
    }

    #[test]
    fn both_sources_is_invalid() {
        let text = "[This]\nComponent = \"Door\"\nPrefab = \"b.toml\"\n";
        let err = PrefabFile::parse("a.toml", text).unwrap_err();
        assert!(matches!(err, PrefabError::InvalidEntry { id, .. } if id == "This"));
    }

    #[test]
    fn neither_source_is_invalid() {
        let err = PrefabFile::parse("a.toml", "[This]\nValues = {}\n").unwrap_err();
        assert!(matches!(err, PrefabError::InvalidEntry { .. }));
    }

    #[test]
    fn values_must_be_table() {
        let text = "[This]\nComponent = \"Door\"\nValues = 3\n";
        let err = PrefabFile::parse("a.toml", text).unwrap_err();
        assert!(matches!(err, PrefabError::InvalidEntry { reason, .. } if reason.contains("Values")));
    }

    #[test]
    fn malformed_favorites_are_dropped() {
        let text = "FavoriteFields = [\"This.speed\", 3]\n[This]\nComponent = \"Door\"\n";
        let file = PrefabFile::parse("a.toml", text).unwrap();
        assert_eq!(file.favorites, ["This.speed"]);
        assert_eq!(
            file.warnings,
            [LoadWarning::UnresolvedFavorite {
                path: "a.toml".into(),
                favorite: "3".into(),
                reason: "expected a dotted path string".into(),
            }]
        );

        let text = "FavoriteFields = \"This.speed\"\n[This]\nComponent = \"Door\"\n";
        let file = PrefabFile::parse("a.toml", text).unwrap();
        assert!(file.favorites.is_empty());
        assert_eq!(file.warnings.len(), 1);
    }

    #[test]
    fn syntax_error_names_file() {
        let err = PrefabFile::parse("broken.toml", "[This\n").unwrap_err();
        assert!(err.to_string().starts_with("broken.toml:"));
    }

    #[test]
    fn encode_then_parse() {
        let file = PrefabFile::parse("player.toml", PLAYER).unwrap();
        let text = file.to_toml_string("player.toml").unwrap();
        assert!(text.starts_with("FavoriteFields"));
        assert!(!text.contains("Editor"));
        assert_eq!(PrefabFile::parse("player.toml", &text).unwrap(), file);
    }
}
