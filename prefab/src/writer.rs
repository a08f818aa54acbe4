//! Graph writer: [`PrefabRoot`] → prefab file.
//!
//! The root keeps the id `"This"`; every other emission unit (owned
//! components, then roots of nested instances) gets a fresh sequential
//! numeric id. Ids are not stable across save cycles.
//!
//! Owned components emit every member recorded in the prefab's change set.
//! Nested instances emit only their own change set, i.e. the overrides
//! applied on top of their file, never their fully resolved state.

use std::collections::HashMap;

use crate::change_set::ChangeSet;
use crate::component::MemberTag;
use crate::error::{ConvertError, PrefabError};
use crate::file::{EntryId, EntrySource, PrefabEntry, PrefabFile};
use crate::path::MemberPath;
use crate::prefab_root::{PrefabRoot, Provenance};
use crate::registry::PrefabContext;
use crate::storage::path as prefab_path;
use crate::world::{ComponentId, World};

/// One entry to be written.
struct Unit<'r> {
    component: ComponentId,
    id: EntryId,
    source: EntrySource,
    changes: &'r ChangeSet,
}

/// Writes [`PrefabRoot`]s back to prefab files.
pub struct Writer<'a> {
    ctx: PrefabContext<'a>,
}

impl<'a> Writer<'a> {
    pub fn new(ctx: PrefabContext<'a>) -> Self {
        Self { ctx }
    }

    /// Encode `prefab` and write it to `dest` (relative to the storage
    /// root). Returns the table that was written.
    pub fn write(
        &self,
        world: &World,
        prefab: &PrefabRoot,
        dest: &str,
    ) -> Result<toml::Table, PrefabError> {
        let dest = prefab_path::normalize(dest).map_err(|source| PrefabError::InvalidPath {
            path: dest.to_owned(),
            source,
        })?;
        let file = self.encode(world, prefab, &dest)?;
        let table = file.to_table();
        let text = toml::to_string(&table).map_err(|source| PrefabError::Encode {
            path: dest.clone(),
            source,
        })?;
        self.ctx
            .storage
            .write(&dest, &text)
            .map_err(|source| PrefabError::Write {
                path: dest.clone(),
                source,
            })?;
        log::info!("wrote prefab {dest}: {} entries", file.entries.len());
        Ok(table)
    }

    /// Build the file model for `prefab` as if written to `dest`, without
    /// touching storage.
    pub fn encode(
        &self,
        world: &World,
        prefab: &PrefabRoot,
        dest: &str,
    ) -> Result<PrefabFile, PrefabError> {
        let dir = prefab_path::parent(dest);
        let units = emission_units(world, prefab, dir);
        let id_of: HashMap<ComponentId, String> = units
            .iter()
            .map(|u| (u.component, u.id.to_string()))
            .collect();

        let mut file = PrefabFile::default();
        for unit in &units {
            let values = self.encode_values(world, unit, &id_of, dest)?;
            file.entries.push(PrefabEntry {
                id: unit.id.clone(),
                source: unit.source.clone(),
                values,
            });
        }

        for path in prefab.change_set.paths() {
            if !units.iter().any(|u| u.component == path.root()) {
                log::debug!("{dest}: skipping change to {path:?}, its component is not an entry");
            }
        }

        for favorite in &prefab.favorites {
            match id_of.get(&favorite.root()) {
                Some(id) => file.favorites.push(format!("{id}.{}", favorite.dotted())),
                None => log::warn!("{dest}: dropping favorite {favorite:?}, its component is not an entry"),
            }
        }

        Ok(file)
    }

    fn encode_values(
        &self,
        world: &World,
        unit: &Unit<'_>,
        id_of: &HashMap<ComponentId, String>,
        dest: &str,
    ) -> Result<toml::Table, PrefabError> {
        let converters = self.ctx.converters;
        let lookup = |c: ComponentId| id_of.get(&c).cloned();
        let mut values = toml::Table::new();

        for path in unit.changes.paths() {
            if path.root() != unit.component {
                log::debug!(
                    "{dest}: entry '{}' cannot address {path:?}, skipping",
                    unit.id
                );
                continue;
            }
            let member = path.accessor();
            let slot = path.resolve(world, converters)?;
            let error = |err| member_error(dest, &unit.id, path, err);
            let value = match member.tag() {
                MemberTag::Reference => converters
                    .resolve_reference(member)
                    .and_then(|converter| converter.serialize(slot, &lookup))
                    .map_err(error)?,
                MemberTag::Value => converters.serialize_value(member, slot).map_err(error)?,
            };
            insert_nested(&mut values, &path.names(), value);
        }
        Ok(values)
    }
}

/// Root first, then owned components, then roots of nested instances.
fn emission_units<'r>(world: &World, prefab: &'r PrefabRoot, dir: &str) -> Vec<Unit<'r>> {
    let mut units = Vec::new();
    let mut next = 1usize;
    let mut numbered = || {
        let id = EntryId::Numbered(next.to_string());
        next += 1;
        id
    };

    let fresh = |component: ComponentId| {
        let type_name = match prefab.provenance.get(&component) {
            Some(Provenance::Fresh { type_name }) => type_name.clone(),
            _ => world.type_name(component).unwrap_or_default().to_owned(),
        };
        EntrySource::Component(type_name)
    };
    let nested = |child: &PrefabRoot| {
        EntrySource::Prefab(prefab_path::relative(dir, &child.source))
    };

    match prefab.children.iter().find(|c| c.root == prefab.root) {
        Some(child) => units.push(Unit {
            component: prefab.root,
            id: EntryId::Root,
            source: nested(child),
            changes: &child.change_set,
        }),
        None => units.push(Unit {
            component: prefab.root,
            id: EntryId::Root,
            source: fresh(prefab.root),
            changes: &prefab.change_set,
        }),
    }

    for &component in prefab.components.iter().filter(|c| **c != prefab.root) {
        units.push(Unit {
            component,
            id: numbered(),
            source: fresh(component),
            changes: &prefab.change_set,
        });
    }

    for child in prefab.children.iter().filter(|c| c.root != prefab.root) {
        units.push(Unit {
            component: child.root,
            id: numbered(),
            source: nested(child),
            changes: &child.change_set,
        });
    }

    units
}

fn member_error(dest: &str, id: &EntryId, path: &MemberPath, err: ConvertError) -> PrefabError {
    let (file, id, member) = (dest.to_owned(), id.to_string(), path.dotted());
    match err {
        ConvertError::UnknownComponent(target) => PrefabError::ForeignReference {
            path: file,
            id,
            member,
            target,
        },
        ConvertError::NoConverter { type_name } => PrefabError::NoConverterFound {
            path: file,
            id,
            member,
            type_name,
        },
        source => PrefabError::InvalidValue {
            path: file,
            id,
            member,
            source,
        },
    }
}

/// Insert `value` at `names` (`["hinge", "angle"]` → `hinge.angle`),
/// creating intermediate tables.
fn insert_nested(table: &mut toml::Table, names: &[&str], value: toml::Value) {
    let Some((last, parents)) = names.split_last() else {
        return;
    };
    let mut current = table;
    for name in parents {
        let slot = current
            .entry(name.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if !slot.is_table() {
            *slot = toml::Value::Table(toml::Table::new());
        }
        current = match slot {
            toml::Value::Table(inner) => inner,
            _ => return,
        };
    }
    current.insert(last.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_nested_creates_and_merges_tables() {
        let mut table = toml::Table::new();
        insert_nested(&mut table, &["hinge", "angle"], toml::Value::Float(90.0));
        insert_nested(&mut table, &["hinge", "pin"], toml::Value::String("2".into()));
        insert_nested(&mut table, &["locked"], toml::Value::Boolean(true));
        let expected: toml::Table = "hinge = { angle = 90.0, pin = \"2\" }\nlocked = true"
            .parse()
            .unwrap();
        assert_eq!(table, expected);
    }

    #[test]
    fn insert_nested_replaces_leaf_with_table() {
        let mut table = toml::Table::new();
        insert_nested(&mut table, &["hinge"], toml::Value::Integer(1));
        insert_nested(&mut table, &["hinge", "angle"], toml::Value::Float(1.0));
        assert_eq!(table["hinge"]["angle"].as_float(), Some(1.0));
    }
}
