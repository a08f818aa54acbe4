//! Graph loader: prefab file → [`PrefabRoot`].
//!
//! Loading runs in fixed passes per file:
//!
//! 1. **Construct**: every entry gets its component. `Component` entries
//!    construct a default instance; `Prefab` entries load the referenced
//!    file completely (all of its passes) and use its root.
//! 2. **References**: reference members are wired through the id table
//!    built in pass 1, so an entry may reference entries declared after it.
//! 3. **Values**: value members are converted through the
//!    [`ConversionRegistry`](crate::ConversionRegistry).
//! 4. **Cleanup**: keys no pass consumed become warnings.
//! 5. **Favorites**: dotted favorite paths are resolved; failures become
//!    warnings.
//!
//! Every assignment in passes 2 and 3 is recorded on the resulting
//! [`PrefabRoot`] via [`PrefabRoot::register_change`].

use std::collections::{HashMap, HashSet};

use crate::accessor::MemberAccessor;
use crate::change_set::AppliedValue;
use crate::component::{MemberTag, Reflect};
use crate::convert::ValueStrategy;
use crate::error::{AccessError, ConvertError, LoadWarning, PrefabError};
use crate::file::{EntryId, EntrySource, PrefabEntry, PrefabFile};
use crate::path::{ComponentPath, MemberPath};
use crate::prefab_root::{PrefabRoot, Provenance};
use crate::registry::PrefabContext;
use crate::storage::path as prefab_path;
use crate::world::{ComponentId, World};

/// Per-load settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Construct the `"This"` entry as this type instead of the one the file
    /// declares. Forwarded to the nested load when `"This"` is itself a
    /// `Prefab` entry. The file's declared type is still what gets written
    /// back.
    pub root_type: Option<String>,
}

impl LoadOptions {
    pub fn with_root_type(root_type: impl Into<String>) -> Self {
        Self {
            root_type: Some(root_type.into()),
        }
    }
}

/// Loads prefab files into a [`World`].
pub struct Loader<'a> {
    ctx: PrefabContext<'a>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Pass {
    References,
    Values,
}

/// Keys of one `Values` table taken by the resolution passes.
#[derive(Default)]
struct Consumed {
    /// Dotted keys that were assigned.
    keys: HashSet<String>,
    /// Dotted keys of nested tables that were walked into.
    entered: HashSet<String>,
}

/// Where errors of the entry being resolved point.
struct Scope<'s> {
    path: &'s str,
    id: &'s EntryId,
    ids: &'s HashMap<EntryId, ComponentId>,
}

impl Scope<'_> {
    fn lookup(&self, id: &str) -> Option<ComponentId> {
        EntryId::parse(id).and_then(|id| self.ids.get(&id)).copied()
    }

    fn error(&self, member: &str, err: ConvertError) -> PrefabError {
        let path = self.path.to_owned();
        let id = self.id.to_string();
        let member = member.to_owned();
        match err {
            ConvertError::UnresolvedId(target) => PrefabError::UnresolvedReference {
                path,
                id,
                member,
                target,
            },
            ConvertError::NoConverter { type_name } => PrefabError::NoConverterFound {
                path,
                id,
                member,
                type_name,
            },
            source => PrefabError::InvalidValue {
                path,
                id,
                member,
                source,
            },
        }
    }
}

impl<'a> Loader<'a> {
    pub fn new(ctx: PrefabContext<'a>) -> Self {
        Self { ctx }
    }

    /// Load the prefab at `path` (relative to the storage root).
    pub fn load(&self, world: &mut World, path: &str) -> Result<PrefabRoot, PrefabError> {
        self.load_with(world, path, &LoadOptions::default())
    }

    /// Load the prefab at `path` with explicit options.
    pub fn load_with(
        &self,
        world: &mut World,
        path: &str,
        options: &LoadOptions,
    ) -> Result<PrefabRoot, PrefabError> {
        let mut stack = Vec::new();
        self.load_nested(world, path, options, &mut stack)
    }

    fn load_nested(
        &self,
        world: &mut World,
        path: &str,
        options: &LoadOptions,
        stack: &mut Vec<String>,
    ) -> Result<PrefabRoot, PrefabError> {
        let path = prefab_path::normalize(path).map_err(|source| PrefabError::InvalidPath {
            path: path.to_owned(),
            source,
        })?;
        if stack.contains(&path) {
            return Err(PrefabError::CyclicPrefab { path });
        }

        stack.push(path.clone());
        let result = self.load_file(world, &path, options, stack);
        stack.pop();
        result
    }

    fn load_file(
        &self,
        world: &mut World,
        path: &str,
        options: &LoadOptions,
        stack: &mut Vec<String>,
    ) -> Result<PrefabRoot, PrefabError> {
        log::debug!("loading prefab {path}");
        let text = self
            .ctx
            .storage
            .read_to_string(path)
            .map_err(|source| PrefabError::Read {
                path: path.to_owned(),
                source,
            })?;
        let file = PrefabFile::parse(path, &text)?;

        let (mut prefab, components) = self.construct(world, path, &file, options, stack)?;

        let mut consumed: Vec<Consumed> = file.entries.iter().map(|_| Consumed::default()).collect();
        for pass in [Pass::References, Pass::Values] {
            log::debug!("{path}: {pass:?} pass");
            for ((entry, component), taken) in
                file.entries.iter().zip(&components).zip(consumed.iter_mut())
            {
                self.resolve_entry(world, &mut prefab, path, entry, *component, pass, taken)?;
            }
        }

        for (entry, taken) in file.entries.iter().zip(&consumed) {
            let mut keys = Vec::new();
            unconsumed_keys(&entry.values, "", taken, &mut keys);
            for key in keys {
                prefab.warn(LoadWarning::UnconsumedKey {
                    path: path.to_owned(),
                    id: entry.id.to_string(),
                    key,
                });
            }
        }

        for warning in &file.warnings {
            prefab.warn(warning.clone());
        }
        for favorite in &file.favorites {
            match self.resolve_favorite(world, &prefab, favorite) {
                Ok(member) => prefab.add_favorite(member),
                Err(reason) => prefab.warn(LoadWarning::UnresolvedFavorite {
                    path: path.to_owned(),
                    favorite: favorite.clone(),
                    reason,
                }),
            }
        }

        log::info!(
            "loaded prefab {path}: {} components, {} nested prefabs, {} warnings",
            prefab.components.len(),
            prefab.children.len(),
            prefab.warnings.len()
        );
        Ok(prefab)
    }

    /// Pass 1: give every entry a component. Also returns the component of
    /// each entry, in file order.
    fn construct(
        &self,
        world: &mut World,
        path: &str,
        file: &PrefabFile,
        options: &LoadOptions,
        stack: &mut Vec<String>,
    ) -> Result<(PrefabRoot, Vec<ComponentId>), PrefabError> {
        let mut per_entry = Vec::with_capacity(file.entries.len());
        let mut components = Vec::new();
        let mut children: Vec<PrefabRoot> = Vec::new();
        let mut ids = HashMap::new();
        let mut provenance = HashMap::new();

        for entry in &file.entries {
            let component = match &entry.source {
                EntrySource::Component(declared) => {
                    let type_name = match &options.root_type {
                        Some(root_type) if entry.id.is_root() => root_type.as_str(),
                        _ => declared.as_str(),
                    };
                    let instance =
                        self.ctx
                            .types
                            .construct(type_name)
                            .ok_or_else(|| PrefabError::UnknownType {
                                path: path.to_owned(),
                                id: entry.id.to_string(),
                                type_name: type_name.to_owned(),
                            })?;
                    let component = world.spawn(instance);
                    components.push(component);
                    provenance.insert(
                        component,
                        Provenance::Fresh {
                            type_name: declared.clone(),
                        },
                    );
                    component
                }
                EntrySource::Prefab(relative) => {
                    let nested_path = prefab_path::join(prefab_path::parent(path), relative)
                        .map_err(|source| PrefabError::InvalidPath {
                            path: path.to_owned(),
                            source,
                        })?;
                    let nested_options = LoadOptions {
                        root_type: options.root_type.clone().filter(|_| entry.id.is_root()),
                    };
                    let mut child = self
                        .load_nested(world, &nested_path, &nested_options, stack)
                        .map_err(|source| PrefabError::Nested {
                            path: path.to_owned(),
                            id: entry.id.to_string(),
                            source: Box::new(source),
                        })?;
                    child.rebase();
                    let component = child.root;
                    provenance.insert(
                        component,
                        Provenance::Nested {
                            child: children.len(),
                        },
                    );
                    children.push(child);
                    component
                }
            };
            ids.insert(entry.id.clone(), component);
            per_entry.push(component);
        }

        let root = ids
            .get(&EntryId::Root)
            .copied()
            .ok_or_else(|| PrefabError::MissingRootEntry {
                path: path.to_owned(),
            })?;
        let mut prefab = PrefabRoot::new(path.to_owned(), root);
        prefab.components = components;
        prefab.children = children;
        prefab.ids = ids;
        prefab.provenance = provenance;
        Ok((prefab, per_entry))
    }

    /// Passes 2 and 3 for one entry.
    #[allow(clippy::too_many_arguments)]
    fn resolve_entry(
        &self,
        world: &mut World,
        prefab: &mut PrefabRoot,
        path: &str,
        entry: &PrefabEntry,
        component: ComponentId,
        pass: Pass,
        consumed: &mut Consumed,
    ) -> Result<(), PrefabError> {
        let mut changes = Vec::new();
        {
            let scope = Scope {
                path,
                id: &entry.id,
                ids: &prefab.ids,
            };
            let target = world
                .get_mut(component)
                .ok_or(AccessError::MissingComponent(component))?
                .as_reflect_mut();
            self.resolve_table(
                target,
                &entry.values,
                Origin::Component(ComponentPath::new(component)),
                "",
                pass,
                &scope,
                consumed,
                &mut changes,
            )?;
        }
        for (member, value) in changes {
            prefab.register_change(member, value);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_table(
        &self,
        target: &mut dyn Reflect,
        table: &toml::Table,
        origin: Origin<'_>,
        prefix: &str,
        pass: Pass,
        scope: &Scope<'_>,
        consumed: &mut Consumed,
        changes: &mut Vec<(MemberPath, AppliedValue)>,
    ) -> Result<(), PrefabError> {
        let converters = self.ctx.converters;

        for (key, data) in table {
            // Unknown and read-only members stay unconsumed.
            let Ok(member) = MemberAccessor::find(target, key) else {
                continue;
            };
            if !member.is_writable() {
                continue;
            }
            let dotted = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            let member_path = origin.member(member);

            match (member.tag(), pass) {
                (MemberTag::Reference, Pass::References) => {
                    let converter = converters
                        .resolve_reference(member)
                        .map_err(|e| scope.error(&dotted, e))?;
                    let slot = member.get_mut(target)?;
                    let lookup = |id: &str| scope.lookup(id);
                    let targets = converter
                        .deserialize(slot, data, &lookup)
                        .and_then(|_| converter.collect(slot))
                        .map_err(|e| scope.error(&dotted, e))?;
                    changes.push((member_path, AppliedValue::References(targets)));
                    consumed.keys.insert(dotted);
                }
                (MemberTag::Reference, Pass::Values) => {}
                (MemberTag::Value, _) => {
                    let strategy = converters.resolve_value(member);
                    match (strategy, data) {
                        (Ok(ValueStrategy::Nested(object)), toml::Value::Table(inner)) => {
                            let slot = member.get_mut(target)?;
                            let nested = object.cast_mut(slot).ok_or_else(|| {
                                AccessError::NotAValueObject {
                                    owner: member.owner().to_owned(),
                                    member: member.name().to_owned(),
                                }
                            })?;
                            consumed.entered.insert(dotted.clone());
                            self.resolve_table(
                                nested,
                                inner,
                                Origin::Member(&member_path),
                                &dotted,
                                pass,
                                scope,
                                consumed,
                                changes,
                            )?;
                        }
                        // Leaf values wait for the value pass.
                        _ if pass == Pass::References => {}
                        (Ok(strategy), data) => {
                            let slot = member.get_mut(target)?;
                            strategy
                                .converter()
                                .deserialize(slot, data, converters)
                                .map_err(|e| scope.error(&dotted, e))?;
                            changes.push((member_path, AppliedValue::Value(data.clone())));
                            consumed.keys.insert(dotted);
                        }
                        (Err(e), _) => return Err(scope.error(&dotted, e)),
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolve `"<id>.<member>[.<member>...]"`.
    fn resolve_favorite(
        &self,
        world: &World,
        prefab: &PrefabRoot,
        favorite: &str,
    ) -> Result<MemberPath, String> {
        let mut parts = favorite.split('.');
        let id = parts.next().unwrap_or_default();
        let names: Vec<&str> = parts.collect();
        if names.is_empty() {
            return Err("no member named".to_owned());
        }
        let component = EntryId::parse(id)
            .and_then(|id| prefab.ids.get(&id))
            .copied()
            .ok_or_else(|| format!("unknown id '{id}'"))?;
        MemberPath::parse(world, self.ctx.converters, component, &names).map_err(|e| e.to_string())
    }
}

/// What the members of a table hang off.
#[derive(Clone, Copy)]
enum Origin<'p> {
    Component(ComponentPath),
    Member(&'p MemberPath),
}

impl Origin<'_> {
    fn member(&self, member: MemberAccessor) -> MemberPath {
        match self {
            Origin::Component(component) => component.member(member),
            Origin::Member(parent) => parent.member(member),
        }
    }
}

/// Collect dotted keys of `table` that no pass consumed.
fn unconsumed_keys(table: &toml::Table, prefix: &str, consumed: &Consumed, out: &mut Vec<String>) {
    for (key, value) in table {
        let dotted = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if consumed.keys.contains(&dotted) {
            continue;
        }
        match value {
            toml::Value::Table(inner) if consumed.entered.contains(&dotted) => {
                unconsumed_keys(inner, &dotted, consumed, out);
            }
            _ => out.push(dotted),
        }
    }
}

impl PrefabRoot {
    fn warn(&mut self, warning: LoadWarning) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }
}
