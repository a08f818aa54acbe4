//! Live bookkeeping for one instantiated prefab file.

use std::any::Any;
use std::collections::HashMap;

use crate::accessor::MemberAccessor;
use crate::change_set::{AppliedValue, ChangeSet};
use crate::component::MemberTag;
use crate::convert::{ConversionRegistry, ReferenceConverter};
use crate::error::{AccessError, ConvertError, LoadWarning, PrefabError};
use crate::file::EntryId;
use crate::path::{ComponentPath, MemberPath};
use crate::registry::PrefabContext;
use crate::world::{ComponentId, World};
use crate::writer::Writer;

/// How a component of a prefab came into existence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// A default instance of a registered type, owned by this prefab.
    Fresh { type_name: String },
    /// The root of `children()[child]`.
    Nested { child: usize },
}

/// One instantiation of a prefab file.
///
/// Owns its fresh components and its nested child instances; each child
/// owns its own components in turn. Every member assignment made while
/// loading, or later through [`apply`](Self::apply) /
/// [`add_component`](Self::add_component), is recorded in a change set so
/// the [`Writer`] can emit it again.
///
/// For a nested child, the assignments made by the child's own file are
/// kept in its [`baseline`](Self::baseline); its
/// [`change_set`](Self::change_set) only holds overrides applied on top.
#[derive(Debug)]
pub struct PrefabRoot {
    pub(crate) source: String,
    pub(crate) root: ComponentId,
    pub(crate) components: Vec<ComponentId>,
    pub(crate) children: Vec<PrefabRoot>,
    pub(crate) ids: HashMap<EntryId, ComponentId>,
    pub(crate) provenance: HashMap<ComponentId, Provenance>,
    pub(crate) change_set: ChangeSet,
    pub(crate) baseline: ChangeSet,
    pub(crate) favorites: Vec<MemberPath>,
    pub(crate) warnings: Vec<LoadWarning>,
}

impl PrefabRoot {
    pub(crate) fn new(source: String, root: ComponentId) -> Self {
        Self {
            source,
            root,
            components: Vec::new(),
            children: Vec::new(),
            ids: HashMap::new(),
            provenance: HashMap::new(),
            change_set: ChangeSet::new(),
            baseline: ChangeSet::new(),
            favorites: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// The normalized path of the file this instance was loaded from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The component of the `"This"` entry.
    pub fn root(&self) -> ComponentId {
        self.root
    }

    /// Components owned directly by this instance, in creation order.
    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    /// Nested prefab instances, in file order.
    pub fn children(&self) -> &[PrefabRoot] {
        &self.children
    }

    /// Entry ids of this file (and of added components) and their components.
    pub fn ids(&self) -> &HashMap<EntryId, ComponentId> {
        &self.ids
    }

    /// The entry id a component is known by in this file.
    pub fn entry_id(&self, component: ComponentId) -> Option<&EntryId> {
        self.ids
            .iter()
            .find(|(_, c)| **c == component)
            .map(|(id, _)| id)
    }

    pub fn provenance(&self, component: ComponentId) -> Option<&Provenance> {
        self.provenance.get(&component)
    }

    /// Assignments recorded on this instance.
    pub fn change_set(&self) -> &ChangeSet {
        &self.change_set
    }

    /// Assignments made by this instance's own file, when it is nested in
    /// another prefab. Empty for a top-level instance.
    pub fn baseline(&self) -> &ChangeSet {
        &self.baseline
    }

    pub fn favorites(&self) -> &[MemberPath] {
        &self.favorites
    }

    /// Bookmark a member for tooling. Duplicates are ignored.
    pub fn add_favorite(&mut self, path: MemberPath) {
        if !self.favorites.contains(&path) {
            self.favorites.push(path);
        }
    }

    /// Non-fatal problems found while loading this file.
    pub fn warnings(&self) -> &[LoadWarning] {
        &self.warnings
    }

    /// Whether `component` belongs to this instance or any nested one.
    pub fn contains(&self, component: ComponentId) -> bool {
        self.components.contains(&component) || self.children.iter().any(|c| c.contains(component))
    }

    /// Record an assignment.
    ///
    /// The entry goes to the instance that owns the path's root component:
    /// owned components stay here, the root of a nested instance goes to
    /// that child's change set, deeper components are routed further down.
    pub fn register_change(&mut self, path: MemberPath, value: AppliedValue) {
        match self.owning_change_set(path.root()) {
            Some(changes) => changes.push(path, value),
            None => {
                log::warn!(
                    "{}: recording change to {path:?}, which is not part of this prefab",
                    self.source
                );
                self.change_set.push(path, value);
            }
        }
    }

    /// The change set that records assignments to members of `target`.
    fn owning_change_set(&mut self, target: ComponentId) -> Option<&mut ChangeSet> {
        if self.components.contains(&target) {
            return Some(&mut self.change_set);
        }
        if let Some(i) = self.children.iter().position(|c| c.root == target) {
            return Some(&mut self.children[i].change_set);
        }
        let i = self.children.iter().position(|c| c.contains(target))?;
        self.children[i].owning_change_set(target)
    }

    /// Move this instance's own assignments to its baseline. Called when it
    /// is nested under a parent.
    pub(crate) fn rebase(&mut self) {
        let mut own = std::mem::take(&mut self.change_set);
        self.baseline.append(&mut own);
    }

    /// Assign `data` (file form) to the member at `path` and record it.
    ///
    /// Reference members take entry ids of this instance (`"This"`, `"3"`,
    /// or a generated id).
    pub fn apply(
        &mut self,
        world: &mut World,
        converters: &ConversionRegistry,
        path: &MemberPath,
        data: toml::Value,
    ) -> Result<(), PrefabError> {
        let member = path.accessor();
        if !member.is_writable() {
            return Err(AccessError::ReadOnly {
                owner: member.owner().to_owned(),
                member: member.name().to_owned(),
            }
            .into());
        }

        let applied = match member.tag() {
            MemberTag::Value => {
                let slot = path.resolve_mut(world, converters)?;
                converters
                    .deserialize_value(member, slot, &data)
                    .map_err(|e| self.convert_error(path, e))?;
                AppliedValue::Value(data)
            }
            MemberTag::Reference => {
                let converter = converters
                    .resolve_reference(member)
                    .map_err(|e| self.convert_error(path, e))?;
                let ids = &self.ids;
                let id_from = |id: &str| {
                    ids.iter()
                        .find(|(entry, _)| entry.to_string() == id)
                        .map(|(_, c)| *c)
                };
                let slot = path.resolve_mut(world, converters)?;
                converter
                    .deserialize(slot, &data, &id_from)
                    .and_then(|_| converter.collect(slot))
                    .map(AppliedValue::References)
                    .map_err(|e| self.convert_error(path, e))?
            }
        };

        self.register_change(path.clone(), applied);
        Ok(())
    }

    /// Add a default `type_name` component, attach it to `owner` and write
    /// this prefab back to its source file.
    ///
    /// The owner member is the reference member named after the type in
    /// snake case (`HealthBar` → `health_bar`), or its plural
    /// (`health_bars`) for collections.
    ///
    /// Nothing changes unless the write succeeds: on error the world, the
    /// owner member and this prefab's bookkeeping are restored.
    pub fn add_component(
        &mut self,
        world: &mut World,
        ctx: PrefabContext<'_>,
        type_name: &str,
        owner: ComponentId,
    ) -> Result<ComponentId, PrefabError> {
        let owner_id = self
            .entry_id(owner)
            .cloned()
            .ok_or(PrefabError::OwnerNotFound { owner })?;

        let member = owner_member(world, owner, type_name)?;
        let converter = ctx
            .converters
            .resolve_reference(member)
            .map_err(|e| self.member_error(&owner_id, member.name(), e))?;

        let id = EntryId::generate();
        let instance = ctx
            .types
            .construct(type_name)
            .ok_or_else(|| PrefabError::UnknownType {
                path: self.source.clone(),
                id: id.to_string(),
                type_name: type_name.to_owned(),
            })?;

        let prior = {
            let component = world
                .get(owner)
                .ok_or(AccessError::MissingComponent(owner))?
                .as_reflect();
            let handle = |c: ComponentId| Some(c.index().to_string());
            converter
                .serialize(member.get(component)?, &handle)
                .map_err(|e| self.member_error(&owner_id, member.name(), e))?
        };
        let component = world.spawn(instance);

        let attached = match owner_slot_mut(world, owner, member) {
            Ok(slot) => converter
                .attach(slot, component)
                .and_then(|_| converter.collect(slot))
                .map_err(|e| self.member_error(&owner_id, member.name(), e)),
            Err(err) => Err(err.into()),
        };
        let targets = match attached {
            Ok(targets) => targets,
            Err(err) => {
                restore_slot(world, converter, owner, member, &prior);
                world.despawn_last(component);
                return Err(err);
            }
        };

        self.components.push(component);
        self.ids.insert(id.clone(), component);
        self.provenance.insert(
            component,
            Provenance::Fresh {
                type_name: type_name.to_owned(),
            },
        );
        self.register_change(
            ComponentPath::new(owner).member(member),
            AppliedValue::References(targets),
        );

        let source = self.source.clone();
        if let Err(err) = Writer::new(ctx).write(world, self, &source) {
            log::warn!("{source}: rolling back {type_name} added as {id}: {err}");
            restore_slot(world, converter, owner, member, &prior);
            world.despawn_last(component);
            self.components.retain(|c| *c != component);
            self.ids.remove(&id);
            self.provenance.remove(&component);
            if let Some(changes) = self.owning_change_set(owner) {
                changes.pop();
            }
            return Err(err);
        }

        log::debug!(
            "{source}: added {type_name} as {id}, attached to {owner_id}.{}",
            member.name()
        );
        Ok(component)
    }

    fn convert_error(&self, path: &MemberPath, err: ConvertError) -> PrefabError {
        let id = self
            .entry_id(path.root())
            .map(ToString::to_string)
            .unwrap_or_else(|| path.root().to_string());
        self.member_error_str(id, &path.dotted(), err)
    }

    fn member_error(&self, id: &EntryId, member: &str, err: ConvertError) -> PrefabError {
        self.member_error_str(id.to_string(), member, err)
    }

    fn member_error_str(&self, id: String, member: &str, err: ConvertError) -> PrefabError {
        match err {
            ConvertError::UnresolvedId(target) => PrefabError::UnresolvedReference {
                path: self.source.clone(),
                id,
                member: member.to_owned(),
                target,
            },
            ConvertError::NoConverter { type_name } => PrefabError::NoConverterFound {
                path: self.source.clone(),
                id,
                member: member.to_owned(),
                type_name,
            },
            source => PrefabError::InvalidValue {
                path: self.source.clone(),
                id,
                member: member.to_owned(),
                source,
            },
        }
    }
}

fn owner_slot_mut(
    world: &mut World,
    owner: ComponentId,
    member: MemberAccessor,
) -> Result<&mut dyn Any, AccessError> {
    let component = world
        .get_mut(owner)
        .ok_or(AccessError::MissingComponent(owner))?
        .as_reflect_mut();
    member.get_mut(component)
}

/// Put a reference slot back to a snapshot serialized with arena indices
/// standing in for entry ids.
fn restore_slot(
    world: &mut World,
    converter: &dyn ReferenceConverter,
    owner: ComponentId,
    member: MemberAccessor,
    prior: &toml::Value,
) {
    let from_index = |s: &str| s.parse().ok().map(ComponentId::from_index);
    let restored = match owner_slot_mut(world, owner, member) {
        Ok(slot) => converter
            .deserialize(slot, prior, &from_index)
            .map_err(|e| e.to_string()),
        Err(err) => Err(err.to_string()),
    };
    if let Err(err) = restored {
        log::error!("failed to restore {member:?} of {owner}: {err}");
    }
}

/// The reference member of `owner` that receives a new `type_name`.
fn owner_member(
    world: &World,
    owner: ComponentId,
    type_name: &str,
) -> Result<MemberAccessor, AccessError> {
    let component = world
        .get(owner)
        .ok_or(AccessError::MissingComponent(owner))?
        .as_reflect();
    let single = snake_case(type_name);
    let plural = format!("{single}s");

    let member = MemberAccessor::find(component, &single)
        .or_else(|_| MemberAccessor::find(component, &plural))
        .map_err(|_| AccessError::MemberNotFound {
            owner: component.reflect_name().to_owned(),
            member: single.clone(),
        })?;
    if member.tag() != MemberTag::Reference {
        return Err(AccessError::NotAReference {
            owner: member.owner().to_owned(),
            member: member.name().to_owned(),
        });
    }
    Ok(member)
}

/// `HealthBar` → `health_bar`. Namespaces (`ui::HealthBar`) are dropped.
fn snake_case(type_name: &str) -> String {
    let short = type_name.rsplit("::").next().unwrap_or(type_name);
    let mut out = String::with_capacity(short.len() + 4);
    let mut prev_lower = false;
    for c in short.chars() {
        if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, crate::Component)]
    struct Panel {
        #[value]
        title: String,
        #[reference]
        health_bar: Option<ComponentId>,
        #[reference]
        buttons: Vec<ComponentId>,
        #[value]
        tooltip: String,
    }

    #[test]
    fn snake_case_names() {
        assert_eq!(snake_case("HealthBar"), "health_bar");
        assert_eq!(snake_case("Button"), "button");
        assert_eq!(snake_case("ui::HealthBar"), "health_bar");
        assert_eq!(snake_case("Vec3Field"), "vec3_field");
    }

    #[test]
    fn owner_member_single_plural_and_kind() {
        let mut world = World::new();
        let panel = world.spawn(Box::new(Panel::default()));

        assert_eq!(owner_member(&world, panel, "HealthBar").unwrap().name(), "health_bar");
        assert_eq!(owner_member(&world, panel, "Button").unwrap().name(), "buttons");
        assert!(matches!(
            owner_member(&world, panel, "Tooltip"),
            Err(AccessError::NotAReference { .. })
        ));
        assert!(matches!(
            owner_member(&world, panel, "Slider"),
            Err(AccessError::MemberNotFound { member, .. }) if member == "slider"
        ));
    }

    #[test]
    fn register_change_routes_to_owner() {
        let mut world = World::new();
        let parent_root = world.spawn(Box::new(Panel::default()));
        let child_root = world.spawn(Box::new(Panel::default()));
        let grandchild_root = world.spawn(Box::new(Panel::default()));

        let mut grandchild = PrefabRoot::new("c.toml".into(), grandchild_root);
        grandchild.components.push(grandchild_root);
        let mut child = PrefabRoot::new("b.toml".into(), child_root);
        child.components.push(child_root);
        child.children.push(grandchild);
        let mut parent = PrefabRoot::new("a.toml".into(), parent_root);
        parent.components.push(parent_root);
        parent.children.push(child);

        let title = MemberAccessor::find(world.get(parent_root).unwrap().as_reflect(), "title").unwrap();
        let value = || AppliedValue::Value(toml::Value::String("x".into()));

        parent.register_change(ComponentPath::new(parent_root).member(title), value());
        parent.register_change(ComponentPath::new(child_root).member(title), value());
        parent.register_change(ComponentPath::new(grandchild_root).member(title), value());

        assert_eq!(parent.change_set().len(), 1);
        assert_eq!(parent.children()[0].change_set().len(), 1);
        assert_eq!(parent.children()[0].children()[0].change_set().len(), 1);
        assert!(parent.contains(grandchild_root));
    }

    #[test]
    fn rebase_moves_own_changes_to_baseline() {
        let mut world = World::new();
        let root = world.spawn(Box::new(Panel::default()));
        let mut prefab = PrefabRoot::new("a.toml".into(), root);
        prefab.components.push(root);
        let title = MemberAccessor::find(world.get(root).unwrap().as_reflect(), "title").unwrap();
        prefab.register_change(
            ComponentPath::new(root).member(title),
            AppliedValue::Value(toml::Value::String("x".into())),
        );

        prefab.rebase();
        assert!(prefab.change_set().is_empty());
        assert_eq!(prefab.baseline().len(), 1);
    }
}
