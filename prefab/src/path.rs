//! Structural addresses into a prefab graph.
//!
//! A [`ComponentPath`] names a component itself; a [`MemberPath`] names one
//! member reached from a component, possibly through nested value objects
//! (`transform.position.x`). Paths compare by value: the root component
//! handle plus the chain of [`MemberAccessor`]s. They never hold on to the
//! member values, so a path taken before a value was replaced still equals
//! the path taken afterwards.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::accessor::MemberAccessor;
use crate::component::Reflect;
use crate::convert::ConversionRegistry;
use crate::error::AccessError;
use crate::world::{ComponentId, World};

/// Path to a component itself.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ComponentPath {
    component: ComponentId,
}

impl ComponentPath {
    pub fn new(component: ComponentId) -> Self {
        Self { component }
    }

    pub fn component(&self) -> ComponentId {
        self.component
    }

    /// Path to a member of this component.
    pub fn member(self, accessor: MemberAccessor) -> MemberPath {
        MemberPath {
            accessor,
            parent: PathParent::Component(self),
        }
    }
}

/// What a [`MemberPath`] hangs off.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum PathParent {
    Component(ComponentPath),
    Member(Arc<MemberPath>),
}

/// Path to a member: an accessor applied to a parent path.
///
/// Equal iff the accessors are equal and the parents are (recursively) equal.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MemberPath {
    accessor: MemberAccessor,
    parent: PathParent,
}

impl MemberPath {
    /// Path to a nested member of the value object at this path.
    pub fn member(&self, accessor: MemberAccessor) -> MemberPath {
        MemberPath {
            accessor,
            parent: PathParent::Member(Arc::new(self.clone())),
        }
    }

    pub fn accessor(&self) -> MemberAccessor {
        self.accessor
    }

    pub fn parent(&self) -> &PathParent {
        &self.parent
    }

    /// The component this path starts from.
    pub fn root(&self) -> ComponentId {
        match &self.parent {
            PathParent::Component(c) => c.component(),
            PathParent::Member(m) => m.root(),
        }
    }

    /// Accessors from the root component down to this member.
    pub fn accessors(&self) -> Vec<MemberAccessor> {
        let mut chain = match &self.parent {
            PathParent::Component(_) => Vec::new(),
            PathParent::Member(m) => m.accessors(),
        };
        chain.push(self.accessor);
        chain
    }

    /// Member names from the root down, e.g. `["transform", "x"]`.
    pub fn names(&self) -> Vec<&'static str> {
        self.accessors().iter().map(|a| a.name()).collect()
    }

    /// Member names joined with dots, e.g. `"transform.x"`.
    pub fn dotted(&self) -> String {
        self.names().join(".")
    }

    /// Build a path by walking member names from `root`, crossing nested
    /// value objects registered in `converters`.
    pub fn parse(
        world: &World,
        converters: &ConversionRegistry,
        root: ComponentId,
        names: &[&str],
    ) -> Result<MemberPath, AccessError> {
        let component = world
            .get(root)
            .ok_or(AccessError::MissingComponent(root))?;
        let (first, rest) = names.split_first().ok_or_else(|| AccessError::MemberNotFound {
            owner: component.component_name().to_owned(),
            member: String::new(),
        })?;

        let mut target: &dyn Reflect = component.as_reflect();
        let mut accessor = MemberAccessor::find(target, first)?;
        let mut path = ComponentPath::new(root).member(accessor);
        for name in rest {
            let slot = accessor.get(target)?;
            target = nested(converters, accessor, slot)?;
            accessor = MemberAccessor::find(target, name)?;
            path = path.member(accessor);
        }
        Ok(path)
    }

    /// Borrow the slot this path points at.
    pub fn resolve<'w>(
        &self,
        world: &'w World,
        converters: &ConversionRegistry,
    ) -> Result<&'w dyn Any, AccessError> {
        let root = self.root();
        let mut target: &dyn Reflect = world
            .get(root)
            .ok_or(AccessError::MissingComponent(root))?
            .as_reflect();
        let chain = self.accessors();
        let (leaf, parents) = chain.split_last().ok_or(AccessError::MissingComponent(root))?;
        for accessor in parents {
            let slot = accessor.get(target)?;
            target = nested(converters, *accessor, slot)?;
        }
        leaf.get(target)
    }

    /// Mutably borrow the slot this path points at.
    pub fn resolve_mut<'w>(
        &self,
        world: &'w mut World,
        converters: &ConversionRegistry,
    ) -> Result<&'w mut dyn Any, AccessError> {
        let root = self.root();
        let mut target: &mut dyn Reflect = world
            .get_mut(root)
            .ok_or(AccessError::MissingComponent(root))?
            .as_reflect_mut();
        let chain = self.accessors();
        let (leaf, parents) = chain.split_last().ok_or(AccessError::MissingComponent(root))?;
        for accessor in parents {
            let slot = accessor.get_mut(target)?;
            target = nested_mut(converters, *accessor, slot)?;
        }
        leaf.get_mut(target)
    }
}

impl fmt::Debug for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.root(), self.dotted())
    }
}

fn nested<'a>(
    converters: &ConversionRegistry,
    accessor: MemberAccessor,
    slot: &'a dyn Any,
) -> Result<&'a dyn Reflect, AccessError> {
    converters
        .as_value_object(accessor.declared_type(), slot)
        .ok_or_else(|| AccessError::NotAValueObject {
            owner: accessor.owner().to_owned(),
            member: accessor.name().to_owned(),
        })
}

fn nested_mut<'a>(
    converters: &ConversionRegistry,
    accessor: MemberAccessor,
    slot: &'a mut dyn Any,
) -> Result<&'a mut dyn Reflect, AccessError> {
    converters
        .as_value_object_mut(accessor.declared_type(), slot)
        .ok_or_else(|| AccessError::NotAValueObject {
            owner: accessor.owner().to_owned(),
            member: accessor.name().to_owned(),
        })
}
