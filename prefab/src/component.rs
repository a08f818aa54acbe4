//! Runtime reflection for prefab components.
//!
//! The [`Reflect`] trait exposes a type's tagged members so the loader and
//! writer can read and write them without knowing the concrete type.
//! [`Component`] marks a reflected type that can live in a
//! [`World`](crate::World) as a graph node.
//!
//! Use `#[derive(Component)]` for graph nodes, `#[derive(Reflect)]` for
//! nested value objects and `#[derive(EnumMember)]` for unit enums.
//!
//! # Tagging members
//!
//! ```ignore
//! #[derive(Default, Component)]
//! struct Door {
//!     #[value]
//!     locked: bool,
//!     #[value(rename = "OpenSpeed")]
//!     open_speed: f32,
//!     #[reference]
//!     key: Option<ComponentId>,
//!     // untagged: invisible to the prefab engine
//!     cached_angle: f32,
//! }
//! ```

use std::any::{Any, TypeId};

/// Which persistence family a member belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberTag {
    /// Inline data: numbers, strings, enums, colors, nested value objects.
    Value,
    /// A pointer (or collection of pointers) to another component in the graph.
    Reference,
}

/// Static metadata for one tagged member.
///
/// Generated by the derive macros; one table per reflected type.
#[derive(Debug, Clone)]
pub struct MemberInfo {
    /// Member name as it appears in prefab files.
    pub name: &'static str,
    /// Declared Rust type (from [`std::any::type_name`]).
    pub type_name: &'static str,
    /// Declared Rust type id, used to look up converters.
    pub type_id: TypeId,
    /// Persistence family.
    pub tag: MemberTag,
    pub readable: bool,
    pub writable: bool,
}

/// Generic access to the tagged members of a type.
///
/// Implemented by the derive macros. Manual implementations must keep
/// [`members`](Self::members), [`member`](Self::member) and
/// [`member_mut`](Self::member_mut) consistent: every name listed in the
/// member table must resolve to a slot of the declared type.
pub trait Reflect: Any {
    /// The reflected type name (e.g. `"Door"`).
    fn reflect_name(&self) -> &'static str;

    /// All tagged members, in declaration order.
    fn members(&self) -> &'static [MemberInfo];

    /// Borrow a member slot by file-level name.
    fn member(&self, name: &str) -> Option<&dyn Any>;

    /// Mutably borrow a member slot by file-level name.
    fn member_mut(&mut self, name: &str) -> Option<&mut dyn Any>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Look up the metadata of a member by name.
    fn member_info(&self, name: &str) -> Option<&'static MemberInfo> {
        self.members().iter().find(|m| m.name == name)
    }
}

/// A graph node: a reflected type that can be constructed by name and
/// stored in a [`World`](crate::World).
pub trait Component: Reflect {
    /// The registered type name. Defaults to [`Reflect::reflect_name`].
    fn component_name(&self) -> &'static str {
        self.reflect_name()
    }

    fn as_reflect(&self) -> &dyn Reflect;

    fn as_reflect_mut(&mut self) -> &mut dyn Reflect;
}

/// Unit enums persisted by variant name.
pub trait EnumMember: Any + Sized {
    /// All variant names, in declaration order.
    fn variant_names() -> &'static [&'static str];

    fn variant_name(&self) -> &'static str;

    fn from_variant_name(name: &str) -> Option<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ComponentId;

    #[derive(Default, crate::Component)]
    struct Door {
        #[value]
        locked: bool,
        #[value(rename = "OpenSpeed")]
        open_speed: f32,
        #[reference]
        key: Option<ComponentId>,
        #[value(read_only)]
        serial: u32,
        cached_angle: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Default, crate::EnumMember)]
    enum Hinge {
        #[default]
        Left,
        Right,
    }

    #[test]
    fn member_table_skips_untagged_fields() {
        let door = Door::default();
        let names: Vec<_> = door.members().iter().map(|m| m.name).collect();
        assert_eq!(names, ["locked", "OpenSpeed", "key", "serial"]);
        assert!(door.member("cached_angle").is_none());
        assert_eq!(door.cached_angle, 0.0);
    }

    #[test]
    fn member_metadata() {
        let door = Door::default();
        let key = door.member_info("key").unwrap();
        assert_eq!(key.tag, MemberTag::Reference);
        assert_eq!(key.type_id, TypeId::of::<Option<ComponentId>>());

        let speed = door.member_info("OpenSpeed").unwrap();
        assert_eq!(speed.tag, MemberTag::Value);
        assert_eq!(speed.type_name, std::any::type_name::<f32>());

        let serial = door.member_info("serial").unwrap();
        assert!(serial.readable);
        assert!(!serial.writable);
    }

    #[test]
    fn member_slots_read_and_write() {
        let mut door = Door::default();
        *door
            .member_mut("OpenSpeed")
            .unwrap()
            .downcast_mut::<f32>()
            .unwrap() = 2.5;
        assert_eq!(door.open_speed, 2.5);
        assert_eq!(
            door.member("locked").unwrap().downcast_ref::<bool>(),
            Some(&false)
        );
        assert_eq!(door.serial, 0);
    }

    #[test]
    fn component_name_defaults_to_struct_name() {
        let door = Door::default();
        assert_eq!(door.component_name(), "Door");
        assert_eq!(door.as_reflect().reflect_name(), "Door");
    }

    #[test]
    fn enum_member_names() {
        assert_eq!(Hinge::variant_names(), ["Left", "Right"]);
        assert_eq!(Hinge::Right.variant_name(), "Right");
        assert_eq!(Hinge::from_variant_name("Left"), Some(Hinge::Left));
        assert_eq!(Hinge::from_variant_name("Up"), None);
        assert_eq!(Hinge::default(), Hinge::Left);
    }
}
