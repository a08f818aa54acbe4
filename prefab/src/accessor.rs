//! Uniform read/write handles over one tagged member.
//!
//! A [`MemberAccessor`] pairs a reflected type with one entry of that
//! type's member table. It is independent of any particular instance, so it
//! can be stored inside [`MemberPath`](crate::MemberPath)s and compared
//! structurally.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::component::{MemberInfo, MemberTag, Reflect};
use crate::error::AccessError;

/// Handle to one tagged member of a reflected type.
///
/// Two accessors are equal when they name the same member of the same type.
/// Types are compared by [`TypeId`], so equally named types from different
/// modules stay distinct.
#[derive(Clone, Copy)]
pub struct MemberAccessor {
    owner: &'static str,
    owner_type: TypeId,
    info: &'static MemberInfo,
}

impl MemberAccessor {
    /// Find a member by its file-level name on the runtime type of `target`.
    pub fn find(target: &dyn Reflect, name: &str) -> Result<Self, AccessError> {
        target
            .member_info(name)
            .map(|info| Self {
                owner: target.reflect_name(),
                owner_type: target.as_any().type_id(),
                info,
            })
            .ok_or_else(|| AccessError::MemberNotFound {
                owner: target.reflect_name().to_owned(),
                member: name.to_owned(),
            })
    }

    /// All tagged members of `target`, in declaration order.
    pub fn all(target: &dyn Reflect) -> impl Iterator<Item = MemberAccessor> + '_ {
        let owner = target.reflect_name();
        let owner_type = target.as_any().type_id();
        target.members().iter().map(move |info| MemberAccessor {
            owner,
            owner_type,
            info,
        })
    }

    /// The member name as it appears in prefab files.
    pub fn name(&self) -> &'static str {
        self.info.name
    }

    /// The reflected type name this member belongs to.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub fn owner_type(&self) -> TypeId {
        self.owner_type
    }

    pub fn info(&self) -> &'static MemberInfo {
        self.info
    }

    pub fn tag(&self) -> MemberTag {
        self.info.tag
    }

    pub fn declared_type(&self) -> TypeId {
        self.info.type_id
    }

    pub fn declared_type_name(&self) -> &'static str {
        self.info.type_name
    }

    pub fn is_readable(&self) -> bool {
        self.info.readable
    }

    pub fn is_writable(&self) -> bool {
        self.info.writable
    }

    /// Borrow the member slot on `target`.
    pub fn get<'a>(&self, target: &'a dyn Reflect) -> Result<&'a dyn Any, AccessError> {
        self.check_owner(target)?;
        target.member(self.info.name).ok_or_else(|| self.not_found())
    }

    /// Mutably borrow the member slot on `target`.
    ///
    /// This bypasses the writable flag; the loader and converters use it to
    /// fill slots in place. Use [`set`](Self::set) for checked writes.
    pub fn get_mut<'a>(&self, target: &'a mut dyn Reflect) -> Result<&'a mut dyn Any, AccessError> {
        self.check_owner(target)?;
        let err = self.not_found();
        target.member_mut(self.info.name).ok_or(err)
    }

    /// Read the member as a concrete type.
    pub fn read<'a, T: Any>(&self, target: &'a dyn Reflect) -> Result<&'a T, AccessError> {
        self.get(target)?
            .downcast_ref::<T>()
            .ok_or_else(|| self.mismatch::<T>())
    }

    /// Replace the member value. Fails for read-only members and for values
    /// of the wrong type.
    pub fn set<T: Any>(&self, target: &mut dyn Reflect, value: T) -> Result<(), AccessError> {
        if !self.info.writable {
            return Err(AccessError::ReadOnly {
                owner: self.owner.to_owned(),
                member: self.info.name.to_owned(),
            });
        }
        let mismatch = self.mismatch::<T>();
        let slot = self
            .get_mut(target)?
            .downcast_mut::<T>()
            .ok_or(mismatch)?;
        *slot = value;
        Ok(())
    }

    fn check_owner(&self, target: &dyn Reflect) -> Result<(), AccessError> {
        if target.as_any().type_id() == self.owner_type {
            Ok(())
        } else {
            Err(AccessError::MemberNotFound {
                owner: target.reflect_name().to_owned(),
                member: self.info.name.to_owned(),
            })
        }
    }

    fn not_found(&self) -> AccessError {
        AccessError::MemberNotFound {
            owner: self.owner.to_owned(),
            member: self.info.name.to_owned(),
        }
    }

    fn mismatch<T: Any>(&self) -> AccessError {
        AccessError::TypeMismatch {
            owner: self.owner.to_owned(),
            member: self.info.name.to_owned(),
            expected: std::any::type_name::<T>(),
        }
    }
}

impl PartialEq for MemberAccessor {
    fn eq(&self, other: &Self) -> bool {
        self.owner_type == other.owner_type && self.info.name == other.info.name
    }
}

impl Eq for MemberAccessor {}

impl Hash for MemberAccessor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owner_type.hash(state);
        self.info.name.hash(state);
    }
}

impl fmt::Debug for MemberAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.info.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ComponentId;

    #[derive(Default, crate::Component)]
    struct Turret {
        #[value]
        range: f32,
        #[value(read_only)]
        ammo: u32,
        #[reference]
        target: Option<ComponentId>,
    }

    #[derive(Default, crate::Component)]
    struct Radar {
        #[value]
        range: f32,
    }

    #[test]
    fn find_reports_metadata() {
        let turret = Turret::default();
        let range = MemberAccessor::find(&turret, "range").unwrap();
        assert_eq!(range.name(), "range");
        assert_eq!(range.owner(), "Turret");
        assert_eq!(range.tag(), MemberTag::Value);
        assert_eq!(range.declared_type(), TypeId::of::<f32>());
        assert!(range.is_readable());
        assert!(range.is_writable());

        let target = MemberAccessor::find(&turret, "target").unwrap();
        assert_eq!(target.tag(), MemberTag::Reference);
    }

    #[test]
    fn find_unknown_member() {
        let turret = Turret::default();
        let err = MemberAccessor::find(&turret, "color").unwrap_err();
        assert_eq!(
            err,
            AccessError::MemberNotFound {
                owner: "Turret".into(),
                member: "color".into(),
            }
        );
    }

    #[test]
    fn get_and_set() {
        let mut turret = Turret::default();
        let range = MemberAccessor::find(&turret, "range").unwrap();
        range.set(&mut turret, 12.5f32).unwrap();
        assert_eq!(turret.range, 12.5);
        assert_eq!(*range.read::<f32>(&turret).unwrap(), 12.5);
    }

    #[test]
    fn set_rejects_wrong_type() {
        let mut turret = Turret::default();
        let range = MemberAccessor::find(&turret, "range").unwrap();
        let err = range.set(&mut turret, 3u32).unwrap_err();
        assert!(matches!(err, AccessError::TypeMismatch { .. }));
    }

    #[test]
    fn set_rejects_read_only() {
        let mut turret = Turret::default();
        let ammo = MemberAccessor::find(&turret, "ammo").unwrap();
        let err = ammo.set(&mut turret, 5u32).unwrap_err();
        assert!(matches!(err, AccessError::ReadOnly { .. }));
        assert_eq!(turret.ammo, 0);
    }

    #[test]
    fn accessor_is_bound_to_owner_type() {
        let turret = Turret::default();
        let radar = Radar::default();
        let range = MemberAccessor::find(&turret, "range").unwrap();
        assert!(range.get(&radar).is_err());
        assert_ne!(range, MemberAccessor::find(&radar, "range").unwrap());
    }

    #[test]
    fn equality_is_structural() {
        let a = Turret::default();
        let b = Turret {
            range: 4.0,
            ..Default::default()
        };
        assert_eq!(
            MemberAccessor::find(&a, "range").unwrap(),
            MemberAccessor::find(&b, "range").unwrap()
        );
        let names: Vec<_> = MemberAccessor::all(&a).map(|m| m.name()).collect();
        assert_eq!(names, ["range", "ammo", "target"]);
    }

    mod armory {
        #[derive(Default, crate::Component)]
        pub struct Turret {
            #[value]
            range: f32,
        }
    }

    #[test]
    fn same_type_name_in_other_module_is_distinct() {
        let ours = Turret::default();
        let theirs = armory::Turret::default();
        let a = MemberAccessor::find(&ours, "range").unwrap();
        let b = MemberAccessor::find(&theirs, "range").unwrap();

        assert_eq!(a.owner(), b.owner());
        assert_ne!(a, b);
        assert!(a.get(&theirs).is_err());
        assert!(b.get(&theirs).is_ok());
    }
}
