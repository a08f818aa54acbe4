//! Conversion registry: per-type strategies between live member values and
//! their TOML form.
//!
//! Two families exist. [`ValueConverter`]s handle inline data and
//! [`ReferenceConverter`]s handle pointers to other components. Reference
//! converters never see the graph; the loader and writer hand them an id
//! lookup closure instead.
//!
//! Value converters are resolved for a member in this order:
//!
//! 1. a per-member override registered with
//!    [`ConversionRegistry::override_value`],
//! 2. a built-in leaf converter (numbers, strings, booleans, [`Color`](crate::Color)),
//! 3. an enum converter registered with [`ConversionRegistry::register_enum`],
//! 4. a nested value object registered with
//!    [`ConversionRegistry::register_value_object`],
//! 5. otherwise [`ConvertError::NoConverter`].

mod reference;
mod value;

use std::any::{Any, TypeId};
use std::collections::HashMap;

pub use reference::{OptionReferenceConverter, VecReferenceConverter};
pub use value::{ColorConverter, EnumConverter, F32Converter, SerdeConverter, ValueObjectEntry};

use crate::accessor::MemberAccessor;
use crate::color::Color;
use crate::component::{EnumMember, Reflect};
use crate::error::ConvertError;
use crate::world::ComponentId;

/// Converts one inline value between its live form and TOML.
///
/// Converters work on type-erased slots. `deserialize` receives the slot
/// holding the prior value and overwrites it in place.
pub trait ValueConverter: Send + Sync {
    fn serialize(
        &self,
        value: &dyn Any,
        converters: &ConversionRegistry,
    ) -> Result<toml::Value, ConvertError>;

    fn deserialize(
        &self,
        slot: &mut dyn Any,
        data: &toml::Value,
        converters: &ConversionRegistry,
    ) -> Result<(), ConvertError>;
}

/// Converts a reference slot between component handles and entry ids.
pub trait ReferenceConverter: Send + Sync {
    /// `id_of` maps a component to its entry id in the file being written.
    fn serialize(
        &self,
        value: &dyn Any,
        id_of: &dyn Fn(ComponentId) -> Option<String>,
    ) -> Result<toml::Value, ConvertError>;

    /// `id_from` maps an entry id of the file being loaded to its component.
    fn deserialize(
        &self,
        slot: &mut dyn Any,
        data: &toml::Value,
        id_from: &dyn Fn(&str) -> Option<ComponentId>,
    ) -> Result<(), ConvertError>;

    /// The components the slot currently points at.
    fn collect(&self, value: &dyn Any) -> Result<Vec<ComponentId>, ConvertError>;

    /// Point the slot at `id`: assign for single references, append for
    /// collections.
    fn attach(&self, slot: &mut dyn Any, id: ComponentId) -> Result<(), ConvertError>;
}

/// How a value member is converted.
pub enum ValueStrategy<'a> {
    /// A leaf converter (built-in, enum or override).
    Convert(&'a dyn ValueConverter),
    /// A nested value object whose members are walked one by one.
    Nested(&'a ValueObjectEntry),
}

impl<'a> ValueStrategy<'a> {
    /// The strategy as a whole-value converter.
    pub fn converter(&self) -> &'a dyn ValueConverter {
        match *self {
            ValueStrategy::Convert(c) => c,
            ValueStrategy::Nested(entry) => entry,
        }
    }
}

/// Owner type → member name → converter.
type Overrides<C> = HashMap<TypeId, HashMap<String, Box<C>>>;

/// Registry of value and reference converters.
///
/// Construct one at startup and pass it to the loader and writer through a
/// [`PrefabContext`](crate::PrefabContext).
pub struct ConversionRegistry {
    builtins: HashMap<TypeId, Box<dyn ValueConverter>>,
    enums: HashMap<TypeId, Box<dyn ValueConverter>>,
    objects: HashMap<TypeId, ValueObjectEntry>,
    references: HashMap<TypeId, Box<dyn ReferenceConverter>>,
    value_overrides: Overrides<dyn ValueConverter>,
    reference_overrides: Overrides<dyn ReferenceConverter>,
}

impl Default for ConversionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionRegistry {
    /// Registry with the built-in leaf and reference converters.
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register_builtin::<bool>(SerdeConverter::<bool>::new());
        registry.register_builtin::<i8>(SerdeConverter::<i8>::new());
        registry.register_builtin::<i16>(SerdeConverter::<i16>::new());
        registry.register_builtin::<i32>(SerdeConverter::<i32>::new());
        registry.register_builtin::<i64>(SerdeConverter::<i64>::new());
        registry.register_builtin::<u8>(SerdeConverter::<u8>::new());
        registry.register_builtin::<u16>(SerdeConverter::<u16>::new());
        registry.register_builtin::<u32>(SerdeConverter::<u32>::new());
        registry.register_builtin::<u64>(SerdeConverter::<u64>::new());
        registry.register_builtin::<usize>(SerdeConverter::<usize>::new());
        registry.register_builtin::<f32>(F32Converter);
        registry.register_builtin::<f64>(SerdeConverter::<f64>::new());
        registry.register_builtin::<String>(SerdeConverter::<String>::new());
        registry.register_builtin::<Color>(ColorConverter);

        registry.register_reference::<Option<ComponentId>>(OptionReferenceConverter);
        registry.register_reference::<Vec<ComponentId>>(VecReferenceConverter);

        registry
    }

    /// Registry with no converters at all.
    pub fn empty() -> Self {
        Self {
            builtins: HashMap::new(),
            enums: HashMap::new(),
            objects: HashMap::new(),
            references: HashMap::new(),
            value_overrides: HashMap::new(),
            reference_overrides: HashMap::new(),
        }
    }

    /// Register (or replace) the leaf converter for `T`.
    pub fn register_builtin<T: Any>(&mut self, converter: impl ValueConverter + 'static) {
        self.builtins.insert(TypeId::of::<T>(), Box::new(converter));
    }

    /// Persist `T` by variant name.
    pub fn register_enum<T: EnumMember>(&mut self) {
        self.enums
            .insert(TypeId::of::<T>(), Box::new(EnumConverter::<T>::new()));
    }

    /// Walk members of type `T` recursively as a nested value object.
    pub fn register_value_object<T: Reflect + Default>(&mut self) {
        self.objects
            .insert(TypeId::of::<T>(), ValueObjectEntry::of::<T>());
    }

    /// Register (or replace) the reference converter for slots of type `T`.
    pub fn register_reference<T: Any>(&mut self, converter: impl ReferenceConverter + 'static) {
        self.references
            .insert(TypeId::of::<T>(), Box::new(converter));
    }

    /// Use `converter` for member `member` of `Owner`, whatever its
    /// declared type.
    pub fn override_value<Owner: Reflect>(
        &mut self,
        member: &str,
        converter: impl ValueConverter + 'static,
    ) {
        self.value_overrides
            .entry(TypeId::of::<Owner>())
            .or_default()
            .insert(member.to_owned(), Box::new(converter));
    }

    /// Use `converter` for reference member `member` of `Owner`.
    pub fn override_reference<Owner: Reflect>(
        &mut self,
        member: &str,
        converter: impl ReferenceConverter + 'static,
    ) {
        self.reference_overrides
            .entry(TypeId::of::<Owner>())
            .or_default()
            .insert(member.to_owned(), Box::new(converter));
    }

    /// Resolve the value strategy for a member.
    pub fn resolve_value(&self, member: MemberAccessor) -> Result<ValueStrategy<'_>, ConvertError> {
        if let Some(converter) = self
            .value_overrides
            .get(&member.owner_type())
            .and_then(|members| members.get(member.name()))
        {
            return Ok(ValueStrategy::Convert(converter.as_ref()));
        }
        self.resolve_type(member.declared_type(), member.declared_type_name())
    }

    /// Resolve the value strategy for a declared type, ignoring overrides.
    pub fn resolve_type(
        &self,
        type_id: TypeId,
        type_name: &str,
    ) -> Result<ValueStrategy<'_>, ConvertError> {
        if let Some(converter) = self.builtins.get(&type_id) {
            return Ok(ValueStrategy::Convert(converter.as_ref()));
        }
        if let Some(converter) = self.enums.get(&type_id) {
            return Ok(ValueStrategy::Convert(converter.as_ref()));
        }
        if let Some(entry) = self.objects.get(&type_id) {
            return Ok(ValueStrategy::Nested(entry));
        }
        Err(ConvertError::NoConverter {
            type_name: type_name.to_owned(),
        })
    }

    /// Resolve the reference converter for a member.
    pub fn resolve_reference(
        &self,
        member: MemberAccessor,
    ) -> Result<&dyn ReferenceConverter, ConvertError> {
        if let Some(converter) = self
            .reference_overrides
            .get(&member.owner_type())
            .and_then(|members| members.get(member.name()))
        {
            return Ok(converter.as_ref());
        }
        self.references
            .get(&member.declared_type())
            .map(|c| c.as_ref())
            .ok_or_else(|| ConvertError::NoConverter {
                type_name: member.declared_type_name().to_owned(),
            })
    }

    /// Serialize a value member's current value.
    pub fn serialize_value(
        &self,
        member: MemberAccessor,
        value: &dyn Any,
    ) -> Result<toml::Value, ConvertError> {
        self.resolve_value(member)?.converter().serialize(value, self)
    }

    /// Overwrite a value member's slot from TOML.
    pub fn deserialize_value(
        &self,
        member: MemberAccessor,
        slot: &mut dyn Any,
        data: &toml::Value,
    ) -> Result<(), ConvertError> {
        self.resolve_value(member)?
            .converter()
            .deserialize(slot, data, self)
    }

    /// View a slot of a registered value-object type as [`Reflect`].
    pub fn as_value_object<'a>(&self, type_id: TypeId, slot: &'a dyn Any) -> Option<&'a dyn Reflect> {
        self.objects.get(&type_id).and_then(|entry| entry.cast(slot))
    }

    /// Mutable counterpart of [`as_value_object`](Self::as_value_object).
    pub fn as_value_object_mut<'a>(
        &self,
        type_id: TypeId,
        slot: &'a mut dyn Any,
    ) -> Option<&'a mut dyn Reflect> {
        self.objects
            .get(&type_id)
            .and_then(|entry| entry.cast_mut(slot))
    }

    pub fn is_value_object(&self, type_id: TypeId) -> bool {
        self.objects.contains_key(&type_id)
    }
}

/// Error for a slot that does not hold the converter's type.
pub(crate) fn slot_mismatch<T: Any>() -> ConvertError {
    ConvertError::TypeMismatch {
        expected: std::any::type_name::<T>().to_owned(),
        found: "a slot of another type".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ComponentId;

    #[derive(Debug, Clone, Copy, PartialEq, Default, crate::EnumMember)]
    enum Mode {
        #[default]
        Idle,
        Patrol,
    }

    #[derive(Debug, Default, crate::Reflect)]
    struct Range {
        #[value]
        min: f32,
        #[value]
        max: f32,
    }

    #[derive(Default, crate::Component)]
    struct Guard {
        #[value]
        name: String,
        #[value]
        mode: Mode,
        #[value]
        range: Range,
        #[value]
        tag: std::path::PathBuf,
        #[reference]
        post: Option<ComponentId>,
        #[reference]
        patrol: Vec<ComponentId>,
    }

    struct Shout;

    impl ValueConverter for Shout {
        fn serialize(
            &self,
            value: &dyn Any,
            _: &ConversionRegistry,
        ) -> Result<toml::Value, ConvertError> {
            let s = value.downcast_ref::<String>().ok_or_else(slot_mismatch::<String>)?;
            Ok(toml::Value::String(s.to_uppercase()))
        }

        fn deserialize(
            &self,
            slot: &mut dyn Any,
            data: &toml::Value,
            _: &ConversionRegistry,
        ) -> Result<(), ConvertError> {
            let s = data.as_str().ok_or_else(|| ConvertError::mismatch("string", data))?;
            *slot.downcast_mut::<String>().ok_or_else(slot_mismatch::<String>)? = s.to_lowercase();
            Ok(())
        }
    }

    fn member(guard: &Guard, name: &str) -> MemberAccessor {
        MemberAccessor::find(guard, name).unwrap()
    }

    #[test]
    fn builtins_resolve() {
        let registry = ConversionRegistry::new();
        let guard = Guard::default();
        assert!(matches!(
            registry.resolve_value(member(&guard, "name")),
            Ok(ValueStrategy::Convert(_))
        ));
    }

    #[test]
    fn enum_requires_registration() {
        let mut registry = ConversionRegistry::new();
        let mut guard = Guard::default();
        let mode = member(&guard, "mode");
        assert!(matches!(
            registry.resolve_value(mode),
            Err(ConvertError::NoConverter { .. })
        ));

        registry.register_enum::<Mode>();
        let slot = mode.get_mut(&mut guard).unwrap();
        registry
            .deserialize_value(mode, slot, &toml::Value::String("Patrol".into()))
            .unwrap();
        assert_eq!(guard.mode, Mode::Patrol);
    }

    #[test]
    fn value_object_is_nested() {
        let mut registry = ConversionRegistry::new();
        registry.register_value_object::<Range>();
        let guard = Guard {
            range: Range { min: 1.0, max: 4.5 },
            ..Default::default()
        };
        let range = member(&guard, "range");
        assert!(matches!(
            registry.resolve_value(range),
            Ok(ValueStrategy::Nested(_))
        ));

        let value = registry
            .serialize_value(range, range.get(&guard).unwrap())
            .unwrap();
        let table = value.as_table().unwrap();
        assert_eq!(table["min"].as_float(), Some(1.0));
        assert_eq!(table["max"].as_float(), Some(4.5));
    }

    #[test]
    fn unknown_type_has_no_converter() {
        let registry = ConversionRegistry::new();
        let guard = Guard::default();
        let err = registry.resolve_value(member(&guard, "tag")).err().unwrap();
        match err {
            ConvertError::NoConverter { type_name } => assert!(type_name.contains("PathBuf")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn member_override_wins_over_builtin() {
        let mut registry = ConversionRegistry::new();
        registry.override_value::<Guard>("name", Shout);
        let mut guard = Guard {
            name: "bob".into(),
            ..Default::default()
        };
        let name = member(&guard, "name");
        let value = registry
            .serialize_value(name, name.get(&guard).unwrap())
            .unwrap();
        assert_eq!(value.as_str(), Some("BOB"));

        let slot = name.get_mut(&mut guard).unwrap();
        registry
            .deserialize_value(name, slot, &toml::Value::String("ALICE".into()))
            .unwrap();
        assert_eq!(guard.name, "alice");
    }

    mod barracks {
        #[derive(Default, crate::Component)]
        pub struct Guard {
            #[value]
            pub name: String,
        }
    }

    #[test]
    fn member_override_is_bound_to_owner_type() {
        let mut registry = ConversionRegistry::new();
        registry.override_value::<Guard>("name", Shout);
        let other = barracks::Guard {
            name: "bob".into(),
        };
        let name = MemberAccessor::find(&other, "name").unwrap();
        let value = registry
            .serialize_value(name, name.get(&other).unwrap())
            .unwrap();
        assert_eq!(value.as_str(), Some("bob"));
    }

    #[test]
    fn reference_converters_by_slot_type() {
        let registry = ConversionRegistry::new();
        let guard = Guard::default();
        assert!(registry.resolve_reference(member(&guard, "post")).is_ok());
        assert!(registry.resolve_reference(member(&guard, "patrol")).is_ok());
        assert!(registry.resolve_reference(member(&guard, "name")).is_err());
    }
}
