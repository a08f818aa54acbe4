//! Built-in value converters.

use std::any::Any;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{ConversionRegistry, ValueConverter, ValueStrategy, slot_mismatch};
use crate::accessor::MemberAccessor;
use crate::color::Color;
use crate::component::{EnumMember, MemberTag, Reflect};
use crate::error::ConvertError;

// ---------------------------------------------------------------------------
// Leaf types
// ---------------------------------------------------------------------------

/// Converts any serde type through `toml::Value`.
pub struct SerdeConverter<T>(PhantomData<fn() -> T>);

impl<T> SerdeConverter<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for SerdeConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned + Any> ValueConverter for SerdeConverter<T> {
    fn serialize(
        &self,
        value: &dyn Any,
        _: &ConversionRegistry,
    ) -> Result<toml::Value, ConvertError> {
        let value = value.downcast_ref::<T>().ok_or_else(slot_mismatch::<T>)?;
        Ok(toml::Value::try_from(value)?)
    }

    fn deserialize(
        &self,
        slot: &mut dyn Any,
        data: &toml::Value,
        _: &ConversionRegistry,
    ) -> Result<(), ConvertError> {
        let slot = slot.downcast_mut::<T>().ok_or_else(slot_mismatch::<T>)?;
        *slot = data.clone().try_into::<T>()?;
        Ok(())
    }
}

/// `f32` leaf. Writes the shortest decimal form (`0.1`, not
/// `0.10000000149011612`) so hand-edited files stay readable.
pub struct F32Converter;

impl ValueConverter for F32Converter {
    fn serialize(
        &self,
        value: &dyn Any,
        _: &ConversionRegistry,
    ) -> Result<toml::Value, ConvertError> {
        let value = value.downcast_ref::<f32>().ok_or_else(slot_mismatch::<f32>)?;
        short_float(*value)
    }

    fn deserialize(
        &self,
        slot: &mut dyn Any,
        data: &toml::Value,
        _: &ConversionRegistry,
    ) -> Result<(), ConvertError> {
        let slot = slot.downcast_mut::<f32>().ok_or_else(slot_mismatch::<f32>)?;
        *slot = number(data)?;
        Ok(())
    }
}

/// [`Color`] leaf: `[r, g, b, a]` array, also reads `[r, g, b]` and tables.
pub struct ColorConverter;

impl ValueConverter for ColorConverter {
    fn serialize(
        &self,
        value: &dyn Any,
        _: &ConversionRegistry,
    ) -> Result<toml::Value, ConvertError> {
        let color = value.downcast_ref::<Color>().ok_or_else(slot_mismatch::<Color>)?;
        let channels = color
            .to_array()
            .into_iter()
            .map(short_float)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(toml::Value::Array(channels))
    }

    fn deserialize(
        &self,
        slot: &mut dyn Any,
        data: &toml::Value,
        _: &ConversionRegistry,
    ) -> Result<(), ConvertError> {
        let color = match data {
            toml::Value::Array(items) => {
                let channels = items.iter().map(number).collect::<Result<Vec<f32>, _>>()?;
                match channels[..] {
                    [r, g, b] => Color::rgb(r, g, b),
                    [r, g, b, a] => Color::new(r, g, b, a),
                    _ => {
                        return Err(ConvertError::TypeMismatch {
                            expected: "3 or 4 color channels".to_owned(),
                            found: format!("{} channels", channels.len()),
                        });
                    }
                }
            }
            toml::Value::Table(_) => data.clone().try_into::<Color>()?,
            other => return Err(ConvertError::mismatch("color array", other)),
        };
        *slot.downcast_mut::<Color>().ok_or_else(slot_mismatch::<Color>)? = color;
        Ok(())
    }
}

fn short_float(value: f32) -> Result<toml::Value, ConvertError> {
    let wide = value
        .to_string()
        .parse::<f64>()
        .map_err(|e| ConvertError::Message(e.to_string()))?;
    Ok(toml::Value::Float(wide))
}

fn number(data: &toml::Value) -> Result<f32, ConvertError> {
    match data {
        toml::Value::Float(f) => Ok(*f as f32),
        toml::Value::Integer(i) => Ok(*i as f32),
        other => Err(ConvertError::mismatch("number", other)),
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Persists an [`EnumMember`] by variant name.
pub struct EnumConverter<T>(PhantomData<fn() -> T>);

impl<T> EnumConverter<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for EnumConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: EnumMember> ValueConverter for EnumConverter<T> {
    fn serialize(
        &self,
        value: &dyn Any,
        _: &ConversionRegistry,
    ) -> Result<toml::Value, ConvertError> {
        let value = value.downcast_ref::<T>().ok_or_else(slot_mismatch::<T>)?;
        Ok(toml::Value::String(value.variant_name().to_owned()))
    }

    fn deserialize(
        &self,
        slot: &mut dyn Any,
        data: &toml::Value,
        _: &ConversionRegistry,
    ) -> Result<(), ConvertError> {
        let name = data
            .as_str()
            .ok_or_else(|| ConvertError::mismatch("variant name", data))?;
        let value = T::from_variant_name(name).ok_or_else(|| ConvertError::UnknownVariant {
            variant: name.to_owned(),
            expected: T::variant_names().iter().map(|s| s.to_string()).collect(),
        })?;
        *slot.downcast_mut::<T>().ok_or_else(slot_mismatch::<T>)? = value;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Nested value objects
// ---------------------------------------------------------------------------

/// A registered value-object type.
///
/// Holds the casts that let paths and converters walk into a slot of this
/// type, and doubles as the whole-value converter: a table of the object's
/// value members.
pub struct ValueObjectEntry {
    type_name: &'static str,
    cast: fn(&dyn Any) -> Option<&dyn Reflect>,
    cast_mut: fn(&mut dyn Any) -> Option<&mut dyn Reflect>,
}

fn cast<T: Reflect>(slot: &dyn Any) -> Option<&dyn Reflect> {
    slot.downcast_ref::<T>().map(|t| t as &dyn Reflect)
}

fn cast_mut<T: Reflect>(slot: &mut dyn Any) -> Option<&mut dyn Reflect> {
    slot.downcast_mut::<T>().map(|t| t as &mut dyn Reflect)
}

impl ValueObjectEntry {
    pub fn of<T: Reflect + Default>() -> Self {
        Self {
            type_name: T::default().reflect_name(),
            cast: cast::<T>,
            cast_mut: cast_mut::<T>,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn cast<'a>(&self, slot: &'a dyn Any) -> Option<&'a dyn Reflect> {
        (self.cast)(slot)
    }

    pub fn cast_mut<'a>(&self, slot: &'a mut dyn Any) -> Option<&'a mut dyn Reflect> {
        (self.cast_mut)(slot)
    }

    fn mismatch(&self) -> ConvertError {
        ConvertError::TypeMismatch {
            expected: self.type_name.to_owned(),
            found: "a slot of another type".to_owned(),
        }
    }
}

impl ValueConverter for ValueObjectEntry {
    fn serialize(
        &self,
        value: &dyn Any,
        converters: &ConversionRegistry,
    ) -> Result<toml::Value, ConvertError> {
        let object = self.cast(value).ok_or_else(|| self.mismatch())?;
        let mut table = toml::Table::new();
        for member in MemberAccessor::all(object) {
            if member.tag() != MemberTag::Value || !member.is_readable() {
                continue;
            }
            let slot = member
                .get(object)
                .map_err(|e| ConvertError::Message(e.to_string()))?;
            table.insert(
                member.name().to_owned(),
                converters.serialize_value(member, slot)?,
            );
        }
        Ok(toml::Value::Table(table))
    }

    fn deserialize(
        &self,
        slot: &mut dyn Any,
        data: &toml::Value,
        converters: &ConversionRegistry,
    ) -> Result<(), ConvertError> {
        let table = data
            .as_table()
            .ok_or_else(|| ConvertError::mismatch("table", data))?;
        let object = self.cast_mut(slot).ok_or_else(|| self.mismatch())?;
        for (key, value) in table {
            let member = MemberAccessor::find(object, key)
                .ok()
                .filter(|m| m.tag() == MemberTag::Value && m.is_writable())
                .ok_or_else(|| ConvertError::UnknownMember {
                    owner: self.type_name.to_owned(),
                    member: key.clone(),
                })?;
            let strategy = converters.resolve_value(member)?;
            let slot = member
                .get_mut(object)
                .map_err(|e| ConvertError::Message(e.to_string()))?;
            match strategy {
                ValueStrategy::Convert(c) => c.deserialize(slot, value, converters)?,
                ValueStrategy::Nested(entry) => entry.deserialize(slot, value, converters)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Default, crate::EnumMember)]
    enum Shape {
        #[default]
        Box,
        Sphere,
    }

    #[derive(Debug, Default, PartialEq, crate::Reflect)]
    struct Inner {
        #[value]
        depth: u8,
    }

    #[derive(Debug, Default, PartialEq, crate::Reflect)]
    struct Outer {
        #[value]
        label: String,
        #[value]
        inner: Inner,
    }

    fn registry() -> ConversionRegistry {
        let mut registry = ConversionRegistry::new();
        registry.register_enum::<Shape>();
        registry.register_value_object::<Inner>();
        registry.register_value_object::<Outer>();
        registry
    }

    fn parse(text: &str) -> toml::Value {
        text.parse::<toml::Table>().unwrap()["v"].clone()
    }

    #[test]
    fn serde_leaf_roundtrip() {
        let registry = ConversionRegistry::new();
        let converter = SerdeConverter::<i32>::new();
        let mut slot = 0i32;
        converter
            .deserialize(&mut slot, &toml::Value::Integer(-7), &registry)
            .unwrap();
        assert_eq!(slot, -7);
        assert_eq!(
            converter.serialize(&slot, &registry).unwrap(),
            toml::Value::Integer(-7)
        );
    }

    #[test]
    fn serde_leaf_rejects_wrong_kind() {
        let registry = ConversionRegistry::new();
        let mut slot = false;
        let err = SerdeConverter::<bool>::new()
            .deserialize(&mut slot, &toml::Value::String("yes".into()), &registry)
            .unwrap_err();
        assert!(matches!(err, ConvertError::Message(_)));
    }

    #[test]
    fn f32_writes_short_form_and_reads_integers() {
        let registry = ConversionRegistry::new();
        assert_eq!(
            F32Converter.serialize(&0.1f32, &registry).unwrap(),
            toml::Value::Float(0.1)
        );
        let mut slot = 0.0f32;
        F32Converter
            .deserialize(&mut slot, &toml::Value::Integer(3), &registry)
            .unwrap();
        assert_eq!(slot, 3.0);
    }

    #[test]
    fn color_forms() {
        let registry = ConversionRegistry::new();
        let mut color = Color::default();

        ColorConverter
            .deserialize(&mut color, &parse("v = [1, 0.5, 0]"), &registry)
            .unwrap();
        assert_eq!(color, Color::rgb(1.0, 0.5, 0.0));

        ColorConverter
            .deserialize(&mut color, &parse("v = { r = 0.0, g = 1.0, b = 0.0, a = 0.25 }"), &registry)
            .unwrap();
        assert_eq!(color, Color::new(0.0, 1.0, 0.0, 0.25));

        assert_eq!(
            ColorConverter.serialize(&color, &registry).unwrap(),
            parse("v = [0.0, 1.0, 0.0, 0.25]")
        );

        let err = ColorConverter
            .deserialize(&mut color, &parse("v = [1, 2]"), &registry)
            .unwrap_err();
        assert!(matches!(err, ConvertError::TypeMismatch { .. }));
    }

    #[test]
    fn enum_by_name() {
        let registry = registry();
        let converter = EnumConverter::<Shape>::new();
        let mut shape = Shape::Box;
        converter
            .deserialize(&mut shape, &toml::Value::String("Sphere".into()), &registry)
            .unwrap();
        assert_eq!(shape, Shape::Sphere);
        assert_eq!(
            converter.serialize(&shape, &registry).unwrap().as_str(),
            Some("Sphere")
        );

        let err = converter
            .deserialize(&mut shape, &toml::Value::String("Cone".into()), &registry)
            .unwrap_err();
        assert_eq!(
            err,
            ConvertError::UnknownVariant {
                variant: "Cone".into(),
                expected: vec!["Box".into(), "Sphere".into()],
            }
        );
    }

    #[test]
    fn value_object_recurses() {
        let registry = registry();
        let entry = ValueObjectEntry::of::<Outer>();
        let mut outer = Outer::default();
        entry
            .deserialize(
                &mut outer,
                &parse("v = { label = \"crate\", inner = { depth = 3 } }"),
                &registry,
            )
            .unwrap();
        assert_eq!(
            outer,
            Outer {
                label: "crate".into(),
                inner: Inner { depth: 3 },
            }
        );
        assert_eq!(
            entry.serialize(&outer, &registry).unwrap(),
            parse("v = { label = \"crate\", inner = { depth = 3 } }")
        );
    }

    #[test]
    fn value_object_rejects_unknown_member() {
        let registry = registry();
        let mut inner = Inner::default();
        let err = ValueObjectEntry::of::<Inner>()
            .deserialize(&mut inner, &parse("v = { width = 3 }"), &registry)
            .unwrap_err();
        assert!(matches!(err, ConvertError::UnknownMember { .. }));
    }
}
