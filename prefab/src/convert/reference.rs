//! Default reference converters.
//!
//! A single reference is written as the target's entry id (`""` for null);
//! a collection as an array of entry ids.

use std::any::Any;

use super::{ReferenceConverter, slot_mismatch};
use crate::error::ConvertError;
use crate::world::ComponentId;

/// Converter for `Option<ComponentId>` slots.
pub struct OptionReferenceConverter;

impl ReferenceConverter for OptionReferenceConverter {
    fn serialize(
        &self,
        value: &dyn Any,
        id_of: &dyn Fn(ComponentId) -> Option<String>,
    ) -> Result<toml::Value, ConvertError> {
        let value = value
            .downcast_ref::<Option<ComponentId>>()
            .ok_or_else(slot_mismatch::<Option<ComponentId>>)?;
        let id = match value {
            Some(target) => id_of(*target).ok_or(ConvertError::UnknownComponent(*target))?,
            None => String::new(),
        };
        Ok(toml::Value::String(id))
    }

    fn deserialize(
        &self,
        slot: &mut dyn Any,
        data: &toml::Value,
        id_from: &dyn Fn(&str) -> Option<ComponentId>,
    ) -> Result<(), ConvertError> {
        let slot = slot
            .downcast_mut::<Option<ComponentId>>()
            .ok_or_else(slot_mismatch::<Option<ComponentId>>)?;
        let id = data
            .as_str()
            .ok_or_else(|| ConvertError::mismatch("id string", data))?;
        *slot = if id.is_empty() {
            None
        } else {
            Some(resolve(id, id_from)?)
        };
        Ok(())
    }

    fn collect(&self, value: &dyn Any) -> Result<Vec<ComponentId>, ConvertError> {
        let value = value
            .downcast_ref::<Option<ComponentId>>()
            .ok_or_else(slot_mismatch::<Option<ComponentId>>)?;
        Ok(value.iter().copied().collect())
    }

    fn attach(&self, slot: &mut dyn Any, id: ComponentId) -> Result<(), ConvertError> {
        let slot = slot
            .downcast_mut::<Option<ComponentId>>()
            .ok_or_else(slot_mismatch::<Option<ComponentId>>)?;
        *slot = Some(id);
        Ok(())
    }
}

/// Converter for `Vec<ComponentId>` slots.
pub struct VecReferenceConverter;

impl ReferenceConverter for VecReferenceConverter {
    fn serialize(
        &self,
        value: &dyn Any,
        id_of: &dyn Fn(ComponentId) -> Option<String>,
    ) -> Result<toml::Value, ConvertError> {
        let value = value
            .downcast_ref::<Vec<ComponentId>>()
            .ok_or_else(slot_mismatch::<Vec<ComponentId>>)?;
        let ids = value
            .iter()
            .map(|target| {
                id_of(*target)
                    .map(toml::Value::String)
                    .ok_or(ConvertError::UnknownComponent(*target))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(toml::Value::Array(ids))
    }

    fn deserialize(
        &self,
        slot: &mut dyn Any,
        data: &toml::Value,
        id_from: &dyn Fn(&str) -> Option<ComponentId>,
    ) -> Result<(), ConvertError> {
        let slot = slot
            .downcast_mut::<Vec<ComponentId>>()
            .ok_or_else(slot_mismatch::<Vec<ComponentId>>)?;
        let items = data
            .as_array()
            .ok_or_else(|| ConvertError::mismatch("array of id strings", data))?;
        let mut targets = Vec::with_capacity(items.len());
        for item in items {
            let id = item
                .as_str()
                .ok_or_else(|| ConvertError::mismatch("id string", item))?;
            targets.push(resolve(id, id_from)?);
        }
        *slot = targets;
        Ok(())
    }

    fn collect(&self, value: &dyn Any) -> Result<Vec<ComponentId>, ConvertError> {
        value
            .downcast_ref::<Vec<ComponentId>>()
            .cloned()
            .ok_or_else(slot_mismatch::<Vec<ComponentId>>)
    }

    fn attach(&self, slot: &mut dyn Any, id: ComponentId) -> Result<(), ConvertError> {
        slot.downcast_mut::<Vec<ComponentId>>()
            .ok_or_else(slot_mismatch::<Vec<ComponentId>>)?
            .push(id);
        Ok(())
    }
}

fn resolve(
    id: &str,
    id_from: &dyn Fn(&str) -> Option<ComponentId>,
) -> Result<ComponentId, ConvertError> {
    id_from(id).ok_or_else(|| ConvertError::UnresolvedId(id.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::World;

    #[derive(Default, crate::Component)]
    struct Node {}

    fn ids() -> (ComponentId, ComponentId) {
        let mut world = World::new();
        let a = world.spawn(Box::new(Node {}));
        let b = world.spawn(Box::new(Node {}));
        (a, b)
    }

    #[test]
    fn option_roundtrip_and_null() {
        let (a, _) = ids();
        let id_from = |s: &str| (s == "1").then_some(a);
        let id_of = |c: ComponentId| (c == a).then(|| "1".to_owned());

        let mut slot: Option<ComponentId> = None;
        OptionReferenceConverter
            .deserialize(&mut slot, &toml::Value::String("1".into()), &id_from)
            .unwrap();
        assert_eq!(slot, Some(a));
        assert_eq!(
            OptionReferenceConverter.serialize(&slot, &id_of).unwrap(),
            toml::Value::String("1".into())
        );

        OptionReferenceConverter
            .deserialize(&mut slot, &toml::Value::String(String::new()), &id_from)
            .unwrap();
        assert_eq!(slot, None);
        assert_eq!(
            OptionReferenceConverter.serialize(&slot, &id_of).unwrap(),
            toml::Value::String(String::new())
        );
    }

    #[test]
    fn option_unresolved() {
        let mut slot: Option<ComponentId> = None;
        let err = OptionReferenceConverter
            .deserialize(&mut slot, &toml::Value::String("99".into()), &|_: &str| None)
            .unwrap_err();
        assert_eq!(err, ConvertError::UnresolvedId("99".into()));
    }

    #[test]
    fn vec_collect_and_attach() {
        let (a, b) = ids();
        let id_from = |s: &str| match s {
            "1" => Some(a),
            "2" => Some(b),
            _ => None,
        };
        let mut slot: Vec<ComponentId> = Vec::new();
        VecReferenceConverter
            .deserialize(&mut slot, &"v = [\"2\", \"1\"]".parse::<toml::Table>().unwrap()["v"], &id_from)
            .unwrap();
        assert_eq!(slot, [b, a]);

        VecReferenceConverter.attach(&mut slot, a).unwrap();
        assert_eq!(VecReferenceConverter.collect(&slot).unwrap(), [b, a, a]);
    }

    #[test]
    fn serialize_foreign_component() {
        let (a, _) = ids();
        let err = VecReferenceConverter
            .serialize(&vec![a], &|_: ComponentId| None)
            .unwrap_err();
        assert_eq!(err, ConvertError::UnknownComponent(a));
    }
}
