//! Constructible component types and the context threaded through loads
//! and writes.

use std::collections::BTreeMap;

use crate::component::Component;
use crate::convert::ConversionRegistry;
use crate::storage::PrefabStorage;

/// Type-erased constructor for a registered component type.
struct TypeEntry {
    construct: fn() -> Box<dyn Component>,
}

fn construct<T: Component + Default>() -> Box<dyn Component> {
    Box::new(T::default())
}

/// Registry of component types that prefab files can name.
///
/// Register component types during setup. The loader constructs a default
/// instance for every `Component = "<name>"` entry.
#[derive(Default)]
pub struct TypeRegistry {
    /// Ordered by name for consistent listings.
    entries: BTreeMap<String, TypeEntry>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under its reflected type name.
    pub fn register<T>(&mut self)
    where
        T: Component + Default,
    {
        let name = T::default().component_name();
        self.register_as::<T>(name);
    }

    /// Register `T` under an explicit name (e.g. a namespaced alias).
    pub fn register_as<T>(&mut self, name: &str)
    where
        T: Component + Default,
    {
        let entry = TypeEntry {
            construct: construct::<T>,
        };
        self.entries.insert(name.to_owned(), entry);
    }

    /// Construct a default instance of the named type.
    pub fn construct(&self, name: &str) -> Option<Box<dyn Component>> {
        self.entries.get(name).map(|e| (e.construct)())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterate over all registered type names.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }
}

/// Everything a load or write needs besides the world itself.
#[derive(Clone, Copy)]
pub struct PrefabContext<'a> {
    pub types: &'a TypeRegistry,
    pub converters: &'a ConversionRegistry,
    pub storage: &'a dyn PrefabStorage,
}

impl<'a> PrefabContext<'a> {
    pub fn new(
        types: &'a TypeRegistry,
        converters: &'a ConversionRegistry,
        storage: &'a dyn PrefabStorage,
    ) -> Self {
        Self {
            types,
            converters,
            storage,
        }
    }
}
