//! # RedLilium Prefab
//!
//! Persistence for prefab graphs: typed components wired together by
//! references, stored as human-editable TOML, composed from other prefab
//! files, and written back as a minimal delta.
//!
//! ## Core Types
//!
//! - [`Component`] / [`Reflect`]: Tagged-member reflection, derived with
//!   `#[derive(Component)]` / `#[derive(Reflect)]`
//! - [`MemberAccessor`]: Uniform get/set handle over one tagged member
//! - [`World`] / [`ComponentId`]: Arena owning every loaded component
//! - [`ComponentPath`] / [`MemberPath`]: Structural addresses into a graph
//!
//! ## Persistence
//!
//! - [`ConversionRegistry`]: Value and reference converters per declared type
//! - [`TypeRegistry`]: Component types constructible by name
//! - [`Loader`]: Prefab file → [`PrefabRoot`], with nested prefabs and
//!   forward references
//! - [`Writer`]: [`PrefabRoot`] → prefab file, emitting only overrides for
//!   nested prefabs
//! - [`PrefabRoot`]: Live instance with owned components, nested instances,
//!   change set, favorites
//! - [`PrefabStorage`]: File access seam ([`FileSystemStorage`],
//!   [`MemoryStorage`])
//!
//! ## Example
//!
//! ```ignore
//! let mut types = TypeRegistry::new();
//! types.register::<Door>();
//! let converters = ConversionRegistry::new();
//! let storage = FileSystemStorage::new("assets/prefabs");
//! let ctx = PrefabContext::new(&types, &converters, &storage);
//!
//! let mut world = World::new();
//! let mut house = Loader::new(ctx).load(&mut world, "house.toml")?;
//! house.add_component(&mut world, ctx, "Lamp", house.root())?;
//! ```

// Derive output names this crate by path; make that path resolve here too.
extern crate self as redlilium_prefab;

mod accessor;
pub mod change_set;
mod color;
pub mod component;
pub mod convert;
mod error;
pub mod file;
mod loader;
pub mod path;
mod prefab_root;
mod registry;
pub mod storage;
mod world;
mod writer;

pub use accessor::MemberAccessor;
pub use change_set::{AppliedValue, ChangeEntry, ChangeSet};
pub use color::Color;
pub use component::{Component, EnumMember, MemberInfo, MemberTag, Reflect};
pub use convert::{ConversionRegistry, ReferenceConverter, ValueConverter, ValueStrategy};
pub use error::{AccessError, ConvertError, LoadWarning, PrefabError};
pub use file::{EntryId, EntrySource, PrefabEntry, PrefabFile};
pub use loader::{LoadOptions, Loader};
pub use path::{ComponentPath, MemberPath, PathParent};
pub use prefab_macro::{Component, EnumMember, Reflect};
pub use prefab_root::{PrefabRoot, Provenance};
pub use registry::{PrefabContext, TypeRegistry};
pub use storage::{FileSystemStorage, MemoryStorage, PrefabStorage, StorageError};
pub use world::{ComponentId, World};
pub use writer::Writer;
