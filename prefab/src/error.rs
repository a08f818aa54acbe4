//! Error and warning types for prefab loading, writing and editing.
//!
//! Structural problems abort the load of the file they occur in (and of
//! every parent prefab that includes it). [`LoadWarning`]s never abort;
//! they are logged and collected on the resulting
//! [`PrefabRoot`](crate::PrefabRoot).
//!
//! Every load error names the file it occurred in. Errors inside nested
//! prefabs are wrapped in [`PrefabError::Nested`], so the rendered message
//! shows the whole include chain.

use crate::storage::StorageError;
use crate::world::ComponentId;

/// Errors raised by the loader, the writer and [`PrefabRoot`](crate::PrefabRoot) edits.
#[derive(Debug, thiserror::Error)]
pub enum PrefabError {
    #[error("{path}: failed to read prefab: {source}")]
    Read {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("{path}: failed to parse prefab: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("{path}: failed to encode prefab: {source}")]
    Encode {
        path: String,
        #[source]
        source: toml::ser::Error,
    },

    #[error("{path}: failed to write prefab: {source}")]
    Write {
        path: String,
        #[source]
        source: StorageError,
    },

    /// A prefab path is empty or climbs above the storage root.
    #[error("{path}: invalid prefab path: {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: StorageError,
    },

    /// The file has no `"This"` entry.
    #[error("{path}: missing root entry \"This\"")]
    MissingRootEntry { path: String },

    /// An entry is not a table or does not declare exactly one of
    /// `Component` / `Prefab`.
    #[error("{path}: entry '{id}' is malformed: {reason}")]
    InvalidEntry {
        path: String,
        id: String,
        reason: String,
    },

    /// The declared type name is not registered.
    #[error("{path}: entry '{id}' uses unknown component type '{type_name}'")]
    UnknownType {
        path: String,
        id: String,
        type_name: String,
    },

    /// A reference names an id that does not exist in the file.
    #[error(
        "{path}: entry '{id}' member '{member}' references unknown id '{target}'"
    )]
    UnresolvedReference {
        path: String,
        id: String,
        member: String,
        target: String,
    },

    /// No conversion strategy exists for a member's declared type.
    #[error(
        "{path}: entry '{id}' member '{member}' has no converter for type '{type_name}'"
    )]
    NoConverterFound {
        path: String,
        id: String,
        member: String,
        type_name: String,
    },

    /// A converter rejected the data in the file (or the live value on write).
    #[error("{path}: entry '{id}' member '{member}': {source}")]
    InvalidValue {
        path: String,
        id: String,
        member: String,
        #[source]
        source: ConvertError,
    },

    /// A nested prefab failed to load.
    #[error("{path}: nested prefab in entry '{id}': {source}")]
    Nested {
        path: String,
        id: String,
        #[source]
        source: Box<PrefabError>,
    },

    /// A prefab includes itself, directly or through other prefabs.
    #[error("{path}: prefab includes itself")]
    CyclicPrefab { path: String },

    /// A component being written references a component that is not an
    /// emission unit of the prefab.
    #[error(
        "{path}: entry '{id}' member '{member}' references component {target} outside the prefab"
    )]
    ForeignReference {
        path: String,
        id: String,
        member: String,
        target: ComponentId,
    },

    /// `add_component` was called with an owner that is not in the id table.
    #[error("component {owner} is not part of this prefab")]
    OwnerNotFound { owner: ComponentId },

    #[error(transparent)]
    Access(#[from] AccessError),
}

/// Errors raised by member accessors and path resolution.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccessError {
    /// The member does not exist on the component's runtime type.
    #[error("type '{owner}' has no member '{member}'")]
    MemberNotFound { owner: String, member: String },

    #[error("member '{owner}.{member}' is read-only")]
    ReadOnly { owner: String, member: String },

    #[error("member '{owner}.{member}' is not a {expected}")]
    TypeMismatch {
        owner: String,
        member: String,
        expected: &'static str,
    },

    #[error("member '{owner}.{member}' is not a registered value object")]
    NotAValueObject { owner: String, member: String },

    #[error("member '{owner}.{member}' is not a reference")]
    NotAReference { owner: String, member: String },

    #[error("component {0} does not exist")]
    MissingComponent(ComponentId),
}

/// Errors raised by value and reference converters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConvertError {
    #[error("no converter for type '{type_name}'")]
    NoConverter { type_name: String },

    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("unknown variant '{variant}', expected one of: {}", .expected.join(", "))]
    UnknownVariant {
        variant: String,
        expected: Vec<String>,
    },

    #[error("unknown member '{member}' in value object '{owner}'")]
    UnknownMember { owner: String, member: String },

    /// A reference id is not in the id table.
    #[error("unresolved reference '{0}'")]
    UnresolvedId(String),

    /// A referenced component has no id in the prefab being written.
    #[error("component {0} has no id in this prefab")]
    UnknownComponent(ComponentId),

    #[error("{0}")]
    Message(String),
}

/// Non-fatal problems found while loading.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadWarning {
    /// A `Values` key was not consumed by either resolution pass.
    #[error("{path}: entry '{id}' has unused key '{key}'")]
    UnconsumedKey {
        path: String,
        id: String,
        key: String,
    },

    /// A favorites path could not be resolved and was dropped.
    #[error("{path}: favorite '{favorite}' dropped: {reason}")]
    UnresolvedFavorite {
        path: String,
        favorite: String,
        reason: String,
    },
}

impl ConvertError {
    /// Describe a TOML value's kind for type-mismatch messages.
    pub fn mismatch(expected: impl Into<String>, found: &toml::Value) -> Self {
        ConvertError::TypeMismatch {
            expected: expected.into(),
            found: found.type_str().to_owned(),
        }
    }
}

impl From<toml::ser::Error> for ConvertError {
    fn from(err: toml::ser::Error) -> Self {
        ConvertError::Message(err.to_string())
    }
}

impl From<toml::de::Error> for ConvertError {
    fn from(err: toml::de::Error) -> Self {
        ConvertError::Message(err.to_string())
    }
}
