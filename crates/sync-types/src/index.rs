//! Index declarations and normalized index definitions.
//!
//! An [`IndexDeclaration`] is what callers hand to the registry: loosely
//! shaped, deserializable from the config file, every part optional. The
//! registry normalizes it into an [`IndexDefinition`], which is immutable
//! for the rest of the process.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::content::ItemId;

/// Source type used when a declaration names none.
pub const DEFAULT_SOURCE_TYPE: &str = "post";

/// Status an item must have to be indexed when a declaration names none.
pub const DEFAULT_STATUS: &str = "publish";

/// Boxed error returned by pluggable callbacks and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Callback computing a field value from `(item_id, field_id)`.
pub type FieldCallback = Arc<dyn Fn(ItemId, &str) -> Result<Value, BoxError> + Send + Sync>;

/// How the object builder extracts one field.
#[derive(Clone)]
pub enum FieldSpec {
    /// Copy an attribute of the content item, omitted when absent
    Direct(String),
    /// Read a metadata value from the content source
    Meta(String),
    /// Call an opaque function
    Callback(FieldCallback),
}

impl FieldSpec {
    /// Wrap a closure as a callback field.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(ItemId, &str) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        FieldSpec::Callback(Arc::new(f))
    }

    /// Short tag used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldSpec::Direct(_) => "post",
            FieldSpec::Meta(_) => "meta",
            FieldSpec::Callback(_) => "callback",
        }
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSpec::Direct(attr) => f.debug_tuple("Direct").field(attr).finish(),
            FieldSpec::Meta(key) => f.debug_tuple("Meta").field(key).finish(),
            FieldSpec::Callback(_) => f.write_str("Callback(<fn>)"),
        }
    }
}

/// A single value or a list, as written in config files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

impl From<&str> for OneOrMany {
    fn from(value: &str) -> Self {
        OneOrMany::One(value.to_string())
    }
}

impl From<Vec<String>> for OneOrMany {
    fn from(values: Vec<String>) -> Self {
        OneOrMany::Many(values)
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawFieldKind {
    #[default]
    #[serde(alias = "direct")]
    Post,
    Meta,
}

#[derive(Debug, Deserialize)]
struct RawFieldDeclaration {
    id: String,
    #[serde(default, rename = "type")]
    kind: RawFieldKind,
    #[serde(default)]
    source: Option<String>,
}

/// One declared field: its id in the document and how to extract it.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawFieldDeclaration")]
pub struct FieldDeclaration {
    pub id: String,
    pub spec: FieldSpec,
}

impl From<RawFieldDeclaration> for FieldDeclaration {
    fn from(raw: RawFieldDeclaration) -> Self {
        let source = raw.source.unwrap_or_else(|| raw.id.clone());
        let spec = match raw.kind {
            RawFieldKind::Post => FieldSpec::Direct(source),
            RawFieldKind::Meta => FieldSpec::Meta(source),
        };
        Self { id: raw.id, spec }
    }
}

/// Raw index declaration, before normalization.
///
/// Config files can express `post` and `meta` fields; callback fields
/// are added through [`IndexDeclaration::callback`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexDeclaration {
    /// Content types feeding this index
    #[serde(default, alias = "post_type")]
    pub source_types: Option<OneOrMany>,

    /// Statuses an item must have to be indexed
    #[serde(default)]
    pub statuses: Option<OneOrMany>,

    /// Ordered field list
    #[serde(default)]
    pub fields: Option<Vec<FieldDeclaration>>,

    /// Remote index settings, pushed verbatim
    #[serde(default)]
    pub settings: Option<Value>,
}

impl IndexDeclaration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source type.
    pub fn source_type(mut self, item_type: impl Into<String>) -> Self {
        let mut types = self.source_types.take().map(OneOrMany::into_vec).unwrap_or_default();
        types.push(item_type.into());
        self.source_types = Some(OneOrMany::Many(types));
        self
    }

    /// Add an accepted status.
    pub fn status(mut self, status: impl Into<String>) -> Self {
        let mut statuses = self.statuses.take().map(OneOrMany::into_vec).unwrap_or_default();
        statuses.push(status.into());
        self.statuses = Some(OneOrMany::Many(statuses));
        self
    }

    /// Append a field.
    pub fn field(mut self, id: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.get_or_insert_with(Vec::new).push(FieldDeclaration {
            id: id.into(),
            spec,
        });
        self
    }

    /// Append a field copied from the item attribute of the same name.
    pub fn direct(self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.field(id.clone(), FieldSpec::Direct(id))
    }

    /// Append a field read from the meta key of the same name.
    pub fn meta(self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.field(id.clone(), FieldSpec::Meta(id))
    }

    /// Append a callback field.
    pub fn callback<F>(self, id: impl Into<String>, f: F) -> Self
    where
        F: Fn(ItemId, &str) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.field(id, FieldSpec::callback(f))
    }

    /// Set the remote settings payload.
    pub fn settings(mut self, settings: Value) -> Self {
        self.settings = Some(settings);
        self
    }
}

/// Normalized, immutable definition of one index.
#[derive(Debug, Clone)]
pub struct IndexDefinition {
    /// Index key; the remote name is `prefix + name`
    pub name: String,
    pub source_types: BTreeSet<String>,
    pub statuses: Vec<String>,
    pub fields: Vec<(String, FieldSpec)>,
    pub remote_settings: Map<String, Value>,
}

impl IndexDefinition {
    /// Whether items of `item_type` feed this index.
    pub fn matches_type(&self, item_type: &str) -> bool {
        self.source_types.contains(item_type)
    }

    pub fn source_type_list(&self) -> Vec<String> {
        self.source_types.iter().cloned().collect()
    }

    pub fn has_remote_settings(&self) -> bool {
        !self.remote_settings.is_empty()
    }

    /// Name of the index on the remote service.
    pub fn remote_name(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.name)
    }
}
