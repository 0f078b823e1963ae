//! Index registry.
//!
//! Declarations are registered explicitly during startup, from code or
//! from the `[indexes.<name>]` config tables. [`IndexRegistry::load_definitions`]
//! normalizes them once into an immutable [`IndexDefinitions`] that the
//! engines receive at construction.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use sync_types::{
    IndexDeclaration, IndexDefinition, OneOrMany, Settings, DEFAULT_SOURCE_TYPE, DEFAULT_STATUS,
};

use crate::error::IndexingError;

/// Field id reserved for the document key.
const OBJECT_ID_FIELD: &str = "objectID";

/// Index names end up in storage keys and remote index names.
fn validate_name(name: &str) -> Result<(), IndexingError> {
    if name.is_empty() {
        return Err(IndexingError::Registry("index name is empty".to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(IndexingError::Registry(format!(
            "index name {:?} may only contain letters, digits, '_' and '-'",
            name
        )));
    }
    Ok(())
}

/// Collects index declarations before the engines start.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    declarations: BTreeMap<String, IndexDeclaration>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-filled with the `[indexes.*]` tables of the settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, IndexingError> {
        let mut registry = Self::new();
        for (name, declaration) in &settings.indexes {
            registry.register(name.clone(), declaration.clone())?;
        }
        Ok(registry)
    }

    /// Register a declaration under `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        declaration: IndexDeclaration,
    ) -> Result<&mut Self, IndexingError> {
        let name = name.into();
        validate_name(&name)?;
        if self.declarations.contains_key(&name) {
            return Err(IndexingError::Registry(format!(
                "duplicate index name: {}",
                name
            )));
        }
        debug!(index = %name, "Registered index declaration");
        self.declarations.insert(name, declaration);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Normalize every declaration into its definition.
    pub fn load_definitions(&self) -> Result<IndexDefinitions, IndexingError> {
        let mut definitions = BTreeMap::new();
        for (name, declaration) in &self.declarations {
            definitions.insert(name.clone(), normalize(name, declaration.clone())?);
        }
        info!(count = definitions.len(), "Loaded index definitions");
        Ok(IndexDefinitions {
            inner: Arc::new(definitions),
        })
    }
}

/// Turn a raw declaration into an immutable definition.
///
/// - missing source types become `{"post"}`; a bare type becomes a set of one
/// - missing statuses become `["publish"]`
/// - missing fields become an empty list
/// - missing or non-object settings become an empty map
pub fn normalize(name: &str, declaration: IndexDeclaration) -> Result<IndexDefinition, IndexingError> {
    validate_name(name)?;

    let source_types: BTreeSet<String> = match declaration.source_types {
        Some(types) => types.into_vec().into_iter().collect(),
        None => BTreeSet::from([DEFAULT_SOURCE_TYPE.to_string()]),
    };
    if source_types.is_empty() {
        warn!(index = %name, "Index declares no source types and will never match");
    }

    let mut statuses = Vec::new();
    for status in declaration
        .statuses
        .map(OneOrMany::into_vec)
        .unwrap_or_else(|| vec![DEFAULT_STATUS.to_string()])
    {
        if !statuses.contains(&status) {
            statuses.push(status);
        }
    }

    let mut seen = HashSet::new();
    let mut fields = Vec::new();
    for field in declaration.fields.unwrap_or_default() {
        if field.id == OBJECT_ID_FIELD {
            return Err(IndexingError::Registry(format!(
                "index {}: field id {} is reserved",
                name, OBJECT_ID_FIELD
            )));
        }
        if !seen.insert(field.id.clone()) {
            return Err(IndexingError::Registry(format!(
                "index {}: duplicate field {}",
                name, field.id
            )));
        }
        fields.push((field.id, field.spec));
    }

    let remote_settings = match declaration.settings {
        None => Map::new(),
        Some(Value::Object(map)) => map,
        Some(other) => {
            warn!(index = %name, settings = %other, "Ignoring non-object index settings");
            Map::new()
        }
    };

    Ok(IndexDefinition {
        name: name.to_string(),
        source_types,
        statuses,
        fields,
        remote_settings,
    })
}

/// Immutable, cheaply cloneable set of index definitions.
///
/// Iteration is in name order.
#[derive(Debug, Clone, Default)]
pub struct IndexDefinitions {
    inner: Arc<BTreeMap<String, IndexDefinition>>,
}

impl IndexDefinitions {
    pub fn get(&self, name: &str) -> Option<&IndexDefinition> {
        self.inner.get(name)
    }

    /// Definition for `name`, or [`IndexingError::UnknownIndex`].
    pub fn require(&self, name: &str) -> Result<&IndexDefinition, IndexingError> {
        self.get(name)
            .ok_or_else(|| IndexingError::UnknownIndex(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexDefinition> {
        self.inner.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.keys().cloned().collect()
    }

    /// Definitions whose source types include `item_type`.
    pub fn matching_type<'a>(
        &'a self,
        item_type: &'a str,
    ) -> impl Iterator<Item = &'a IndexDefinition> + 'a {
        self.inner.values().filter(move |def| def.matches_type(item_type))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sync_types::FieldSpec;

    #[test]
    fn test_defaults_applied() {
        let def = normalize("posts", IndexDeclaration::new()).unwrap();
        assert_eq!(def.source_type_list(), vec!["post".to_string()]);
        assert_eq!(def.statuses, vec!["publish".to_string()]);
        assert!(def.fields.is_empty());
        assert!(!def.has_remote_settings());
    }

    #[test]
    fn test_bare_type_wrapped() {
        let decl = IndexDeclaration {
            source_types: Some(OneOrMany::from("product")),
            ..Default::default()
        };
        let def = normalize("products", decl).unwrap();
        assert!(def.matches_type("product"));
        assert_eq!(def.source_types.len(), 1);
    }

    #[test]
    fn test_non_object_settings_ignored() {
        let decl = IndexDeclaration::new().settings(json!(["not", "a", "map"]));
        let def = normalize("posts", decl).unwrap();
        assert!(def.remote_settings.is_empty());

        let decl = IndexDeclaration::new().settings(json!({"customRanking": ["desc(date)"]}));
        let def = normalize("posts", decl).unwrap();
        assert_eq!(def.remote_settings.get("customRanking"), Some(&json!(["desc(date)"])));
    }

    #[test]
    fn test_field_order_preserved() {
        let decl = IndexDeclaration::new()
            .meta("price")
            .direct("post_title")
            .callback("url", |_, _| Ok(json!("/x")));
        let def = normalize("products", decl).unwrap();
        let ids: Vec<_> = def.fields.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["price", "post_title", "url"]);
        assert!(matches!(def.fields[0].1, FieldSpec::Meta(ref key) if key == "price"));
    }

    #[test]
    fn test_reserved_and_duplicate_fields_rejected() {
        let decl = IndexDeclaration::new().direct("objectID");
        assert!(matches!(
            normalize("posts", decl),
            Err(IndexingError::Registry(_))
        ));

        let decl = IndexDeclaration::new().direct("post_title").meta("post_title");
        assert!(matches!(
            normalize("posts", decl),
            Err(IndexingError::Registry(_))
        ));
    }

    #[test]
    fn test_register_validates_names() {
        let mut registry = IndexRegistry::new();
        registry.register("posts", IndexDeclaration::new()).unwrap();

        assert!(registry.register("posts", IndexDeclaration::new()).is_err());
        assert!(registry.register("", IndexDeclaration::new()).is_err());
        assert!(registry.register("bad:name", IndexDeclaration::new()).is_err());
        assert!(registry.register("with space", IndexDeclaration::new()).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_definitions_lookup() {
        let mut registry = IndexRegistry::new();
        registry
            .register("posts", IndexDeclaration::new())
            .unwrap()
            .register(
                "everything",
                IndexDeclaration::new().source_type("post").source_type("page"),
            )
            .unwrap();

        let defs = registry.load_definitions().unwrap();
        assert_eq!(defs.names(), vec!["everything".to_string(), "posts".to_string()]);
        assert_eq!(defs.matching_type("page").count(), 1);
        assert_eq!(defs.matching_type("post").count(), 2);
        assert_eq!(defs.matching_type("attachment").count(), 0);
        assert!(matches!(
            defs.require("missing"),
            Err(IndexingError::UnknownIndex(_))
        ));
    }

    #[test]
    fn test_from_settings() {
        let mut settings = Settings::default();
        settings.indexes.insert(
            "products".to_string(),
            IndexDeclaration::new().source_type("product").meta("price"),
        );
        let registry = IndexRegistry::from_settings(&settings).unwrap();
        let defs = registry.load_definitions().unwrap();
        assert!(defs.get("products").unwrap().matches_type("product"));
    }
}
