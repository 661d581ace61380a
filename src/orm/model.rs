use super::{OrmError, OrmField};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a model class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(u64);

impl ModelId {
    fn next() -> Self {
        ModelId(NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model#{}", self.0)
    }
}

/// Model metadata: the model name and its fields in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMeta {
    pub name: String,
    pub fields_map: IndexMap<String, OrmField>,
}

impl ModelMeta {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&OrmField> {
        self.fields_map.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &OrmField> {
        self.fields_map.values()
    }

    #[must_use]
    pub fn pk_field(&self) -> Option<&OrmField> {
        self.fields_map.values().find(|f| f.pk)
    }

    /// Find the relational field whose raw id column is `column` (`owner_id` -> `owner`).
    #[must_use]
    pub fn field_for_source(&self, column: &str) -> Option<&OrmField> {
        self.fields_map
            .values()
            .find(|f| f.source_field().as_deref() == Some(column))
    }
}

/// Shared handle on a model's metadata.
///
/// Cloning is cheap. Two handles are equal only when they come from the same
/// [`ModelClassBuilder::build`] call, regardless of the model name.
#[derive(Clone)]
pub struct ModelClass {
    id: ModelId,
    meta: Arc<ModelMeta>,
}

impl ModelClass {
    pub fn builder(name: impl Into<String>) -> ModelClassBuilder {
        ModelClassBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> ModelId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    #[must_use]
    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }
}

impl PartialEq for ModelClass {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ModelClass {}

impl Hash for ModelClass {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelClass")
            .field("id", &self.id)
            .field("name", &self.meta.name)
            .field("fields", &self.meta.fields_map.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`ModelClass`].
#[derive(Debug)]
pub struct ModelClassBuilder {
    name: String,
    fields: Vec<OrmField>,
}

impl ModelClassBuilder {
    #[must_use]
    pub fn field(mut self, field: OrmField) -> Self {
        self.fields.push(field);
        self
    }

    /// Validate the declaration and assign the class its identity.
    ///
    /// # Errors
    ///
    /// Duplicate field names and anything other than exactly one primary key
    /// are rejected.
    pub fn build(self) -> Result<ModelClass, OrmError> {
        let mut fields_map = IndexMap::with_capacity(self.fields.len());
        for field in self.fields {
            if fields_map.contains_key(&field.name) {
                return Err(OrmError::DuplicateField {
                    model: self.name,
                    field: field.name,
                });
            }
            fields_map.insert(field.name.clone(), field);
        }
        match fields_map.values().filter(|f| f.pk).count() {
            0 => return Err(OrmError::MissingPrimaryKey { model: self.name }),
            1 => {}
            _ => return Err(OrmError::MultiplePrimaryKeys { model: self.name }),
        }
        Ok(ModelClass {
            id: ModelId::next(),
            meta: Arc::new(ModelMeta {
                name: self.name,
                fields_map,
            }),
        })
    }
}

/// Name lookup for model classes, used to resolve relation targets.
///
/// Populated during application setup; reads dominate afterwards.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: Arc<RwLock<HashMap<String, ModelClass>>>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class under its model name, replacing any previous entry.
    pub fn register(&self, class: &ModelClass) -> &Self {
        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        models.insert(class.name().to_string(), class.clone());
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<ModelClass> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Registered classes, ordered by model name.
    #[must_use]
    pub fn classes(&self) -> Vec<ModelClass> {
        let models = self.models.read().unwrap_or_else(PoisonError::into_inner);
        let mut classes: Vec<ModelClass> = models.values().cloned().collect();
        classes.sort_by(|a, b| a.name().cmp(b.name()));
        classes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let models = self.models.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ModelRegistry")
            .field("models", &models.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> ModelClass {
        ModelClass::builder("User")
            .field(OrmField::int("id").pk().generated())
            .field(OrmField::text("email", Some(120)))
            .build()
            .unwrap()
    }

    #[test]
    fn test_identity_is_per_build() {
        let a = user();
        let b = user();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.name(), b.name());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = ModelClass::builder("User")
            .field(OrmField::int("id").pk())
            .field(OrmField::text("email", None))
            .field(OrmField::text("email", None))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            OrmError::DuplicateField {
                model: "User".into(),
                field: "email".into()
            }
        );
    }

    #[test]
    fn test_primary_key_required() {
        let err = ModelClass::builder("Tag")
            .field(OrmField::text("label", None))
            .build()
            .unwrap_err();
        assert!(matches!(err, OrmError::MissingPrimaryKey { .. }));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ModelRegistry::new();
        let class = user();
        registry.register(&class);
        assert_eq!(registry.get("User"), Some(class));
        assert!(registry.get("Missing").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_field_for_source_column() {
        let post = ModelClass::builder("Post")
            .field(OrmField::int("id").pk())
            .field(OrmField::foreign_key("author", "User"))
            .build()
            .unwrap();
        let field = post.meta().field_for_source("author_id").unwrap();
        assert_eq!(field.name, "author");
        assert!(post.meta().field_for_source("id").is_none());
    }
}
