use super::{ModelClass, OrmError, RelationLoader};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Load state of one relation on an instance.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationState {
    /// Not fetched yet; the ORM must be asked for it
    Unloaded,
    /// Materialized: an object for single relations, an array for to-many relations
    Loaded(Value),
}

/// A domain object of some [`ModelClass`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInstance {
    class: ModelClass,
    values: Map<String, Value>,
    relations: IndexMap<String, RelationState>,
}

impl ModelInstance {
    /// Fresh instance with field defaults applied and every relation unloaded.
    #[must_use]
    pub fn new(class: &ModelClass) -> Self {
        let mut values = Map::new();
        let mut relations = IndexMap::new();
        for field in class.meta().fields() {
            if field.is_relation() {
                relations.insert(field.name.clone(), RelationState::Unloaded);
            } else if let Some(default) = &field.default {
                values.insert(field.name.clone(), default.clone());
            }
        }
        ModelInstance {
            class: class.clone(),
            values,
            relations,
        }
    }

    #[must_use]
    pub fn class(&self) -> &ModelClass {
        &self.class
    }

    /// Bulk-assign values by field name.
    ///
    /// Data fields store the value, relational fields accept the related object
    /// (marking the relation loaded) and single relations also accept their raw
    /// id column (`author_id`).
    ///
    /// # Errors
    ///
    /// Names the model does not declare are rejected; nothing after the
    /// offending key is applied.
    pub fn update_from_dict(&mut self, values: Map<String, Value>) -> Result<&mut Self, OrmError> {
        for (key, value) in values {
            self.set(&key, value)?;
        }
        Ok(self)
    }

    /// Assign one value by field name or raw id column.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), OrmError> {
        let meta = self.class.meta();
        if let Some(field) = meta.field(name) {
            if field.is_relation() {
                if let (Some(column), Some(id)) = (field.source_field(), related_pk(&value)) {
                    self.values.insert(column, id);
                }
                self.relations
                    .insert(name.to_string(), RelationState::Loaded(value));
            } else {
                self.values.insert(name.to_string(), value);
            }
            return Ok(());
        }
        if meta.field_for_source(name).is_some() {
            self.values.insert(name.to_string(), value);
            return Ok(());
        }
        Err(OrmError::UnknownField {
            model: meta.name.clone(),
            field: name.to_string(),
        })
    }

    /// Data value or raw id column.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// All stored data values in assignment order.
    #[must_use]
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationState> {
        self.relations.get(name)
    }

    /// Names of relations that still need to be fetched.
    pub fn unloaded_relations(&self) -> impl Iterator<Item = &str> {
        self.relations
            .iter()
            .filter(|(_, state)| matches!(state, RelationState::Unloaded))
            .map(|(name, _)| name.as_str())
    }

    /// Record a materialized relation.
    pub fn set_relation(&mut self, name: &str, value: Value) -> Result<(), OrmError> {
        match self.class.meta().field(name) {
            Some(field) if field.is_relation() => {
                self.relations
                    .insert(name.to_string(), RelationState::Loaded(value));
                Ok(())
            }
            Some(_) => Err(OrmError::NotARelation {
                model: self.class.name().to_string(),
                field: name.to_string(),
            }),
            None => Err(OrmError::UnknownField {
                model: self.class.name().to_string(),
                field: name.to_string(),
            }),
        }
    }

    /// Materialize every unloaded relation through `loader`, one at a time.
    pub async fn fetch_related(&mut self, loader: &dyn RelationLoader) -> Result<(), OrmError> {
        let pending: Vec<String> = self.unloaded_relations().map(str::to_string).collect();
        for name in pending {
            let value = loader.fetch_related(self, &name).await?;
            self.set_relation(&name, value)?;
        }
        Ok(())
    }

    /// Primary key value, if assigned.
    #[must_use]
    pub fn pk(&self) -> Option<&Value> {
        let pk = self.class.meta().pk_field()?;
        self.values.get(&pk.name)
    }
}

fn related_pk(value: &Value) -> Option<Value> {
    match value {
        Value::Object(obj) => obj.get("id").cloned(),
        Value::Null => Some(Value::Null),
        _ => None,
    }
}

/// Typed structs backed by a [`ModelClass`].
///
/// Conversion goes through serde, so field names on the struct must match the
/// model's field names.
pub trait Model: Serialize + DeserializeOwned {
    fn model_class() -> ModelClass;

    /// Convert into an instance of [`Model::model_class`].
    fn to_instance(&self) -> Result<ModelInstance, OrmError> {
        let class = Self::model_class();
        let value = serde_json::to_value(self).map_err(|e| OrmError::Conversion {
            model: class.name().to_string(),
            message: e.to_string(),
        })?;
        let Value::Object(values) = value else {
            return Err(OrmError::Conversion {
                model: class.name().to_string(),
                message: "model did not serialize to an object".to_string(),
            });
        };
        let mut instance = ModelInstance::new(&class);
        instance.update_from_dict(values)?;
        Ok(instance)
    }

    /// Rebuild the typed struct from an instance's data values and loaded relations.
    fn from_instance(instance: &ModelInstance) -> Result<Self, OrmError> {
        let mut values = instance.values().clone();
        for (name, state) in &instance.relations {
            if let RelationState::Loaded(value) = state {
                values.insert(name.clone(), value.clone());
            }
        }
        serde_json::from_value(Value::Object(values)).map_err(|e| OrmError::Conversion {
            model: instance.class().name().to_string(),
            message: e.to_string(),
        })
    }
}
