//! Plugin for [`crate::orm`] models.
//!
//! Generated schema models are memoized per `(model, context)` for the lifetime
//! of the plugin. There is no eviction: the cache is bounded by the number of
//! model classes times the three contexts.

use super::{Plugin, SchemaContext, TypeHint};
use crate::error::Result;
use crate::orm::{
    DataType, FieldKind, ModelClass, ModelId, ModelInstance, ModelRegistry, NoopLoader,
    OrmField, RelationLoader, RelationState,
};
use crate::schema::{SchemaField, SchemaInstance, SchemaModel, SchemaType};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

type SchemaKey = (ModelId, SchemaContext);

/// Maps ORM models onto schema models and back.
pub struct OrmPlugin {
    registry: ModelRegistry,
    loader: Arc<dyn RelationLoader>,
    schemas: RwLock<HashMap<SchemaKey, Arc<SchemaModel>>>,
}

impl OrmPlugin {
    /// Plugin resolving relation targets through `registry`. Relations are
    /// loaded with [`NoopLoader`] until [`OrmPlugin::with_loader`] is used.
    #[must_use]
    pub fn new(registry: ModelRegistry) -> Self {
        OrmPlugin {
            registry,
            loader: Arc::new(NoopLoader),
            schemas: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_loader(mut self, loader: Arc<dyn RelationLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Generate the general and request body schema of every registered model.
    ///
    /// Returns the number of schema models in the cache afterwards.
    pub fn precompile(&self) -> Result<usize> {
        let classes = self.registry.classes();
        for class in &classes {
            self.to_schema_model(class, SchemaContext::General)?;
            self.to_schema_model(class, SchemaContext::RequestBody)?;
        }
        let cached = self.cached_schema_count();
        info!(models = classes.len(), cached, "Schema models precompiled");
        Ok(cached)
    }

    /// Number of memoized schema models.
    #[must_use]
    pub fn cached_schema_count(&self) -> usize {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn schema_name(model: &ModelClass, context: SchemaContext) -> String {
        match context {
            SchemaContext::General => model.name().to_string(),
            SchemaContext::RequestBody => format!("{}RequestBody", model.name()),
            SchemaContext::Nested => format!("{}Nested", model.name()),
        }
    }

    /// Fields dropped from request bodies: anything relational, the primary
    /// key and values the database produces.
    fn excluded_from_body(field: &OrmField) -> bool {
        field.is_relation() || field.pk || field.read_only || field.generated
    }

    fn data_type(ty: &DataType) -> SchemaType {
        match ty {
            DataType::Int | DataType::BigInt => SchemaType::Integer,
            DataType::Float => SchemaType::Number,
            DataType::Bool => SchemaType::Boolean,
            DataType::Text { max_length } => SchemaType::String {
                max_length: *max_length,
                format: None,
            },
            DataType::Decimal => SchemaType::Decimal,
            DataType::Uuid => SchemaType::String {
                max_length: None,
                format: Some("uuid"),
            },
            DataType::Date => SchemaType::String {
                max_length: None,
                format: Some("date"),
            },
            DataType::DateTime => SchemaType::String {
                max_length: None,
                format: Some("date-time"),
            },
            DataType::Json => SchemaType::Any,
        }
    }

    /// Type of the raw id column backing a single relation: the target's
    /// primary key type when the target is registered.
    fn source_type(&self, field: &OrmField) -> SchemaType {
        field
            .related_model()
            .and_then(|name| self.registry.get(name))
            .and_then(|target| match target.meta().pk_field().map(|pk| &pk.kind) {
                Some(FieldKind::Data(ty)) => Some(Self::data_type(ty)),
                _ => None,
            })
            .unwrap_or(SchemaType::Integer)
    }

    fn relation_type(&self, field: &OrmField) -> Result<SchemaType> {
        let nested = match field.related_model().and_then(|name| self.registry.get(name)) {
            Some(target) => {
                SchemaType::Model(self.to_schema_model(&target, SchemaContext::Nested)?)
            }
            None => {
                warn!(
                    field = %field.name,
                    kind = field.kind.label(),
                    target = field.related_model().unwrap_or_default(),
                    "Related model is not registered, relation accepts any value"
                );
                SchemaType::Any
            }
        };
        Ok(if field.is_to_many() {
            SchemaType::array_of(nested)
        } else {
            nested
        })
    }

    /// Fields as a schema generator would emit them: required unless a default
    /// is declared, never nullable.
    fn generate_fields(
        &self,
        model: &ModelClass,
        context: SchemaContext,
    ) -> Result<Vec<SchemaField>> {
        let mut fields = Vec::new();
        for orm_field in model.meta().fields() {
            if context == SchemaContext::RequestBody && Self::excluded_from_body(orm_field) {
                if let Some(column) = orm_field.source_field() {
                    if !orm_field.read_only {
                        fields.push(SchemaField::new(column, self.source_type(orm_field)));
                    }
                }
                continue;
            }
            let ty = match &orm_field.kind {
                FieldKind::Data(ty) => Some(Self::data_type(ty)),
                // nested objects stop at their id columns
                _ if context == SchemaContext::Nested => None,
                _ => Some(self.relation_type(orm_field)?),
            };
            if let Some(ty) = ty {
                let mut field = SchemaField::new(orm_field.name.clone(), ty);
                if let Some(default) = &orm_field.default {
                    field = field.with_default(default.clone());
                }
                if let Some(description) = &orm_field.description {
                    field = field.with_description(description.clone());
                }
                fields.push(field);
            }
            if let Some(column) = orm_field.source_field() {
                fields.push(SchemaField::new(column, self.source_type(orm_field)));
            }
        }
        Ok(fields)
    }

    /// Align generated flags with the ORM's own constraints. Relations and
    /// their id columns follow the relation field.
    fn patch_constraints(schema: &mut SchemaModel, model: &ModelClass, context: SchemaContext) {
        for orm_field in model.meta().fields() {
            let mut names = vec![orm_field.name.clone()];
            names.extend(orm_field.source_field());
            for name in names {
                let Some(field) = schema.field_mut(&name) else {
                    continue;
                };
                let relation = orm_field.is_relation() && name == orm_field.name;
                if !orm_field.required() || relation {
                    field.required = false;
                }
                // a single related object may be absent
                if orm_field.null || relation && !orm_field.is_to_many() {
                    field.allow_none = true;
                }
                if context == SchemaContext::RequestBody {
                    field.required = false;
                }
            }
        }
    }

    fn create_schema_model(&self, model: &ModelClass, context: SchemaContext) -> Result<SchemaModel> {
        let fields = self.generate_fields(model, context)?;
        let mut schema = SchemaModel::new(Self::schema_name(model, context), fields);
        Self::patch_constraints(&mut schema, model, context);
        Ok(schema)
    }

    fn export_value(instance: &ModelInstance, field: &SchemaField) -> Value {
        if let Some(value) = instance.get(&field.name) {
            return value.clone();
        }
        match instance.relation(&field.name) {
            Some(RelationState::Loaded(value)) => Self::project(value, &field.ty),
            _ => field.default.clone().unwrap_or(Value::Null),
        }
    }

    /// Keep only the keys the nested schema declares, so loaded rows match the
    /// advertised shape.
    fn project(value: &Value, ty: &SchemaType) -> Value {
        match (value, ty) {
            (Value::Object(row), SchemaType::Model(nested)) => Value::Object(
                nested
                    .fields()
                    .filter_map(|f| row.get(&f.name).map(|v| (f.name.clone(), v.clone())))
                    .collect(),
            ),
            (Value::Array(items), SchemaType::Array(item)) => {
                Value::Array(items.iter().map(|v| Self::project(v, item)).collect())
            }
            _ => value.clone(),
        }
    }
}

#[async_trait]
impl Plugin for OrmPlugin {
    fn is_plugin_supported_type(&self, value: &TypeHint) -> bool {
        matches!(value, TypeHint::Model(_))
    }

    fn to_schema_model(
        &self,
        model: &ModelClass,
        context: SchemaContext,
    ) -> Result<Arc<SchemaModel>> {
        let key = (model.id(), context);
        {
            let schemas = self.schemas.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(schema) = schemas.get(&key) {
                debug!(
                    model = model.name(),
                    context = ?context,
                    "Schema model cache hit"
                );
                return Ok(Arc::clone(schema));
            }
        }

        // Generated outside the lock; generation recurses for nested relations.
        let schema = Arc::new(self.create_schema_model(model, context)?);
        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = schemas.get(&key) {
            debug!(
                model = model.name(),
                context = ?context,
                "Schema model generated concurrently, keeping first"
            );
            return Ok(Arc::clone(existing));
        }
        schemas.insert(key, Arc::clone(&schema));
        info!(
            model = model.name(),
            context = ?context,
            schema = schema.name(),
            fields = schema.len(),
            cache_size = schemas.len(),
            "Schema model generated and cached"
        );
        Ok(schema)
    }

    fn from_schema_instance(
        &self,
        model: &ModelClass,
        instance: &SchemaInstance,
    ) -> Result<ModelInstance> {
        self.from_dict(model, instance.dict().clone())
    }

    async fn to_dict(&self, instance: &ModelInstance) -> Result<Map<String, Value>> {
        let schema = self.to_schema_model(instance.class(), SchemaContext::General)?;
        let mut loaded;
        let instance = if instance.unloaded_relations().next().is_some() {
            loaded = instance.clone();
            loaded.fetch_related(self.loader.as_ref()).await?;
            &loaded
        } else {
            instance
        };
        Ok(schema
            .fields()
            .map(|field| (field.name.clone(), Self::export_value(instance, field)))
            .collect())
    }

    fn from_dict(&self, model: &ModelClass, values: Map<String, Value>) -> Result<ModelInstance> {
        let mut instance = ModelInstance::new(model);
        instance.update_from_dict(values)?;
        Ok(instance)
    }

    fn name(&self) -> &'static str {
        "OrmPlugin"
    }
}

impl Default for OrmPlugin {
    fn default() -> Self {
        Self::new(ModelRegistry::new())
    }
}

impl fmt::Debug for OrmPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrmPlugin")
            .field("registry", &self.registry)
            .field("cached_schemas", &self.cached_schema_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameworkError;
    use serde_json::json;

    fn registry() -> (ModelRegistry, ModelClass, ModelClass) {
        let tournament = ModelClass::builder("Tournament")
            .field(OrmField::int("id").pk().generated())
            .field(OrmField::text("name", Some(255)))
            .field(OrmField::datetime("created").generated().read_only())
            .field(OrmField::reverse_relation("events", "Event"))
            .build()
            .unwrap();
        let event = ModelClass::builder("Event")
            .field(OrmField::int("id").pk().generated())
            .field(OrmField::text("name", Some(255)))
            .field(OrmField::foreign_key("tournament", "Tournament"))
            .field(OrmField::text("notes", None).null())
            .field(OrmField::int("prize").default_value(0))
            .build()
            .unwrap();
        let registry = ModelRegistry::new();
        registry.register(&tournament).register(&event);
        (registry, tournament, event)
    }

    #[test]
    fn test_general_schema_nests_relations() {
        let (registry, tournament, event) = registry();
        let plugin = OrmPlugin::new(registry);
        let schema = plugin
            .to_schema_model(&tournament, SchemaContext::General)
            .unwrap();
        assert_eq!(schema.name(), "Tournament");
        assert_eq!(schema.field_names(), vec!["id", "name", "created", "events"]);
        match &schema.field("events").unwrap().ty {
            SchemaType::Array(item) => match item.as_ref() {
                SchemaType::Model(nested) => {
                    assert_eq!(nested.name(), "EventNested");
                    assert!(nested.field("tournament").is_none());
                    assert!(nested.field("tournament_id").is_some());
                }
                other => panic!("unexpected item type {other:?}"),
            },
            other => panic!("unexpected type {other:?}"),
        }
        let event_schema = plugin.to_schema_model(&event, SchemaContext::General).unwrap();
        assert!(!event_schema.field("tournament").unwrap().required);
        assert!(event_schema.field("tournament_id").unwrap().required);
    }

    #[test]
    fn test_request_body_excludes_relations_and_keys() {
        let (registry, tournament, event) = registry();
        let plugin = OrmPlugin::new(registry);
        let body = plugin
            .to_schema_model(&tournament, SchemaContext::RequestBody)
            .unwrap();
        assert_eq!(body.name(), "TournamentRequestBody");
        assert_eq!(body.field_names(), vec!["name"]);

        let body = plugin
            .to_schema_model(&event, SchemaContext::RequestBody)
            .unwrap();
        assert_eq!(
            body.field_names(),
            vec!["name", "tournament_id", "notes", "prize"]
        );
        assert!(body.fields().all(|f| !f.required));
    }

    #[test]
    fn test_constraints_mirror_orm_flags() {
        let (registry, _, event) = registry();
        let plugin = OrmPlugin::new(registry);
        let schema = plugin.to_schema_model(&event, SchemaContext::General).unwrap();
        for orm_field in event.meta().fields() {
            let Some(field) = schema.field(&orm_field.name) else {
                continue;
            };
            if !orm_field.required() {
                assert!(!field.required, "{} should be optional", field.name);
            }
            if orm_field.null {
                assert!(field.allow_none, "{} should allow null", field.name);
            }
        }
        assert!(schema.field("name").unwrap().required);
        assert!(!schema.field("name").unwrap().allow_none);
        assert_eq!(schema.field("prize").unwrap().default, Some(json!(0)));
    }

    #[test]
    fn test_memoization_returns_same_arc() {
        let (registry, tournament, _) = registry();
        let plugin = OrmPlugin::new(registry);
        let a = plugin
            .to_schema_model(&tournament, SchemaContext::General)
            .unwrap();
        let b = plugin
            .to_schema_model(&tournament, SchemaContext::General)
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let body = plugin
            .to_schema_model(&tournament, SchemaContext::RequestBody)
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &body));
        // Tournament, EventNested and TournamentRequestBody
        assert_eq!(plugin.cached_schema_count(), 3);
    }

    #[test]
    fn test_precompile_covers_registry() {
        let (registry, tournament, event) = registry();
        let plugin = OrmPlugin::new(registry);
        // General, RequestBody and Nested for each model
        assert_eq!(plugin.precompile().unwrap(), 6);
        let body = plugin
            .to_schema_model(&event, SchemaContext::RequestBody)
            .unwrap();
        assert_eq!(body.name(), "EventRequestBody");
        assert_eq!(plugin.cached_schema_count(), 6);
        assert!(plugin
            .to_schema_model(&tournament, SchemaContext::Nested)
            .is_ok());
    }

    #[test]
    fn test_supported_types() {
        let (registry, tournament, _) = registry();
        let plugin = OrmPlugin::new(registry);
        assert!(plugin.is_plugin_supported_type(&TypeHint::model(&tournament)));
        assert!(!plugin.is_plugin_supported_type(&TypeHint::Any));
        assert!(!plugin.is_plugin_supported_type(&TypeHint::list_of(TypeHint::model(&tournament))));
    }

    #[test]
    fn test_from_dict_rejects_unknown_field() {
        let (registry, _, event) = registry();
        let plugin = OrmPlugin::new(registry);
        let mut values = Map::new();
        values.insert("bogus".into(), json!(1));
        assert!(matches!(
            plugin.from_dict(&event, values),
            Err(FrameworkError::Orm(_))
        ));
    }

    #[test]
    fn test_from_schema_instance_round_trips_body() {
        let (registry, _, event) = registry();
        let plugin = OrmPlugin::new(registry);
        let body = plugin
            .to_schema_model(&event, SchemaContext::RequestBody)
            .unwrap();
        let validated = body
            .validate(json!({"name": "Final", "tournament_id": 2}))
            .unwrap();
        let instance = plugin.from_schema_instance(&event, &validated).unwrap();
        assert_eq!(instance.get("name"), Some(&json!("Final")));
        assert_eq!(instance.get("tournament_id"), Some(&json!(2)));
        assert_eq!(instance.get("prize"), Some(&json!(0)));
    }

    #[test]
    fn test_decimal_accepts_text_and_numbers() {
        let item = ModelClass::builder("Item")
            .field(OrmField::int("id").pk().generated())
            .field(OrmField::decimal("price"))
            .build()
            .unwrap();
        let registry = ModelRegistry::new();
        registry.register(&item);
        let plugin = OrmPlugin::new(registry);
        let body = plugin
            .to_schema_model(&item, SchemaContext::RequestBody)
            .unwrap();
        assert!(body.validate(json!({"price": "1.5"})).is_ok());
        assert!(body.validate(json!({"price": 1.5})).is_ok());
        let issues = body.validate(json!({"price": true})).unwrap_err();
        assert_eq!(issues[0].location, "price");
    }
}
