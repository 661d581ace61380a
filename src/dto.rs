//! Data transfer objects derived from schema models or plugin-backed model
//! classes, with fields dropped, renamed or retyped.

use crate::error::{FrameworkError, Result};
use crate::orm::{ModelClass, ModelInstance};
use crate::plugins::{get_plugin_for_value, Plugin, SchemaContext, TypeHint};
use crate::schema::{SchemaField, SchemaInstance, SchemaModel, SchemaType};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// What a DTO is derived from.
#[derive(Debug, Clone)]
pub enum DtoSource {
    Schema(Arc<SchemaModel>),
    /// A model class handled by a registered plugin
    Model(ModelClass),
}

/// How a source field appears on the DTO.
#[derive(Debug, Clone)]
pub enum FieldMapping {
    Rename(String),
    /// New name and type
    Remap(String, SchemaType),
}

impl FieldMapping {
    fn target_name(&self) -> &str {
        match self {
            FieldMapping::Rename(name) | FieldMapping::Remap(name, _) => name,
        }
    }
}

/// Creates [`Dto`]s, resolving model classes through the given plugins.
#[derive(Default)]
pub struct DtoFactory {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl DtoFactory {
    #[must_use]
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        DtoFactory { plugins }
    }

    /// Build a DTO named `name` from `source`.
    ///
    /// `exclude` drops source fields, `field_mapping` renames or retypes them
    /// (keyed by source field name) and `field_definitions` adds fields the
    /// source does not have.
    ///
    /// # Errors
    ///
    /// `ImproperlyConfigured` when `source` is a model class no plugin supports.
    pub fn create(
        &self,
        name: &str,
        source: DtoSource,
        exclude: &[&str],
        field_mapping: HashMap<String, FieldMapping>,
        field_definitions: Vec<SchemaField>,
    ) -> Result<Dto> {
        let (source_schema, plugin) = match &source {
            DtoSource::Schema(schema) => (Arc::clone(schema), None),
            DtoSource::Model(class) => {
                let plugin = get_plugin_for_value(&TypeHint::model(class), &self.plugins)
                    .ok_or_else(|| {
                        FrameworkError::improperly_configured(format!(
                            "No plugin supports model class {} for DTO {name}",
                            class.name()
                        ))
                    })?;
                let schema = plugin.to_schema_model(class, SchemaContext::General)?;
                (schema, Some(Arc::clone(plugin)))
            }
        };

        let mut renames = IndexMap::new();
        let mut fields = Vec::with_capacity(source_schema.len() + field_definitions.len());
        for field in source_schema.fields() {
            if exclude.contains(&field.name.as_str()) {
                continue;
            }
            let mut field = field.clone();
            if let Some(mapping) = field_mapping.get(&field.name) {
                renames.insert(mapping.target_name().to_string(), field.name.clone());
                field.name = mapping.target_name().to_string();
                if let FieldMapping::Remap(_, ty) = mapping {
                    field.ty = ty.clone();
                }
            }
            fields.push(field);
        }
        fields.extend(field_definitions);

        let schema = Arc::new(SchemaModel::new(name, fields));
        info!(
            dto = name,
            source = source_schema.name(),
            fields = schema.len(),
            renamed = renames.len(),
            "DTO created"
        );
        Ok(Dto {
            schema,
            source,
            plugin,
            field_mapping: renames,
        })
    }
}

impl fmt::Debug for DtoFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.plugins.iter().map(|p| p.name()).collect();
        f.debug_struct("DtoFactory").field("plugins", &names).finish()
    }
}

/// A generated DTO: its schema model plus the way back to the source.
#[derive(Clone)]
pub struct Dto {
    schema: Arc<SchemaModel>,
    source: DtoSource,
    plugin: Option<Arc<dyn Plugin>>,
    /// DTO field name -> source field name
    field_mapping: IndexMap<String, String>,
}

impl Dto {
    #[must_use]
    pub fn schema(&self) -> &Arc<SchemaModel> {
        &self.schema
    }

    #[must_use]
    pub fn source(&self) -> &DtoSource {
        &self.source
    }

    /// Validate plain values as an instance of this DTO.
    pub fn parse(&self, values: Value) -> Result<SchemaInstance> {
        self.schema
            .validate(values)
            .map_err(FrameworkError::validation)
    }

    /// DTO instance holding the values of a source model instance.
    pub async fn from_model_instance(&self, instance: &ModelInstance) -> Result<SchemaInstance> {
        let plugin = self.source_plugin()?;
        let mut values = plugin.to_dict(instance).await?;
        for (dto_key, original_key) in &self.field_mapping {
            if let Some(value) = values.shift_remove(original_key) {
                values.insert(dto_key.clone(), value);
            }
        }
        debug!(dto = self.schema.name(), "DTO built from model instance");
        self.parse(Value::Object(values))
    }

    /// Values of a DTO instance keyed by source field names.
    #[must_use]
    pub fn to_source_values(&self, instance: &SchemaInstance) -> Map<String, Value> {
        let mut values = instance.dict().clone();
        for (dto_key, original_key) in &self.field_mapping {
            if let Some(value) = values.shift_remove(dto_key) {
                values.insert(original_key.clone(), value);
            }
        }
        values
    }

    /// Convert a DTO instance back into an instance of the source model class.
    pub fn to_model_instance(&self, instance: &SchemaInstance) -> Result<ModelInstance> {
        let DtoSource::Model(class) = &self.source else {
            return Err(FrameworkError::improperly_configured(format!(
                "DTO {} is not backed by a model class",
                self.schema.name()
            )));
        };
        let values = self.to_source_values(instance);
        self.source_plugin()?.from_dict(class, values)
    }

    /// Convert a DTO instance back into an instance of the source schema model.
    pub fn to_schema_instance(&self, instance: &SchemaInstance) -> Result<SchemaInstance> {
        let DtoSource::Schema(schema) = &self.source else {
            return Err(FrameworkError::improperly_configured(format!(
                "DTO {} is not backed by a schema model",
                self.schema.name()
            )));
        };
        schema
            .validate(Value::Object(self.to_source_values(instance)))
            .map_err(FrameworkError::validation)
    }

    fn source_plugin(&self) -> Result<&Arc<dyn Plugin>> {
        self.plugin.as_ref().ok_or_else(|| {
            FrameworkError::improperly_configured(format!(
                "DTO {} has no plugin for its source",
                self.schema.name()
            ))
        })
    }
}

impl fmt::Debug for Dto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dto")
            .field("schema", &self.schema.name())
            .field("source", &self.source)
            .field("field_mapping", &self.field_mapping)
            .finish()
    }
}
