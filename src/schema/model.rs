use super::SchemaInstance;
use crate::error::ValidationIssue;
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

/// Type of a schema field.
#[derive(Debug, Clone)]
pub enum SchemaType {
    Integer,
    Number,
    Boolean,
    String {
        max_length: Option<usize>,
        format: Option<&'static str>,
    },
    /// Decimal text or a JSON number
    Decimal,
    /// Any JSON value
    Any,
    Array(Box<SchemaType>),
    /// Nested generated model
    Model(Arc<SchemaModel>),
}

impl SchemaType {
    #[must_use]
    pub fn string() -> Self {
        SchemaType::String {
            max_length: None,
            format: None,
        }
    }

    #[must_use]
    pub fn array_of(item: SchemaType) -> Self {
        SchemaType::Array(Box::new(item))
    }

    /// JSON Schema fragment for this type.
    #[must_use]
    pub fn json_schema(&self) -> Value {
        match self {
            SchemaType::Integer => json!({"type": "integer"}),
            SchemaType::Number => json!({"type": "number"}),
            SchemaType::Boolean => json!({"type": "boolean"}),
            SchemaType::String { max_length, format } => {
                let mut schema = json!({"type": "string"});
                if let Some(max) = max_length {
                    schema["maxLength"] = json!(max);
                }
                if let Some(format) = format {
                    schema["format"] = json!(format);
                }
                schema
            }
            SchemaType::Decimal => json!({"anyOf": [{"type": "string"}, {"type": "number"}]}),
            SchemaType::Any => json!({}),
            SchemaType::Array(item) => json!({"type": "array", "items": item.json_schema()}),
            SchemaType::Model(model) => model.json_schema(),
        }
    }
}

/// One field of a generated schema model.
#[derive(Debug, Clone)]
pub struct SchemaField {
    pub name: String,
    pub ty: SchemaType,
    pub required: bool,
    pub allow_none: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl SchemaField {
    /// Required, non-nullable field without a default.
    pub fn new(name: impl Into<String>, ty: SchemaType) -> Self {
        SchemaField {
            name: name.into(),
            ty,
            required: true,
            allow_none: false,
            default: None,
            description: None,
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.allow_none = true;
        self
    }

    /// Supplying a default makes the field optional.
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self.required = false;
        self
    }

    #[must_use]
    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    fn json_schema(&self) -> Value {
        let mut schema = self.ty.json_schema();
        if self.allow_none {
            schema = json!({"anyOf": [schema, {"type": "null"}]});
        }
        if let Some(description) = &self.description {
            schema["description"] = json!(description);
        }
        if let Some(default) = &self.default {
            schema["default"] = default.clone();
        }
        schema
    }
}

type FieldValidators = IndexMap<String, jsonschema::Validator>;

/// A generated validation model.
///
/// Fields may be adjusted with [`SchemaModel::field_mut`] until the model is
/// shared behind an `Arc`; after that it is immutable.
pub struct SchemaModel {
    name: String,
    fields: IndexMap<String, SchemaField>,
    validators: OnceCell<Result<FieldValidators, String>>,
}

impl SchemaModel {
    /// Later fields replace earlier fields of the same name.
    pub fn new(name: impl Into<String>, fields: Vec<SchemaField>) -> Self {
        SchemaModel {
            name: name.into(),
            fields: fields.into_iter().map(|f| (f.name.clone(), f)).collect(),
            validators: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.get(name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut SchemaField> {
        // field types feed the compiled validators
        self.validators = OnceCell::new();
        self.fields.get_mut(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &SchemaField> {
        self.fields.values()
    }

    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// JSON Schema object describing the model.
    #[must_use]
    pub fn json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .values()
            .map(|f| (f.name.clone(), f.json_schema()))
            .collect();
        let required: Vec<&str> = self
            .fields
            .values()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();
        let mut schema = json!({
            "title": self.name,
            "type": "object",
            "properties": properties,
        });
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }

    fn validators(&self) -> Result<&FieldValidators, String> {
        self.validators
            .get_or_init(|| {
                let mut compiled = IndexMap::with_capacity(self.fields.len());
                for field in self.fields.values() {
                    let schema = field.json_schema();
                    match jsonschema::validator_for(&schema) {
                        Ok(validator) => {
                            compiled.insert(field.name.clone(), validator);
                        }
                        Err(e) => {
                            error!(
                                model = %self.name,
                                field = %field.name,
                                error = %e,
                                "Failed to compile field schema"
                            );
                            return Err(format!("{}.{}: {}", self.name, field.name, e));
                        }
                    }
                }
                debug!(model = %self.name, fields = compiled.len(), "Compiled schema model validators");
                Ok(compiled)
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Validate `input` and produce an instance of this model.
    ///
    /// Missing optional fields take their default when one is declared and are
    /// left out otherwise. Keys the model does not declare are dropped.
    ///
    /// # Errors
    ///
    /// Every problem found is reported, each located by field name.
    pub fn validate(self: &Arc<Self>, input: Value) -> Result<SchemaInstance, Vec<ValidationIssue>> {
        let Value::Object(mut input) = input else {
            return Err(vec![ValidationIssue::new(
                self.name.clone(),
                format!("expected an object, got {}", json_kind(&input)),
            )]);
        };
        let validators = self
            .validators()
            .map_err(|e| vec![ValidationIssue::new(self.name.clone(), e)])?;

        let mut issues = Vec::new();
        let mut values = Map::new();
        for field in self.fields.values() {
            let value = match input.remove(&field.name) {
                Some(value) => value,
                None if field.required => {
                    issues.push(ValidationIssue::new(field.name.clone(), "field required"));
                    continue;
                }
                None => match &field.default {
                    Some(default) => default.clone(),
                    None => continue,
                },
            };
            if value.is_null() && !field.allow_none {
                issues.push(ValidationIssue::new(
                    field.name.clone(),
                    "none is not an allowed value",
                ));
                continue;
            }
            if let Some(validator) = validators.get(&field.name) {
                let before = issues.len();
                issues.extend(
                    validator
                        .iter_errors(&value)
                        .map(|e| ValidationIssue::new(field.name.clone(), e.to_string())),
                );
                if issues.len() > before {
                    continue;
                }
            }
            values.insert(field.name.clone(), value);
        }

        if issues.is_empty() {
            Ok(SchemaInstance::new(Arc::clone(self), values))
        } else {
            debug!(model = %self.name, issues = issues.len(), "Schema validation failed");
            Err(issues)
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl fmt::Debug for SchemaModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaModel")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish()
    }
}
