use crate::error::Result;
use crate::orm::{ModelClass, ModelInstance};
use crate::schema::{SchemaInstance, SchemaModel};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Usage context a schema model is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaContext {
    /// Every field, relations nested; used for responses and non-body parameters
    General,
    /// Request body (`data`) parameters: no relations, primary keys or read-only
    /// fields, and every field optional
    RequestBody,
    /// Data fields only; the shape of a related object nested in another model
    Nested,
}

impl SchemaContext {
    /// Context for a handler parameter; the request body is conventionally `data`.
    #[must_use]
    pub fn for_parameter(name: &str) -> Self {
        if name == "data" {
            SchemaContext::RequestBody
        } else {
            SchemaContext::General
        }
    }
}

/// Scalar types a handler parameter can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Int,
    Float,
    Bool,
    Str,
    Json,
}

/// Generic type constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericOrigin {
    List,
    Tuple,
    Set,
    Optional,
}

/// A value of indeterminate type, as handed to [`get_plugin_for_value`].
///
/// Covers declared parameter types (`Model`, `Generic`) as well as literal
/// sequences of them (`Sequence`).
#[derive(Debug, Clone, PartialEq)]
pub enum TypeHint {
    Any,
    Scalar(ScalarType),
    Model(ModelClass),
    /// A literal list or tuple value
    Sequence(Vec<TypeHint>),
    Generic {
        origin: GenericOrigin,
        args: Vec<TypeHint>,
    },
}

impl TypeHint {
    #[must_use]
    pub fn model(class: &ModelClass) -> Self {
        TypeHint::Model(class.clone())
    }

    #[must_use]
    pub fn list_of(inner: TypeHint) -> Self {
        TypeHint::Generic {
            origin: GenericOrigin::List,
            args: vec![inner],
        }
    }

    #[must_use]
    pub fn optional(inner: TypeHint) -> Self {
        TypeHint::Generic {
            origin: GenericOrigin::Optional,
            args: vec![inner],
        }
    }

    /// `List[..]`, `Tuple[..]` or `Set[..]`.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            TypeHint::Generic {
                origin: GenericOrigin::List | GenericOrigin::Tuple | GenericOrigin::Set,
                ..
            }
        )
    }

    #[must_use]
    pub fn is_optional(&self) -> bool {
        matches!(
            self,
            TypeHint::Generic {
                origin: GenericOrigin::Optional,
                ..
            }
        )
    }

    /// First generic argument, or `self` for non-generic hints.
    #[must_use]
    pub fn first_arg(&self) -> &TypeHint {
        match self {
            TypeHint::Generic { args, .. } => args.first().unwrap_or(self),
            _ => self,
        }
    }
}

impl From<&ModelInstance> for TypeHint {
    fn from(instance: &ModelInstance) -> Self {
        TypeHint::Model(instance.class().clone())
    }
}

/// Capability contract for model-mapping adapters.
///
/// One implementation exists per supported model library. Implementations must
/// be cheap to share: the framework holds them as `Arc<dyn Plugin>` and calls
/// them from concurrent requests.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Pure type check: can this plugin map `value`?
    fn is_plugin_supported_type(&self, value: &TypeHint) -> bool;

    /// Schema model for `model` in `context`.
    ///
    /// Must be deterministic and memoized: the same `(model, context)` pair
    /// always yields the same `Arc`.
    fn to_schema_model(
        &self,
        model: &ModelClass,
        context: SchemaContext,
    ) -> Result<Arc<SchemaModel>>;

    /// Rebuild a domain instance from a validated schema instance.
    fn from_schema_instance(
        &self,
        model: &ModelClass,
        instance: &SchemaInstance,
    ) -> Result<ModelInstance>;

    /// Serializable values of a domain instance.
    async fn to_dict(&self, instance: &ModelInstance) -> Result<Map<String, Value>>;

    /// Create a domain instance from plain values.
    fn from_dict(&self, model: &ModelClass, values: Map<String, Value>) -> Result<ModelInstance>;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// First plugin, in registration order, able to handle `value`.
///
/// A non-empty sequence is represented by its first element and a generic hint
/// by its first argument (`List[Event]` is looked up as `Event`).
#[must_use]
pub fn get_plugin_for_value<'a>(
    value: &TypeHint,
    plugins: &'a [Arc<dyn Plugin>],
) -> Option<&'a Arc<dyn Plugin>> {
    if plugins.is_empty() {
        return None;
    }
    let value = match value {
        TypeHint::Sequence(items) => items.first().unwrap_or(value),
        _ => value,
    };
    let value = value.first_arg();
    plugins.iter().find(|p| p.is_plugin_supported_type(value))
}

/// Validated value of a plugin-backed parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaValue {
    One(SchemaInstance),
    /// A list or tuple of instances, in request order
    Many(Vec<SchemaInstance>),
}

/// Domain value produced from a [`SchemaValue`].
#[derive(Debug, Clone, PartialEq)]
pub enum ModelValue {
    One(ModelInstance),
    Many(Vec<ModelInstance>),
}

impl ModelValue {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ModelValue::One(_) => 1,
            ModelValue::Many(items) => items.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn as_one(&self) -> Option<&ModelInstance> {
        match self {
            ModelValue::One(instance) => Some(instance),
            ModelValue::Many(_) => None,
        }
    }

    #[must_use]
    pub fn as_many(&self) -> Option<&[ModelInstance]> {
        match self {
            ModelValue::Many(items) => Some(items.as_slice()),
            ModelValue::One(_) => None,
        }
    }
}

/// A plugin paired with the model class a handler parameter declared.
#[derive(Clone)]
pub struct PluginMapping {
    pub plugin: Arc<dyn Plugin>,
    pub model_class: ModelClass,
}

impl PluginMapping {
    pub fn new(plugin: Arc<dyn Plugin>, model_class: ModelClass) -> Self {
        PluginMapping {
            plugin,
            model_class,
        }
    }

    /// Convert validated schema values back into instances of `model_class`,
    /// element-wise for sequences.
    pub fn get_value_converted_to_model_class(&self, value: SchemaValue) -> Result<ModelValue> {
        match value {
            SchemaValue::One(instance) => Ok(ModelValue::One(self.get_instance(&instance)?)),
            SchemaValue::Many(items) => items
                .iter()
                .map(|item| self.get_instance(item))
                .collect::<Result<Vec<_>>>()
                .map(ModelValue::Many),
        }
    }

    fn get_instance(&self, value: &SchemaInstance) -> Result<ModelInstance> {
        self.plugin.from_schema_instance(&self.model_class, value)
    }
}

impl fmt::Debug for PluginMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginMapping")
            .field("plugin", &self.plugin.name())
            .field("model_class", &self.model_class.name())
            .finish()
    }
}
