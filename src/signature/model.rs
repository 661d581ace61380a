use super::request::{decode_param_value, RequestData};
use crate::error::{FrameworkError, Result, ValidationIssue};
use crate::orm::ModelClass;
use crate::plugins::{
    get_plugin_for_value, GenericOrigin, ModelValue, Plugin, PluginMapping, ScalarType,
    SchemaContext, SchemaValue, TypeHint,
};
use crate::schema::{SchemaField, SchemaInstance, SchemaModel, SchemaType};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a handler parameter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamSource {
    Path,
    Query,
    Header,
    Cookie,
    /// The JSON request body, conventionally the `data` parameter
    Body,
}

impl ParamSource {
    fn label(self) -> &'static str {
        match self {
            ParamSource::Path => "path",
            ParamSource::Query => "query",
            ParamSource::Header => "header",
            ParamSource::Cookie => "cookie",
            ParamSource::Body => "body",
        }
    }
}

/// A declared handler parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub source: ParamSource,
    pub hint: TypeHint,
    pub required: bool,
    pub default: Option<Value>,
}

impl ParameterSpec {
    /// Required parameter.
    pub fn new(name: impl Into<String>, source: ParamSource, hint: TypeHint) -> Self {
        ParameterSpec {
            name: name.into(),
            source,
            hint,
            required: true,
            default: None,
        }
    }

    /// The request body parameter, `data`.
    pub fn body(hint: TypeHint) -> Self {
        Self::new("data", ParamSource::Body, hint)
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self.required = false;
        self
    }
}

/// A resolved keyword argument.
#[derive(Debug, Clone, PartialEq)]
pub enum KwargValue {
    Value(Value),
    /// Domain instances produced by a plugin
    Model(ModelValue),
}

/// Keyword arguments for a handler, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Kwargs {
    values: IndexMap<String, KwargValue>,
}

impl Kwargs {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&KwargValue> {
        self.values.get(name)
    }

    /// Plain JSON value of a parameter that is not plugin backed.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.values.get(name)? {
            KwargValue::Value(value) => Some(value),
            KwargValue::Model(_) => None,
        }
    }

    #[must_use]
    pub fn model(&self, name: &str) -> Option<&ModelValue> {
        match self.values.get(name)? {
            KwargValue::Model(model) => Some(model),
            KwargValue::Value(_) => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KwargValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn into_inner(self) -> IndexMap<String, KwargValue> {
        self.values
    }
}

/// Model class a plugin-backed hint refers to.
fn model_class_of(hint: &TypeHint) -> Option<&ModelClass> {
    let hint = match hint {
        TypeHint::Sequence(items) => items.first()?,
        other => other,
    };
    match hint.first_arg() {
        TypeHint::Model(class) => Some(class),
        _ => None,
    }
}

fn is_many(hint: &TypeHint) -> bool {
    hint.is_collection() || matches!(hint, TypeHint::Sequence(_))
}

fn scalar_type(hint: &TypeHint) -> Option<SchemaType> {
    Some(match hint {
        TypeHint::Any => SchemaType::Any,
        TypeHint::Scalar(ScalarType::Int) => SchemaType::Integer,
        TypeHint::Scalar(ScalarType::Float) => SchemaType::Number,
        TypeHint::Scalar(ScalarType::Bool) => SchemaType::Boolean,
        TypeHint::Scalar(ScalarType::Str) => SchemaType::string(),
        TypeHint::Scalar(ScalarType::Json) => SchemaType::Any,
        TypeHint::Sequence(items) => match items.first() {
            Some(first) => SchemaType::array_of(scalar_type(first)?),
            None => SchemaType::array_of(SchemaType::Any),
        },
        TypeHint::Generic { origin, args } => {
            let inner = match args.first() {
                Some(arg) => scalar_type(arg)?,
                None => SchemaType::Any,
            };
            match origin {
                GenericOrigin::Optional => inner,
                GenericOrigin::List | GenericOrigin::Tuple | GenericOrigin::Set => {
                    SchemaType::array_of(inner)
                }
            }
        }
        TypeHint::Model(_) => return None,
    })
}

/// Validation model for a handler's parameters.
///
/// Created once per handler at registration. Plugin-backed parameters carry a
/// [`PluginMapping`] so validated values come back as domain instances.
pub struct SignatureModel {
    handler_name: String,
    schema: Arc<SchemaModel>,
    params: Vec<ParameterSpec>,
    plugin_mappings: HashMap<String, PluginMapping>,
    /// Schema of each plugin-backed parameter's element type
    plugin_schemas: HashMap<String, Arc<SchemaModel>>,
}

impl SignatureModel {
    /// Build the signature model for `handler_name`.
    ///
    /// # Errors
    ///
    /// `ImproperlyConfigured` for duplicate parameter names and for model
    /// parameters that no registered plugin supports.
    pub fn create(
        handler_name: &str,
        params: Vec<ParameterSpec>,
        plugins: &[Arc<dyn Plugin>],
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(params.len());
        let mut plugin_mappings = HashMap::new();
        let mut plugin_schemas = HashMap::new();

        for param in &params {
            if !seen.insert(param.name.as_str()) {
                return Err(FrameworkError::improperly_configured(format!(
                    "Duplicate parameter '{}' in handler '{handler_name}'",
                    param.name
                )));
            }

            let ty = match get_plugin_for_value(&param.hint, plugins) {
                Some(plugin) => {
                    let Some(class) = model_class_of(&param.hint) else {
                        return Err(FrameworkError::improperly_configured(format!(
                            "Plugin {} accepted parameter '{}' without a model class",
                            plugin.name(),
                            param.name
                        )));
                    };
                    let context = if param.source == ParamSource::Body {
                        SchemaContext::for_parameter(&param.name)
                    } else {
                        SchemaContext::General
                    };
                    let schema = plugin.to_schema_model(class, context)?;
                    debug!(
                        handler = handler_name,
                        param = %param.name,
                        plugin = plugin.name(),
                        schema = schema.name(),
                        "Parameter mapped through plugin"
                    );
                    plugin_schemas.insert(param.name.clone(), Arc::clone(&schema));
                    plugin_mappings.insert(
                        param.name.clone(),
                        PluginMapping::new(Arc::clone(plugin), class.clone()),
                    );
                    // element shape is checked per item against the plugin
                    // schema so issues keep their index and field
                    if is_many(&param.hint) {
                        SchemaType::array_of(SchemaType::Any)
                    } else {
                        SchemaType::Any
                    }
                }
                None => scalar_type(&param.hint).ok_or_else(|| {
                    FrameworkError::improperly_configured(format!(
                        "No plugin supports the model type of parameter '{}' in handler '{handler_name}'",
                        param.name
                    ))
                })?,
            };

            let mut field = SchemaField::new(param.name.clone(), ty);
            if !param.required {
                field = field.optional();
            }
            if let Some(default) = &param.default {
                field = field.with_default(default.clone());
            }
            if param.hint.is_optional() {
                field = field.nullable();
            }
            fields.push(field);
        }

        let schema = Arc::new(SchemaModel::new(format!("{handler_name}_signature"), fields));
        info!(
            handler = handler_name,
            params = params.len(),
            plugin_mappings = plugin_mappings.len(),
            "Signature model created"
        );
        Ok(SignatureModel {
            handler_name: handler_name.to_string(),
            schema,
            params,
            plugin_mappings,
            plugin_schemas,
        })
    }

    #[must_use]
    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<SchemaModel> {
        &self.schema
    }

    #[must_use]
    pub fn params(&self) -> &[ParameterSpec] {
        &self.params
    }

    #[must_use]
    pub fn plugin_mapping(&self, name: &str) -> Option<&PluginMapping> {
        self.plugin_mappings.get(name)
    }

    fn raw_value(&self, param: &ParameterSpec, request: &RequestData) -> Option<Value> {
        let ty = &self.schema.field(&param.name)?.ty;
        let raw: Vec<&str> = match param.source {
            ParamSource::Body => return request.body.clone(),
            ParamSource::Path => request.get_path_param(&param.name).into_iter().collect(),
            ParamSource::Query => request.get_query_params(&param.name).collect(),
            ParamSource::Header => request.get_header(&param.name).into_iter().collect(),
            ParamSource::Cookie => request.get_cookie(&param.name).into_iter().collect(),
        };
        if raw.is_empty() {
            None
        } else {
            Some(decode_param_value(&raw, ty))
        }
    }

    fn locate(&self, issue: ValidationIssue) -> ValidationIssue {
        match self.params.iter().find(|p| p.name == issue.location) {
            Some(param) => ValidationIssue::new(
                format!("{}.{}", param.source.label(), param.name),
                issue.message,
            ),
            None => issue,
        }
    }

    /// Validate a plugin-backed value against the plugin's schema, element-wise
    /// for arrays.
    fn schema_value(
        &self,
        param: &ParameterSpec,
        schema: &Arc<SchemaModel>,
        value: Value,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<SchemaValue> {
        let prefix = format!("{}.{}", param.source.label(), param.name);
        let mut check = |value: Value, location: String| match schema.validate(value) {
            Ok(instance) => Some(instance),
            Err(found) => {
                issues.extend(found.into_iter().map(|i| {
                    // whole-value issues are located by the model name
                    if i.location == schema.name() {
                        ValidationIssue::new(location.clone(), i.message)
                    } else {
                        ValidationIssue::new(format!("{location}.{}", i.location), i.message)
                    }
                }));
                None
            }
        };
        match value {
            Value::Array(items) if is_many(&param.hint) => {
                let mut instances: Vec<SchemaInstance> = Vec::with_capacity(items.len());
                let mut failed = false;
                for (idx, item) in items.into_iter().enumerate() {
                    match check(item, format!("{prefix}.{idx}")) {
                        Some(instance) => instances.push(instance),
                        None => failed = true,
                    }
                }
                (!failed).then_some(SchemaValue::Many(instances))
            }
            other => check(other, prefix).map(SchemaValue::One),
        }
    }

    /// Resolve handler keyword arguments from a request.
    ///
    /// # Errors
    ///
    /// `Validation` (400) listing every problem found, or the plugin's error
    /// when converting validated values to domain instances fails.
    pub fn parse_values(&self, request: &RequestData) -> Result<Kwargs> {
        let mut raw = Map::new();
        for param in &self.params {
            if let Some(value) = self.raw_value(param, request) {
                raw.insert(param.name.clone(), value);
            }
        }

        let validated = self.schema.validate(Value::Object(raw)).map_err(|issues| {
            let issues: Vec<ValidationIssue> =
                issues.into_iter().map(|i| self.locate(i)).collect();
            warn!(
                request_id = %request.request_id,
                handler = %self.handler_name,
                issues = ?issues,
                "Request parameters failed validation"
            );
            FrameworkError::validation(issues)
        })?;

        let mut issues = Vec::new();
        let mut values = IndexMap::with_capacity(self.params.len());
        let mut dict = validated.into_dict();
        for param in &self.params {
            let Some(value) = dict.remove(&param.name) else {
                continue;
            };
            match (
                self.plugin_mappings.get(&param.name),
                self.plugin_schemas.get(&param.name),
            ) {
                (Some(mapping), Some(schema)) if !value.is_null() => {
                    if let Some(schema_value) =
                        self.schema_value(param, schema, value, &mut issues)
                    {
                        let model = mapping.get_value_converted_to_model_class(schema_value)?;
                        values.insert(param.name.clone(), KwargValue::Model(model));
                    }
                }
                _ => {
                    values.insert(param.name.clone(), KwargValue::Value(value));
                }
            }
        }
        if !issues.is_empty() {
            warn!(
                request_id = %request.request_id,
                handler = %self.handler_name,
                issues = ?issues,
                "Plugin-backed parameters failed validation"
            );
            return Err(FrameworkError::validation(issues));
        }

        debug!(
            request_id = %request.request_id,
            handler = %self.handler_name,
            kwargs = values.len(),
            "Request parameters resolved"
        );
        Ok(Kwargs { values })
    }
}

impl fmt::Debug for SignatureModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureModel")
            .field("handler_name", &self.handler_name)
            .field("schema", &self.schema.name())
            .field("params", &self.params)
            .field("plugin_mappings", &self.plugin_mappings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::request::parse_query_params;
    use http::Method;
    use serde_json::json;

    fn request(query: &str, body: Option<Value>) -> RequestData {
        RequestData {
            request_id: crate::ids::RequestId::new(),
            method: Method::GET,
            path: "/items".into(),
            path_params: [(Arc::from("item_id"), "7".to_string())].into_iter().collect(),
            query_params: parse_query_params(query),
            headers: [(Arc::from("x-token"), "secret".to_string())].into_iter().collect(),
            cookies: Default::default(),
            body,
        }
    }

    fn scalar_signature() -> SignatureModel {
        SignatureModel::create(
            "get_item",
            vec![
                ParameterSpec::new("item_id", ParamSource::Path, TypeHint::Scalar(ScalarType::Int)),
                ParameterSpec::new("limit", ParamSource::Query, TypeHint::Scalar(ScalarType::Int))
                    .with_default(json!(20)),
                ParameterSpec::new(
                    "tags",
                    ParamSource::Query,
                    TypeHint::list_of(TypeHint::Scalar(ScalarType::Str)),
                )
                .optional(),
                ParameterSpec::new("x-token", ParamSource::Header, TypeHint::Scalar(ScalarType::Str)),
            ],
            &[],
        )
        .unwrap()
    }

    #[test]
    fn test_signature_model_name_and_fields() {
        let signature = scalar_signature();
        assert_eq!(signature.schema().name(), "get_item_signature");
        assert_eq!(
            signature.schema().field_names(),
            vec!["item_id", "limit", "tags", "x-token"]
        );
    }

    #[test]
    fn test_parse_scalar_values() {
        let kwargs = scalar_signature()
            .parse_values(&request("tags=a&tags=b", None))
            .unwrap();
        assert_eq!(kwargs.value("item_id"), Some(&json!(7)));
        assert_eq!(kwargs.value("limit"), Some(&json!(20)));
        assert_eq!(kwargs.value("tags"), Some(&json!(["a", "b"])));
        assert_eq!(kwargs.value("x-token"), Some(&json!("secret")));
    }

    #[test]
    fn test_invalid_value_is_located() {
        let err = scalar_signature()
            .parse_values(&request("limit=many", None))
            .unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
        match err {
            FrameworkError::Validation { issues, .. } => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].location, "query.limit");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_parameter_rejected() {
        let err = SignatureModel::create(
            "dup",
            vec![
                ParameterSpec::new("a", ParamSource::Query, TypeHint::Any),
                ParameterSpec::new("a", ParamSource::Header, TypeHint::Any),
            ],
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, FrameworkError::ImproperlyConfigured { .. }));
    }

    #[test]
    fn test_model_without_plugin_rejected() {
        let class = ModelClass::builder("Lonely")
            .field(crate::orm::OrmField::int("id").pk())
            .build()
            .unwrap();
        let err = SignatureModel::create(
            "lonely",
            vec![ParameterSpec::body(TypeHint::model(&class))],
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, FrameworkError::ImproperlyConfigured { .. }));
    }
}
