use super::SchemaModel;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Values that passed validation against a [`SchemaModel`].
#[derive(Debug, Clone)]
pub struct SchemaInstance {
    model: Arc<SchemaModel>,
    values: Map<String, Value>,
}

impl SchemaInstance {
    pub(crate) fn new(model: Arc<SchemaModel>, values: Map<String, Value>) -> Self {
        SchemaInstance { model, values }
    }

    /// The model that produced this instance.
    #[must_use]
    pub fn model(&self) -> &Arc<SchemaModel> {
        &self.model
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Validated values keyed by field name.
    #[must_use]
    pub fn dict(&self) -> &Map<String, Value> {
        &self.values
    }

    #[must_use]
    pub fn into_dict(self) -> Map<String, Value> {
        self.values
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

impl PartialEq for SchemaInstance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.model, &other.model) && self.values == other.values
    }
}
