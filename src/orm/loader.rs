use super::{ModelInstance, OrmError};
use async_trait::async_trait;
use serde_json::Value;

/// Asynchronous relation materialization, implemented by the ORM backend.
///
/// Single relations resolve to an object (or `null`), to-many relations to an
/// array of objects.
#[async_trait]
pub trait RelationLoader: Send + Sync {
    async fn fetch_related(
        &self,
        instance: &ModelInstance,
        relation: &str,
    ) -> Result<Value, OrmError>;
}

/// Loader for setups without a database: every relation comes back empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLoader;

#[async_trait]
impl RelationLoader for NoopLoader {
    async fn fetch_related(
        &self,
        instance: &ModelInstance,
        relation: &str,
    ) -> Result<Value, OrmError> {
        let field = instance
            .class()
            .meta()
            .field(relation)
            .ok_or_else(|| OrmError::UnknownField {
                model: instance.class().name().to_string(),
                field: relation.to_string(),
            })?;
        Ok(if field.is_to_many() {
            Value::Array(Vec::new())
        } else {
            Value::Null
        })
    }
}
