//! Response marshaling: turn handler return values into status, content type
//! and body bytes.

use crate::error::{FrameworkError, Result};
use crate::orm::ModelInstance;
use crate::plugins::{get_plugin_for_value, Plugin, TypeHint};
use crate::template::TemplateRenderer;
use futures::future::try_join_all;
use http::{header, HeaderValue, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

/// What a handler returned.
#[derive(Debug, Clone)]
pub enum ResponseContent {
    Json(Value),
    /// A domain instance, exported through its plugin
    Model(ModelInstance),
    Models(Vec<ModelInstance>),
    Template {
        name: String,
        context: Value,
    },
    Empty,
}

/// A marshaled response, ready for the host server to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Vec<u8>,
}

impl Response {
    /// Render `content` with `status`.
    ///
    /// # Errors
    ///
    /// `ImproperlyConfigured` when the content cannot be serialized, a model has
    /// no supporting plugin or a template is requested without an engine;
    /// `TemplateNotFound` from the engine.
    pub async fn marshal(
        content: ResponseContent,
        status: StatusCode,
        plugins: &[Arc<dyn Plugin>],
        templates: Option<&dyn TemplateRenderer>,
    ) -> Result<Self> {
        let json = HeaderValue::from_static("application/json");
        let response = match content {
            ResponseContent::Empty if status == StatusCode::NO_CONTENT => Response {
                status,
                content_type: None,
                body: Vec::new(),
            },
            ResponseContent::Empty => Response {
                status,
                content_type: Some(json),
                body: to_json_bytes(&Value::Null)?,
            },
            ResponseContent::Json(value) => Response {
                status,
                content_type: Some(json),
                body: to_json_bytes(&value)?,
            },
            ResponseContent::Model(instance) => {
                let value = export(&instance, plugins).await?;
                Response {
                    status,
                    content_type: Some(json),
                    body: to_json_bytes(&value)?,
                }
            }
            ResponseContent::Models(instances) => {
                let values =
                    try_join_all(instances.iter().map(|i| export(i, plugins))).await?;
                Response {
                    status,
                    content_type: Some(json),
                    body: to_json_bytes(&Value::Array(values))?,
                }
            }
            ResponseContent::Template { name, context } => {
                let engine = templates.ok_or_else(|| {
                    FrameworkError::improperly_configured(format!(
                        "Template {name} requested but no template engine is configured"
                    ))
                })?;
                let html = engine.render_template(&name, &context)?;
                Response {
                    status,
                    content_type: Some(HeaderValue::from_static("text/html; charset=utf-8")),
                    body: html.into_bytes(),
                }
            }
        };
        debug!(
            status = response.status.as_u16(),
            body_bytes = response.body.len(),
            "Response marshaled"
        );
        Ok(response)
    }

    /// Error response with the JSON body of [`FrameworkError::to_json`].
    #[must_use]
    pub fn from_error(err: &FrameworkError) -> Self {
        let body = serde_json::to_vec(&err.to_json()).unwrap_or_default();
        Response {
            status: err.status_code(),
            content_type: Some(HeaderValue::from_static("application/json")),
            body,
        }
    }

    /// Convert into an `http::Response` for hosts built on the `http` crate.
    #[must_use]
    pub fn into_http(self) -> http::Response<Vec<u8>> {
        let mut response = http::Response::new(self.body);
        *response.status_mut() = self.status;
        if let Some(content_type) = self.content_type {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, content_type);
        }
        response
    }
}

async fn export(instance: &ModelInstance, plugins: &[Arc<dyn Plugin>]) -> Result<Value> {
    let plugin = get_plugin_for_value(&TypeHint::from(instance), plugins).ok_or_else(|| {
        FrameworkError::improperly_configured(format!(
            "No plugin supports response model {}",
            instance.class().name()
        ))
    })?;
    Ok(Value::Object(plugin.to_dict(instance).await?))
}

fn to_json_bytes(value: &Value) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        error!(error = %e, "Response serialization failed");
        FrameworkError::improperly_configured("Unable to serialize response content")
    })
}
