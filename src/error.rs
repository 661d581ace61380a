use crate::orm::OrmError;
use http::StatusCode;
use std::fmt;

/// A single validation problem found while resolving request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Where the problem was found (`query.limit`, `body.name`, ...)
    pub location: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Errors surfaced by the framework layer.
///
/// Every variant maps onto an HTTP status through [`FrameworkError::status_code`],
/// so a host server can turn any failure into a response without inspecting it.
#[derive(Debug)]
pub enum FrameworkError {
    /// An optional integration was requested but its cargo feature is disabled.
    MissingDependency {
        feature: String,
        extras: Vec<String>,
    },
    /// The template engine could not locate the named template.
    TemplateNotFound {
        /// The exact name that was requested
        template_name: String,
    },
    /// Request data failed validation against a generated schema model.
    Validation {
        detail: String,
        issues: Vec<ValidationIssue>,
    },
    /// The application wiring is inconsistent (duplicate parameters, unsupported
    /// model types, unserializable responses).
    ImproperlyConfigured { detail: String },
    /// Model metadata or instance manipulation failed.
    Orm(OrmError),
}

impl FrameworkError {
    pub fn improperly_configured(detail: impl Into<String>) -> Self {
        FrameworkError::ImproperlyConfigured {
            detail: detail.into(),
        }
    }

    pub fn template_not_found(template_name: impl Into<String>) -> Self {
        FrameworkError::TemplateNotFound {
            template_name: template_name.into(),
        }
    }

    pub fn validation(issues: Vec<ValidationIssue>) -> Self {
        let detail = match issues.len() {
            1 => "Validation failed: 1 issue".to_string(),
            n => format!("Validation failed: {n} issues"),
        };
        FrameworkError::Validation { detail, issues }
    }

    /// HTTP status a host server should answer with for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            FrameworkError::Validation { .. } => StatusCode::BAD_REQUEST,
            FrameworkError::Orm(OrmError::UnknownField { .. }) => StatusCode::BAD_REQUEST,
            FrameworkError::MissingDependency { .. }
            | FrameworkError::TemplateNotFound { .. }
            | FrameworkError::ImproperlyConfigured { .. }
            | FrameworkError::Orm(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Human readable detail, as it would appear in an error response body.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            FrameworkError::MissingDependency { feature, extras } => {
                let extras_repr = match extras.as_slice() {
                    [] => String::new(),
                    [only] => format!("'{only}'"),
                    [init @ .., last] => {
                        let head: Vec<String> = init.iter().map(|e| format!("'{e}'")).collect();
                        format!("{} or '{}'", head.join(", "), last)
                    }
                };
                let first = extras.first().map(String::as_str).unwrap_or_default();
                format!(
                    "To use {feature}, install starling with the {extras_repr} feature:\n\
                     e.g. `cargo add starling --features {first}`"
                )
            }
            FrameworkError::TemplateNotFound { template_name } => {
                format!("Template {template_name} not found.")
            }
            FrameworkError::Validation { detail, .. } => detail.clone(),
            FrameworkError::ImproperlyConfigured { detail } => detail.clone(),
            FrameworkError::Orm(err) => err.to_string(),
        }
    }

    /// JSON body for an error response, including validation issues when present.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "status_code": self.status_code().as_u16(),
            "detail": self.detail(),
        });
        if let FrameworkError::Validation { issues, .. } = self {
            body["extra"] = issues
                .iter()
                .map(|i| serde_json::json!({"loc": i.location, "msg": i.message}))
                .collect();
        }
        body
    }
}

impl fmt::Display for FrameworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameworkError::MissingDependency { .. } => write!(f, "{}", self.detail()),
            _ => write!(f, "{} - {}", self.status_code().as_u16(), self.detail()),
        }
    }
}

impl std::error::Error for FrameworkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FrameworkError::Orm(err) => Some(err),
            _ => None,
        }
    }
}

impl From<OrmError> for FrameworkError {
    fn from(err: OrmError) -> Self {
        FrameworkError::Orm(err)
    }
}

/// Result alias used across the crate.
pub type Result<T, E = FrameworkError> = std::result::Result<T, E>;
