//! # Template Module
//!
//! Adapter contract for template engines and the Jinja implementation.
//!
//! Engines hand out template handles by name; a handle renders with any
//! serializable context. A missing template is always reported as
//! [`FrameworkError::TemplateNotFound`] carrying the exact requested name,
//! whatever the engine's own error looks like.

#[cfg(feature = "jinja")]
mod jinja;

#[cfg(feature = "jinja")]
pub use jinja::{JinjaTemplate, JinjaTemplateEngine};

use crate::error::{FrameworkError, Result};
use crate::extras::JINJA;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// A loaded template.
pub trait Template {
    /// Render with `context`, usually a JSON object.
    fn render(&self, context: &serde_json::Value) -> Result<String>;
}

/// Engine-specific template loading.
pub trait TemplateEngine: Send + Sync {
    type Template: Template;

    /// # Errors
    ///
    /// `TemplateNotFound` when no template of that name exists.
    fn get_template(&self, name: &str) -> Result<Self::Template>;
}

/// Object-safe view of any [`TemplateEngine`], used where the engine is chosen
/// at runtime.
pub trait TemplateRenderer: Send + Sync {
    fn render_template(&self, name: &str, context: &serde_json::Value) -> Result<String>;
}

impl<E: TemplateEngine> TemplateRenderer for E {
    fn render_template(&self, name: &str, context: &serde_json::Value) -> Result<String> {
        self.get_template(name)?.render(context)
    }
}

/// Supported template engines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateEngineKind {
    #[default]
    Jinja,
}

/// Template configuration: where templates live and which engine renders them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Directories searched in order
    #[serde(deserialize_with = "one_or_many")]
    pub directory: Vec<PathBuf>,
    #[serde(default)]
    pub engine: TemplateEngineKind,
}

impl TemplateConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        TemplateConfig {
            directory: vec![directory.into()],
            engine: TemplateEngineKind::default(),
        }
    }

    /// Instantiate the configured engine.
    ///
    /// # Errors
    ///
    /// `MissingDependency` when the engine's cargo feature is disabled and
    /// `ImproperlyConfigured` when no directory is configured.
    pub fn to_engine(&self) -> Result<Arc<dyn TemplateRenderer>> {
        if self.directory.is_empty() {
            return Err(FrameworkError::improperly_configured(
                "Template configuration needs at least one directory",
            ));
        }
        match self.engine {
            TemplateEngineKind::Jinja => {
                JINJA.require()?;
                jinja_engine(&self.directory)
            }
        }
    }
}

#[cfg(feature = "jinja")]
fn jinja_engine(directories: &[PathBuf]) -> Result<Arc<dyn TemplateRenderer>> {
    Ok(Arc::new(JinjaTemplateEngine::new(directories.to_vec())))
}

#[cfg(not(feature = "jinja"))]
fn jinja_engine(_: &[PathBuf]) -> Result<Arc<dyn TemplateRenderer>> {
    JINJA.require()?;
    Err(FrameworkError::improperly_configured("jinja engine unavailable"))
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(PathBuf),
        Many(Vec<PathBuf>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(path) => vec![path],
        OneOrMany::Many(paths) => paths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_accepts_one_or_many() {
        let one: TemplateConfig = serde_json::from_str(r#"{"directory": "templates"}"#).unwrap();
        assert_eq!(one.directory, vec![PathBuf::from("templates")]);
        assert_eq!(one.engine, TemplateEngineKind::Jinja);

        let many: TemplateConfig =
            serde_json::from_str(r#"{"directory": ["a", "b"], "engine": "jinja"}"#).unwrap();
        assert_eq!(many.directory.len(), 2);
    }

    #[test]
    fn test_empty_directory_list_rejected() {
        let config = TemplateConfig {
            directory: vec![],
            engine: TemplateEngineKind::Jinja,
        };
        assert!(matches!(
            config.to_engine(),
            Err(FrameworkError::ImproperlyConfigured { .. })
        ));
    }

    #[cfg(not(feature = "jinja"))]
    #[test]
    fn test_disabled_engine_is_missing_dependency() {
        assert!(matches!(
            TemplateConfig::new("templates").to_engine(),
            Err(FrameworkError::MissingDependency { .. })
        ));
    }
}
