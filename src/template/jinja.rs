use super::{Template, TemplateEngine};
use crate::error::{FrameworkError, Result};
use minijinja::{path_loader, AutoEscape, Environment, ErrorKind};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Jinja templates loaded from one or more directories.
///
/// Directories are searched in order; the first one holding the requested
/// name wins. Every template is HTML-autoescaped, whatever its extension.
pub struct JinjaTemplateEngine {
    env: Arc<Environment<'static>>,
    directories: Vec<PathBuf>,
}

impl JinjaTemplateEngine {
    pub fn new(directories: Vec<PathBuf>) -> Self {
        let loaders: Vec<_> = directories.iter().map(|dir| path_loader(dir.clone())).collect();
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.set_loader(move |name| {
            for loader in &loaders {
                if let Some(source) = loader(name)? {
                    return Ok(Some(source));
                }
            }
            Ok(None)
        });
        JinjaTemplateEngine {
            env: Arc::new(env),
            directories,
        }
    }

    #[must_use]
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }
}

impl TemplateEngine for JinjaTemplateEngine {
    type Template = JinjaTemplate;

    fn get_template(&self, name: &str) -> Result<JinjaTemplate> {
        match self.env.get_template(name) {
            Ok(_) => {
                debug!(template = name, "Template loaded");
                Ok(JinjaTemplate {
                    env: Arc::clone(&self.env),
                    name: name.to_string(),
                })
            }
            Err(e) if e.kind() == ErrorKind::TemplateNotFound => {
                warn!(template = name, directories = ?self.directories, "Template not found");
                Err(FrameworkError::template_not_found(name))
            }
            Err(e) => Err(FrameworkError::improperly_configured(format!(
                "Unable to load template {name}: {e}"
            ))),
        }
    }
}

impl fmt::Debug for JinjaTemplateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JinjaTemplateEngine")
            .field("directories", &self.directories)
            .finish()
    }
}

/// Handle to a template of a [`JinjaTemplateEngine`].
#[derive(Clone)]
pub struct JinjaTemplate {
    env: Arc<Environment<'static>>,
    name: String,
}

impl JinjaTemplate {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Template for JinjaTemplate {
    fn render(&self, context: &serde_json::Value) -> Result<String> {
        let render_error = |e: minijinja::Error| {
            FrameworkError::improperly_configured(format!(
                "Unable to render template {}: {e}",
                self.name
            ))
        };
        self.env
            .get_template(&self.name)
            .map_err(render_error)?
            .render(context)
            .map_err(render_error)
    }
}

impl fmt::Debug for JinjaTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JinjaTemplate").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    #[test]
    fn test_missing_template_carries_name() {
        let dir = tempfile::tempdir().unwrap();
        let engine = JinjaTemplateEngine::new(vec![dir.path().to_path_buf()]);
        match engine.get_template("nope.html") {
            Err(FrameworkError::TemplateNotFound { template_name }) => {
                assert_eq!(template_name, "nope.html");
            }
            other => panic!("expected TemplateNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_directories_searched_in_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(first.path().join("a.html"), "first {{ name }}").unwrap();
        fs::write(second.path().join("a.html"), "second").unwrap();
        fs::write(second.path().join("b.html"), "only second").unwrap();
        let engine = JinjaTemplateEngine::new(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);
        let a = engine.get_template("a.html").unwrap();
        assert_eq!(a.render(&json!({"name": "x"})).unwrap(), "first x");
        let b = engine.get_template("b.html").unwrap();
        assert_eq!(b.render(&json!({})).unwrap(), "only second");
    }

    #[test]
    fn test_html_is_autoescaped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("page.html"), "<p>{{ body }}</p>").unwrap();
        let engine = JinjaTemplateEngine::new(vec![dir.path().to_path_buf()]);
        let out = engine
            .get_template("page.html")
            .unwrap()
            .render(&json!({"body": "<b>hi</b>"}))
            .unwrap();
        assert_eq!(out, "<p>&lt;b&gt;hi&lt;&#x2f;b&gt;</p>");
    }

    #[test]
    fn test_any_extension_is_autoescaped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("page.jinja"), "<p>{{ body }}</p>").unwrap();
        fs::write(dir.path().join("mail.j2"), "{{ body }}").unwrap();
        let engine = JinjaTemplateEngine::new(vec![dir.path().to_path_buf()]);
        let context = json!({"body": "<script>x</script>"});
        let page = engine.get_template("page.jinja").unwrap().render(&context).unwrap();
        assert_eq!(page, "<p>&lt;script&gt;x&lt;&#x2f;script&gt;</p>");
        let mail = engine.get_template("mail.j2").unwrap().render(&context).unwrap();
        assert!(!mail.contains("<script>"));
    }
}
