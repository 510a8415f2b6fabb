//! MiniJinja-based template implementation
//!
//! This module provides a [`JinjaTemplate`] implementation that uses the MiniJinja
//! template engine for variable interpolation and conditional rendering.

use crate::{PromptError, PromptTemplate, Result};
use minijinja::Environment;

/// A prompt template backed by MiniJinja
///
/// # Template Syntax
///
/// The template uses standard Jinja2 syntax:
/// - Variables: `{{ variable }}`
/// - Filters: `{{ name | upper }}`
/// - Conditionals: `{% if condition %}...{% endif %}`
/// - Loops: `{% for item in items %}...{% endfor %}`
///
/// Undefined variables render as empty strings; callers that need a visible
/// placeholder (such as `N/A` for missing metrics) fill it in before rendering.
///
/// # Examples
///
/// ```ignore
/// use research_prompt::{JinjaTemplate, PromptTemplate};
/// use serde_json::json;
///
/// let template = JinjaTemplate::new("greeting", "Hello, {{ name }}!")?;
/// let result = template.render(&json!({ "name": "World" }))?;
/// assert_eq!(result, "Hello, World!");
/// ```
pub struct JinjaTemplate {
    name: String,
    source: String,
}

impl JinjaTemplate {
    /// Create a template, validating that it parses
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::TemplateParseFailed`] if the source is not valid Jinja.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let source = source.into();

        let env = Environment::new();
        env.template_from_str(&source)
            .map_err(|e| PromptError::TemplateParseFailed {
                name: name.clone(),
                detail: e.to_string(),
            })?;

        Ok(Self { name, source })
    }
}

impl PromptTemplate for JinjaTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, vars: &serde_json::Value) -> Result<String> {
        // Create a new environment for each render to avoid lifetime issues
        let mut env = Environment::new();

        env.add_filter("upper", |s: String| s.to_uppercase());
        env.add_filter("lower", |s: String| s.to_lowercase());
        env.add_filter("trim", |s: String| s.trim().to_string());

        let value = minijinja::value::Value::from_serialize(vars);

        env.render_str(&self.source, value)
            .map_err(|e| PromptError::RenderError {
                name: self.name.clone(),
                detail: e.to_string(),
            })
    }

    fn raw_template(&self) -> &str {
        &self.source
    }
}

impl std::fmt::Debug for JinjaTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JinjaTemplate")
            .field("name", &self.name)
            .field("len", &self.source.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_template() {
        let template = JinjaTemplate::new("test", "Hello, {{ name }}!").unwrap();

        let result = template.render(&json!({ "name": "World" })).unwrap();
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_filters() {
        let template = JinjaTemplate::new("test", "{{ ticker | upper }}").unwrap();

        let result = template.render(&json!({ "ticker": "acme" })).unwrap();
        assert_eq!(result, "ACME");
    }

    #[test]
    fn test_invalid_template_error() {
        let result = JinjaTemplate::new("test", "{{ unclosed");
        assert!(matches!(
            result,
            Err(PromptError::TemplateParseFailed { .. })
        ));
    }

    #[test]
    fn test_undefined_renders_empty() {
        let template = JinjaTemplate::new("test", "[{{ missing }}]").unwrap();
        assert_eq!(template.render(&json!({})).unwrap(), "[]");
    }

    #[test]
    fn test_conditional() {
        let template = JinjaTemplate::new(
            "conditional",
            r#"{% if investment_context %}Context: {{ investment_context }}{% else %}None{% endif %}"#,
        )
        .unwrap();

        let with = template
            .render(&json!({ "investment_context": "Turnaround" }))
            .unwrap();
        assert_eq!(with, "Context: Turnaround");

        let without = template.render(&json!({ "investment_context": "" })).unwrap();
        assert_eq!(without, "None");
    }

    #[test]
    fn test_loop() {
        let template = JinjaTemplate::new(
            "loop",
            r#"{% for item in items %}- {{ item }}
{% endfor %}"#,
        )
        .unwrap();

        let result = template
            .render(&json!({ "items": ["one", "two", "three"] }))
            .unwrap();

        assert!(result.contains("- one"));
        assert!(result.contains("- three"));
    }

    #[test]
    fn test_debug() {
        let template = JinjaTemplate::new("test", "Hello").unwrap();
        let debug = format!("{:?}", template);
        assert!(debug.contains("JinjaTemplate"));
        assert!(debug.contains("test"));
    }
}
