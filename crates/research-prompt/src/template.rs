//! Core prompt template trait
//!
//! This module defines the [`PromptTemplate`] trait that all template implementations must follow.

use crate::Result;

/// Core trait for prompt templates
///
/// This trait is dyn-compatible, using `serde_json::Value` for variables instead of generics,
/// so a registry can hold built-in and file-loaded templates side by side.
///
/// # Examples
///
/// ```ignore
/// use research_prompt::{JinjaTemplate, PromptTemplate};
/// use serde_json::json;
///
/// let template = JinjaTemplate::new("greeting", "Cover {{ ticker }}")?;
/// let result = template.render(&json!({ "ticker": "ACME" }))?;
/// assert_eq!(result, "Cover ACME");
/// ```
pub trait PromptTemplate: Send + Sync {
    /// Get the template name/identifier
    fn name(&self) -> &str;

    /// Render the template with variables
    fn render(&self, vars: &serde_json::Value) -> Result<String>;

    /// Get raw template string (for debugging/inspection)
    fn raw_template(&self) -> &str;

    /// Whether the raw source references a variable by name
    fn references(&self, variable: &str) -> bool {
        let raw = self.raw_template();
        raw.contains(&format!("{{{{ {variable}")) || raw.contains(&format!("{{{{{variable}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A plain-text implementation of PromptTemplate
    struct StaticTemplate {
        name: String,
        body: String,
    }

    impl PromptTemplate for StaticTemplate {
        fn name(&self) -> &str {
            &self.name
        }

        fn render(&self, _vars: &serde_json::Value) -> Result<String> {
            Ok(self.body.clone())
        }

        fn raw_template(&self) -> &str {
            &self.body
        }
    }

    #[test]
    fn test_render() {
        let template = StaticTemplate {
            name: "test".to_string(),
            body: "Hello".to_string(),
        };

        assert_eq!(template.name(), "test");
        assert_eq!(template.render(&json!({})).unwrap(), "Hello");
    }

    #[test]
    fn test_references() {
        let template = StaticTemplate {
            name: "test".to_string(),
            body: "Analyse {{ company_name }} ({{ticker}})".to_string(),
        };

        assert!(template.references("company_name"));
        assert!(template.references("ticker"));
        assert!(!template.references("user_query"));
    }
}
