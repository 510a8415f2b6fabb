//! Prompt template registry
//!
//! This module provides [`PromptRegistry`], a thread-safe registry for managing
//! and accessing prompt templates.

use crate::{PromptError, PromptTemplate, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A thread-safe registry for managing prompt templates
///
/// Registering a template under an existing name replaces it, which is how
/// file-loaded overrides take precedence over the built-in personas.
///
/// # Examples
///
/// ```ignore
/// use research_prompt::{JinjaTemplate, PromptRegistry};
/// use serde_json::json;
///
/// let registry = PromptRegistry::new();
/// registry.register(JinjaTemplate::new("greeting", "Hello, {{ name }}!")?);
///
/// let result = registry.render("greeting", &json!({ "name": "World" }))?;
/// assert_eq!(result, "Hello, World!");
/// ```
pub struct PromptRegistry {
    templates: RwLock<HashMap<String, Arc<dyn PromptTemplate>>>,
}

impl PromptRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
        }
    }

    /// Register a template
    ///
    /// If a template with the same name already exists, it will be replaced.
    pub fn register<T: PromptTemplate + 'static>(&self, template: T) {
        if let Ok(mut templates) = self.templates.write() {
            templates.insert(template.name().to_string(), Arc::new(template));
        }
    }

    /// Register multiple templates at once
    pub fn register_all<T: PromptTemplate + 'static>(&self, templates: Vec<T>) {
        for template in templates {
            self.register(template);
        }
    }

    /// Get a template by name
    ///
    /// Returns `None` if the template is not registered.
    pub fn get(&self, name: &str) -> Option<Arc<dyn PromptTemplate>> {
        self.templates.read().ok()?.get(name).cloned()
    }

    /// Check if a template is registered
    pub fn contains(&self, name: &str) -> bool {
        self.templates
            .read()
            .map(|t| t.contains_key(name))
            .unwrap_or(false)
    }

    /// Remove a template by name
    ///
    /// Returns the removed template if it existed.
    pub fn remove(&self, name: &str) -> Option<Arc<dyn PromptTemplate>> {
        self.templates.write().ok()?.remove(name)
    }

    /// Render a registered template
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The template is not registered
    /// - Rendering fails
    pub fn render(&self, name: &str, vars: &serde_json::Value) -> Result<String> {
        let template = self
            .get(name)
            .ok_or_else(|| PromptError::TemplateNotRegistered(name.to_string()))?;

        template.render(vars)
    }

    /// List all registered template names, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .templates
            .read()
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Get the number of registered templates
    pub fn len(&self) -> usize {
        self.templates.read().map(|t| t.len()).unwrap_or(0)
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PromptRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptRegistry")
            .field("template_count", &self.len())
            .field("templates", &self.list())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JinjaTemplate;
    use serde_json::json;

    #[test]
    fn test_new_registry() {
        let registry = PromptRegistry::new();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_and_get() {
        let registry = PromptRegistry::new();
        registry.register(JinjaTemplate::new("test", "Hello").unwrap());

        assert!(registry.contains("test"));
        assert!(registry.get("test").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_render() {
        let registry = PromptRegistry::new();
        registry.register(JinjaTemplate::new("greeting", "Hello, {{ name }}!").unwrap());

        let result = registry.render("greeting", &json!({ "name": "World" })).unwrap();
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_render_not_found() {
        let registry = PromptRegistry::new();
        let result = registry.render("nonexistent", &json!({}));
        assert!(matches!(result, Err(PromptError::TemplateNotRegistered(_))));
    }

    #[test]
    fn test_list_sorted() {
        let registry = PromptRegistry::new();
        registry.register_all(vec![
            JinjaTemplate::new("b", "B").unwrap(),
            JinjaTemplate::new("a", "A").unwrap(),
        ]);

        assert_eq!(registry.list(), vec!["a", "b"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove() {
        let registry = PromptRegistry::new();
        registry.register(JinjaTemplate::new("test", "Hello").unwrap());

        assert!(registry.remove("test").is_some());
        assert!(!registry.contains("test"));
    }

    #[test]
    fn test_replace_template() {
        let registry = PromptRegistry::new();
        registry.register(JinjaTemplate::new("test", "Version 1").unwrap());
        assert_eq!(registry.render("test", &json!({})).unwrap(), "Version 1");

        registry.register(JinjaTemplate::new("test", "Version 2").unwrap());
        assert_eq!(registry.render("test", &json!({})).unwrap(), "Version 2");
    }

    #[test]
    fn test_debug() {
        let registry = PromptRegistry::new();
        registry.register(JinjaTemplate::new("test", "Hello").unwrap());

        let debug = format!("{:?}", registry);
        assert!(debug.contains("PromptRegistry"));
        assert!(debug.contains("test"));
    }
}
