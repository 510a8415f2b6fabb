//! File-based template loader
//!
//! This module provides [`FileLoader`] for loading template overrides from the
//! filesystem. It is gated behind the `file-loader` feature.

use crate::{JinjaTemplate, PromptError, PromptTemplate, Result};
use std::path::{Path, PathBuf};

const EXTENSIONS: [&str; 2] = ["jinja", "j2"];

/// A file-based template loader
///
/// Each `{name}.jinja` or `{name}.j2` file in the directory becomes a template
/// called `{name}`. Naming a file after an analyst id (`chief.j2`,
/// `valuation.jinja`, ...) replaces that persona's built-in prompt.
///
/// # Examples
///
/// ```ignore
/// use research_prompt::FileLoader;
///
/// let loader = FileLoader::new("./prompts");
/// let template = loader.load_template("fundamentals")?;
/// let all = loader.load_all()?;
/// ```
#[derive(Debug, Clone)]
pub struct FileLoader {
    base_path: PathBuf,
}

impl FileLoader {
    /// Create a new file loader with the given base path
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Get the base path
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Check if the base directory exists
    pub fn exists(&self) -> bool {
        self.base_path.is_dir()
    }

    /// Load a single template by name
    pub fn load_template(&self, name: &str) -> Result<JinjaTemplate> {
        for ext in EXTENSIONS {
            let path = self.base_path.join(format!("{name}.{ext}"));
            if path.is_file() {
                return JinjaTemplate::new(name, read(&path)?);
            }
        }

        Err(PromptError::FileLoadError {
            path: self.base_path.join(name).display().to_string(),
            detail: "No template files found".to_string(),
        })
    }

    /// Load every template in the base directory, sorted by name
    pub fn load_all(&self) -> Result<Vec<JinjaTemplate>> {
        let entries =
            std::fs::read_dir(&self.base_path).map_err(|e| PromptError::FileLoadError {
                path: self.base_path.display().to_string(),
                detail: e.to_string(),
            })?;

        let mut templates = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = template_name(&path) else {
                continue;
            };
            templates.push(JinjaTemplate::new(name, read(&path)?)?);
        }

        templates.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(templates)
    }
}

fn template_name(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if !EXTENSIONS.contains(&ext) {
        return None;
    }
    path.file_stem()?.to_str().map(ToString::to_string)
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| PromptError::FileLoadError {
        path: path.display().to_string(),
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_template() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("chief.j2"), "CIO view on {{ ticker }}").unwrap();

        let loader = FileLoader::new(dir.path());
        let template = loader.load_template("chief").unwrap();

        assert_eq!(template.name(), "chief");
        assert_eq!(
            template.render(&json!({ "ticker": "ACME" })).unwrap(),
            "CIO view on ACME"
        );
    }

    #[test]
    fn test_load_all_skips_other_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("risk.jinja"), "Risk").unwrap();
        fs::write(dir.path().join("esg.j2"), "ESG").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loader = FileLoader::new(dir.path());
        let names: Vec<String> = loader
            .load_all()
            .unwrap()
            .iter()
            .map(|t| t.name().to_string())
            .collect();

        assert_eq!(names, vec!["esg", "risk"]);
    }

    #[test]
    fn test_load_not_found() {
        let dir = tempdir().unwrap();
        let loader = FileLoader::new(dir.path());
        assert!(loader.load_template("nonexistent").is_err());
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("broken.j2"), "{{ unclosed").unwrap();

        let loader = FileLoader::new(dir.path());
        assert!(matches!(
            loader.load_all(),
            Err(PromptError::TemplateParseFailed { .. })
        ));
    }

    #[test]
    fn test_exists() {
        let dir = tempdir().unwrap();
        assert!(FileLoader::new(dir.path()).exists());
        assert!(!FileLoader::new("/nonexistent/path").exists());
    }
}
