//! Fluent prompt builder
//!
//! This module provides [`PromptBuilder`], a fluent API for constructing prompts
//! programmatically with sections, conditionals, and formatting. The persona
//! templates are assembled with it, and so is the market-data block that is
//! substituted into them.

/// A fluent builder for constructing prompts
///
/// # Examples
///
/// ```
/// use research_prompt::PromptBuilder;
///
/// let prompt = PromptBuilder::new()
///     .text("You are a senior equity analyst.")
///     .newline()
///     .section("Skills")
///     .bullet("Financial statement analysis")
///     .bullet("Valuation")
///     .when(true, "\nCite every claim.")
///     .build();
///
/// assert!(prompt.contains("## Skills"));
/// assert!(prompt.contains("- Valuation"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    parts: Vec<String>,
}

impl PromptBuilder {
    /// Create a new prompt builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add static text
    ///
    /// # Examples
    ///
    /// ```
    /// use research_prompt::PromptBuilder;
    ///
    /// let prompt = PromptBuilder::new()
    ///     .text("Hello, ")
    ///     .text("World!")
    ///     .build();
    /// assert_eq!(prompt, "Hello, World!");
    /// ```
    pub fn text(mut self, content: impl Into<String>) -> Self {
        self.parts.push(content.into());
        self
    }

    /// Add a newline
    pub fn newline(self) -> Self {
        self.text("\n")
    }

    /// Add a blank line (two newlines)
    pub fn blank_line(self) -> Self {
        self.text("\n\n")
    }

    /// Add a section header (markdown h2)
    pub fn section(self, title: impl Into<String>) -> Self {
        self.text(format!("\n## {}\n", title.into()))
    }

    /// Add a subsection header (markdown h3)
    pub fn subsection(self, title: impl Into<String>) -> Self {
        self.text(format!("\n### {}\n", title.into()))
    }

    /// Add content conditionally
    pub fn when(self, condition: bool, content: impl Into<String>) -> Self {
        if condition { self.text(content) } else { self }
    }

    /// Add a bullet point
    pub fn bullet(self, content: impl Into<String>) -> Self {
        self.text(format!("- {}\n", content.into()))
    }

    /// Add multiple bullet points
    pub fn bullets<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for item in items {
            self = self.bullet(item);
        }
        self
    }

    /// Add multiple numbered items starting from 1
    pub fn numbered_list<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for (i, item) in items.into_iter().enumerate() {
            self = self.text(format!("{}. {}\n", i + 1, item.into()));
        }
        self
    }

    /// Add a key-value pair
    pub fn field(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.text(format!("- **{}**: {}\n", key.into(), value.into()))
    }

    /// Build the final prompt string
    pub fn build(self) -> String {
        self.parts.join("")
    }

    /// Build with trimmed whitespace
    pub fn build_trimmed(self) -> String {
        self.build().trim().to_string()
    }

    /// Check if the builder is empty
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl From<PromptBuilder> for String {
    fn from(builder: PromptBuilder) -> Self {
        builder.build()
    }
}
