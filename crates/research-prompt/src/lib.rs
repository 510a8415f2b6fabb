//! Prompt template management for research-rs
//!
//! Analyst personas are Jinja2 templates held in a thread-safe registry and
//! rendered against an [`research_core::AnalysisContext`] plus whatever market
//! metrics were available.
//!
//! # Quick Start
//!
//! ```
//! use research_core::{AnalysisContext, AnalystKind};
//! use research_prompt::PromptAssembler;
//!
//! let assembler = PromptAssembler::new().unwrap();
//! let context = AnalysisContext::builder("Acme Corp", "ACME").build().unwrap();
//! let prompt = assembler.render_for(AnalystKind::Fundamentals, &context, None).unwrap();
//!
//! assert!(prompt.contains("Acme Corp"));
//! assert!(prompt.contains("Current price: N/A"));
//! ```
//!
//! # Using the Builder
//!
//! ```
//! use research_prompt::PromptBuilder;
//!
//! let prompt = PromptBuilder::new()
//!     .section("Market Data")
//!     .field("Beta", "1.24")
//!     .build();
//!
//! assert!(prompt.contains("**Beta**: 1.24"));
//! ```
//!
//! # Feature Flags
//!
//! - `file-loader`: Load persona overrides from `*.jinja` / `*.j2` files

mod assembler;
mod builder;
mod error;
mod jinja;
mod personas;
mod registry;
mod template;

#[cfg(feature = "file-loader")]
mod loader;

pub use assembler::{Metrics, NOT_AVAILABLE, PromptAssembler, TEMPLATE_METRICS, variables};
pub use builder::PromptBuilder;
pub use error::{PromptError, Result};
pub use jinja::JinjaTemplate;
pub use personas::{builtin_templates, persona_source};
pub use registry::PromptRegistry;
pub use template::PromptTemplate;

#[cfg(feature = "file-loader")]
pub use loader::FileLoader;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::assembler::PromptAssembler;
    pub use crate::builder::PromptBuilder;
    pub use crate::error::{PromptError, Result};
    pub use crate::jinja::JinjaTemplate;
    pub use crate::registry::PromptRegistry;
    pub use crate::template::PromptTemplate;

    #[cfg(feature = "file-loader")]
    pub use crate::loader::FileLoader;
}
