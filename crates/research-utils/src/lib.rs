//! Shared utilities for research-rs
//!
//! This crate provides common functionality used across the research-rs workspace:
//! tracing setup and the layered [`Settings`] (TOML file plus `RESEARCH_*`
//! environment overrides) every other crate builds its own config from.

pub mod config;
pub mod logging;

pub use config::{
    ConfigError, ExportSettings, KeySettings, LlmSettings, MarketSettings, PromptSettings,
    RetrySettings, ServerSettings, Settings,
};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
