//! Configuration management utilities
//!
//! [`Settings`] is assembled in three layers: compiled-in defaults, an optional
//! TOML file, then `RESEARCH_*` environment variables. Every section uses
//! `#[serde(default)]` so a config file only needs the keys it changes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Prefix shared by all environment overrides
pub const ENV_PREFIX: &str = "RESEARCH_";

/// Unprefixed variable also accepted for the Alpha Vantage key
const ALPHA_VANTAGE_FALLBACK_ENV: &str = "ALPHA_VANTAGE_API_KEY";

/// Errors raised while loading or validating settings
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`Settings`]
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override could not be parsed
    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias for configuration loading
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub keys: KeySettings,
    pub retry: RetrySettings,
    pub market: MarketSettings,
    pub export: ExportSettings,
    pub prompts: PromptSettings,
}

/// HTTP / WebSocket listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Origins allowed by the CORS layer
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:8000".to_string(),
                "http://127.0.0.1:8000".to_string(),
                "http://localhost:3000".to_string(),
            ],
        }
    }
}

/// Hosted model parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Attach the web-search grounding tool to every request
    pub search_grounding: bool,
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.7,
            max_output_tokens: 8000,
            search_grounding: true,
            request_timeout_secs: 300,
        }
    }
}

/// Where credentials are loaded from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySettings {
    /// Single key, read first
    pub primary_file: PathBuf,
    /// One key per line, `#` comments allowed
    pub pool_file: PathBuf,
    /// Variables `{env_prefix}1..={env_slots}` are read after the files
    pub env_prefix: String,
    pub env_slots: u32,
}

impl Default for KeySettings {
    fn default() -> Self {
        Self {
            primary_file: PathBuf::from("api_key/primary_gemini_key.txt"),
            pool_file: PathBuf::from("api_key/gemini_api_keys.txt"),
            env_prefix: "GEMINI_API_KEY_".to_string(),
            env_slots: 12,
        }
    }
}

/// Backoff parameters for outbound model calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    /// Relative jitter, `0.1` means ±10%
    pub jitter: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 2_000,
            backoff_factor: 2.0,
            jitter: 0.1,
            max_delay_ms: 60_000,
        }
    }
}

/// Market data fetching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSettings {
    pub cache_ttl_secs: u64,
    /// Days of daily history used for price metrics
    pub history_days: u32,
    pub requests_per_second: u32,
    /// Alpha Vantage key for company fundamentals; prices only when unset
    #[serde(skip_serializing)]
    pub alpha_vantage_key: Option<String>,
    /// Alpha Vantage quota, 5 on the free tier
    pub fundamentals_per_minute: u32,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            history_days: 365,
            requests_per_second: 2,
            alpha_vantage_key: None,
            fundamentals_per_minute: 5,
        }
    }
}

/// Document export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub output_dir: PathBuf,
    /// Chromium-compatible executable used for PDF rendering
    pub browser: String,
    pub pdf_timeout_secs: u64,
    pub page_width_px: u32,
    pub page_height_px: u32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir(),
            browser: "chromium".to_string(),
            pdf_timeout_secs: 150,
            page_width_px: 1620,
            page_height_px: 2291,
        }
    }
}

/// Prompt template overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory of `*.j2` files replacing built-in persona templates
    pub override_dir: Option<PathBuf>,
}

impl Settings {
    /// Load settings from an optional TOML file and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|name| std::env::var(name).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read a TOML file on top of the defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    /// Parse settings from TOML text
    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `RESEARCH_*` overrides using the given lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let name = format!("{ENV_PREFIX}{suffix}");
            lookup(&name).map(|value| (name, value))
        };

        if let Some((_, host)) = var("HOST") {
            self.server.host = host;
        }
        if let Some((name, port)) = var("PORT") {
            self.server.port = parse_env(&name, &port)?;
        }
        if let Some((_, origins)) = var("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some((_, model)) = var("MODEL") {
            self.llm.model = model;
        }
        if let Some((_, base)) = var("API_BASE") {
            self.llm.api_base = base;
        }
        if let Some((name, grounding)) = var("SEARCH_GROUNDING") {
            self.llm.search_grounding = parse_env(&name, &grounding)?;
        }
        if let Some((name, retries)) = var("MAX_RETRIES") {
            self.retry.max_retries = parse_env(&name, &retries)?;
        }
        if let Some((_, file)) = var("PRIMARY_KEY_FILE") {
            self.keys.primary_file = PathBuf::from(file);
        }
        if let Some((_, file)) = var("KEY_POOL_FILE") {
            self.keys.pool_file = PathBuf::from(file);
        }
        if let Some((_, dir)) = var("OUTPUT_DIR") {
            self.export.output_dir = PathBuf::from(dir);
        }
        if let Some((_, browser)) = var("BROWSER") {
            self.export.browser = browser;
        }
        if let Some((name, timeout)) = var("PDF_TIMEOUT_SECS") {
            self.export.pdf_timeout_secs = parse_env(&name, &timeout)?;
        }
        if let Some((_, dir)) = var("PROMPT_DIR") {
            self.prompts.override_dir = Some(PathBuf::from(dir));
        }
        let alpha_vantage_key = var("ALPHA_VANTAGE_KEY")
            .map(|(_, key)| key)
            .or_else(|| lookup(ALPHA_VANTAGE_FALLBACK_ENV))
            .filter(|key| !key.trim().is_empty());
        if let Some(key) = alpha_vantage_key {
            self.market.alpha_vantage_key = Some(key);
        }
        Ok(())
    }

    /// Validate value ranges
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".to_string()));
        }
        if self.retry.backoff_factor < 1.0 {
            return Err(ConfigError::Invalid(
                "retry.backoff_factor must be at least 1.0".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.retry.jitter) {
            return Err(ConfigError::Invalid(
                "retry.jitter must be in [0, 1)".to_string(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.base_delay_ms exceeds retry.max_delay_ms".to_string(),
            ));
        }
        if self.export.page_width_px == 0 || self.export.page_height_px == 0 {
            return Err(ConfigError::Invalid("export page size must be non-zero".to_string()));
        }
        if self.export.pdf_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "export.pdf_timeout_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name: name.to_string(),
        value: value.to_string(),
    })
}
