//! Output formats and report metadata

use crate::error::{ExportError, Result};
use chrono::{DateTime, Local};
use research_utils::ExportSettings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Twips per CSS pixel at 96 DPI
const TWIPS_PER_PX: u32 = 15;

/// Page geometry shared by the Word and PDF outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageConfig {
    pub width_px: u32,
    pub height_px: u32,
    /// Upper bound for one PDF render
    pub timeout: Duration,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self::from(&ExportSettings::default())
    }
}

impl From<&ExportSettings> for PageConfig {
    fn from(settings: &ExportSettings) -> Self {
        Self {
            width_px: settings.page_width_px,
            height_px: settings.page_height_px,
            timeout: Duration::from_secs(settings.pdf_timeout_secs),
        }
    }
}

impl PageConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn width_twips(&self) -> u32 {
        self.width_px * TWIPS_PER_PX
    }

    pub fn height_twips(&self) -> u32 {
        self.height_px * TWIPS_PER_PX
    }

    /// `@page` rule sizing printed output to one slide per sheet
    pub fn page_css(&self) -> String {
        format!(
            "@page {{ size: {}px {}px; margin: 0 }}",
            self.width_px, self.height_px
        )
    }
}

/// Converts slide padding in pixels to twips
pub(crate) fn px_to_twips(px: u32) -> i32 {
    i32::try_from(px * TWIPS_PER_PX).unwrap_or(i32::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Word,
    Pdf,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Word => "docx",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word => f.write_str("word"),
            Self::Pdf => f.write_str("pdf"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "word" | "docx" => Ok(Self::Word),
            "pdf" => Ok(Self::Pdf),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// What the report is about
#[derive(Debug, Clone)]
pub struct ExportMeta {
    pub company_name: String,
    pub ticker: String,
    pub generated_at: DateTime<Local>,
}

impl ExportMeta {
    pub fn new(company_name: impl Into<String>, ticker: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            ticker: ticker.into().trim().to_ascii_uppercase(),
            generated_at: Local::now(),
        }
    }

    pub fn with_timestamp(mut self, generated_at: DateTime<Local>) -> Self {
        self.generated_at = generated_at;
        self
    }

    pub fn title(&self) -> String {
        format!("{} ({}) - Investment Analysis", self.company_name, self.ticker)
    }

    /// `{TICKER}_Investment_Report_{YYYYMMDD_HHMMSS}.{ext}`
    pub fn file_name(&self, format: ExportFormat) -> String {
        let ticker: String = self
            .ticker
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        format!(
            "{}_Investment_Report_{}.{}",
            ticker,
            self.generated_at.format("%Y%m%d_%H%M%S"),
            format.extension()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_format() {
        assert_eq!("word".parse::<ExportFormat>().unwrap(), ExportFormat::Word);
        assert_eq!("DOCX".parse::<ExportFormat>().unwrap(), ExportFormat::Word);
        assert_eq!(" pdf ".parse::<ExportFormat>().unwrap(), ExportFormat::Pdf);
        assert!(matches!(
            "pptx".parse::<ExportFormat>(),
            Err(ExportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_page_config_defaults() {
        let page = PageConfig::default();
        assert_eq!((page.width_px, page.height_px), (1620, 2291));
        assert_eq!(page.timeout, Duration::from_secs(150));
        // 16.875in x 23.865in
        assert_eq!(page.width_twips(), 24_300);
        assert_eq!(page.height_twips(), 34_365);
        assert_eq!(page.page_css(), "@page { size: 1620px 2291px; margin: 0 }");
    }

    #[test]
    fn test_file_name() {
        let meta = ExportMeta::new("Acme Corp", "acme")
            .with_timestamp(Local.with_ymd_and_hms(2025, 3, 14, 9, 5, 7).unwrap());
        assert_eq!(
            meta.file_name(ExportFormat::Word),
            "ACME_Investment_Report_20250314_090507.docx"
        );
        assert_eq!(meta.title(), "Acme Corp (ACME) - Investment Analysis");
    }
}
