//! PDF rendering through a headless browser

use crate::error::{ExportError, Result};
use crate::format::PageConfig;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Turns an HTML document into PDF bytes
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, html: &str, page: &PageConfig) -> Result<Vec<u8>>;

    fn name(&self) -> &'static str;
}

/// Put an `@page` rule sized to the slides into the document head
pub fn inject_page_style(html: &str, page: &PageConfig) -> String {
    let style = format!("<style>{}</style>", page.page_css());
    let lower = html.to_ascii_lowercase();
    if let Some(pos) = lower.find("</head>") {
        let mut out = String::with_capacity(html.len() + style.len());
        out.push_str(&html[..pos]);
        out.push_str(&style);
        out.push_str(&html[pos..]);
        out
    } else {
        format!("<!DOCTYPE html><html><head><meta charset=\"UTF-8\">{style}</head><body>{html}</body></html>")
    }
}

/// Chromium-family browser driven with `--print-to-pdf`
#[derive(Debug, Clone)]
pub struct HeadlessBrowser {
    binary: String,
}

impl Default for HeadlessBrowser {
    fn default() -> Self {
        Self::new("chromium")
    }
}

impl HeadlessBrowser {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--no-pdf-header-footer")
            .arg(format!("--print-to-pdf={}", output.display()))
            .arg(format!("file://{}", input.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl PageRenderer for HeadlessBrowser {
    #[instrument(skip(self, html, page), fields(browser = %self.binary))]
    async fn render(&self, html: &str, page: &PageConfig) -> Result<Vec<u8>> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("report.html");
        let output = workdir.path().join("report.pdf");
        tokio::fs::write(&input, inject_page_style(html, page)).await?;

        let child = self
            .command(&input, &output)
            .spawn()
            .map_err(|source| ExportError::BrowserSpawn {
                browser: self.binary.clone(),
                source,
            })?;
        debug!("Spawned {} for {}", self.binary, input.display());

        // Dropping the future on timeout drops the child, which kills it.
        let finished = tokio::time::timeout(page.timeout, child.wait_with_output()).await;
        let Ok(result) = finished else {
            warn!("{} did not finish within {:?}", self.binary, page.timeout);
            return Err(ExportError::BrowserTimeout(page.timeout));
        };
        let result = result?;

        if !result.status.success() {
            return Err(ExportError::BrowserFailed {
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        let bytes = match tokio::fs::read(&output).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            _ => return Err(ExportError::EmptyOutput(output)),
        };
        info!("Rendered {} byte PDF with {}", bytes.len(), self.binary);
        Ok(bytes)
    }

    fn name(&self) -> &'static str {
        "headless-browser"
    }
}
