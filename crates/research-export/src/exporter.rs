//! Report export entry point

use crate::docx::DocxWriter;
use crate::error::{ExportError, Result};
use crate::format::{ExportFormat, ExportMeta, PageConfig};
use crate::pdf::{HeadlessBrowser, PageRenderer};
use crate::walker::HtmlWalker;
use research_utils::ExportSettings;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

/// Converts finished HTML reports into Word or PDF files
pub struct DocumentExporter {
    output_dir: PathBuf,
    page: PageConfig,
    renderer: Arc<dyn PageRenderer>,
}

impl DocumentExporter {
    pub fn new(output_dir: impl Into<PathBuf>, page: PageConfig, renderer: Arc<dyn PageRenderer>) -> Self {
        Self {
            output_dir: output_dir.into(),
            page,
            renderer,
        }
    }

    pub fn from_settings(settings: &ExportSettings) -> Self {
        Self::new(
            settings.output_dir.clone(),
            PageConfig::from(settings),
            Arc::new(HeadlessBrowser::new(&settings.browser)),
        )
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Word document bytes for `html`
    pub fn to_word(&self, html: &str) -> Result<Vec<u8>> {
        let blocks = HtmlWalker::new().convert(html);
        DocxWriter::new(self.page.clone()).write(&blocks)
    }

    /// PDF bytes for `html`
    pub async fn to_pdf(&self, html: &str) -> Result<Vec<u8>> {
        self.renderer.render(html, &self.page).await
    }

    /// Convert `html` and write it to the output directory
    ///
    /// Returns the path of the written file.
    #[instrument(skip(self, html), fields(ticker = %meta.ticker))]
    pub async fn export(&self, html: &str, format: ExportFormat, meta: &ExportMeta) -> Result<PathBuf> {
        if html.trim().is_empty() {
            return Err(ExportError::EmptyHtml);
        }

        let bytes = match format {
            ExportFormat::Word => self.to_word(html)?,
            ExportFormat::Pdf => self.to_pdf(html).await?,
        };

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(meta.file_name(format));
        tokio::fs::write(&path, &bytes).await?;
        info!(
            "Exported {} as {} ({} bytes) to {}",
            meta.title(),
            format,
            bytes.len(),
            path.display()
        );
        Ok(path)
    }

    /// Write the HTML itself next to the converted files
    pub async fn save_html(&self, html: &str, meta: &ExportMeta) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self
            .output_dir
            .join(meta.file_name(ExportFormat::Word).replace(".docx", ".html"));
        tokio::fs::write(&path, html).await?;
        Ok(path)
    }
}

impl std::fmt::Debug for DocumentExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentExporter")
            .field("output_dir", &self.output_dir)
            .field("page", &self.page)
            .field("renderer", &self.renderer.name())
            .finish()
    }
}
