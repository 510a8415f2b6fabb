//! Document export for research-rs
//!
//! Finished HTML reports leave the system in two shapes:
//!
//! - **Word**: [`HtmlWalker`] walks the DOM and consults the declarative
//!   [`mapping::MAPPING`] table (first match wins) to produce
//!   [`DocumentBlock`]s, which [`DocxWriter`] packs with docx-rs on pages
//!   sized like the slides.
//! - **PDF**: a [`PageRenderer`] prints the HTML. The default
//!   [`HeadlessBrowser`] shells out to a Chromium-family binary with a
//!   bounded wait.
//!
//! [`DocumentExporter`] picks the path by [`ExportFormat`] and writes
//! `{TICKER}_Investment_Report_{YYYYMMDD_HHMMSS}.{ext}` to the output
//! directory.

pub mod blocks;
pub mod docx;
pub mod error;
pub mod exporter;
pub mod format;
pub mod mapping;
pub mod pdf;
pub mod walker;

pub use blocks::{DocumentBlock, ImageBlock, Paragraph, Table, TableCell, TextRun};
pub use docx::DocxWriter;
pub use error::{ExportError, Result};
pub use exporter::DocumentExporter;
pub use format::{ExportFormat, ExportMeta, PageConfig};
#[cfg(any(test, feature = "mock"))]
pub use pdf::MockPageRenderer;
pub use pdf::{HeadlessBrowser, PageRenderer, inject_page_style};
pub use walker::HtmlWalker;
