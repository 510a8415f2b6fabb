//! Writes document blocks as a `.docx` package

use crate::blocks::{Alignment, DocumentBlock, ImageBlock, Paragraph, Table, TextRun};
use crate::error::{ExportError, Result};
use crate::format::{PageConfig, px_to_twips};
use docx_rs::{AlignmentType, BreakType, Docx, PageMargin, Pic, Run, TableRow};
use std::io::Cursor;
use tracing::{debug, warn};

const MARGIN_TOP_PX: u32 = 105;
const MARGIN_BOTTOM_PX: u32 = 45;
const MARGIN_SIDE_PX: u32 = 98;
const EMU_PER_PX: u32 = 9_525;

/// Font size in the half-points Word stores
pub fn half_points(points: f32) -> usize {
    (points * 2.0).round().max(1.0) as usize
}

/// Pixel size of a PNG or JPEG, read from its header
pub fn image_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

    if data.starts_with(PNG_SIGNATURE) && data.len() >= 24 {
        let width = u32::from_be_bytes(data[16..20].try_into().ok()?);
        let height = u32::from_be_bytes(data[20..24].try_into().ok()?);
        return (width > 0 && height > 0).then_some((width, height));
    }

    if data.starts_with(&[0xFF, 0xD8]) {
        let mut i = 2;
        while i + 9 < data.len() {
            if data[i] != 0xFF {
                i += 1;
                continue;
            }
            let marker = data[i + 1];
            let length = usize::from(u16::from_be_bytes([data[i + 2], data[i + 3]]));
            // SOF0..SOF15 except DHT, JPG and DAC
            if (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
                let height = u32::from(u16::from_be_bytes([data[i + 5], data[i + 6]]));
                let width = u32::from(u16::from_be_bytes([data[i + 7], data[i + 8]]));
                return (width > 0 && height > 0).then_some((width, height));
            }
            i += 2 + length;
        }
    }
    None
}

/// Shrink `(width, height)` to fit inside `(max_width, max_height)`,
/// keeping the aspect ratio; images that already fit are left alone
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let (w, h) = (u64::from(width), u64::from(height));
    let (max_w, max_h) = (u64::from(max_width), u64::from(max_height));
    // Compare w / max_w against h / max_h without dividing
    let (w, h) = if w * max_h >= h * max_w {
        (max_w, (h * max_w / w).max(1))
    } else {
        ((w * max_h / h).max(1), max_h)
    };
    (
        u32::try_from(w).unwrap_or(max_width),
        u32::try_from(h).unwrap_or(max_height),
    )
}

/// Renders [`DocumentBlock`]s with docx-rs on pages sized like the slides
#[derive(Debug, Clone, Default)]
pub struct DocxWriter {
    page: PageConfig,
}

impl DocxWriter {
    pub fn new(page: PageConfig) -> Self {
        Self { page }
    }

    fn content_width_px(&self) -> u32 {
        self.page.width_px.saturating_sub(2 * MARGIN_SIDE_PX).max(1)
    }

    fn content_height_px(&self) -> u32 {
        self.page
            .height_px
            .saturating_sub(MARGIN_TOP_PX + MARGIN_BOTTOM_PX)
            .max(1)
    }

    pub fn write(&self, blocks: &[DocumentBlock]) -> Result<Vec<u8>> {
        let mut docx = Docx::new()
            .page_size(self.page.width_twips(), self.page.height_twips())
            .page_margin(
                PageMargin::new()
                    .top(px_to_twips(MARGIN_TOP_PX))
                    .bottom(px_to_twips(MARGIN_BOTTOM_PX))
                    .left(px_to_twips(MARGIN_SIDE_PX))
                    .right(px_to_twips(MARGIN_SIDE_PX)),
            );

        for block in blocks {
            docx = match block {
                DocumentBlock::Paragraph(paragraph) => docx.add_paragraph(to_paragraph(paragraph)),
                DocumentBlock::Table(table) => docx.add_table(to_table(table)),
                DocumentBlock::Image(image) => docx.add_paragraph(self.to_image(image)),
                DocumentBlock::PageBreak => docx.add_paragraph(
                    docx_rs::Paragraph::new().add_run(Run::new().add_break(BreakType::Page)),
                ),
            };
        }

        let mut buffer = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut buffer)
            .map_err(|e| ExportError::Docx(e.to_string()))?;
        let bytes = buffer.into_inner();
        debug!("Packed {} blocks into {} bytes", blocks.len(), bytes.len());
        Ok(bytes)
    }

    fn to_image(&self, image: &ImageBlock) -> docx_rs::Paragraph {
        let Some((width, height)) = image_dimensions(&image.data) else {
            warn!("Skipping undecodable image '{}'", image.alt);
            return caption(image);
        };

        let (width, height) =
            fit_within(width, height, self.content_width_px(), self.content_height_px());
        let (Some(emu_width), Some(emu_height)) = (
            width.checked_mul(EMU_PER_PX),
            height.checked_mul(EMU_PER_PX),
        ) else {
            warn!("Image '{}' is too large to place ({}x{})", image.alt, width, height);
            return caption(image);
        };

        let pic = Pic::new_with_dimensions(image.data.clone(), width, height)
            .size(emu_width, emu_height);
        docx_rs::Paragraph::new()
            .add_run(Run::new().add_image(pic))
            .align(AlignmentType::Center)
    }
}

/// Alt text in place of an image that cannot be placed
fn caption(image: &ImageBlock) -> docx_rs::Paragraph {
    to_paragraph(&Paragraph::single(TextRun::new(
        image.alt.clone(),
        crate::mapping::CAPTION_PT,
    )))
}

fn to_run(run: &TextRun) -> Run {
    let mut out = Run::new().add_text(&run.text).size(half_points(run.size));
    if run.bold {
        out = out.bold();
    }
    if run.italic {
        out = out.italic();
    }
    if let Some(color) = run.color {
        out = out.color(color);
    }
    out
}

fn to_paragraph(paragraph: &Paragraph) -> docx_rs::Paragraph {
    let mut out = paragraph
        .runs
        .iter()
        .fold(docx_rs::Paragraph::new(), |p, run| p.add_run(to_run(run)));
    if paragraph.alignment == Alignment::Center {
        out = out.align(AlignmentType::Center);
    }
    out
}

fn to_table(table: &Table) -> docx_rs::Table {
    let rows = table
        .rows
        .iter()
        .map(|cells| {
            TableRow::new(
                cells
                    .iter()
                    .map(|cell| {
                        // Word requires at least one paragraph per cell
                        if cell.paragraphs.is_empty() {
                            docx_rs::TableCell::new().add_paragraph(docx_rs::Paragraph::new())
                        } else {
                            cell.paragraphs
                                .iter()
                                .fold(docx_rs::TableCell::new(), |c, p| {
                                    c.add_paragraph(to_paragraph(p))
                                })
                        }
                    })
                    .collect(),
            )
        })
        .collect();
    docx_rs::Table::new(rows)
}
