//! HTML element → document block mapping
//!
//! [`MAPPING`] is scanned top to bottom for every element the walker visits.
//! The first row whose [`Match`] accepts the element emits its blocks and the
//! walker does not descend into it. Class rows come before tag rows so that
//! `<h1 class="report-title">` is styled as a title rather than a heading.
//! Sizes are points, taken from the report stylesheet.

use crate::blocks::{
    DocumentBlock, ImageBlock, Paragraph, Table, TableCell, TextRun,
    colors::{BLUE_DARKER, BROWN_BLACK, TEXT_SECONDARY},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use scraper::{ElementRef, Node};
use tracing::debug;

pub const TITLE_PT: f32 = 57.0;
pub const SUBTITLE_PT: f32 = 27.0;
pub const SECTION_TITLE_PT: f32 = 26.0;
pub const FOOTER_PT: f32 = 17.0;
pub const BODY_PT: f32 = 18.0;
pub const LIST_PT: f32 = 16.0;
pub const TABLE_PT: f32 = 14.0;
pub const METRIC_LABEL_PT: f32 = 10.0;
pub const METRIC_VALUE_PT: f32 = 14.0;
pub const CAPTION_PT: f32 = 10.0;

const METRICS_COLUMNS: usize = 5;
const METRICS_MAX_ITEMS: usize = 25;

/// Selector for one mapping row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub tag: Option<&'static str>,
    pub class: Option<&'static str>,
}

impl Match {
    pub const fn class(class: &'static str) -> Self {
        Self {
            tag: None,
            class: Some(class),
        }
    }

    pub const fn tag(tag: &'static str) -> Self {
        Self {
            tag: Some(tag),
            class: None,
        }
    }

    pub fn matches(&self, element: &ElementRef<'_>) -> bool {
        let value = element.value();
        self.tag.is_none_or(|tag| value.name().eq_ignore_ascii_case(tag))
            && self.class.is_none_or(|class| value.classes().any(|c| c == class))
    }
}

pub type Emitter = fn(ElementRef<'_>, &mut Vec<DocumentBlock>);

pub static MAPPING: &[(Match, Emitter)] = &[
    (Match::class("report-title"), emit_report_title),
    (Match::class("report-subtitle"), emit_report_subtitle),
    (Match::class("section-title"), emit_section_title),
    (Match::class("metrics-grid"), emit_metrics_grid),
    (Match::class("report-footer"), emit_report_footer),
    (Match::tag("h1"), emit_heading),
    (Match::tag("h2"), emit_heading),
    (Match::tag("h3"), emit_heading),
    (Match::tag("h4"), emit_heading),
    (Match::tag("h5"), emit_heading),
    (Match::tag("h6"), emit_heading),
    (Match::tag("p"), emit_paragraph),
    (Match::tag("ul"), emit_list),
    (Match::tag("ol"), emit_list),
    (Match::tag("table"), emit_table),
    (Match::tag("img"), emit_image),
    (Match::tag("script"), emit_nothing),
    (Match::tag("style"), emit_nothing),
    (Match::tag("svg"), emit_nothing),
    (Match::tag("canvas"), emit_nothing),
];

/// The emitter for `element`, if any row matches
pub fn lookup(element: &ElementRef<'_>) -> Option<Emitter> {
    MAPPING
        .iter()
        .find(|(rule, _)| rule.matches(element))
        .map(|(_, emit)| *emit)
}

/// Whitespace-collapsed text of an element and its descendants
pub fn element_text(element: &ElementRef<'_>) -> String {
    collapse(&element.text().collect::<String>())
}

pub fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Runs for mixed inline content, bold/italic tracked through
/// `strong`/`b`/`em`/`i`
pub fn inline_runs(element: &ElementRef<'_>, base: &TextRun) -> Vec<TextRun> {
    let mut runs = Vec::new();
    collect_runs(element, base, &mut runs);

    // Collapse whitespace across run boundaries, then trim the ends.
    let mut last_space = true;
    for run in &mut runs {
        let mut text = String::with_capacity(run.text.len());
        for c in run.text.chars() {
            if c.is_whitespace() {
                if !last_space {
                    text.push(' ');
                }
                last_space = true;
            } else {
                text.push(c);
                last_space = false;
            }
        }
        run.text = text;
    }
    if let Some(last) = runs.iter_mut().rev().find(|r| !r.text.is_empty()) {
        let trimmed = last.text.trim_end().len();
        last.text.truncate(trimmed);
    }
    runs.retain(|r| !r.text.is_empty());
    runs
}

fn collect_runs(element: &ElementRef<'_>, style: &TextRun, runs: &mut Vec<TextRun>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let content: &str = text;
                let mut run = style.clone();
                run.text = content.to_string();
                runs.push(run);
            }
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                let mut nested = style.clone();
                match child.value().name() {
                    "strong" | "b" => nested.bold = true,
                    "em" | "i" => nested.italic = true,
                    "br" => {
                        let mut run = style.clone();
                        run.text = " ".to_string();
                        runs.push(run);
                        continue;
                    }
                    "script" | "style" => continue,
                    _ => {}
                }
                collect_runs(&child, &nested, runs);
            }
            _ => {}
        }
    }
}

fn text_paragraph(element: &ElementRef<'_>, mut run: TextRun, out: &mut Vec<DocumentBlock>) {
    let text = element_text(element);
    if !text.is_empty() {
        run.text = text;
        out.push(DocumentBlock::Paragraph(Paragraph::single(run)));
    }
}

fn emit_report_title(element: ElementRef<'_>, out: &mut Vec<DocumentBlock>) {
    text_paragraph(
        &element,
        TextRun::new("", TITLE_PT).bold().color(BROWN_BLACK),
        out,
    );
}

fn emit_report_subtitle(element: ElementRef<'_>, out: &mut Vec<DocumentBlock>) {
    text_paragraph(&element, TextRun::new("", SUBTITLE_PT), out);
}

fn emit_section_title(element: ElementRef<'_>, out: &mut Vec<DocumentBlock>) {
    text_paragraph(
        &element,
        TextRun::new("", SECTION_TITLE_PT).bold().color(BLUE_DARKER),
        out,
    );
}

fn emit_report_footer(element: ElementRef<'_>, out: &mut Vec<DocumentBlock>) {
    let parts: Vec<String> = element
        .children()
        .filter_map(ElementRef::wrap)
        .map(|child| element_text(&child))
        .filter(|text| !text.is_empty())
        .collect();
    let text = if parts.is_empty() {
        element_text(&element)
    } else {
        parts.join(" | ")
    };
    if !text.is_empty() {
        let run = TextRun::new(text, FOOTER_PT).color(TEXT_SECONDARY);
        out.push(DocumentBlock::Paragraph(Paragraph::single(run).centered()));
    }
}

fn heading_size(tag: &str) -> f32 {
    match tag {
        "h1" => 28.0,
        "h2" => 24.0,
        "h3" => 20.0,
        "h4" => 18.0,
        "h5" => 16.0,
        _ => 14.0,
    }
}

fn emit_heading(element: ElementRef<'_>, out: &mut Vec<DocumentBlock>) {
    let size = heading_size(&element.value().name().to_ascii_lowercase());
    text_paragraph(
        &element,
        TextRun::new("", size).bold().color(BLUE_DARKER),
        out,
    );
}

fn emit_paragraph(element: ElementRef<'_>, out: &mut Vec<DocumentBlock>) {
    let runs = inline_runs(&element, &TextRun::new("", BODY_PT));
    if !runs.is_empty() {
        out.push(DocumentBlock::Paragraph(Paragraph::new(runs)));
    }
}

fn emit_list(element: ElementRef<'_>, out: &mut Vec<DocumentBlock>) {
    let ordered = element.value().name().eq_ignore_ascii_case("ol");
    let items = element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name().eq_ignore_ascii_case("li"));

    for (i, item) in items.enumerate() {
        let mut runs = inline_runs(&item, &TextRun::new("", LIST_PT));
        if runs.is_empty() {
            continue;
        }
        let marker = if ordered {
            format!("{}. ", i + 1)
        } else {
            "• ".to_string()
        };
        runs.insert(0, TextRun::new(marker, LIST_PT));
        out.push(DocumentBlock::Paragraph(Paragraph::new(runs)));
    }
}

fn first_with_class(element: &ElementRef<'_>, class: &str) -> Option<String> {
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().classes().any(|c| c == class))
        .map(|e| element_text(&e))
}

fn emit_metrics_grid(element: ElementRef<'_>, out: &mut Vec<DocumentBlock>) {
    let with_class = |class: &'static str| {
        element
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(move |e| e.value().classes().any(|c| c == class))
    };

    let mut items: Vec<(String, String)> = with_class("metrics-item")
        .map(|item| {
            (
                first_with_class(&item, "label").unwrap_or_default(),
                first_with_class(&item, "value").unwrap_or_default(),
            )
        })
        .collect();
    if items.is_empty() {
        items = with_class("label")
            .map(|e| element_text(&e))
            .zip(with_class("value").map(|e| element_text(&e)))
            .collect();
    }
    if items.is_empty() {
        return;
    }
    if items.len() > METRICS_MAX_ITEMS {
        debug!("Metrics grid truncated from {} items", items.len());
        items.truncate(METRICS_MAX_ITEMS);
    }

    let rows = items
        .chunks(METRICS_COLUMNS)
        .map(|chunk| {
            let mut cells: Vec<TableCell> = chunk
                .iter()
                .map(|(label, value)| TableCell {
                    paragraphs: vec![
                        Paragraph::single(
                            TextRun::new(label.clone(), METRIC_LABEL_PT)
                                .bold()
                                .color(TEXT_SECONDARY),
                        ),
                        Paragraph::single(TextRun::new(value.clone(), METRIC_VALUE_PT).bold()),
                    ],
                })
                .collect();
            cells.resize(METRICS_COLUMNS, TableCell::default());
            cells
        })
        .collect();
    out.push(DocumentBlock::Table(Table { rows }));
}

fn emit_table(element: ElementRef<'_>, out: &mut Vec<DocumentBlock>) {
    let rows: Vec<Vec<TableCell>> = element
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name().eq_ignore_ascii_case("tr"))
        .map(|row| {
            row.children()
                .filter_map(ElementRef::wrap)
                .filter_map(|cell| {
                    let base = match cell.value().name() {
                        "th" => TextRun::new("", TABLE_PT).bold().color(BLUE_DARKER),
                        "td" => TextRun::new("", TABLE_PT),
                        _ => return None,
                    };
                    let runs = inline_runs(&cell, &base);
                    Some(TableCell {
                        paragraphs: vec![Paragraph::new(runs)],
                    })
                })
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();

    if rows.is_empty() {
        return;
    }
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let rows = rows
        .into_iter()
        .map(|mut cells| {
            cells.resize(columns, TableCell::default());
            cells
        })
        .collect();
    out.push(DocumentBlock::Table(Table { rows }));
}

/// Payload of a `data:image/png|jpeg;base64,` URI
fn decode_data_uri(src: &str) -> Option<Vec<u8>> {
    let rest = src.strip_prefix("data:image/")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    if !matches!(mime, "png" | "jpeg" | "jpg") {
        return None;
    }
    STANDARD.decode(payload.trim()).ok()
}

fn emit_image(element: ElementRef<'_>, out: &mut Vec<DocumentBlock>) {
    let alt = element.value().attr("alt").unwrap_or_default().trim();
    let src = element.value().attr("src").unwrap_or_default();

    if let Some(data) = decode_data_uri(src) {
        out.push(DocumentBlock::Image(ImageBlock {
            data,
            alt: alt.to_string(),
        }));
    } else if !alt.is_empty() {
        let run = TextRun::new(alt, CAPTION_PT).italic().color(TEXT_SECONDARY);
        out.push(DocumentBlock::Paragraph(Paragraph::single(run)));
    }
}

fn emit_nothing(_element: ElementRef<'_>, _out: &mut Vec<DocumentBlock>) {}
