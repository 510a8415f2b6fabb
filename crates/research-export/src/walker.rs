//! Walks a report's DOM and emits document blocks

use crate::blocks::{DocumentBlock, Paragraph, TextRun};
use crate::mapping::{self, BODY_PT};
use scraper::{ElementRef, Html, Node};
use std::collections::HashSet;
use tracing::debug;

/// Converts report HTML into [`DocumentBlock`]s
///
/// Each slide becomes one page. Slides are the outermost `div`s with a class
/// containing `slide`; nested matches such as `slide-content` belong to the
/// slide around them. Without any slide the whole body is one page.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlWalker;

impl HtmlWalker {
    pub fn new() -> Self {
        Self
    }

    pub fn convert(&self, html: &str) -> Vec<DocumentBlock> {
        let document = Html::parse_document(html);
        let slides = Self::slides(&document);
        debug!("Converting {} slide(s)", slides.len().max(1));

        let mut blocks = Vec::new();
        if slides.is_empty() {
            let root = document.root_element();
            let body = root
                .descendants()
                .filter_map(ElementRef::wrap)
                .find(|e| e.value().name() == "body")
                .unwrap_or(root);
            Self::walk(body, &mut blocks);
            return blocks;
        }

        for (i, slide) in slides.into_iter().enumerate() {
            if i > 0 {
                blocks.push(DocumentBlock::PageBreak);
            }
            Self::walk(slide, &mut blocks);
        }
        blocks
    }

    fn is_slide(element: &ElementRef<'_>) -> bool {
        element.value().name() == "div" && element.value().classes().any(|c| c.contains("slide"))
    }

    fn slides(document: &Html) -> Vec<ElementRef<'_>> {
        let candidates: Vec<ElementRef<'_>> = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(Self::is_slide)
            .collect();
        let ids: HashSet<_> = candidates.iter().map(|e| e.id()).collect();

        candidates
            .into_iter()
            .filter(|e| !e.ancestors().any(|a| ids.contains(&a.id())))
            .collect()
    }

    fn walk(element: ElementRef<'_>, out: &mut Vec<DocumentBlock>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    let content = mapping::collapse(text);
                    if !content.is_empty() {
                        out.push(DocumentBlock::Paragraph(Paragraph::single(TextRun::new(
                            content, BODY_PT,
                        ))));
                    }
                }
                Node::Element(_) => {
                    let Some(child) = ElementRef::wrap(child) else {
                        continue;
                    };
                    match mapping::lookup(&child) {
                        Some(emit) => emit(child, out),
                        None => Self::walk(child, out),
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::colors::BROWN_BLACK;

    fn paragraphs(blocks: &[DocumentBlock]) -> Vec<String> {
        blocks
            .iter()
            .filter_map(DocumentBlock::as_paragraph)
            .map(Paragraph::text)
            .collect()
    }

    #[test]
    fn test_report_title_at_57pt() {
        let blocks = HtmlWalker::new().convert(r#"<h1 class="report-title">Acme Corp</h1>"#);

        let title = blocks[0].as_paragraph().unwrap();
        assert_eq!(title.text(), "Acme Corp");
        assert!((title.runs[0].size - 57.0).abs() < f32::EPSILON);
        assert_eq!(title.runs[0].color, Some(BROWN_BLACK));
    }

    #[test]
    fn test_slides_become_pages() {
        let html = r#"
            <html><head><style>.slide { color: red; }</style></head><body>
            <div class="presentation-container">
              <div class="slide">
                <div class="slide-content">
                  <h1 class="report-title">Acme Corp</h1>
                  <p class="report-subtitle">Investment Analysis | ACME</p>
                </div>
                <div class="report-footer"><p>Acme</p><p>Page 1</p></div>
              </div>
              <div class="slide report-prose">
                <div class="slide-content">
                  <h2 class="section-title">Valuation</h2>
                  <p>Cheap.</p>
                </div>
              </div>
            </div>
            </body></html>"#;

        let blocks = HtmlWalker::new().convert(html);

        let breaks = blocks
            .iter()
            .filter(|b| matches!(b, DocumentBlock::PageBreak))
            .count();
        assert_eq!(breaks, 1);
        assert_eq!(
            paragraphs(&blocks),
            vec![
                "Acme Corp",
                "Investment Analysis | ACME",
                "Acme | Page 1",
                "Valuation",
                "Cheap."
            ]
        );
    }

    #[test]
    fn test_loose_text_and_skipped_elements() {
        let html = "<body><div>Loose <span>words</span><script>var x = 1;</script></div></body>";
        let blocks = HtmlWalker::new().convert(html);
        assert_eq!(paragraphs(&blocks), vec!["Loose", "words"]);
        assert!(
            blocks
                .iter()
                .filter_map(DocumentBlock::as_paragraph)
                .all(|p| (p.runs[0].size - 18.0).abs() < f32::EPSILON)
        );
    }
}
