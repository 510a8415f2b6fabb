//! HTML slide deck stitched from analyst results
//!
//! The deck is a `div.presentation-container` of fixed-size `div.slide`
//! pages: a cover with the company name and a metrics grid, then one slide
//! per successful analyst. The class names are the ones the Word exporter
//! maps to styled paragraphs.

use research_core::{AnalysisContext, AnalysisResult};
use research_market::FinancialSnapshot;

const STYLESHEET: &str = r"
:root { --brown-black: #3B312A; --blue: #005F90; --blue-darker: #003D5A; --text-dark: #1A1A1A; --text-secondary: #333333; --bg-light: #FFFFFF; }
* { margin: 0; padding: 0; box-sizing: border-box; }
html { background-color: #DDE2E7; }
body { font-family: Arial, 'Helvetica Neue', sans-serif; color: var(--text-dark); line-height: 1.5; font-size: 18px; }
h1, h2, h3, h4, h5, h6 { font-weight: 700; color: var(--brown-black); margin-bottom: 0.3rem; }
.presentation-container { width: 1620px; display: flex; flex-direction: column; }
.slide { width: 1620px; height: 2291px; background-color: var(--bg-light); position: relative; overflow: hidden; display: flex; flex-direction: column; border-bottom: 5px solid var(--blue); padding: 105px 98px; }
.slide:last-child { border-bottom: none; }
.slide-content { flex-grow: 1; display: flex; flex-direction: column; gap: 15px; }
.report-footer { position: absolute; bottom: 45px; left: 98px; right: 98px; padding-top: 12px; border-top: 5px solid var(--blue); display: flex; justify-content: space-between; font-size: 16.5pt; color: var(--text-secondary); }
.report-title { font-size: 57px; font-weight: 700; line-height: 1.0; }
.report-subtitle { font-size: 27px; font-weight: 400; margin-bottom: 22.5px; }
.section-title { font-size: 25.5px; font-weight: 700; padding-bottom: 7.5px; border-bottom: 5px solid var(--blue); margin-bottom: 18px; color: var(--blue-darker); }
.metrics-grid { display: grid; grid-template-columns: repeat(5, 1fr); gap: 1px 2px; padding: 5px 0; border-top: 5px solid var(--blue); border-bottom: 5px solid var(--blue); }
.metrics-item .label { font-size: 10pt; font-weight: 700; color: var(--text-secondary); }
.metrics-item .value { font-size: 14pt; font-weight: 700; }
ul, ol { padding-left: 27px; }
li { margin-bottom: 5px; }
.sources li { font-size: 14px; color: var(--text-secondary); word-break: break-all; }
";

/// Escape text for use in element content and quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Escaped text with `**bold**` spans turned into `<strong>`
///
/// An unpaired `**` is kept literally. Citation markers like `[3]` pass
/// through untouched.
fn inline(text: &str) -> String {
    let escaped = escape_html(text);
    let parts: Vec<&str> = escaped.split("**").collect();
    let paired = if parts.len() % 2 == 1 {
        parts.len()
    } else {
        parts.len() - 1
    };

    let mut html = String::with_capacity(escaped.len() + 16);
    for (i, part) in parts.iter().enumerate() {
        if i >= paired {
            html.push_str("**");
            html.push_str(part);
        } else if i % 2 == 1 {
            html.push_str("<strong>");
            html.push_str(part);
            html.push_str("</strong>");
        } else {
            html.push_str(part);
        }
    }
    html
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Block {
    None,
    Paragraph,
    Bullets,
    Numbered,
}

struct MarkdownWriter {
    html: String,
    open: Block,
    paragraph: Vec<String>,
}

impl MarkdownWriter {
    fn new() -> Self {
        Self {
            html: String::new(),
            open: Block::None,
            paragraph: Vec::new(),
        }
    }

    fn close(&mut self) {
        match self.open {
            Block::Paragraph => {
                let text = self.paragraph.join(" ");
                self.html.push_str(&format!("<p>{}</p>\n", inline(&text)));
                self.paragraph.clear();
            }
            Block::Bullets => self.html.push_str("</ul>\n"),
            Block::Numbered => self.html.push_str("</ol>\n"),
            Block::None => {}
        }
        self.open = Block::None;
    }

    fn enter(&mut self, block: Block) {
        if self.open == block {
            return;
        }
        self.close();
        match block {
            Block::Bullets => self.html.push_str("<ul>\n"),
            Block::Numbered => self.html.push_str("<ol>\n"),
            Block::Paragraph | Block::None => {}
        }
        self.open = block;
    }

    fn heading(&mut self, level: usize, text: &str) {
        self.close();
        if level <= 2 {
            self.html
                .push_str(&format!("<h2 class=\"section-title\">{}</h2>\n", inline(text)));
        } else {
            let tag = (level + 1).min(6);
            self.html
                .push_str(&format!("<h{tag}>{}</h{tag}>\n", inline(text)));
        }
    }

    fn item(&mut self, block: Block, text: &str) {
        self.enter(block);
        self.html.push_str(&format!("<li>{}</li>\n", inline(text)));
    }

    fn text(&mut self, line: &str) {
        self.enter(Block::Paragraph);
        self.paragraph.push(line.to_string());
    }

    fn finish(mut self) -> String {
        self.close();
        self.html
    }
}

fn heading_level(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|&c| c == '#').count();
    if (1..=6).contains(&level) {
        let rest = &line[level..];
        if rest.starts_with(' ') {
            return Some((level, rest.trim()));
        }
    }
    None
}

fn numbered_item(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    line[digits..].strip_prefix(". ").map(str::trim)
}

/// Convert analyst markdown to HTML
///
/// Handles headings, `-`/`*` bullets, numbered lists, paragraphs and bold
/// spans. Everything else is escaped text.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut writer = MarkdownWriter::new();

    for raw in markdown.lines() {
        let line = raw.trim();
        if line.is_empty() {
            writer.close();
        } else if line.chars().all(|c| matches!(c, '-' | '*' | '_')) && line.len() >= 3 {
            writer.close();
        } else if let Some((level, text)) = heading_level(line) {
            writer.heading(level, text);
        } else if let Some(text) = line
            .strip_prefix("- ")
            .or_else(|| line.strip_prefix("* "))
            .or_else(|| line.strip_prefix("• "))
        {
            writer.item(Block::Bullets, text.trim());
        } else if let Some(text) = numbered_item(line) {
            writer.item(Block::Numbered, text);
        } else {
            writer.text(line);
        }
    }

    writer.finish()
}

fn footer(context: &AnalysisContext, page: usize) -> String {
    format!(
        "<div class=\"report-footer\">\n<p>{} ({}) Investment Analysis</p>\n<p>Page {page}</p>\n</div>\n",
        escape_html(context.company_name()),
        escape_html(context.ticker()),
    )
}

fn cover_slide(context: &AnalysisContext, snapshot: &FinancialSnapshot) -> String {
    let mut html = String::from("<div class=\"slide\">\n<div class=\"slide-content\">\n");
    html.push_str(&format!(
        "<h1 class=\"report-title\">{}</h1>\n",
        escape_html(context.company_name())
    ));
    html.push_str(&format!(
        "<p class=\"report-subtitle\">Investment Analysis | {}</p>\n",
        escape_html(context.ticker())
    ));
    html.push_str(&format!(
        "<p>Prepared {}</p>\n",
        context.timestamp().format("%B %-d, %Y")
    ));

    html.push_str("<div class=\"metrics-grid\">\n");
    for (label, value) in snapshot.display_metrics() {
        html.push_str(&format!(
            "<div class=\"metrics-item\"><div class=\"label\">{}</div><div class=\"value\">{}</div></div>\n",
            escape_html(label),
            escape_html(&value)
        ));
    }
    html.push_str("</div>\n");

    if !context.user_query().is_empty() {
        html.push_str("<h2 class=\"section-title\">Research Question</h2>\n");
        html.push_str(&format!("<p>{}</p>\n", escape_html(context.user_query())));
    }

    html.push_str("</div>\n");
    html.push_str(&footer(context, 1));
    html.push_str("</div>\n");
    html
}

fn analyst_slide(context: &AnalysisContext, result: &AnalysisResult, page: usize) -> String {
    let mut html = String::from("<div class=\"slide\">\n<div class=\"slide-content\">\n");
    html.push_str(&format!("<h1>{}</h1>\n", escape_html(result.analyst.name())));
    html.push_str(&markdown_to_html(result.content().unwrap_or_default()));

    if !result.data_sources.is_empty() {
        html.push_str("<h3>Sources</h3>\n<ol class=\"sources\">\n");
        for source in &result.data_sources {
            html.push_str(&format!("<li>{}</li>\n", escape_html(source)));
        }
        html.push_str("</ol>\n");
    }

    html.push_str("</div>\n");
    html.push_str(&footer(context, page));
    html.push_str("</div>\n");
    html
}

/// Full HTML document: cover plus one slide per successful result
pub fn render_report(
    context: &AnalysisContext,
    snapshot: &FinancialSnapshot,
    results: &[AnalysisResult],
) -> String {
    let mut slides = cover_slide(context, snapshot);
    for (i, result) in results.iter().filter(|r| r.is_success()).enumerate() {
        slides.push_str(&analyst_slide(context, result, i + 2));
    }

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n<title>{} ({}) - Investment Analysis</title>\n<style>{STYLESHEET}</style>\n</head>\n<body>\n<div class=\"presentation-container\">\n{slides}</div>\n</body>\n</html>\n",
        escape_html(context.company_name()),
        escape_html(context.ticker()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_core::AnalystKind;
    use serde_json::{Map, json};

    fn context() -> AnalysisContext {
        AnalysisContext::builder("Acme & Sons", "ACME").build().unwrap()
    }

    fn completed(kind: AnalystKind, text: &str) -> AnalysisResult {
        let mut data = Map::new();
        data.insert("streaming_analysis".into(), json!(text));
        AnalysisResult::completed(kind, data, 1.0)
    }

    #[test]
    fn test_markdown_blocks() {
        let html = markdown_to_html(
            "## Valuation\nShares trade at **12x** earnings [1].\nUpside is limited.\n\n- Margin <5%\n* Debt rising\n\n1. Trim\n2. Hold\n### Detail\n",
        );

        assert!(html.contains("<h2 class=\"section-title\">Valuation</h2>"));
        assert!(html.contains(
            "<p>Shares trade at <strong>12x</strong> earnings [1]. Upside is limited.</p>"
        ));
        assert!(html.contains("<ul>\n<li>Margin &lt;5%</li>\n<li>Debt rising</li>\n</ul>"));
        assert!(html.contains("<ol>\n<li>Trim</li>\n<li>Hold</li>\n</ol>"));
        assert!(html.contains("<h4>Detail</h4>"));
    }

    #[test]
    fn test_inline_escapes_and_unpaired_bold() {
        assert_eq!(inline("<b>x</b>"), "&lt;b&gt;x&lt;/b&gt;");
        assert_eq!(inline("a **b** c **d"), "a <strong>b</strong> c **d");
        assert_eq!(inline("#1 pick"), "#1 pick");
    }

    #[test]
    fn test_report_structure() {
        let snapshot = FinancialSnapshot {
            symbol: "ACME".to_string(),
            current_price: Some(42.0),
            ..Default::default()
        };
        let results = vec![
            completed(AnalystKind::Fundamentals, "## Summary\nSolid."),
            AnalysisResult::failed(AnalystKind::Risk, "quota", 0.5),
            completed(AnalystKind::Esg, "Clean.")
                .with_sources(vec!["https://acme.example/esg".to_string()]),
        ];

        let html = render_report(&context(), &snapshot, &results);

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Acme &amp; Sons (ACME) - Investment Analysis</title>"));
        assert!(html.contains("<h1 class=\"report-title\">Acme &amp; Sons</h1>"));
        assert!(html.contains("<div class=\"label\">Current Price</div><div class=\"value\">$42.00</div>"));
        assert!(html.contains("<div class=\"label\">Market Cap</div><div class=\"value\">N/A</div>"));
        assert_eq!(html.matches("<div class=\"slide\">").count(), 3);
        assert!(html.contains("<h1>Senior Fundamental Research Analyst</h1>"));
        assert!(!html.contains("quota"));
        assert!(html.contains("<li>https://acme.example/esg</li>"));
        assert!(html.contains("<p>Page 3</p>"));
    }
}
