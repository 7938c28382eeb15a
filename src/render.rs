//! Masked and highlighted renderings of resolved spans
//!
//! Both outputs come from the same cursor walk; a `RenderStrategy` decides how
//! untouched runs are written and what replaces each span.

use crate::config::MaskStyle;
use crate::detection::{DetectionReport, Direction};
use crate::span::{CharIndex, ResolvedSpans, TextSpan};

/// Per-span formatting used by `render`
pub trait RenderStrategy {
    /// Write a run of source text that is not covered by any span
    fn write_literal(&self, run: &str, out: &mut String);

    /// Write the replacement for `span`; `source` is the covered source text
    fn write_span(&self, span: &TextSpan, source: &str, out: &mut String);
}

/// Walk `text` once, emitting literal runs and span replacements in order
pub fn render<S>(text: &str, spans: &ResolvedSpans, strategy: &S) -> String
where
    S: RenderStrategy + ?Sized,
{
    let index = CharIndex::new(text);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;

    for span in spans {
        strategy.write_literal(index.slice(text, cursor, span.start), &mut out);
        strategy.write_span(span, index.slice(text, span.start, span.end), &mut out);
        cursor = cursor.max(span.end);
    }
    strategy.write_literal(index.slice(text, cursor, index.char_len()), &mut out);

    out
}

/// Plain-text masking
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskStrategy {
    pub style: MaskStyle,
}

impl MaskStrategy {
    pub fn new(style: MaskStyle) -> Self {
        Self { style }
    }
}

impl RenderStrategy for MaskStrategy {
    fn write_literal(&self, run: &str, out: &mut String) {
        out.push_str(run);
    }

    fn write_span(&self, span: &TextSpan, _source: &str, out: &mut String) {
        match self.style {
            MaskStyle::Asterisks => {
                let width = span.text.chars().count().max(span.len());
                out.extend(std::iter::repeat('*').take(width));
            }
            MaskStyle::Tags => {
                out.push('[');
                out.push_str(&span.entity_type);
                out.push(']');
            }
        }
    }
}

/// HTML markup with one element per span, safe to embed without further escaping
#[derive(Debug, Clone, Copy, Default)]
pub struct HighlightStrategy;

impl RenderStrategy for HighlightStrategy {
    fn write_literal(&self, run: &str, out: &mut String) {
        escape_html_into(run, out);
    }

    fn write_span(&self, span: &TextSpan, source: &str, out: &mut String) {
        out.push_str("<span class=\"");
        out.push_str(css_class_for(&span.entity_type));
        out.push_str("\">");
        escape_html_into(source, out);
        out.push_str("</span>");
    }
}

/// CSS class for an entity type, case-insensitive
pub fn css_class_for(entity_type: &str) -> &'static str {
    match entity_type.to_ascii_uppercase().as_str() {
        "PERSON" => "entity-person",
        "COMPANY" => "entity-company",
        "PROJECT" => "entity-project",
        "REKVIZIT" => "entity-rekvizit",
        _ => "entity-default",
    }
}

/// Escape `&`, `<`, `>`, `"` and `'` for HTML text and attribute contexts
pub fn escape_html_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_html_into(text, &mut out);
    out
}

/// Masked plain text
pub fn mask_text(text: &str, spans: &ResolvedSpans, style: MaskStyle) -> String {
    render(text, spans, &MaskStrategy::new(style))
}

/// Highlighted HTML fragment
pub fn highlight_text(text: &str, spans: &ResolvedSpans) -> String {
    render(text, spans, &HighlightStrategy)
}

const PREVIEW_STYLE: &str = "\
body { font-family: sans-serif; margin: 2em; }
pre { white-space: pre-wrap; line-height: 1.5; }
table { border-collapse: collapse; margin-top: 1em; }
td, th { border: 1px solid #ccc; padding: 0.2em 0.6em; text-align: left; vertical-align: top; }
td.payload { font-family: monospace; white-space: pre-wrap; }
.entity-person { background: #ffd6d6; }
.entity-company { background: #d6e4ff; }
.entity-project { background: #e0ffd6; }
.entity-rekvizit { background: #fff3c4; }
.entity-default { background: #e6e6e6; }";

/// Standalone HTML page: highlighted text, detected entities and oracle log
pub fn preview_page(title: &str, highlighted: &str, report: &DetectionReport) -> String {
    let mut page = String::with_capacity(highlighted.len() + 4096);
    page.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>");
    escape_html_into(title, &mut page);
    page.push_str("</title>\n<style>\n");
    page.push_str(PREVIEW_STYLE);
    page.push_str("\n</style>\n</head>\n<body>\n<h1>");
    escape_html_into(title, &mut page);
    page.push_str("</h1>\n<pre>");
    page.push_str(highlighted);
    page.push_str("</pre>\n");

    page.push_str(&format!("<h2>Entities ({})</h2>\n", report.entities.len()));
    if !report.entities.is_empty() {
        page.push_str("<table>\n<tr><th>Type</th><th>Text</th><th>Start</th><th>End</th></tr>\n");
        for span in &report.entities {
            page.push_str("<tr><td class=\"");
            page.push_str(css_class_for(&span.entity_type));
            page.push_str("\">");
            escape_html_into(&span.entity_type, &mut page);
            page.push_str("</td><td>");
            escape_html_into(&span.text, &mut page);
            page.push_str(&format!("</td><td>{}</td><td>{}</td></tr>\n", span.start, span.end));
        }
        page.push_str("</table>\n");
    }

    page.push_str(&format!("<h2>Oracle log ({})</h2>\n", report.log.len()));
    if !report.log.is_empty() {
        page.push_str(
            "<table>\n<tr><th>Direction</th><th>Offset</th><th>Status</th><th>Payload</th></tr>\n",
        );
        for entry in &report.log {
            let direction = match entry.direction {
                Direction::Request => "request",
                Direction::Response => "response",
                Direction::Error => "error",
            };
            let status = entry.status.map(|s| s.to_string()).unwrap_or_default();
            page.push_str(&format!(
                "<tr><td>{direction}</td><td>{}</td><td>{status}</td><td class=\"payload\">",
                entry.offset
            ));
            if let Some(error) = &entry.error {
                escape_html_into(error, &mut page);
                page.push('\n');
            }
            escape_html_into(&entry.body, &mut page);
            page.push_str("</td></tr>\n");
        }
        page.push_str("</table>\n");
    }

    page.push_str("</body>\n</html>\n");
    page
}
