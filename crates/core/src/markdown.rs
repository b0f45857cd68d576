//! Markdown inference over laid-out spans.
//!
//! A post-layout classifier: headings from font-size ratios against the
//! body size, lists from leading bullet/number tokens, indentation from x
//! position, emphasis and code from font-name lexica.

use crate::layout::{self, Block, LayoutParams};
use crate::model::state::TextSpan;
use regex::Regex;
use std::sync::LazyLock;

/// Leading tokens that mark a bulleted list item.
const BULLETS: &[char] = &[
    '\u{2022}', '\u{25CF}', '\u{25CB}', '\u{25A0}', '\u{25A1}', '\u{25AA}', '\u{25AB}',
    '\u{2013}', '\u{2014}', '-', '*',
];

/// Numbered-list prefix: optional paren, digits or a letter, then `.`/`)`/`:`.
static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(?(\d+|[A-Za-z])[.):]\s+").unwrap());

/// Font-name substrings marking bold, italic, and monospace faces.
const BOLD_LEXICON: &[&str] = &["Bold", "Black", "Heavy", "Semibold", "Demi"];
const ITALIC_LEXICON: &[&str] = &["Italic", "Oblique"];
const MONO_LEXICON: &[&str] = &["Mono", "Courier", "Consol", "Typewriter"];

/// Options for Markdown rendering.
#[derive(Debug, Clone)]
pub struct MarkdownOptions {
    /// Detect bullet and numbered lists from text patterns.
    pub detect_lists: bool,
    /// Detect bold/italic/code from font names (skipped when the fonts
    /// carry no names).
    pub detect_emphasis: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            detect_lists: true,
            detect_emphasis: true,
        }
    }
}

/// Heading level for a font-size ratio: >= 1.8/1.5/1.3 gives H1/H2/H3.
pub fn heading_level(font_size: f64, body_size: f64) -> Option<u8> {
    if body_size <= 0.0 || font_size <= 0.0 {
        return None;
    }
    let ratio = font_size / body_size;
    if ratio >= 1.8 {
        Some(1)
    } else if ratio >= 1.5 {
        Some(2)
    } else if ratio >= 1.3 {
        Some(3)
    } else {
        None
    }
}

/// Heading level for a structure-tree tag (H1..H6, or H as H1).
pub fn heading_level_for_tag(tag: &str) -> Option<u8> {
    match tag {
        "H" | "H1" => Some(1),
        "H2" => Some(2),
        "H3" => Some(3),
        "H4" => Some(4),
        "H5" => Some(5),
        "H6" => Some(6),
        _ => None,
    }
}

/// Split a bulleted or numbered list item into (marker, rest).
pub fn detect_list_item(text: &str) -> Option<(String, String)> {
    let trimmed = text.trim_start();
    let mut chars = trimmed.chars();
    if let Some(first) = chars.next() {
        if BULLETS.contains(&first) {
            let after = chars.as_str();
            // The marker must stand alone; "-word" is a hyphenated word.
            if after.is_empty() || after.starts_with(' ') {
                return Some((first.to_string(), after.trim_start().to_string()));
            }
        }
    }
    if let Some(m) = NUMBERED.find(trimmed) {
        let marker = trimmed[..m.end()].trim_end().to_string();
        return Some((marker, trimmed[m.end()..].to_string()));
    }
    None
}

/// Indent level from the left edge: one level per 36 pt, capped at 6.
pub fn indent_level(x0: f64, base_x0: f64) -> usize {
    let level = ((x0 - base_x0).max(0.0) / 36.0).floor() as i64;
    level.clamp(0, 6) as usize
}

fn name_matches(name: &str, lexicon: &[&str]) -> bool {
    let lower = name.to_lowercase();
    lexicon.iter().any(|m| lower.contains(&m.to_lowercase()))
}

fn all_spans_match(spans: &[&TextSpan], lexicon: &[&str]) -> bool {
    !spans.is_empty()
        && spans.iter().all(|s| {
            s.font_name
                .as_deref()
                .is_some_and(|name| name_matches(name, lexicon))
        })
}

/// Render one page's spans as Markdown.
pub fn render_page(
    spans: &[TextSpan],
    page_width: f64,
    layout_params: &LayoutParams,
    options: &MarkdownOptions,
) -> String {
    render_page_with_tags(spans, page_width, layout_params, options, None)
}

/// Render with structure-tree heading levels: spans whose MCID the tree
/// tags as a heading keep that level regardless of font size.
pub fn render_page_with_tags(
    spans: &[TextSpan],
    page_width: f64,
    layout_params: &LayoutParams,
    options: &MarkdownOptions,
    tag_levels: Option<&std::collections::HashMap<u32, u8>>,
) -> String {
    let blocks = layout::analyze(spans, page_width, layout_params);
    if blocks.is_empty() {
        return String::new();
    }
    let body = layout::body_font_size(spans).unwrap_or(12.0);
    let base_x0 = blocks
        .iter()
        .flat_map(|b| b.lines.iter().map(|l| l.x0()))
        .fold(f64::INFINITY, f64::min);

    let mut out = String::new();
    for block in &blocks {
        let rendered = render_block(block, body, base_x0, layout_params, options, tag_levels);
        if rendered.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&rendered);
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Heading level of a block whose spans all carry heading-tagged MCIDs.
fn tagged_level(block: &Block, tag_levels: Option<&std::collections::HashMap<u32, u8>>) -> Option<u8> {
    let tag_levels = tag_levels?;
    let mut level = None;
    for line in &block.lines {
        for span in &line.spans {
            let this = span.mcid.and_then(|mcid| tag_levels.get(&mcid).copied())?;
            if level.is_some_and(|l| l != this) {
                return None;
            }
            level = Some(this);
        }
    }
    level
}

fn render_block(
    block: &Block,
    body: f64,
    base_x0: f64,
    layout_params: &LayoutParams,
    options: &MarkdownOptions,
    tag_levels: Option<&std::collections::HashMap<u32, u8>>,
) -> String {
    let size = layout::dominant_size(
        &block
            .lines
            .iter()
            .flat_map(|l| l.spans.iter().cloned())
            .collect::<Vec<_>>(),
    )
    .unwrap_or(0.0);

    // Heading: tagged as one, or a size ratio over the threshold.
    if let Some(level) = tagged_level(block, tag_levels).or_else(|| heading_level(size, body)) {
        let text = block
            .lines
            .iter()
            .map(|l| l.text(layout_params))
            .collect::<Vec<_>>()
            .join(" ");
        let text = text.trim();
        if !text.is_empty() {
            return format!("{} {}", "#".repeat(level as usize), text);
        }
        return String::new();
    }

    let span_refs: Vec<&TextSpan> = block.lines.iter().flat_map(|l| l.spans.iter()).collect();

    // A block set entirely in a monospace face becomes a code fence.
    if options.detect_emphasis && all_spans_match(&span_refs, MONO_LEXICON) {
        let mut out = String::from("```\n");
        for line in &block.lines {
            out.push_str(line.text(layout_params).trim_end());
            out.push('\n');
        }
        out.push_str("```");
        return out;
    }

    // List items line by line.
    if options.detect_lists {
        let mut items = Vec::new();
        let mut all_items = true;
        for line in &block.lines {
            let text = line.text(layout_params);
            match detect_list_item(&text) {
                Some((marker, rest)) => {
                    let indent = indent_level(line.x0(), base_x0);
                    let bullet = if NUMBERED.is_match(text.trim_start()) {
                        marker
                    } else {
                        "-".to_string()
                    };
                    items.push(format!("{}{} {}", "  ".repeat(indent), bullet, rest));
                }
                None => {
                    all_items = false;
                    break;
                }
            }
        }
        if all_items && !items.is_empty() {
            return items.join("\n");
        }
    }

    // Plain paragraph: lines reflowed with spaces.
    let mut text = block
        .lines
        .iter()
        .map(|l| l.text(layout_params))
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();

    if options.detect_emphasis && !text.is_empty() {
        if all_spans_match(&span_refs, BOLD_LEXICON) {
            text = format!("**{}**", text);
        } else if all_spans_match(&span_refs, ITALIC_LEXICON) {
            text = format!("*{}*", text);
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, x0: f64, y0: f64, x1: f64, size: f64) -> TextSpan {
        TextSpan {
            text: text.to_string(),
            font_size: size,
            font_name: None,
            bbox: (x0, y0, x1, y0 + size),
            mcid: None,
        }
    }

    #[test]
    fn large_span_becomes_heading() {
        let spans = vec![
            span("Title", 10.0, 720.0, 100.0, 24.0),
            span(
                "body text that carries the dominant character weight here",
                10.0,
                640.0,
                400.0,
                12.0,
            ),
        ];
        let md = render_page(&spans, 500.0, &LayoutParams::default(), &MarkdownOptions::default());
        assert!(md.starts_with("# Title\n"), "got: {}", md);
        assert!(md.contains("body text"));
    }

    #[test]
    fn heading_levels_by_ratio() {
        assert_eq!(heading_level(24.0, 12.0), Some(1));
        assert_eq!(heading_level(18.0, 12.0), Some(2));
        assert_eq!(heading_level(16.0, 12.0), Some(3));
        assert_eq!(heading_level(12.0, 12.0), None);
    }

    #[test]
    fn bullet_and_numbered_lists() {
        assert_eq!(
            detect_list_item("\u{2022} first point"),
            Some(("\u{2022}".into(), "first point".into()))
        );
        assert_eq!(
            detect_list_item("- dashed item"),
            Some(("-".into(), "dashed item".into()))
        );
        assert_eq!(
            detect_list_item("1. numbered"),
            Some(("1.".into(), "numbered".into()))
        );
        assert_eq!(
            detect_list_item("(a) lettered"),
            Some(("(a)".into(), "lettered".into()))
        );
        assert_eq!(detect_list_item("plain text"), None);
    }

    #[test]
    fn indent_levels_cap_at_six() {
        assert_eq!(indent_level(72.0, 72.0), 0);
        assert_eq!(indent_level(110.0, 72.0), 1);
        assert_eq!(indent_level(72.0 + 36.0 * 9.0, 72.0), 6);
    }

    #[test]
    fn tag_heading_levels() {
        assert_eq!(heading_level_for_tag("H1"), Some(1));
        assert_eq!(heading_level_for_tag("H6"), Some(6));
        assert_eq!(heading_level_for_tag("P"), None);
    }

    #[test]
    fn mono_block_becomes_code_fence() {
        let mut code = span("let x = 1;", 10.0, 700.0, 80.0, 10.0);
        code.font_name = Some("CourierNewPSMT".into());
        let mut body = span(
            "surrounding prose with enough characters to set the body size",
            10.0,
            650.0,
            400.0,
            12.0,
        );
        body.font_name = Some("Helvetica".into());
        let md = render_page(
            &[code, body],
            500.0,
            &LayoutParams::default(),
            &MarkdownOptions::default(),
        );
        assert!(md.contains("```\nlet x = 1;\n```"), "got: {}", md);
    }
}
