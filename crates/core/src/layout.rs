//! Layout analysis: reading order from positioned spans.
//!
//! Spans are grouped into baseline lines, lines into columns (via vertical
//! gutters), and columns into paragraphs. Thresholds follow the layout
//! parameters; none are inferred from font metrics.

use crate::model::state::TextSpan;

/// Parameters controlling layout analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutParams {
    /// Baseline bucket tolerance as a fraction of the median font size
    /// (0.25 gives the conventional ~3 pt at a 12 pt body).
    pub line_tolerance_ratio: f64,
    /// Minimum x-gap for an inter-word space, as a fraction of the
    /// preceding glyph's em. Deliberately an explicit option; never derived
    /// from the font's space width.
    pub space_gap_ratio: f64,
    /// Minimum width of a vertical gutter between columns, in points.
    pub min_gutter: f64,
    /// Lines wider than this fraction of the page are ignored when hunting
    /// for gutters (titles spanning all columns).
    pub wide_line_ratio: f64,
    /// Vertical gap ending a paragraph, as a multiple of the body size.
    pub paragraph_gap_ratio: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            line_tolerance_ratio: 0.25,
            space_gap_ratio: 0.15,
            min_gutter: 12.0,
            wide_line_ratio: 0.6,
            paragraph_gap_ratio: 1.2,
        }
    }
}

/// One reconstructed line: spans sharing a baseline, ordered by x.
#[derive(Debug, Clone)]
pub struct Line {
    pub spans: Vec<TextSpan>,
    /// Baseline y of the first span in the bucket
    pub y: f64,
}

impl Line {
    pub fn x0(&self) -> f64 {
        self.spans
            .iter()
            .map(|s| s.x0())
            .fold(f64::INFINITY, f64::min)
    }

    pub fn x1(&self) -> f64 {
        self.spans
            .iter()
            .map(|s| s.x1())
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn width(&self) -> f64 {
        self.x1() - self.x0()
    }

    /// Character-weighted dominant font size of the line.
    pub fn font_size(&self) -> f64 {
        dominant_size(&self.spans).unwrap_or(0.0)
    }

    /// Assemble the line's text, inserting spaces at word gaps.
    pub fn text(&self, params: &LayoutParams) -> String {
        let mut out = String::new();
        let mut prev: Option<&TextSpan> = None;
        for span in &self.spans {
            if let Some(prev) = prev {
                let gap = span.x0() - prev.x1();
                let em = prev.font_size.max(1e-6);
                if gap > params.space_gap_ratio * em
                    && !out.ends_with(' ')
                    && !span.text.starts_with(' ')
                {
                    out.push(' ');
                }
            }
            out.push_str(&span.text);
            prev = Some(span);
        }
        out
    }
}

/// A paragraph: consecutive lines without a large vertical gap.
#[derive(Debug, Clone)]
pub struct Block {
    pub lines: Vec<Line>,
}

/// Group spans into lines by baseline, top to bottom.
pub fn group_lines(spans: &[TextSpan], params: &LayoutParams) -> Vec<Line> {
    let median = median_size(spans).unwrap_or(12.0);
    let tolerance = (params.line_tolerance_ratio * median).max(1.0);

    let mut sorted: Vec<&TextSpan> = spans.iter().filter(|s| !s.text.is_empty()).collect();
    // Device y grows upward: higher lines first.
    sorted.sort_by(|a, b| b.y0().partial_cmp(&a.y0()).unwrap_or(std::cmp::Ordering::Equal));

    let mut lines: Vec<Line> = Vec::new();
    for span in sorted {
        match lines
            .iter_mut()
            .find(|line| (line.y - span.y0()).abs() <= tolerance)
        {
            Some(line) => line.spans.push(span.clone()),
            None => lines.push(Line {
                y: span.y0(),
                spans: vec![span.clone()],
            }),
        }
    }

    for line in &mut lines {
        line.spans
            .sort_by(|a, b| a.x0().partial_cmp(&b.x0()).unwrap_or(std::cmp::Ordering::Equal));
    }
    lines
}

/// Identify vertical gutters: x-ranges no span covers.
///
/// Page-wide spans (titles crossing every column) are excluded from the
/// coverage. Returns gutter center positions, left to right.
fn find_gutters(spans: &[TextSpan], page_width: f64, params: &LayoutParams) -> Vec<f64> {
    let mut intervals: Vec<(f64, f64)> = spans
        .iter()
        .filter(|s| s.width() < params.wide_line_ratio * page_width)
        .map(|s| (s.x0(), s.x1()))
        .collect();
    if intervals.is_empty() {
        return Vec::new();
    }
    intervals.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut merged: Vec<(f64, f64)> = Vec::new();
    for (x0, x1) in intervals {
        match merged.last_mut() {
            Some(last) if x0 <= last.1 + 1.0 => last.1 = last.1.max(x1),
            _ => merged.push((x0, x1)),
        }
    }

    merged
        .windows(2)
        .filter(|w| w[1].0 - w[0].1 >= params.min_gutter)
        .map(|w| (w[0].1 + w[1].0) / 2.0)
        .collect()
}

/// Partition lines into columns and paragraphs in reading order.
///
/// Columns are emitted left to right, each top to bottom; a vertical gap
/// larger than `paragraph_gap_ratio` times the body size starts a new block.
pub fn analyze(spans: &[TextSpan], page_width: f64, params: &LayoutParams) -> Vec<Block> {
    if spans.is_empty() {
        return Vec::new();
    }
    let body = body_font_size(spans).unwrap_or(12.0);
    let gutters = find_gutters(spans, page_width, params);

    // Assign each span to the column holding its x-center, then rebuild
    // lines per column so baselines never merge across a gutter.
    let ncols = gutters.len() + 1;
    let mut columns: Vec<Vec<TextSpan>> = vec![Vec::new(); ncols];
    for span in spans {
        let center = (span.x0() + span.x1()) / 2.0;
        let col = gutters.iter().take_while(|&&g| center > g).count();
        columns[col].push(span.clone());
    }

    let mut blocks = Vec::new();
    for column in columns {
        let mut current: Vec<Line> = Vec::new();
        for line in group_lines(&column, params) {
            if let Some(prev) = current.last() {
                let gap = prev.y - line.y;
                if gap > params.paragraph_gap_ratio * body {
                    blocks.push(Block {
                        lines: std::mem::take(&mut current),
                    });
                }
            }
            current.push(line);
        }
        if !current.is_empty() {
            blocks.push(Block { lines: current });
        }
    }
    blocks
}

/// Median font size over non-empty spans.
fn median_size(spans: &[TextSpan]) -> Option<f64> {
    let mut sizes: Vec<f64> = spans
        .iter()
        .filter(|s| s.font_size > 0.0 && !s.text.trim().is_empty())
        .map(|s| s.font_size)
        .collect();
    if sizes.is_empty() {
        return None;
    }
    sizes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some(sizes[sizes.len() / 2])
}

/// The body font size: the size with the largest character-weighted
/// occurrence, binned to 0.1 pt.
pub fn body_font_size(spans: &[TextSpan]) -> Option<f64> {
    let mut weights: std::collections::HashMap<i64, usize> = std::collections::HashMap::new();
    for span in spans {
        let chars = span.text.chars().filter(|c| !c.is_whitespace()).count();
        if chars == 0 || span.font_size <= 0.0 {
            continue;
        }
        let bin = (span.font_size * 10.0).round() as i64;
        *weights.entry(bin).or_insert(0) += chars;
    }
    weights
        .into_iter()
        .max_by_key(|&(bin, weight)| (weight, bin))
        .map(|(bin, _)| bin as f64 / 10.0)
}

/// Character-weighted dominant size within a span slice.
pub fn dominant_size(spans: &[TextSpan]) -> Option<f64> {
    body_font_size(spans)
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
    fn lines_bucket_by_baseline() {
        let spans = vec![
            span("world", 60.0, 700.2, 90.0, 12.0),
            span("Hello", 10.0, 700.0, 50.0, 12.0),
            span("below", 10.0, 680.0, 50.0, 12.0),
        ];
        let lines = group_lines(&spans, &LayoutParams::default());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].spans.len(), 2);
        assert_eq!(lines[0].spans[0].text, "Hello");
        assert_eq!(lines[1].spans[0].text, "below");
    }

    #[test]
    fn space_inserted_at_word_gap() {
        let params = LayoutParams::default();
        let spans = vec![
            span("Hello", 10.0, 700.0, 40.0, 12.0),
            // gap of 5pt > 15% of 12pt em
            span("world", 45.0, 700.0, 75.0, 12.0),
        ];
        let lines = group_lines(&spans, &params);
        assert_eq!(lines[0].text(&params), "Hello world");
    }

    #[test]
    fn no_space_for_tight_spans() {
        let params = LayoutParams::default();
        let spans = vec![
            span("Hel", 10.0, 700.0, 30.0, 12.0),
            span("lo", 30.5, 700.0, 42.0, 12.0),
        ];
        let lines = group_lines(&spans, &params);
        assert_eq!(lines[0].text(&params), "Hello");
    }

    #[test]
    fn two_columns_read_left_then_right() {
        let params = LayoutParams::default();
        // Left column x in [10, 90], right column x in [120, 200].
        let mut spans = Vec::new();
        for i in 0..5 {
            let y = 700.0 - 14.0 * i as f64;
            spans.push(span(&format!("L{}", i), 10.0, y, 90.0, 12.0));
            spans.push(span(&format!("R{}", i), 120.0, y, 200.0, 12.0));
        }
        let blocks = analyze(&spans, 210.0, &params);
        let text: Vec<String> = blocks
            .iter()
            .flat_map(|b| b.lines.iter().map(|l| l.text(&params)))
            .collect();
        assert_eq!(
            text,
            vec!["L0", "L1", "L2", "L3", "L4", "R0", "R1", "R2", "R3", "R4"]
        );
    }

    #[test]
    fn paragraph_break_on_large_gap() {
        let params = LayoutParams::default();
        let spans = vec![
            span("one", 10.0, 700.0, 40.0, 12.0),
            span("two", 10.0, 686.0, 40.0, 12.0),
            // 30pt gap > 1.2 x 12pt
            span("three", 10.0, 656.0, 40.0, 12.0),
        ];
        let blocks = analyze(&spans, 200.0, &params);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].lines.len(), 2);
        assert_eq!(blocks[1].lines.len(), 1);
    }

    #[test]
    fn body_size_is_char_weighted() {
        let spans = vec![
            span("Big Title", 10.0, 700.0, 200.0, 24.0),
            span(
                "a long paragraph of body text that dominates by character count",
                10.0,
                650.0,
                400.0,
                12.0,
            ),
        ];
        assert_eq!(body_font_size(&spans), Some(12.0));
    }
}
