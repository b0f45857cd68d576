//! Span sinks: where the interpreter pushes its output.
//!
//! The operator loop is a straight-line producer writing to a caller
//! provided sink; no buffering happens inside the interpreter.

use crate::model::state::TextSpan;
use crate::utils::Rect;

/// Receiver for the interpreter's positioned text spans.
pub trait SpanSink {
    /// Called before the first operator of a page.
    fn begin_page(&mut self, _page_index: usize, _mediabox: Rect) {}

    /// A completed text span.
    fn span(&mut self, span: TextSpan);

    /// Called after the last operator of a page.
    fn end_page(&mut self, _page_index: usize) {}
}

/// Sink that simply collects spans in emission (stream) order.
#[derive(Debug, Default)]
pub struct SpanCollector {
    pub spans: Vec<TextSpan>,
}

impl SpanCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_spans(self) -> Vec<TextSpan> {
        self.spans
    }
}

impl SpanSink for SpanCollector {
    fn span(&mut self, span: TextSpan) {
        self.spans.push(span);
    }
}
