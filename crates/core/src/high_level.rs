//! High-level extraction API.
//!
//! `PdfDocument` is a fully loaded document handle: xref, catalog, page
//! list, and structure tree resolved. Once built it is shareable read-only
//! across workers; parallel extraction reassembles pages in index order.

use crate::document::catalog::{Document, OpenOptions};
use crate::document::page::{collect_pages, Page};
use crate::document::structure::StructTree;
use crate::error::{PdfError, Result};
use crate::interp::device::SpanCollector;
use crate::interp::interpreter::PageInterpreter;
use crate::layout::{self, LayoutParams};
use crate::markdown::{self, heading_level_for_tag, MarkdownOptions};
use crate::model::state::TextSpan;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Page separator in whole-document text output.
pub const PAGE_SEPARATOR: &str = "\x0c";

/// Which order spans are emitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractOrder {
    /// Content-stream (raw drawing) order.
    #[default]
    Stream,
    /// Visual reading order: lines, columns, paragraphs.
    Reading,
    /// Structure-tree order; falls back to reading order when untagged.
    Tagged,
}

/// Options controlling extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub order: ExtractOrder,
    /// Render Markdown instead of plain text.
    pub markdown: bool,
    pub layout: LayoutParams,
    pub markdown_options: MarkdownOptions,
    /// Worker count for whole-document extraction; 0 and 1 mean sequential.
    pub jobs: usize,
    /// Cooperative cancellation, checked between content operators.
    pub cancel: Option<Arc<AtomicBool>>,
}

/// Width, height and rotation of one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageInfo {
    pub width: f64,
    pub height: f64,
    pub rotation: i64,
}

/// Document metadata from the trailer /Info dictionaries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub producer: Option<String>,
    pub creator: Option<String>,
    pub version: Option<String>,
    pub page_count: usize,
}

/// A fully loaded document: object store, page list, structure tree.
pub struct PdfDocument {
    doc: Document,
    pages: Vec<Page>,
    struct_tree: Option<StructTree>,
}

impl PdfDocument {
    /// Map a file and load its document structure.
    pub fn open<P: AsRef<Path>>(path: P, options: OpenOptions) -> Result<Self> {
        Self::from_document(Document::open(path, options)?)
    }

    /// Load a document held in memory.
    pub fn from_bytes<D: AsRef<[u8]>>(data: D, options: OpenOptions) -> Result<Self> {
        Self::from_document(Document::from_bytes(data, options)?)
    }

    fn from_document(doc: Document) -> Result<Self> {
        let pages = collect_pages(&doc)?;
        let struct_tree = StructTree::load(&doc);
        Ok(Self {
            doc,
            pages,
            struct_tree,
        })
    }

    /// The underlying object store.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, index: usize) -> Result<&Page> {
        self.pages.get(index).ok_or(PdfError::PageNotFound(index))
    }

    /// Whether the document carries a structure tree.
    pub fn is_tagged(&self) -> bool {
        self.struct_tree.is_some()
    }

    pub fn page_info(&self, index: usize) -> Result<PageInfo> {
        let page = self.page(index)?;
        Ok(PageInfo {
            width: page.width(),
            height: page.height(),
            rotation: page.rotate,
        })
    }

    /// Title, author, and friends from the newest /Info dictionary.
    pub fn info(&self) -> DocumentInfo {
        let mut info = DocumentInfo {
            version: self.doc.version().map(str::to_string),
            page_count: self.pages.len(),
            ..DocumentInfo::default()
        };
        for dict in self.doc.info_dicts() {
            let text = |key: &str| {
                self.doc
                    .dict_get(dict, key)
                    .and_then(|v| v.as_string().ok().map(Document::decode_text_string))
            };
            info.title = info.title.or_else(|| text("Title"));
            info.author = info.author.or_else(|| text("Author"));
            info.subject = info.subject.or_else(|| text("Subject"));
            info.producer = info.producer.or_else(|| text("Producer"));
            info.creator = info.creator.or_else(|| text("Creator"));
        }
        info
    }

    /// Raw positioned spans for a page, in stream order.
    pub fn extract_spans(&self, index: usize) -> Result<Vec<TextSpan>> {
        self.extract_spans_with_cancel(index, None)
    }

    fn extract_spans_with_cancel(
        &self,
        index: usize,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<Vec<TextSpan>> {
        let page = self.page(index)?;
        let mut collector = SpanCollector::new();
        let mut interp = PageInterpreter::new(&self.doc, page, index, &mut collector);
        if let Some(cancel) = cancel {
            interp = interp.with_cancel(cancel);
        }
        interp.run()?;
        Ok(collector.into_spans())
    }

    /// Extract one page's text (UTF-8) into a writer.
    pub fn extract_page<W: Write>(
        &self,
        index: usize,
        writer: &mut W,
        options: &ExtractOptions,
    ) -> Result<()> {
        let text = self.extract_page_string(index, options)?;
        writer.write_all(text.as_bytes())?;
        Ok(())
    }

    /// Extract one page's text as a String.
    pub fn extract_page_string(&self, index: usize, options: &ExtractOptions) -> Result<String> {
        let spans = self.extract_spans_with_cancel(index, options.cancel.clone())?;
        let page = self.page(index)?;

        let page_map = self
            .struct_tree
            .as_ref()
            .and_then(|tree| tree.page_map(page.objid));

        let spans = match (options.order, page_map) {
            (ExtractOrder::Tagged, Some(map)) => {
                // Stable sort by traversal rank; spans with no MCID (or an
                // MCID absent from the tree) keep stream order at the end.
                let mut indexed: Vec<(usize, TextSpan)> = spans.into_iter().enumerate().collect();
                indexed.sort_by_key(|(i, span)| {
                    let rank = span
                        .mcid
                        .and_then(|mcid| map.rank(mcid))
                        .unwrap_or(usize::MAX);
                    (rank, *i)
                });
                indexed.into_iter().map(|(_, s)| s).collect()
            }
            _ => spans,
        };

        if options.markdown {
            let tag_levels = page_map.map(|map| {
                let mut levels: HashMap<u32, u8> = HashMap::new();
                for (&mcid, kind) in &map.kinds {
                    if let Some(level) = heading_level_for_tag(kind) {
                        levels.insert(mcid, level);
                    }
                }
                levels
            });
            return Ok(markdown::render_page_with_tags(
                &spans,
                page.width(),
                &options.layout,
                &options.markdown_options,
                tag_levels.as_ref(),
            ));
        }

        match options.order {
            ExtractOrder::Stream => Ok(stream_text(&spans, &options.layout)),
            ExtractOrder::Tagged if page_map.is_some() => Ok(tagged_text(&spans, &options.layout)),
            // Reading order, and the tagged fallback for untagged documents.
            _ => Ok(reading_text(&spans, page.width(), &options.layout)),
        }
    }

    /// Extract the selected pages (all when None), joined with form feeds
    /// (or `---` rules for Markdown). Parallel when `options.jobs > 1`;
    /// output is byte-identical to sequential extraction.
    pub fn extract_text(
        &self,
        page_indices: Option<&[usize]>,
        options: &ExtractOptions,
    ) -> Result<String> {
        let indices: Vec<usize> = match page_indices {
            Some(list) => list.to_vec(),
            None => (0..self.pages.len()).collect(),
        };

        let texts: Vec<Result<String>> = if options.jobs > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(options.jobs)
                .build()
                .map_err(|e| PdfError::InvalidArgument(e.to_string()))?;
            pool.install(|| {
                indices
                    .par_iter()
                    .map(|&i| self.extract_page_string(i, options))
                    .collect()
            })
        } else {
            indices
                .iter()
                .map(|&i| self.extract_page_string(i, options))
                .collect()
        };

        let mut pages = Vec::with_capacity(texts.len());
        for (i, text) in texts.into_iter().enumerate() {
            match text {
                Ok(text) => pages.push(text),
                Err(e @ PdfError::Cancelled) => return Err(e),
                Err(e) if self.doc.mode().is_strict() => return Err(e),
                Err(e) => {
                    // One bad page must not abort the others.
                    log::warn!("page {} failed: {}", indices[i], e);
                    pages.push(String::new());
                }
            }
        }

        let separator = if options.markdown {
            "\n---\n\n"
        } else {
            PAGE_SEPARATOR
        };
        Ok(pages.join(separator))
    }
}

/// Stream-order text: spans in emission order, newline on baseline change.
fn stream_text(spans: &[TextSpan], params: &LayoutParams) -> String {
    let mut out = String::new();
    let mut prev: Option<&TextSpan> = None;
    for span in spans {
        if let Some(prev) = prev {
            let same_line = (prev.y0() - span.y0()).abs() <= prev.font_size.max(1.0) * 0.5;
            if !same_line {
                out.push('\n');
            } else {
                let gap = span.x0() - prev.x1();
                if gap > params.space_gap_ratio * prev.font_size.max(1e-6) {
                    out.push(' ');
                }
            }
        }
        out.push_str(&span.text);
        prev = Some(span);
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Tagged-order text: one line per marked-content element.
fn tagged_text(spans: &[TextSpan], params: &LayoutParams) -> String {
    let mut out = String::new();
    let mut prev_mcid: Option<Option<u32>> = None;
    let mut prev_span: Option<&TextSpan> = None;
    for span in spans {
        let mcid = span.mcid;
        if let Some(prev) = prev_mcid {
            if prev != mcid {
                out.push('\n');
                prev_span = None;
            }
        }
        if let Some(prev) = prev_span {
            let gap = span.x0() - prev.x1();
            let same_line = (prev.y0() - span.y0()).abs() <= prev.font_size.max(1.0) * 0.5;
            if !same_line || gap > params.space_gap_ratio * prev.font_size.max(1e-6) {
                out.push(' ');
            }
        }
        out.push_str(&span.text);
        prev_mcid = Some(mcid);
        prev_span = Some(span);
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Reading-order text: layout analysis, one line per line, blank line
/// between paragraphs.
fn reading_text(spans: &[TextSpan], page_width: f64, params: &LayoutParams) -> String {
    let blocks = layout::analyze(spans, page_width, params);
    let mut out = String::new();
    for block in &blocks {
        if !out.is_empty() {
            out.push('\n');
        }
        for line in &block.lines {
            out.push_str(line.text(params).trim_end());
            out.push('\n');
        }
    }
    out
}
