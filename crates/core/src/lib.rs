//! tinta - PDF text extraction.
//!
//! Bytes on disk flow upward through the layers: byte source, xref, object
//! parser, filter pipeline, content interpreter, span stream, layout,
//! Markdown. The core is single-threaded per document; a fully loaded
//! document handle is shareable read-only across page workers.

pub mod codec;
pub mod document;
pub mod error;
pub mod font;
pub mod high_level;
pub mod interp;
pub mod layout;
pub mod markdown;
pub mod model;
pub mod parser;
pub mod utils;

pub use document::catalog::{Document, OpenOptions, ParseMode};
pub use error::{PdfError, Result};
pub use high_level::{
    DocumentInfo, ExtractOptions, ExtractOrder, PageInfo, PdfDocument, PAGE_SEPARATOR,
};
pub use layout::LayoutParams;
pub use markdown::MarkdownOptions;
pub use model::objects::{ObjRef, Object, Stream};
pub use model::state::TextSpan;
