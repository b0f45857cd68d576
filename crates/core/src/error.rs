//! Error types for the tinta PDF extraction library.

use thiserror::Error;

/// Primary error type for PDF parsing and extraction operations.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("invalid token at position {pos}: {msg}")]
    TokenError { pos: usize, msg: String },

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("key not found: {0}")]
    KeyError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF object not found: {0}")]
    ObjectNotFound(u32),

    #[error("generation mismatch for object {objid}: wanted {wanted}, xref has {found}")]
    GenerationMismatch { objid: u32, wanted: u32, found: u32 },

    #[error("no valid xref table found")]
    NoValidXRef,

    #[error("cycle in xref /Prev chain at offset {0}")]
    XRefCycle(usize),

    #[error("PDF syntax error: {0}")]
    SyntaxError(String),

    #[error("stream decode error: {0}")]
    DecodeError(String),

    #[error("unknown glyph name: {0}")]
    UnknownGlyph(String),

    #[error("invalid unicode codepoint: {0:#x}")]
    InvalidUnicode(u32),

    #[error("page index out of range: {0}")]
    PageNotFound(usize),

    #[error("document is encrypted")]
    Encrypted,

    #[error("unsupported feature: {0}")]
    Unsupported(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("extraction cancelled")]
    Cancelled,
}

/// Convenience Result type alias for PdfError.
pub type Result<T> = std::result::Result<T, PdfError>;
