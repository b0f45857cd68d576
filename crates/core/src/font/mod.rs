//! Fonts: encodings, CMaps, and code-to-Unicode translation.

pub mod cmap;
pub mod encoding;
pub mod latin_enc;
pub mod pdffont;
