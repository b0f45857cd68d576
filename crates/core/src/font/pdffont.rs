//! Font loading and code-to-Unicode translation.
//!
//! Two font shapes matter for text extraction: simple fonts (single-byte
//! codes through a 256-entry encoding, possibly patched by /Differences and
//! overridden by /ToUnicode) and Type0 composite fonts (variable-width codes
//! through a CMap, usually Identity-H with a UTF-16BE /ToUnicode).

use super::cmap::{predefined_cmap, CMap, Code, UnicodeMap};
use super::encoding::{DiffEntry, EncodingDB};
use crate::document::catalog::Document;
use crate::error::Result;
use crate::model::objects::Object;
use std::collections::HashMap;

/// Replacement for codes with no Unicode mapping.
pub const REPLACEMENT: &str = "\u{FFFD}";

/// How the font turns bytes into character codes.
#[derive(Debug)]
pub enum FontKind {
    /// Single-byte encoding: byte -> Unicode table
    Simple { encoding: HashMap<u8, String> },
    /// CID-keyed composite font with a code-space CMap
    Type0 { cmap: CMap },
}

/// A loaded font resource.
#[derive(Debug)]
pub struct Font {
    /// /BaseFont, when present
    pub name: Option<String>,
    pub kind: FontKind,
    to_unicode: Option<UnicodeMap>,
    /// Widths in thousandths of an em, keyed by code value (simple fonts)
    /// or CID (composite fonts)
    widths: HashMap<u32, f64>,
    /// Width for codes outside the width table
    default_width: f64,
    /// Vertical writing mode (Identity-V and friends)
    pub vertical: bool,
}

impl Font {
    /// Load a font from its resource dictionary.
    pub fn load(doc: &Document, font_dict: &HashMap<String, Object>) -> Result<Self> {
        let subtype = doc
            .dict_get(font_dict, "Subtype")
            .and_then(|s| s.as_name().ok().map(str::to_string))
            .unwrap_or_default();

        let name = doc
            .dict_get(font_dict, "BaseFont")
            .and_then(|s| s.as_name().ok().map(str::to_string));

        let to_unicode = match doc.dict_get(font_dict, "ToUnicode") {
            Some(obj) => match obj.as_stream() {
                Ok(stream) => {
                    let data = doc.decode_stream(stream)?;
                    let umap = UnicodeMap::parse(&data)?;
                    if umap.is_empty() { None } else { Some(umap) }
                }
                Err(_) => None,
            },
            None => None,
        };

        if subtype == "Type0" {
            Self::load_type0(doc, font_dict, name, to_unicode)
        } else {
            Self::load_simple(doc, font_dict, name, to_unicode)
        }
    }

    fn load_simple(
        doc: &Document,
        font_dict: &HashMap<String, Object>,
        name: Option<String>,
        to_unicode: Option<UnicodeMap>,
    ) -> Result<Self> {
        let encoding = match doc.dict_get(font_dict, "Encoding") {
            Some(obj) => match obj.as_ref() {
                Object::Name(enc_name) => EncodingDB::get_encoding(enc_name, None),
                Object::Dict(dict) => {
                    let base = doc
                        .dict_get(dict, "BaseEncoding")
                        .and_then(|b| b.as_name().ok().map(str::to_string))
                        .unwrap_or_else(|| "StandardEncoding".to_string());
                    let differences = doc
                        .dict_get(dict, "Differences")
                        .and_then(|d| d.as_array().ok().map(|a| parse_differences(a)));
                    EncodingDB::get_encoding(&base, differences.as_deref())
                }
                _ => EncodingDB::get_encoding("StandardEncoding", None),
            },
            None => EncodingDB::get_encoding("StandardEncoding", None),
        };

        let mut widths = HashMap::new();
        let first_char = doc
            .dict_get(font_dict, "FirstChar")
            .and_then(|n| n.as_int().ok())
            .unwrap_or(0);
        if let Some(arr) = doc.dict_get(font_dict, "Widths") {
            if let Ok(items) = arr.as_array() {
                for (i, item) in items.iter().enumerate() {
                    if let Ok(w) = doc.resolve(item).and_then(|w| w.as_num()) {
                        widths.insert((first_char + i as i64) as u32, w);
                    }
                }
            }
        }

        let default_width = doc
            .dict_get(font_dict, "FontDescriptor")
            .and_then(|d| d.as_dict().ok().cloned())
            .and_then(|desc| doc.dict_get(&desc, "MissingWidth"))
            .and_then(|w| w.as_num().ok())
            .unwrap_or(0.0);

        Ok(Self {
            name,
            kind: FontKind::Simple { encoding },
            to_unicode,
            widths,
            default_width,
            vertical: false,
        })
    }

    fn load_type0(
        doc: &Document,
        font_dict: &HashMap<String, Object>,
        name: Option<String>,
        to_unicode: Option<UnicodeMap>,
    ) -> Result<Self> {
        let mut vertical = false;
        let cmap = match doc.dict_get(font_dict, "Encoding") {
            Some(obj) => match obj.as_ref() {
                Object::Name(enc_name) => {
                    vertical = enc_name.ends_with("-V");
                    match predefined_cmap(enc_name) {
                        Some(cmap) => cmap,
                        None => {
                            log::warn!(
                                "unknown predefined CMap {}, assuming 2-byte identity",
                                enc_name
                            );
                            CMap::identity(2)
                        }
                    }
                }
                Object::Stream(stream) => {
                    let data = doc.decode_stream(stream)?;
                    CMap::parse(&data)?
                }
                _ => CMap::identity(2),
            },
            None => CMap::identity(2),
        };

        // Widths come from the single descendant CIDFont.
        let mut widths = HashMap::new();
        let mut default_width = 1000.0;
        let descendant = doc
            .dict_get(font_dict, "DescendantFonts")
            .and_then(|d| d.as_array().ok().and_then(|a| a.first().cloned()))
            .and_then(|d| doc.resolve(&d).ok())
            .and_then(|d| d.as_dict().ok().cloned());
        if let Some(descendant) = descendant {
            if let Some(dw) = doc.dict_get(&descendant, "DW").and_then(|w| w.as_num().ok()) {
                default_width = dw;
            }
            if let Some(w_arr) = doc.dict_get(&descendant, "W") {
                if let Ok(items) = w_arr.as_array() {
                    widths = parse_cid_widths(doc, items);
                }
            }
        }

        Ok(Self {
            name,
            kind: FontKind::Type0 { cmap },
            to_unicode,
            widths,
            default_width,
            vertical,
        })
    }

    /// Composite fonts use multi-byte codes.
    pub fn is_multibyte(&self) -> bool {
        matches!(self.kind, FontKind::Type0 { .. })
    }

    /// Split a show-string into codes.
    pub fn decode(&self, data: &[u8]) -> Vec<Code> {
        match &self.kind {
            FontKind::Simple { .. } => data.iter().map(|&b| (1, b as u32)).collect(),
            FontKind::Type0 { cmap } => cmap.decode_codes(data),
        }
    }

    /// The CID behind a code (identical to the code value for simple fonts
    /// and identity CMaps).
    pub fn cid(&self, code: Code) -> u32 {
        match &self.kind {
            FontKind::Simple { .. } => code.1,
            FontKind::Type0 { cmap } => *cmap.decode(&code_bytes(code)).first().unwrap_or(&code.1),
        }
    }

    /// A code's Unicode expansion. /ToUnicode wins over the encoding; codes
    /// mapped by neither yield U+FFFD.
    pub fn to_unicode(&self, code: Code) -> String {
        if let Some(umap) = &self.to_unicode {
            if let Some(s) = umap.get(code) {
                return s.to_string();
            }
            if let Some(s) = umap.get_by_value(self.cid(code)) {
                return s.to_string();
            }
        }
        match &self.kind {
            FontKind::Simple { encoding } => {
                if code.0 == 1 {
                    if let Some(s) = encoding.get(&(code.1 as u8)) {
                        return s.clone();
                    }
                }
                REPLACEMENT.to_string()
            }
            FontKind::Type0 { .. } => REPLACEMENT.to_string(),
        }
    }

    /// Glyph width in thousandths of an em.
    pub fn char_width(&self, code: Code) -> f64 {
        let key = match &self.kind {
            FontKind::Simple { .. } => code.1,
            FontKind::Type0 { .. } => self.cid(code),
        };
        self.widths.get(&key).copied().unwrap_or(self.default_width)
    }
}

fn code_bytes(code: Code) -> Vec<u8> {
    let width = code.0.clamp(1, 4) as usize;
    code.1.to_be_bytes()[4 - width..].to_vec()
}

fn parse_differences(arr: &[Object]) -> Vec<DiffEntry> {
    let mut out = Vec::with_capacity(arr.len());
    for item in arr {
        match item {
            Object::Int(n) if (0..=255).contains(n) => out.push(DiffEntry::Code(*n as u8)),
            Object::Name(name) => out.push(DiffEntry::Name(name.clone())),
            _ => {}
        }
    }
    out
}

/// Parse a CIDFont /W array into a CID -> width map.
///
/// Two record shapes: `cid [w1 w2 ...]` assigns consecutive widths, and
/// `cid_first cid_last w` assigns one width to a range.
fn parse_cid_widths(doc: &Document, seq: &[Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let mut run: Vec<f64> = Vec::new();

    for item in seq {
        let resolved = match doc.resolve(item) {
            Ok(obj) => obj,
            Err(_) => continue,
        };
        match resolved.as_ref() {
            Object::Array(arr) => {
                if let Some(start) = run.pop() {
                    let start = start as u32;
                    for (i, w) in arr.iter().enumerate() {
                        if let Ok(w) = w.as_num() {
                            widths.insert(start + i as u32, w);
                        }
                    }
                }
                run.clear();
            }
            other => {
                if let Ok(n) = other.as_num() {
                    run.push(n);
                    if run.len() == 3 {
                        let first = run[0] as u32;
                        let last = run[1] as u32;
                        let w = run[2];
                        if last >= first && last - first <= 65535 {
                            for cid in first..=last {
                                widths.insert(cid, w);
                            }
                        }
                        run.clear();
                    }
                }
            }
        }
    }

    widths
}
