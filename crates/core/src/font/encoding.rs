//! Glyph-name translation and the base encoding database.
//!
//! Follows the Adobe Glyph List specification:
//! https://github.com/adobe-type-tools/agl-specification#2-the-mapping

use crate::error::{PdfError, Result};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Adobe Glyph List subset embedded at compile time.
const GLYPHLIST_DATA: &str = include_str!("glyphlist.txt");

static GLYPH_TO_CHAR: LazyLock<HashMap<&'static str, char>> = LazyLock::new(|| {
    let mut map = HashMap::with_capacity(400);
    for line in GLYPHLIST_DATA.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((name, hex)) = line.split_once(';') {
            if let Ok(code) = u32::from_str_radix(hex.trim(), 16) {
                if let Some(ch) = char::from_u32(code) {
                    map.insert(name, ch);
                }
            }
        }
    }
    map
});

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_surrogate(cp: u32) -> bool {
    (0xD800..=0xDFFF).contains(&cp)
}

/// Decode a single underscore-separated component of a glyph name.
fn decode_component(name: &str) -> Result<String> {
    // "uni" + 4*N hex digits, each a UTF-16 code unit (surrogates rejected)
    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() >= 4 && hex.len().is_multiple_of(4) && is_hex(hex) {
            let mut result = String::new();
            for chunk in hex.as_bytes().chunks(4) {
                let hex_str = std::str::from_utf8(chunk).unwrap();
                let cp = u32::from_str_radix(hex_str, 16)
                    .map_err(|_| PdfError::UnknownGlyph(name.to_string()))?;
                if is_surrogate(cp) {
                    return Err(PdfError::UnknownGlyph(name.to_string()));
                }
                let ch = char::from_u32(cp).ok_or(PdfError::InvalidUnicode(cp))?;
                result.push(ch);
            }
            return Ok(result);
        }
    }

    // "u" + 4-6 hex digits, a single code point
    if let Some(hex) = name.strip_prefix('u') {
        if !name.starts_with("uni") && (4..=6).contains(&hex.len()) && is_hex(hex) {
            let cp = u32::from_str_radix(hex, 16)
                .map_err(|_| PdfError::UnknownGlyph(name.to_string()))?;
            if cp > 0x10FFFF || is_surrogate(cp) {
                return Err(PdfError::InvalidUnicode(cp));
            }
            let ch = char::from_u32(cp).ok_or(PdfError::InvalidUnicode(cp))?;
            return Ok(ch.to_string());
        }
    }

    if let Some(&ch) = GLYPH_TO_CHAR.get(name) {
        return Ok(ch.to_string());
    }

    Err(PdfError::UnknownGlyph(name.to_string()))
}

/// Convert an Adobe glyph name to a Unicode string.
///
/// Suffixes after "." are stripped; "_" joins composite glyphs; each
/// component resolves through the uniXXXX/uXXXXXX forms or the glyph list.
pub fn name2unicode(name: &str) -> Result<String> {
    let name = match name.find('.') {
        Some(idx) => &name[..idx],
        None => name,
    };
    if name.is_empty() || name == "notdef" {
        return Err(PdfError::UnknownGlyph(name.to_string()));
    }

    let mut result = String::new();
    for part in name.split('_') {
        result.push_str(&decode_component(part)?);
    }
    Ok(result)
}

/// Entry in an /Encoding /Differences array.
#[derive(Debug, Clone)]
pub enum DiffEntry {
    /// A code position; subsequent names land here and count upward.
    Code(u8),
    /// A glyph name.
    Name(String),
}

/// The base encoding database.
pub struct EncodingDB;

impl EncodingDB {
    /// Build a byte -> Unicode table for a named base encoding, optionally
    /// modified by a /Differences array. Unresolvable names are skipped.
    pub fn get_encoding(name: &str, differences: Option<&[DiffEntry]>) -> HashMap<u8, String> {
        use super::latin_enc::{ENCODING, MAC_EXPERT};

        let mut encoding = HashMap::with_capacity(256);

        if name == "MacExpertEncoding" {
            for &(code, glyph_name) in MAC_EXPERT {
                if let Ok(unicode) = name2unicode(glyph_name) {
                    encoding.insert(code, unicode);
                }
            }
        } else {
            let col_idx = match name {
                "StandardEncoding" => 0,
                "MacRomanEncoding" => 1,
                "WinAnsiEncoding" => 2,
                "PDFDocEncoding" => 3,
                _ => 0,
            };
            for &(glyph_name, std, mac, win, pdf) in ENCODING {
                let code = match col_idx {
                    1 => mac,
                    2 => win,
                    3 => pdf,
                    _ => std,
                };
                if let Some(code) = code {
                    if let Ok(unicode) = name2unicode(glyph_name) {
                        encoding.insert(code, unicode);
                    }
                }
            }
        }

        if let Some(diffs) = differences {
            let mut current_code: Option<u8> = None;
            for entry in diffs {
                match entry {
                    DiffEntry::Code(code) => current_code = Some(*code),
                    DiffEntry::Name(glyph_name) => {
                        if let Some(code) = current_code {
                            match name2unicode(glyph_name) {
                                Ok(unicode) => {
                                    encoding.insert(code, unicode);
                                }
                                Err(_) => {
                                    // Unknown glyph: drop the slot so the
                                    // decoder falls back to U+FFFD.
                                    encoding.remove(&code);
                                }
                            }
                            current_code = code.checked_add(1);
                        }
                    }
                }
            }
        }

        encoding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glyph_list_loads() {
        assert!(GLYPH_TO_CHAR.len() > 300);
        assert_eq!(GLYPH_TO_CHAR.get("A"), Some(&'A'));
        assert_eq!(GLYPH_TO_CHAR.get("bullet"), Some(&'\u{2022}'));
    }

    #[test]
    fn uni_and_u_forms() {
        assert_eq!(name2unicode("uni0041").unwrap(), "A");
        assert_eq!(name2unicode("uni00410042").unwrap(), "AB");
        assert_eq!(name2unicode("u1F600").unwrap(), "\u{1F600}");
        assert!(name2unicode("uniD800").is_err());
    }

    #[test]
    fn composite_and_suffixed_names() {
        assert_eq!(name2unicode("f_i").unwrap(), "fi");
        assert_eq!(name2unicode("A.sc").unwrap(), "A");
        assert!(name2unicode(".notdef").is_err());
    }

    #[test]
    fn winansi_has_euro_at_128() {
        let enc = EncodingDB::get_encoding("WinAnsiEncoding", None);
        assert_eq!(enc.get(&128).map(String::as_str), Some("\u{20AC}"));
        assert_eq!(enc.get(&65).map(String::as_str), Some("A"));
    }

    #[test]
    fn standard_differs_from_winansi() {
        let std = EncodingDB::get_encoding("StandardEncoding", None);
        let win = EncodingDB::get_encoding("WinAnsiEncoding", None);
        // quoteright sits at 39 in Standard, 146 in WinAnsi
        assert_eq!(std.get(&39).map(String::as_str), Some("\u{2019}"));
        assert_eq!(win.get(&146).map(String::as_str), Some("\u{2019}"));
    }

    #[test]
    fn mac_expert_oldstyle_figures() {
        let enc = EncodingDB::get_encoding("MacExpertEncoding", None);
        assert_eq!(enc.get(&48).map(String::as_str), Some("0"));
        assert_eq!(enc.get(&87).map(String::as_str), Some("\u{FB01}"));
    }

    #[test]
    fn differences_reassign_codes() {
        let diffs = vec![
            DiffEntry::Code(65),
            DiffEntry::Name("alpha".into()),
            DiffEntry::Name("beta".into()),
        ];
        let enc = EncodingDB::get_encoding("WinAnsiEncoding", Some(&diffs));
        assert_eq!(enc.get(&65).map(String::as_str), Some("\u{03B1}"));
        assert_eq!(enc.get(&66).map(String::as_str), Some("\u{03B2}"));
        assert_eq!(enc.get(&67).map(String::as_str), Some("C"));
    }
}
