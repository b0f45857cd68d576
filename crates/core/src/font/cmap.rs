//! CMap parsing: code-space ranges, CID mappings, and ToUnicode tables.
//!
//! A CMap defines (a) the variable-width byte codes a composite font uses,
//! via code-space ranges, and (b) mappings from those codes to CIDs or to
//! Unicode. The decoder greedily matches the longest applicable code-space
//! range at each byte position.

use crate::error::Result;
use crate::parser::lexer::{Keyword, Lexer, Token};
use std::collections::HashMap;

/// A code, remembered with its byte width so 0x41 and 0x0041 stay distinct.
pub type Code = (u8, u32);

fn code_of(bytes: &[u8]) -> Code {
    let mut value: u32 = 0;
    for &b in bytes.iter().take(4) {
        value = (value << 8) | b as u32;
    }
    (bytes.len().min(4) as u8, value)
}

/// A CMap mapping byte codes to CIDs.
#[derive(Debug, Clone, Default)]
pub struct CMap {
    /// (low, high) pairs of equal length; a code matches byte-wise
    codespace: Vec<(Vec<u8>, Vec<u8>)>,
    /// Explicit code -> CID mappings
    cids: HashMap<Code, u32>,
    /// When set, unmapped codes of any width pass through as their value
    identity: bool,
}

impl CMap {
    /// The identity CMap over fixed-width codes (Identity-H/V).
    pub fn identity(width: usize) -> Self {
        Self {
            codespace: vec![(vec![0x00; width], vec![0xff; width])],
            cids: HashMap::new(),
            identity: true,
        }
    }

    /// Parse an embedded CMap stream (the /Encoding of a Type0 font).
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cmap = Self::default();
        let mut ops = CMapOps::new(data);

        while let Some((keyword, operands)) = ops.next() {
            match keyword {
                Keyword::BeginCodeSpaceRange => {
                    ops.collect_until(Keyword::EndCodeSpaceRange, |items| {
                        for pair in items.chunks(2) {
                            if let [Value::Str(low), Value::Str(high)] = pair {
                                if low.len() == high.len() && !low.is_empty() {
                                    cmap.codespace.push((low.clone(), high.clone()));
                                }
                            }
                        }
                    });
                }
                Keyword::BeginCidChar => {
                    ops.collect_until(Keyword::EndCidChar, |items| {
                        for pair in items.chunks(2) {
                            if let [Value::Str(src), Value::Int(cid)] = pair {
                                if *cid >= 0 {
                                    cmap.cids.insert(code_of(src), *cid as u32);
                                }
                            }
                        }
                    });
                }
                Keyword::BeginCidRange => {
                    ops.collect_until(Keyword::EndCidRange, |items| {
                        for triple in items.chunks(3) {
                            if let [Value::Str(low), Value::Str(high), Value::Int(cid)] = triple {
                                cmap.add_cid_range(low, high, *cid);
                            }
                        }
                    });
                }
                Keyword::UseCMap => {
                    // The included map is named by the preceding literal.
                    if let Some(Value::Name(name)) = operands.last() {
                        match predefined_cmap(name) {
                            Some(included) => {
                                cmap.codespace.extend(included.codespace);
                                cmap.identity |= included.identity;
                            }
                            None => log::warn!("usecmap of unknown CMap {}", name),
                        }
                    }
                }
                _ => {}
            }
        }

        if cmap.codespace.is_empty() {
            // Degenerate CMap: assume 2-byte codes, the common case.
            cmap.codespace.push((vec![0, 0], vec![0xff, 0xff]));
        }
        Ok(cmap)
    }

    fn add_cid_range(&mut self, low: &[u8], high: &[u8], start_cid: i64) {
        if low.len() != high.len() || low.is_empty() || start_cid < 0 {
            return;
        }
        let (width, low_v) = code_of(low);
        let (_, high_v) = code_of(high);
        if high_v < low_v || high_v - low_v > 65535 {
            return;
        }
        for (i, value) in (low_v..=high_v).enumerate() {
            self.cids.insert((width, value), start_cid as u32 + i as u32);
        }
    }

    /// Split bytes into codes by greedy longest code-space match, then map
    /// each code to its CID.
    pub fn decode(&self, data: &[u8]) -> Vec<u32> {
        self.decode_codes(data)
            .into_iter()
            .map(|code| self.cid_for(code))
            .collect()
    }

    /// Split bytes into raw codes without the CID mapping.
    pub fn decode_codes(&self, data: &[u8]) -> Vec<Code> {
        let mut out = Vec::new();
        let mut pos = 0;
        while pos < data.len() {
            let mut matched = false;
            for width in (1..=4usize).rev() {
                if pos + width > data.len() {
                    continue;
                }
                if self.in_codespace(&data[pos..pos + width]) {
                    out.push(code_of(&data[pos..pos + width]));
                    pos += width;
                    matched = true;
                    break;
                }
            }
            if !matched {
                // Outside every range: consume a single byte and move on.
                out.push((1, data[pos] as u32));
                pos += 1;
            }
        }
        out
    }

    fn in_codespace(&self, bytes: &[u8]) -> bool {
        self.codespace.iter().any(|(low, high)| {
            low.len() == bytes.len()
                && bytes
                    .iter()
                    .zip(low.iter().zip(high.iter()))
                    .all(|(&b, (&lo, &hi))| b >= lo && b <= hi)
        })
    }

    fn cid_for(&self, code: Code) -> u32 {
        match self.cids.get(&code) {
            Some(&cid) => cid,
            None if self.identity => code.1,
            // Unmapped and not identity: pass the value through rather than
            // dropping the glyph.
            None => code.1,
        }
    }
}

/// A ToUnicode table: codes to Unicode strings.
#[derive(Debug, Clone, Default)]
pub struct UnicodeMap {
    map: HashMap<Code, String>,
}

impl UnicodeMap {
    /// Parse a /ToUnicode CMap stream.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut umap = Self::default();
        let mut ops = CMapOps::new(data);

        while let Some((keyword, _)) = ops.next() {
            match keyword {
                Keyword::BeginBfChar => {
                    ops.collect_until(Keyword::EndBfChar, |items| {
                        for pair in items.chunks(2) {
                            match pair {
                                [Value::Str(src), Value::Str(dst)] => {
                                    umap.map.insert(code_of(src), bytes_to_unicode(dst));
                                }
                                [Value::Str(src), Value::Name(dst)] => {
                                    if let Ok(text) = super::encoding::name2unicode(dst) {
                                        umap.map.insert(code_of(src), text);
                                    }
                                }
                                _ => {}
                            }
                        }
                    });
                }
                Keyword::BeginBfRange => {
                    ops.collect_until(Keyword::EndBfRange, |items| {
                        for triple in items.chunks(3) {
                            match triple {
                                [Value::Str(low), Value::Str(high), Value::Str(dst)] => {
                                    umap.add_bf_range(low, high, dst);
                                }
                                [Value::Str(low), Value::Str(high), Value::Array(dsts)] => {
                                    let (width, low_v) = code_of(low);
                                    let (_, high_v) = code_of(high);
                                    for (i, dst) in dsts.iter().enumerate() {
                                        let value = low_v + i as u32;
                                        if value > high_v {
                                            break;
                                        }
                                        if let Value::Str(bytes) = dst {
                                            umap.map
                                                .insert((width, value), bytes_to_unicode(bytes));
                                        }
                                    }
                                }
                                _ => {}
                            }
                        }
                    });
                }
                _ => {}
            }
        }

        Ok(umap)
    }

    /// A range maps to a starting target; the final byte auto-increments and
    /// carries into higher bytes.
    fn add_bf_range(&mut self, low: &[u8], high: &[u8], dst: &[u8]) {
        let (width, low_v) = code_of(low);
        let (_, high_v) = code_of(high);
        if high_v < low_v || high_v - low_v > 65535 {
            return;
        }
        let mut target = dst.to_vec();
        for value in low_v..=high_v {
            self.map.insert((width, value), bytes_to_unicode(&target));
            increment_bytes(&mut target);
        }
    }

    /// Look up a code's Unicode expansion.
    pub fn get(&self, code: Code) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    /// Look up ignoring the code width; used when the caller only has a
    /// CID, not the original byte string.
    pub fn get_by_value(&self, value: u32) -> Option<&str> {
        for width in [2u8, 1, 3, 4] {
            if let Some(s) = self.map.get(&(width, value)) {
                return Some(s);
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Increment a big-endian byte string in place with carry.
fn increment_bytes(bytes: &mut [u8]) {
    for b in bytes.iter_mut().rev() {
        let (next, carry) = b.overflowing_add(1);
        *b = next;
        if !carry {
            return;
        }
    }
}

/// Interpret CMap target bytes as text: UTF-16BE when even-length (with
/// surrogate pairs), raw Latin-1 otherwise.
fn bytes_to_unicode(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes.len().is_multiple_of(2) {
        let units: Vec<u16> = bytes
            .chunks(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Predefined CMaps: the identity family. Other predefined names (the CJK
/// registry) are approximated as 2-byte identity so text still extracts.
pub fn predefined_cmap(name: &str) -> Option<CMap> {
    match name {
        "Identity-H" | "Identity-V" | "DLIdent-H" | "DLIdent-V" => Some(CMap::identity(2)),
        "OneByteIdentityH" | "OneByteIdentityV" => Some(CMap::identity(1)),
        _ => None,
    }
}

/// One operator and the operands that preceded it.
type Op = (Keyword, Vec<Value>);

/// Operand values a CMap body can carry.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Int(i64),
    Str(Vec<u8>),
    Name(String),
    Array(Vec<Value>),
}

/// Minimal operator scanner over a CMap body.
struct CMapOps<'a> {
    lexer: Lexer<'a>,
    pending: Vec<Value>,
}

impl<'a> CMapOps<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
            pending: Vec::new(),
        }
    }

    fn next(&mut self) -> Option<Op> {
        while let Some(result) = self.lexer.next_token() {
            let token = match result {
                Ok((_, tok)) => tok,
                Err(_) => continue,
            };
            match token {
                Token::Int(n) => self.pending.push(Value::Int(n)),
                Token::Real(_) => {}
                Token::Name(s) => self.pending.push(Value::Name(s)),
                Token::String(s) => self.pending.push(Value::Str(s)),
                Token::Keyword(Keyword::ArrayStart) => {
                    let arr = self.collect_array();
                    self.pending.push(Value::Array(arr));
                }
                Token::Keyword(Keyword::DictStart) | Token::Keyword(Keyword::DictEnd) => {
                    self.pending.clear();
                }
                Token::Keyword(kw) => {
                    let operands = std::mem::take(&mut self.pending);
                    return Some((kw, operands));
                }
            }
        }
        None
    }

    fn collect_array(&mut self) -> Vec<Value> {
        let mut arr = Vec::new();
        while let Some(result) = self.lexer.next_token() {
            match result {
                Ok((_, Token::Keyword(Keyword::ArrayEnd))) => break,
                Ok((_, Token::Int(n))) => arr.push(Value::Int(n)),
                Ok((_, Token::String(s))) => arr.push(Value::Str(s)),
                Ok((_, Token::Name(s))) => arr.push(Value::Name(s)),
                Ok(_) => {}
                Err(_) => break,
            }
        }
        arr
    }

    /// Gather operands until the closing keyword, then hand them to `f`.
    fn collect_until(&mut self, end: Keyword, f: impl FnOnce(&[Value])) {
        let mut items = Vec::new();
        while let Some(result) = self.lexer.next_token() {
            let token = match result {
                Ok((_, tok)) => tok,
                Err(_) => continue,
            };
            match token {
                Token::Keyword(kw) if kw == end => break,
                Token::Keyword(Keyword::ArrayStart) => {
                    let arr = self.collect_array();
                    items.push(Value::Array(arr));
                }
                Token::Keyword(_) => {}
                Token::Int(n) => items.push(Value::Int(n)),
                Token::Name(s) => items.push(Value::Name(s)),
                Token::String(s) => items.push(Value::Str(s)),
                Token::Real(_) => {}
            }
        }
        f(&items);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_decodes_two_byte_codes() {
        let cmap = CMap::identity(2);
        assert_eq!(cmap.decode(&[0x00, 0x41, 0x00, 0x42]), vec![0x41, 0x42]);
    }

    #[test]
    fn codespace_mixes_widths_greedily() {
        let data = br"
            /CIDInit /ProcSet findresource begin
            begincmap
            2 begincodespacerange
            <00> <80>
            <8140> <9ffc>
            endcodespacerange
            endcmap
        ";
        let cmap = CMap::parse(data).unwrap();
        // 0x41 is a 1-byte code; 0x81 0x40 is a 2-byte code.
        assert_eq!(
            cmap.decode_codes(&[0x41, 0x81, 0x40, 0x42]),
            vec![(1, 0x41), (2, 0x8140), (1, 0x42)]
        );
    }

    #[test]
    fn cidrange_maps_consecutively() {
        let data = br"
            begincmap
            1 begincodespacerange <0000> <ffff> endcodespacerange
            1 begincidrange <0010> <0012> 100 endcidrange
            endcmap
        ";
        let cmap = CMap::parse(data).unwrap();
        assert_eq!(cmap.decode(&[0x00, 0x10, 0x00, 0x12]), vec![100, 102]);
    }

    #[test]
    fn tounicode_bfchar() {
        let data = br"
            begincmap
            1 begincodespacerange <0000> <ffff> endcodespacerange
            2 beginbfchar
            <0041> <0061>
            <0042> <0062>
            endbfchar
            endcmap
        ";
        let umap = UnicodeMap::parse(data).unwrap();
        assert_eq!(umap.get((2, 0x41)), Some("a"));
        assert_eq!(umap.get((2, 0x42)), Some("b"));
    }

    #[test]
    fn tounicode_bfrange_increments_with_carry() {
        let data = br"
            begincmap
            1 begincodespacerange <0000> <ffff> endcodespacerange
            1 beginbfrange
            <0001> <0003> <00fe>
            endbfrange
            endcmap
        ";
        let umap = UnicodeMap::parse(data).unwrap();
        assert_eq!(umap.get((2, 1)), Some("\u{fe}"));
        assert_eq!(umap.get((2, 2)), Some("\u{ff}"));
        // Carry into the high byte: 0x00ff + 1 = 0x0100
        assert_eq!(umap.get((2, 3)), Some("\u{100}"));
    }

    #[test]
    fn tounicode_bfrange_array_targets() {
        let data = br"
            begincmap
            1 beginbfrange
            <01> <03> [<0058> <0059> <005A>]
            endbfrange
            endcmap
        ";
        let umap = UnicodeMap::parse(data).unwrap();
        assert_eq!(umap.get((1, 1)), Some("X"));
        assert_eq!(umap.get((1, 2)), Some("Y"));
        assert_eq!(umap.get((1, 3)), Some("Z"));
    }

    #[test]
    fn tounicode_surrogate_pairs() {
        let data = br"
            begincmap
            1 beginbfchar <0001> <D83DDE00> endbfchar
            endcmap
        ";
        let umap = UnicodeMap::parse(data).unwrap();
        assert_eq!(umap.get((1, 1)), Some("\u{1F600}"));
    }

    #[test]
    fn usecmap_identity() {
        let data = br"
            begincmap
            /Identity-H usecmap
            endcmap
        ";
        let cmap = CMap::parse(data).unwrap();
        assert_eq!(cmap.decode(&[0x12, 0x34]), vec![0x1234]);
    }
}
