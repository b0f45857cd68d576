//! Stream filter pipeline.
//!
//! Decoders compose in the order declared by /Filter, each consuming the
//! previous decoder's output. /DecodeParms entries align with the filter
//! array by position; predictors (PNG 10-15, TIFF 2) are applied after
//! Flate and LZW.

pub mod ascii85;
pub mod flate;
pub mod lzw;
pub mod runlength;

use crate::error::{PdfError, Result};
use crate::model::objects::Object;
use std::collections::HashMap;

pub use ascii85::{ascii85decode, ascii85encode, asciihexdecode, asciihexencode};
pub use flate::flatedecode;
pub use lzw::{lzwdecode, lzwdecode_with_earlychange};
pub use runlength::{rldecode, rlencode};

/// One step of a decoder chain: filter name plus its parameter dictionary.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    pub name: String,
    pub parms: Option<HashMap<String, Object>>,
}

/// Normalize /Filter and /DecodeParms into an aligned chain.
///
/// /Filter may be a single name or an array; /DecodeParms may be a single
/// dict, an array with nulls, or absent. Indirect references must already be
/// resolved by the caller.
pub fn filter_chain(filter: Option<&Object>, parms: Option<&Object>) -> Result<Vec<FilterSpec>> {
    let names: Vec<String> = match filter {
        None => return Ok(Vec::new()),
        Some(Object::Name(name)) => vec![name.clone()],
        Some(Object::Array(arr)) => {
            let mut names = Vec::with_capacity(arr.len());
            for item in arr {
                names.push(item.as_name()?.to_string());
            }
            names
        }
        Some(other) => {
            return Err(PdfError::TypeError {
                expected: "name or array",
                got: other.type_name(),
            });
        }
    };

    let parm_at = |i: usize| -> Option<HashMap<String, Object>> {
        match parms {
            Some(Object::Dict(d)) if i == 0 => Some(d.clone()),
            Some(Object::Array(arr)) => match arr.get(i) {
                Some(Object::Dict(d)) => Some(d.clone()),
                _ => None,
            },
            _ => None,
        }
    };

    Ok(names
        .into_iter()
        .enumerate()
        .map(|(i, name)| FilterSpec {
            name,
            parms: parm_at(i),
        })
        .collect())
}

fn parm_int(parms: Option<&HashMap<String, Object>>, key: &str, default: i64) -> i64 {
    parms
        .and_then(|p| p.get(key))
        .and_then(|v| v.as_int().ok())
        .unwrap_or(default)
}

/// Apply a decoder chain to raw stream bytes.
///
/// Filter errors are fatal in strict mode; in permissive mode the failing
/// stage keeps whatever it produced and the chain stops there.
pub fn apply_filters(data: &[u8], chain: &[FilterSpec], strict: bool) -> Result<Vec<u8>> {
    let mut output = data.to_vec();

    for spec in chain {
        let parms = spec.parms.as_ref();
        let decoded = match spec.name.as_str() {
            "FlateDecode" | "Fl" => flate::flatedecode(&output, strict),
            "LZWDecode" | "LZW" => {
                let early = parm_int(parms, "EarlyChange", 1);
                lzw::lzwdecode_with_earlychange(&output, early, strict)
            }
            "ASCIIHexDecode" | "AHx" => ascii85::asciihexdecode(&output),
            "ASCII85Decode" | "A85" => ascii85::ascii85decode(&output),
            "RunLengthDecode" | "RL" => runlength::rldecode(&output),
            "Crypt" => Err(PdfError::Encrypted),
            other => Err(PdfError::Unsupported(format!("filter: {}", other))),
        };

        output = match decoded {
            Ok(data) => data,
            Err(e @ PdfError::Encrypted) => return Err(e),
            Err(e) if strict => return Err(e),
            Err(e) => {
                log::warn!("filter {} failed ({}), truncating output", spec.name, e);
                break;
            }
        };

        // Predictors only apply to the LZW and Flate stages.
        if matches!(
            spec.name.as_str(),
            "FlateDecode" | "Fl" | "LZWDecode" | "LZW"
        ) {
            let predictor = parm_int(parms, "Predictor", 1);
            if predictor > 1 {
                let columns = parm_int(parms, "Columns", 1).max(1) as usize;
                let colors = parm_int(parms, "Colors", 1).max(1) as usize;
                let bits = parm_int(parms, "BitsPerComponent", 8).max(1) as usize;
                output = match predictor {
                    2 => apply_tiff_predictor(&output, columns, colors, bits),
                    10..=15 => apply_png_predictor(&output, columns, colors, bits),
                    other => {
                        if strict {
                            return Err(PdfError::DecodeError(format!(
                                "unsupported predictor: {}",
                                other
                            )));
                        }
                        log::warn!("unsupported predictor {}, leaving data as-is", other);
                        output
                    }
                };
            }
        }
    }

    Ok(output)
}

/// Reverse the PNG row predictors (types None/Sub/Up/Average/Paeth).
///
/// Each row carries a leading filter byte; reconstruction uses the previous
/// row and the left neighbor at bytes-per-pixel distance.
pub fn apply_png_predictor(
    data: &[u8],
    columns: usize,
    colors: usize,
    bits_per_component: usize,
) -> Vec<u8> {
    let row_bytes = (colors * columns * bits_per_component).div_ceil(8);
    let bpp = std::cmp::max(1, colors * bits_per_component / 8);
    let row_size = row_bytes + 1; // +1 for the filter byte

    let mut result = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_bytes];

    for row_start in (0..data.len()).step_by(row_size) {
        if row_start + row_size > data.len() {
            break;
        }

        let filter_type = data[row_start];
        let row_data = &data[row_start + 1..row_start + row_size];
        let mut current_row = vec![0u8; row_bytes];

        match filter_type {
            0 => current_row.copy_from_slice(row_data),
            1 => {
                // Sub: left neighbor
                for i in 0..row_bytes {
                    let left = if i >= bpp { current_row[i - bpp] } else { 0 };
                    current_row[i] = row_data[i].wrapping_add(left);
                }
            }
            2 => {
                // Up: previous row
                for i in 0..row_bytes {
                    current_row[i] = row_data[i].wrapping_add(prev_row[i]);
                }
            }
            3 => {
                // Average of left and above
                for i in 0..row_bytes {
                    let left = if i >= bpp {
                        current_row[i - bpp] as u16
                    } else {
                        0
                    };
                    let above = prev_row[i] as u16;
                    current_row[i] = row_data[i].wrapping_add(((left + above) / 2) as u8);
                }
            }
            4 => {
                for i in 0..row_bytes {
                    let left = if i >= bpp { current_row[i - bpp] } else { 0 };
                    let above = prev_row[i];
                    let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
                    let paeth = paeth_predictor(left, above, upper_left);
                    current_row[i] = row_data[i].wrapping_add(paeth);
                }
            }
            _ => current_row.copy_from_slice(row_data),
        }

        result.extend_from_slice(&current_row);
        prev_row = current_row;
    }

    result
}

/// Reverse TIFF predictor 2: add the left neighbor per component.
///
/// Only the byte-aligned case (8-bit components) is reconstructed; other
/// depths pass through unchanged.
pub fn apply_tiff_predictor(
    data: &[u8],
    columns: usize,
    colors: usize,
    bits_per_component: usize,
) -> Vec<u8> {
    if bits_per_component != 8 {
        return data.to_vec();
    }
    let row_bytes = columns * colors;
    if row_bytes == 0 {
        return data.to_vec();
    }
    let mut result = data.to_vec();
    for row in result.chunks_mut(row_bytes) {
        for i in colors..row.len() {
            row[i] = row[i].wrapping_add(row[i - colors]);
        }
    }
    result
}

/// Paeth predictor function used in PNG filtering.
const fn paeth_predictor(left: u8, above: u8, upper_left: u8) -> u8 {
    let a = left as i32;
    let b = above as i32;
    let c = upper_left as i32;
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        above
    } else {
        upper_left
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_applies_in_declared_order() {
        // RunLength then ASCIIHex over the wire means decoding hex first.
        let inner = rlencode(b"chained");
        let wire = asciihexencode(&inner);
        let chain = vec![
            FilterSpec {
                name: "ASCIIHexDecode".into(),
                parms: None,
            },
            FilterSpec {
                name: "RunLengthDecode".into(),
                parms: None,
            },
        ];
        assert_eq!(apply_filters(&wire, &chain, true).unwrap(), b"chained");
    }

    #[test]
    fn filter_chain_normalizes_single_name() {
        let chain = filter_chain(Some(&Object::Name("FlateDecode".into())), None).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].name, "FlateDecode");
        assert!(chain[0].parms.is_none());
    }

    #[test]
    fn filter_chain_aligns_parms_array() {
        let filters = Object::Array(vec![
            Object::Name("ASCII85Decode".into()),
            Object::Name("FlateDecode".into()),
        ]);
        let mut d = HashMap::new();
        d.insert("Predictor".to_string(), Object::Int(12));
        let parms = Object::Array(vec![Object::Null, Object::Dict(d)]);
        let chain = filter_chain(Some(&filters), Some(&parms)).unwrap();
        assert!(chain[0].parms.is_none());
        assert_eq!(
            chain[1].parms.as_ref().unwrap().get("Predictor").unwrap(),
            &Object::Int(12)
        );
    }

    #[test]
    fn unknown_filter_fails_strict_truncates_permissive() {
        let chain = vec![FilterSpec {
            name: "DCTDecode".into(),
            parms: None,
        }];
        assert!(apply_filters(b"jpeg", &chain, true).is_err());
        assert_eq!(apply_filters(b"jpeg", &chain, false).unwrap(), b"jpeg");
    }

    #[test]
    fn png_up_predictor_reconstructs_rows() {
        // Two rows of 3 bytes, both Up-filtered.
        // Row 1: raw 1 2 3 against zero prev row.
        // Row 2: deltas 10 10 10 against row 1 -> 11 12 13.
        let data = [2, 1, 2, 3, 2, 10, 10, 10];
        let out = apply_png_predictor(&data, 3, 1, 8);
        assert_eq!(out, vec![1, 2, 3, 11, 12, 13]);
    }

    #[test]
    fn png_sub_predictor_uses_left_neighbor() {
        let data = [1, 5, 1, 1];
        let out = apply_png_predictor(&data, 3, 1, 8);
        assert_eq!(out, vec![5, 6, 7]);
    }

    #[test]
    fn tiff_predictor_accumulates_per_component() {
        let data = [1, 1, 1, 1, 2, 2, 2, 2];
        let out = apply_tiff_predictor(&data, 2, 2, 8);
        assert_eq!(out, vec![1, 1, 2, 2, 2, 2, 4, 4]);
    }
}
