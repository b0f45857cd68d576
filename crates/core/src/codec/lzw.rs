//! LZWDecode via the weezl crate.
//!
//! PDF LZW is MSB-first with 8-bit symbols, clear code 256, EOD 257 and
//! 9-12 bit code growth. /EarlyChange 1 (the default) widens codes one
//! entry before the table fills; /EarlyChange 0 is the TIFF-style switch.

use crate::error::{PdfError, Result};
use weezl::{decode::Decoder, BitOrder};

/// Decode LZW data with the PDF default EarlyChange=1.
pub fn lzwdecode(data: &[u8]) -> Result<Vec<u8>> {
    lzwdecode_with_earlychange(data, 1, false)
}

/// Decode LZW data honoring the /EarlyChange parameter.
pub fn lzwdecode_with_earlychange(data: &[u8], early_change: i64, strict: bool) -> Result<Vec<u8>> {
    let mut decoder = if early_change == 0 {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        Decoder::new(BitOrder::Msb, 8)
    };
    let mut output = Vec::new();
    let result = decoder.into_vec(&mut output).decode(data);
    match result.status {
        Ok(_) => Ok(output),
        Err(e) if strict => Err(PdfError::DecodeError(format!("lzw: {:?}", e))),
        Err(_) => {
            // Keep partial output on corrupt data.
            log::warn!("corrupt lzw stream, keeping partial output");
            Ok(output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weezl::encode::Encoder;

    fn lzw_encode(data: &[u8], early: bool) -> Vec<u8> {
        let mut encoder = if early {
            Encoder::new(BitOrder::Msb, 8)
        } else {
            Encoder::with_tiff_size_switch(BitOrder::Msb, 8)
        };
        let mut out = Vec::new();
        let result = encoder.into_vec(&mut out).encode_all(data);
        assert!(result.status.is_ok());
        out
    }

    #[test]
    fn round_trip_default() {
        let data = b"-----A---B-----A---B---";
        let encoded = lzw_encode(data, true);
        assert_eq!(lzwdecode(&encoded).unwrap(), data);
    }

    #[test]
    fn early_change_variants_differ() {
        // Enough data to push past a code-width boundary so the variants
        // place the width switch at different code positions.
        let data: Vec<u8> = (0u16..2048).map(|i| (i % 7) as u8).collect();
        let enc_early = lzw_encode(&data, true);
        let enc_tiff = lzw_encode(&data, false);
        assert_ne!(enc_early, enc_tiff);
        assert_eq!(
            lzwdecode_with_earlychange(&enc_early, 1, true).unwrap(),
            data
        );
        assert_eq!(
            lzwdecode_with_earlychange(&enc_tiff, 0, true).unwrap(),
            data
        );
    }
}
