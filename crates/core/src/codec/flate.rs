//! FlateDecode: raw zlib streams via flate2.

use crate::error::{PdfError, Result};
use std::io::Read;

/// Decode a zlib stream.
///
/// In permissive mode corrupt data yields the partial output produced before
/// the decoder failed; strict mode surfaces the error.
pub fn flatedecode(data: &[u8], strict: bool) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut out = Vec::new();
    match decoder.read_to_end(&mut out) {
        Ok(_) => Ok(out),
        Err(e) if strict => Err(PdfError::DecodeError(format!("flate: {}", e))),
        Err(_) => {
            log::warn!("corrupt flate stream, keeping partial output");
            Ok(decompress_corrupted(data))
        }
    }
}

/// Best-effort zlib decompression for corrupted streams.
///
/// Feeds the decoder a byte at a time and keeps everything produced before
/// the failure point (often a bad CRC near the end).
fn decompress_corrupted(data: &[u8]) -> Vec<u8> {
    use flate2::{Decompress, FlushDecompress, Status};
    let mut decoder = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut buf = [0u8; 4096];
    let mut i = 0usize;
    while i < data.len() {
        let before_out = decoder.total_out();
        let before_in = decoder.total_in();
        let res = decoder.decompress(&data[i..i + 1], &mut buf, FlushDecompress::None);
        let produced = (decoder.total_out() - before_out) as usize;
        if produced > 0 {
            out.extend_from_slice(&buf[..produced]);
        }
        let consumed = (decoder.total_in() - before_in) as usize;
        i += consumed.max(1);
        match res {
            Ok(Status::StreamEnd) | Err(_) => break,
            Ok(_) => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn round_trip() {
        let data = b"stream data that compresses: aaaaaaaaaaaaaaaaaaaaaaaa";
        assert_eq!(flatedecode(&deflate(data), true).unwrap(), data);
    }

    #[test]
    fn truncated_stream_keeps_prefix_in_permissive() {
        let data = vec![b'x'; 2000];
        let mut compressed = deflate(&data);
        compressed.truncate(compressed.len() - 6);
        let out = flatedecode(&compressed, false).unwrap();
        assert!(!out.is_empty());
        assert!(out.iter().all(|&b| b == b'x'));
    }

    #[test]
    fn truncated_stream_fails_in_strict() {
        let data = vec![b'x'; 2000];
        let mut compressed = deflate(&data);
        compressed.truncate(compressed.len() - 6);
        assert!(flatedecode(&compressed, true).is_err());
    }
}
