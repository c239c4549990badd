//! DEFLATE (zlib) decompression

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use hdf4_format::{FormatError, Result};

// Preallocation cap; the declared length comes from the file.
const MAX_PREALLOC: usize = 16 * 1024 * 1024;

/// Inflate a zlib stream, stopping after `expected` output bytes.
pub fn inflate<R: Read>(input: R, expected: usize) -> Result<Vec<u8>> {
    let decoder = ZlibDecoder::new(input);
    let mut out = Vec::with_capacity(expected.min(MAX_PREALLOC));
    decoder
        .take(expected as u64)
        .read_to_end(&mut out)
        .map_err(|e| FormatError::Decompress(format!("Inflate failed: {}", e)))?;
    Ok(out)
}

/// Compress `data` into a zlib stream.
///
/// Used to build fixtures; the reader never writes.
pub fn deflate(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inflate_matches_input() {
        let data: Vec<u8> = (0..4000u32).flat_map(|i| (i % 97).to_be_bytes()).collect();
        let compressed = deflate(&data, 6).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(inflate(&compressed[..], data.len()).unwrap(), data);
    }

    #[test]
    fn test_inflate_caps_output() {
        let data = vec![7u8; 1000];
        let compressed = deflate(&data, 9).unwrap();
        assert_eq!(inflate(&compressed[..], 10).unwrap(), vec![7u8; 10]);
    }

    #[test]
    fn test_garbage_is_decompress_error() {
        let garbage = [0xFFu8, 0x00, 0x12, 0x34, 0x56];
        assert!(matches!(
            inflate(&garbage[..], 100),
            Err(FormatError::Decompress(_))
        ));
    }
}
