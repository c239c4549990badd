//! HDF4 Codec - Decompression engines
//!
//! This crate turns the stored bytes of a compressed special element back
//! into element bytes:
//!
//! - DEFLATE (zlib stream) through `flate2`
//! - N-bit unpacking
//! - Pass-through for elements stored with compression code 0

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod deflate;
pub mod nbit;

use std::io::Read;

// Re-export commonly used types
pub use hdf4_format::{Codec, FormatError, Limits, NBitParams, Result};

/// Decompression options
#[derive(Debug, Clone, Default)]
pub struct DecompressOpts {
    /// Security limits
    pub limits: Limits,
}

/// Decode a compressed element read from `input`.
///
/// Output is capped at `uncompressed_length`; a stream that ends early
/// yields fewer bytes and the caller fills the remainder.
pub fn decompress<R: Read>(
    codec: &Codec,
    input: R,
    uncompressed_length: usize,
    opts: &DecompressOpts,
) -> Result<Vec<u8>> {
    opts.limits.check_decompressed(uncompressed_length)?;

    match codec {
        Codec::None => {
            let mut out = Vec::with_capacity(uncompressed_length);
            input
                .take(uncompressed_length as u64)
                .read_to_end(&mut out)?;
            Ok(out)
        }
        Codec::Deflate { .. } => deflate::inflate(input, uncompressed_length),
        Codec::NBit(params) => {
            let mut packed = Vec::new();
            let mut input = input;
            input.read_to_end(&mut packed)?;
            nbit::unpack(&packed, params, uncompressed_length)
        }
        other => {
            tracing::debug!(codec = other.name(), "compression scheme not readable");
            Err(FormatError::UnsupportedCompression(other.code()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_capped() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let out = decompress(&Codec::None, &data[..], 4, &DecompressOpts::default()).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_unsupported_codecs_fail() {
        for codec in [Codec::Rle, Codec::Szip, Codec::SkipHuffman { skip_size: 2 }] {
            match decompress(&codec, &[0u8; 4][..], 4, &DecompressOpts::default()) {
                Err(FormatError::UnsupportedCompression(code)) => assert_eq!(code, codec.code()),
                other => panic!("expected UnsupportedCompression, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_limit_on_uncompressed_length() {
        let opts = DecompressOpts {
            limits: Limits {
                max_decompressed_bytes: 16,
                ..Limits::default()
            },
        };
        assert!(matches!(
            decompress(&Codec::None, &[0u8; 32][..], 32, &opts),
            Err(FormatError::LimitExceeded(_))
        ));
    }
}
