//! HDF4 Format - Core primitives for reading HDF4 containers
//!
//! This crate holds the wire-level pieces of the HDF4 format with no I/O
//! dependencies:
//!
//! - Magic numbers, tag codes and class names
//! - Tag keys and directory entries
//! - Payload decoders for every interpreted tag
//! - Special (linked, compressed, chunked) element headers
//! - Number types and typed values
//! - Error types and resource limits

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod constants;
pub mod cursor;
pub mod error;
pub mod limits;
pub mod payload;
pub mod special;
pub mod tag;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use error::{FormatError, Result};
pub use limits::Limits;
pub use payload::TagPayload;
pub use special::{Special, SpecialChunked, SpecialComp, SpecialLinked};
pub use tag::{DirectoryEntry, TagKey, TagRecord};
pub use types::DataType;
pub use value::Values;

use serde::Serialize;

/// Parameters of N-bit packed data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NBitParams {
    /// `DFNT_*` type of the unpacked elements
    pub number_type: i32,
    /// Sign-extend the packed field
    pub sign_extend: bool,
    /// Fill the bits outside the field with ones
    pub fill_one: bool,
    /// Highest bit of the field (bit 0 is the least significant)
    pub start_bit: i32,
    /// Width of the field in bits
    pub bit_length: i32,
}

/// Compression schemes of compressed special elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Codec {
    /// Stored as-is
    None,
    /// Run-length encoding (not readable)
    Rle,
    /// N-bit packing
    NBit(NBitParams),
    /// Skipping Huffman (not readable)
    SkipHuffman {
        /// Bytes per skipped unit
        skip_size: i32,
    },
    /// DEFLATE with the level used by the writer
    Deflate {
        /// Compression level
        level: u16,
    },
    /// SZIP (not readable)
    Szip,
    /// Unrecognized compression code
    Unknown(u16),
}

impl Codec {
    /// Get the compression code for this codec
    pub fn code(&self) -> u16 {
        match self {
            Codec::None => constants::COMP_CODE_NONE,
            Codec::Rle => constants::COMP_CODE_RLE,
            Codec::NBit(_) => constants::COMP_CODE_NBIT,
            Codec::SkipHuffman { .. } => constants::COMP_CODE_SKPHUFF,
            Codec::Deflate { .. } => constants::COMP_CODE_DEFLATE,
            Codec::Szip => constants::COMP_CODE_SZIP,
            Codec::Unknown(code) => *code,
        }
    }

    /// Check if this codec can be decoded
    pub fn is_supported(&self) -> bool {
        matches!(self, Codec::None | Codec::NBit(_) | Codec::Deflate { .. })
    }

    /// Short name for listings.
    pub fn name(&self) -> &'static str {
        match self {
            Codec::None => "none",
            Codec::Rle => "rle",
            Codec::NBit(_) => "nbit",
            Codec::SkipHuffman { .. } => "skphuff",
            Codec::Deflate { .. } => "deflate",
            Codec::Szip => "szip",
            Codec::Unknown(_) => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_code() {
        assert_eq!(Codec::None.code(), constants::COMP_CODE_NONE);
        assert_eq!(Codec::Deflate { level: 6 }.code(), constants::COMP_CODE_DEFLATE);
        assert_eq!(Codec::Szip.code(), constants::COMP_CODE_SZIP);
        assert_eq!(Codec::Unknown(77).code(), 77);
    }

    #[test]
    fn test_codec_support() {
        assert!(Codec::None.is_supported());
        assert!(Codec::Deflate { level: 1 }.is_supported());
        assert!(!Codec::Rle.is_supported());
        assert!(!Codec::SkipHuffman { skip_size: 4 }.is_supported());
        assert!(!Codec::Szip.is_supported());
        assert!(!Codec::Unknown(9).is_supported());
    }
}
