//! Error types for HDF4 decoding

use crate::tag::TagKey;
use thiserror::Error;

/// HDF4 error types
#[derive(Debug, Error)]
pub enum FormatError {
    /// The magic number was not found within the search bound.
    #[error("Not an HDF4 file: magic number not found")]
    NotRecognized,
    /// A directory or payload read ran past the end of the input.
    #[error("Truncated data: needed {needed} bytes at offset {offset}")]
    Truncated {
        /// Offset of the failed read
        offset: u64,
        /// Number of bytes requested
        needed: u64,
    },
    /// A directory block or link table chain revisits a block.
    #[error("Cycle in block chain at offset {offset}")]
    DirectoryCycle {
        /// Offset (or packed key) that was visited twice
        offset: u64,
    },
    /// A cross-reference names a tag that is not in the directory.
    #[error("Dangling reference to {key} ({context})")]
    DanglingReference {
        /// Key that failed to resolve
        key: TagKey,
        /// What was being resolved
        context: String,
    },
    /// Compression code that this decoder cannot read.
    #[error("Unsupported compression code: {0}")]
    UnsupportedCompression(u16),
    /// Number type code that this decoder cannot map.
    #[error("Unsupported number type: {0}")]
    UnsupportedNumberType(u8),
    /// Declared dimensions disagree with the data shape.
    #[error("Inconsistent shape: {0}")]
    InconsistentShape(String),
    /// A V-group contains itself, directly or indirectly.
    #[error("V-group cycle detected at {0}")]
    CycleDetected(TagKey),
    /// A requested section does not fit the variable shape.
    #[error("Invalid section: {0}")]
    InvalidSection(String),
    /// A configured limit was exceeded.
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),
    /// A record is internally inconsistent.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    /// The decompressor rejected its input.
    #[error("Decompression error: {0}")]
    Decompress(String),
    /// I/O operation failed while reading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FormatError {
    /// Shorthand for a dangling reference error.
    pub fn dangling(key: TagKey, context: impl Into<String>) -> Self {
        FormatError::DanglingReference {
            key,
            context: context.into(),
        }
    }

    /// Whether this error aborts a file open rather than one object.
    pub fn is_fatal_to_open(&self) -> bool {
        matches!(
            self,
            FormatError::NotRecognized
                | FormatError::Truncated { .. }
                | FormatError::DirectoryCycle { .. }
                | FormatError::LimitExceeded(_)
                | FormatError::Io(_)
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, FormatError>;
