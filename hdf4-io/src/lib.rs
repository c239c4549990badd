//! HDF4 I/O - File access and high-level APIs
//!
//! This crate turns an HDF4 byte stream into a dataset model and reads
//! variable data back out:
//!
//! - Random-access byte sources (files, readers, memory)
//! - Tag directory walking and payload decoding
//! - Multi-pass construction of groups, variables, dimensions and attributes
//! - Lazy, memoized layout resolution per variable
//! - Section reads over contiguous, linked, compressed and chunked storage

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod access;
pub mod construct;
pub mod directory;
pub mod layout;
pub mod model;
pub mod reader;
pub mod section;
pub mod source;

// Re-export commonly used types
pub use hdf4_codec::DecompressOpts;
pub use hdf4_format::{
    DataType, FormatError, Limits, Result, TagKey, TagPayload, TagRecord, Values,
};
pub use layout::{ChunkLayout, Compression, LayoutInfo, LayoutKind, Segment};
pub use model::{Attribute, Dataset, DimId, Dimension, Group, GroupId, Member, VarId, Variable};
pub use reader::Hdf4File;
pub use section::{Range, Section};
pub use source::{ByteSource, FileSource, MemorySource};

use serde::Serialize;

/// Options applied when opening a file
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Upper bound for the magic-number search
    pub max_header_search: u64,
    /// Security limits
    pub limits: Limits,
    /// Fail the open on the first construction error instead of skipping
    /// the offending object
    pub strict: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_header_search: hdf4_format::constants::DEFAULT_MAX_HEADER_SEARCH,
            limits: Limits::default(),
            strict: false,
        }
    }
}

impl DecodeOptions {
    pub(crate) fn decompress_opts(&self) -> DecompressOpts {
        DecompressOpts {
            limits: self.limits.clone(),
        }
    }
}

/// How serious a diagnostic is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Recoverable; the model is complete apart from an optional feature
    Warning,
    /// An object was skipped
    Error,
}

/// A condition recorded while opening a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Tag being processed, when known
    pub tag: Option<TagKey>,
    /// Human readable description
    pub message: String,
}

impl Diagnostic {
    pub(crate) fn warning(tag: Option<TagKey>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            tag,
            message: message.into(),
        }
    }

    pub(crate) fn error(tag: Option<TagKey>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            tag,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match self.tag {
            Some(tag) => write!(f, "{level}: {tag}: {}", self.message),
            None => write!(f, "{level}: {}", self.message),
        }
    }
}

/// Open an HDF4 file with default options
pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Hdf4File> {
    Hdf4File::open(path, DecodeOptions::default())
}
