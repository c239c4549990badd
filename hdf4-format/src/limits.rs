//! Resource limits applied while decoding untrusted files

/// Upper bounds that keep hostile input from exhausting memory or time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of directory blocks followed (default: 65,536)
    pub max_directory_blocks: usize,
    /// Maximum number of directory entries (default: 4,000,000)
    pub max_tags: usize,
    /// Maximum bytes read for one metadata payload (default: 64 MiB)
    pub max_payload_bytes: usize,
    /// Maximum variable rank (default: 32)
    pub max_rank: usize,
    /// Maximum number of chunks in one chunk table (default: 1,000,000)
    pub max_chunks: usize,
    /// Maximum bytes produced by one decompression (default: 1 GiB)
    pub max_decompressed_bytes: usize,
    /// Maximum length of one linked-block chain (default: 1,000,000)
    pub max_linked_blocks: usize,
    /// Maximum nesting of V-groups built as groups (default: 256)
    pub max_group_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_directory_blocks: 65_536,
            max_tags: 4_000_000,
            max_payload_bytes: 64 * 1024 * 1024,
            max_rank: 32,
            max_chunks: 1_000_000,
            max_decompressed_bytes: 1024 * 1024 * 1024,
            max_linked_blocks: 1_000_000,
            max_group_depth: 256,
        }
    }
}

impl Limits {
    /// Check a payload length against `max_payload_bytes`.
    pub fn check_payload(&self, len: usize) -> crate::Result<()> {
        if len > self.max_payload_bytes {
            return Err(crate::FormatError::LimitExceeded(format!(
                "Payload of {} bytes exceeds limit {}",
                len, self.max_payload_bytes
            )));
        }
        Ok(())
    }

    /// Check a decoded length against `max_decompressed_bytes`.
    pub fn check_decompressed(&self, len: usize) -> crate::Result<()> {
        if len > self.max_decompressed_bytes {
            return Err(crate::FormatError::LimitExceeded(format!(
                "Uncompressed length {} exceeds limit {}",
                len, self.max_decompressed_bytes
            )));
        }
        Ok(())
    }

    /// Check a rank against `max_rank`.
    pub fn check_rank(&self, rank: usize) -> crate::Result<()> {
        if rank > self.max_rank {
            return Err(crate::FormatError::LimitExceeded(format!(
                "Rank {} exceeds limit {}",
                rank, self.max_rank
            )));
        }
        Ok(())
    }
}
