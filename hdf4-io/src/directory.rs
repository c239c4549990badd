//! Tag directory reader
//!
//! Locates the magic number, walks the chain of directory blocks and decodes
//! every tag payload. Any failure here aborts the open.

use ahash::{AHashMap, AHashSet};
use hdf4_format::constants::{
    DDH_HEADER_SIZE, DD_ENTRY_SIZE, FILE_MAGIC, HEADER_SEARCH_START, TAG_NULL, TAG_WILDCARD,
};
use hdf4_format::{DirectoryEntry, FormatError, Result, TagKey, TagPayload, TagRecord};
use tracing::{debug, warn};

use crate::source::ByteSource;
use crate::{DecodeOptions, Diagnostic};

/// All tags of a file, in directory order, indexed by key
#[derive(Debug, Clone)]
pub struct TagDirectory {
    header_offset: u64,
    block_count: usize,
    tags: Vec<TagRecord>,
    index: AHashMap<TagKey, usize>,
}

impl TagDirectory {
    /// Read and decode the directory of `source`.
    pub fn read(
        source: &dyn ByteSource,
        opts: &DecodeOptions,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Self> {
        let header_offset = find_magic(source, opts.max_header_search)?;
        debug!(offset = header_offset, "found HDF4 magic");

        let (entries, block_count) = walk_blocks(source, header_offset, opts, diagnostics)?;

        let mut tags = Vec::with_capacity(entries.len());
        let mut index = AHashMap::with_capacity(entries.len());
        for entry in entries {
            let payload = decode_payload(source, &entry, opts, diagnostics)?;
            index.insert(entry.key(), tags.len());
            tags.push(TagRecord { entry, payload });
        }

        debug!(tags = tags.len(), blocks = block_count, "decoded tag directory");
        Ok(Self {
            header_offset,
            block_count,
            tags,
            index,
        })
    }

    /// Offset of the magic number.
    pub fn header_offset(&self) -> u64 {
        self.header_offset
    }

    /// Number of directory blocks walked.
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Tags in directory order.
    pub fn tags(&self) -> &[TagRecord] {
        &self.tags
    }

    /// Look up a tag by key.
    pub fn get(&self, key: TagKey) -> Option<&TagRecord> {
        self.index.get(&key).map(|&i| &self.tags[i])
    }

    /// Look up a tag that must exist.
    pub fn require(&self, key: TagKey, context: &str) -> Result<&TagRecord> {
        self.get(key)
            .ok_or_else(|| FormatError::dangling(key, context))
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the directory has no tags.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Find the magic number at offset 0 or a doubling offset from 512.
pub fn find_magic(source: &dyn ByteSource, max_search: u64) -> Result<u64> {
    let len = source.len();
    let mut magic = [0u8; 4];
    let mut offset = 0u64;
    while offset < len && offset < max_search {
        if offset + 4 <= len {
            source.read_at(offset, &mut magic)?;
            if magic == FILE_MAGIC {
                return Ok(offset);
            }
        }
        offset = if offset == 0 {
            HEADER_SEARCH_START
        } else {
            offset * 2
        };
    }
    Err(FormatError::NotRecognized)
}

fn walk_blocks(
    source: &dyn ByteSource,
    header_offset: u64,
    opts: &DecodeOptions,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(Vec<DirectoryEntry>, usize)> {
    let limits = &opts.limits;
    let mut entries: Vec<DirectoryEntry> = Vec::new();
    let mut seen_keys: AHashSet<TagKey> = AHashSet::new();
    let mut visited: AHashSet<u64> = AHashSet::new();
    let mut block_offset = header_offset + FILE_MAGIC.len() as u64;
    let mut blocks = 0usize;

    loop {
        if !visited.insert(block_offset) {
            return Err(FormatError::DirectoryCycle {
                offset: block_offset,
            });
        }
        blocks += 1;
        if blocks > limits.max_directory_blocks {
            return Err(FormatError::LimitExceeded(format!(
                "More than {} directory blocks",
                limits.max_directory_blocks
            )));
        }

        let header = source.read_range(block_offset, DDH_HEADER_SIZE)?;
        let count = u16::from_be_bytes([header[0], header[1]]) as usize;
        let next = u32::from_be_bytes([header[2], header[3], header[4], header[5]]) as u64;

        let body = source.read_range(block_offset + DDH_HEADER_SIZE as u64, count * DD_ENTRY_SIZE)?;
        for raw in body.chunks_exact(DD_ENTRY_SIZE) {
            let entry = DirectoryEntry::decode(raw)?;
            if entry.code == TAG_WILDCARD || entry.code == TAG_NULL {
                continue;
            }
            if !seen_keys.insert(entry.key()) {
                warn!(tag = %entry.key(), "duplicate directory entry ignored");
                diagnostics.push(Diagnostic::warning(
                    Some(entry.key()),
                    "duplicate directory entry ignored",
                ));
                continue;
            }
            if entries.len() >= limits.max_tags {
                return Err(FormatError::LimitExceeded(format!(
                    "More than {} tags",
                    limits.max_tags
                )));
            }
            entries.push(entry);
        }

        if next == 0 {
            break;
        }
        block_offset = next;
    }

    Ok((entries, blocks))
}

fn decode_payload(
    source: &dyn ByteSource,
    entry: &DirectoryEntry,
    opts: &DecodeOptions,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<TagPayload> {
    if !TagPayload::needs_bytes(entry) {
        return Ok(TagPayload::without_bytes(entry));
    }
    let len = entry.length as usize;
    opts.limits.check_payload(len)?;
    let bytes = source.read_range(entry.offset as u64, len)?;
    match TagPayload::decode(entry, &bytes) {
        Ok(payload) => Ok(payload),
        Err(err) if err.is_fatal_to_open() => Err(err),
        Err(err) => {
            warn!(tag = %entry.key(), error = %err, "tag payload not decoded");
            diagnostics.push(Diagnostic::warning(
                Some(entry.key()),
                format!("payload not decoded: {err}"),
            ));
            Ok(TagPayload::Opaque)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn block(entries: &[DirectoryEntry], next: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(entries.len() as u16).to_be_bytes());
        out.extend_from_slice(&next.to_be_bytes());
        for e in entries {
            out.extend_from_slice(&e.encode());
        }
        out
    }

    fn nt_entry(reference: u16, offset: i32) -> DirectoryEntry {
        DirectoryEntry {
            code: 106,
            extended: false,
            reference,
            offset,
            length: 4,
        }
    }

    #[test]
    fn test_magic_search_doubles() {
        let mut data = vec![0u8; 2048];
        data[1024..1028].copy_from_slice(&FILE_MAGIC);
        let source = MemorySource::new(data.clone());
        assert_eq!(find_magic(&source, 500_000).unwrap(), 1024);
        assert!(matches!(
            find_magic(&source, 1000),
            Err(FormatError::NotRecognized)
        ));
        // offsets between candidates are never considered
        let mut data = vec![0u8; 2048];
        data[700..704].copy_from_slice(&FILE_MAGIC);
        assert!(find_magic(&MemorySource::new(data), 500_000).is_err());
    }

    #[test]
    fn test_self_linked_block_is_cycle() {
        let mut data = FILE_MAGIC.to_vec();
        data.extend(block(&[], 4));
        let result = TagDirectory::read(
            &MemorySource::new(data),
            &DecodeOptions::default(),
            &mut Vec::new(),
        );
        assert!(matches!(result, Err(FormatError::DirectoryCycle { offset: 4 })));
    }

    #[test]
    fn test_truncated_block() {
        let mut data = FILE_MAGIC.to_vec();
        let mut b = block(&[nt_entry(1, 100), nt_entry(2, 104)], 0);
        b.truncate(b.len() - 5);
        data.extend(b);
        let result = TagDirectory::read(
            &MemorySource::new(data),
            &DecodeOptions::default(),
            &mut Vec::new(),
        );
        assert!(matches!(result, Err(FormatError::Truncated { .. })));
    }

    #[test]
    fn test_null_entries_dropped_and_duplicates_warned() {
        let header_len = 4 + DDH_HEADER_SIZE + 4 * DD_ENTRY_SIZE;
        let payload_at = header_len as i32;
        let null = DirectoryEntry {
            code: TAG_NULL,
            extended: false,
            reference: 0,
            offset: -1,
            length: -1,
        };
        let mut data = FILE_MAGIC.to_vec();
        data.extend(block(
            &[
                nt_entry(1, payload_at),
                null,
                nt_entry(1, payload_at),
                nt_entry(2, payload_at),
            ],
            0,
        ));
        data.extend_from_slice(&[1, 24, 32, 1]);

        let mut diagnostics = Vec::new();
        let dir = TagDirectory::read(
            &MemorySource::new(data),
            &DecodeOptions::default(),
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(dir.len(), 2);
        assert_eq!(diagnostics.len(), 1);
        let record = dir.get(TagKey::new(106, 2)).unwrap();
        assert!(matches!(record.payload, TagPayload::NumberType(_)));
    }
}
