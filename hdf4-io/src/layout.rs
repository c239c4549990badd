//! Layout resolution
//!
//! Turns a variable's data tag into a [`LayoutInfo`]: where its bytes are,
//! how they are split, and whether they are compressed. Resolution only
//! reads the file (link tables, chunk tables); it never touches the tag
//! graph.

use ahash::AHashSet;
use hdf4_format::constants::{FILL_VALUE_ATTRIBUTE, TAG_LINKED, TAG_VDATA_STORAGE};
use hdf4_format::cursor::Cursor;
use hdf4_format::{
    Codec, FormatError, Result, Special, SpecialChunked, SpecialLinked, TagKey, TagPayload,
};
use serde::Serialize;
use smallvec::SmallVec;
use tracing::debug;

use crate::access;
use crate::directory::TagDirectory;
use crate::model::Variable;
use crate::source::ByteSource;
use crate::DecodeOptions;

/// Per-dimension index or length, inline for common ranks
pub type Coords = SmallVec<[usize; 4]>;

/// One piece of a linked-block chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// File offset
    pub offset: u64,
    /// Length in bytes; may be zero
    pub length: u64,
}

/// Compression applied to stored bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Compression {
    /// Compression scheme
    pub codec: Codec,
    /// Length once decompressed
    pub uncompressed_length: u64,
}

/// Physical arrangement of a variable's bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LayoutKind {
    /// Nothing stored; every element reads as the fill value
    NoData,
    /// One run of bytes
    Contiguous {
        /// File offset
        offset: u64,
        /// Length in bytes
        length: u64,
    },
    /// Chain of linked blocks read back to back
    Linked {
        /// Blocks in chain order
        segments: Vec<Segment>,
    },
    /// Fixed-shape chunks, each stored on its own
    Chunked {
        /// Chunk length per dimension
        chunk_shape: Coords,
        /// Chunks sorted by origin
        chunks: Vec<ChunkLayout>,
    },
}

impl LayoutKind {
    /// Total stored bytes of a contiguous or linked placement.
    pub fn stored_length(&self) -> u64 {
        match self {
            LayoutKind::NoData | LayoutKind::Chunked { .. } => 0,
            LayoutKind::Contiguous { length, .. } => *length,
            LayoutKind::Linked { segments } => segments.iter().map(|s| s.length).sum(),
        }
    }

    /// Short name for listings.
    pub fn name(&self) -> &'static str {
        match self {
            LayoutKind::NoData => "nodata",
            LayoutKind::Contiguous { .. } => "contiguous",
            LayoutKind::Linked { .. } => "linked",
            LayoutKind::Chunked { .. } => "chunked",
        }
    }
}

/// Placement of one stored element (a whole variable or one chunk)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementLayout {
    /// Contiguous, linked or no data
    pub placement: LayoutKind,
    /// Compression of the stored bytes
    pub compression: Option<Compression>,
}

/// One chunk of a chunked variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkLayout {
    /// Element index of the chunk's first element
    pub origin: Coords,
    /// Data tag holding the chunk
    pub tag: TagKey,
    /// Contiguous or linked placement
    pub placement: LayoutKind,
    /// Compression of this chunk only
    pub compression: Option<Compression>,
}

impl ChunkLayout {
    /// The chunk as a stored element.
    pub fn element(&self) -> ElementLayout {
        ElementLayout {
            placement: self.placement.clone(),
            compression: self.compression,
        }
    }
}

/// Resolved layout of one variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutInfo {
    /// Physical arrangement
    pub kind: LayoutKind,
    /// Compression of a contiguous or linked variable
    pub compression: Option<Compression>,
    /// Bytes per element
    pub element_size: usize,
    /// Fill value, one big-endian element
    pub fill_value: Option<Vec<u8>>,
}

impl LayoutInfo {
    /// One element of fill: the fill value, else zeros.
    pub fn fill_element(&self) -> Vec<u8> {
        match &self.fill_value {
            Some(fill) if fill.len() == self.element_size => fill.clone(),
            _ => vec![0u8; self.element_size.max(1)],
        }
    }

    /// Chunk starting at `origin`.
    pub fn chunk(&self, origin: &[usize]) -> Option<&ChunkLayout> {
        match &self.kind {
            LayoutKind::Chunked { chunks, .. } => chunks
                .binary_search_by(|c| c.origin.as_slice().cmp(origin))
                .ok()
                .map(|i| &chunks[i]),
            _ => None,
        }
    }

    /// The variable as a stored element; `None` when chunked.
    pub fn element(&self) -> Option<ElementLayout> {
        match self.kind {
            LayoutKind::Chunked { .. } => None,
            _ => Some(ElementLayout {
                placement: self.kind.clone(),
                compression: self.compression,
            }),
        }
    }
}

/// Resolves layouts against one file
pub struct Resolver<'a> {
    source: &'a dyn ByteSource,
    directory: &'a TagDirectory,
    opts: &'a DecodeOptions,
}

impl<'a> Resolver<'a> {
    /// Create a resolver
    pub fn new(
        source: &'a dyn ByteSource,
        directory: &'a TagDirectory,
        opts: &'a DecodeOptions,
    ) -> Self {
        Self {
            source,
            directory,
            opts,
        }
    }

    /// Resolve the layout of `variable`.
    pub fn resolve(&self, variable: &Variable) -> Result<LayoutInfo> {
        let mut fill_value = if variable.is_compound() {
            None
        } else {
            variable
                .attribute(FILL_VALUE_ATTRIBUTE)
                .and_then(|a| a.value.first_as_element(variable.data_type))
        };

        let Some(data) = variable.storage.data else {
            return Ok(LayoutInfo {
                kind: LayoutKind::NoData,
                compression: None,
                element_size: variable.element_size,
                fill_value,
            });
        };

        let record = self.directory.require(data, "variable data")?;
        if let TagPayload::DataBlock(block) = &record.payload {
            if let Some(Special::Chunked(chunked)) = &block.special {
                debug!(tag = %data, "resolving chunked layout");
                if fill_value.is_none() && chunked.fill_value.len() == variable.element_size {
                    fill_value = Some(chunked.fill_value.clone());
                }
                return Ok(LayoutInfo {
                    kind: LayoutKind::Chunked {
                        chunk_shape: self.chunk_geometry(chunked, variable)?,
                        chunks: self.chunk_table(chunked)?,
                    },
                    compression: None,
                    element_size: variable.element_size,
                    fill_value,
                });
            }
        }

        let element = self.element(data)?;
        Ok(LayoutInfo {
            kind: element.placement,
            compression: element.compression,
            element_size: variable.element_size,
            fill_value,
        })
    }

    /// Resolve a contiguous, linked or compressed data element.
    pub fn element(&self, key: TagKey) -> Result<ElementLayout> {
        self.element_at_depth(key, 0)
    }

    fn element_at_depth(&self, key: TagKey, depth: usize) -> Result<ElementLayout> {
        let record = self.directory.require(key, "data element")?;
        let entry = record.entry;
        if entry.offset < 0 || entry.length < 0 {
            return Ok(ElementLayout {
                placement: LayoutKind::NoData,
                compression: None,
            });
        }
        let TagPayload::DataBlock(block) = &record.payload else {
            return Err(FormatError::Corrupt(format!("{key} is not a data element")));
        };
        match &block.special {
            None => Ok(ElementLayout {
                placement: LayoutKind::Contiguous {
                    offset: entry.offset as u64,
                    length: entry.length as u64,
                },
                compression: None,
            }),
            Some(Special::Linked(linked)) => Ok(ElementLayout {
                placement: LayoutKind::Linked {
                    segments: self.linked_segments(linked)?,
                },
                compression: None,
            }),
            Some(Special::Compressed(comp)) => {
                if depth > 0 {
                    return Err(FormatError::Corrupt(format!(
                        "{key} nests a compressed element inside another"
                    )));
                }
                let inner = self.element_at_depth(comp.data_tag(), depth + 1)?;
                Ok(ElementLayout {
                    placement: inner.placement,
                    compression: Some(Compression {
                        codec: comp.codec,
                        uncompressed_length: comp.uncompressed_length.max(0) as u64,
                    }),
                })
            }
            Some(Special::Chunked(_)) => Err(FormatError::Corrupt(format!(
                "{key} is chunked where a single element was expected"
            ))),
            Some(Special::Unsupported(code)) => Err(FormatError::UnsupportedCompression(*code)),
        }
    }

    /// Walk the link tables of a linked element.
    ///
    /// Segment lengths are capped so they sum to the element length.
    pub fn linked_segments(&self, linked: &SpecialLinked) -> Result<Vec<Segment>> {
        let limits = &self.opts.limits;
        let mut segments = Vec::new();
        let mut visited = AHashSet::new();
        let mut remaining = linked.length.max(0) as u64;
        let mut table_ref = linked.link_ref;

        while table_ref != 0 {
            let table_key = TagKey::new(TAG_LINKED, table_ref);
            if !visited.insert(table_ref) {
                return Err(FormatError::DirectoryCycle {
                    offset: table_key.packed() as u64,
                });
            }
            let table = self.directory.require(table_key, "link table")?;
            if table.entry.offset < 0 || table.entry.length < 2 {
                return Err(FormatError::Corrupt(format!("{table_key} is empty")));
            }
            let len = (table.entry.length as usize).min(2 + 2 * linked.block_count as usize);
            limits.check_payload(len)?;
            let bytes = self.source.read_range(table.entry.offset as u64, len)?;
            let mut cursor = Cursor::with_base(&bytes, table.entry.offset as u64);

            let next = cursor.u16()?;
            for _ in 0..linked.block_count {
                if cursor.remaining() < 2 {
                    break;
                }
                let block_ref = cursor.u16()?;
                if block_ref == 0 {
                    break;
                }
                let block_key = TagKey::new(TAG_LINKED, block_ref);
                let block = self.directory.require(block_key, "linked block")?;
                let stored = block.entry.length.max(0) as u64;
                let length = stored.min(remaining);
                remaining -= length;
                segments.push(Segment {
                    offset: block.entry.offset.max(0) as u64,
                    length,
                });
                if segments.len() > limits.max_linked_blocks {
                    return Err(FormatError::LimitExceeded(format!(
                        "Linked chain longer than {} blocks",
                        limits.max_linked_blocks
                    )));
                }
            }
            table_ref = next;
        }
        Ok(segments)
    }

    /// Check chunk lengths against the variable and the limits.
    ///
    /// The header's `chunk_size` may count bytes or elements; any other
    /// value is corrupt.
    fn chunk_geometry(&self, chunked: &SpecialChunked, variable: &Variable) -> Result<Coords> {
        let chunk_shape: Coords = chunked.chunk_shape().into_iter().collect();
        if chunk_shape.len() != variable.shape.len() || chunk_shape.contains(&0) {
            return Err(FormatError::InconsistentShape(format!(
                "chunk shape {:?} does not fit variable shape {:?}",
                chunk_shape, variable.shape
            )));
        }
        let elements = chunk_shape
            .iter()
            .try_fold(1usize, |acc, &len| acc.checked_mul(len));
        let bytes = elements.and_then(|n| n.checked_mul(variable.element_size));
        let (Some(elements), Some(bytes)) = (elements, bytes) else {
            return Err(FormatError::Corrupt(format!(
                "chunk shape {chunk_shape:?} overflows"
            )));
        };
        self.opts.limits.check_decompressed(bytes)?;

        let declared = chunked.chunk_size.max(0) as usize;
        if declared != 0 && declared != bytes && declared != elements {
            return Err(FormatError::Corrupt(format!(
                "chunk size {declared} does not match chunk shape {chunk_shape:?}"
            )));
        }
        Ok(chunk_shape)
    }

    /// Read the chunk table of a chunked element.
    fn chunk_table(&self, chunked: &SpecialChunked) -> Result<Vec<ChunkLayout>> {
        let rank = chunked.dims.len();
        self.opts.limits.check_rank(rank)?;
        let header = self.directory.require(chunked.chunk_table, "chunk table")?;
        let TagPayload::VDataHeader(vh) = &header.payload else {
            return Err(FormatError::Corrupt(format!(
                "{} is not a chunk table",
                chunked.chunk_table
            )));
        };
        if vh.records() > self.opts.limits.max_chunks {
            return Err(FormatError::LimitExceeded(format!(
                "Chunk table with {} chunks exceeds limit {}",
                vh.records(),
                self.opts.limits.max_chunks
            )));
        }

        let field = |name: &str, position: usize| {
            vh.fields
                .iter()
                .find(|f| f.name == name)
                .or_else(|| vh.fields.get(position))
                .ok_or_else(|| FormatError::Corrupt(format!("chunk table lacks {name}")))
        };
        let origin_field = field("origin", 0)?;
        let tag_field = field("chk_tag", 1)?;
        let ref_field = field("chk_ref", 2)?;
        if origin_field.order as usize != rank {
            return Err(FormatError::InconsistentShape(format!(
                "chunk origin has {} values for rank {}",
                origin_field.order, rank
            )));
        }

        let storage = TagKey::new(TAG_VDATA_STORAGE, chunked.chunk_table.reference);
        let table = access::read_element(self.source, &self.element(storage)?, self.opts)?;
        let record_size = vh.record_size as usize;
        let chunk_shape = chunked.chunk_shape();

        let mut chunks = Vec::with_capacity(vh.records());
        for i in 0..vh.records() {
            let start = i * record_size;
            let end = start + record_size;
            if end > table.len() {
                return Err(FormatError::Truncated {
                    offset: start as u64,
                    needed: record_size as u64,
                });
            }
            let record = &table[start..end];
            let mut cursor = Cursor::new(record);
            cursor.skip(origin_field.offset as usize)?;
            let mut origin = Coords::with_capacity(rank);
            for len in &chunk_shape {
                let index = cursor.i32()?.max(0) as usize;
                let start = index.checked_mul(*len).ok_or_else(|| {
                    FormatError::Corrupt(format!("chunk index {index} overflows"))
                })?;
                origin.push(start);
            }
            let mut cursor = Cursor::new(record);
            cursor.skip(tag_field.offset as usize)?;
            let code = cursor.u16()?;
            let mut cursor = Cursor::new(record);
            cursor.skip(ref_field.offset as usize)?;
            let reference = cursor.u16()?;

            let tag = TagKey::new(code, reference);
            let element = self.element(tag)?;
            chunks.push(ChunkLayout {
                origin,
                tag,
                placement: element.placement,
                compression: element.compression,
            });
        }
        chunks.sort_by(|a, b| a.origin.cmp(&b.origin));
        debug!(chunks = chunks.len(), "resolved chunk table");
        Ok(chunks)
    }
}
