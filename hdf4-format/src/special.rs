//! Special data element headers: linked, compressed and chunked storage

use crate::constants::*;
use crate::cursor::Cursor;
use crate::error::{FormatError, Result};
use crate::tag::TagKey;
use crate::{Codec, NBitParams};
use serde::Serialize;

/// Header found at the offset of an extended data tag
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Special {
    /// Chain of fixed-size linked blocks
    Linked(SpecialLinked),
    /// Compressed wrapper around another data tag
    Compressed(SpecialComp),
    /// Chunked storage with a chunk table
    Chunked(SpecialChunked),
    /// Special code that this decoder does not interpret
    Unsupported(u16),
}

impl Special {
    /// Decode a special header; `base` is its file offset.
    pub fn decode(bytes: &[u8], base: u64) -> Result<Self> {
        let mut cursor = Cursor::with_base(bytes, base);
        let code = cursor.u16()?;
        Ok(match code {
            SPECIAL_LINKED => Special::Linked(SpecialLinked::decode_body(&mut cursor)?),
            SPECIAL_COMP => Special::Compressed(SpecialComp::decode_body(&mut cursor)?),
            SPECIAL_CHUNKED => Special::Chunked(SpecialChunked::decode_body(&mut cursor)?),
            other => Special::Unsupported(other),
        })
    }

    /// Encode the header including its leading special code.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Special::Linked(linked) => linked.encode(),
            Special::Compressed(comp) => comp.encode(),
            Special::Chunked(chunked) => chunked.encode(),
            Special::Unsupported(code) => code.to_be_bytes().to_vec(),
        }
    }
}

/// Linked-block storage header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecialLinked {
    /// Total element length
    pub length: i32,
    /// Length of the first block
    pub first_length: i32,
    /// Length of the following blocks
    pub block_length: u16,
    /// Number of block references per link table
    pub block_count: u16,
    /// Reference of the first link table (code 20)
    pub link_ref: u16,
}

impl SpecialLinked {
    fn decode_body(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            length: cursor.i32()?,
            first_length: cursor.i32()?,
            block_length: cursor.u16()?,
            block_count: cursor.u16()?,
            link_ref: cursor.u16()?,
        })
    }

    /// Encode including the leading special code.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        out.extend_from_slice(&SPECIAL_LINKED.to_be_bytes());
        out.extend_from_slice(&self.length.to_be_bytes());
        out.extend_from_slice(&self.first_length.to_be_bytes());
        out.extend_from_slice(&self.block_length.to_be_bytes());
        out.extend_from_slice(&self.block_count.to_be_bytes());
        out.extend_from_slice(&self.link_ref.to_be_bytes());
        out
    }

    /// Key of the first link table.
    pub fn link_table(&self) -> TagKey {
        TagKey::new(TAG_LINKED, self.link_ref)
    }
}

/// Compressed storage header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecialComp {
    /// Header version
    pub version: u16,
    /// Length of the data once decompressed
    pub uncompressed_length: i32,
    /// Reference of the compressed data tag (code 40)
    pub data_ref: u16,
    /// Modelling scheme
    pub model_type: u16,
    /// Compression scheme and its parameters
    pub codec: Codec,
}

impl SpecialComp {
    fn decode_body(cursor: &mut Cursor<'_>) -> Result<Self> {
        let version = cursor.u16()?;
        let uncompressed_length = cursor.i32()?;
        let data_ref = cursor.u16()?;
        let model_type = cursor.u16()?;
        let code = cursor.u16()?;
        let codec = match code {
            COMP_CODE_NONE => Codec::None,
            COMP_CODE_RLE => Codec::Rle,
            COMP_CODE_NBIT => Codec::NBit(NBitParams {
                number_type: cursor.i32()?,
                sign_extend: cursor.u16()? != 0,
                fill_one: cursor.u16()? != 0,
                start_bit: cursor.i32()?,
                bit_length: cursor.i32()?,
            }),
            COMP_CODE_SKPHUFF => Codec::SkipHuffman {
                skip_size: cursor.i32()?,
            },
            COMP_CODE_DEFLATE => Codec::Deflate {
                level: cursor.u16()?,
            },
            COMP_CODE_SZIP => Codec::Szip,
            other => Codec::Unknown(other),
        };
        Ok(Self {
            version,
            uncompressed_length,
            data_ref,
            model_type,
            codec,
        })
    }

    /// Encode including the leading special code.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        out.extend_from_slice(&SPECIAL_COMP.to_be_bytes());
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&self.uncompressed_length.to_be_bytes());
        out.extend_from_slice(&self.data_ref.to_be_bytes());
        out.extend_from_slice(&self.model_type.to_be_bytes());
        out.extend_from_slice(&self.codec.code().to_be_bytes());
        match self.codec {
            Codec::NBit(params) => {
                out.extend_from_slice(&params.number_type.to_be_bytes());
                out.extend_from_slice(&(params.sign_extend as u16).to_be_bytes());
                out.extend_from_slice(&(params.fill_one as u16).to_be_bytes());
                out.extend_from_slice(&params.start_bit.to_be_bytes());
                out.extend_from_slice(&params.bit_length.to_be_bytes());
            }
            Codec::SkipHuffman { skip_size } => out.extend_from_slice(&skip_size.to_be_bytes()),
            Codec::Deflate { level } => out.extend_from_slice(&level.to_be_bytes()),
            _ => {}
        }
        out
    }

    /// Key of the compressed data tag.
    pub fn data_tag(&self) -> TagKey {
        TagKey::new(TAG_COMPRESSED, self.data_ref)
    }
}

/// Per-dimension entry of a chunked header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkDim {
    /// Distribution flag
    pub flag: u32,
    /// Dimension length
    pub length: i32,
    /// Chunk length along this dimension
    pub chunk_length: i32,
}

/// Chunked storage header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecialChunked {
    /// Length of the header that follows
    pub header_length: i32,
    /// Header version
    pub version: u8,
    /// Flags; bit 0 marks chunks that carry their own special header
    pub flag: u32,
    /// Total element length
    pub element_total_length: i32,
    /// Bytes per chunk
    pub chunk_size: i32,
    /// Bytes per element
    pub number_type_size: i32,
    /// Key of the chunk table Vdata header
    pub chunk_table: TagKey,
    /// Per-dimension sizes
    pub dims: Vec<ChunkDim>,
    /// Fill value bytes, big-endian
    pub fill_value: Vec<u8>,
    /// Nested special code applied to each chunk, when present
    pub nested_code: Option<u16>,
    /// Nested special header bytes
    pub nested_header: Vec<u8>,
}

impl SpecialChunked {
    fn decode_body(cursor: &mut Cursor<'_>) -> Result<Self> {
        let header_length = cursor.i32()?;
        let version = cursor.u8()?;
        let flag = cursor.u32()?;
        let element_total_length = cursor.i32()?;
        let chunk_size = cursor.i32()?;
        let number_type_size = cursor.i32()?;
        let table_code = cursor.u16()?;
        let table_ref = cursor.u16()?;
        // tag/ref of a special-element descriptor, unused by readers
        cursor.skip(4)?;
        let ndims = cursor.i32()?;
        if ndims < 0 {
            return Err(FormatError::Corrupt(format!(
                "chunked header with negative rank {ndims}"
            )));
        }
        let ndims = ndims as usize;
        if ndims.saturating_mul(12) > cursor.remaining() {
            return Err(FormatError::Corrupt(format!(
                "chunked header rank {ndims} overruns header"
            )));
        }
        let mut dims = Vec::with_capacity(ndims);
        for _ in 0..ndims {
            dims.push(ChunkDim {
                flag: cursor.u32()?,
                length: cursor.i32()?,
                chunk_length: cursor.i32()?,
            });
        }
        let fill_len = cursor.i32()?.max(0) as usize;
        let fill_value = cursor.take(fill_len)?.to_vec();

        let (nested_code, nested_header) = if cursor.remaining() >= 6 {
            let code = cursor.u16()?;
            let len = cursor.i32()?.max(0) as usize;
            let header = cursor.take(len.min(cursor.remaining()))?.to_vec();
            (Some(code), header)
        } else {
            (None, Vec::new())
        };

        Ok(Self {
            header_length,
            version,
            flag,
            element_total_length,
            chunk_size,
            number_type_size,
            chunk_table: TagKey::new(table_code, table_ref),
            dims,
            fill_value,
            nested_code,
            nested_header,
        })
    }

    /// Encode including the leading special code.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&SPECIAL_CHUNKED.to_be_bytes());
        out.extend_from_slice(&self.header_length.to_be_bytes());
        out.push(self.version);
        out.extend_from_slice(&self.flag.to_be_bytes());
        out.extend_from_slice(&self.element_total_length.to_be_bytes());
        out.extend_from_slice(&self.chunk_size.to_be_bytes());
        out.extend_from_slice(&self.number_type_size.to_be_bytes());
        out.extend_from_slice(&self.chunk_table.code.to_be_bytes());
        out.extend_from_slice(&self.chunk_table.reference.to_be_bytes());
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&(self.dims.len() as i32).to_be_bytes());
        for dim in &self.dims {
            out.extend_from_slice(&dim.flag.to_be_bytes());
            out.extend_from_slice(&dim.length.to_be_bytes());
            out.extend_from_slice(&dim.chunk_length.to_be_bytes());
        }
        out.extend_from_slice(&(self.fill_value.len() as i32).to_be_bytes());
        out.extend_from_slice(&self.fill_value);
        if let Some(code) = self.nested_code {
            out.extend_from_slice(&code.to_be_bytes());
            out.extend_from_slice(&(self.nested_header.len() as i32).to_be_bytes());
            out.extend_from_slice(&self.nested_header);
        }
        out
    }

    /// Chunk length per dimension.
    pub fn chunk_shape(&self) -> Vec<usize> {
        self.dims
            .iter()
            .map(|d| d.chunk_length.max(0) as usize)
            .collect()
    }

    /// Dimension lengths.
    pub fn shape(&self) -> Vec<usize> {
        self.dims.iter().map(|d| d.length.max(0) as usize).collect()
    }
}
