//! HDF4 Test Utilities
//!
//! Synthesizes HDF4 images in memory for tests and benches. [`FileBuilder`]
//! lays out a directory and payloads with absolute offsets; [`fixtures`]
//! holds ready-made files used across the workspace.

use hdf4_codec::{deflate, nbit};
use hdf4_format::constants::*;
use hdf4_format::payload::{
    Annotation, GroupMembership, NumberTypeInfo, RasterDimension, SdDimension, VDataField,
    VDataHeader, VGroupInfo, VersionInfo,
};
use hdf4_format::special::ChunkDim;
use hdf4_format::{
    Codec, DirectoryEntry, NBitParams, SpecialChunked, SpecialComp, SpecialLinked, TagKey,
};

pub mod fixtures;

/// How a data element is stored
#[derive(Debug, Clone)]
pub enum Element {
    /// Bytes stored as they are
    Plain(Vec<u8>),
    /// Entry without bytes (negative offset and length)
    Empty,
    /// Linked-block chain
    Linked {
        /// Element bytes
        data: Vec<u8>,
        /// Bytes per block
        block_length: usize,
        /// Block references per link table
        blocks_per_table: u16,
    },
    /// DEFLATE compressed, optionally over a linked chain
    Deflate {
        /// Uncompressed bytes
        data: Vec<u8>,
        /// Compression level
        level: u16,
        /// Store the compressed stream in blocks of this size
        linked_block_length: Option<usize>,
    },
    /// N-bit packed
    NBit {
        /// Unpacked big-endian elements
        data: Vec<u8>,
        /// Field description
        params: NBitParams,
    },
    /// Compressed header naming a codec the reader cannot decode
    Unreadable {
        /// Stored bytes
        data: Vec<u8>,
        /// Declared codec
        codec: Codec,
    },
}

/// One chunk of a chunked element
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Chunk index per dimension (not element offset)
    pub index: Vec<i32>,
    /// Chunk storage, `chunk_size` bytes once decoded
    pub element: Element,
}

/// A Vdata field description
#[derive(Debug, Clone)]
pub struct Field {
    /// Field name
    pub name: String,
    /// `DFNT_*` number type
    pub number_type: u8,
    /// Values per record
    pub order: u16,
}

impl Field {
    /// Create a field
    pub fn new(name: &str, number_type: u8, order: u16) -> Self {
        Self {
            name: name.to_string(),
            number_type,
            order,
        }
    }

    fn size(&self) -> u16 {
        type_size(self.number_type) as u16 * self.order
    }
}

/// Tags making up one scientific dataset
#[derive(Debug, Clone, Copy)]
pub struct Sds {
    /// Numeric data group (720)
    pub group: TagKey,
    /// Number type (106)
    pub number_type: TagKey,
    /// Dimension record (701)
    pub dimension: TagKey,
    /// Data element (702)
    pub data: TagKey,
}

/// Size in bytes of a `DFNT_*` type
pub fn type_size(number_type: u8) -> usize {
    match number_type {
        DFNT_CHAR8 | DFNT_UCHAR8 | DFNT_INT8 | DFNT_UINT8 => 1,
        DFNT_INT16 | DFNT_UINT16 => 2,
        DFNT_INT64 | DFNT_UINT64 | DFNT_FLOAT64 => 8,
        _ => 4,
    }
}

struct Pending {
    code: u16,
    extended: bool,
    reference: u16,
    data: Option<Vec<u8>>,
}

/// Builder for synthetic HDF4 files
pub struct FileBuilder {
    user_block: usize,
    block_capacity: usize,
    cyclic: bool,
    entries: Vec<Pending>,
    next_ref: u16,
}

impl Default for FileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FileBuilder {
    /// Create an empty file builder
    pub fn new() -> Self {
        Self {
            user_block: 0,
            block_capacity: 16,
            cyclic: false,
            entries: Vec::new(),
            next_ref: 1000,
        }
    }

    /// Put `len` zero bytes before the magic number
    pub fn with_user_block(mut self, len: usize) -> Self {
        self.user_block = len;
        self
    }

    /// Directory entries per block
    pub fn with_block_capacity(mut self, capacity: usize) -> Self {
        self.block_capacity = capacity.max(1);
        self
    }

    /// Link the last directory block back to the first
    pub fn with_cyclic_directory(mut self) -> Self {
        self.cyclic = true;
        self
    }

    /// A reference number not used by the named helpers
    pub fn fresh_ref(&mut self) -> u16 {
        self.next_ref += 1;
        self.next_ref
    }

    fn push(&mut self, code: u16, extended: bool, reference: u16, data: Option<Vec<u8>>) -> TagKey {
        self.entries.push(Pending {
            code,
            extended,
            reference,
            data,
        });
        TagKey::new(code, reference)
    }

    /// Add a tag with raw payload bytes
    pub fn raw(&mut self, code: u16, reference: u16, data: Vec<u8>) -> TagKey {
        self.push(code, false, reference, Some(data))
    }

    /// Add a tag with the extended bit and a special header
    pub fn raw_extended(&mut self, code: u16, reference: u16, header: Vec<u8>) -> TagKey {
        self.push(code, true, reference, Some(header))
    }

    /// Add a library version tag
    pub fn version(&mut self, major: u32, minor: u32, release: u32, text: &str) -> TagKey {
        let payload = VersionInfo {
            major,
            minor,
            release,
            text: text.to_string(),
        };
        self.raw(TAG_VERSION, 1, payload.encode())
    }

    /// Add a free-text tag (file id, file description, coordinate system)
    pub fn text(&mut self, code: u16, reference: u16, text: &str) -> TagKey {
        self.raw(code, reference, text.as_bytes().to_vec())
    }

    /// Add a number type tag
    pub fn number_type(&mut self, reference: u16, number_type: u8) -> TagKey {
        let payload = NumberTypeInfo {
            version: 1,
            type_code: number_type,
            bit_width: (type_size(number_type) * 8) as u8,
            class: 1,
        };
        self.raw(TAG_NUMBER_TYPE, reference, payload.encode())
    }

    /// Add a data label (104) or annotation (105)
    pub fn annotation(&mut self, code: u16, reference: u16, target: TagKey, text: &str) -> TagKey {
        let payload = Annotation {
            target,
            text: text.to_string(),
        };
        self.raw(code, reference, payload.encode())
    }

    /// Add a V-group
    pub fn vgroup(&mut self, reference: u16, name: &str, class: &str, members: &[TagKey]) -> TagKey {
        let payload = VGroupInfo {
            members: members.to_vec(),
            name: name.to_string(),
            class_name: class.to_string(),
            extag: 0,
            exref: 0,
            version: 3,
        };
        self.raw(TAG_VGROUP, reference, payload.encode())
    }

    /// Add a Vdata header only
    pub fn vdata_header(
        &mut self,
        reference: u16,
        name: &str,
        class: &str,
        fields: &[Field],
        records: usize,
    ) -> TagKey {
        let mut offset = 0u16;
        let encoded: Vec<VDataField> = fields
            .iter()
            .map(|f| {
                let field = VDataField {
                    number_type: f.number_type as u16,
                    size: f.size(),
                    offset,
                    order: f.order,
                    name: f.name.clone(),
                };
                offset += f.size();
                field
            })
            .collect();
        let payload = VDataHeader {
            interlace: 0,
            record_count: records as i32,
            record_size: offset,
            fields: encoded,
            name: name.to_string(),
            class_name: class.to_string(),
            extag: 0,
            exref: 0,
            version: 3,
        };
        self.raw(TAG_VDATA_HEADER, reference, payload.encode())
    }

    /// Add a Vdata header and its records; returns the header key
    pub fn vdata(
        &mut self,
        reference: u16,
        name: &str,
        class: &str,
        fields: &[Field],
        records: usize,
        data: Vec<u8>,
    ) -> TagKey {
        let key = self.vdata_header(reference, name, class, fields, records);
        self.raw(TAG_VDATA_STORAGE, reference, data);
        key
    }

    /// Add a one-field `Att` Vdata holding `text`
    pub fn text_attribute(&mut self, reference: u16, name: &str, text: &str) -> TagKey {
        let fields = [Field::new("VALUES", DFNT_CHAR8, text.len() as u16)];
        self.vdata(reference, name, CLASS_ATTRIBUTE, &fields, 1, text.as_bytes().to_vec())
    }

    /// Add a numeric data group with its number type, dimension record and
    /// data, all under `reference`; `extra` members (labels, units, ...) are
    /// appended to the group
    pub fn sds(
        &mut self,
        reference: u16,
        number_type: u8,
        shape: &[i32],
        data: Element,
        extra: &[TagKey],
    ) -> Sds {
        let nt = self.number_type(reference, number_type);
        let sdd = SdDimension {
            rank: shape.len() as u16,
            shape: shape.to_vec(),
            number_type: nt,
            scale_types: vec![nt; shape.len()],
        };
        let dimension = self.raw(TAG_SD_DIMENSION, reference, sdd.encode());
        let data = self.element(TAG_SD_DATA, reference, data);
        let group = self.raw(
            TAG_NUMERIC_GROUP,
            reference,
            GroupMembership {
                members: [nt, dimension, data]
                    .into_iter()
                    .chain(extra.iter().copied())
                    .collect(),
            }
            .encode(),
        );
        Sds {
            group,
            number_type: nt,
            dimension,
            data,
        }
    }

    /// Add a raster image group with dimension and data; returns the group key
    pub fn raster_image(
        &mut self,
        reference: u16,
        number_type: u8,
        size: (i32, i32),
        components: i16,
        data: Vec<u8>,
        palette: Option<Vec<u8>>,
    ) -> TagKey {
        let nt = self.number_type(reference, number_type);
        let dim = RasterDimension {
            x: size.0,
            y: size.1,
            number_type: nt,
            components,
            interlace: 0,
            compression: TagKey::new(0, 0),
        };
        let mut members = vec![self.raw(TAG_IMAGE_DIM, reference, dim.encode())];
        members.push(self.raw(TAG_RASTER_IMAGE, reference, data));
        if let Some(palette) = palette {
            members.push(self.raw(TAG_PALETTE, reference, palette));
        }
        self.raw(
            TAG_RASTER_GROUP,
            reference,
            GroupMembership { members }.encode(),
        )
    }

    /// Add a data element under `code`/`reference` stored as `element`
    pub fn element(&mut self, code: u16, reference: u16, element: Element) -> TagKey {
        match element {
            Element::Plain(data) => self.raw(code, reference, data),
            Element::Empty => self.push(code, false, reference, None),
            Element::Linked {
                data,
                block_length,
                blocks_per_table,
            } => {
                let header = self.linked_chain(&data, block_length, blocks_per_table);
                self.raw_extended(code, reference, header.encode())
            }
            Element::Deflate {
                data,
                level,
                linked_block_length,
            } => {
                let stream = deflate::deflate(&data, level as u32).expect("deflate fixture data");
                self.compressed(
                    code,
                    reference,
                    data.len(),
                    Codec::Deflate { level },
                    stream,
                    linked_block_length,
                )
            }
            Element::NBit { data, params } => {
                let packed = nbit::pack(&data, &params).expect("n-bit fixture data");
                self.compressed(code, reference, data.len(), Codec::NBit(params), packed, None)
            }
            Element::Unreadable { data, codec } => {
                self.compressed(code, reference, data.len(), codec, data, None)
            }
        }
    }

    fn compressed(
        &mut self,
        code: u16,
        reference: u16,
        uncompressed_length: usize,
        codec: Codec,
        stored: Vec<u8>,
        linked_block_length: Option<usize>,
    ) -> TagKey {
        let data_ref = self.fresh_ref();
        match linked_block_length {
            Some(block_length) => {
                let header = self.linked_chain(&stored, block_length, 4);
                self.raw_extended(TAG_COMPRESSED, data_ref, header.encode());
            }
            None => {
                self.raw(TAG_COMPRESSED, data_ref, stored);
            }
        }
        let header = SpecialComp {
            version: 0,
            uncompressed_length: uncompressed_length as i32,
            data_ref,
            model_type: 0,
            codec,
        };
        self.raw_extended(code, reference, header.encode())
    }

    /// Write blocks and link tables for `data`; returns the header that
    /// points at them.
    fn linked_chain(&mut self, data: &[u8], block_length: usize, per_table: u16) -> SpecialLinked {
        let block_length = block_length.max(1);
        let per_table = per_table.max(1);
        let blocks: Vec<&[u8]> = data.chunks(block_length).collect();
        let table_count = blocks.len().div_ceil(per_table as usize).max(1);
        let table_refs: Vec<u16> = (0..table_count).map(|_| self.fresh_ref()).collect();

        let mut block_refs = Vec::with_capacity(blocks.len());
        for block in &blocks {
            let reference = self.fresh_ref();
            self.raw(TAG_LINKED, reference, block.to_vec());
            block_refs.push(reference);
        }
        for (i, &table_ref) in table_refs.iter().enumerate() {
            let next = table_refs.get(i + 1).copied().unwrap_or(0);
            let mut table = next.to_be_bytes().to_vec();
            for slot in 0..per_table as usize {
                let reference = block_refs
                    .get(i * per_table as usize + slot)
                    .copied()
                    .unwrap_or(0);
                table.extend_from_slice(&reference.to_be_bytes());
            }
            self.raw(TAG_LINKED, table_ref, table);
        }

        SpecialLinked {
            length: data.len() as i32,
            first_length: block_length as i32,
            block_length: block_length as u16,
            block_count: per_table,
            link_ref: table_refs[0],
        }
    }

    /// Add a chunked element with its chunk table
    #[allow(clippy::too_many_arguments)]
    pub fn chunked(
        &mut self,
        code: u16,
        reference: u16,
        number_type: u8,
        shape: &[i32],
        chunk_shape: &[i32],
        fill_value: Vec<u8>,
        chunks: Vec<Chunk>,
    ) -> TagKey {
        let rank = shape.len();
        let size = type_size(number_type);
        // zero when the chunk byte count does not fit an i32
        let chunk_size = chunk_shape
            .iter()
            .try_fold(size as i32, |acc, &len| acc.checked_mul(len))
            .unwrap_or(0);

        let table_ref = self.fresh_ref();
        let mut records = Vec::new();
        for chunk in &chunks {
            let chunk_ref = self.fresh_ref();
            self.element(TAG_CHUNK, chunk_ref, chunk.element.clone());
            for index in &chunk.index {
                records.extend_from_slice(&index.to_be_bytes());
            }
            records.extend_from_slice(&TAG_CHUNK.to_be_bytes());
            records.extend_from_slice(&chunk_ref.to_be_bytes());
        }
        let fields = [
            Field::new("origin", DFNT_INT32, rank as u16),
            Field::new("chk_tag", DFNT_UINT16, 1),
            Field::new("chk_ref", DFNT_UINT16, 1),
        ];
        let table = self.vdata(
            table_ref,
            "_HDF_CHK_TBL_",
            &format!("{CLASS_CHUNK_TABLE}_0"),
            &fields,
            chunks.len(),
            records,
        );

        let header = SpecialChunked {
            header_length: 0,
            version: 1,
            flag: 0,
            element_total_length: shape.iter().product::<i32>() * size as i32,
            chunk_size,
            number_type_size: size as i32,
            chunk_table: table,
            dims: shape
                .iter()
                .zip(chunk_shape)
                .map(|(&length, &chunk_length)| ChunkDim {
                    flag: 0,
                    length,
                    chunk_length,
                })
                .collect(),
            fill_value,
            nested_code: None,
            nested_header: Vec::new(),
        };
        self.raw_extended(code, reference, header.encode())
    }

    /// Lay out the file
    pub fn build(&self) -> Vec<u8> {
        let capacity = self.block_capacity;
        let block_sizes: Vec<usize> = if self.entries.is_empty() {
            vec![0]
        } else {
            self.entries.chunks(capacity).map(|c| c.len()).collect()
        };
        let dir_start = self.user_block + FILE_MAGIC.len();
        let mut block_offsets = Vec::with_capacity(block_sizes.len());
        let mut offset = dir_start;
        for &count in &block_sizes {
            block_offsets.push(offset);
            offset += DDH_HEADER_SIZE + count * DD_ENTRY_SIZE;
        }
        let payload_start = offset;

        let mut payloads = Vec::new();
        let mut encoded = Vec::with_capacity(self.entries.len());
        for pending in &self.entries {
            let (offset, length) = match &pending.data {
                Some(data) => {
                    let at = (payload_start + payloads.len()) as i32;
                    payloads.extend_from_slice(data);
                    (at, data.len() as i32)
                }
                None => (-1, -1),
            };
            encoded.push(
                DirectoryEntry {
                    code: pending.code,
                    extended: pending.extended,
                    reference: pending.reference,
                    offset,
                    length,
                }
                .encode(),
            );
        }

        let mut out = vec![0u8; self.user_block];
        out.extend_from_slice(&FILE_MAGIC);
        let mut entries = encoded.iter();
        for (i, &count) in block_sizes.iter().enumerate() {
            let next = match block_offsets.get(i + 1) {
                Some(&next) => next as u32,
                None if self.cyclic => block_offsets[0] as u32,
                None => 0,
            };
            out.extend_from_slice(&(count as u16).to_be_bytes());
            out.extend_from_slice(&next.to_be_bytes());
            for entry in entries.by_ref().take(count) {
                out.extend_from_slice(entry);
            }
        }
        out.extend_from_slice(&payloads);
        out
    }
}

/// Big-endian bytes of `i16` values
pub fn int16_bytes(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

/// Big-endian bytes of `i32` values
pub fn int32_bytes(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

/// Big-endian bytes of `f32` values
pub fn float32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}
