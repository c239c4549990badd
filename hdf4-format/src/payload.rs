//! Decoded tag payloads
//!
//! Every directory entry gets exactly one [`TagPayload`], produced by a flat
//! match on the tag code. Cross references stay as [`TagKey`]s; nothing here
//! looks at other tags.

use crate::constants::*;
use crate::cursor::{bytes_to_string, Cursor};
use crate::error::Result;
use crate::special::Special;
use crate::tag::{DirectoryEntry, TagKey};
use crate::types::DataType;
use crate::value::Values;
use serde::Serialize;

/// Payload of one tag, by code
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum TagPayload {
    /// Non-data tag without bytes (negative offset or non-positive length)
    Empty,
    /// Library version (30)
    Version(VersionInfo),
    /// File id, file description or coordinate system text (100, 101, 708)
    FreeText {
        /// Decoded text
        text: String,
    },
    /// Data label or annotation (104, 105)
    Annotation(Annotation),
    /// Number type descriptor (106)
    NumberType(NumberTypeInfo),
    /// Raster image group or numeric data group (306, 720)
    Group(GroupMembership),
    /// V-group (1965)
    VGroup(VGroupInfo),
    /// Vdata header (1962)
    VDataHeader(VDataHeader),
    /// Image, palette or matte dimension (300, 307, 308)
    RasterDimension(RasterDimension),
    /// Scientific data dimension record (701)
    SdDimension(SdDimension),
    /// Data element (20, 40, 61, 302, 702, 1963)
    DataBlock(DataBlock),
    /// NUL separated strings (704, 705, 706)
    TextArray(TextArray),
    /// Maximum then minimum value (707)
    MinMax(MinMax),
    /// Tag the decoder does not interpret
    Opaque,
}

/// Whether `code` names a data element.
pub fn is_data_code(code: u16) -> bool {
    matches!(
        code,
        TAG_LINKED
            | TAG_COMPRESSED
            | TAG_CHUNK
            | TAG_RASTER_IMAGE
            | TAG_SD_DATA
            | TAG_VDATA_STORAGE
    )
}

/// Whether the decoder interprets `code` at all.
pub fn is_known_code(code: u16) -> bool {
    is_data_code(code)
        || matches!(
            code,
            TAG_VERSION
                | TAG_FILE_ID
                | TAG_FILE_DESC
                | TAG_DATA_LABEL
                | TAG_DATA_ANNOTATION
                | TAG_NUMBER_TYPE
                | TAG_IMAGE_DIM
                | TAG_RASTER_GROUP
                | TAG_LUT_DIM
                | TAG_MATTE_DIM
                | TAG_SD_DIMENSION
                | TAG_SD_LABELS
                | TAG_SD_UNITS
                | TAG_SD_FORMATS
                | TAG_SD_MAXMIN
                | TAG_SD_COORDSYS
                | TAG_NUMERIC_GROUP
                | TAG_VDATA_HEADER
                | TAG_VGROUP
        )
}

impl TagPayload {
    /// Whether the payload of `entry` has to be read from the file.
    ///
    /// Plain data elements are located later by the layout resolver, and
    /// unknown codes are never read.
    pub fn needs_bytes(entry: &DirectoryEntry) -> bool {
        if !is_known_code(entry.code) || entry.offset < 0 || entry.length <= 0 {
            return false;
        }
        !is_data_code(entry.code) || entry.extended
    }

    /// Payload for an entry whose bytes were not read.
    pub fn without_bytes(entry: &DirectoryEntry) -> Self {
        if is_data_code(entry.code) {
            TagPayload::DataBlock(DataBlock { special: None })
        } else if is_known_code(entry.code) {
            TagPayload::Empty
        } else {
            TagPayload::Opaque
        }
    }

    /// Decode the `bytes` stored at `entry.offset`.
    pub fn decode(entry: &DirectoryEntry, bytes: &[u8]) -> Result<Self> {
        if !Self::needs_bytes(entry) {
            return Ok(Self::without_bytes(entry));
        }
        let base = entry.offset as u64;
        let mut cursor = Cursor::with_base(bytes, base);
        let payload = match entry.code {
            TAG_VERSION => TagPayload::Version(VersionInfo::decode(&mut cursor)?),
            TAG_FILE_ID | TAG_FILE_DESC | TAG_SD_COORDSYS => TagPayload::FreeText {
                text: cursor.rest_string(),
            },
            TAG_DATA_LABEL | TAG_DATA_ANNOTATION => {
                TagPayload::Annotation(Annotation::decode(&mut cursor)?)
            }
            TAG_NUMBER_TYPE => TagPayload::NumberType(NumberTypeInfo::decode(&mut cursor)?),
            TAG_RASTER_GROUP | TAG_NUMERIC_GROUP => {
                TagPayload::Group(GroupMembership::decode(&mut cursor)?)
            }
            TAG_VGROUP => TagPayload::VGroup(VGroupInfo::decode(&mut cursor)?),
            TAG_VDATA_HEADER => TagPayload::VDataHeader(VDataHeader::decode(&mut cursor)?),
            TAG_IMAGE_DIM | TAG_LUT_DIM | TAG_MATTE_DIM => {
                TagPayload::RasterDimension(RasterDimension::decode(&mut cursor)?)
            }
            TAG_SD_DIMENSION => TagPayload::SdDimension(SdDimension::decode(&mut cursor)?),
            TAG_SD_LABELS | TAG_SD_UNITS | TAG_SD_FORMATS => {
                TagPayload::TextArray(TextArray { raw: bytes.to_vec() })
            }
            TAG_SD_MAXMIN => TagPayload::MinMax(MinMax { raw: bytes.to_vec() }),
            code if is_data_code(code) => TagPayload::DataBlock(DataBlock {
                special: Some(Special::decode(bytes, base)?),
            }),
            _ => TagPayload::Opaque,
        };
        Ok(payload)
    }

    /// Short variant name for listings.
    pub fn kind(&self) -> &'static str {
        match self {
            TagPayload::Empty => "empty",
            TagPayload::Version(_) => "version",
            TagPayload::FreeText { .. } => "text",
            TagPayload::Annotation(_) => "annotation",
            TagPayload::NumberType(_) => "number-type",
            TagPayload::Group(_) => "group",
            TagPayload::VGroup(_) => "vgroup",
            TagPayload::VDataHeader(_) => "vdata-header",
            TagPayload::RasterDimension(_) => "raster-dimension",
            TagPayload::SdDimension(_) => "sd-dimension",
            TagPayload::DataBlock(_) => "data",
            TagPayload::TextArray(_) => "text-array",
            TagPayload::MinMax(_) => "min-max",
            TagPayload::Opaque => "opaque",
        }
    }
}

fn encode_short_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// Library version record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Release number
    pub release: u32,
    /// Free-form version string
    pub text: String,
}

impl VersionInfo {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            major: cursor.u32()?,
            minor: cursor.u32()?,
            release: cursor.u32()?,
            text: cursor.rest_string(),
        })
    }

    /// Encode to wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + self.text.len());
        out.extend_from_slice(&self.major.to_be_bytes());
        out.extend_from_slice(&self.minor.to_be_bytes());
        out.extend_from_slice(&self.release.to_be_bytes());
        out.extend_from_slice(self.text.as_bytes());
        out
    }

    /// `major.minor.release (text)`
    pub fn display(&self) -> String {
        format!(
            "{}.{}.{} ({})",
            self.major,
            self.minor,
            self.release,
            self.text.trim()
        )
    }
}

/// Label or description attached to another tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    /// Annotated object
    pub target: TagKey,
    /// Annotation text
    pub text: String,
}

impl Annotation {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let code = cursor.u16()?;
        let reference = cursor.u16()?;
        Ok(Self {
            target: TagKey::new(code, reference),
            text: cursor.rest_string(),
        })
    }

    /// Encode to wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.text.len());
        out.extend_from_slice(&self.target.code.to_be_bytes());
        out.extend_from_slice(&self.target.reference.to_be_bytes());
        out.extend_from_slice(self.text.as_bytes());
        out
    }
}

/// Number type descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NumberTypeInfo {
    /// Descriptor version
    pub version: u8,
    /// `DFNT_*` type code
    pub type_code: u8,
    /// Bits per element
    pub bit_width: u8,
    /// Byte-order class
    pub class: u8,
}

impl NumberTypeInfo {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            version: cursor.u8()?,
            type_code: cursor.u8()?,
            bit_width: cursor.u8()?,
            class: cursor.u8()?,
        })
    }

    /// Encode to wire form.
    pub fn encode(&self) -> Vec<u8> {
        vec![self.version, self.type_code, self.bit_width, self.class]
    }

    /// Element type described by this record.
    pub fn data_type(&self) -> Result<DataType> {
        DataType::from_number_type(self.type_code)
    }
}

/// Members of a raster image group or numeric data group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupMembership {
    /// Member tags in stored order
    pub members: Vec<TagKey>,
}

impl GroupMembership {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let count = cursor.remaining() / 4;
        let mut members = Vec::with_capacity(count);
        for _ in 0..count {
            let code = cursor.u16()?;
            let reference = cursor.u16()?;
            members.push(TagKey::new(code, reference));
        }
        Ok(Self { members })
    }

    /// Encode to wire form.
    pub fn encode(&self) -> Vec<u8> {
        self.members
            .iter()
            .flat_map(|k| {
                let mut pair = [0u8; 4];
                pair[..2].copy_from_slice(&k.code.to_be_bytes());
                pair[2..].copy_from_slice(&k.reference.to_be_bytes());
                pair
            })
            .collect()
    }

    /// First member with `code`.
    pub fn find(&self, code: u16) -> Option<TagKey> {
        self.members.iter().copied().find(|k| k.code == code)
    }
}

/// V-group: a named, classed list of member tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VGroupInfo {
    /// Member tags in stored order
    pub members: Vec<TagKey>,
    /// Group name
    pub name: String,
    /// Group class
    pub class_name: String,
    /// Extension tag
    pub extag: u16,
    /// Extension reference
    pub exref: u16,
    /// Record version
    pub version: u16,
}

impl VGroupInfo {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let count = cursor.u16()? as usize;
        let mut codes = Vec::with_capacity(count);
        for _ in 0..count {
            codes.push(cursor.u16()?);
        }
        let mut members = Vec::with_capacity(count);
        for code in codes {
            members.push(TagKey::new(code, cursor.u16()?));
        }
        let name = cursor.short_string()?;
        let class_name = cursor.short_string()?;
        let (extag, exref, version) = decode_trailer(cursor)?;
        Ok(Self {
            members,
            name,
            class_name,
            extag,
            exref,
            version,
        })
    }

    /// Encode to wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.members.len() as u16).to_be_bytes());
        for key in &self.members {
            out.extend_from_slice(&key.code.to_be_bytes());
        }
        for key in &self.members {
            out.extend_from_slice(&key.reference.to_be_bytes());
        }
        encode_short_string(&mut out, &self.name);
        encode_short_string(&mut out, &self.class_name);
        out.extend_from_slice(&self.extag.to_be_bytes());
        out.extend_from_slice(&self.exref.to_be_bytes());
        out.extend_from_slice(&self.version.to_be_bytes());
        out
    }

    /// Whether the class starts with `prefix`.
    pub fn has_class(&self, prefix: &str) -> bool {
        self.class_name.starts_with(prefix)
    }
}

// Old writers stop after the class name.
fn decode_trailer(cursor: &mut Cursor<'_>) -> Result<(u16, u16, u16)> {
    let mut next = || -> Result<u16> {
        if cursor.remaining() >= 2 {
            cursor.u16()
        } else {
            Ok(0)
        }
    };
    Ok((next()?, next()?, next()?))
}

fn read_column(cursor: &mut Cursor<'_>, n: usize) -> Result<Vec<u16>> {
    (0..n).map(|_| cursor.u16()).collect()
}

/// One field of a Vdata record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VDataField {
    /// `DFNT_*` number type
    pub number_type: u16,
    /// Bytes per field (type size × order)
    pub size: u16,
    /// Byte offset within the record
    pub offset: u16,
    /// Number of values per record
    pub order: u16,
    /// Field name
    pub name: String,
}

impl VDataField {
    /// Element type of this field.
    pub fn data_type(&self) -> Result<DataType> {
        DataType::from_field_type(self.number_type)
    }
}

/// Vdata header describing the records in the matching `VS` tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VDataHeader {
    /// Interlace mode; zero is full interlace
    pub interlace: i16,
    /// Number of records
    pub record_count: i32,
    /// Bytes per record
    pub record_size: u16,
    /// Record fields
    pub fields: Vec<VDataField>,
    /// Vdata name
    pub name: String,
    /// Vdata class
    pub class_name: String,
    /// Extension tag
    pub extag: u16,
    /// Extension reference
    pub exref: u16,
    /// Record version
    pub version: u16,
}

impl VDataHeader {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let interlace = cursor.i16()?;
        let record_count = cursor.i32()?;
        let record_size = cursor.u16()?;
        let nfields = cursor.u16()? as usize;

        let types = read_column(cursor, nfields)?;
        let sizes = read_column(cursor, nfields)?;
        let offsets = read_column(cursor, nfields)?;
        let orders = read_column(cursor, nfields)?;

        let mut fields = Vec::with_capacity(nfields);
        for i in 0..nfields {
            fields.push(VDataField {
                number_type: types[i],
                size: sizes[i],
                offset: offsets[i],
                order: orders[i],
                name: cursor.short_string()?,
            });
        }
        let name = cursor.short_string()?;
        let class_name = cursor.short_string()?;
        let (extag, exref, version) = decode_trailer(cursor)?;
        Ok(Self {
            interlace,
            record_count,
            record_size,
            fields,
            name,
            class_name,
            extag,
            exref,
            version,
        })
    }

    /// Encode to wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.interlace.to_be_bytes());
        out.extend_from_slice(&self.record_count.to_be_bytes());
        out.extend_from_slice(&self.record_size.to_be_bytes());
        out.extend_from_slice(&(self.fields.len() as u16).to_be_bytes());
        for f in &self.fields {
            out.extend_from_slice(&f.number_type.to_be_bytes());
        }
        for f in &self.fields {
            out.extend_from_slice(&f.size.to_be_bytes());
        }
        for f in &self.fields {
            out.extend_from_slice(&f.offset.to_be_bytes());
        }
        for f in &self.fields {
            out.extend_from_slice(&f.order.to_be_bytes());
        }
        for f in &self.fields {
            encode_short_string(&mut out, &f.name);
        }
        encode_short_string(&mut out, &self.name);
        encode_short_string(&mut out, &self.class_name);
        out.extend_from_slice(&self.extag.to_be_bytes());
        out.extend_from_slice(&self.exref.to_be_bytes());
        out.extend_from_slice(&self.version.to_be_bytes());
        out
    }

    /// Whether the class starts with `prefix`.
    pub fn has_class(&self, prefix: &str) -> bool {
        self.class_name.starts_with(prefix)
    }

    /// Number of records, clamped at zero.
    pub fn records(&self) -> usize {
        self.record_count.max(0) as usize
    }
}

/// Image, palette or matte dimension record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RasterDimension {
    /// Columns
    pub x: i32,
    /// Rows
    pub y: i32,
    /// Number type tag of one component
    pub number_type: TagKey,
    /// Components per pixel
    pub components: i16,
    /// Pixel interlace scheme
    pub interlace: i16,
    /// Compression descriptor tag
    pub compression: TagKey,
}

impl RasterDimension {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let x = cursor.i32()?;
        let y = cursor.i32()?;
        let nt_code = cursor.u16()?;
        let nt_ref = cursor.u16()?;
        let components = cursor.i16()?;
        let interlace = cursor.i16()?;
        let comp_code = cursor.u16()?;
        let comp_ref = cursor.u16()?;
        Ok(Self {
            x,
            y,
            number_type: TagKey::new(nt_code, nt_ref),
            components,
            interlace,
            compression: TagKey::new(comp_code, comp_ref),
        })
    }

    /// Encode to wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(20);
        out.extend_from_slice(&self.x.to_be_bytes());
        out.extend_from_slice(&self.y.to_be_bytes());
        out.extend_from_slice(&self.number_type.code.to_be_bytes());
        out.extend_from_slice(&self.number_type.reference.to_be_bytes());
        out.extend_from_slice(&self.components.to_be_bytes());
        out.extend_from_slice(&self.interlace.to_be_bytes());
        out.extend_from_slice(&self.compression.code.to_be_bytes());
        out.extend_from_slice(&self.compression.reference.to_be_bytes());
        out
    }
}

/// Scientific data dimension record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SdDimension {
    /// Number of dimensions
    pub rank: u16,
    /// Length of each dimension
    pub shape: Vec<i32>,
    /// Number type tag of the data
    pub number_type: TagKey,
    /// Number type tag of each dimension scale
    pub scale_types: Vec<TagKey>,
}

impl SdDimension {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let rank = cursor.u16()?;
        let shape = (0..rank).map(|_| cursor.i32()).collect::<Result<Vec<_>>>()?;
        let nt_code = cursor.u16()?;
        let nt_ref = cursor.u16()?;
        let mut scale_types = Vec::with_capacity(rank as usize);
        for _ in 0..rank {
            let code = cursor.u16()?;
            let reference = cursor.u16()?;
            scale_types.push(TagKey::new(code, reference));
        }
        Ok(Self {
            rank,
            shape,
            number_type: TagKey::new(nt_code, nt_ref),
            scale_types,
        })
    }

    /// Encode to wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.rank.to_be_bytes());
        for len in &self.shape {
            out.extend_from_slice(&len.to_be_bytes());
        }
        out.extend_from_slice(&self.number_type.code.to_be_bytes());
        out.extend_from_slice(&self.number_type.reference.to_be_bytes());
        for key in &self.scale_types {
            out.extend_from_slice(&key.code.to_be_bytes());
            out.extend_from_slice(&key.reference.to_be_bytes());
        }
        out
    }

    /// Dimension lengths, clamped at zero.
    pub fn lengths(&self) -> Vec<usize> {
        self.shape.iter().map(|&n| n.max(0) as usize).collect()
    }
}

/// Data element; only extended elements carry a decoded header
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataBlock {
    /// Special header when the extended bit is set
    pub special: Option<Special>,
}

/// NUL separated strings, one per dimension plus one for the data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextArray {
    /// Raw payload
    pub raw: Vec<u8>,
}

impl TextArray {
    /// Split into `n` strings; missing trailing strings are empty.
    pub fn strings(&self, n: usize) -> Vec<String> {
        let mut parts = self.raw.split(|&b| b == 0).map(bytes_to_string);
        (0..n).map(|_| parts.next().unwrap_or_default()).collect()
    }

    /// First string, the one describing the data itself.
    pub fn first(&self) -> String {
        self.strings(1).pop().unwrap_or_default()
    }
}

/// Maximum and minimum values stored back to back
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MinMax {
    /// Raw payload
    pub raw: Vec<u8>,
}

impl MinMax {
    /// Interpret as `(max, min)` using the variable's element type.
    pub fn interpret(&self, data_type: DataType) -> Option<(Values, Values)> {
        let size = data_type.size();
        if size == 0 || data_type.is_char() || self.raw.len() < 2 * size {
            return None;
        }
        let max = Values::from_be_bytes(data_type, &self.raw[..size]).ok()?;
        let min = Values::from_be_bytes(data_type, &self.raw[size..2 * size]).ok()?;
        Some((max, min))
    }
}
