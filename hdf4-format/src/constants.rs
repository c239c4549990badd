//! Constants and magic numbers for the HDF4 format

/// File magic bytes: `^N^C^S^A`
pub const FILE_MAGIC: [u8; 4] = [0x0E, 0x03, 0x13, 0x01];

/// Default upper bound for the magic-number search.
pub const DEFAULT_MAX_HEADER_SEARCH: u64 = 500_000;

/// First non-zero offset searched for the magic number; later offsets double it.
pub const HEADER_SEARCH_START: u64 = 512;

/// Size of one directory entry: code, reference, offset, length.
pub const DD_ENTRY_SIZE: usize = 12;

/// Size of a directory block header: entry count + next link.
pub const DDH_HEADER_SIZE: usize = 6;

/// Mask for the significant bits of a tag code.
pub const TAG_CODE_MASK: u16 = 0x3FFF;

/// Bit marking an extended ("special") data element.
pub const TAG_EXTENDED_BIT: u16 = 0x4000;

// Tag codes used by the decoder.

/// Wildcard tag; never stored.
pub const TAG_WILDCARD: u16 = 0;
/// Unused directory slot.
pub const TAG_NULL: u16 = 1;
/// Block of a linked-block chain, or a link table.
pub const TAG_LINKED: u16 = 20;
/// Library version record.
pub const TAG_VERSION: u16 = 30;
/// Compressed data element referenced by a compressed special header.
pub const TAG_COMPRESSED: u16 = 40;
/// Data chunk.
pub const TAG_CHUNK: u16 = 61;
/// File identifier (title).
pub const TAG_FILE_ID: u16 = 100;
/// File description.
pub const TAG_FILE_DESC: u16 = 101;
/// Data identifier label.
pub const TAG_DATA_LABEL: u16 = 104;
/// Data identifier annotation.
pub const TAG_DATA_ANNOTATION: u16 = 105;
/// Number type descriptor.
pub const TAG_NUMBER_TYPE: u16 = 106;
/// Image dimension record.
pub const TAG_IMAGE_DIM: u16 = 300;
/// Image palette (lookup table).
pub const TAG_PALETTE: u16 = 301;
/// Raster image data.
pub const TAG_RASTER_IMAGE: u16 = 302;
/// Raster image group.
pub const TAG_RASTER_GROUP: u16 = 306;
/// Lookup table dimension record.
pub const TAG_LUT_DIM: u16 = 307;
/// Matte channel dimension record.
pub const TAG_MATTE_DIM: u16 = 308;
/// Scientific data dimension record.
pub const TAG_SD_DIMENSION: u16 = 701;
/// Scientific data.
pub const TAG_SD_DATA: u16 = 702;
/// Scientific data labels.
pub const TAG_SD_LABELS: u16 = 704;
/// Scientific data units.
pub const TAG_SD_UNITS: u16 = 705;
/// Scientific data formats.
pub const TAG_SD_FORMATS: u16 = 706;
/// Scientific data maximum/minimum.
pub const TAG_SD_MAXMIN: u16 = 707;
/// Scientific data coordinate system.
pub const TAG_SD_COORDSYS: u16 = 708;
/// Numeric data group.
pub const TAG_NUMERIC_GROUP: u16 = 720;
/// Vdata header.
pub const TAG_VDATA_HEADER: u16 = 1962;
/// Vdata storage.
pub const TAG_VDATA_STORAGE: u16 = 1963;
/// Vgroup.
pub const TAG_VGROUP: u16 = 1965;

// Special element codes stored at the start of an extended tag.

/// Linked-block special element.
pub const SPECIAL_LINKED: u16 = 1;
/// External-file special element.
pub const SPECIAL_EXTERNAL: u16 = 2;
/// Compressed special element.
pub const SPECIAL_COMP: u16 = 3;
/// Variable-length linked special element.
pub const SPECIAL_VLINKED: u16 = 4;
/// Chunked special element.
pub const SPECIAL_CHUNKED: u16 = 5;

// Compression codes stored in a compressed special header.

/// Stored as-is.
pub const COMP_CODE_NONE: u16 = 0;
/// Run-length encoding.
pub const COMP_CODE_RLE: u16 = 1;
/// N-bit packing.
pub const COMP_CODE_NBIT: u16 = 2;
/// Skipping Huffman.
pub const COMP_CODE_SKPHUFF: u16 = 3;
/// DEFLATE (zlib stream).
pub const COMP_CODE_DEFLATE: u16 = 4;
/// SZIP.
pub const COMP_CODE_SZIP: u16 = 5;

// Number type codes.

/// Unsigned 8-bit character.
pub const DFNT_UCHAR8: u8 = 3;
/// 8-bit character.
pub const DFNT_CHAR8: u8 = 4;
/// 32-bit IEEE float.
pub const DFNT_FLOAT32: u8 = 5;
/// 64-bit IEEE float.
pub const DFNT_FLOAT64: u8 = 6;
/// Signed 8-bit integer.
pub const DFNT_INT8: u8 = 20;
/// Unsigned 8-bit integer.
pub const DFNT_UINT8: u8 = 21;
/// Signed 16-bit integer.
pub const DFNT_INT16: u8 = 22;
/// Unsigned 16-bit integer.
pub const DFNT_UINT16: u8 = 23;
/// Signed 32-bit integer.
pub const DFNT_INT32: u8 = 24;
/// Unsigned 32-bit integer.
pub const DFNT_UINT32: u8 = 25;
/// Signed 64-bit integer.
pub const DFNT_INT64: u8 = 26;
/// Unsigned 64-bit integer.
pub const DFNT_UINT64: u8 = 27;

// V-group and Vdata class names.

/// Class prefix of dimension V-groups.
pub const CLASS_DIM: &str = "Dim";
/// Class prefix of unlimited dimension V-groups.
pub const CLASS_UDIM: &str = "UDim";
/// Class prefix of variable V-groups.
pub const CLASS_VAR: &str = "Var";
/// Class prefix of the file-level attribute V-group.
pub const CLASS_CDF: &str = "CDF0.0";
/// Class prefix of attribute Vdata.
pub const CLASS_ATTRIBUTE: &str = "Att";
/// Class prefix of data Vdata.
pub const CLASS_DATA: &str = "Data";
/// Reserved class prefix of chunk tables.
pub const CLASS_CHUNK_TABLE: &str = "_HDF_CHK_TBL";

/// Attributes whose single char field is larger than this become variables.
pub const LARGE_METADATA_ATTRIBUTE_SIZE: usize = 4000;

/// Lower-case name prefixes of metadata attributes that become variables.
pub const METADATA_VARIABLE_PREFIXES: [&str; 4] = [
    "archivemetadata",
    "coremetadata",
    "productmetadata",
    "structmetadata",
];

/// Name of the attribute carrying a variable's fill value.
pub const FILL_VALUE_ATTRIBUTE: &str = "_FillValue";

/// Human readable name for a tag code, for diagnostics.
pub fn tag_name(code: u16) -> &'static str {
    match code {
        TAG_WILDCARD => "WILDCARD",
        TAG_NULL => "NULL",
        TAG_LINKED => "LINKED",
        TAG_VERSION => "VERSION",
        TAG_COMPRESSED => "COMPRESSED",
        TAG_CHUNK => "CHUNK",
        TAG_FILE_ID => "FID",
        TAG_FILE_DESC => "FD",
        TAG_DATA_LABEL => "DIL",
        TAG_DATA_ANNOTATION => "DIA",
        TAG_NUMBER_TYPE => "NT",
        TAG_IMAGE_DIM => "ID",
        TAG_PALETTE => "LUT",
        TAG_RASTER_IMAGE => "RI",
        TAG_RASTER_GROUP => "RIG",
        TAG_LUT_DIM => "LD",
        TAG_MATTE_DIM => "MD",
        TAG_SD_DIMENSION => "SDD",
        TAG_SD_DATA => "SD",
        TAG_SD_LABELS => "SDL",
        TAG_SD_UNITS => "SDU",
        TAG_SD_FORMATS => "SDF",
        TAG_SD_MAXMIN => "SDM",
        TAG_SD_COORDSYS => "SDC",
        TAG_NUMERIC_GROUP => "NDG",
        TAG_VDATA_HEADER => "VH",
        TAG_VDATA_STORAGE => "VS",
        TAG_VGROUP => "VG",
        _ => "UNKNOWN",
    }
}
