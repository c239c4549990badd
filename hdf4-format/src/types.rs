//! Element data types and their HDF4 number-type codes

use crate::constants::*;
use crate::error::{FormatError, Result};
use serde::{Deserialize, Serialize};

/// Element type of a variable, member or attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// 8-bit character
    Char,
    /// Signed 8-bit integer
    Int8,
    /// Unsigned 8-bit integer
    UInt8,
    /// Signed 16-bit integer
    Int16,
    /// Unsigned 16-bit integer
    UInt16,
    /// Signed 32-bit integer
    Int32,
    /// Unsigned 32-bit integer
    UInt32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 64-bit integer
    UInt64,
    /// 32-bit IEEE float
    Float32,
    /// 64-bit IEEE float
    Float64,
    /// Fixed-size record of named members
    Compound,
}

impl DataType {
    /// Map an HDF4 number-type code.
    ///
    /// Both `DFNT_CHAR8` and `DFNT_UCHAR8` are character data.
    pub fn from_number_type(code: u8) -> Result<Self> {
        match code {
            DFNT_CHAR8 | DFNT_UCHAR8 => Ok(DataType::Char),
            DFNT_UINT8 => Ok(DataType::UInt8),
            DFNT_FLOAT32 => Ok(DataType::Float32),
            DFNT_FLOAT64 => Ok(DataType::Float64),
            DFNT_INT8 => Ok(DataType::Int8),
            DFNT_INT16 => Ok(DataType::Int16),
            DFNT_UINT16 => Ok(DataType::UInt16),
            DFNT_INT32 => Ok(DataType::Int32),
            DFNT_UINT32 => Ok(DataType::UInt32),
            DFNT_INT64 => Ok(DataType::Int64),
            DFNT_UINT64 => Ok(DataType::UInt64),
            other => Err(FormatError::UnsupportedNumberType(other)),
        }
    }

    /// Map a 16-bit number-type field as stored in Vdata headers.
    pub fn from_field_type(code: u16) -> Result<Self> {
        if code > u8::MAX as u16 {
            return Err(FormatError::UnsupportedNumberType(u8::MAX));
        }
        Self::from_number_type(code as u8)
    }

    /// Size in bytes of one element; zero for `Compound`.
    pub fn size(&self) -> usize {
        match self {
            DataType::Char | DataType::Int8 | DataType::UInt8 => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::UInt64 | DataType::Float64 => 8,
            DataType::Compound => 0,
        }
    }

    /// Whether the type holds text.
    pub fn is_char(&self) -> bool {
        matches!(self, DataType::Char)
    }

    /// Short lowercase name used in listings.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Char => "char",
            DataType::Int8 => "int8",
            DataType::UInt8 => "uint8",
            DataType::Int16 => "int16",
            DataType::UInt16 => "uint16",
            DataType::Int32 => "int32",
            DataType::UInt32 => "uint32",
            DataType::Int64 => "int64",
            DataType::UInt64 => "uint64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Compound => "compound",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_type_mapping() {
        let cases = vec![
            (DFNT_CHAR8, DataType::Char, 1),
            (DFNT_UCHAR8, DataType::Char, 1),
            (DFNT_UINT8, DataType::UInt8, 1),
            (DFNT_INT8, DataType::Int8, 1),
            (DFNT_INT16, DataType::Int16, 2),
            (DFNT_UINT16, DataType::UInt16, 2),
            (DFNT_INT32, DataType::Int32, 4),
            (DFNT_UINT32, DataType::UInt32, 4),
            (DFNT_FLOAT32, DataType::Float32, 4),
            (DFNT_FLOAT64, DataType::Float64, 8),
            (DFNT_INT64, DataType::Int64, 8),
            (DFNT_UINT64, DataType::UInt64, 8),
        ];
        for (code, expected, size) in cases {
            let dt = DataType::from_number_type(code).unwrap();
            assert_eq!(dt, expected);
            assert_eq!(dt.size(), size);
        }
    }

    #[test]
    fn test_unknown_number_type() {
        match DataType::from_number_type(99) {
            Err(FormatError::UnsupportedNumberType(99)) => {}
            other => panic!("expected UnsupportedNumberType, got {other:?}"),
        }
        assert!(DataType::from_field_type(0x1005).is_err());
    }
}
