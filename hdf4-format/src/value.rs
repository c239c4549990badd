//! Typed values decoded from big-endian element bytes

use crate::error::{FormatError, Result};
use crate::types::DataType;
use serde::Serialize;

/// A typed, one-dimensional run of values
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum Values {
    /// Character data as a single string
    Text(String),
    /// Several fixed-width strings
    Strings(Vec<String>),
    /// Signed 8-bit integers
    Int8(Vec<i8>),
    /// Unsigned 8-bit integers
    UInt8(Vec<u8>),
    /// Signed 16-bit integers
    Int16(Vec<i16>),
    /// Unsigned 16-bit integers
    UInt16(Vec<u16>),
    /// Signed 32-bit integers
    Int32(Vec<i32>),
    /// Unsigned 32-bit integers
    UInt32(Vec<u32>),
    /// Signed 64-bit integers
    Int64(Vec<i64>),
    /// Unsigned 64-bit integers
    UInt64(Vec<u64>),
    /// 32-bit floats
    Float32(Vec<f32>),
    /// 64-bit floats
    Float64(Vec<f64>),
}

macro_rules! decode_be {
    ($bytes:expr, $ty:ty, $n:expr) => {
        $bytes
            .chunks_exact($n)
            .map(|c| {
                let mut raw = [0u8; $n];
                raw.copy_from_slice(c);
                <$ty>::from_be_bytes(raw)
            })
            .collect::<Vec<$ty>>()
    };
}

macro_rules! encode_be {
    ($vals:expr) => {
        $vals.iter().flat_map(|v| v.to_be_bytes()).collect::<Vec<u8>>()
    };
}

impl Values {
    /// Decode `bytes` as big-endian elements of `data_type`.
    ///
    /// Char data becomes one string with trailing NULs removed. The byte
    /// count must be a whole number of elements.
    pub fn from_be_bytes(data_type: DataType, bytes: &[u8]) -> Result<Self> {
        let size = data_type.size();
        if bytes.len() % size.max(1) != 0 {
            return Err(FormatError::Corrupt(format!(
                "{} bytes is not a whole number of {} elements",
                bytes.len(),
                data_type.name()
            )));
        }
        Ok(match data_type {
            DataType::Char => Values::Text(crate::cursor::bytes_to_string(bytes)),
            DataType::Int8 => Values::Int8(bytes.iter().map(|&b| b as i8).collect()),
            DataType::UInt8 => Values::UInt8(bytes.to_vec()),
            DataType::Int16 => Values::Int16(decode_be!(bytes, i16, 2)),
            DataType::UInt16 => Values::UInt16(decode_be!(bytes, u16, 2)),
            DataType::Int32 => Values::Int32(decode_be!(bytes, i32, 4)),
            DataType::UInt32 => Values::UInt32(decode_be!(bytes, u32, 4)),
            DataType::Int64 => Values::Int64(decode_be!(bytes, i64, 8)),
            DataType::UInt64 => Values::UInt64(decode_be!(bytes, u64, 8)),
            DataType::Float32 => Values::Float32(decode_be!(bytes, f32, 4)),
            DataType::Float64 => Values::Float64(decode_be!(bytes, f64, 8)),
            DataType::Compound => {
                return Err(FormatError::Corrupt(
                    "compound data has no scalar decoding".to_string(),
                ))
            }
        })
    }

    /// Split character data into fixed-width strings of `width` bytes.
    pub fn strings_from_bytes(bytes: &[u8], width: usize) -> Self {
        if width == 0 {
            return Values::Strings(Vec::new());
        }
        Values::Strings(
            bytes
                .chunks(width)
                .map(crate::cursor::bytes_to_string)
                .collect(),
        )
    }

    /// Element type of these values.
    pub fn data_type(&self) -> DataType {
        match self {
            Values::Text(_) | Values::Strings(_) => DataType::Char,
            Values::Int8(_) => DataType::Int8,
            Values::UInt8(_) => DataType::UInt8,
            Values::Int16(_) => DataType::Int16,
            Values::UInt16(_) => DataType::UInt16,
            Values::Int32(_) => DataType::Int32,
            Values::UInt32(_) => DataType::UInt32,
            Values::Int64(_) => DataType::Int64,
            Values::UInt64(_) => DataType::UInt64,
            Values::Float32(_) => DataType::Float32,
            Values::Float64(_) => DataType::Float64,
        }
    }

    /// Number of values (characters for `Text`).
    pub fn len(&self) -> usize {
        match self {
            Values::Text(s) => s.len(),
            Values::Strings(v) => v.len(),
            Values::Int8(v) => v.len(),
            Values::UInt8(v) => v.len(),
            Values::Int16(v) => v.len(),
            Values::UInt16(v) => v.len(),
            Values::Int32(v) => v.len(),
            Values::UInt32(v) => v.len(),
            Values::Int64(v) => v.len(),
            Values::UInt64(v) => v.len(),
            Values::Float32(v) => v.len(),
            Values::Float64(v) => v.len(),
        }
    }

    /// True when there are no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `index`-th numeric value widened to f64.
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        match self {
            Values::Text(_) | Values::Strings(_) => None,
            Values::Int8(v) => v.get(index).map(|&x| x as f64),
            Values::UInt8(v) => v.get(index).map(|&x| x as f64),
            Values::Int16(v) => v.get(index).map(|&x| x as f64),
            Values::UInt16(v) => v.get(index).map(|&x| x as f64),
            Values::Int32(v) => v.get(index).map(|&x| x as f64),
            Values::UInt32(v) => v.get(index).map(|&x| x as f64),
            Values::Int64(v) => v.get(index).map(|&x| x as f64),
            Values::UInt64(v) => v.get(index).map(|&x| x as f64),
            Values::Float32(v) => v.get(index).map(|&x| x as f64),
            Values::Float64(v) => v.get(index).copied(),
        }
    }

    /// Encode the values back to big-endian bytes.
    pub fn to_be_bytes(&self) -> Vec<u8> {
        match self {
            Values::Text(s) => s.as_bytes().to_vec(),
            Values::Strings(v) => v.iter().flat_map(|s| s.bytes()).collect(),
            Values::Int8(v) => v.iter().map(|&x| x as u8).collect(),
            Values::UInt8(v) => v.clone(),
            Values::Int16(v) => encode_be!(v),
            Values::UInt16(v) => encode_be!(v),
            Values::Int32(v) => encode_be!(v),
            Values::UInt32(v) => encode_be!(v),
            Values::Int64(v) => encode_be!(v),
            Values::UInt64(v) => encode_be!(v),
            Values::Float32(v) => encode_be!(v),
            Values::Float64(v) => encode_be!(v),
        }
    }

    /// First value converted to one big-endian element of `target`.
    ///
    /// Used for fill values, whose attribute type may differ from the
    /// variable type.
    pub fn first_as_element(&self, target: DataType) -> Option<Vec<u8>> {
        if let Values::Text(s) = self {
            return match target {
                DataType::Char | DataType::Int8 | DataType::UInt8 => {
                    Some(vec![s.as_bytes().first().copied().unwrap_or(0)])
                }
                _ => None,
            };
        }
        if self.data_type() == target {
            let size = target.size();
            let bytes = self.to_be_bytes();
            return (bytes.len() >= size).then(|| bytes[..size].to_vec());
        }
        let x = self.get_f64(0)?;
        Some(match target {
            DataType::Char | DataType::UInt8 => vec![x as u8],
            DataType::Int8 => vec![x as i8 as u8],
            DataType::Int16 => (x as i16).to_be_bytes().to_vec(),
            DataType::UInt16 => (x as u16).to_be_bytes().to_vec(),
            DataType::Int32 => (x as i32).to_be_bytes().to_vec(),
            DataType::UInt32 => (x as u32).to_be_bytes().to_vec(),
            DataType::Int64 => (x as i64).to_be_bytes().to_vec(),
            DataType::UInt64 => (x as u64).to_be_bytes().to_vec(),
            DataType::Float32 => (x as f32).to_be_bytes().to_vec(),
            DataType::Float64 => x.to_be_bytes().to_vec(),
            DataType::Compound => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_big_endian_ints() {
        let bytes = [0x00, 0x01, 0xFF, 0xFE];
        assert_eq!(
            Values::from_be_bytes(DataType::Int16, &bytes).unwrap(),
            Values::Int16(vec![1, -2])
        );
        assert_eq!(
            Values::from_be_bytes(DataType::UInt16, &bytes).unwrap(),
            Values::UInt16(vec![1, 0xFFFE])
        );
    }

    #[test]
    fn test_decode_text_trims_nul() {
        let values = Values::from_be_bytes(DataType::Char, b"kelvin\0\0").unwrap();
        assert_eq!(values, Values::Text("kelvin".to_string()));
    }

    #[test]
    fn test_partial_element_is_corrupt() {
        assert!(Values::from_be_bytes(DataType::Int32, &[0, 0, 1]).is_err());
    }

    #[test]
    fn test_first_as_element_converts_type() {
        let fill = Values::Float64(vec![-999.0]);
        assert_eq!(
            fill.first_as_element(DataType::Float32).unwrap(),
            (-999.0f32).to_be_bytes().to_vec()
        );
        let same = Values::Int16(vec![-1, 5]);
        assert_eq!(same.first_as_element(DataType::Int16).unwrap(), vec![0xFF, 0xFF]);
    }

    #[test]
    fn test_strings_from_fixed_width() {
        let values = Values::strings_from_bytes(b"ab\0\0cd\0\0", 4);
        assert_eq!(
            values,
            Values::Strings(vec!["ab".to_string(), "cd".to_string()])
        );
    }
}
