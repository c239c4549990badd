//! Big-endian cursor over a payload slice

use crate::error::{FormatError, Result};

/// Sequential big-endian reader over a byte slice.
///
/// `base` is the file offset of `bytes[0]`; it only feeds error messages so
/// a truncation names the absolute position that ran short.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    base: u64,
}

impl<'a> Cursor<'a> {
    /// Create a cursor at the start of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::with_base(bytes, 0)
    }

    /// Create a cursor whose errors report offsets relative to `base`.
    pub fn with_base(bytes: &'a [u8], base: u64) -> Self {
        Self {
            bytes,
            pos: 0,
            base,
        }
    }

    /// Current position within the slice.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the current position.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Take the next `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(FormatError::Truncated {
                offset: self.base + self.pos as u64,
                needed: n as u64,
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Skip `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Read one byte.
    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a big-endian u16.
    pub fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Read a big-endian i16.
    pub fn i16(&mut self) -> Result<i16> {
        Ok(self.u16()? as i16)
    }

    /// Read a big-endian u32.
    pub fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a big-endian i32.
    pub fn i32(&mut self) -> Result<i32> {
        Ok(self.u32()? as i32)
    }

    /// Read a `u16`-length-prefixed string.
    pub fn short_string(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        let raw = self.take(len)?;
        Ok(bytes_to_string(raw))
    }

    /// Read the rest of the slice as a string.
    pub fn rest_string(&mut self) -> String {
        let raw = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        bytes_to_string(raw)
    }
}

/// Decode a fixed-length text field, dropping everything from the first NUL.
pub fn bytes_to_string(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_big_endian_fields() {
        let bytes = [0x12, 0x34, 0x00, 0x00, 0x01, 0x00, 0xFF];
        let mut cursor = Cursor::new(&bytes);
        assert_eq!(cursor.u16().unwrap(), 0x1234);
        assert_eq!(cursor.u32().unwrap(), 256);
        assert_eq!(cursor.u8().unwrap(), 0xFF);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_truncation_reports_absolute_offset() {
        let bytes = [0u8; 3];
        let mut cursor = Cursor::with_base(&bytes, 100);
        cursor.u16().unwrap();
        match cursor.u32() {
            Err(FormatError::Truncated { offset, needed }) => {
                assert_eq!(offset, 102);
                assert_eq!(needed, 4);
            }
            other => panic!("expected Truncated, got {other:?}"),
        }
    }

    #[test]
    fn test_short_string_stops_at_nul() {
        let bytes = [0x00, 0x05, b'a', b'b', 0, b'x', b'y'];
        let mut cursor = Cursor::new(&bytes);
        assert_eq!(cursor.short_string().unwrap(), "ab");
        assert_eq!(cursor.remaining(), 0);
    }
}
