//! Tag keys, directory entries and tag records

use crate::constants::{tag_name, DD_ENTRY_SIZE, TAG_CODE_MASK, TAG_EXTENDED_BIT};
use crate::error::Result;
use crate::payload::TagPayload;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a tag: its code plus its reference number.
///
/// The code is always stored without the extended bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagKey {
    /// Tag code (14 significant bits)
    pub code: u16,
    /// Reference number
    pub reference: u16,
}

impl TagKey {
    /// Build a key, masking the code to its significant bits.
    pub fn new(code: u16, reference: u16) -> Self {
        Self {
            code: code & TAG_CODE_MASK,
            reference,
        }
    }

    /// The combined 32-bit key: `(code & 0x3FFF) << 16 | reference`.
    pub fn packed(&self) -> u32 {
        ((self.code & TAG_CODE_MASK) as u32) << 16 | self.reference as u32
    }

    /// Inverse of [`TagKey::packed`].
    pub fn from_packed(packed: u32) -> Self {
        Self::new((packed >> 16) as u16, (packed & 0xFFFF) as u16)
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})/{}", tag_name(self.code), self.code, self.reference)
    }
}

/// One 12-byte directory entry as stored in a directory block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Tag code without the extended bit
    pub code: u16,
    /// Whether the extended bit was set
    pub extended: bool,
    /// Reference number
    pub reference: u16,
    /// Byte offset of the payload
    pub offset: i32,
    /// Byte length of the payload
    pub length: i32,
}

impl DirectoryEntry {
    /// Decode an entry from its big-endian wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = crate::cursor::Cursor::new(bytes);
        let raw_code = cursor.u16()?;
        let reference = cursor.u16()?;
        let offset = cursor.i32()?;
        let length = cursor.i32()?;
        Ok(Self {
            code: raw_code & TAG_CODE_MASK,
            extended: raw_code & TAG_EXTENDED_BIT != 0,
            reference,
            offset,
            length,
        })
    }

    /// Encode the entry to its wire form.
    pub fn encode(&self) -> [u8; DD_ENTRY_SIZE] {
        let mut out = [0u8; DD_ENTRY_SIZE];
        let mut code = self.code & TAG_CODE_MASK;
        if self.extended {
            code |= TAG_EXTENDED_BIT;
        }
        out[0..2].copy_from_slice(&code.to_be_bytes());
        out[2..4].copy_from_slice(&self.reference.to_be_bytes());
        out[4..8].copy_from_slice(&self.offset.to_be_bytes());
        out[8..12].copy_from_slice(&self.length.to_be_bytes());
        out
    }

    /// Key addressing this entry.
    pub fn key(&self) -> TagKey {
        TagKey::new(self.code, self.reference)
    }

    /// True when offset and length both point at real bytes.
    pub fn has_extent(&self) -> bool {
        self.offset >= 0 && self.length >= 0
    }
}

/// A directory entry plus its decoded payload
#[derive(Debug, Clone)]
pub struct TagRecord {
    /// Raw directory entry
    pub entry: DirectoryEntry,
    /// Decoded payload
    pub payload: TagPayload,
}

impl TagRecord {
    /// Key addressing this record.
    pub fn key(&self) -> TagKey {
        self.entry.key()
    }

    /// Tag code.
    pub fn code(&self) -> u16 {
        self.entry.code
    }

    /// Reference number.
    pub fn reference(&self) -> u16 {
        self.entry.reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_key_layout() {
        let key = TagKey::new(1965, 7);
        assert_eq!(key.packed(), (1965u32 << 16) | 7);
        assert_eq!(TagKey::from_packed(key.packed()), key);
    }

    #[test]
    fn test_key_masks_extended_bit() {
        let key = TagKey::new(702 | TAG_EXTENDED_BIT, 3);
        assert_eq!(key.code, 702);
        assert_eq!(key, TagKey::new(702, 3));
    }

    #[test]
    fn test_directory_entry_decode() {
        let bytes = [0x42, 0xBE, 0x00, 0x05, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x20];
        let entry = DirectoryEntry::decode(&bytes).unwrap();
        assert_eq!(entry.code, 702);
        assert!(entry.extended);
        assert_eq!(entry.reference, 5);
        assert_eq!(entry.offset, 256);
        assert_eq!(entry.length, 32);
        assert_eq!(entry.encode(), bytes);
    }

    #[test]
    fn test_display_names_known_codes() {
        assert_eq!(TagKey::new(106, 2).to_string(), "NT(106)/2");
        assert_eq!(TagKey::new(9999, 1).to_string(), "UNKNOWN(9999)/1");
    }
}
