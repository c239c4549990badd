//! Property-based tests for HDF4 format primitives

use hdf4_format::constants::TAG_EXTENDED_BIT;
use hdf4_format::cursor::Cursor;
use hdf4_format::payload::{GroupMembership, TagPayload, VGroupInfo};
use hdf4_format::{DataType, DirectoryEntry, TagKey, Values};
use proptest::prelude::*;

proptest! {
    #[test]
    fn packed_key_roundtrip_property(code in 0u16..0x4000, reference in any::<u16>()) {
        let key = TagKey::new(code, reference);
        let packed = key.packed();
        prop_assert_eq!(packed >> 16, code as u32);
        prop_assert_eq!(packed & 0xFFFF, reference as u32);
        prop_assert_eq!(TagKey::from_packed(packed), key);
    }

    #[test]
    fn extended_bit_never_reaches_key(code in 0u16..0x4000, reference in any::<u16>()) {
        prop_assert_eq!(
            TagKey::new(code | TAG_EXTENDED_BIT, reference),
            TagKey::new(code, reference)
        );
    }

    #[test]
    fn directory_entry_roundtrip_property(
        code in 2u16..0x4000,
        extended in any::<bool>(),
        reference in any::<u16>(),
        offset in any::<i32>(),
        length in any::<i32>(),
    ) {
        let entry = DirectoryEntry { code, extended, reference, offset, length };
        let decoded = DirectoryEntry::decode(&entry.encode()).expect("decode entry");
        prop_assert_eq!(decoded, entry);
    }

    #[test]
    fn cursor_never_reads_past_end(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let mut cursor = Cursor::new(&bytes);
        let mut consumed = 0usize;
        while cursor.u32().is_ok() {
            consumed += 4;
        }
        prop_assert_eq!(consumed, bytes.len() / 4 * 4);
        prop_assert_eq!(cursor.remaining(), bytes.len() % 4);
    }

    #[test]
    fn group_members_survive_decode(
        members in prop::collection::vec((2u16..0x4000, any::<u16>()), 0..50)
    ) {
        let group = GroupMembership {
            members: members.iter().map(|&(c, r)| TagKey::new(c, r)).collect(),
        };
        let bytes = group.encode();
        let entry = DirectoryEntry {
            code: 720,
            extended: false,
            reference: 1,
            offset: 0,
            length: bytes.len() as i32,
        };
        if bytes.is_empty() {
            prop_assert_eq!(TagPayload::decode(&entry, &bytes).unwrap(), TagPayload::Empty);
        } else {
            prop_assert_eq!(
                TagPayload::decode(&entry, &bytes).unwrap(),
                TagPayload::Group(group)
            );
        }
    }

    #[test]
    fn truncated_vgroup_never_panics(cut in 0usize..40) {
        let vg = VGroupInfo {
            members: vec![TagKey::new(1962, 2), TagKey::new(1965, 3)],
            name: "Geolocation".to_string(),
            class_name: "SWATH".to_string(),
            extag: 0,
            exref: 0,
            version: 3,
        };
        let bytes = vg.encode();
        let cut = cut.min(bytes.len());
        let entry = DirectoryEntry {
            code: 1965,
            extended: false,
            reference: 1,
            offset: 0,
            length: cut as i32,
        };
        // Either a clean decode or a clean error
        let _ = TagPayload::decode(&entry, &bytes[..cut]);
    }

    #[test]
    fn int32_values_decode_big_endian(values in prop::collection::vec(any::<i32>(), 0..100)) {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        let decoded = Values::from_be_bytes(DataType::Int32, &bytes).unwrap();
        prop_assert_eq!(decoded.to_be_bytes(), bytes);
        prop_assert_eq!(decoded, Values::Int32(values));
    }
}
