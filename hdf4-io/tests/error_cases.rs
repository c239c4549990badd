//! Malformed and unsupported input

use hdf4_format::constants::*;
use hdf4_format::payload::{GroupMembership, SdDimension};
use hdf4_format::{Codec, SpecialLinked};
use hdf4_io::{DecodeOptions, FormatError, Hdf4File, Limits, Range, Section, Severity, TagKey};
use hdf4_test_utils::{fixtures, int16_bytes, Chunk, Element, FileBuilder};

/// Wrap the data element `data` of an int16 array in a numeric data group
/// `reference`.
fn int16_sds(b: &mut FileBuilder, reference: u16, shape: &[i32], data: TagKey) {
    let nt = b.number_type(reference, DFNT_INT16);
    let sdd = SdDimension {
        rank: shape.len() as u16,
        shape: shape.to_vec(),
        number_type: nt,
        scale_types: vec![nt; shape.len()],
    };
    let dim = b.raw(TAG_SD_DIMENSION, reference, sdd.encode());
    b.raw(
        TAG_NUMERIC_GROUP,
        reference,
        GroupMembership {
            members: vec![nt, dim, data],
        }
        .encode(),
    );
}

fn chunked_int16_file(shape: &[i32], chunk_shape: &[i32]) -> Vec<u8> {
    let mut b = FileBuilder::new();
    let chunk = Chunk {
        index: vec![0; shape.len()],
        element: Element::Plain(int16_bytes(&[1, 2])),
    };
    let data = b.chunked(
        TAG_SD_DATA,
        2,
        DFNT_INT16,
        shape,
        chunk_shape,
        int16_bytes(&[0]),
        vec![chunk],
    );
    int16_sds(&mut b, 2, shape, data);
    b.build()
}

/// A numeric data group whose dimension record names a number type tag
/// that does not exist, next to a valid one.
fn dangling_number_type_file() -> Vec<u8> {
    let mut b = FileBuilder::new();
    b.sds(
        2,
        DFNT_INT16,
        &[2],
        Element::Plain(int16_bytes(&[1, 2])),
        &[],
    );
    let sdd = SdDimension {
        rank: 1,
        shape: vec![4],
        number_type: TagKey::new(TAG_NUMBER_TYPE, 77),
        scale_types: vec![TagKey::new(TAG_NUMBER_TYPE, 77)],
    };
    let dim = b.raw(TAG_SD_DIMENSION, 7, sdd.encode());
    b.raw(
        TAG_NUMERIC_GROUP,
        7,
        GroupMembership { members: vec![dim] }.encode(),
    );
    b.build()
}

#[test]
fn test_not_hdf4() {
    let result = Hdf4File::from_bytes(b"definitely not hdf".to_vec(), DecodeOptions::default());
    assert!(matches!(result, Err(FormatError::NotRecognized)));
}

#[test]
fn test_magic_off_search_positions() {
    let mut b = FileBuilder::new().with_user_block(100);
    b.text(TAG_FILE_ID, 1, "hidden");
    let result = Hdf4File::from_bytes(b.build(), DecodeOptions::default());
    assert!(matches!(result, Err(FormatError::NotRecognized)));
}

#[test]
fn test_header_search_bound() {
    let mut b = FileBuilder::new().with_user_block(1024);
    b.text(TAG_FILE_ID, 1, "far");
    let bytes = b.build();

    let opts = DecodeOptions {
        max_header_search: 1024,
        ..DecodeOptions::default()
    };
    assert!(matches!(
        Hdf4File::from_bytes(bytes.clone(), opts),
        Err(FormatError::NotRecognized)
    ));
    assert!(Hdf4File::from_bytes(bytes, DecodeOptions::default()).is_ok());
}

#[test]
fn test_directory_cycle() {
    let mut b = FileBuilder::new()
        .with_block_capacity(1)
        .with_cyclic_directory();
    b.text(TAG_FILE_ID, 1, "one");
    b.text(TAG_FILE_DESC, 1, "two");
    let result = Hdf4File::from_bytes(b.build(), DecodeOptions::default());
    assert!(matches!(result, Err(FormatError::DirectoryCycle { .. })));
}

#[test]
fn test_directory_block_limit() {
    let mut b = FileBuilder::new().with_block_capacity(1);
    for reference in 1..=4 {
        b.text(TAG_FILE_ID, reference, "t");
    }
    let opts = DecodeOptions {
        limits: Limits {
            max_directory_blocks: 2,
            ..Limits::default()
        },
        ..DecodeOptions::default()
    };
    let result = Hdf4File::from_bytes(b.build(), opts);
    assert!(matches!(result, Err(FormatError::LimitExceeded(_))));
}

#[test]
fn test_broken_object_is_skipped() {
    let file = Hdf4File::from_bytes(dangling_number_type_file(), DecodeOptions::default()).unwrap();
    assert!(file.variable("SDS-2").is_some());
    assert!(file.variable("SDS-7").is_none());

    let error = file
        .diagnostics()
        .iter()
        .find(|d| d.severity == Severity::Error)
        .expect("skip recorded");
    assert_eq!(error.tag, Some(TagKey::new(TAG_NUMERIC_GROUP, 7)));
    assert!(file
        .orphan_tags()
        .any(|t| t.key() == TagKey::new(TAG_NUMERIC_GROUP, 7)));
}

#[test]
fn test_strict_mode_fails_on_broken_object() {
    let opts = DecodeOptions {
        strict: true,
        ..DecodeOptions::default()
    };
    let result = Hdf4File::from_bytes(dangling_number_type_file(), opts);
    assert!(matches!(
        result,
        Err(FormatError::DanglingReference { key, .. }) if key == TagKey::new(TAG_NUMBER_TYPE, 77)
    ));
}

#[test]
fn test_strict_mode_tolerates_warnings() {
    let opts = DecodeOptions {
        strict: true,
        ..DecodeOptions::default()
    };
    let file = Hdf4File::from_bytes(fixtures::image_file(), opts).unwrap();
    assert!(file
        .diagnostics()
        .iter()
        .all(|d| d.severity == Severity::Warning));
}

#[test]
fn test_unsupported_codec_fails_at_read() {
    let mut b = FileBuilder::new();
    b.sds(
        3,
        DFNT_INT16,
        &[4],
        Element::Unreadable {
            data: vec![0xAB; 8],
            codec: Codec::Szip,
        },
        &[],
    );
    let file = Hdf4File::from_bytes(b.build(), DecodeOptions::default()).unwrap();
    let var = file.variable("SDS-3").expect("opens despite the codec");

    let layout = file.resolve_layout(var).unwrap();
    assert_eq!(layout.compression.map(|c| c.codec), Some(Codec::Szip));
    assert!(matches!(
        file.read(var, None),
        Err(FormatError::UnsupportedCompression(COMP_CODE_SZIP))
    ));
}

#[test]
fn test_section_out_of_bounds() {
    let file = Hdf4File::from_bytes(fixtures::sds_file(), DecodeOptions::default()).unwrap();
    let var = file.variable("SDS-2").unwrap();

    let past_end = Section::new([Range::new(2, 2), Range::full(4)]);
    assert!(matches!(
        file.read(var, Some(&past_end)),
        Err(FormatError::InvalidSection(_))
    ));
    let wrong_rank = Section::new([Range::full(3)]);
    assert!(matches!(
        file.read(var, Some(&wrong_rank)),
        Err(FormatError::InvalidSection(_))
    ));
}

#[test]
fn test_decompressed_size_limit() {
    let opts = DecodeOptions {
        limits: Limits {
            max_decompressed_bytes: 1024,
            ..Limits::default()
        },
        ..DecodeOptions::default()
    };
    let file = Hdf4File::from_bytes(fixtures::linked_deflate_file(), opts).unwrap();
    let var = file.variable("SDS-3").unwrap();
    assert!(matches!(
        file.read(var, None),
        Err(FormatError::LimitExceeded(_))
    ));
}

#[test]
fn test_truncated_directory() {
    let bytes = fixtures::sds_file();
    // Magic, block header and one entry out of several
    let cut = bytes[..4 + DDH_HEADER_SIZE + DD_ENTRY_SIZE].to_vec();
    let result = Hdf4File::from_bytes(cut, DecodeOptions::default());
    assert!(matches!(result, Err(FormatError::Truncated { .. })));
}

#[test]
fn test_chunk_shape_overflow_is_corrupt() {
    let bytes = chunked_int16_file(&[2, 2, 2], &[1 << 30, 1 << 30, 1 << 30]);
    let file = Hdf4File::from_bytes(bytes, DecodeOptions::default()).unwrap();
    let var = file.variable("SDS-2").unwrap();

    assert!(matches!(file.resolve_layout(var), Err(FormatError::Corrupt(_))));
    assert!(matches!(file.read(var, None), Err(FormatError::Corrupt(_))));
}

#[test]
fn test_chunk_larger_than_limit() {
    let opts = DecodeOptions {
        limits: Limits {
            max_decompressed_bytes: 1 << 20,
            ..Limits::default()
        },
        ..DecodeOptions::default()
    };
    let bytes = chunked_int16_file(&[4096, 4096], &[4096, 4096]);
    let file = Hdf4File::from_bytes(bytes, opts).unwrap();
    let var = file.variable("SDS-2").unwrap();

    // a one-element read still needs the whole chunk decoded
    let corner = Section::new([Range::new(0, 1), Range::new(0, 1)]);
    assert!(matches!(
        file.read(var, Some(&corner)),
        Err(FormatError::LimitExceeded(_))
    ));
}

#[test]
fn test_looping_link_table() {
    let mut b = FileBuilder::new();
    let mut table = 50u16.to_be_bytes().to_vec();
    table.extend_from_slice(&51u16.to_be_bytes());
    b.raw(TAG_LINKED, 50, table);
    b.raw(TAG_LINKED, 51, int16_bytes(&[1, 2, 3, 4]));
    let header = SpecialLinked {
        length: 8,
        first_length: 8,
        block_length: 8,
        block_count: 1,
        link_ref: 50,
    };
    let data = b.raw_extended(TAG_SD_DATA, 2, header.encode());
    int16_sds(&mut b, 2, &[4], data);

    let file = Hdf4File::from_bytes(b.build(), DecodeOptions::default()).unwrap();
    let var = file.variable("SDS-2").unwrap();
    assert!(matches!(
        file.read(var, None),
        Err(FormatError::DirectoryCycle { .. })
    ));
}
