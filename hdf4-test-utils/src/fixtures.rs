//! Ready-made HDF4 files shared by tests and benches

use hdf4_codec::deflate;
use hdf4_format::constants::*;
use hdf4_format::TagKey;

use crate::{float32_bytes, int16_bytes, int32_bytes, Chunk, Element, Field, FileBuilder};

/// Values stored by [`sds_file`], row-major `[3, 4]`
pub fn sds_values() -> Vec<f32> {
    (0..12).map(|i| i as f32 * 0.5).collect()
}

/// A numeric data group with labels, units, range and annotations.
///
/// Holds `SDS-2` (float32 `[3, 4]`), a version tag, a file id and a file
/// description.
pub fn sds_file() -> Vec<u8> {
    let mut b = FileBuilder::new();
    b.version(4, 2, 15, "HDF Version 4.2 Release 15");
    b.text(TAG_FILE_ID, 1, "synthetic sds");
    b.text(TAG_FILE_DESC, 1, "one float array");
    let labels = b.raw(TAG_SD_LABELS, 2, b"Temperature\0\0\0".to_vec());
    let units = b.raw(TAG_SD_UNITS, 2, b"K\0\0\0".to_vec());
    let formats = b.raw(TAG_SD_FORMATS, 2, b"F5.1\0\0\0".to_vec());
    let range = b.raw(TAG_SD_MAXMIN, 2, float32_bytes(&[5.5, 0.0]));
    let coordsys = b.text(TAG_SD_COORDSYS, 2, "cartesian");
    let sds = b.sds(
        2,
        DFNT_FLOAT32,
        &[3, 4],
        Element::Plain(float32_bytes(&sds_values())),
        &[labels, units, formats, range, coordsys],
    );
    b.annotation(TAG_DATA_ANNOTATION, 1, sds.group, "surface temperature");
    b.build()
}

/// Values stored by [`linked_deflate_file`], row-major `[64, 16]`
pub fn linked_deflate_values() -> Vec<i32> {
    (0..1024).map(|i| (i * 7) % 1000).collect()
}

/// `SDS-3`: int32 `[64, 16]`, DEFLATE compressed, the compressed stream
/// split over three linked blocks.
pub fn linked_deflate_file() -> Vec<u8> {
    let data = int32_bytes(&linked_deflate_values());
    let stream_len = deflate::deflate(&data, 6)
        .map(|s| s.len())
        .unwrap_or(data.len());
    let mut b = FileBuilder::new();
    b.sds(
        3,
        DFNT_INT32,
        &[64, 16],
        Element::Deflate {
            data,
            level: 6,
            linked_block_length: Some(stream_len.div_ceil(3)),
        },
        &[],
    );
    b.build()
}

/// Value of [`chunked_file`] at `(row, col)`
pub fn chunked_value(row: usize, col: usize) -> i16 {
    (row * 10 + col) as i16
}

/// `SDS-4`: int16 `[4, 6]` in four `[2, 3]` chunks; chunk `(0, 0)` is
/// DEFLATE compressed, the others are plain.
pub fn chunked_file() -> Vec<u8> {
    let chunk_values = |ci: usize, cj: usize| {
        let mut values = Vec::new();
        for r in 0..2 {
            for c in 0..3 {
                values.push(chunked_value(ci * 2 + r, cj * 3 + c));
            }
        }
        int16_bytes(&values)
    };
    let mut chunks = Vec::new();
    for ci in 0..2 {
        for cj in 0..2 {
            let data = chunk_values(ci, cj);
            let element = if (ci, cj) == (0, 0) {
                Element::Deflate {
                    data,
                    level: 6,
                    linked_block_length: None,
                }
            } else {
                Element::Plain(data)
            };
            chunks.push(Chunk {
                index: vec![ci as i32, cj as i32],
                element,
            });
        }
    }

    let mut b = FileBuilder::new();
    let nt = b.number_type(4, DFNT_INT16);
    let sdd = hdf4_format::payload::SdDimension {
        rank: 2,
        shape: vec![4, 6],
        number_type: nt,
        scale_types: vec![nt, nt],
    };
    let dim = b.raw(TAG_SD_DIMENSION, 4, sdd.encode());
    let data = b.chunked(
        TAG_SD_DATA,
        4,
        DFNT_INT16,
        &[4, 6],
        &[2, 3],
        int16_bytes(&[-1]),
        chunks,
    );
    b.raw(
        TAG_NUMERIC_GROUP,
        4,
        hdf4_format::payload::GroupMembership {
            members: vec![nt, dim, data],
        }
        .encode(),
    );
    b.build()
}

/// Text of the promoted metadata attribute in [`sd_interface_file`]
pub const CORE_METADATA: &str = "GROUP = INVENTORYMETADATA\nEND_GROUP = INVENTORYMETADATA\n";

/// A file laid out the way the SD interface writes it.
///
/// - `CDF0.0` holding the global attributes `history` and `CoreMetadata.0`
///   (the latter promoted to a char variable)
/// - dimensions `lat` (3) and `lon` (4)
/// - variable `temperature` (`Var0.0` wrapping a numeric data group) with
///   `units` and `_FillValue` attributes, stored without data
/// - a plain V-group `Geophysical` holding `temperature`
pub fn sd_interface_file() -> Vec<u8> {
    let mut b = FileBuilder::new();
    b.version(4, 2, 15, "HDF Version 4.2 Release 15");

    let dim = |b: &mut FileBuilder, reference: u16, name: &str, length: i32| {
        let values = b.vdata(
            reference,
            name,
            "DimVal0.1",
            &[Field::new("Values", DFNT_INT32, 1)],
            1,
            int32_bytes(&[length]),
        );
        b.vgroup(reference, name, "Dim0.0", &[values])
    };
    let lat = dim(&mut b, 10, "lat", 3);
    let lon = dim(&mut b, 11, "lon", 4);

    let sds = b.sds(20, DFNT_FLOAT32, &[3, 4], Element::Empty, &[]);
    let units = b.text_attribute(21, "units", "K");
    let fill = b.vdata(
        22,
        "_FillValue",
        CLASS_ATTRIBUTE,
        &[Field::new("VALUES", DFNT_FLOAT32, 1)],
        1,
        float32_bytes(&[-999.0]),
    );
    let var = b.vgroup(20, "temperature", "Var0.0", &[lat, lon, sds.group, units, fill]);

    let history = b.text_attribute(30, "history", "created by fixtures");
    let core = b.text_attribute(31, "CoreMetadata.0", CORE_METADATA);
    b.vgroup(40, "CDF0.0", CLASS_CDF, &[lat, lon, var, history, core]);
    b.vgroup(41, "Geophysical", "", &[var]);
    b.build()
}

/// Records of the `stations` Vdata in [`vdata_file`]: `(id, [x, y], name)`
pub fn stations() -> Vec<(i32, [f32; 2], &'static str)> {
    vec![
        (7, [1.5, -2.0], "alpha"),
        (8, [0.25, 4.0], "bravo"),
        (9, [-3.0, 0.5], "charlie"),
    ]
}

/// A compound `Data` Vdata `stations` (fields `id`, `position[2]`,
/// `name[8]`) and a single-field Vdata `counts` (int16, 5 records) without
/// a class.
pub fn vdata_file() -> Vec<u8> {
    let mut records = Vec::new();
    for (id, position, name) in stations() {
        records.extend_from_slice(&id.to_be_bytes());
        records.extend(float32_bytes(&position));
        let mut padded = name.as_bytes().to_vec();
        padded.resize(8, 0);
        records.extend(padded);
    }
    let mut b = FileBuilder::new();
    b.vdata(
        50,
        "stations",
        "Data0.0",
        &[
            Field::new("id", DFNT_INT32, 1),
            Field::new("position", DFNT_FLOAT32, 2),
            Field::new("name", DFNT_CHAR8, 8),
        ],
        3,
        records,
    );
    b.vdata(
        51,
        "counts",
        "",
        &[Field::new("count", DFNT_INT16, 1)],
        5,
        int16_bytes(&[1, 2, 3, 5, 8]),
    );
    b.build()
}

/// Raster image `Image-5` (uint8, 3 rows of 4 pixels) with a palette, plus
/// an annotation whose target does not exist.
pub fn image_file() -> Vec<u8> {
    let mut b = FileBuilder::new();
    let pixels: Vec<u8> = (0..12).collect();
    let palette: Vec<u8> = (0..=255u8).flat_map(|i| [i, i, i]).collect();
    b.raster_image(5, DFNT_UINT8, (4, 3), 1, pixels, Some(palette));
    b.annotation(TAG_DATA_LABEL, 9, TagKey::new(TAG_NUMERIC_GROUP, 99), "lost");
    b.build()
}

/// V-groups `inner` and `outer` that contain each other. Two `Data`
/// Vdata are both named `counts`; one lives in `inner`, the other in
/// `outer`.
pub fn group_cycle_file() -> Vec<u8> {
    let mut b = FileBuilder::new();
    let counts = b.vdata(
        60,
        "counts",
        "Data0.0",
        &[Field::new("count", DFNT_INT32, 1)],
        2,
        int32_bytes(&[4, 2]),
    );
    let other = b.vdata(
        61,
        "counts",
        "Data0.0",
        &[Field::new("count", DFNT_INT32, 1)],
        1,
        int32_bytes(&[9]),
    );
    let outer = TagKey::new(TAG_VGROUP, 70);
    let inner = b.vgroup(71, "inner", "", &[counts, outer]);
    b.vgroup(70, "outer", "", &[inner, other]);
    b.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_start_with_magic() {
        for bytes in [
            sds_file(),
            linked_deflate_file(),
            chunked_file(),
            sd_interface_file(),
            vdata_file(),
            image_file(),
            group_cycle_file(),
        ] {
            assert_eq!(&bytes[..4], &FILE_MAGIC);
        }
    }
}
