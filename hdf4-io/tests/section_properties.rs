//! Property tests: any in-bounds section reads the same elements as a
//! full read indexed by hand

use hdf4_io::{DecodeOptions, Hdf4File, Range, Section, Values};
use hdf4_test_utils::fixtures;
use proptest::prelude::*;

fn range_strategy(len: usize) -> impl Strategy<Value = Range> {
    (0..len, 1usize..=3).prop_flat_map(move |(start, stride)| {
        let max_count = (len - 1 - start) / stride + 1;
        (1..=max_count).prop_map(move |count| Range::strided(start, count, stride))
    })
}

fn expected<T: Copy>(full: &[T], shape: &[usize], section: &Section) -> Vec<T> {
    let [rows, cols] = section.ranges() else {
        panic!("rank 2 expected");
    };
    let mut out = Vec::new();
    for i in 0..rows.count {
        for j in 0..cols.count {
            let r = rows.start + i * rows.stride;
            let c = cols.start + j * cols.stride;
            out.push(full[r * shape[1] + c]);
        }
    }
    out
}

proptest! {
    #[test]
    fn chunked_sections_match_full_read(
        rows in range_strategy(4),
        cols in range_strategy(6),
    ) {
        let file = Hdf4File::from_bytes(fixtures::chunked_file(), DecodeOptions::default()).unwrap();
        let var = file.variable("SDS-4").unwrap();
        let Values::Int16(full) = file.read_values(var, None).unwrap() else {
            panic!("int16 expected");
        };
        let section = Section::new([rows, cols]);
        let values = file.read_values(var, Some(&section)).unwrap();
        prop_assert_eq!(values, Values::Int16(expected(&full, &[4, 6], &section)));
    }

    #[test]
    fn contiguous_sections_match_full_read(
        rows in range_strategy(3),
        cols in range_strategy(4),
    ) {
        let file = Hdf4File::from_bytes(fixtures::sds_file(), DecodeOptions::default()).unwrap();
        let var = file.variable("SDS-2").unwrap();
        let full = fixtures::sds_values();
        let section = Section::new([rows, cols]);
        let values = file.read_values(var, Some(&section)).unwrap();
        prop_assert_eq!(values, Values::Float32(expected(&full, &[3, 4], &section)));
    }

    #[test]
    fn parsed_sections_round_trip(
        rows in range_strategy(4),
        cols in range_strategy(6),
    ) {
        let text = format!(
            "{}:{}:{},{}:{}:{}",
            rows.start,
            rows.last().unwrap_or(rows.start),
            rows.stride,
            cols.start,
            cols.last().unwrap_or(cols.start),
            cols.stride
        );
        let parsed = Section::parse(&text, &[4, 6]).unwrap();
        prop_assert_eq!(parsed.ranges(), &[rows, cols][..]);
    }
}
