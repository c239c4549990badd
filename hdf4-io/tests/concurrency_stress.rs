//! Shared-file reads from many threads

use std::sync::Arc;
use std::thread;

use hdf4_io::{DecodeOptions, Hdf4File, Range, Section, Values};
use hdf4_test_utils::fixtures;

const THREADS: usize = 8;

#[test]
fn test_concurrent_reads_resolve_once() {
    let file = Arc::new(
        Hdf4File::from_bytes(fixtures::chunked_file(), DecodeOptions::default()).unwrap(),
    );
    let var = file.variable("SDS-4").unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let file = Arc::clone(&file);
            thread::spawn(move || {
                let row = i % 4;
                let section = Section::new([Range::new(row, 1), Range::full(6)]);
                let values = file.read_values(var, Some(&section)).unwrap();
                let expected: Vec<i16> = (0..6).map(|c| fixtures::chunked_value(row, c)).collect();
                assert_eq!(values, Values::Int16(expected));
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("reader thread panicked");
    }

    assert_eq!(file.resolution_count(), 1);
}

#[test]
fn test_concurrent_reads_of_different_variables() {
    let file = Arc::new(
        Hdf4File::from_bytes(fixtures::vdata_file(), DecodeOptions::default()).unwrap(),
    );
    let stations = file.variable("stations").unwrap();
    let counts = file.variable("counts").unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let file = Arc::clone(&file);
            thread::spawn(move || {
                if i % 2 == 0 {
                    let ids = file.read_member(stations, "id", None).unwrap();
                    assert_eq!(ids, Values::Int32(vec![7, 8, 9]));
                } else {
                    let values = file.read_values(counts, None).unwrap();
                    assert_eq!(values, Values::Int16(vec![1, 2, 3, 5, 8]));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("reader thread panicked");
    }

    assert_eq!(file.resolution_count(), 2);
}
