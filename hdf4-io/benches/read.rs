use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hdf4_format::constants::DFNT_INT32;
use hdf4_io::{DecodeOptions, Hdf4File, Range, Section};
use hdf4_test_utils::{fixtures, int32_bytes, Chunk, Element, FileBuilder};

const SIDE: usize = 512;
const CHUNK: usize = 64;

fn grid() -> Vec<i32> {
    (0..SIDE * SIDE).map(|i| (i % 9973) as i32).collect()
}

fn contiguous_file() -> Vec<u8> {
    let mut b = FileBuilder::new();
    b.sds(
        2,
        DFNT_INT32,
        &[SIDE as i32, SIDE as i32],
        Element::Plain(int32_bytes(&grid())),
        &[],
    );
    b.build()
}

fn chunked_file(deflate: bool) -> Vec<u8> {
    let values = grid();
    let per_side = SIDE / CHUNK;
    let mut chunks = Vec::new();
    for ci in 0..per_side {
        for cj in 0..per_side {
            let mut chunk = Vec::with_capacity(CHUNK * CHUNK);
            for r in 0..CHUNK {
                let row = (ci * CHUNK + r) * SIDE + cj * CHUNK;
                chunk.extend_from_slice(&values[row..row + CHUNK]);
            }
            let data = int32_bytes(&chunk);
            let element = if deflate {
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
    let nt = b.number_type(2, DFNT_INT32);
    let sdd = hdf4_format::payload::SdDimension {
        rank: 2,
        shape: vec![SIDE as i32, SIDE as i32],
        number_type: nt,
        scale_types: vec![nt, nt],
    };
    let dim = b.raw(hdf4_format::constants::TAG_SD_DIMENSION, 2, sdd.encode());
    let data = b.chunked(
        hdf4_format::constants::TAG_SD_DATA,
        2,
        DFNT_INT32,
        &[SIDE as i32, SIDE as i32],
        &[CHUNK as i32, CHUNK as i32],
        int32_bytes(&[0]),
        chunks,
    );
    b.raw(
        hdf4_format::constants::TAG_NUMERIC_GROUP,
        2,
        hdf4_format::payload::GroupMembership {
            members: vec![nt, dim, data],
        }
        .encode(),
    );
    b.build()
}

fn bench_full_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_read");
    group.throughput(Throughput::Bytes((SIDE * SIDE * 4) as u64));

    for (name, bytes) in [
        ("contiguous", contiguous_file()),
        ("chunked", chunked_file(false)),
        ("chunked_deflate", chunked_file(true)),
    ] {
        let file = Hdf4File::from_bytes(bytes, DecodeOptions::default()).unwrap();
        let var = file.variable("SDS-2").unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &var, |b, &var| {
            b.iter(|| black_box(file.read(var, None).unwrap()));
        });
    }

    group.finish();
}

fn bench_section_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("section_read");
    let section = Section::new([Range::new(100, 32), Range::strided(0, 128, 4)]);

    for (name, bytes) in [
        ("contiguous", contiguous_file()),
        ("chunked_deflate", chunked_file(true)),
    ] {
        let file = Hdf4File::from_bytes(bytes, DecodeOptions::default()).unwrap();
        let var = file.variable("SDS-2").unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &var, |b, &var| {
            b.iter(|| black_box(file.read(var, Some(&section)).unwrap()));
        });
    }

    group.finish();
}

fn bench_open(c: &mut Criterion) {
    let bytes = fixtures::sd_interface_file();
    c.bench_function("open_sd_interface", |b| {
        b.iter(|| black_box(Hdf4File::from_bytes(bytes.clone(), DecodeOptions::default()).unwrap()));
    });
}

criterion_group!(benches, bench_full_read, bench_section_read, bench_open);
criterion_main!(benches);
