use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hdf4_codec::{decompress, deflate, nbit, Codec, DecompressOpts, NBitParams};
use hdf4_format::constants::DFNT_INT32;

fn sample_elements(count: usize) -> Vec<u8> {
    (0..count as i32)
        .flat_map(|i| ((i * 37) % 4096).to_be_bytes())
        .collect()
}

fn bench_inflate(c: &mut Criterion) {
    let mut group = c.benchmark_group("inflate");
    let opts = DecompressOpts::default();

    for count in [1_024, 65_536, 1_048_576] {
        let data = sample_elements(count);
        let compressed = deflate::deflate(&data, 6).unwrap();
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &compressed, |b, stream| {
            b.iter(|| {
                black_box(
                    decompress(&Codec::Deflate { level: 6 }, &stream[..], data.len(), &opts)
                        .unwrap(),
                )
            });
        });
    }

    group.finish();
}

fn bench_nbit(c: &mut Criterion) {
    let mut group = c.benchmark_group("nbit_unpack");
    let params = NBitParams {
        number_type: DFNT_INT32 as i32,
        sign_extend: false,
        fill_one: false,
        start_bit: 11,
        bit_length: 12,
    };

    for count in [1_024, 65_536, 1_048_576] {
        let data = sample_elements(count);
        let packed = nbit::pack(&data, &params).unwrap();
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &packed, |b, packed| {
            b.iter(|| black_box(nbit::unpack(packed, &params, data.len()).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_inflate, bench_nbit);
criterion_main!(benches);
