#![no_main]

use hdf4_codec::{decompress, Codec, DecompressOpts, Limits, NBitParams};
use hdf4_format::constants::{DFNT_INT16, DFNT_INT32, DFNT_UINT8};
use libfuzzer_sys::arbitrary::{self, Arbitrary};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    nbit: bool,
    number_type: u8,
    sign_extend: bool,
    fill_one: bool,
    start_bit: i8,
    bit_length: i8,
    uncompressed_length: u16,
    stored: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let opts = DecompressOpts {
        limits: Limits {
            max_decompressed_bytes: 1 << 20,
            ..Limits::default()
        },
    };
    let codec = if input.nbit {
        let number_type = [DFNT_UINT8, DFNT_INT16, DFNT_INT32][input.number_type as usize % 3];
        Codec::NBit(NBitParams {
            number_type: number_type as i32,
            sign_extend: input.sign_extend,
            fill_one: input.fill_one,
            start_bit: input.start_bit as i32,
            bit_length: input.bit_length as i32,
        })
    } else {
        Codec::Deflate { level: 6 }
    };

    let length = input.uncompressed_length as usize;
    if let Ok(out) = decompress(&codec, &input.stored[..], length, &opts) {
        assert!(out.len() <= length);
    }
});
