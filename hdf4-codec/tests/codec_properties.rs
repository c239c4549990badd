//! Property tests for the decompression engines

use hdf4_codec::{decompress, deflate, nbit, Codec, DecompressOpts, NBitParams};
use hdf4_format::constants::{DFNT_INT32, DFNT_UINT16};
use proptest::prelude::*;

proptest! {
    #[test]
    fn deflate_stream_decodes_to_input(data in prop::collection::vec(any::<u8>(), 0..4096)) {
        let compressed = deflate::deflate(&data, 6).unwrap();
        let out = decompress(
            &Codec::Deflate { level: 6 },
            &compressed[..],
            data.len(),
            &DecompressOpts::default(),
        ).unwrap();
        prop_assert_eq!(out, data);
    }

    #[test]
    fn nbit_unsigned_field_survives(
        values in prop::collection::vec(0u16..(1 << 10), 1..200),
        low in 0i32..6,
    ) {
        let params = NBitParams {
            number_type: DFNT_UINT16 as i32,
            sign_extend: false,
            fill_one: false,
            start_bit: low + 9,
            bit_length: 10,
        };
        let elements: Vec<u8> = values
            .iter()
            .flat_map(|v| ((*v as u32) << low).to_be_bytes()[2..].to_vec())
            .collect();
        let packed = nbit::pack(&elements, &params).unwrap();
        prop_assert_eq!(packed.len(), (values.len() * 10 + 7) / 8);
        let out = nbit::unpack(&packed, &params, elements.len()).unwrap();
        prop_assert_eq!(out, elements);
    }

    #[test]
    fn nbit_signed_field_sign_extends(values in prop::collection::vec(-2048i32..2048, 1..200)) {
        let params = NBitParams {
            number_type: DFNT_INT32 as i32,
            sign_extend: true,
            fill_one: false,
            start_bit: 11,
            bit_length: 12,
        };
        let elements: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        let packed = nbit::pack(&elements, &params).unwrap();
        let out = decompress(
            &Codec::NBit(params),
            &packed[..],
            elements.len(),
            &DecompressOpts::default(),
        ).unwrap();
        prop_assert_eq!(out, elements);
    }
}
