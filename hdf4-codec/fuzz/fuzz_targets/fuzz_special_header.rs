#![no_main]

use hdf4_format::Special;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(special) = Special::decode(data, 0) {
        let _ = special.encode();
    }
});
