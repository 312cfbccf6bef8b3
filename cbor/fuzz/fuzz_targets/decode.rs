#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(value) = skua_cbor::decode::parse(data) {
        format!("{value}");
    }
});
