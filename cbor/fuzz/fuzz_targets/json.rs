#![no_main]

use libfuzzer_sys::fuzz_target;
use skua_cbor::json;

fuzz_target!(|data: &[u8]| {
    let opts = json::Options::default();
    if let Ok(value) = json::from_slice(data, &opts) {
        let text = json::to_string(&value);
        // writer output for JSON-native values re-parses to the same value
        let back = json::from_str(&text, &opts).expect("re-parse of writer output");
        assert_eq!(value, back);
    }
});
