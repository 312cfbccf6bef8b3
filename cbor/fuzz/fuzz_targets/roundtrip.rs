#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = skua_cbor::decode::parse(data) else {
        return;
    };
    // whatever decodes must survive both writers byte-stably
    let bytes = skua_cbor::encode::emit(&value);
    let back = skua_cbor::decode::parse(&bytes).expect("re-decode of encoder output");
    assert_eq!(value, back);

    let canonical = skua_cbor::encode::emit_canonical(&value);
    let back = skua_cbor::decode::parse(&canonical).expect("re-decode of canonical output");
    assert_eq!(value, back);
    assert_eq!(canonical, skua_cbor::encode::emit_canonical(&back));
});
