use super::decode::{self, Error, Options};
use super::value::{Map, Simple, Value};
use hex_literal::hex;
use num_bigint::BigInt;

fn parse(data: &[u8]) -> Value {
    decode::parse(data).unwrap()
}

#[test]
fn rfc_integers() {
    // RFC 8949, Appendix A:
    // https://www.rfc-editor.org/rfc/rfc8949.html#section-appendix.a
    assert_eq!(parse(&hex!("00")), Value::Integer(0));
    assert_eq!(parse(&hex!("01")), Value::Integer(1));
    assert_eq!(parse(&hex!("0a")), Value::Integer(10));
    assert_eq!(parse(&hex!("17")), Value::Integer(23));
    assert_eq!(parse(&hex!("1818")), Value::Integer(24));
    assert_eq!(parse(&hex!("1819")), Value::Integer(25));
    assert_eq!(parse(&hex!("1864")), Value::Integer(100));
    assert_eq!(parse(&hex!("1903e8")), Value::Integer(1000));
    assert_eq!(parse(&hex!("1a000f4240")), Value::Integer(1000000));
    assert_eq!(
        parse(&hex!("1b000000e8d4a51000")),
        Value::Integer(1000000000000)
    );
    assert_eq!(
        parse(&hex!("1bffffffffffffffff")),
        Value::from(18446744073709551615u64)
    );
    assert_eq!(parse(&hex!("20")), Value::Integer(-1));
    assert_eq!(parse(&hex!("29")), Value::Integer(-10));
    assert_eq!(parse(&hex!("3863")), Value::Integer(-100));
    assert_eq!(parse(&hex!("3903e7")), Value::Integer(-1000));
    assert_eq!(
        parse(&hex!("3bffffffffffffffff")),
        Value::BigInteger(BigInt::from(-1) - BigInt::from(u64::MAX))
    );
}

#[test]
fn rfc_bignums() {
    // tag 2/3 payloads fold into the canonical integer representation
    assert_eq!(
        parse(&hex!("c249010000000000000000")),
        Value::BigInteger(BigInt::from(1u8) << 64)
    );
    assert_eq!(
        parse(&hex!("c349010000000000000000")),
        Value::BigInteger(BigInt::from(-1) - (BigInt::from(1u8) << 64))
    );
    // a bignum whose magnitude fits 64 bits folds all the way down
    assert_eq!(parse(&hex!("c2420100")), Value::Integer(256));
    assert_eq!(parse(&hex!("c340")), Value::Integer(-1));
}

#[test]
fn rfc_floats() {
    assert_eq!(parse(&hex!("f90000")), Value::Single(0.0));
    assert_eq!(parse(&hex!("f98000")), Value::Single(-0.0));
    assert_eq!(parse(&hex!("f93c00")), Value::Single(1.0));
    assert_eq!(parse(&hex!("fb3ff199999999999a")), Value::Double(1.1));
    assert_eq!(parse(&hex!("f93e00")), Value::Single(1.5));
    assert_eq!(parse(&hex!("f97bff")), Value::Single(65504.0));
    assert_eq!(parse(&hex!("fa47c35000")), Value::Single(100000.0));
    assert_eq!(
        parse(&hex!("fa7f7fffff")),
        Value::Single(3.4028234663852886e38)
    );
    assert_eq!(parse(&hex!("fb7e37e43c8800759c")), Value::Double(1.0e300));
    assert_eq!(
        parse(&hex!("f90001")),
        Value::Single(5.960464477539063e-8)
    );
    assert_eq!(parse(&hex!("f90400")), Value::Single(0.00006103515625));
    assert_eq!(parse(&hex!("f9c400")), Value::Single(-4.0));
    assert_eq!(parse(&hex!("fbc010666666666666")), Value::Double(-4.1));
    assert_eq!(parse(&hex!("f97c00")), Value::Single(f32::INFINITY));
    assert_eq!(parse(&hex!("f9fc00")), Value::Single(f32::NEG_INFINITY));
    assert!(matches!(parse(&hex!("f97e00")), Value::Single(f) if f.is_nan()));
    assert_eq!(parse(&hex!("fa7f800000")), Value::Single(f32::INFINITY));
    assert!(matches!(parse(&hex!("fa7fc00000")), Value::Single(f) if f.is_nan()));
    assert_eq!(
        parse(&hex!("fb7ff0000000000000")),
        Value::Double(f64::INFINITY)
    );
    assert!(matches!(parse(&hex!("fb7ff8000000000000")), Value::Double(f) if f.is_nan()));
}

#[test]
fn rfc_simple_values() {
    assert_eq!(parse(&hex!("f4")), Value::FALSE);
    assert_eq!(parse(&hex!("f5")), Value::TRUE);
    assert_eq!(parse(&hex!("f6")), Value::NULL);
    assert_eq!(parse(&hex!("f7")), Value::UNDEFINED);
    assert_eq!(parse(&hex!("f0")), Value::Simple(Simple::from_raw(16)));
    assert_eq!(parse(&hex!("f8ff")), Value::Simple(Simple::from_raw(255)));
    // two-byte form must not hold a code below 32
    assert!(matches!(
        decode::parse(&hex!("f818")),
        Err(Error::InvalidSimple(24))
    ));
}

#[test]
fn rfc_strings() {
    assert_eq!(parse(&hex!("40")), Value::Bytes(vec![]));
    assert_eq!(parse(&hex!("4401020304")), Value::Bytes(hex!("01020304").to_vec()));
    assert_eq!(parse(&hex!("60")), Value::from(""));
    assert_eq!(parse(&hex!("6161")), Value::from("a"));
    assert_eq!(parse(&hex!("6449455446")), Value::from("IETF"));
    assert_eq!(parse(&hex!("62225c")), Value::from("\"\\"));
    assert_eq!(parse(&hex!("62c3bc")), Value::from("\u{00fc}"));
    assert_eq!(parse(&hex!("63e6b0b4")), Value::from("\u{6c34}"));
    assert_eq!(parse(&hex!("64f0908591")), Value::from("\u{10151}"));
}

#[test]
fn rfc_indefinite_strings() {
    assert_eq!(
        parse(&hex!("5f42010243030405ff")),
        Value::Bytes(hex!("0102030405").to_vec())
    );
    assert_eq!(
        parse(&hex!("7f657374726561646d696e67ff")),
        Value::from("streaming")
    );
    // chunks must be definite and of the same major type
    assert!(matches!(
        decode::parse(&hex!("5f6161ff")),
        Err(Error::InvalidChunk)
    ));
    assert!(matches!(
        decode::parse(&hex!("7f7f6161ffff")),
        Err(Error::InvalidChunk)
    ));
}

fn int_array(values: &[i64]) -> Value {
    Value::Array(values.iter().map(|v| Value::Integer(*v)).collect())
}

#[test]
fn rfc_arrays() {
    assert_eq!(parse(&hex!("80")), Value::Array(vec![]));
    assert_eq!(parse(&hex!("820102")), int_array(&[1, 2]));
    assert_eq!(parse(&hex!("83010203")), int_array(&[1, 2, 3]));
    assert_eq!(
        parse(&hex!("8301820203820405")),
        Value::Array(vec![
            Value::Integer(1),
            int_array(&[2, 3]),
            int_array(&[4, 5])
        ])
    );
    let one_to_25 = Value::Array((1..=25).map(Value::Integer).collect());
    assert_eq!(
        parse(&hex!(
            "98190102030405060708090a0b0c0d0e0f101112131415161718181819"
        )),
        one_to_25
    );
    // indefinite variants
    assert_eq!(parse(&hex!("9fff")), Value::Array(vec![]));
    assert_eq!(
        parse(&hex!("9f018202039f0405ffff")),
        parse(&hex!("8301820203820405"))
    );
    assert_eq!(
        parse(&hex!("83019f0203ff820405")),
        parse(&hex!("8301820203820405"))
    );
    assert_eq!(
        parse(&hex!(
            "9f0102030405060708090a0b0c0d0e0f101112131415161718181819ff"
        )),
        one_to_25
    );
}

#[test]
fn rfc_maps() {
    assert_eq!(parse(&hex!("a0")), Value::Map(Map::new()));

    let mut m = Map::new();
    m.insert(Value::Integer(1), Value::Integer(2));
    m.insert(Value::Integer(3), Value::Integer(4));
    assert_eq!(parse(&hex!("a201020304")), Value::Map(m));

    let mut m = Map::new();
    m.insert(Value::from("a"), Value::Integer(1));
    m.insert(Value::from("b"), int_array(&[2, 3]));
    let expected = Value::Map(m);
    assert_eq!(parse(&hex!("a26161016162820203")), expected);
    assert_eq!(parse(&hex!("bf61610161629f0203ffff")), expected);

    let mut inner = Map::new();
    inner.insert(Value::from("b"), Value::from("c"));
    let expected = Value::Array(vec![Value::from("a"), Value::Map(inner)]);
    assert_eq!(parse(&hex!("826161a161626163")), expected);
    assert_eq!(parse(&hex!("826161bf61626163ff")), expected);

    let mut m = Map::new();
    m.insert(Value::from("Fun"), Value::TRUE);
    m.insert(Value::from("Amt"), Value::Integer(-2));
    assert_eq!(parse(&hex!("bf6346756ef563416d7421ff")), Value::Map(m));
}

#[test]
fn rfc_tagged() {
    assert_eq!(
        parse(&hex!("c074323031332d30332d32315432303a30343a30305a")),
        Value::from("2013-03-21T20:04:00Z").tagged(0)
    );
    assert_eq!(
        parse(&hex!("c11a514b67b0")),
        Value::Integer(1363896240).tagged(1)
    );
    assert_eq!(
        parse(&hex!("c1fb41d452d9ec200000")),
        Value::Double(1363896240.5).tagged(1)
    );
    assert_eq!(
        parse(&hex!("d74401020304")),
        Value::Bytes(hex!("01020304").to_vec()).tagged(23)
    );
    assert_eq!(
        parse(&hex!("d818456449455446")),
        Value::Bytes(hex!("6449455446").to_vec()).tagged(24)
    );
    assert_eq!(
        parse(&hex!("d82076687474703a2f2f7777772e6578616d706c652e636f6d")),
        Value::from("http://www.example.com").tagged(32)
    );
}

#[test]
fn tag_folding() {
    // decimal fraction 273.15
    assert_eq!(parse(&hex!("c48221196ab3")), Value::decimal(27315, -2));
    // bigfloat 1.5
    assert_eq!(parse(&hex!("c5822003")), Value::big_float(3, -1));
    // zero exponent collapses to a plain integer
    assert_eq!(parse(&hex!("c482001903e8")), Value::Integer(1000));
    // rational 1/3, and 2/2 reducing away
    assert_eq!(parse(&hex!("d81e820103")), Value::rational(1, 3).unwrap());
    assert_eq!(parse(&hex!("d81e820202")), Value::Integer(1));
}

#[test]
fn tag_payload_validation() {
    // bignum payload must be a byte string
    assert!(matches!(
        decode::parse(&hex!("c201")),
        Err(Error::TagType { tag: 2 })
    ));
    // decimal fraction payload must be an array
    assert!(matches!(
        decode::parse(&hex!("c401")),
        Err(Error::TagType { tag: 4 })
    ));
    // ...of exactly two integers
    assert!(matches!(
        decode::parse(&hex!("c48101")),
        Err(Error::TagPayload { tag: 4, .. })
    ));
    // rational denominator must be positive
    assert!(matches!(
        decode::parse(&hex!("d81e820100")),
        Err(Error::TagPayload { tag: 30, .. })
    ));
    assert!(matches!(
        decode::parse(&hex!("d81e820120")),
        Err(Error::TagPayload { tag: 30, .. })
    ));
    // tag 0 must carry a plausible date
    assert!(matches!(
        decode::parse(&hex!("c063414243")),
        Err(Error::TagPayload { tag: 0, .. })
    ));
    // tag 37 wants exactly 16 bytes
    assert!(matches!(
        decode::parse(&hex!("d8254100")),
        Err(Error::TagPayload { tag: 37, .. })
    ));
    assert_eq!(
        parse(&hex!("d82550000102030405060708090a0b0c0d0e0f")),
        Value::Bytes(hex!("000102030405060708090a0b0c0d0e0f").to_vec()).tagged(37)
    );
}

#[test]
fn self_described_is_transparent() {
    assert_eq!(parse(&hex!("d9d9f700")), Value::Integer(0));
}

#[test]
fn unknown_tags_pass_through() {
    assert_eq!(parse(&hex!("d86901")), Value::Integer(1).tagged(105));
    // nested tag chain, outermost first
    let v = parse(&hex!("d869d86a01"));
    assert_eq!(v.tags(), vec![105, 106]);
    assert_eq!(*v.untag(), Value::Integer(1));
}

#[test]
fn string_references() {
    // namespace with one eligible string, then a back-reference
    assert_eq!(
        parse(&hex!("d901008263616161d81900")),
        Value::Array(vec![Value::from("aaa"), Value::from("aaa")]).tagged(256)
    );
    // strings below the recording threshold get no index
    assert!(matches!(
        decode::parse(&hex!("d9010082626162d81900")),
        Err(Error::BadStringRef(0))
    ));
    // byte strings participate too
    assert_eq!(
        parse(&hex!("d901008243010203d81900")),
        Value::Array(vec![
            Value::Bytes(vec![1, 2, 3]),
            Value::Bytes(vec![1, 2, 3])
        ])
        .tagged(256)
    );
}

#[test]
fn malformed_input() {
    // truncation at every interesting point
    assert!(matches!(decode::parse(&[]), Err(Error::NotEnoughData)));
    assert!(matches!(decode::parse(&hex!("18")), Err(Error::NotEnoughData)));
    assert!(matches!(
        decode::parse(&hex!("1a0000")),
        Err(Error::NotEnoughData)
    ));
    assert!(matches!(
        decode::parse(&hex!("62c3")),
        Err(Error::NotEnoughData)
    ));
    assert!(matches!(
        decode::parse(&hex!("8301")),
        Err(Error::NotEnoughData)
    ));
    // permanently invalid head bytes (minor 28..=30)
    assert!(matches!(
        decode::parse(&hex!("1c")),
        Err(Error::InvalidHead(0x1c))
    ));
    assert!(matches!(
        decode::parse(&hex!("3e")),
        Err(Error::InvalidHead(0x3e))
    ));
    assert!(matches!(
        decode::parse(&hex!("fc")),
        Err(Error::InvalidHead(0xfc))
    ));
    // bare break
    assert!(matches!(decode::parse(&hex!("ff")), Err(Error::UnexpectedBreak)));
    // indefinite length on majors that do not allow it
    assert!(matches!(decode::parse(&hex!("1f")), Err(Error::InvalidHead(0x1f))));
    assert!(matches!(decode::parse(&hex!("df")), Err(Error::InvalidHead(0xdf))));
    // invalid UTF-8
    assert!(matches!(
        decode::parse(&hex!("62c328")),
        Err(Error::InvalidUtf8)
    ));
    // declared length exceeds the remaining buffer
    assert!(matches!(
        decode::parse(&hex!("5affffffff00")),
        Err(Error::LengthOverrun(0xffffffff))
    ));
    // trailing data
    assert!(matches!(decode::parse(&hex!("0001")), Err(Error::TrailingData)));
    assert_eq!(
        decode::parse_prefix(&hex!("0001")).unwrap(),
        (Value::Integer(0), 1)
    );
}

#[test]
fn nesting_limits() {
    let mut deep = vec![0x81u8; 10_000];
    deep.push(0x00);
    assert!(matches!(decode::parse(&deep), Err(Error::TooDeep(500))));

    let mut opts = Options::default();
    opts.max_depth = 4;
    assert!(decode::parse_with(&hex!("8181818100"), &opts).is_ok());
    assert!(matches!(
        decode::parse_with(&hex!("818181818100"), &opts),
        Err(Error::TooDeep(4))
    ));
    // tags count toward the ceiling too
    assert!(matches!(
        decode::parse_with(&hex!("d869d869d869d869d86901"), &opts),
        Err(Error::TooDeep(4))
    ));
}

#[test]
fn duplicate_keys() {
    let doubled = hex!("a2016161016162");
    assert!(matches!(
        decode::parse(&doubled),
        Err(Error::DuplicateKey)
    ));

    let mut opts = Options::default();
    opts.allow_duplicate_map_keys = true;
    let mut m = Map::new();
    m.insert(Value::Integer(1), Value::from("b"));
    assert_eq!(decode::parse_with(&doubled, &opts).unwrap(), Value::Map(m));
}

#[test]
fn canonical_profile() {
    let strict = Options {
        ctap2_canonical: true,
        ..Options::default()
    };
    // shortest-form heads
    assert!(decode::parse_with(&hex!("17"), &strict).is_ok());
    assert!(matches!(
        decode::parse_with(&hex!("1817"), &strict),
        Err(Error::NotCanonical)
    ));
    assert!(matches!(
        decode::parse_with(&hex!("190017"), &strict),
        Err(Error::NotCanonical)
    ));
    // no indefinite lengths
    assert!(matches!(
        decode::parse_with(&hex!("9fff"), &strict),
        Err(Error::NotCanonical)
    ));
    assert!(matches!(
        decode::parse_with(&hex!("7f6161ff"), &strict),
        Err(Error::NotCanonical)
    ));
    // map keys in canonical order
    assert!(decode::parse_with(&hex!("a201020304"), &strict).is_ok());
    assert!(matches!(
        decode::parse_with(&hex!("a203040102"), &strict),
        Err(Error::NotCanonical)
    ));
    // shorter key encodings sort first
    assert!(decode::parse_with(&hex!("a2010261610a"), &strict).is_ok());
    assert!(matches!(
        decode::parse_with(&hex!("a261610a0102"), &strict),
        Err(Error::NotCanonical)
    ));
}

#[test]
fn shared_references() {
    // ["aaa", shared-ref 0] where the first element is marked shareable
    assert_eq!(
        parse(&hex!("82d81c63616161d81d00")),
        Value::Array(vec![Value::from("aaa"), Value::from("aaa")])
    );
    // a reference with no matching mark
    assert!(matches!(
        decode::parse(&hex!("8201d81d00")),
        Err(Error::BadSharedRef(0))
    ));
    // a value referencing itself cannot be materialized
    assert!(matches!(
        decode::parse(&hex!("d81c81d81d00")),
        Err(Error::SharedRefCycle)
    ));
    // tag 25 outside any namespace is not a shared ref
    assert!(matches!(
        decode::parse(&hex!("d81900")),
        Err(Error::StringRefOutsideNamespace)
    ));
}

#[test]
fn reads_from_streams() {
    let mut cursor = std::io::Cursor::new(hex!("83010203").to_vec());
    assert_eq!(
        decode::read(&mut cursor, &Options::default()).unwrap(),
        int_array(&[1, 2, 3])
    );
    // items can be read back-to-back from one stream
    let mut cursor = std::io::Cursor::new(hex!("0102").to_vec());
    assert_eq!(
        decode::read(&mut cursor, &Options::default()).unwrap(),
        Value::Integer(1)
    );
    assert_eq!(
        decode::read(&mut cursor, &Options::default()).unwrap(),
        Value::Integer(2)
    );
    // truncation surfaces as premature end of data
    let mut cursor = std::io::Cursor::new(hex!("8301").to_vec());
    assert!(matches!(
        decode::read(&mut cursor, &Options::default()),
        Err(Error::NotEnoughData)
    ));
}
