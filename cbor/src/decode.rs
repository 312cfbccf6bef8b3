//! CBOR decoder: byte stream in, [`Value`] tree out.
//!
//! One data item is decoded per call, recursively for nested structures, with
//! a hard depth ceiling against adversarial nesting. All malformed input is a
//! hard failure; no partial value is ever returned.

use crate::encode;
use crate::tags::{self, Registry, TagHandler, TypeFilter};
use crate::value::{self, Map, Simple, Value};
use num_traits::ToPrimitive;
use std::io::Read;
use std::sync::Arc;
use thiserror::Error;

const BREAK: u8 = 0xff;

// Strings are consumed in bounded chunks so a lying length header cannot
// trigger a huge allocation up front.
const READ_CHUNK: usize = 65536;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Premature end of data")]
    NotEnoughData,

    #[error("Invalid head byte {0:#04x}")]
    InvalidHead(u8),

    #[error("Break marker outside an indefinite-length item")]
    UnexpectedBreak,

    #[error("Invalid simple value {0}")]
    InvalidSimple(u8),

    #[error("Invalid UTF-8 in text string")]
    InvalidUtf8,

    #[error("Chunked string contains an invalid chunk")]
    InvalidChunk,

    #[error("Declared length {0} exceeds the remaining input")]
    LengthOverrun(u64),

    #[error("Length {0} too large to support")]
    LengthTooLarge(u64),

    #[error("Nesting deeper than {0} levels")]
    TooDeep(usize),

    #[error("Duplicate map key")]
    DuplicateKey,

    #[error("Trailing data after the value")]
    TrailingData,

    #[error("Non-canonical encoding")]
    NotCanonical,

    #[error("Tag {tag} payload has the wrong shape: {reason}")]
    TagPayload { tag: u64, reason: &'static str },

    #[error("Tag {tag} does not permit this payload type")]
    TagType { tag: u64 },

    #[error("String reference outside any namespace")]
    StringRefOutsideNamespace,

    #[error("Unresolved string reference {0}")]
    BadStringRef(u64),

    #[error("Unresolved shared reference {0}")]
    BadSharedRef(u64),

    #[error("Shared references form a cycle")]
    SharedRefCycle,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct Options {
    /// Overwrite on duplicate map keys instead of failing.
    pub allow_duplicate_map_keys: bool,

    /// Enforce the strict canonical profile: shortest-form heads, no
    /// indefinite lengths, map keys in canonical order.
    pub ctap2_canonical: bool,

    /// Nesting ceiling for arrays, maps and tags.
    pub max_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            allow_duplicate_map_keys: false,
            ctap2_canonical: false,
            max_depth: 500,
        }
    }
}

// Expected trailing argument bytes per head byte: -1 permanently invalid,
// -2 indefinite length (or break, for 0xff).
const fn build_head_table() -> [i8; 256] {
    let mut t = [-1i8; 256];
    let mut head = 0usize;
    while head < 256 {
        let major = (head >> 5) as u8;
        let minor = (head & 0x1f) as u8;
        t[head] = match minor {
            0..=23 => 0,
            24 => 1,
            25 => 2,
            26 => 4,
            27 => 8,
            28..=30 => -1,
            _ => match major {
                2..=5 | 7 => -2,
                _ => -1,
            },
        };
        head += 1;
    }
    t
}

static HEAD_TABLE: [i8; 256] = build_head_table();

trait Source {
    fn pull_byte(&mut self) -> Result<u8, Error>;

    fn pull_exact(&mut self, buf: &mut [u8]) -> Result<(), Error>;

    /// Bytes left, when the source knows.
    fn remaining(&self) -> Option<u64>;

    fn consumed(&self) -> usize;
}

struct SliceSource<'a> {
    data: &'a [u8],
    offset: usize,
}

impl Source for SliceSource<'_> {
    fn pull_byte(&mut self) -> Result<u8, Error> {
        let b = *self.data.get(self.offset).ok_or(Error::NotEnoughData)?;
        self.offset += 1;
        Ok(b)
    }

    fn pull_exact(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        let end = self
            .offset
            .checked_add(buf.len())
            .ok_or(Error::NotEnoughData)?;
        if end > self.data.len() {
            return Err(Error::NotEnoughData);
        }
        buf.copy_from_slice(&self.data[self.offset..end]);
        self.offset = end;
        Ok(())
    }

    fn remaining(&self) -> Option<u64> {
        Some((self.data.len() - self.offset) as u64)
    }

    fn consumed(&self) -> usize {
        self.offset
    }
}

struct ReaderSource<R: Read> {
    inner: R,
    consumed: usize,
}

impl<R: Read> Source for ReaderSource<R> {
    fn pull_byte(&mut self) -> Result<u8, Error> {
        let mut buf = [0u8; 1];
        self.pull_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn pull_exact(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.consumed += buf.len();
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(Error::NotEnoughData),
            Err(e) => Err(e.into()),
        }
    }

    fn remaining(&self) -> Option<u64> {
        None
    }

    fn consumed(&self) -> usize {
        self.consumed
    }
}

struct Decoder<'o, S: Source> {
    src: S,
    opts: &'o Options,
    registry: Option<&'o Registry>,
    depth: usize,
    string_namespaces: Vec<Vec<Value>>,
    shared: Vec<Option<Value>>,
    seen_shared: bool,
}

impl<'o, S: Source> Decoder<'o, S> {
    fn new(src: S, opts: &'o Options, registry: Option<&'o Registry>) -> Self {
        Self {
            src,
            opts,
            registry,
            depth: 0,
            string_namespaces: Vec::new(),
            shared: Vec::new(),
            seen_shared: false,
        }
    }

    fn lookup(&self, tag: u64) -> Option<Arc<dyn TagHandler>> {
        match self.registry {
            Some(r) => r.lookup(tag),
            None => tags::lookup_default(tag),
        }
    }

    fn descend(&mut self) -> Result<(), Error> {
        self.depth += 1;
        if self.depth > self.opts.max_depth {
            Err(Error::TooDeep(self.opts.max_depth))
        } else {
            Ok(())
        }
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    /// Argument value following a head byte, with the strict profile's
    /// shortest-form enforcement.
    fn uint_arg(&mut self, minor: u8) -> Result<u64, Error> {
        let v = match minor {
            m @ 0..=23 => return Ok(m as u64),
            24 => self.src.pull_byte()? as u64,
            25 => {
                let mut b = [0u8; 2];
                self.src.pull_exact(&mut b)?;
                u16::from_be_bytes(b) as u64
            }
            26 => {
                let mut b = [0u8; 4];
                self.src.pull_exact(&mut b)?;
                u32::from_be_bytes(b) as u64
            }
            _ => {
                let mut b = [0u8; 8];
                self.src.pull_exact(&mut b)?;
                u64::from_be_bytes(b)
            }
        };
        if self.opts.ctap2_canonical {
            let shortest = match minor {
                24 => v >= 24,
                25 => v > u8::MAX as u64,
                26 => v > u16::MAX as u64,
                _ => v > u32::MAX as u64,
            };
            if !shortest {
                return Err(Error::NotCanonical);
            }
        }
        Ok(v)
    }

    fn item(&mut self, filter: Option<(u64, &TypeFilter)>) -> Result<Value, Error> {
        let head = self.src.pull_byte()?;
        self.item_with_head(head, filter)
    }

    fn item_with_head(
        &mut self,
        head: u8,
        filter: Option<(u64, &TypeFilter)>,
    ) -> Result<Value, Error> {
        if head == BREAK {
            return Err(Error::UnexpectedBreak);
        }
        if HEAD_TABLE[head as usize] == -1 {
            return Err(Error::InvalidHead(head));
        }
        let major = head >> 5;
        let minor = head & 0x1f;
        if let Some((tag, f)) = filter {
            if !f.allows(major, minor) {
                return Err(Error::TagType { tag });
            }
        }
        match major {
            0 => Ok(Value::from(self.uint_arg(minor)?)),
            1 => Ok(value::neg_from_wire(self.uint_arg(minor)?)),
            2 => self.string(major, minor, false),
            3 => self.string(major, minor, true),
            4 => self.array(minor),
            5 => self.map(minor),
            6 => self.tag(minor),
            _ => self.simple_or_float(minor),
        }
    }

    fn read_into(&mut self, buf: &mut Vec<u8>, len: u64) -> Result<(), Error> {
        if let Some(rem) = self.src.remaining() {
            if len > rem {
                return Err(Error::LengthOverrun(len));
            }
        }
        let mut left = usize::try_from(len).map_err(|_| Error::LengthTooLarge(len))?;
        while left > 0 {
            let take = left.min(READ_CHUNK);
            let start = buf.len();
            buf.resize(start + take, 0);
            self.src.pull_exact(&mut buf[start..])?;
            left -= take;
        }
        Ok(())
    }

    fn string(&mut self, major: u8, minor: u8, text: bool) -> Result<Value, Error> {
        let mut buf = Vec::new();
        let definite = minor != 31;
        if definite {
            let len = self.uint_arg(minor)?;
            self.read_into(&mut buf, len)?;
        } else {
            if self.opts.ctap2_canonical {
                return Err(Error::NotCanonical);
            }
            loop {
                let h = self.src.pull_byte()?;
                if h == BREAK {
                    break;
                }
                // chunks must be definite-length strings of the same major type
                if h >> 5 != major || h & 0x1f > 27 {
                    return Err(Error::InvalidChunk);
                }
                let len = self.uint_arg(h & 0x1f)?;
                self.read_into(&mut buf, len)?;
            }
        }
        let value = if text {
            Value::Text(String::from_utf8(buf).map_err(|_| Error::InvalidUtf8)?)
        } else {
            Value::Bytes(buf)
        };
        if definite {
            self.record_string_ref(&value);
        }
        Ok(value)
    }

    // Assigns the string to the innermost reference namespace when recording
    // it would be shorter than repeating it (the stringref size thresholds).
    fn record_string_ref(&mut self, value: &Value) {
        let Some(ns) = self.string_namespaces.last_mut() else {
            return;
        };
        let len = match value {
            Value::Bytes(b) => b.len(),
            Value::Text(s) => s.len(),
            _ => return,
        };
        let threshold: usize = match ns.len() as u64 {
            0..24 => 3,
            24..256 => 4,
            256..65536 => 5,
            65536..4294967296 => 7,
            _ => 11,
        };
        if len >= threshold {
            ns.push(value.clone());
        }
    }

    fn array(&mut self, minor: u8) -> Result<Value, Error> {
        let mut items = Vec::new();
        self.descend()?;
        if minor == 31 {
            if self.opts.ctap2_canonical {
                return Err(Error::NotCanonical);
            }
            loop {
                let head = self.src.pull_byte()?;
                if head == BREAK {
                    break;
                }
                items.push(self.item_with_head(head, None)?);
            }
        } else {
            let count = self.uint_arg(minor)?;
            let count = usize::try_from(count).map_err(|_| Error::LengthTooLarge(count))?;
            for _ in 0..count {
                items.push(self.item(None)?);
            }
        }
        self.ascend();
        Ok(Value::Array(items))
    }

    fn map(&mut self, minor: u8) -> Result<Value, Error> {
        let mut map = Map::new();
        let mut prev_key: Option<Vec<u8>> = None;
        self.descend()?;
        if minor == 31 {
            if self.opts.ctap2_canonical {
                return Err(Error::NotCanonical);
            }
            loop {
                let head = self.src.pull_byte()?;
                if head == BREAK {
                    break;
                }
                let key = self.item_with_head(head, None)?;
                self.map_pair(&mut map, &mut prev_key, key)?;
            }
        } else {
            let count = self.uint_arg(minor)?;
            let count = usize::try_from(count).map_err(|_| Error::LengthTooLarge(count))?;
            for _ in 0..count {
                let key = self.item(None)?;
                self.map_pair(&mut map, &mut prev_key, key)?;
            }
        }
        self.ascend();
        Ok(Value::Map(map))
    }

    fn map_pair(
        &mut self,
        map: &mut Map,
        prev_key: &mut Option<Vec<u8>>,
        key: Value,
    ) -> Result<(), Error> {
        if self.opts.ctap2_canonical {
            let enc = encode::emit_canonical(&key);
            if let Some(prev) = prev_key {
                if encode::ctap2_key_order(prev, &enc) != core::cmp::Ordering::Less {
                    return Err(Error::NotCanonical);
                }
            }
            *prev_key = Some(enc);
        }
        let value = self.item(None)?;
        if map.insert(key, value).is_some() && !self.opts.allow_duplicate_map_keys {
            return Err(Error::DuplicateKey);
        }
        Ok(())
    }

    fn tag(&mut self, minor: u8) -> Result<Value, Error> {
        let tag = self.uint_arg(minor)?;
        match tag {
            // decoder-state tags are handled here, not by the registry
            tags::TAG_STRING_REF_NAMESPACE => {
                self.descend()?;
                self.string_namespaces.push(Vec::new());
                let inner = self.item(None);
                self.string_namespaces.pop();
                self.ascend();
                Ok(Value::Tagged(tag, Box::new(inner?)))
            }
            tags::TAG_STRING_REF => {
                self.descend()?;
                let inner = self.item(Some((tag, &TypeFilter::UNSIGNED)))?;
                self.ascend();
                let idx = uint_payload(&inner).ok_or(Error::TagType { tag })?;
                let ns = self
                    .string_namespaces
                    .last()
                    .ok_or(Error::StringRefOutsideNamespace)?;
                usize::try_from(idx)
                    .ok()
                    .and_then(|i| ns.get(i))
                    .cloned()
                    .ok_or(Error::BadStringRef(idx))
            }
            tags::TAG_SHAREABLE => {
                self.seen_shared = true;
                let slot = self.shared.len();
                self.shared.push(None);
                self.descend()?;
                let inner = self.item(None)?;
                self.ascend();
                self.shared[slot] = Some(inner.clone());
                Ok(inner)
            }
            tags::TAG_SHARED_REF => {
                self.seen_shared = true;
                self.descend()?;
                let inner = self.item(Some((tag, &TypeFilter::UNSIGNED)))?;
                self.ascend();
                let idx = uint_payload(&inner).ok_or(Error::TagType { tag })?;
                // placeholder; replaced by the resolution pass
                Ok(Value::Tagged(tag, Box::new(Value::from(idx))))
            }
            _ => {
                let handler = self.lookup(tag);
                self.descend()?;
                let payload = match &handler {
                    Some(h) => {
                        let f = h.type_filter();
                        self.item(Some((tag, &f)))?
                    }
                    None => self.item(None)?,
                };
                self.ascend();
                let tagged = Value::Tagged(tag, Box::new(payload));
                match handler {
                    Some(h) => h.validate(tagged),
                    None => Ok(tagged),
                }
            }
        }
    }

    fn simple_or_float(&mut self, minor: u8) -> Result<Value, Error> {
        match minor {
            0..=23 => Ok(Value::Simple(Simple::from_raw(minor))),
            24 => {
                let code = self.src.pull_byte()?;
                if code < 32 {
                    return Err(Error::InvalidSimple(code));
                }
                Ok(Value::Simple(Simple::from_raw(code)))
            }
            25 => {
                let mut b = [0u8; 2];
                self.src.pull_exact(&mut b)?;
                Ok(Value::Single(half::f16::from_be_bytes(b).to_f32()))
            }
            26 => {
                let mut b = [0u8; 4];
                self.src.pull_exact(&mut b)?;
                Ok(Value::Single(f32::from_be_bytes(b)))
            }
            27 => {
                let mut b = [0u8; 8];
                self.src.pull_exact(&mut b)?;
                Ok(Value::Double(f64::from_be_bytes(b)))
            }
            // 28..=30 rejected by the head table, 31 is the break byte
            m => Err(Error::InvalidHead((7 << 5) | m)),
        }
    }

    fn finish(mut self, value: Value) -> Result<(Value, usize), Error> {
        let value = if self.seen_shared {
            resolve_shared(value, &mut self.shared, self.opts.allow_duplicate_map_keys)?
        } else {
            value
        };
        Ok((value, self.src.consumed()))
    }
}

fn uint_payload(v: &Value) -> Option<u64> {
    match v {
        Value::Integer(i) if *i >= 0 => Some(*i as u64),
        Value::BigInteger(b) => b.to_u64(),
        _ => None,
    }
}

// Shared-reference resolution. Marked values may reference each other; the
// references must form a DAG. Each slot is resolved after its dependencies,
// and a slot transitively referencing itself is a cycle error.
fn resolve_shared(
    mut root: Value,
    slots: &mut [Option<Value>],
    allow_duplicate_keys: bool,
) -> Result<Value, Error> {
    let mut state = vec![0u8; slots.len()]; // 0 unvisited, 1 visiting, 2 done
    for i in 0..slots.len() {
        resolve_slot(i, slots, &mut state, allow_duplicate_keys)?;
    }
    substitute(&mut root, slots, &mut state, allow_duplicate_keys)?;
    Ok(root)
}

fn resolve_slot(
    i: usize,
    slots: &mut [Option<Value>],
    state: &mut [u8],
    allow_duplicate_keys: bool,
) -> Result<Value, Error> {
    match state[i] {
        1 => return Err(Error::SharedRefCycle),
        2 => {}
        _ => {
            state[i] = 1;
            let mut v = slots[i].take().ok_or(Error::BadSharedRef(i as u64))?;
            substitute(&mut v, slots, state, allow_duplicate_keys)?;
            slots[i] = Some(v);
            state[i] = 2;
        }
    }
    slots[i].clone().ok_or(Error::BadSharedRef(i as u64))
}

fn substitute(
    v: &mut Value,
    slots: &mut [Option<Value>],
    state: &mut [u8],
    allow_duplicate_keys: bool,
) -> Result<(), Error> {
    match v {
        Value::Tagged(tag, inner) if *tag == tags::TAG_SHARED_REF => {
            let idx = uint_payload(inner).ok_or(Error::SharedRefCycle)?;
            let i = usize::try_from(idx)
                .ok()
                .filter(|i| *i < slots.len())
                .ok_or(Error::BadSharedRef(idx))?;
            *v = resolve_slot(i, slots, state, allow_duplicate_keys)?;
            Ok(())
        }
        Value::Tagged(_, inner) => substitute(inner, slots, state, allow_duplicate_keys),
        Value::Array(items) => {
            for item in items {
                substitute(item, slots, state, allow_duplicate_keys)?;
            }
            Ok(())
        }
        Value::Map(map) => {
            // substituted keys could collide, so rebuild under the key policy
            let entries = core::mem::take(map.entries_mut());
            for (mut key, mut value) in entries {
                substitute(&mut key, slots, state, allow_duplicate_keys)?;
                substitute(&mut value, slots, state, allow_duplicate_keys)?;
                if map.insert(key, value).is_some() && !allow_duplicate_keys {
                    return Err(Error::DuplicateKey);
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Decodes a single data item from `data`, requiring the whole input to be
/// consumed.
pub fn parse(data: &[u8]) -> Result<Value, Error> {
    parse_with(data, &Options::default())
}

pub fn parse_with(data: &[u8], opts: &Options) -> Result<Value, Error> {
    let (value, consumed) = parse_prefix_with(data, opts)?;
    if consumed != data.len() {
        return Err(Error::TrailingData);
    }
    Ok(value)
}

/// Like [`parse_with`], consulting an explicit tag registry instead of the
/// process-wide default.
pub fn parse_with_registry(
    data: &[u8],
    opts: &Options,
    registry: &Registry,
) -> Result<Value, Error> {
    let decoder = Decoder::new(SliceSource { data, offset: 0 }, opts, Some(registry));
    let (value, consumed) = run(decoder)?;
    if consumed != data.len() {
        return Err(Error::TrailingData);
    }
    Ok(value)
}

/// Decodes a single data item from the front of `data`, returning it along
/// with the number of bytes consumed.
pub fn parse_prefix(data: &[u8]) -> Result<(Value, usize), Error> {
    parse_prefix_with(data, &Options::default())
}

pub fn parse_prefix_with(data: &[u8], opts: &Options) -> Result<(Value, usize), Error> {
    run(Decoder::new(SliceSource { data, offset: 0 }, opts, None))
}

/// Reads exactly one data item from a stream.
pub fn read<R: Read>(reader: R, opts: &Options) -> Result<Value, Error> {
    run(Decoder::new(
        ReaderSource {
            inner: reader,
            consumed: 0,
        },
        opts,
        None,
    ))
    .map(|(value, _)| value)
}

fn run<S: Source>(mut decoder: Decoder<'_, S>) -> Result<(Value, usize), Error> {
    let value = decoder.item(None)?;
    decoder.finish(value)
}
