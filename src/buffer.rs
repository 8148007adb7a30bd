//! Positional byte buffer primitives for appendix wire encoding.
//!
//! Mirrors a Java-style `ByteBuffer`: a writer that only ever appends, and a
//! reader that advances a cursor and refuses to read past the end. All
//! multi-byte integers are little-endian, matching the on-wire contract in
//! the appendix data model.

use crate::error::AppendixError;

/// Appends bytes to an owned buffer. Never reads back what it has written.
pub struct Writer<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> Writer<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        Self { buf }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_i32_le(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

/// Reads from a borrowed byte slice, advancing a cursor. Bounds violations
/// are permanent (`NotValid`) rather than panics, since the input comes
/// straight off the wire.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn get_u8(&mut self) -> Result<u8, AppendixError> {
        let bytes = self.take(1)?;
        Ok(bytes[0])
    }

    pub fn get_i32_le(&mut self) -> Result<i32, AppendixError> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn get_bytes(&mut self, len: usize) -> Result<&'a [u8], AppendixError> {
        self.take(len)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], AppendixError> {
        if len > self.remaining() {
            return Err(AppendixError::NotValid(format!(
                "buffer underflow: requested {len} bytes, {} remaining",
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}

/// `isText ⇒ bytes decode as UTF-8 and re-encode to the identical bytes`.
///
/// `str::from_utf8` already rejects overlong/non-shortest encodings, so a
/// successful parse is itself the canonicalization proof: the parsed `str`'s
/// `as_bytes()` is always the original slice.
pub fn is_canonical_text(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes)
        .map(|s| s.as_bytes() == bytes)
        .unwrap_or(false)
}

/// Packs a 31-bit length and an `isText` flag into the sign bit of an int32
/// length header, the on-wire format `PlainMessage` and the encrypted
/// message families share.
pub fn pack_length_header(len: u32, is_text: bool) -> Result<i32, AppendixError> {
    if len > 0x7FFF_FFFF {
        return Err(AppendixError::NotValid(format!(
            "length {len} does not fit in a 31-bit header"
        )));
    }
    let header = if is_text { len | 0x8000_0000 } else { len };
    Ok(header as i32)
}

/// Inverse of [`pack_length_header`]: `(length, isText)`.
pub fn unpack_length_header(header: i32) -> (u32, bool) {
    let raw = header as u32;
    (raw & 0x7FFF_FFFF, raw & 0x8000_0000 != 0)
}
