//! The encrypted payload value type shared by `EncryptedMessage`,
//! `EncryptToSelfMessage`, and `PrunableEncryptedMessage`.

use crate::buffer::{pack_length_header, unpack_length_header, Reader, Writer};
use crate::error::AppendixError;

/// An opaque `(ciphertext, nonce)` pair with its own wire contract:
/// `int32 lengthHeader` (sign bit = `isText`), `data`, then a 32-byte nonce
/// — or a zero-length nonce only when `data` is empty (the pruned form).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    pub data: Vec<u8>,
    pub nonce: [u8; 32],
    pub is_text: bool,
    pub is_compressed: bool,
}

impl EncryptedData {
    /// `nonce.len() == 32 && data.len() > 0`, or `nonce.len() == 0 &&
    /// data.len() == 0` (pruned form). Since `nonce` is a fixed-size array
    /// here, the pruned form is represented by an all-zero nonce alongside
    /// empty data; callers constructing a pruned placeholder should use
    /// [`EncryptedData::empty`].
    pub fn empty(is_text: bool, is_compressed: bool) -> Self {
        Self {
            data: Vec::new(),
            nonce: [0u8; 32],
            is_text,
            is_compressed,
        }
    }

    pub fn is_pruned(&self) -> bool {
        self.data.is_empty() && self.nonce == [0u8; 32]
    }

    /// On-wire byte count: 4 (length header) + data + 32 (nonce), or 4 when
    /// pruned (no nonce on the wire in that case).
    pub fn size(&self) -> usize {
        if self.is_pruned() {
            4
        } else {
            4 + self.data.len() + 32
        }
    }

    pub fn write_binary(&self, w: &mut Writer) -> Result<(), AppendixError> {
        let header = pack_length_header(self.data.len() as u32, self.is_text)?;
        w.put_i32_le(header);
        if !self.is_pruned() {
            w.put_bytes(&self.data);
            w.put_bytes(&self.nonce);
        }
        Ok(())
    }

    pub fn parse(r: &mut Reader, is_compressed: bool) -> Result<Self, AppendixError> {
        let header = r.get_i32_le()?;
        let (len, is_text) = unpack_length_header(header);
        let len = len as usize;
        if len == 0 {
            return Ok(Self::empty(is_text, is_compressed));
        }
        let data = r.get_bytes(len)?.to_vec();
        let nonce_bytes = r.get_bytes(32)?;
        let nonce: [u8; 32] = nonce_bytes.try_into().unwrap();
        Ok(Self {
            data,
            nonce,
            is_text,
            is_compressed,
        })
    }
}
