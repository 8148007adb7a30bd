//! `PlainMessage`: an unencrypted message attachment.
//!
//! Body: `int32 lengthHeader` (sign bit = `isText`), then `length` bytes.
//! Length must be at most 1000; text messages must be canonical UTF-8.

use serde_json::json;

use crate::buffer::{is_canonical_text, pack_length_header, unpack_length_header, Reader, Writer};
use crate::error::AppendixError;
use crate::fee::Fee;
use crate::transaction::TransactionContext;

pub const MAX_MESSAGE_LENGTH: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainMessage {
    version: u8,
    message: Vec<u8>,
    is_text: bool,
}

impl PlainMessage {
    pub fn new(message: Vec<u8>, is_text: bool, version: u8) -> Result<Self, AppendixError> {
        let appendix = Self {
            version,
            message,
            is_text,
        };
        appendix.check_invariants()?;
        Ok(appendix)
    }

    fn check_invariants(&self) -> Result<(), AppendixError> {
        if self.message.len() > MAX_MESSAGE_LENGTH {
            return Err(AppendixError::NotValid(format!(
                "invalid arbitrary message length: {}",
                self.message.len()
            )));
        }
        if self.is_text && !is_canonical_text(&self.message) {
            return Err(AppendixError::NotValid(
                "Message is not UTF-8 text".to_string(),
            ));
        }
        Ok(())
    }

    pub fn parse(r: &mut Reader, version: u8) -> Result<Self, AppendixError> {
        let header = r.get_i32_le()?;
        let (len, is_text) = unpack_length_header(header);
        let message = r.get_bytes(len as usize)?.to_vec();
        Self::new(message, is_text, version)
    }

    pub fn from_json(
        message_hex_or_text: &str,
        is_text: bool,
        version: u8,
    ) -> Result<Self, AppendixError> {
        let bytes = if is_text {
            message_hex_or_text.as_bytes().to_vec()
        } else {
            hex::decode(message_hex_or_text)
                .map_err(|e| AppendixError::NotValid(format!("invalid message hex: {e}")))?
        };
        Self::new(bytes, is_text, version)
    }

    pub fn message(&self) -> &[u8] {
        &self.message
    }

    pub fn is_text(&self) -> bool {
        self.is_text
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn size(&self) -> usize {
        4 + self.message.len()
    }

    pub fn write_body(&self, w: &mut Writer) -> Result<(), AppendixError> {
        let header = pack_length_header(self.message.len() as u32, self.is_text)?;
        w.put_i32_le(header);
        w.put_bytes(&self.message);
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Value {
        let message = if self.is_text {
            json!(String::from_utf8(self.message.clone()).expect("checked canonical on construction"))
        } else {
            json!(hex::encode(&self.message))
        };
        json!({
            "version.Message": self.version,
            "message": message,
            "messageIsText": self.is_text,
        })
    }

    pub fn fee_schedule(&self, ctx: &crate::context::ChainContext) -> Fee {
        Fee::size_based(0, ctx.one_spa, 32)
    }

    pub fn baseline_fee(&self, ctx: &crate::context::ChainContext) -> Option<u64> {
        self.fee_schedule(ctx).evaluate(self.message.len() as u64)
    }

    /// No consensus-state mutation on apply; kept for dispatch symmetry.
    pub fn validate(&self, _tx: &TransactionContext) -> Result<(), AppendixError> {
        self.check_invariants()
    }

    pub fn apply(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_plain_message_text_hi_wire_format() {
        let msg = PlainMessage::new(b"hi".to_vec(), true, 1).unwrap();
        let mut bytes = vec![1u8]; // version byte written by the enclosing Appendix
        let mut w = Writer::new(&mut bytes);
        msg.write_body(&mut w).unwrap();
        assert_eq!(bytes, vec![0x01, 0x02, 0x00, 0x00, 0x80, 0x68, 0x69]);
    }

    #[test]
    fn round_trips_through_binary() {
        let msg = PlainMessage::new(b"hello world".to_vec(), true, 1).unwrap();
        let mut bytes = Vec::new();
        {
            let mut w = Writer::new(&mut bytes);
            msg.write_body(&mut w).unwrap();
        }
        assert_eq!(bytes.len(), msg.size());
        let mut r = Reader::new(&bytes);
        let parsed = PlainMessage::parse(&mut r, 1).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn s2_oversize_message_is_not_valid() {
        let oversized = vec![0x41u8; MAX_MESSAGE_LENGTH + 1];
        let err = PlainMessage::new(oversized, false, 1).unwrap_err();
        assert!(matches!(err, AppendixError::NotValid(msg) if msg.contains("length")));
    }

    #[test]
    fn s3_non_utf8_text_is_not_valid() {
        let err = PlainMessage::new(vec![0xC3, 0x28], true, 1).unwrap_err();
        assert_eq!(
            err,
            AppendixError::NotValid("Message is not UTF-8 text".to_string())
        );
    }

    #[test]
    fn binary_message_skips_utf8_check() {
        assert!(PlainMessage::new(vec![0xC3, 0x28], false, 1).is_ok());
    }

    #[test]
    fn fee_is_zero_for_empty_message() {
        let ctx = crate::context::ChainContext::default();
        let msg = PlainMessage::new(vec![], false, 1).unwrap();
        assert_eq!(msg.baseline_fee(&ctx), Some(0));
    }

    #[test]
    fn json_round_trip_for_text_message() {
        let msg = PlainMessage::new(b"hi".to_vec(), true, 1).unwrap();
        let json = msg.to_json();
        assert_eq!(json["message"], "hi");
        assert_eq!(json["messageIsText"], true);
        let parsed = PlainMessage::from_json("hi", true, 1).unwrap();
        assert_eq!(parsed, msg);
    }
}
