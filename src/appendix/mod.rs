//! The `Appendix` sum type and its shared contract (§4.1).
//!
//! Closed, tagged-union dispatch over the concrete kinds rather than open
//! inheritance (§9): the node's transaction parser matches on an appendix
//! flag, not a virtual call.

pub mod encrypted_message;
pub mod plain_message;
pub mod prunable_encrypted_message;
pub mod public_key_announcement;

pub use encrypted_message::{
    EncryptedMessage, EncryptToSelfMessage, EncryptedMessageKind, UnsealedEncryptToSelfMessage,
    UnsealedEncryptedMessage,
};
pub use plain_message::PlainMessage;
pub use prunable_encrypted_message::{PrunableEncryptedMessage, UnsealedPrunableEncryptedMessage};
pub use public_key_announcement::PublicKeyAnnouncement;

use crate::account::AccountStore;
use crate::buffer::Writer;
use crate::context::ChainContext;
use crate::error::AppendixError;
use crate::prunable_store::PrunableStore;
use crate::transaction::TransactionContext;

/// Extra, appendix-set-level facts a single appendix can't determine about
/// itself — currently only whether a sibling `EncryptedMessage` conflicts
/// with a `PrunableEncryptedMessage` on the same transaction (§4.6).
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationContext {
    pub sibling_has_encrypted_message: bool,
}

/// Result of [`Appendix::parse_json_attachment`]: an attachment may carry a
/// sealed appendix, an unsealed draft awaiting `seal()`, or nothing of the
/// kinds this subsystem knows about.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonAttachment {
    None,
    Sealed(Appendix),
    Draft(AppendixDraft),
}

/// The closed set of construction-time draft kinds (§9).
#[derive(Debug, Clone, PartialEq)]
pub enum AppendixDraft {
    EncryptedMessage(UnsealedEncryptedMessage),
    EncryptToSelfMessage(UnsealedEncryptToSelfMessage),
    PrunableEncryptedMessage(UnsealedPrunableEncryptedMessage),
}

/// The closed set of appendix kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Appendix {
    PlainMessage(PlainMessage),
    PublicKeyAnnouncement(PublicKeyAnnouncement),
    EncryptedMessage(EncryptedMessage),
    EncryptToSelfMessage(EncryptToSelfMessage),
    PrunableEncryptedMessage(PrunableEncryptedMessage),
}

impl Appendix {
    pub fn version(&self) -> u8 {
        match self {
            Appendix::PlainMessage(a) => a.version(),
            Appendix::PublicKeyAnnouncement(a) => a.version(),
            Appendix::EncryptedMessage(a) => a.version(),
            Appendix::EncryptToSelfMessage(a) => a.version(),
            Appendix::PrunableEncryptedMessage(a) => a.version(),
        }
    }

    /// On-wire byte count, excluding any pruned payload.
    pub fn size(&self) -> usize {
        match self {
            Appendix::PlainMessage(a) => a.size(),
            Appendix::PublicKeyAnnouncement(a) => a.size(),
            Appendix::EncryptedMessage(a) => a.size(),
            Appendix::EncryptToSelfMessage(a) => a.size(),
            Appendix::PrunableEncryptedMessage(a) => a.size(),
        }
    }

    /// Byte count including any currently-held prunable payload.
    pub fn full_size(&self) -> usize {
        match self {
            Appendix::PrunableEncryptedMessage(a) => 32 + a.full_size(),
            other => other.size(),
        }
    }

    /// Writes the version byte (only when `version() > 0`) followed by the
    /// body. `txVersion == 0 ⟺ appendixVersion == 0` is the caller's
    /// responsibility to enforce when constructing the appendix (§3).
    pub fn write_binary(&self, buf: &mut Vec<u8>) -> Result<(), AppendixError> {
        if self.version() > 0 {
            let mut w = Writer::new(buf);
            w.put_u8(self.version());
        }
        let mut w = Writer::new(buf);
        match self {
            Appendix::PlainMessage(a) => a.write_body(&mut w),
            Appendix::PublicKeyAnnouncement(a) => {
                a.write_body(&mut w);
                Ok(())
            }
            Appendix::EncryptedMessage(a) => a.write_body(&mut w),
            Appendix::EncryptToSelfMessage(a) => a.write_body(&mut w),
            Appendix::PrunableEncryptedMessage(a) => {
                a.write_body(&mut w);
                Ok(())
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Appendix::PlainMessage(a) => a.to_json(),
            Appendix::PublicKeyAnnouncement(a) => a.to_json(),
            Appendix::EncryptedMessage(a) => a.to_json(),
            Appendix::EncryptToSelfMessage(a) => a.to_json(),
            Appendix::PrunableEncryptedMessage(a) => a.to_json(),
        }
    }

    /// Parses one appendix from a transaction attachment's JSON object.
    /// Presence is keyed off `"version.<AppendixName>"` (§4.2); absence of
    /// every known key means "not attached", not an error, so the caller
    /// inspects `Ok(None)` rather than matching on an error variant.
    pub fn from_json(root: &serde_json::Value) -> Result<Option<Self>, AppendixError> {
        let version_of = |key: &str| -> Option<u8> {
            root.get(key).and_then(|v| v.as_u64()).map(|v| v as u8)
        };

        if let Some(version) = version_of("version.Message") {
            let message = root
                .get("message")
                .and_then(|v| v.as_str())
                .ok_or_else(|| AppendixError::NotValid("missing message".to_string()))?;
            let is_text = root
                .get("messageIsText")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            return Ok(Some(Appendix::PlainMessage(plain_message::PlainMessage::from_json(
                message, is_text, version,
            )?)));
        }

        if let Some(version) = version_of("version.PublicKeyAnnouncement") {
            let key_hex = root
                .get("recipientPublicKey")
                .and_then(|v| v.as_str())
                .ok_or_else(|| AppendixError::NotValid("missing recipientPublicKey".to_string()))?;
            return Ok(Some(Appendix::PublicKeyAnnouncement(
                public_key_announcement::PublicKeyAnnouncement::from_json(key_hex, version)?,
            )));
        }

        if let Some(version) = version_of("version.EncryptedMessage") {
            let obj = root
                .get("encryptedMessage")
                .ok_or_else(|| AppendixError::NotValid("missing encryptedMessage".to_string()))?;
            return Ok(Some(Appendix::EncryptedMessage(EncryptedMessage::from_json(
                obj, version,
            )?)));
        }

        if let Some(version) = version_of("version.EncryptToSelfMessage") {
            let obj = root
                .get("encryptToSelfMessage")
                .ok_or_else(|| AppendixError::NotValid("missing encryptToSelfMessage".to_string()))?;
            return Ok(Some(Appendix::EncryptToSelfMessage(
                EncryptToSelfMessage::from_json(obj, version)?,
            )));
        }

        if let Some(version) = version_of("version.PrunableEncryptedMessage") {
            return Ok(Some(Appendix::PrunableEncryptedMessage(
                PrunableEncryptedMessage::from_json(root, version)?,
            )));
        }

        Ok(None)
    }

    /// Parses a transaction attachment that may carry an unsealed draft
    /// instead of a sealed appendix — the outbound RPC construction path's
    /// entry point (§4.2, §9 "unsealed draft subclasses"). Peer-propagated
    /// transactions are always sealed and should use [`Appendix::from_json`]
    /// directly; this wrapper additionally recognizes the encrypted
    /// kinds' draft shape (`data` absent, `messageToEncrypt` present) before
    /// falling back to sealed parsing.
    pub fn parse_json_attachment(root: &serde_json::Value) -> Result<JsonAttachment, AppendixError> {
        if root.get("version.EncryptedMessage").is_some() {
            if let Some(obj) = root.get("encryptedMessage") {
                let recipient_hex = root
                    .get("recipientPublicKey")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                if let Some(draft) = UnsealedEncryptedMessage::from_json(obj, recipient_hex)? {
                    return Ok(JsonAttachment::Draft(AppendixDraft::EncryptedMessage(draft)));
                }
            }
        }

        if root.get("version.EncryptToSelfMessage").is_some() {
            if let Some(obj) = root.get("encryptToSelfMessage") {
                if let Some(draft) = UnsealedEncryptToSelfMessage::from_json(obj)? {
                    return Ok(JsonAttachment::Draft(AppendixDraft::EncryptToSelfMessage(
                        draft,
                    )));
                }
            }
        }

        if root.get("version.PrunableEncryptedMessage").is_some() {
            if let Some(draft) = UnsealedPrunableEncryptedMessage::from_json(root)? {
                return Ok(JsonAttachment::Draft(
                    AppendixDraft::PrunableEncryptedMessage(draft),
                ));
            }
        }

        match Self::from_json(root)? {
            Some(appendix) => Ok(JsonAttachment::Sealed(appendix)),
            None => Ok(JsonAttachment::None),
        }
    }

    /// Phased execution is a feature of the wider system; this subsystem
    /// never defers its own effects (§4.1).
    pub fn is_phased(&self, _tx: &TransactionContext) -> bool {
        false
    }

    /// The fee schedule currently in effect. `next_fee_height`/`next_fee`
    /// default to "no change scheduled" and are only overridden by a kind
    /// that has one (none do, in this subsystem today).
    pub fn baseline_fee_height(&self) -> i32 {
        0
    }

    pub fn baseline_fee(&self, ctx: &ChainContext) -> Option<u64> {
        match self {
            Appendix::PlainMessage(a) => a.baseline_fee(ctx),
            Appendix::PublicKeyAnnouncement(a) => a.baseline_fee(),
            Appendix::EncryptedMessage(a) => a.baseline_fee(ctx),
            Appendix::EncryptToSelfMessage(a) => a.baseline_fee(ctx),
            Appendix::PrunableEncryptedMessage(a) => a.baseline_fee(ctx),
        }
    }

    pub fn next_fee_height(&self) -> i32 {
        i32::MAX
    }

    pub fn next_fee(&self, ctx: &ChainContext) -> Option<u64> {
        self.baseline_fee(ctx)
    }

    pub fn validate(
        &self,
        tx: &TransactionContext,
        ctx: &ChainContext,
        accounts: &dyn AccountStore,
        vctx: ValidationContext,
    ) -> Result<(), AppendixError> {
        match self {
            Appendix::PlainMessage(a) => a.validate(tx),
            Appendix::PublicKeyAnnouncement(a) => a.validate(tx, accounts),
            Appendix::EncryptedMessage(a) => a.validate(tx, ctx),
            Appendix::EncryptToSelfMessage(a) => a.validate(tx, ctx),
            Appendix::PrunableEncryptedMessage(a) => {
                a.validate(tx, ctx, vctx.sibling_has_encrypted_message)
            }
        }
    }

    /// Re-validates at the same semantics as [`Appendix::validate`]; under
    /// phased execution this would run at a different point in the
    /// transaction's lifecycle, but phasing is out of scope here (§4.8).
    pub fn validate_at_finish(
        &self,
        tx: &TransactionContext,
        ctx: &ChainContext,
        accounts: &dyn AccountStore,
        vctx: ValidationContext,
    ) -> Result<(), AppendixError> {
        self.validate(tx, ctx, accounts, vctx)
    }

    pub fn apply(
        &self,
        tx: &TransactionContext,
        ctx: &ChainContext,
        accounts: &dyn AccountStore,
        prunable: &dyn PrunableStore,
    ) -> Result<(), AppendixError> {
        match self {
            Appendix::PlainMessage(a) => {
                a.apply();
                Ok(())
            }
            Appendix::PublicKeyAnnouncement(a) => a.apply(tx, accounts),
            Appendix::EncryptedMessage(a) => {
                a.apply();
                Ok(())
            }
            Appendix::EncryptToSelfMessage(a) => {
                a.apply();
                Ok(())
            }
            Appendix::PrunableEncryptedMessage(a) => a.apply(tx, ctx, prunable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::InMemoryAccountStore;
    use crate::buffer::Reader;
    use crate::prunable_store::InMemoryPrunableStore;

    #[test]
    fn invariant_1_binary_round_trip_plain_message() {
        let appendix = Appendix::PlainMessage(PlainMessage::new(b"hi".to_vec(), true, 1).unwrap());
        let mut bytes = Vec::new();
        appendix.write_binary(&mut bytes).unwrap();

        // First byte is the version, since version > 0.
        assert_eq!(bytes[0], 1);
        let mut r = Reader::new(&bytes[1..]);
        let parsed = Appendix::PlainMessage(PlainMessage::parse(&mut r, 1).unwrap());
        assert_eq!(parsed, appendix);
    }

    #[test]
    fn invariant_3_size_matches_bytes_written() {
        let appendix =
            Appendix::PlainMessage(PlainMessage::new(b"hello".to_vec(), true, 1).unwrap());
        let mut bytes = Vec::new();
        appendix.write_binary(&mut bytes).unwrap();
        // size() excludes the leading version byte by definition (§4.1's
        // `size()` is the body's own byte count).
        assert_eq!(bytes.len(), 1 + appendix.size());
    }

    #[test]
    fn version_zero_omits_header_byte() {
        let appendix = Appendix::PlainMessage(PlainMessage::new(b"hi".to_vec(), true, 0).unwrap());
        let mut bytes = Vec::new();
        appendix.write_binary(&mut bytes).unwrap();
        assert_eq!(bytes.len(), appendix.size());
    }

    #[test]
    fn is_phased_is_always_false() {
        let appendix = Appendix::PlainMessage(PlainMessage::new(vec![], false, 1).unwrap());
        let tx = TransactionContext {
            id: 1,
            version: 1,
            recipient_id: 1,
            timestamp: 0,
        };
        assert!(!appendix.is_phased(&tx));
    }

    #[test]
    fn dispatch_validate_and_apply_for_public_key_announcement() {
        use x25519_dalek::{PublicKey, StaticSecret};

        let secret = StaticSecret::from([21u8; 32]);
        let key = *PublicKey::from(&secret).as_bytes();
        let recipient_id = crate::crypto::account_id_from_key(&key);

        let appendix = Appendix::PublicKeyAnnouncement(PublicKeyAnnouncement::new(key, 1));
        let tx = TransactionContext {
            id: 1,
            version: 1,
            recipient_id,
            timestamp: 0,
        };
        let ctx = ChainContext::default();
        let accounts = InMemoryAccountStore::new();
        let prunable = InMemoryPrunableStore::new();

        appendix
            .validate(&tx, &ctx, &accounts, ValidationContext::default())
            .unwrap();
        appendix.apply(&tx, &ctx, &accounts, &prunable).unwrap();
        assert_eq!(accounts.get_public_key(recipient_id), Some(key));
    }

    #[test]
    fn from_json_dispatches_on_version_key() {
        let appendix = Appendix::PlainMessage(PlainMessage::new(b"hi".to_vec(), true, 1).unwrap());
        let json = appendix.to_json();
        let parsed = Appendix::from_json(&json).unwrap().unwrap();
        assert_eq!(parsed, appendix);
    }

    #[test]
    fn from_json_returns_none_for_unrelated_object() {
        let json = serde_json::json!({"unrelatedField": 1});
        assert!(Appendix::from_json(&json).unwrap().is_none());
    }

    #[test]
    fn from_json_round_trips_prunable_encrypted_message() {
        use crate::encrypted_data::EncryptedData;
        let payload = EncryptedData {
            data: vec![9, 8, 7],
            nonce: [2u8; 32],
            is_text: false,
            is_compressed: true,
        };
        let appendix = Appendix::PrunableEncryptedMessage(PrunableEncryptedMessage::sealed(payload, 1));
        let json = appendix.to_json();
        let parsed = Appendix::from_json(&json).unwrap().unwrap();
        assert_eq!(parsed, appendix);
    }

    #[test]
    fn full_size_includes_prunable_payload_when_present() {
        use crate::encrypted_data::EncryptedData;

        let payload = EncryptedData {
            data: vec![1, 2, 3],
            nonce: [1u8; 32],
            is_text: false,
            is_compressed: true,
        };
        let sealed = PrunableEncryptedMessage::sealed(payload, 1);
        let appendix = Appendix::PrunableEncryptedMessage(sealed);
        assert_eq!(appendix.size(), 32);
        assert_eq!(appendix.full_size(), 32 + 3 + 32);
    }

    #[test]
    fn parse_json_attachment_recognizes_unsealed_encrypted_message_draft() {
        use x25519_dalek::{PublicKey, StaticSecret};
        let recipient_public = *PublicKey::from(&StaticSecret::from([9u8; 32])).as_bytes();
        let root = serde_json::json!({
            "version.EncryptedMessage": 1,
            "recipientPublicKey": hex::encode(recipient_public),
            "encryptedMessage": {
                "messageToEncrypt": hex::encode(b"hi"),
                "isText": true,
            },
        });
        match Appendix::parse_json_attachment(&root).unwrap() {
            JsonAttachment::Draft(AppendixDraft::EncryptedMessage(_)) => {}
            other => panic!("expected an unsealed EncryptedMessage draft, got {other:?}"),
        }
    }

    #[test]
    fn parse_json_attachment_falls_back_to_sealed_form() {
        let appendix = Appendix::EncryptedMessage(EncryptedMessage::new(
            crate::encrypted_data::EncryptedData {
                data: vec![1, 2, 3],
                nonce: [1u8; 32],
                is_text: false,
                is_compressed: true,
            },
            1,
        ));
        let json = appendix.to_json();
        match Appendix::parse_json_attachment(&json).unwrap() {
            JsonAttachment::Sealed(parsed) => assert_eq!(parsed, appendix),
            other => panic!("expected a sealed appendix, got {other:?}"),
        }
    }

    #[test]
    fn parse_json_attachment_returns_none_for_unrelated_object() {
        let json = serde_json::json!({"unrelatedField": 1});
        assert_eq!(
            Appendix::parse_json_attachment(&json).unwrap(),
            JsonAttachment::None
        );
    }
}
