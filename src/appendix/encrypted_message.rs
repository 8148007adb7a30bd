//! `EncryptedMessage` and `EncryptToSelfMessage`: ciphertext addressed to
//! the transaction recipient, or back to the sender themselves.
//!
//! Both kinds share the same wire body and fee schedule; they differ only
//! in their JSON key, appendix name, and whether a recipient is required.
//! Modeled as one shared sealed type plus two thin, differently-named
//! wrappers, per the "tagged dispatch, not open inheritance" design note.

use serde_json::json;

use crate::buffer::{Reader, Writer};
use crate::context::ChainContext;
use crate::crypto::EncryptionProvider;
use crate::encrypted_data::EncryptedData;
use crate::error::AppendixError;
use crate::fee::Fee;
use crate::transaction::TransactionContext;
use x25519_dalek::{PublicKey, StaticSecret};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptedMessageKind {
    ToRecipient,
    ToSelf,
}

impl EncryptedMessageKind {
    fn appendix_name(self) -> &'static str {
        match self {
            EncryptedMessageKind::ToRecipient => "EncryptedMessage",
            EncryptedMessageKind::ToSelf => "EncryptToSelfMessage",
        }
    }

    fn json_key(self) -> &'static str {
        match self {
            EncryptedMessageKind::ToRecipient => "encryptedMessage",
            EncryptedMessageKind::ToSelf => "encryptToSelfMessage",
        }
    }
}

/// Maps the on-wire version byte to the compression flag: `1 ⇔ isCompressed`,
/// `2 ⇔ ¬isCompressed`. Version 0 (legacy, tx version 0) carries no
/// independent compression bit on the wire; this family always compressed
/// messages before the version byte existed, so it defaults to `true`.
fn is_compressed_for_version(version: u8) -> Option<bool> {
    match version {
        0 => Some(true),
        1 => Some(true),
        2 => Some(false),
        _ => None,
    }
}

fn version_for_compression(is_compressed: bool) -> u8 {
    if is_compressed {
        1
    } else {
        2
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SealedEncryptedMessage {
    kind: EncryptedMessageKind,
    version: u8,
    payload: EncryptedData,
}

impl SealedEncryptedMessage {
    fn new(kind: EncryptedMessageKind, payload: EncryptedData, version: u8) -> Self {
        Self {
            kind,
            version,
            payload,
        }
    }

    fn parse(kind: EncryptedMessageKind, r: &mut Reader, version: u8) -> Result<Self, AppendixError> {
        let is_compressed = is_compressed_for_version(version).ok_or_else(|| {
            AppendixError::NotValid(format!("unsupported {} version {version}", kind.appendix_name()))
        })?;
        let payload = EncryptedData::parse(r, is_compressed)?;
        Ok(Self::new(kind, payload, version))
    }

    fn from_json(
        kind: EncryptedMessageKind,
        obj: &serde_json::Value,
        version: u8,
    ) -> Result<Self, AppendixError> {
        let field = |name: &str| -> Result<&str, AppendixError> {
            obj.get(name)
                .and_then(|v| v.as_str())
                .ok_or_else(|| AppendixError::NotValid(format!("{} missing field {name}", kind.json_key())))
        };
        let data = hex::decode(field("data")?)
            .map_err(|e| AppendixError::NotValid(format!("invalid encrypted data hex: {e}")))?;
        let nonce_bytes = hex::decode(field("nonce")?)
            .map_err(|e| AppendixError::NotValid(format!("invalid nonce hex: {e}")))?;
        let nonce: [u8; 32] = nonce_bytes
            .try_into()
            .map_err(|_| AppendixError::NotValid("nonce must be 32 bytes".to_string()))?;
        let is_text = obj
            .get("isText")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let is_compressed = obj
            .get("isCompressed")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        Ok(Self::new(
            kind,
            EncryptedData {
                data,
                nonce,
                is_text,
                is_compressed,
            },
            version,
        ))
    }

    fn size(&self) -> usize {
        self.payload.size()
    }

    fn write_body(&self, w: &mut Writer) -> Result<(), AppendixError> {
        self.payload.write_binary(w)
    }

    fn to_json(&self) -> serde_json::Value {
        json!({
            format!("version.{}", self.kind.appendix_name()): self.version,
            self.kind.json_key(): {
                "data": hex::encode(&self.payload.data),
                "nonce": hex::encode(self.payload.nonce),
                "isText": self.payload.is_text,
                "isCompressed": self.payload.is_compressed,
            },
        })
    }

    fn fee_schedule(&self, ctx: &ChainContext) -> Fee {
        Fee::size_based(ctx.one_spa, ctx.one_spa, 32)
    }

    fn baseline_fee(&self, ctx: &ChainContext) -> Option<u64> {
        let effective = self.payload.data.len().saturating_sub(16) as u64;
        self.fee_schedule(ctx).evaluate(effective)
    }

    fn validate(&self, tx: &TransactionContext, ctx: &ChainContext) -> Result<(), AppendixError> {
        if !ctx.is_active(ctx.shuffling_block) {
            return Ok(());
        }
        if self.payload.data.len() > ctx.max_encrypted_message_length {
            return Err(AppendixError::NotValid(format!(
                "invalid encrypted message length: {}",
                self.payload.data.len()
            )));
        }
        if self.payload.data.is_empty() != (self.payload.nonce == [0u8; 32]) {
            return Err(AppendixError::NotValid(
                "encrypted message data/nonce length mismatch".to_string(),
            ));
        }
        match is_compressed_for_version(self.version) {
            Some(expected) if expected == self.payload.is_compressed => {}
            _ => {
                return Err(AppendixError::NotValid(format!(
                    "version {} inconsistent with isCompressed={}",
                    self.version, self.payload.is_compressed
                )))
            }
        }
        if matches!(self.kind, EncryptedMessageKind::ToRecipient) && !tx.has_recipient() {
            return Err(AppendixError::NotValid(
                "EncryptedMessage requires recipientId".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sealed ciphertext addressed to the transaction's recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedMessage(SealedEncryptedMessage);

impl EncryptedMessage {
    pub fn new(payload: EncryptedData, version: u8) -> Self {
        Self(SealedEncryptedMessage::new(
            EncryptedMessageKind::ToRecipient,
            payload,
            version,
        ))
    }

    pub fn parse(r: &mut Reader, version: u8) -> Result<Self, AppendixError> {
        Ok(Self(SealedEncryptedMessage::parse(
            EncryptedMessageKind::ToRecipient,
            r,
            version,
        )?))
    }

    /// Parses the `"encryptedMessage"` object of a JSON attachment (§4.2).
    pub fn from_json(obj: &serde_json::Value, version: u8) -> Result<Self, AppendixError> {
        Ok(Self(SealedEncryptedMessage::from_json(
            EncryptedMessageKind::ToRecipient,
            obj,
            version,
        )?))
    }

    pub fn payload(&self) -> &EncryptedData {
        &self.0.payload
    }

    pub fn version(&self) -> u8 {
        self.0.version
    }

    pub fn size(&self) -> usize {
        self.0.size()
    }

    pub fn write_body(&self, w: &mut Writer) -> Result<(), AppendixError> {
        self.0.write_body(w)
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.0.to_json()
    }

    pub fn baseline_fee(&self, ctx: &ChainContext) -> Option<u64> {
        self.0.baseline_fee(ctx)
    }

    pub fn validate(&self, tx: &TransactionContext, ctx: &ChainContext) -> Result<(), AppendixError> {
        self.0.validate(tx, ctx)
    }

    pub fn apply(&self) {}
}

/// Sealed ciphertext the sender encrypted to their own public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptToSelfMessage(SealedEncryptedMessage);

impl EncryptToSelfMessage {
    pub fn new(payload: EncryptedData, version: u8) -> Self {
        Self(SealedEncryptedMessage::new(
            EncryptedMessageKind::ToSelf,
            payload,
            version,
        ))
    }

    pub fn parse(r: &mut Reader, version: u8) -> Result<Self, AppendixError> {
        Ok(Self(SealedEncryptedMessage::parse(
            EncryptedMessageKind::ToSelf,
            r,
            version,
        )?))
    }

    /// Parses the `"encryptToSelfMessage"` object of a JSON attachment (§4.2).
    pub fn from_json(obj: &serde_json::Value, version: u8) -> Result<Self, AppendixError> {
        Ok(Self(SealedEncryptedMessage::from_json(
            EncryptedMessageKind::ToSelf,
            obj,
            version,
        )?))
    }

    pub fn payload(&self) -> &EncryptedData {
        &self.0.payload
    }

    pub fn version(&self) -> u8 {
        self.0.version
    }

    pub fn size(&self) -> usize {
        self.0.size()
    }

    pub fn write_body(&self, w: &mut Writer) -> Result<(), AppendixError> {
        self.0.write_body(w)
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.0.to_json()
    }

    pub fn baseline_fee(&self, ctx: &ChainContext) -> Option<u64> {
        self.0.baseline_fee(ctx)
    }

    pub fn validate(&self, tx: &TransactionContext, ctx: &ChainContext) -> Result<(), AppendixError> {
        self.0.validate(tx, ctx)
    }

    pub fn apply(&self) {}
}

/// A construction-time draft: plaintext plus the recipient's public key,
/// held until [`UnsealedEncryptedMessage::seal`] is called exactly once.
/// Serialization and `apply` before sealing raise [`AppendixError::NotYetEncrypted`].
#[derive(Debug, Clone, PartialEq)]
pub struct UnsealedEncryptedMessage {
    message_to_encrypt: Vec<u8>,
    recipient_public_key: [u8; 32],
    is_text: bool,
    is_compressed: bool,
}

impl UnsealedEncryptedMessage {
    pub fn new(
        message_to_encrypt: Vec<u8>,
        recipient_public_key: [u8; 32],
        is_text: bool,
        is_compressed: bool,
    ) -> Self {
        Self {
            message_to_encrypt,
            recipient_public_key,
            is_text,
            is_compressed,
        }
    }

    /// Detects and parses an unsealed draft from the `"encryptedMessage"`
    /// object plus the attachment root's `"recipientPublicKey"` field
    /// (§4.2): a draft is present when `data` is absent but
    /// `messageToEncrypt` is present; `Ok(None)` means `obj` is a sealed
    /// message instead (or neither field is present).
    pub fn from_json(
        obj: &serde_json::Value,
        recipient_public_key_hex: &str,
    ) -> Result<Option<Self>, AppendixError> {
        if obj.get("data").is_some() {
            return Ok(None);
        }
        let message_hex = match obj.get("messageToEncrypt").and_then(|v| v.as_str()) {
            Some(s) => s,
            None => return Ok(None),
        };
        let message_to_encrypt = hex::decode(message_hex)
            .map_err(|e| AppendixError::NotValid(format!("invalid messageToEncrypt hex: {e}")))?;
        let is_text = obj.get("isText").and_then(|v| v.as_bool()).unwrap_or(false);
        let is_compressed = obj
            .get("isCompressed")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        let recipient_bytes = hex::decode(recipient_public_key_hex)
            .map_err(|e| AppendixError::NotValid(format!("invalid recipientPublicKey hex: {e}")))?;
        let recipient_public_key: [u8; 32] = recipient_bytes.try_into().map_err(|_| {
            AppendixError::NotValid("recipientPublicKey must be 32 bytes".to_string())
        })?;
        Ok(Some(Self::new(
            message_to_encrypt,
            recipient_public_key,
            is_text,
            is_compressed,
        )))
    }

    /// Fee-sizing helper for drafts: the predicted ciphertext length before
    /// `seal` has actually run.
    pub fn predicted_size(&self, provider: &dyn EncryptionProvider) -> usize {
        4 + provider.encrypted_data_length(self.message_to_encrypt.len()) as usize + 32
    }

    pub fn seal(
        self,
        sender_secret: &[u8; 32],
        provider: &dyn EncryptionProvider,
    ) -> EncryptedMessage {
        let (ciphertext, nonce) =
            provider.encrypt(&self.message_to_encrypt, sender_secret, &self.recipient_public_key);
        let payload = EncryptedData {
            data: ciphertext,
            nonce,
            is_text: self.is_text,
            is_compressed: self.is_compressed,
        };
        EncryptedMessage::new(payload, version_for_compression(self.is_compressed))
    }
}

/// Draft variant of [`EncryptToSelfMessage`]: the recipient key is derived
/// from the sender's own secret rather than supplied externally.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsealedEncryptToSelfMessage {
    message_to_encrypt: Vec<u8>,
    is_text: bool,
    is_compressed: bool,
}

impl UnsealedEncryptToSelfMessage {
    pub fn new(message_to_encrypt: Vec<u8>, is_text: bool, is_compressed: bool) -> Self {
        Self {
            message_to_encrypt,
            is_text,
            is_compressed,
        }
    }

    /// Same detection rule as [`UnsealedEncryptedMessage::from_json`], minus
    /// the recipient key (this variant always encrypts to the sender's own
    /// public key, derived at `seal` time).
    pub fn from_json(obj: &serde_json::Value) -> Result<Option<Self>, AppendixError> {
        if obj.get("data").is_some() {
            return Ok(None);
        }
        let message_hex = match obj.get("messageToEncrypt").and_then(|v| v.as_str()) {
            Some(s) => s,
            None => return Ok(None),
        };
        let message_to_encrypt = hex::decode(message_hex)
            .map_err(|e| AppendixError::NotValid(format!("invalid messageToEncrypt hex: {e}")))?;
        let is_text = obj.get("isText").and_then(|v| v.as_bool()).unwrap_or(false);
        let is_compressed = obj
            .get("isCompressed")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        Ok(Some(Self::new(message_to_encrypt, is_text, is_compressed)))
    }

    pub fn seal(
        self,
        sender_secret: &[u8; 32],
        provider: &dyn EncryptionProvider,
    ) -> EncryptToSelfMessage {
        let own_public_key = *PublicKey::from(&StaticSecret::from(*sender_secret)).as_bytes();
        let (ciphertext, nonce) =
            provider.encrypt(&self.message_to_encrypt, sender_secret, &own_public_key);
        let payload = EncryptedData {
            data: ciphertext,
            nonce,
            is_text: self.is_text,
            is_compressed: self.is_compressed,
        };
        EncryptToSelfMessage::new(payload, version_for_compression(self.is_compressed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::X25519EncryptionProvider;

    fn sample_payload() -> EncryptedData {
        EncryptedData {
            data: vec![1, 2, 3, 4, 5],
            nonce: [7u8; 32],
            is_text: false,
            is_compressed: true,
        }
    }

    #[test]
    fn round_trips_through_binary() {
        let msg = EncryptedMessage::new(sample_payload(), 1);
        let mut bytes = Vec::new();
        {
            let mut w = Writer::new(&mut bytes);
            msg.write_body(&mut w).unwrap();
        }
        assert_eq!(bytes.len(), msg.size());
        let mut r = Reader::new(&bytes);
        let parsed = EncryptedMessage::parse(&mut r, 1).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn version_compression_mismatch_is_not_valid() {
        let mut payload = sample_payload();
        payload.is_compressed = false; // version 1 means isCompressed == true
        let msg = EncryptedMessage::new(payload, 1);
        let tx = TransactionContext {
            id: 1,
            version: 1,
            recipient_id: 7,
            timestamp: 0,
        };
        let ctx = ChainContext::default();
        assert!(msg.validate(&tx, &ctx).is_err());
    }

    #[test]
    fn encrypted_message_requires_recipient() {
        let msg = EncryptedMessage::new(sample_payload(), 1);
        let tx = TransactionContext {
            id: 1,
            version: 1,
            recipient_id: 0,
            timestamp: 0,
        };
        let ctx = ChainContext::default();
        assert!(msg.validate(&tx, &ctx).is_err());
    }

    #[test]
    fn encrypt_to_self_does_not_require_recipient() {
        let msg = EncryptToSelfMessage::new(sample_payload(), 1);
        let tx = TransactionContext {
            id: 1,
            version: 1,
            recipient_id: 0,
            timestamp: 0,
        };
        let ctx = ChainContext::default();
        assert!(msg.validate(&tx, &ctx).is_ok());
    }

    #[test]
    fn validation_is_skipped_before_activation_height() {
        let mut payload = sample_payload();
        payload.is_compressed = false; // would otherwise fail the version check
        let msg = EncryptedMessage::new(payload, 1);
        let tx = TransactionContext {
            id: 1,
            version: 1,
            recipient_id: 7,
            timestamp: 0,
        };
        let ctx = ChainContext {
            shuffling_block: 1000,
            height: 0,
            ..ChainContext::default()
        };
        assert!(msg.validate(&tx, &ctx).is_ok());
    }

    #[test]
    fn fee_matches_data_len_minus_overhead() {
        let ctx = ChainContext::default();
        let msg = EncryptedMessage::new(sample_payload(), 1);
        // data.len() == 5, saturating_sub(16) == 0
        assert_eq!(msg.baseline_fee(&ctx), Some(ctx.one_spa));
    }

    #[test]
    fn json_round_trip() {
        let msg = EncryptedMessage::new(sample_payload(), 1);
        let json = msg.to_json();
        let parsed =
            EncryptedMessage::from_json(&json["encryptedMessage"], 1).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn unsealed_draft_seals_into_recoverable_message() {
        let provider = X25519EncryptionProvider;
        let sender_secret = [3u8; 32];
        let recipient_public = *PublicKey::from(&StaticSecret::from([9u8; 32])).as_bytes();
        let draft =
            UnsealedEncryptedMessage::new(b"hi there".to_vec(), recipient_public, true, true);
        let sealed = draft.seal(&sender_secret, &provider);
        assert_eq!(sealed.payload().nonce.len(), 32);
        assert!(!sealed.payload().data.is_empty());
    }

    #[test]
    fn draft_detected_from_message_to_encrypt_field() {
        let recipient_public = *PublicKey::from(&StaticSecret::from([9u8; 32])).as_bytes();
        let obj = serde_json::json!({
            "messageToEncrypt": hex::encode(b"secret"),
            "isText": true,
            "isCompressed": false,
        });
        let draft =
            UnsealedEncryptedMessage::from_json(&obj, &hex::encode(recipient_public))
                .unwrap()
                .expect("data absent, messageToEncrypt present should detect a draft");
        assert_eq!(draft.message_to_encrypt.as_slice(), b"secret");
        assert_eq!(draft.recipient_public_key, recipient_public);
        assert!(draft.is_text);
        assert!(!draft.is_compressed);
    }

    #[test]
    fn sealed_message_is_not_mistaken_for_a_draft() {
        let msg = EncryptedMessage::new(sample_payload(), 1);
        let json = msg.to_json();
        let recipient_public = *PublicKey::from(&StaticSecret::from([9u8; 32])).as_bytes();
        let draft = UnsealedEncryptedMessage::from_json(
            &json["encryptedMessage"],
            &hex::encode(recipient_public),
        )
        .unwrap();
        assert!(draft.is_none());
    }

    #[test]
    fn encrypt_to_self_draft_detected_without_recipient_key() {
        let obj = serde_json::json!({
            "messageToEncrypt": hex::encode(b"note to self"),
            "isText": true,
        });
        let draft = UnsealedEncryptToSelfMessage::from_json(&obj)
            .unwrap()
            .expect("messageToEncrypt present should detect a draft");
        assert_eq!(draft.message_to_encrypt.as_slice(), b"note to self");
        assert!(draft.is_text);
        assert!(draft.is_compressed); // default
    }
}
