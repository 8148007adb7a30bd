//! `PrunableEncryptedMessage`: the wire body is always the 32-byte content
//! hash; the ciphertext itself lives in an external, hash/tx-id-indexed
//! store and may be dropped after `MAX_PRUNABLE_LIFETIME`.

use std::sync::OnceLock;

use serde_json::json;

use crate::buffer::{Reader, Writer};
use crate::context::ChainContext;
use crate::crypto::{prunable_hash, EncryptionProvider};
use crate::encrypted_data::EncryptedData;
use crate::error::AppendixError;
use crate::fee::Fee;
use crate::prunable_store::{PrunableStore, StoredPayload};
use crate::transaction::TransactionContext;
use x25519_dalek::{PublicKey, StaticSecret};

/// Lazily-rehydrated prunable payload. The [`OnceLock`] gives single-write,
/// lock-free-read publication: one observer's successful
/// [`PrunableEncryptedMessage::load_prunable`] becomes visible to every
/// concurrent reader without either side taking a lock (§5, §9).
pub struct PrunableEncryptedMessage {
    version: u8,
    hash: [u8; 32],
    payload: OnceLock<EncryptedData>,
}

impl std::fmt::Debug for PrunableEncryptedMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrunableEncryptedMessage")
            .field("version", &self.version)
            .field("hash", &hex::encode(self.hash))
            .field("has_payload", &self.has_prunable_data())
            .finish()
    }
}

impl Clone for PrunableEncryptedMessage {
    fn clone(&self) -> Self {
        let payload = OnceLock::new();
        if let Some(data) = self.payload.get() {
            let _ = payload.set(data.clone());
        }
        Self {
            version: self.version,
            hash: self.hash,
            payload,
        }
    }
}

impl PartialEq for PrunableEncryptedMessage {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.hash == other.hash
            && self.payload.get() == other.payload.get()
    }
}
impl Eq for PrunableEncryptedMessage {}

impl PrunableEncryptedMessage {
    /// Constructs a sealed appendix from a payload already in hand (e.g.
    /// freshly encrypted by an outbound draft), computing the canonical
    /// hash immediately.
    pub fn sealed(payload: EncryptedData, version: u8) -> Self {
        let hash = prunable_hash(
            payload.is_text,
            payload.is_compressed,
            &payload.data,
            &payload.nonce,
        );
        let cell = OnceLock::new();
        let _ = cell.set(payload);
        Self {
            version,
            hash,
            payload: cell,
        }
    }

    /// Constructs a placeholder carrying only the hash (the native wire
    /// shape, and the shape of a payload that has since been pruned).
    pub fn from_hash(hash: [u8; 32], version: u8) -> Self {
        Self {
            version,
            hash,
            payload: OnceLock::new(),
        }
    }

    pub fn parse(r: &mut Reader, version: u8) -> Result<Self, AppendixError> {
        let bytes = r.get_bytes(32)?;
        Ok(Self::from_hash(bytes.try_into().unwrap(), version))
    }

    /// Parses a JSON attachment: `"encryptedMessageHash"` is always present;
    /// the optional `"encryptedMessage"` object carries the payload when the
    /// peer sending this JSON still holds it (§4.2, §4.6).
    pub fn from_json(obj: &serde_json::Value, version: u8) -> Result<Self, AppendixError> {
        let hash_hex = obj
            .get("encryptedMessageHash")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppendixError::NotValid("missing encryptedMessageHash".to_string()))?;
        let hash_bytes = hex::decode(hash_hex)
            .map_err(|e| AppendixError::NotValid(format!("invalid hash hex: {e}")))?;
        let hash: [u8; 32] = hash_bytes
            .try_into()
            .map_err(|_| AppendixError::NotValid("encryptedMessageHash must be 32 bytes".to_string()))?;

        match obj.get("encryptedMessage") {
            None => Ok(Self::from_hash(hash, version)),
            Some(inner) => {
                let field = |name: &str| -> Result<&str, AppendixError> {
                    inner
                        .get(name)
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| AppendixError::NotValid(format!("encryptedMessage missing field {name}")))
                };
                let data = hex::decode(field("data")?)
                    .map_err(|e| AppendixError::NotValid(format!("invalid encrypted data hex: {e}")))?;
                let nonce_bytes = hex::decode(field("nonce")?)
                    .map_err(|e| AppendixError::NotValid(format!("invalid nonce hex: {e}")))?;
                let nonce: [u8; 32] = nonce_bytes
                    .try_into()
                    .map_err(|_| AppendixError::NotValid("nonce must be 32 bytes".to_string()))?;
                let is_text = inner.get("isText").and_then(|v| v.as_bool()).unwrap_or(false);
                let is_compressed = inner
                    .get("isCompressed")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(true);
                let sealed = Self::sealed(
                    EncryptedData {
                        data,
                        nonce,
                        is_text,
                        is_compressed,
                    },
                    version,
                );
                if sealed.hash != hash {
                    return Err(AppendixError::NotValid(
                        "encryptedMessageHash does not match encryptedMessage payload".to_string(),
                    ));
                }
                Ok(sealed)
            }
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    pub fn has_prunable_data(&self) -> bool {
        self.payload.get().is_some()
    }

    pub fn encrypted_data(&self) -> Option<&EncryptedData> {
        self.payload.get()
    }

    /// On-wire size excluding the (possibly pruned) payload: always the
    /// 32-byte hash.
    pub fn size(&self) -> usize {
        32
    }

    /// Size including the payload, when present, for fee purposes.
    pub fn full_size(&self) -> usize {
        match self.payload.get() {
            Some(data) => data.data.len() + data.nonce.len(),
            None => 0,
        }
    }

    pub fn write_body(&self, w: &mut Writer) {
        w.put_bytes(&self.hash);
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = json!({
            "version.PrunableEncryptedMessage": self.version,
            "encryptedMessageHash": hex::encode(self.hash),
        });
        if let Some(data) = self.payload.get() {
            obj["encryptedMessage"] = json!({
                "data": hex::encode(&data.data),
                "nonce": hex::encode(data.nonce),
                "isText": data.is_text,
                "isCompressed": data.is_compressed,
            });
        }
        obj
    }

    pub fn fee_schedule(&self, ctx: &ChainContext) -> Fee {
        // 0.1 SPA * ceil(fullSize / 32)
        Fee::size_based(0, ctx.one_spa / 10, 32)
    }

    pub fn baseline_fee(&self, ctx: &ChainContext) -> Option<u64> {
        self.fee_schedule(ctx).evaluate(self.full_size() as u64)
    }

    /// `sibling_has_encrypted_message` is whatever the enclosing
    /// transaction's appendix set reports for a co-occurring, non-prunable
    /// `EncryptedMessage` — a conflict this appendix alone can't detect.
    pub fn validate(
        &self,
        tx: &TransactionContext,
        ctx: &ChainContext,
        sibling_has_encrypted_message: bool,
    ) -> Result<(), AppendixError> {
        if sibling_has_encrypted_message {
            return Err(AppendixError::NotValid(
                "cannot attach both PrunableEncryptedMessage and EncryptedMessage".to_string(),
            ));
        }
        if !tx.has_recipient() {
            return Err(AppendixError::NotValid(
                "PrunableEncryptedMessage requires recipientId".to_string(),
            ));
        }
        match self.payload.get() {
            None => {
                if ctx.age_of(tx.timestamp) < ctx.min_prunable_lifetime {
                    return Err(AppendixError::NotCurrentlyValid(
                        "prunable encrypted message data not yet available".to_string(),
                    ));
                }
                Ok(())
            }
            Some(data) => {
                if data.data.len() > ctx.max_prunable_encrypted_message_length {
                    return Err(AppendixError::NotValid(format!(
                        "invalid prunable encrypted message length: {}",
                        data.data.len()
                    )));
                }
                if data.data.is_empty() != (data.nonce == [0u8; 32]) {
                    return Err(AppendixError::NotValid(
                        "prunable encrypted message data/nonce length mismatch".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Re-inserts the payload into the prunable store when the transaction
    /// is still within its retention window; a no-op once the transaction
    /// has aged out.
    pub fn apply(
        &self,
        tx: &TransactionContext,
        ctx: &ChainContext,
        store: &dyn PrunableStore,
    ) -> Result<(), AppendixError> {
        if let Some(data) = self.payload.get() {
            if ctx.age_of(tx.timestamp) <= ctx.max_prunable_lifetime {
                store.add(
                    tx.id,
                    StoredPayload {
                        data: data.clone(),
                        timestamp: tx.timestamp,
                        height: ctx.height,
                    },
                );
                tracing::debug!(tx_id = tx.id, "stored prunable payload");
            } else {
                tracing::debug!(tx_id = tx.id, "prunable payload past retention window, not stored");
            }
        }
        Ok(())
    }

    /// Rehydrates the payload from the store if absent, honoring the
    /// retention window (and `includeExpired` for payloads past
    /// `MAX_PRUNABLE_LIFETIME`, when the chain configuration allows it).
    pub fn load_prunable(
        &self,
        tx: &TransactionContext,
        ctx: &ChainContext,
        store: &dyn PrunableStore,
        include_expired: bool,
    ) -> Result<(), AppendixError> {
        if self.has_prunable_data() {
            return Ok(());
        }
        let age = ctx.age_of(tx.timestamp);
        let within_window = age <= ctx.min_prunable_lifetime
            || (include_expired && ctx.include_expired_prunable && age <= ctx.max_prunable_lifetime);
        if !within_window {
            tracing::warn!(tx_id = tx.id, age, "prunable message expired before rehydration");
            return Err(AppendixError::NotCurrentlyValid(
                "prunable encrypted message has expired".to_string(),
            ));
        }
        match store.get(tx.id) {
            Some(stored) => {
                let _ = self.payload.set(stored.data);
                tracing::debug!(tx_id = tx.id, "rehydrated prunable payload from store");
                Ok(())
            }
            None => Err(AppendixError::NotCurrentlyValid(
                "prunable encrypted message data not yet available".to_string(),
            )),
        }
    }

    /// Re-inserts a payload previously observed over the wire, carrying its
    /// original timestamp/height through to the store (used when a peer
    /// sends the prunable data for a transaction already on our chain).
    pub fn restore_prunable_data(
        &self,
        store: &dyn PrunableStore,
        tx_id: i64,
        timestamp: i32,
        height: i32,
    ) -> Result<(), AppendixError> {
        let data = self
            .payload
            .get()
            .ok_or_else(|| AppendixError::NotValid("no prunable payload to restore".to_string()))?;
        store.add(
            tx_id,
            StoredPayload {
                data: data.clone(),
                timestamp,
                height,
            },
        );
        Ok(())
    }
}

/// Construction-time draft for a prunable encrypted message.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsealedPrunableEncryptedMessage {
    message_to_encrypt: Vec<u8>,
    recipient_public_key: [u8; 32],
    is_text: bool,
    is_compressed: bool,
}

impl UnsealedPrunableEncryptedMessage {
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

    /// Detects and parses an unsealed draft from the attachment root:
    /// present when `"encryptedMessageHash"` is absent but
    /// `"encryptedMessage.messageToEncrypt"` and the root's
    /// `"recipientPublicKey"` are (§4.2). `Ok(None)` means the object is a
    /// sealed/hash-only form instead.
    pub fn from_json(root: &serde_json::Value) -> Result<Option<Self>, AppendixError> {
        if root.get("encryptedMessageHash").is_some() {
            return Ok(None);
        }
        let obj = match root.get("encryptedMessage") {
            Some(obj) => obj,
            None => return Ok(None),
        };
        let message_hex = match obj.get("messageToEncrypt").and_then(|v| v.as_str()) {
            Some(s) => s,
            None => return Ok(None),
        };
        let recipient_hex = root
            .get("recipientPublicKey")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppendixError::NotValid("missing recipientPublicKey".to_string()))?;
        let message_to_encrypt = hex::decode(message_hex)
            .map_err(|e| AppendixError::NotValid(format!("invalid messageToEncrypt hex: {e}")))?;
        let is_text = obj.get("isText").and_then(|v| v.as_bool()).unwrap_or(false);
        let is_compressed = obj
            .get("isCompressed")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        let recipient_bytes = hex::decode(recipient_hex)
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

    pub fn seal(
        self,
        sender_secret: &[u8; 32],
        provider: &dyn EncryptionProvider,
    ) -> PrunableEncryptedMessage {
        let (ciphertext, nonce) =
            provider.encrypt(&self.message_to_encrypt, sender_secret, &self.recipient_public_key);
        let payload = EncryptedData {
            data: ciphertext,
            nonce,
            is_text: self.is_text,
            is_compressed: self.is_compressed,
        };
        let version = if self.is_compressed { 1 } else { 2 };
        PrunableEncryptedMessage::sealed(payload, version)
    }
}

#[allow(dead_code)]
fn derive_own_public_key(secret: &[u8; 32]) -> [u8; 32] {
    *PublicKey::from(&StaticSecret::from(*secret)).as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::X25519EncryptionProvider;
    use crate::prunable_store::InMemoryPrunableStore;

    fn sample_payload() -> EncryptedData {
        EncryptedData {
            data: vec![1, 2, 3, 4],
            nonce: [8u8; 32],
            is_text: false,
            is_compressed: true,
        }
    }

    #[test]
    fn hash_is_canonical_across_construction_paths() {
        let payload = sample_payload();
        let sealed = PrunableEncryptedMessage::sealed(payload.clone(), 1);
        let expected = prunable_hash(
            payload.is_text,
            payload.is_compressed,
            &payload.data,
            &payload.nonce,
        );
        assert_eq!(*sealed.hash(), expected);
    }

    #[test]
    fn s6_hash_only_construction_then_rehydration() {
        let payload = sample_payload();
        let hash = prunable_hash(
            payload.is_text,
            payload.is_compressed,
            &payload.data,
            &payload.nonce,
        );
        let msg = PrunableEncryptedMessage::from_hash(hash, 1);
        assert!(!msg.has_prunable_data());

        let store = InMemoryPrunableStore::new();
        store.add(
            1,
            StoredPayload {
                data: payload.clone(),
                timestamp: 0,
                height: 0,
            },
        );
        let tx = TransactionContext {
            id: 1,
            version: 1,
            recipient_id: 99,
            timestamp: 0,
        };
        let ctx = ChainContext::default();
        msg.load_prunable(&tx, &ctx, &store, false).unwrap();

        assert!(msg.has_prunable_data());
        assert_eq!(*msg.hash(), hash);
    }

    #[test]
    fn s7_premature_prune_is_not_currently_valid() {
        let hash = [1u8; 32];
        let msg = PrunableEncryptedMessage::from_hash(hash, 1);
        let tx = TransactionContext {
            id: 1,
            version: 1,
            recipient_id: 99,
            timestamp: 1000,
        };
        let ctx = ChainContext::default().at_time(1000 + 10); // well under min lifetime
        let err = msg.validate(&tx, &ctx, false).unwrap_err();
        assert!(matches!(err, AppendixError::NotCurrentlyValid(_)));
    }

    #[test]
    fn conflicting_sibling_encrypted_message_is_not_valid() {
        let msg = PrunableEncryptedMessage::sealed(sample_payload(), 1);
        let tx = TransactionContext {
            id: 1,
            version: 1,
            recipient_id: 99,
            timestamp: 0,
        };
        let ctx = ChainContext::default();
        let err = msg.validate(&tx, &ctx, true).unwrap_err();
        assert!(matches!(err, AppendixError::NotValid(_)));
    }

    #[test]
    fn apply_inserts_into_store_within_lifetime() {
        let msg = PrunableEncryptedMessage::sealed(sample_payload(), 1);
        let tx = TransactionContext {
            id: 42,
            version: 1,
            recipient_id: 99,
            timestamp: 0,
        };
        let ctx = ChainContext::default().at_time(10);
        let store = InMemoryPrunableStore::new();
        msg.apply(&tx, &ctx, &store).unwrap();
        assert_eq!(store.get(42).unwrap().data, sample_payload());
    }

    #[test]
    fn apply_skips_store_once_past_max_lifetime() {
        let msg = PrunableEncryptedMessage::sealed(sample_payload(), 1);
        let ctx = ChainContext::default();
        let tx = TransactionContext {
            id: 42,
            version: 1,
            recipient_id: 99,
            timestamp: 0,
        };
        let ctx = ctx.at_time(ctx.max_prunable_lifetime + 1);
        let store = InMemoryPrunableStore::new();
        msg.apply(&tx, &ctx, &store).unwrap();
        assert!(store.get(42).is_none());
    }

    #[test]
    fn unsealed_draft_seals_and_round_trips_hash() {
        let provider = X25519EncryptionProvider;
        let sender_secret = [4u8; 32];
        let recipient_public = derive_own_public_key(&[6u8; 32]);
        let draft = UnsealedPrunableEncryptedMessage::new(
            b"secret note".to_vec(),
            recipient_public,
            true,
            true,
        );
        let sealed = draft.seal(&sender_secret, &provider);
        assert!(sealed.has_prunable_data());
        let expected = prunable_hash(
            true,
            true,
            &sealed.encrypted_data().unwrap().data,
            &sealed.encrypted_data().unwrap().nonce,
        );
        assert_eq!(*sealed.hash(), expected);
    }

    #[test]
    fn json_round_trip_with_payload() {
        let msg = PrunableEncryptedMessage::sealed(sample_payload(), 1);
        let json = msg.to_json();
        let parsed = PrunableEncryptedMessage::from_json(&json, 1).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn json_round_trip_hash_only() {
        let msg = PrunableEncryptedMessage::from_hash([5u8; 32], 1);
        let json = msg.to_json();
        let parsed = PrunableEncryptedMessage::from_json(&json, 1).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn clone_preserves_payload_presence() {
        let msg = PrunableEncryptedMessage::sealed(sample_payload(), 1);
        let cloned = msg.clone();
        assert!(cloned.has_prunable_data());
        assert_eq!(cloned.hash(), msg.hash());
    }

    #[test]
    fn draft_detected_when_hash_absent_and_message_to_encrypt_present() {
        let recipient_public = [2u8; 32];
        let root = serde_json::json!({
            "recipientPublicKey": hex::encode(recipient_public),
            "encryptedMessage": {
                "messageToEncrypt": hex::encode(b"shh"),
                "isText": true,
            },
        });
        let draft = UnsealedPrunableEncryptedMessage::from_json(&root)
            .unwrap()
            .expect("hash absent, messageToEncrypt present should detect a draft");
        assert_eq!(draft.message_to_encrypt.as_slice(), b"shh");
        assert_eq!(draft.recipient_public_key, recipient_public);
        assert!(draft.is_text);
    }

    #[test]
    fn sealed_or_hash_only_form_is_not_mistaken_for_a_draft() {
        let sealed = PrunableEncryptedMessage::sealed(sample_payload(), 1);
        let json = sealed.to_json();
        assert!(UnsealedPrunableEncryptedMessage::from_json(&json)
            .unwrap()
            .is_none());

        let hash_only = PrunableEncryptedMessage::from_hash([1u8; 32], 1);
        let json = hash_only.to_json();
        assert!(UnsealedPrunableEncryptedMessage::from_json(&json)
            .unwrap()
            .is_none());
    }
}
