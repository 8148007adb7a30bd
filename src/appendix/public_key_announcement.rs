//! `PublicKeyAnnouncement`: binds a recipient account id to a curve25519
//! public key. The only appendix in scope that mutates account state.

use serde_json::json;

use crate::account::AccountStore;
use crate::buffer::{Reader, Writer};
use crate::crypto::{account_id_from_key, is_canonical_public_key};
use crate::error::AppendixError;
use crate::transaction::TransactionContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyAnnouncement {
    version: u8,
    public_key: [u8; 32],
}

impl PublicKeyAnnouncement {
    pub fn new(public_key: [u8; 32], version: u8) -> Self {
        Self { version, public_key }
    }

    pub fn parse(r: &mut Reader, version: u8) -> Result<Self, AppendixError> {
        let bytes = r.get_bytes(32)?;
        Ok(Self::new(bytes.try_into().unwrap(), version))
    }

    pub fn from_json(recipient_public_key_hex: &str, version: u8) -> Result<Self, AppendixError> {
        let bytes = hex::decode(recipient_public_key_hex)
            .map_err(|e| AppendixError::NotValid(format!("invalid public key hex: {e}")))?;
        if bytes.len() != 32 {
            return Err(AppendixError::NotValid(
                "recipientPublicKey must be 32 bytes".to_string(),
            ));
        }
        Ok(Self::new(bytes.try_into().unwrap(), version))
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn size(&self) -> usize {
        32
    }

    pub fn write_body(&self, w: &mut Writer) {
        w.put_bytes(&self.public_key);
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "version.PublicKeyAnnouncement": self.version,
            "recipientPublicKey": hex::encode(self.public_key),
        })
    }

    pub fn baseline_fee(&self) -> Option<u64> {
        Some(0)
    }

    /// S4/S5: key canonicality, recipient binding, and conflicting prior
    /// announcements.
    pub fn validate(
        &self,
        tx: &TransactionContext,
        accounts: &dyn AccountStore,
    ) -> Result<(), AppendixError> {
        if !tx.has_recipient() {
            return Err(AppendixError::NotValid(
                "PublicKeyAnnouncement requires recipientId".to_string(),
            ));
        }
        if !is_canonical_public_key(&self.public_key) {
            return Err(AppendixError::NotValid(
                "Invalid recipient public key".to_string(),
            ));
        }
        if account_id_from_key(&self.public_key) != tx.recipient_id {
            return Err(AppendixError::NotValid(
                "Announced public key does not match recipient accountId".to_string(),
            ));
        }
        if let Some(existing) = accounts.get_public_key(tx.recipient_id) {
            if existing != self.public_key {
                return Err(AppendixError::NotCurrentlyValid(
                    "Recipient account already has a different public key".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Atomically sets the recipient's public key; re-entry with the same
    /// key is a no-op (idempotent apply, invariant 7).
    pub fn apply(
        &self,
        tx: &TransactionContext,
        accounts: &dyn AccountStore,
    ) -> Result<(), AppendixError> {
        match accounts.set_or_verify(tx.recipient_id, self.public_key) {
            Ok(_) => {
                tracing::debug!(account_id = tx.recipient_id, "public key announcement applied");
                Ok(())
            }
            Err(existing) => {
                tracing::warn!(account_id = tx.recipient_id, "public key announcement conflicts with existing key");
                Err(AppendixError::NotCurrentlyValid(format!(
                    "account {} already has public key {}, cannot set {}",
                    tx.recipient_id,
                    hex::encode(existing),
                    hex::encode(self.public_key)
                )))
            }
        }
    }
}
