//! Account store interface.
//!
//! Narrow read/write surface the appendix subsystem needs from the node's
//! account projection — the full account state store is out of scope and
//! owned externally (§1, §6).

use std::collections::HashMap;
use std::sync::RwLock;

/// The account-facing operations an appendix validates and applies against.
pub trait AccountStore: Send + Sync {
    /// `accountIdFromKey(publicKey) -> i64`.
    fn account_id_from_key(&self, public_key: &[u8; 32]) -> i64 {
        crate::crypto::account_id_from_key(public_key)
    }

    /// `getPublicKey(accountId) -> Option<[u8;32]>`.
    fn get_public_key(&self, account_id: i64) -> Option<[u8; 32]>;

    /// `setOrVerify(accountId, publicKey) -> bool`: `true` if freshly set,
    /// `false` if an identical key was already on file. Returns `Err` if a
    /// *different* key is already on file (a mismatch the caller should
    /// surface as `NotCurrentlyValid`, since the account lost the race).
    fn set_or_verify(&self, account_id: i64, public_key: [u8; 32]) -> Result<bool, [u8; 32]>;
}

/// In-memory [`AccountStore`] for tests and single-process use.
#[derive(Default)]
pub struct InMemoryAccountStore {
    public_keys: RwLock<HashMap<i64, [u8; 32]>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for InMemoryAccountStore {
    fn get_public_key(&self, account_id: i64) -> Option<[u8; 32]> {
        self.public_keys.read().unwrap().get(&account_id).copied()
    }

    fn set_or_verify(&self, account_id: i64, public_key: [u8; 32]) -> Result<bool, [u8; 32]> {
        let mut keys = self.public_keys.write().unwrap();
        match keys.get(&account_id) {
            Some(existing) if *existing == public_key => Ok(false),
            Some(existing) => Err(*existing),
            None => {
                keys.insert(account_id, public_key);
                Ok(true)
            }
        }
    }
}
