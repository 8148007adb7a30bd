//! Prunable payload store interface.
//!
//! An abstract, hash-indexed store the node uses to stash and later restore
//! payloads that may be pruned from the block after `MAX_PRUNABLE_LIFETIME`
//! (§4.6). Keyed by transaction id, not by the payload hash, since a
//! transaction carries at most one prunable encrypted message.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::encrypted_data::EncryptedData;

/// A prunable payload together with the observational metadata needed to
/// decide whether it is still within its retention window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPayload {
    pub data: EncryptedData,
    pub timestamp: i32,
    pub height: i32,
}

pub trait PrunableStore: Send + Sync {
    /// Idempotent insert, keyed by transaction id.
    fn add(&self, tx_id: i64, payload: StoredPayload);

    fn get(&self, tx_id: i64) -> Option<StoredPayload>;
}

/// In-memory [`PrunableStore`] for tests and single-process use.
#[derive(Default)]
pub struct InMemoryPrunableStore {
    payloads: RwLock<HashMap<i64, StoredPayload>>,
}

impl InMemoryPrunableStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrunableStore for InMemoryPrunableStore {
    fn add(&self, tx_id: i64, payload: StoredPayload) {
        self.payloads.write().unwrap().entry(tx_id).or_insert(payload);
    }

    fn get(&self, tx_id: i64) -> Option<StoredPayload> {
        self.payloads.read().unwrap().get(&tx_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> StoredPayload {
        StoredPayload {
            data: EncryptedData {
                data: vec![1, 2, 3],
                nonce: [9u8; 32],
                is_text: false,
                is_compressed: true,
            },
            timestamp: 1000,
            height: 10,
        }
    }

    #[test]
    fn add_then_get_round_trips() {
        let store = InMemoryPrunableStore::new();
        store.add(7, sample_payload());
        assert_eq!(store.get(7), Some(sample_payload()));
        assert_eq!(store.get(8), None);
    }

    #[test]
    fn add_is_idempotent_first_write_wins() {
        let store = InMemoryPrunableStore::new();
        let mut first = sample_payload();
        first.timestamp = 1;
        let mut second = sample_payload();
        second.timestamp = 2;

        store.add(1, first.clone());
        store.add(1, second);
        assert_eq!(store.get(1), Some(first));
    }
}
