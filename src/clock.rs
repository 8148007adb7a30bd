//! Ambient clock interface.
//!
//! Epoch time is seconds since the chain's genesis timestamp and always
//! fits in a signed 32-bit integer within the chain's usable lifetime.
//! Passed in explicitly rather than read from a global, per the
//! process-wide-state design note.

use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    fn epoch_time(&self) -> i32;
}

/// Wall-clock implementation, offset from a configured genesis instant.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    genesis_unix_seconds: i64,
}

impl SystemClock {
    pub fn new(genesis_unix_seconds: i64) -> Self {
        Self {
            genesis_unix_seconds,
        }
    }
}

impl Clock for SystemClock {
    fn epoch_time(&self) -> i32 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_secs() as i64;
        (now - self.genesis_unix_seconds) as i32
    }
}

/// Fixed clock for tests and deterministic replay.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i32);

impl Clock for FixedClock {
    fn epoch_time(&self) -> i32 {
        self.0
    }
}
