//! Chain configuration injected into validation, per the "height-gated
//! rules" and "process-wide state" design notes: no hard-coded heights or
//! global statics, a single value object threaded through instead.

/// Mainnet-style defaults, used as the fallback for [`ChainContext::default`]
/// and by this crate's own tests. A real node constructs its own
/// `ChainContext` from its genesis configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainContext {
    /// Smallest-to-display currency multiplier (`ONE_SPA`).
    pub one_spa: u64,
    /// Activation height for the `EncryptedMessage` validation gate.
    pub shuffling_block: i32,
    /// A pruned payload younger than this (seconds) is transiently
    /// unavailable rather than permanently invalid.
    pub min_prunable_lifetime: i32,
    /// A payload older than this (seconds) may be dropped by the store.
    pub max_prunable_lifetime: i32,
    pub max_encrypted_message_length: usize,
    pub max_prunable_encrypted_message_length: usize,
    /// Whether `loadPrunable(tx, includeExpired = true)` is permitted to
    /// return payloads older than `max_prunable_lifetime`.
    pub include_expired_prunable: bool,
    /// Current chain height, advanced by the caller between blocks.
    pub height: i32,
    /// Current epoch time (`Clock::epoch_time()`), used to age prunable
    /// payloads against a transaction's timestamp.
    pub now: i32,
}

impl Default for ChainContext {
    fn default() -> Self {
        Self {
            one_spa: 100_000_000,
            shuffling_block: 0,
            min_prunable_lifetime: 14 * 24 * 60 * 60,
            max_prunable_lifetime: 6 * 30 * 24 * 60 * 60,
            max_encrypted_message_length: 1000,
            max_prunable_encrypted_message_length: 42_310,
            include_expired_prunable: false,
            height: 0,
            now: 0,
        }
    }
}

impl ChainContext {
    pub fn at_height(self, height: i32) -> Self {
        Self { height, ..self }
    }

    pub fn at_time(self, now: i32) -> Self {
        Self { now, ..self }
    }

    /// Populates `now` from a [`Clock`](crate::clock::Clock) rather than a
    /// bare integer, the node's actual construction path for a live
    /// `ChainContext` (§4.9/§6: the clock is ambient, injected, never a
    /// global read directly by validation).
    pub fn at_current_time(self, clock: &dyn crate::clock::Clock) -> Self {
        self.at_time(clock.epoch_time())
    }

    /// Seconds elapsed since `tx_timestamp`, saturating at zero for clock
    /// skew (a transaction timestamped in the future is treated as just
    /// created rather than negative-aged).
    pub fn age_of(&self, tx_timestamp: i32) -> i32 {
        (self.now - tx_timestamp).max(0)
    }

    pub fn is_active(&self, activation_height: i32) -> bool {
        self.height >= activation_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_of_saturates_at_zero() {
        let ctx = ChainContext::default().at_time(100);
        assert_eq!(ctx.age_of(150), 0);
        assert_eq!(ctx.age_of(40), 60);
    }

    #[test]
    fn is_active_is_height_gated() {
        let ctx = ChainContext {
            shuffling_block: 500,
            ..ChainContext::default()
        }
        .at_height(499);
        assert!(!ctx.is_active(ctx.shuffling_block));
        let ctx = ctx.at_height(500);
        assert!(ctx.is_active(ctx.shuffling_block));
    }

    #[test]
    fn at_current_time_reads_through_the_clock() {
        use crate::clock::{Clock, FixedClock};
        let clock = FixedClock(1_234);
        let ctx = ChainContext::default().at_current_time(&clock);
        assert_eq!(ctx.now, clock.epoch_time());
    }
}
