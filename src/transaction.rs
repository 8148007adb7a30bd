//! Narrow view of the enclosing transaction.
//!
//! The transaction envelope itself is out of scope (§1); appendices only
//! ever need a handful of its fields to validate and fee themselves.

/// The subset of the transaction envelope that appendix operations read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionContext {
    pub id: i64,
    /// `0` only for the legacy, header-less wire form; `txVersion == 0 ⟺
    /// appendixVersion == 0` (§3).
    pub version: u8,
    /// `0` means "no recipient" (e.g. a contract-style transaction).
    pub recipient_id: i64,
    /// Seconds since chain genesis when the transaction was created.
    pub timestamp: i32,
}

impl TransactionContext {
    pub fn has_recipient(&self) -> bool {
        self.recipient_id != 0
    }

    pub fn is_legacy(&self) -> bool {
        self.version == 0
    }
}
