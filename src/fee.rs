//! Size-based transaction fee model.
//!
//! `fee(n) = constantPart + ceil(n / unitSize) * unitFeePerUnit`, evaluated
//! against a per-kind "effective size" (message bytes, ciphertext length
//! less the authentication overhead, or full prunable payload size).

/// A fee schedule for one appendix kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fee {
    /// No fee contribution from this appendix.
    None,
    /// `constant_part + ceil(effective_size / unit_size) * unit_fee`.
    SizeBased {
        constant_part: u64,
        unit_fee: u64,
        unit_size: u64,
    },
}

impl Fee {
    pub fn size_based(constant_part: u64, unit_fee: u64, unit_size: u64) -> Self {
        assert!(unit_size >= 1, "unit_size must be at least 1");
        Fee::SizeBased {
            constant_part,
            unit_fee,
            unit_size,
        }
    }

    /// Evaluate the fee for a given effective size. Returns `None` on 63-bit
    /// overflow, which the caller surfaces as a transaction-level validation
    /// failure rather than an appendix-level one (§4.3).
    pub fn evaluate(&self, effective_size: u64) -> Option<u64> {
        match *self {
            Fee::None => Some(0),
            Fee::SizeBased {
                constant_part,
                unit_fee,
                unit_size,
            } => {
                let units = effective_size
                    .checked_add(unit_size - 1)
                    .map(|n| n / unit_size)?;
                let variable = units.checked_mul(unit_fee)?;
                let total = constant_part.checked_add(variable)?;
                if total > i64::MAX as u64 {
                    return None;
                }
                Some(total)
            }
        }
    }
}
