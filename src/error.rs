//! Error taxonomy for the appendix subsystem.
//!
//! Two consensus-facing kinds plus one programmer-error kind, per the
//! propagation policy: appendices never retry anything themselves, and no
//! failure is ever swallowed silently.

use thiserror::Error;

/// Errors raised while parsing, validating, or applying an appendix.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppendixError {
    /// Permanent: the appendix is syntactically wrong, exceeds a hard limit,
    /// fails a canonicalization check, or violates a structural invariant.
    /// The enclosing transaction is rejected.
    #[error("{0}")]
    NotValid(String),

    /// Transient: the appendix is well-formed but temporarily inconsistent
    /// with chain state. Callers may retry once the chain has progressed.
    #[error("{0}")]
    NotCurrentlyValid(String),

    /// An unsealed draft's `writeBinary`/`apply` was invoked before
    /// `encrypt`. A programmer error, not a consensus condition.
    #[error("appendix has not been sealed with encrypt()")]
    NotYetEncrypted,
}

impl AppendixError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, AppendixError::NotValid(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, AppendixError::NotCurrentlyValid(_))
    }
}
