//! # Transaction Appendix Subsystem
//!
//! Binary and JSON codecs, consensus validation, and size-based fee
//! computation for the optional typed attachments ("appendices") a
//! Nxt-family transaction may carry: a plaintext message, a recipient
//! public-key announcement, or an encrypted message (addressed to the
//! recipient, to the sender themselves, or held prunable off-chain).
//!
//! ## Key Components
//!
//! - **[`appendix`]**: the closed `Appendix` tagged union and its per-kind
//!   implementations — the consensus-critical core of this crate.
//! - **[`fee`]**: the linear size-based fee model appendices are charged
//!   against.
//! - **[`crypto`] / [`account`] / [`prunable_store`] / [`clock`]**: narrow
//!   interfaces to the node's external collaborators (§6 of the design
//!   spec), each with a reference in-process implementation for tests.
//! - **[`context`]**: the injected chain constants (activation heights,
//!   prunable retention windows, `ONE_SPA`) validation reads from.
//!
//! ## Quick Start
//!
//! ```rust
//! use nxt_appendix_core::appendix::{Appendix, PlainMessage, ValidationContext};
//! use nxt_appendix_core::account::InMemoryAccountStore;
//! use nxt_appendix_core::context::ChainContext;
//! use nxt_appendix_core::transaction::TransactionContext;
//!
//! let appendix = Appendix::PlainMessage(PlainMessage::new(b"hi".to_vec(), true, 1).unwrap());
//! let tx = TransactionContext { id: 1, version: 1, recipient_id: 7, timestamp: 0 };
//! let ctx = ChainContext::default();
//! let accounts = InMemoryAccountStore::new();
//!
//! appendix.validate(&tx, &ctx, &accounts, ValidationContext::default()).unwrap();
//!
//! let mut wire = Vec::new();
//! appendix.write_binary(&mut wire).unwrap();
//! assert_eq!(wire.len(), 1 + appendix.size());
//! ```

pub mod account;
pub mod appendix;
pub mod buffer;
pub mod clock;
pub mod context;
pub mod crypto;
pub mod encrypted_data;
pub mod error;
pub mod fee;
pub mod prunable_store;
pub mod transaction;

pub use appendix::Appendix;
pub use context::ChainContext;
pub use error::AppendixError;
pub use fee::Fee;
pub use transaction::TransactionContext;
