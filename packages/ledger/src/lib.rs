//! Append-only audit ledger and cross-session memory store for Hydra.
//!
//! Every action a Head submits and every Decision the Governance layer
//! reaches is written here before anything executes; nothing is ever
//! updated or deleted. [`Ledger`] also tracks which Heads and Limbs are
//! currently connected and holds a small key/value memory store that
//! survives across sessions.

pub mod error;
pub mod ledger;
pub mod types;

pub use error::LedgerError;
pub use ledger::Ledger;
pub use types::{
    EntryType, LedgerEntry, LedgerStats, MemoryFact, NewLedgerEntry, QueryFilter, VerificationReport,
};
