//! Head/Limb registry, bounded mailboxes, and inter-head messaging for Hydra.
//!
//! Every connect/disconnect and activate/deactivate is mirrored to the
//! Ledger by [`Registry`] itself, so the durable history and the
//! in-memory view never diverge.

pub mod error;
pub mod registry;
pub mod types;

pub use error::RegistryError;
pub use registry::Registry;
pub use types::{Head, HeadStatus, InboxMessage, Limb, LimbKind, SendOutcome, FORBIDDEN_TOKENS, MAILBOX_CAPACITY};
