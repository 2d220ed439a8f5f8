//! The Spine: single-entry-point command dispatch for Hydra.
//!
//! [`Dispatcher::execute`] is the only way a Command reaches a Limb. It
//! infers sensitivity, asks the Governance Evaluator for a trust score and
//! decision, asks the Turnstile Resolver what that decision means for this
//! domain and session, then routes the survivors to a Limb, the Ledger's
//! memory store, or the Registry's inter-head messaging.

pub mod consensus;
pub mod dispatcher;
pub mod error;
pub mod limb;
pub mod sensitivity;
pub mod session;
pub mod types;
pub mod workflow;

pub use consensus::{Ballot, ConsensusTable};
pub use dispatcher::Dispatcher;
pub use error::DispatcherError;
pub use limb::{Limb, LimbError, LimbOutcome, MockApiLimb, MockBrowserLimb, MockTerminalLimb};
pub use sensitivity::infer_sensitivity;
pub use session::{SessionState, SessionTable};
pub use types::{Command, DispatchResult};
pub use workflow::{Workflow, WorkflowRunner, WorkflowStatus};
