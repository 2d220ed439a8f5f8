//! Trust scoring and execution-mode resolution for Hydra.
//!
//! Every action a head submits to the Dispatcher is authorized here before
//! it reaches a Limb: the [`GovernanceEvaluator`] composes pluggable
//! "tongues" into a single trust score and categorical [`Decision`]; the
//! [`TurnstileResolver`] then maps that decision, plus domain and session
//! context, into a concrete [`TurnstileAction`].

pub mod governance;
pub mod tongues;
pub mod turnstile;
pub mod types;

pub use governance::GovernanceEvaluator;
pub use tongues::{GovernanceConfig, RemoteTongue, SemanticAntivirusTongue, Tongue, TongueContext, TongueContribution};
pub use turnstile::TurnstileResolver;
pub use types::{
    ActionCommand, Decision, DomainType, GovernanceResult, TurnstileAction, TurnstileOutcome,
};
