//! Error kinds surfaced by the Dispatcher's own plumbing. The `Execute`
//! contract itself never returns `Err` to its caller — failures are
//! represented in-band as a [`crate::types::DispatchResult`] with
//! `success: false`. This enum exists for the sub-operations that feed it.

#[derive(Debug, thiserror::Error)]
pub enum DispatcherError {
    #[error("registry error: {0}")]
    Registry(#[from] hydra_registry::RegistryError),

    #[error("ledger error: {0}")]
    Ledger(#[from] hydra_ledger::LedgerError),

    #[error("limb error: {0}")]
    Limb(#[from] crate::limb::LimbError),

    #[error("workflow {0} not found")]
    WorkflowNotFound(String),

    #[error("no limb registered for verb '{0}'")]
    NoLimbForVerb(String),
}
