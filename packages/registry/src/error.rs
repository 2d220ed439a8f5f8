//! Error kinds surfaced by the Registry.

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("head {0} not found")]
    HeadNotFound(String),

    #[error("limb {0} not found")]
    LimbNotFound(String),

    #[error("head {0} already connected")]
    HeadAlreadyConnected(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] hydra_ledger::LedgerError),
}
