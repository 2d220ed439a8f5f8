//! Process-wide wiring: one Ledger, one Registry, one Dispatcher shared by
//! the CLI, the interactive terminal, and the WebSocket server.

use crate::config::Config;
use hydra_dispatcher::Dispatcher;
use hydra_governance::{GovernanceConfig, GovernanceEvaluator};
use hydra_ledger::Ledger;
use hydra_registry::Registry;
use std::sync::Arc;

pub struct App {
    pub dispatcher: Arc<Dispatcher>,
    pub ledger: Arc<Ledger>,
    pub registry: Arc<Registry>,
}

impl App {
    pub async fn bootstrap(config: &Config) -> Result<Self, hydra_ledger::LedgerError> {
        let ledger = Ledger::open(&config.db_path, config.session_id.clone()).await?;
        let registry = Arc::new(Registry::new(ledger.clone()));

        let mut governance_config = GovernanceConfig::default();
        governance_config.remote_policy_url = config.scbe_url.clone();

        let dispatcher = Arc::new(
            Dispatcher::new(ledger.clone(), registry.clone()).with_governance(GovernanceEvaluator::new(governance_config)),
        );

        Ok(Self {
            dispatcher,
            ledger,
            registry,
        })
    }
}
