//! The Spine: the single entry point through which every command must
//! pass. `execute` always returns a [`DispatchResult`]; Governance,
//! Turnstile, Registry, or Limb failures are represented in-band rather
//! than propagated as an `Err`.

use crate::consensus::ConsensusTable;
use crate::limb::{Limb, MockApiLimb, MockBrowserLimb, MockTerminalLimb};
use crate::sensitivity::infer_sensitivity;
use crate::session::{SessionState, SessionTable};
use crate::types::{Command, DispatchResult};
use crate::workflow::WorkflowRunner;
use hydra_governance::{DomainType, GovernanceConfig, GovernanceEvaluator, TurnstileAction, TurnstileResolver};
use hydra_ledger::{EntryType, Ledger, NewLedgerEntry};
use hydra_registry::Registry;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Default ambient deadline for a single `Execute` call (§5).
const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

pub struct Dispatcher {
    ledger: Arc<Ledger>,
    registry: Arc<Registry>,
    governance: GovernanceEvaluator,
    turnstile: TurnstileResolver,
    sessions: SessionTable,
    consensus: ConsensusTable,
    workflows: WorkflowRunner,
    browser_limb: Arc<dyn Limb>,
    terminal_limb: Arc<dyn Limb>,
    api_limb: Arc<dyn Limb>,
    deadline: Duration,
}

impl Dispatcher {
    pub fn new(ledger: Arc<Ledger>, registry: Arc<Registry>) -> Self {
        Self {
            ledger,
            registry,
            governance: GovernanceEvaluator::new(GovernanceConfig::default()),
            turnstile: TurnstileResolver::new(),
            sessions: SessionTable::new(),
            consensus: ConsensusTable::new(),
            workflows: WorkflowRunner::new(),
            browser_limb: Arc::new(MockBrowserLimb::default()),
            terminal_limb: Arc::new(MockTerminalLimb::default()),
            api_limb: Arc::new(MockApiLimb::default()),
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn with_governance(mut self, governance: GovernanceEvaluator) -> Self {
        self.governance = governance;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_browser_limb(mut self, limb: Arc<dyn Limb>) -> Self {
        self.browser_limb = limb;
        self
    }

    pub fn with_terminal_limb(mut self, limb: Arc<dyn Limb>) -> Self {
        self.terminal_limb = limb;
        self
    }

    pub fn with_api_limb(mut self, limb: Arc<dyn Limb>) -> Self {
        self.api_limb = limb;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn workflows(&self) -> &WorkflowRunner {
        &self.workflows
    }

    pub fn consensus(&self) -> &ConsensusTable {
        &self.consensus
    }

    /// `Execute(command) -> result`. Sole public entry point. Wrapped in
    /// the ambient per-call deadline (§5): a timeout converts to an
    /// in-band QUARANTINE result plus an ERROR ledger entry rather than
    /// ever surfacing as a panic or a dropped future.
    pub async fn execute(&self, command: Command) -> DispatchResult {
        match tokio::time::timeout(self.deadline, self.execute_inner(command)).await {
            Ok(result) => result,
            Err(_) => {
                let action_id = Uuid::new_v4().to_string();
                if let Err(e) = self
                    .ledger
                    .write(NewLedgerEntry::new(EntryType::Error, "execute", "deadline").with_parent(action_id.clone()))
                    .await
                {
                    tracing::error!(error = %e, action_id, "failed to write ERROR entry for timed-out execute");
                }
                tracing::warn!(action_id, "execute exceeded ambient deadline");
                DispatchResult::new(action_id, "QUARANTINE", false).with_error("timeout")
            }
        }
    }

    async fn execute_inner(&self, command: Command) -> DispatchResult {
        let action_id = Uuid::new_v4().to_string();

        let sensitivity = command
            .sensitivity
            .unwrap_or_else(|| infer_sensitivity(&command.action, &command.target, &command.params));
        let domain = DomainType::parse(command.domain_type.as_deref().unwrap_or("fleet"));

        if let Err(e) = self
            .ledger
            .write(
                NewLedgerEntry::new(EntryType::Action, &command.action, &command.target)
                    .with_payload(serde_json::json!({
                        "head_id": command.head_id,
                        "limb_id": command.limb_id,
                        "params": command.params,
                        "sensitivity": sensitivity,
                    }))
                    .with_parent(action_id.clone()),
            )
            .await
        {
            tracing::error!(error = %e, action_id, "failed to write ACTION entry");
            return DispatchResult::error(action_id, format!("storage error: {e}"));
        }

        let governance_result = self.governance.authorize(&command.action, &command.target, sensitivity, None);

        if let Err(e) = self
            .ledger
            .write(
                NewLedgerEntry::new(EntryType::Decision, &command.action, &command.target)
                    .with_decision(governance_result.decision.as_str())
                    .with_score(governance_result.trust_score)
                    .with_parent(action_id.clone()),
            )
            .await
        {
            tracing::error!(error = %e, action_id, "failed to write DECISION entry");
            return DispatchResult::error(action_id, format!("storage error: {e}"));
        }

        let session_id = self.ledger.session_id().to_string();
        let session_state = self.sessions.get(&session_id).await;
        let quorum_ok = self.consensus.quorum_ok(&session_id).await;
        let suspicion = 1.0 - governance_result.trust_score;

        let outcome = self.turnstile.resolve(
            governance_result.decision,
            domain,
            suspicion,
            governance_result.vector_norm,
            session_state.antibody_load,
            quorum_ok,
        );

        self.sessions
            .set(
                &session_id,
                SessionState {
                    antibody_load: outcome.antibody_load,
                    membrane_stress: outcome.membrane_stress,
                },
            )
            .await;

        if outcome.action != TurnstileAction::Proceed {
            if let Err(e) = self
                .ledger
                .write(
                    NewLedgerEntry::new(EntryType::Checkpoint, "turnstile_resolution", &command.target)
                        .with_parent(action_id.clone())
                        .with_payload(serde_json::json!({
                            "turnstile_action": outcome.action.as_str(),
                            "reason": outcome.reason,
                            "antibody_load": outcome.antibody_load,
                            "membrane_stress": outcome.membrane_stress,
                            "honeypot_target": outcome.honeypot_target,
                        })),
                )
                .await
            {
                tracing::error!(error = %e, action_id, "failed to write CHECKPOINT entry");
            }
        }

        if let Some(head_id) = &command.head_id {
            self.registry.record_action(head_id).await;
        }

        let mut target = command.target.clone();
        let mut params = command.params.clone();
        match outcome.action {
            TurnstileAction::Degrade => {
                params["safe_mode"] = serde_json::json!("degrade");
            }
            TurnstileAction::Pivot => {
                params["safe_mode"] = serde_json::json!("pivot");
            }
            TurnstileAction::Honeypot => {
                if let Some(honeypot) = &outcome.honeypot_target {
                    target = honeypot.clone();
                }
                params["honeypot"] = serde_json::json!(true);
            }
            _ => {}
        }

        if !outcome.continue_execution {
            return DispatchResult::new(action_id, governance_result.decision.as_str(), false)
                .with_field("turnstile_action", serde_json::json!(outcome.action.as_str()))
                .with_field("reason", serde_json::json!(outcome.reason))
                .with_field("require_human", serde_json::json!(outcome.require_human));
        }

        let result = self.route(&action_id, &command, &target, &params).await;
        let route_owns_decision = command.action == "message" || command.action.starts_with("switchboard_");

        match result {
            Ok(mut dispatch_result) => {
                if !route_owns_decision {
                    dispatch_result.decision = governance_result.decision.as_str().to_string();
                }
                dispatch_result
            }
            Err(error) => {
                if let Some(head_id) = &command.head_id {
                    self.registry.record_error(head_id).await;
                }
                if let Err(e) = self
                    .ledger
                    .write(
                        NewLedgerEntry::new(EntryType::Error, &command.action, &command.target)
                            .with_parent(action_id.clone())
                            .with_payload(serde_json::json!({"error": error})),
                    )
                    .await
                {
                    tracing::error!(error = %e, action_id, "failed to write ERROR entry");
                }
                DispatchResult::error(action_id, error)
            }
        }
    }

    async fn route(
        &self,
        action_id: &str,
        command: &Command,
        target: &str,
        params: &serde_json::Value,
    ) -> Result<DispatchResult, String> {
        match command.action.as_str() {
            "navigate" | "click" | "type" => {
                let outcome = self
                    .browser_limb
                    .execute(&command.action, target, params)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(DispatchResult::new(action_id, "ALLOW", true).with_field("result", outcome.result))
            }
            "run" => {
                let outcome = self
                    .terminal_limb
                    .execute("run", target, params)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(DispatchResult::new(action_id, "ALLOW", true).with_field("result", outcome.result))
            }
            "api" => {
                let outcome = self
                    .api_limb
                    .execute("api", target, params)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(DispatchResult::new(action_id, "ALLOW", true).with_field("result", outcome.result))
            }
            "remember" => {
                let key = target.to_string();
                let value = params.get("value").cloned().unwrap_or(serde_json::Value::Null);
                let category = params.get("category").and_then(|v| v.as_str()).unwrap_or("general");
                let importance = params.get("importance").and_then(|v| v.as_f64()).unwrap_or(0.5);
                self.ledger
                    .remember(&key, value.clone(), category, importance)
                    .await
                    .map_err(|e| e.to_string())?;
                if let Err(e) = self
                    .ledger
                    .write(
                        NewLedgerEntry::new(EntryType::Memory, "remember", &key)
                            .with_parent(action_id.to_string())
                            .with_payload(serde_json::json!({"value": value, "category": category, "importance": importance})),
                    )
                    .await
                {
                    tracing::error!(error = %e, action_id, "failed to write MEMORY entry");
                }
                Ok(DispatchResult::new(action_id, "ALLOW", true).with_field("remembered", serde_json::json!(true)))
            }
            "recall" => {
                let value = self.ledger.recall(target).await.map_err(|e| e.to_string())?;
                Ok(DispatchResult::new(action_id, "ALLOW", true).with_field("value", value.unwrap_or(serde_json::Value::Null)))
            }
            "message" => {
                let from_head = command.head_id.clone().unwrap_or_default();
                let outcome = self
                    .registry
                    .send_message(&from_head, target, params.clone())
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(DispatchResult::new(action_id, outcome.decision, outcome.success)
                    .with_field("reason", serde_json::json!(outcome.reason)))
            }
            "workflow" => {
                let workflow = self.workflows.run(target, self).await;
                match workflow {
                    Some(w) => Ok(DispatchResult::new(action_id, "ALLOW", true)
                        .with_field("workflow_status", serde_json::json!(w.status))
                        .with_field("current_phase", serde_json::json!(w.current_phase))),
                    None => Err(format!("workflow '{target}' not found")),
                }
            }
            action if action.starts_with("switchboard_") => {
                Ok(DispatchResult::new(action_id, "ALLOW", false).with_field("error", serde_json::json!("NotAvailable")))
            }
            other => Err(format!("no route for verb '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydra_registry::Registry;

    async fn test_dispatcher() -> (Dispatcher, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(&dir.path().join("ledger.db"), Some("test-session".to_string())).await.unwrap();
        let registry = Arc::new(Registry::new(ledger.clone()));
        (Dispatcher::new(ledger, registry), dir)
    }

    #[tokio::test]
    async fn clean_navigate_is_allowed_and_reaches_the_limb() {
        let (dispatcher, _dir) = test_dispatcher().await;
        let command = Command::new("navigate", "https://example.com").with_sensitivity(0.1);
        let result = dispatcher.execute(command).await;
        assert!(result.success);
        assert_eq!(result.decision, "ALLOW");
    }

    #[tokio::test]
    async fn high_sensitivity_denies_and_skips_the_limb() {
        let (dispatcher, _dir) = test_dispatcher().await;
        let command = Command::new("run", "sudo rm -rf /").with_sensitivity(1.0);
        let result = dispatcher.execute(command).await;
        assert!(!result.success);
        assert_eq!(result.decision, "DENY");
    }

    #[tokio::test]
    async fn every_execute_writes_matching_action_and_decision_entries() {
        let (dispatcher, _dir) = test_dispatcher().await;
        let command = Command::new("navigate", "https://example.com").with_sensitivity(0.1);
        let result = dispatcher.execute(command).await;

        let actions = dispatcher
            .ledger()
            .query(hydra_ledger::QueryFilter { entry_type: Some(EntryType::Action), ..Default::default() }, 10, 0)
            .await
            .unwrap();
        let decisions = dispatcher
            .ledger()
            .query(hydra_ledger::QueryFilter { entry_type: Some(EntryType::Decision), ..Default::default() }, 10, 0)
            .await
            .unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(decisions.len(), 1);
        assert_eq!(actions[0].parent_id.as_deref(), Some(result.action_id.as_str()));
    }

    #[tokio::test]
    async fn honeypot_deployment_still_reaches_the_limb_with_the_rewritten_target() {
        let (dispatcher, _dir) = test_dispatcher().await;
        let browser_navigate = |target: &str| Command {
            domain_type: Some("browser".to_string()),
            ..Command::new("navigate", target).with_sensitivity(1.0)
        };

        // First call accumulates antibody_load to 1.0 so the second
        // qualifies for honeypot routing rather than a plain block.
        let first = dispatcher.execute(browser_navigate("https://evil.example/one")).await;
        assert_eq!(first.decision, "DENY");
        assert!(!first.success);

        let second = dispatcher.execute(browser_navigate("https://evil.example/two")).await;
        assert_eq!(second.decision, "DENY");
        assert!(second.success);
        assert_eq!(second.fields.get("turnstile_action").and_then(|v| v.as_str()), None);
    }

    #[tokio::test]
    async fn unsupported_verb_becomes_an_error_result() {
        let (dispatcher, _dir) = test_dispatcher().await;
        let command = Command::new("teleport", "mars").with_sensitivity(0.0);
        let result = dispatcher.execute(command).await;
        assert!(!result.success);
        assert_eq!(result.decision, "ERROR");
    }

    struct SlowLimb;

    #[async_trait::async_trait]
    impl Limb for SlowLimb {
        fn kind(&self) -> hydra_registry::LimbKind {
            hydra_registry::LimbKind::Browser
        }
        async fn activate(&self) -> Result<(), crate::limb::LimbError> {
            Ok(())
        }
        async fn deactivate(&self) -> Result<(), crate::limb::LimbError> {
            Ok(())
        }
        async fn execute(
            &self,
            verb: &str,
            target: &str,
            _params: &serde_json::Value,
        ) -> Result<crate::limb::LimbOutcome, crate::limb::LimbError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(crate::limb::LimbOutcome {
                verb: verb.to_string(),
                target: target.to_string(),
                result: serde_json::json!({}),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exceeding_the_ambient_deadline_yields_quarantine_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(&dir.path().join("ledger.db"), Some("test-session".to_string())).await.unwrap();
        let registry = Arc::new(Registry::new(ledger.clone()));
        let dispatcher = Dispatcher::new(ledger, registry)
            .with_browser_limb(Arc::new(SlowLimb))
            .with_deadline(Duration::from_millis(10));

        let command = Command::new("navigate", "https://example.com").with_sensitivity(0.1);
        let result = dispatcher.execute(command).await;
        assert!(!result.success);
        assert_eq!(result.decision, "QUARANTINE");
        assert_eq!(result.error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn workflow_halts_on_deny_and_does_not_run_remaining_phases() {
        let (dispatcher, _dir) = test_dispatcher().await;
        let workflow_id = dispatcher
            .workflows()
            .define(
                "two-phase",
                vec![
                    Command::new("run", "sudo rm -rf /").with_sensitivity(1.0),
                    Command::new("navigate", "https://example.com").with_sensitivity(0.1),
                ],
            )
            .await;

        let command = Command::new("workflow", workflow_id.as_str()).with_sensitivity(0.1);
        let result = dispatcher.execute(command).await;
        assert!(result.success);

        let workflow = dispatcher.workflows().get(&workflow_id).await.unwrap();
        assert_eq!(workflow.status, crate::workflow::WorkflowStatus::Error);
        assert_eq!(workflow.results.len(), 1);
    }
}
