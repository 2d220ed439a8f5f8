//! The Turnstile Resolver: maps a Governance Decision plus domain context
//! into a concrete execution mode. Pure — callers thread `antibody_load`
//! through session state across calls.

use crate::types::{Decision, DomainType, TurnstileAction, TurnstileOutcome};

#[derive(Debug, Default, Clone, Copy)]
pub struct TurnstileResolver;

impl TurnstileResolver {
    pub fn new() -> Self {
        Self
    }

    /// `Resolve(decision, domain, suspicion, vector_norm, previous_antibody_load,
    /// quorum_ok) -> TurnstileOutcome`. `vector_norm` is part of the
    /// contract but no current rule branches on it.
    pub fn resolve(
        &self,
        decision: Decision,
        domain: DomainType,
        suspicion: f64,
        _vector_norm: f64,
        previous_antibody_load: f64,
        quorum_ok: bool,
    ) -> TurnstileOutcome {
        // QUARANTINE without quorum is promoted to ESCALATE: consensus
        // was required but is not available.
        let effective = if decision == Decision::Quarantine && !quorum_ok {
            Decision::Escalate
        } else {
            decision
        };

        match effective {
            Decision::Allow => TurnstileOutcome {
                action: TurnstileAction::Proceed,
                continue_execution: true,
                isolate: false,
                deploy_honeypot: false,
                require_human: false,
                antibody_load: previous_antibody_load,
                membrane_stress: (previous_antibody_load * 0.5).min(1.0),
                reason: "clean".to_string(),
                honeypot_target: None,
            },

            Decision::Quarantine => {
                let action = match domain {
                    DomainType::Browser => TurnstileAction::Degrade,
                    DomainType::Fleet | DomainType::Vehicle => TurnstileAction::Pivot,
                    _ => TurnstileAction::Pivot,
                };
                let antibody_load = previous_antibody_load + suspicion;
                TurnstileOutcome {
                    action,
                    continue_execution: true,
                    isolate: false,
                    deploy_honeypot: false,
                    require_human: false,
                    antibody_load,
                    membrane_stress: (antibody_load * 0.5).min(1.0),
                    reason: format!("quarantine: {} applied for domain {:?}", action.as_str(), domain),
                    honeypot_target: None,
                }
            }

            Decision::Escalate => {
                let action = match domain {
                    DomainType::Fleet => TurnstileAction::Isolate,
                    _ => TurnstileAction::Block,
                };
                let antibody_load = previous_antibody_load + suspicion;
                TurnstileOutcome {
                    action,
                    continue_execution: false,
                    isolate: action == TurnstileAction::Isolate,
                    deploy_honeypot: false,
                    require_human: true,
                    antibody_load,
                    membrane_stress: (antibody_load * 0.75).min(1.0),
                    reason: "escalated: human review required".to_string(),
                    honeypot_target: None,
                }
            }

            Decision::Deny | Decision::Error => {
                let antibody_load = previous_antibody_load + suspicion;
                let honeypot_eligible =
                    domain == DomainType::Browser && suspicion >= 0.9 && previous_antibody_load >= 1.0;

                if honeypot_eligible {
                    TurnstileOutcome {
                        action: TurnstileAction::Honeypot,
                        continue_execution: true,
                        isolate: false,
                        deploy_honeypot: true,
                        require_human: false,
                        antibody_load,
                        membrane_stress: antibody_load.min(1.0),
                        reason: "denied: rerouted to honeypot".to_string(),
                        honeypot_target: Some("about:blank#hydra-honeypot".to_string()),
                    }
                } else {
                    TurnstileOutcome {
                        action: TurnstileAction::Block,
                        continue_execution: false,
                        isolate: false,
                        deploy_honeypot: false,
                        require_human: false,
                        antibody_load,
                        membrane_stress: antibody_load.min(1.0),
                        reason: "denied: blocked".to_string(),
                        honeypot_target: None,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_proceeds_without_side_effects() {
        let resolver = TurnstileResolver::new();
        let outcome = resolver.resolve(Decision::Allow, DomainType::Browser, 0.1, 0.0, 0.0, true);
        assert_eq!(outcome.action, TurnstileAction::Proceed);
        assert!(outcome.continue_execution);
    }

    #[test]
    fn quarantine_browser_degrades() {
        let resolver = TurnstileResolver::new();
        let outcome = resolver.resolve(Decision::Quarantine, DomainType::Browser, 0.3, 0.0, 0.0, true);
        assert_eq!(outcome.action, TurnstileAction::Degrade);
        assert!(outcome.continue_execution);
        assert!((outcome.antibody_load - 0.3).abs() < 1e-9);
    }

    #[test]
    fn quarantine_fleet_pivots() {
        let resolver = TurnstileResolver::new();
        let outcome = resolver.resolve(Decision::Quarantine, DomainType::Fleet, 0.2, 0.0, 0.0, true);
        assert_eq!(outcome.action, TurnstileAction::Pivot);
    }

    #[test]
    fn quarantine_without_quorum_promotes_to_escalate() {
        let resolver = TurnstileResolver::new();
        let outcome = resolver.resolve(Decision::Quarantine, DomainType::Fleet, 0.2, 0.0, 0.0, false);
        assert_eq!(outcome.action, TurnstileAction::Isolate);
        assert!(!outcome.continue_execution);
        assert!(outcome.require_human);
    }

    #[test]
    fn escalate_fleet_isolates_browser_blocks() {
        let resolver = TurnstileResolver::new();
        let fleet = resolver.resolve(Decision::Escalate, DomainType::Fleet, 0.4, 0.0, 0.0, true);
        assert_eq!(fleet.action, TurnstileAction::Isolate);
        let browser = resolver.resolve(Decision::Escalate, DomainType::Browser, 0.4, 0.0, 0.0, true);
        assert_eq!(browser.action, TurnstileAction::Block);
    }

    #[test]
    fn deny_with_high_suspicion_and_load_deploys_honeypot() {
        let resolver = TurnstileResolver::new();
        let outcome = resolver.resolve(Decision::Deny, DomainType::Browser, 0.95, 0.0, 1.2, true);
        assert_eq!(outcome.action, TurnstileAction::Honeypot);
        assert!(outcome.deploy_honeypot);
        assert!(outcome.continue_execution);
        assert!(outcome.honeypot_target.is_some());
    }

    #[test]
    fn deny_without_accumulated_load_blocks() {
        let resolver = TurnstileResolver::new();
        let outcome = resolver.resolve(Decision::Deny, DomainType::Browser, 0.95, 0.0, 0.0, true);
        assert_eq!(outcome.action, TurnstileAction::Block);
    }
}
