//! Action, decision, and outcome types shared by the Governance Evaluator
//! and the Turnstile Resolver.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Domain an action is being executed against. Drives Turnstile routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainType {
    Browser,
    Vehicle,
    #[default]
    Fleet,
    Antivirus,
    Other,
}

impl DomainType {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "browser" => DomainType::Browser,
            "vehicle" => DomainType::Vehicle,
            "fleet" => DomainType::Fleet,
            "antivirus" => DomainType::Antivirus,
            _ => DomainType::Other,
        }
    }
}

/// The unit of request submitted by a head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionCommand {
    pub action: String,
    pub target: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub head_id: Option<String>,
    #[serde(default)]
    pub limb_id: Option<String>,
    #[serde(default)]
    pub sensitivity: Option<f64>,
    #[serde(default)]
    pub domain_type: Option<DomainType>,
    #[serde(default)]
    pub quorum_ok: Option<bool>,
}

impl ActionCommand {
    pub fn new(action: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            target: target.into(),
            params: serde_json::json!({}),
            head_id: None,
            limb_id: None,
            sensitivity: None,
            domain_type: None,
            quorum_ok: None,
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_head(mut self, head_id: impl Into<String>) -> Self {
        self.head_id = Some(head_id.into());
        self
    }

    pub fn with_limb(mut self, limb_id: impl Into<String>) -> Self {
        self.limb_id = Some(limb_id.into());
        self
    }

    pub fn with_sensitivity(mut self, sensitivity: f64) -> Self {
        self.sensitivity = Some(sensitivity);
        self
    }

    pub fn with_domain(mut self, domain: DomainType) -> Self {
        self.domain_type = Some(domain);
        self
    }

    pub fn domain(&self) -> DomainType {
        self.domain_type.unwrap_or_default()
    }
}

/// Categorical outcome of Governance. ERROR exists only at the Dispatcher
/// boundary and is never produced by the evaluator itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Allow,
    Quarantine,
    Escalate,
    Deny,
    Error,
}

impl Decision {
    /// Map a trust score to a Decision using the fixed threshold table.
    pub fn from_trust_score(trust_score: f64) -> Self {
        if trust_score > 0.7 {
            Decision::Allow
        } else if trust_score > 0.5 {
            Decision::Quarantine
        } else if trust_score > 0.3 {
            Decision::Escalate
        } else {
            Decision::Deny
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Quarantine => "QUARANTINE",
            Decision::Escalate => "ESCALATE",
            Decision::Deny => "DENY",
            Decision::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of `GovernanceEvaluator::authorize`. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceResult {
    pub decision: Decision,
    pub trust_score: f64,
    pub vector_norm: f64,
    pub tongues_active: BTreeSet<String>,
    pub lattice_proof: serde_json::Value,
}

/// Concrete execution mode chosen by the Turnstile Resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnstileAction {
    Proceed,
    Pivot,
    Degrade,
    Isolate,
    Honeypot,
    Block,
}

impl TurnstileAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnstileAction::Proceed => "PROCEED",
            TurnstileAction::Pivot => "PIVOT",
            TurnstileAction::Degrade => "DEGRADE",
            TurnstileAction::Isolate => "ISOLATE",
            TurnstileAction::Honeypot => "HONEYPOT",
            TurnstileAction::Block => "BLOCK",
        }
    }
}

/// Result of `TurnstileResolver::resolve`. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnstileOutcome {
    pub action: TurnstileAction,
    pub continue_execution: bool,
    pub isolate: bool,
    pub deploy_honeypot: bool,
    pub require_human: bool,
    pub antibody_load: f64,
    pub membrane_stress: f64,
    pub reason: String,
    #[serde(default)]
    pub honeypot_target: Option<String>,
}
