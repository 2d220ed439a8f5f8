//! Pluggable policy modules ("tongues") composed by the Governance Evaluator.
//!
//! Each tongue inspects an action descriptor and contributes a `factor`
//! in `[0, 1]` that multiplies into the running trust score, plus
//! `evidence` that is folded into the Governance Result's `lattice_proof`.

pub mod remote;
pub mod semantic_antivirus;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub use remote::RemoteTongue;
pub use semantic_antivirus::SemanticAntivirusTongue;

/// Inputs a tongue is allowed to inspect. Stays read-only: tongues must be
/// pure functions of their configuration and this context.
#[derive(Debug, Clone, Copy)]
pub struct TongueContext<'a> {
    pub action: &'a str,
    pub target: &'a str,
    pub payload: Option<&'a str>,
}

/// A single tongue's contribution to the composed trust score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TongueContribution {
    pub factor: f64,
    pub evidence: serde_json::Value,
}

impl TongueContribution {
    pub fn neutral() -> Self {
        Self {
            factor: 1.0,
            evidence: serde_json::json!({}),
        }
    }
}

/// A pluggable policy module.
pub trait Tongue: Send + Sync {
    /// Stable identifier recorded in `tongues_active`.
    fn id(&self) -> &'static str;

    fn evaluate(&self, ctx: &TongueContext<'_>) -> TongueContribution;
}

/// Configuration consumed by the Governance Evaluator to assemble its
/// tongue list. Tongues are listed explicitly rather than discovered by
/// reflection (per design note).
#[derive(Debug, Clone)]
pub struct GovernanceConfig {
    pub blocklist: HashSet<String>,
    pub trustlist: HashSet<String>,
    pub safety_threshold: f64,
    pub enabled_tongues: HashSet<String>,
    /// `SCBE_URL`, if set: an external policy service polled by the
    /// optional [`RemoteTongue`]. `None` disables it entirely.
    pub remote_policy_url: Option<String>,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            blocklist: ["evil.com", "malware.example.com"]
                .into_iter()
                .map(String::from)
                .collect(),
            trustlist: [
                "github.com",
                "huggingface.co",
                "arxiv.org",
                "wikipedia.org",
                "docs.python.org",
                "stackoverflow.com",
                "pypi.org",
                "google.com",
                "bing.com",
                "duckduckgo.com",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            safety_threshold: 0.4,
            enabled_tongues: ["semantic_antivirus"].into_iter().map(String::from).collect(),
            remote_policy_url: None,
        }
    }
}
