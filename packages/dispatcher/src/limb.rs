//! The Limb trait and mock execution backends. Concrete drivers (a real
//! browser, shell, or HTTP client) are out of scope here; these mocks
//! exist so the Dispatcher's routing and ledger-writing behavior can be
//! exercised end to end.

use async_trait::async_trait;
use hydra_registry::LimbKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum LimbError {
    #[error("limb is not active")]
    Inactive,

    #[error("unsupported verb '{0}' for this limb")]
    UnsupportedVerb(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

/// Outcome of a single `Limb::execute` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimbOutcome {
    pub verb: String,
    pub target: String,
    pub result: serde_json::Value,
}

#[async_trait]
pub trait Limb: Send + Sync {
    fn kind(&self) -> LimbKind;

    async fn activate(&self) -> Result<(), LimbError>;
    async fn deactivate(&self) -> Result<(), LimbError>;

    async fn execute(&self, verb: &str, target: &str, params: &serde_json::Value) -> Result<LimbOutcome, LimbError>;
}

/// A mock browser limb: accepts navigate/click/type, echoes back a
/// plausible DOM-shaped result.
pub struct MockBrowserLimb {
    active: std::sync::atomic::AtomicBool,
}

impl Default for MockBrowserLimb {
    fn default() -> Self {
        Self {
            active: std::sync::atomic::AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl Limb for MockBrowserLimb {
    fn kind(&self) -> LimbKind {
        LimbKind::Browser
    }

    async fn activate(&self) -> Result<(), LimbError> {
        self.active.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn deactivate(&self) -> Result<(), LimbError> {
        self.active.store(false, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn execute(&self, verb: &str, target: &str, params: &serde_json::Value) -> Result<LimbOutcome, LimbError> {
        if !self.active.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(LimbError::Inactive);
        }
        match verb {
            "navigate" => Ok(LimbOutcome {
                verb: verb.to_string(),
                target: target.to_string(),
                result: serde_json::json!({"url": target, "status": "loaded"}),
            }),
            "click" | "type" => Ok(LimbOutcome {
                verb: verb.to_string(),
                target: target.to_string(),
                result: serde_json::json!({"selector": target, "params": params}),
            }),
            other => Err(LimbError::UnsupportedVerb(other.to_string())),
        }
    }
}

/// A mock terminal limb: accepts `run`, echoes the command back as if it
/// had executed with exit code 0.
#[derive(Default)]
pub struct MockTerminalLimb {
    active: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl Limb for MockTerminalLimb {
    fn kind(&self) -> LimbKind {
        LimbKind::Terminal
    }

    async fn activate(&self) -> Result<(), LimbError> {
        self.active.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn deactivate(&self) -> Result<(), LimbError> {
        self.active.store(false, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn execute(&self, verb: &str, target: &str, params: &serde_json::Value) -> Result<LimbOutcome, LimbError> {
        if verb != "run" {
            return Err(LimbError::UnsupportedVerb(verb.to_string()));
        }
        Ok(LimbOutcome {
            verb: verb.to_string(),
            target: target.to_string(),
            result: serde_json::json!({"command": target, "params": params, "exit_code": 0}),
        })
    }
}

/// A mock API limb: accepts `api`, echoes a synthetic 200 response.
#[derive(Default)]
pub struct MockApiLimb {
    active: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl Limb for MockApiLimb {
    fn kind(&self) -> LimbKind {
        LimbKind::Api
    }

    async fn activate(&self) -> Result<(), LimbError> {
        self.active.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn deactivate(&self) -> Result<(), LimbError> {
        self.active.store(false, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn execute(&self, verb: &str, target: &str, params: &serde_json::Value) -> Result<LimbOutcome, LimbError> {
        if verb != "api" {
            return Err(LimbError::UnsupportedVerb(verb.to_string()));
        }
        Ok(LimbOutcome {
            verb: verb.to_string(),
            target: target.to_string(),
            result: serde_json::json!({"endpoint": target, "params": params, "status_code": 200}),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn browser_limb_navigates() {
        let limb = MockBrowserLimb::default();
        let outcome = limb.execute("navigate", "https://example.com", &serde_json::json!({})).await.unwrap();
        assert_eq!(outcome.result["status"], "loaded");
    }

    #[tokio::test]
    async fn browser_limb_rejects_unsupported_verb() {
        let limb = MockBrowserLimb::default();
        let result = limb.execute("run", "echo hi", &serde_json::json!({})).await;
        assert!(matches!(result, Err(LimbError::UnsupportedVerb(_))));
    }

    #[tokio::test]
    async fn terminal_limb_runs_command() {
        let limb = MockTerminalLimb::default();
        let outcome = limb.execute("run", "echo hi", &serde_json::json!({})).await.unwrap();
        assert_eq!(outcome.result["exit_code"], 0);
    }
}
