//! Wire-level command and result types for `Dispatcher::execute`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_params() -> serde_json::Value {
    serde_json::json!({})
}

/// The command wire format accepted from stdin or a WebSocket `execute`
/// frame. `sensitivity` and `domain_type` are optional; the Dispatcher
/// infers and defaults them respectively when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub action: String,
    pub target: String,
    #[serde(default = "default_params")]
    pub params: serde_json::Value,
    pub head_id: Option<String>,
    pub limb_id: Option<String>,
    pub sensitivity: Option<f64>,
    #[serde(default)]
    pub domain_type: Option<String>,
}

impl Command {
    pub fn new(action: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            target: target.into(),
            params: default_params(),
            head_id: None,
            limb_id: None,
            sensitivity: None,
            domain_type: None,
        }
    }

    pub fn with_head(mut self, head_id: impl Into<String>) -> Self {
        self.head_id = Some(head_id.into());
        self
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_sensitivity(mut self, sensitivity: f64) -> Self {
        self.sensitivity = Some(sensitivity);
        self
    }
}

/// Result of `Dispatcher::execute`. Always returned, never an `Err`:
/// failures surface as `success: false` plus `decision: "ERROR"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult {
    pub success: bool,
    pub decision: String,
    pub action_id: String,
    #[serde(flatten)]
    pub fields: HashMap<String, serde_json::Value>,
    pub error: Option<String>,
}

impl DispatchResult {
    pub fn new(action_id: impl Into<String>, decision: impl Into<String>, success: bool) -> Self {
        Self {
            success,
            decision: decision.into(),
            action_id: action_id.into(),
            fields: HashMap::new(),
            error: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn error(action_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(action_id, "ERROR", false).with_error(error)
    }
}
