//! Ledger entry, memory fact, and query types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a ledger entry. Stored as lowercase text in SQLite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Action,
    Decision,
    HeadConnect,
    HeadDisconnect,
    LimbActivate,
    LimbDeactivate,
    Consensus,
    Memory,
    Error,
    Checkpoint,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Action => "action",
            EntryType::Decision => "decision",
            EntryType::HeadConnect => "head_connect",
            EntryType::HeadDisconnect => "head_disconnect",
            EntryType::LimbActivate => "limb_activate",
            EntryType::LimbDeactivate => "limb_deactivate",
            EntryType::Consensus => "consensus",
            EntryType::Memory => "memory",
            EntryType::Error => "error",
            EntryType::Checkpoint => "checkpoint",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "action" => EntryType::Action,
            "decision" => EntryType::Decision,
            "head_connect" => EntryType::HeadConnect,
            "head_disconnect" => EntryType::HeadDisconnect,
            "limb_activate" => EntryType::LimbActivate,
            "limb_deactivate" => EntryType::LimbDeactivate,
            "consensus" => EntryType::Consensus,
            "memory" => EntryType::Memory,
            "error" => EntryType::Error,
            "checkpoint" => EntryType::Checkpoint,
            _ => return None,
        })
    }
}

/// A new entry submitted for `Ledger::write`. `session_id` and `signature`
/// are filled in by the Ledger itself, never by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub entry_type: EntryType,
    pub head_id: Option<String>,
    pub limb_id: Option<String>,
    pub action: String,
    pub target: String,
    pub payload: serde_json::Value,
    pub decision: Option<String>,
    pub score: Option<f64>,
    pub parent_id: Option<String>,
}

impl NewLedgerEntry {
    pub fn new(entry_type: EntryType, action: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            entry_type,
            head_id: None,
            limb_id: None,
            action: action.into(),
            target: target.into(),
            payload: serde_json::json!({}),
            decision: None,
            score: None,
            parent_id: None,
        }
    }

    pub fn with_head(mut self, head_id: impl Into<String>) -> Self {
        self.head_id = Some(head_id.into());
        self
    }

    pub fn with_limb(mut self, limb_id: impl Into<String>) -> Self {
        self.limb_id = Some(limb_id.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_decision(mut self, decision: impl Into<String>) -> Self {
        self.decision = Some(decision.into());
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// A durable, signed record in the ledger. Append-only: no update/delete
/// operation exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub entry_type: EntryType,
    pub timestamp: DateTime<Utc>,
    pub head_id: Option<String>,
    pub limb_id: Option<String>,
    pub action: String,
    pub target: String,
    pub payload: serde_json::Value,
    pub decision: Option<String>,
    pub score: Option<f64>,
    pub parent_id: Option<String>,
    pub session_id: String,
    pub signature: String,
}

/// Filter applied by `Ledger::query`.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub entry_type: Option<EntryType>,
    pub head_id: Option<String>,
    pub limb_id: Option<String>,
    pub decision: Option<String>,
    pub session_id: Option<String>,
}

/// A cross-session fact stored via `Remember`/`Recall`, distinct from
/// ledger entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryFact {
    pub key: String,
    pub value: serde_json::Value,
    pub category: String,
    pub importance: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub access_count: i64,
}

/// Aggregate counters returned by `Ledger::stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_entries: i64,
    pub by_entry_type: std::collections::BTreeMap<String, i64>,
    pub by_decision: std::collections::BTreeMap<String, i64>,
    pub active_heads: i64,
    pub active_limbs: i64,
    pub memory_facts: i64,
}

/// Result of a ledger-wide signature audit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationReport {
    pub checked: u64,
    pub failed_ids: Vec<String>,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.failed_ids.is_empty()
    }
}
