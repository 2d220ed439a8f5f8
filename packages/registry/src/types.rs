//! Head, Limb, and inter-head message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Capacity of a head's inbound message queue. Oldest message is dropped
/// on overflow rather than blocking the sender.
pub const MAILBOX_CAPACITY: usize = 1024;

/// Tokens that cause `SendMessage` to deny a message outright, scanned
/// case-insensitively against the serialized message body.
pub const FORBIDDEN_TOKENS: &[&str] = &[
    "ignore",
    "override",
    "sudo",
    "admin",
    "forget",
    "disregard",
    "system prompt",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadStatus {
    Active,
    Idle,
    Disconnected,
}

/// A connected AI head: the source of action commands and messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Head {
    pub head_id: String,
    pub ai_type: String,
    pub model: String,
    pub callsign: Option<String>,
    pub status: HeadStatus,
    pub action_count: u64,
    pub error_count: u64,
    pub connected_at: DateTime<Utc>,
    #[serde(skip)]
    pub message_queue: VecDeque<InboxMessage>,
}

impl Head {
    pub fn new(head_id: impl Into<String>, ai_type: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            head_id: head_id.into(),
            ai_type: ai_type.into(),
            model: model.into(),
            callsign: None,
            status: HeadStatus::Active,
            action_count: 0,
            error_count: 0,
            connected_at: Utc::now(),
            message_queue: VecDeque::new(),
        }
    }

    pub fn with_callsign(mut self, callsign: impl Into<String>) -> Self {
        self.callsign = Some(callsign.into());
        self
    }

    /// Push onto the mailbox, dropping the oldest entry if at capacity.
    pub fn enqueue(&mut self, message: InboxMessage) {
        if self.message_queue.len() >= MAILBOX_CAPACITY {
            self.message_queue.pop_front();
        }
        self.message_queue.push_back(message);
    }
}

/// A message delivered to a head's mailbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxMessage {
    pub from_head: String,
    pub body: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimbKind {
    Browser,
    Terminal,
    Api,
    MultiBrowser,
}

impl LimbKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimbKind::Browser => "browser",
            LimbKind::Terminal => "terminal",
            LimbKind::Api => "api",
            LimbKind::MultiBrowser => "multi_browser",
        }
    }
}

/// A connected execution limb (the registry's bookkeeping view, distinct
/// from the dispatcher's `Limb` trait object that actually executes verbs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limb {
    pub limb_id: String,
    pub kind: LimbKind,
    pub active: bool,
    pub action_count: u64,
    pub activated_at: DateTime<Utc>,
}

impl Limb {
    pub fn new(limb_id: impl Into<String>, kind: LimbKind) -> Self {
        Self {
            limb_id: limb_id.into(),
            kind,
            active: true,
            action_count: 0,
            activated_at: Utc::now(),
        }
    }
}

/// Result of a `SendMessage` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOutcome {
    pub success: bool,
    pub decision: &'static str,
    pub reason: Option<String>,
}

impl SendOutcome {
    pub fn delivered() -> Self {
        Self {
            success: true,
            decision: "ALLOW",
            reason: None,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            decision: "DENY",
            reason: Some(reason.into()),
        }
    }
}
