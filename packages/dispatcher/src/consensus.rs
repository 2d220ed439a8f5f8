//! BFT-style consensus ballots consulted by the Turnstile Resolver's
//! `quorum_ok` parameter whenever a QUARANTINE decision is under review.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ballot {
    pub ballot_id: String,
    pub session_id: String,
    pub proposal: serde_json::Value,
    pub votes: HashMap<String, bool>,
    pub required_voters: usize,
}

impl Ballot {
    pub fn new(session_id: impl Into<String>, proposal: serde_json::Value, required_voters: usize) -> Self {
        Self {
            ballot_id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            proposal,
            votes: HashMap::new(),
            required_voters,
        }
    }

    /// Strictly more than two-thirds of cast votes must approve.
    pub fn quorum_reached(&self) -> bool {
        if self.votes.is_empty() {
            return false;
        }
        let approvals = self.votes.values().filter(|v| **v).count();
        approvals * 3 > self.votes.len() * 2
    }

    pub fn all_voters_cast(&self) -> bool {
        self.votes.len() >= self.required_voters
    }
}

/// Tracks the single open ballot (if any) per session.
#[derive(Default)]
pub struct ConsensusTable {
    ballots: RwLock<HashMap<String, Ballot>>,
}

impl ConsensusTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open_ballot(&self, session_id: &str, proposal: serde_json::Value, required_voters: usize) -> Ballot {
        let ballot = Ballot::new(session_id, proposal, required_voters);
        self.ballots.write().await.insert(session_id.to_string(), ballot.clone());
        ballot
    }

    pub async fn cast_vote(&self, session_id: &str, voter_id: &str, approve: bool) -> Option<Ballot> {
        let mut ballots = self.ballots.write().await;
        let ballot = ballots.get_mut(session_id)?;
        ballot.votes.insert(voter_id.to_string(), approve);
        Some(ballot.clone())
    }

    pub async fn close_ballot(&self, session_id: &str) -> Option<Ballot> {
        self.ballots.write().await.remove(session_id)
    }

    /// `quorum_ok` for a session: true with no open ballot (the common
    /// case needs no consensus), otherwise whether the open ballot has
    /// reached quorum.
    pub async fn quorum_ok(&self, session_id: &str) -> bool {
        match self.ballots.read().await.get(session_id) {
            Some(ballot) => ballot.quorum_reached(),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_open_ballot_defaults_quorum_ok() {
        let table = ConsensusTable::new();
        assert!(table.quorum_ok("session-1").await);
    }

    #[tokio::test]
    async fn quorum_reached_above_two_thirds() {
        let table = ConsensusTable::new();
        table.open_ballot("session-1", serde_json::json!({}), 3).await;
        table.cast_vote("session-1", "voter-a", true).await;
        table.cast_vote("session-1", "voter-b", true).await;
        assert!(table.quorum_ok("session-1").await);
    }

    #[tokio::test]
    async fn quorum_not_reached_below_threshold() {
        let table = ConsensusTable::new();
        table.open_ballot("session-1", serde_json::json!({}), 3).await;
        table.cast_vote("session-1", "voter-a", true).await;
        table.cast_vote("session-1", "voter-b", false).await;
        assert!(!table.quorum_ok("session-1").await);
    }
}
