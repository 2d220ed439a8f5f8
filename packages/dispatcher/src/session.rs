//! Session-scoped state held by the Dispatcher: `antibody_load` and
//! `membrane_stress` accumulate per session and are threaded through the
//! otherwise-pure Turnstile Resolver as explicit arguments/return values.

use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionState {
    pub antibody_load: f64,
    pub membrane_stress: f64,
}

#[derive(Default)]
pub struct SessionTable {
    sessions: RwLock<HashMap<String, SessionState>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, session_id: &str) -> SessionState {
        self.sessions.read().await.get(session_id).copied().unwrap_or_default()
    }

    pub async fn set(&self, session_id: &str, state: SessionState) {
        self.sessions.write().await.insert(session_id.to_string(), state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_session_defaults_to_zero() {
        let table = SessionTable::new();
        let state = table.get("unknown").await;
        assert_eq!(state.antibody_load, 0.0);
        assert_eq!(state.membrane_stress, 0.0);
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let table = SessionTable::new();
        table
            .set(
                "session-1",
                SessionState {
                    antibody_load: 0.5,
                    membrane_stress: 0.25,
                },
            )
            .await;
        let state = table.get("session-1").await;
        assert_eq!(state.antibody_load, 0.5);
        assert_eq!(state.membrane_stress, 0.25);
    }
}
