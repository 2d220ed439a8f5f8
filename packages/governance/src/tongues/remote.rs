//! Optional external policy tongue: augments but never replaces the
//! mandatory semantic antivirus tongue.
//!
//! `evaluate` is synchronous and must never block on network I/O — the
//! Governance Evaluator is invoked from inside the Dispatcher's async
//! context. A background task polls `SCBE_URL` independently and refreshes
//! a cache; `evaluate` only ever reads that cache, defaulting to neutral
//! when no verdict has arrived yet.

use super::{Tongue, TongueContext, TongueContribution};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const POLL_INTERVAL: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_millis(800);

#[derive(Debug, Deserialize)]
struct RemoteVerdict {
    factor: f64,
    #[serde(default)]
    reason: Option<String>,
}

pub struct RemoteTongue {
    cache: Arc<RwLock<TongueContribution>>,
}

impl RemoteTongue {
    /// Spawns the background poller against `url`. Must be called from
    /// within a running Tokio runtime.
    pub fn spawn(url: String) -> Self {
        let cache = Arc::new(RwLock::new(TongueContribution::neutral()));
        let poll_cache = cache.clone();
        tokio::spawn(async move {
            let client = match reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build() {
                Ok(client) => client,
                Err(e) => {
                    tracing::error!(error = %e, "failed to build remote policy client");
                    return;
                }
            };
            loop {
                match client.get(&url).send().await.and_then(|r| r.error_for_status()) {
                    Ok(response) => match response.json::<RemoteVerdict>().await {
                        Ok(verdict) => {
                            *poll_cache.write().await = TongueContribution {
                                factor: verdict.factor.clamp(0.0, 1.0),
                                evidence: serde_json::json!({"source": "remote", "reason": verdict.reason}),
                            };
                        }
                        Err(e) => tracing::warn!(error = %e, url, "remote policy response malformed"),
                    },
                    Err(e) => tracing::warn!(error = %e, url, "remote policy poll failed"),
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        });
        Self { cache }
    }
}

impl Tongue for RemoteTongue {
    fn id(&self) -> &'static str {
        "remote_policy"
    }

    fn evaluate(&self, _ctx: &TongueContext<'_>) -> TongueContribution {
        self.cache.try_read().map(|g| g.clone()).unwrap_or_else(|_| TongueContribution::neutral())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_defaults_to_neutral_before_any_poll() {
        let cache = Arc::new(RwLock::new(TongueContribution::neutral()));
        let tongue = RemoteTongue { cache };
        let ctx = TongueContext {
            action: "navigate",
            target: "https://example.com",
            payload: None,
        };
        let contribution = tongue.evaluate(&ctx);
        assert_eq!(contribution.factor, 1.0);
    }
}
