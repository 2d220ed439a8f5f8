//! Sensitivity inference for commands that don't carry an explicit value.

const MEDIUM_RISK_TOKENS: &[&str] = &["login", "auth", "account", "config", "credentials", "env"];
const HIGH_RISK_TOKENS: &[&str] = &[
    "password", "secret", "token", "admin", "delete", "rm", "sudo", "bank", "payment",
];

fn base_sensitivity(action: &str) -> f64 {
    match action {
        "navigate" => 0.2,
        "click" => 0.3,
        "type" => 0.4,
        "run" => 0.6,
        "api" => 0.5,
        "message" => 0.3,
        "workflow" => 0.5,
        "recall" => 0.1,
        "remember" => 0.2,
        _ => 0.3,
    }
}

/// Infer a sensitivity score in `[0, 1]` for a command lacking an explicit
/// value: a per-action base adjusted by risk tokens found in the target
/// and serialized params.
pub fn infer_sensitivity(action: &str, target: &str, params: &serde_json::Value) -> f64 {
    let mut score = base_sensitivity(action);

    let haystack = format!("{target} {params}").to_lowercase();
    if HIGH_RISK_TOKENS.iter().any(|t| haystack.contains(t)) {
        score += 0.30;
    } else if MEDIUM_RISK_TOKENS.iter().any(|t| haystack.contains(t)) {
        score += 0.15;
    }

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigate_has_low_base_sensitivity() {
        assert_eq!(infer_sensitivity("navigate", "https://example.com", &serde_json::json!({})), 0.2);
    }

    #[test]
    fn run_with_sudo_hits_high_risk_bonus() {
        let score = infer_sensitivity("run", "sudo rm -rf /tmp/x", &serde_json::json!({}));
        assert!((score - 0.90).abs() < 1e-9);
    }

    #[test]
    fn type_with_login_hits_medium_risk_bonus() {
        let score = infer_sensitivity("type", "#login-form", &serde_json::json!({}));
        assert!((score - 0.55).abs() < 1e-9);
    }

    #[test]
    fn high_risk_token_in_params_is_also_detected() {
        let score = infer_sensitivity("api", "https://example.com/users", &serde_json::json!({"field": "password"}));
        assert!((score - 0.80).abs() < 1e-9);
    }
}
