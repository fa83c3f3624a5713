use super::types::AuthResult;

/// Log the outcome of one gatekeeper check for the realm `root`
pub fn record_outcome(root: &str, result: &AuthResult) {
    match result {
        Ok(success) => {
            let attempt = &success.attempt;
            tracing::info!(
                root,
                gatekeeper_id = %attempt.gatekeeper_id,
                username = attempt.username.as_deref().unwrap_or_default(),
                realm = attempt.realm.as_deref().unwrap_or_default(),
                "auth successful"
            );
        }
        Err(e) => {
            let attempt = e.attempt();
            tracing::info!(
                root,
                gatekeeper_id = %attempt.gatekeeper_id,
                username = attempt.username.as_deref().unwrap_or_default(),
                realm = attempt.realm.as_deref().unwrap_or_default(),
                attempted = attempt.attempted,
                error = %e,
                "auth failed"
            );
        }
    }
}
