//! One-shot identity acquisition with local fallback

use tracing::{debug, info, warn};

use super::{Identity, IdentityError, IdentityProvider};

/// Result of acquiring the session identity
///
/// Acquisition never fails outright: when the provider cannot be used the
/// identity is a local fallback and `warning` says why.
#[derive(Debug, Clone)]
pub struct IdentityOutcome {
    pub identity: Identity,
    /// User-visible warning when the session runs on a degraded identity
    pub warning: Option<String>,
}

impl IdentityOutcome {
    pub fn is_degraded(&self) -> bool {
        self.warning.is_some()
    }
}

/// Short reason for one failed sign-in attempt
fn describe_failure(attempt: &str, err: &IdentityError) -> String {
    if err.is_rejection() {
        format!("{} was rejected: {}", attempt, err)
    } else {
        format!("{} could not reach the provider: {}", attempt, err)
    }
}

/// Obtain the session identity
///
/// Order: an identity the provider already holds, then the continuation
/// token (if any), then an anonymous sign-in. If every attempted sign-in
/// fails, a random local identifier is used instead.
pub async fn acquire_identity(provider: &dyn IdentityProvider, continuation_token: Option<&str>) -> IdentityOutcome {
    debug!(has_token = continuation_token.is_some(), "acquire_identity: called");

    if let Some(identity) = provider.current().await {
        info!(user_id = %identity.user_id, "Reusing active identity");
        return IdentityOutcome {
            identity,
            warning: None,
        };
    }

    let mut failures = Vec::new();

    if let Some(token) = continuation_token.filter(|t| !t.trim().is_empty()) {
        debug!("acquire_identity: exchanging continuation token");
        match provider.sign_in_with_token(token).await {
            Ok(identity) => {
                info!(user_id = %identity.user_id, "Signed in with continuation token");
                return IdentityOutcome {
                    identity,
                    warning: None,
                };
            }
            Err(e) => {
                warn!(error = %e, "acquire_identity: token sign-in failed, trying anonymous");
                failures.push(describe_failure("token sign-in", &e));
            }
        }
    }

    match provider.sign_in_anonymously().await {
        Ok(identity) => {
            info!(user_id = %identity.user_id, "Signed in anonymously");
            let warning = (!failures.is_empty()).then(|| {
                format!(
                    "Continuation token was not accepted ({}); continuing anonymously",
                    failures.join("; ")
                )
            });
            IdentityOutcome { identity, warning }
        }
        Err(e) => {
            failures.push(describe_failure("anonymous sign-in", &e));
            let identity = Identity::local_fallback();
            warn!(
                user_id = %identity.user_id,
                failures = %failures.join("; "),
                "acquire_identity: provider unavailable, using local fallback identity"
            );
            IdentityOutcome {
                identity,
                warning: Some(format!(
                    "Could not sign in ({}). Your edits will be attributed to a temporary local id.",
                    failures.join("; ")
                )),
            }
        }
    }
}
