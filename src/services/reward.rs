use std::sync::Arc;

use tracing::{info, warn};

use crate::models::share::ClaimResult;
use crate::services::threads::ThreadsApi;
use crate::services::threads_auth::ThreadsAuth;

/// Grants campaign rewards only for posts that still exist on Threads.
///
/// Every claim re-queries Threads; earlier share results are never trusted.
pub struct RewardClaimVerifier {
    auth: Arc<ThreadsAuth>,
    api: Arc<dyn ThreadsApi>,
}

impl RewardClaimVerifier {
    pub fn new(auth: Arc<ThreadsAuth>, api: Arc<dyn ThreadsApi>) -> Self {
        Self { auth, api }
    }

    pub async fn claim_reward(&self, post_id: &str) -> ClaimResult {
        let result = self.check(post_id.trim()).await;

        let outcome = if result.granted { "granted" } else { "denied" };
        metrics::counter!("reward_claims_total", "outcome" => outcome).increment(1);
        match &result.reason {
            None => info!(post_id, "Reward claim granted"),
            Some(reason) => info!(post_id, reason = %reason, "Reward claim denied"),
        }
        result
    }

    async fn check(&self, post_id: &str) -> ClaimResult {
        if post_id.is_empty() {
            return denied("Missing post id");
        }

        let session = match self.auth.session().await {
            Ok(Some(session)) => session,
            Ok(None) => return denied("Please log in to Threads first"),
            Err(e) => return denied(e.to_string()),
        };

        match self.api.post_exists(&session, post_id).await {
            Ok(true) => ClaimResult {
                granted: true,
                reason: None,
            },
            Ok(false) => denied("Post not found on Threads"),
            Err(e) => {
                warn!(post_id, error = %e, "Post lookup failed");
                denied(format!("Could not verify post: {e}"))
            }
        }
    }
}

fn denied(reason: impl Into<String>) -> ClaimResult {
    ClaimResult {
        granted: false,
        reason: Some(reason.into()),
    }
}
