use std::sync::Arc;

use crate::config::ServiceAvailability;
use crate::services::{
    campaign::CampaignShareOrchestrator,
    credits::CreditLedger,
    generation::JobRegistry,
    reward::RewardClaimVerifier,
    threads::ThreadsApi,
    threads_auth::{CallbackPrompt, ThreadsAuth},
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub availability: ServiceAvailability,
    pub jobs: Arc<JobRegistry>,
    pub auth: Arc<ThreadsAuth>,
    pub login_prompt: Arc<CallbackPrompt>,
    pub campaign: Arc<CampaignShareOrchestrator>,
    pub rewards: Arc<RewardClaimVerifier>,
}

impl AppState {
    pub fn new(
        availability: ServiceAvailability,
        jobs: JobRegistry,
        auth: ThreadsAuth,
        login_prompt: Arc<CallbackPrompt>,
        threads: Arc<dyn ThreadsApi>,
    ) -> Self {
        let auth = Arc::new(auth);
        Self {
            availability,
            jobs: Arc::new(jobs),
            campaign: Arc::new(CampaignShareOrchestrator::new(
                Arc::clone(&auth),
                Arc::clone(&threads),
            )),
            rewards: Arc::new(RewardClaimVerifier::new(Arc::clone(&auth), threads)),
            auth,
            login_prompt,
        }
    }

    pub fn ledger(&self) -> &Arc<CreditLedger> {
        self.jobs.ledger()
    }
}
