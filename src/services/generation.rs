//! Generation job lifecycle.
//!
//! `generate` debits credits and stores a `processing` record synchronously,
//! then hands the remote submit-and-poll work to a task owned by the
//! registry. The task settles the record exactly once, to completed or
//! failed; a failed job gets its cost credited back exactly once.

use std::collections::HashMap;
use std::sync::Arc;

use garde::Validate;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::job::{GenerationJob, GenerationRequest, JobStatus, RemoteJob};
use crate::services::credits::{estimate_credits, CreditError, CreditLedger};
use crate::services::retry::{poll_until, PollError, PollStep, RetryPolicy};
use crate::services::video_backend::{VideoBackend, VideoBackendError};

const CRASHED_MESSAGE: &str = "Generation stopped unexpectedly";

/// Terminal outcome applied to a job record.
#[derive(Debug, Clone)]
pub(crate) enum Resolution {
    Completed {
        video_url: Option<String>,
        thumbnail_url: Option<String>,
    },
    Failed(String),
}

struct JobEntry {
    job: GenerationJob,
    refunded: bool,
    updates: watch::Sender<GenerationJob>,
}

#[derive(Default)]
struct JobBook {
    /// Newest first.
    order: Vec<String>,
    entries: HashMap<String, JobEntry>,
}

/// Owns every generation job of a session and the tasks resolving them.
pub struct JobRegistry {
    ledger: Arc<CreditLedger>,
    backend: Arc<dyn VideoBackend>,
    policy: RetryPolicy,
    book: Mutex<JobBook>,
    tasks: Mutex<JoinSet<()>>,
}

impl JobRegistry {
    pub fn new(ledger: Arc<CreditLedger>, backend: Arc<dyn VideoBackend>, policy: RetryPolicy) -> Self {
        Self {
            ledger,
            backend,
            policy,
            book: Mutex::new(JobBook::default()),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn ledger(&self) -> &Arc<CreditLedger> {
        &self.ledger
    }

    /// Debit credits, record a `processing` job and start resolving it.
    ///
    /// Returns the optimistic draft immediately. Nothing is mutated when the
    /// request is invalid or the balance does not cover the cost.
    pub async fn generate(
        self: &Arc<Self>,
        request: GenerationRequest,
    ) -> Result<GenerationJob, GenerationError> {
        request
            .validate()
            .map_err(|e| GenerationError::Validation(e.to_string()))?;

        let cost = estimate_credits(&request);
        let balance = self.ledger.try_debit(cost).await?;

        let id = format!("vid-{}", Uuid::new_v4().simple());
        let draft = GenerationJob::draft(id.clone(), request.clone(), cost);
        let (updates, _) = watch::channel(draft.clone());

        {
            let mut book = self.book.lock().await;
            book.order.insert(0, id.clone());
            book.entries.insert(
                id.clone(),
                JobEntry {
                    job: draft.clone(),
                    refunded: false,
                    updates,
                },
            );
        }

        metrics::counter!("generation_jobs_total").increment(1);
        info!(
            job_id = %id,
            quality = %request.quality,
            credits_cost = cost,
            balance,
            "Generation job created"
        );

        let registry = Arc::clone(self);
        let mut tasks = self.tasks.lock().await;
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let resolver = Arc::clone(&registry);
            let job_id = id.clone();
            let outcome = tokio::spawn(async move { resolver.run(&job_id, &request).await }).await;

            // a crashed resolution still settles its job and refunds it
            if let Err(e) = outcome {
                warn!(job_id = %id, error = %e, "Generation task crashed");
                registry
                    .settle(&id, Resolution::Failed(CRASHED_MESSAGE.to_string()))
                    .await;
            }
        });

        Ok(draft)
    }

    pub async fn get(&self, id: &str) -> Option<GenerationJob> {
        let book = self.book.lock().await;
        book.entries.get(id).map(|entry| entry.job.clone())
    }

    /// Job history, newest first.
    pub async fn list(&self) -> Vec<GenerationJob> {
        let book = self.book.lock().await;
        book.order
            .iter()
            .filter_map(|id| book.entries.get(id))
            .map(|entry| entry.job.clone())
            .collect()
    }

    /// Wait until the job reaches completed or failed.
    pub async fn wait_for_terminal(&self, id: &str) -> Result<GenerationJob, GenerationError> {
        let mut updates = {
            let book = self.book.lock().await;
            book.entries
                .get(id)
                .ok_or_else(|| GenerationError::UnknownJob(id.to_string()))?
                .updates
                .subscribe()
        };

        let job = updates
            .wait_for(|job| job.status.is_terminal())
            .await
            .map_err(|_| GenerationError::UnknownJob(id.to_string()))?;
        Ok(job.clone())
    }

    /// Wait for every spawned resolution task to finish.
    pub async fn drain(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Generation task did not finish");
            }
        }
    }

    async fn run(&self, id: &str, request: &GenerationRequest) {
        let resolution = match self.resolve_remote(id, request).await {
            Ok(remote) if remote.status == JobStatus::Completed => Resolution::Completed {
                video_url: remote.video_url,
                thumbnail_url: remote.thumbnail_url,
            },
            Ok(remote) => {
                Resolution::Failed(remote.error.unwrap_or_else(|| "Generation failed".to_string()))
            }
            Err(e) => Resolution::Failed(e.to_string()),
        };

        self.settle(id, resolution).await;
    }

    /// Submit the request and poll the backend until it reports a terminal state.
    async fn resolve_remote(
        &self,
        id: &str,
        request: &GenerationRequest,
    ) -> Result<RemoteJob, GenerationError> {
        let submitted = self.backend.submit(request).await?;
        info!(job_id = %id, remote_job_id = %submitted.job_id, "Generation submitted");

        if submitted.status.is_terminal() {
            return Ok(submitted);
        }

        let remote_id = submitted.job_id;
        let result = poll_until(&self.policy, id, |attempt| {
            let backend = Arc::clone(&self.backend);
            let remote_id = remote_id.clone();
            async move {
                let remote = backend.poll_status(&remote_id).await?;
                debug!(
                    remote_job_id = %remote_id,
                    attempt,
                    status = %remote.status,
                    progress = remote.progress,
                    "Polled generation status"
                );
                if remote.status.is_terminal() {
                    Ok::<_, VideoBackendError>(PollStep::Ready(remote))
                } else {
                    Ok(PollStep::Pending)
                }
            }
        })
        .await;

        result.map_err(|e| match e {
            PollError::Exhausted { attempts } => GenerationError::Timeout { attempts },
            PollError::Failed(e) => GenerationError::Backend(e),
        })
    }

    /// Apply a terminal outcome. Later calls for an already settled job are
    /// ignored, so a job refunds at most once.
    pub(crate) async fn settle(&self, id: &str, resolution: Resolution) -> Option<GenerationJob> {
        let mut book = self.book.lock().await;
        let entry = book.entries.get_mut(id)?;

        if entry.job.status.is_terminal() {
            warn!(job_id = %id, status = %entry.job.status, "Job already settled, ignoring");
            return Some(entry.job.clone());
        }

        match resolution {
            Resolution::Completed {
                video_url,
                thumbnail_url,
            } => {
                entry.job.complete(video_url, thumbnail_url);
                metrics::counter!("generation_jobs_completed").increment(1);
                info!(job_id = %id, "Generation completed");
            }
            Resolution::Failed(message) => {
                warn!(job_id = %id, error = %message, "Generation failed");
                entry.job.fail(message);
                metrics::counter!("generation_jobs_failed").increment(1);

                if !entry.refunded {
                    entry.refunded = true;
                    let cost = entry.job.credits_cost;
                    let balance = self.ledger.credit(cost).await;
                    metrics::counter!("credits_refunded_total").increment(u64::from(cost));
                    info!(job_id = %id, refunded = cost, balance, "Credits refunded");
                }
            }
        }

        entry.updates.send_replace(entry.job.clone());
        Some(entry.job.clone())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Not enough credits for this generation (required {required}, available {available})")]
    InsufficientCredits { required: i64, available: i64 },

    #[error("Invalid generation request: {0}")]
    Validation(String),

    #[error("{0}")]
    Backend(#[from] VideoBackendError),

    #[error("Generation timed out after {attempts} status checks")]
    Timeout { attempts: u32 },

    #[error("Unknown generation job: {0}")]
    UnknownJob(String),
}

impl From<CreditError> for GenerationError {
    fn from(e: CreditError) -> Self {
        match e {
            CreditError::Insufficient {
                required,
                available,
            } => GenerationError::InsufficientCredits {
                required,
                available,
            },
            other => GenerationError::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::Quality;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Backend whose jobs never leave `processing`.
    struct StuckBackend;

    #[async_trait]
    impl VideoBackend for StuckBackend {
        async fn submit(&self, _request: &GenerationRequest) -> Result<RemoteJob, VideoBackendError> {
            Ok(RemoteJob::queued("remote-1"))
        }

        async fn poll_status(&self, job_id: &str) -> Result<RemoteJob, VideoBackendError> {
            let mut job = RemoteJob::queued(job_id);
            job.status = JobStatus::Processing;
            Ok(job)
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: "x".to_string(),
            theme: String::new(),
            style: String::new(),
            camera: String::new(),
            quality: Quality::Standard,
        }
    }

    fn stuck_registry(balance: i64) -> Arc<JobRegistry> {
        let policy = RetryPolicy {
            max_attempts: 1_000,
            interval: Duration::from_secs(60),
            ..RetryPolicy::generation()
        };
        Arc::new(JobRegistry::new(
            Arc::new(CreditLedger::new(balance)),
            Arc::new(StuckBackend),
            policy,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_refund_happens_once() {
        let registry = stuck_registry(140);
        let job = registry.generate(request()).await.unwrap();
        assert_eq!(registry.ledger().balance().await, 120);

        registry
            .settle(&job.id, Resolution::Failed("first".to_string()))
            .await
            .unwrap();
        let second = registry
            .settle(&job.id, Resolution::Failed("second".to_string()))
            .await
            .unwrap();

        assert_eq!(registry.ledger().balance().await, 140);
        assert_eq!(second.error_message.as_deref(), Some("first"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_job_cannot_fail_later() {
        let registry = stuck_registry(140);
        let job = registry.generate(request()).await.unwrap();

        registry
            .settle(
                &job.id,
                Resolution::Completed {
                    video_url: Some("https://cdn/v.mp4".to_string()),
                    thumbnail_url: None,
                },
            )
            .await;
        let after = registry
            .settle(&job.id, Resolution::Failed("late".to_string()))
            .await
            .unwrap();

        assert_eq!(after.status, JobStatus::Completed);
        assert_eq!(registry.ledger().balance().await, 120);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_request_mutates_nothing() {
        let registry = stuck_registry(140);
        let mut bad = request();
        bad.prompt = String::new();
        let err = registry.generate(bad).await.unwrap_err();
        assert!(matches!(err, GenerationError::Validation(_)));
        assert_eq!(registry.ledger().balance().await, 140);
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_job() {
        let registry = stuck_registry(140);
        assert!(registry.get("vid-missing").await.is_none());
        assert!(matches!(
            registry.wait_for_terminal("vid-missing").await,
            Err(GenerationError::UnknownJob(_))
        ));
    }
}
