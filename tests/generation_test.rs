mod helpers;

use std::sync::Arc;

use futures::future::join_all;
use reel_campaign::models::job::{JobStatus, Quality};
use reel_campaign::services::credits::estimate_credits;
use reel_campaign::services::generation::GenerationError;
use tokio_test::assert_ok;

use helpers::{registry, request, PollReply, ScriptedVideoBackend};

#[tokio::test(start_paused = true)]
async fn test_completed_job_keeps_single_debit() {
    let backend = Arc::new(ScriptedVideoBackend::completing_after(2));
    let jobs = registry(140, Arc::clone(&backend));

    let job = assert_ok!(jobs.generate(request("x", Quality::Standard)).await);
    assert_eq!(job.status, JobStatus::Processing);
    assert_eq!(job.credits_cost, 20);
    assert_eq!(jobs.ledger().balance().await, 120);

    let done = jobs.wait_for_terminal(&job.id).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.video_url.is_some());
    assert!(done.error_message.is_none());
    assert_eq!(jobs.ledger().balance().await, 120);
    assert_eq!(backend.poll_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_job_is_refunded() {
    let backend = Arc::new(ScriptedVideoBackend::new(
        vec![PollReply::Pending],
        PollReply::Failed("Content policy violation"),
    ));
    let jobs = registry(140, backend);

    let job = jobs.generate(request("x", Quality::Standard)).await.unwrap();
    assert_eq!(jobs.ledger().balance().await, 120);

    let done = jobs.wait_for_terminal(&job.id).await.unwrap();
    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.error_message.as_deref(), Some("Content policy violation"));
    assert!(done.video_url.is_none());
    assert_eq!(jobs.ledger().balance().await, 140);
}

#[tokio::test(start_paused = true)]
async fn test_error_mid_poll_fails_and_refunds() {
    let backend = Arc::new(ScriptedVideoBackend::new(
        vec![PollReply::Pending, PollReply::Error("upstream 502")],
        PollReply::Completed,
    ));
    let jobs = registry(140, Arc::clone(&backend));

    let job = jobs.generate(request("x", Quality::High)).await.unwrap();
    assert_eq!(jobs.ledger().balance().await, 110);

    let done = jobs.wait_for_terminal(&job.id).await.unwrap();
    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.error_message.unwrap().contains("upstream 502"));
    assert_eq!(jobs.ledger().balance().await, 140);
    assert_eq!(backend.poll_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_crashed_resolution_fails_and_refunds() {
    let backend = Arc::new(ScriptedVideoBackend::new(vec![PollReply::Pending], PollReply::Panic));
    let jobs = registry(140, Arc::clone(&backend));

    let job = jobs.generate(request("x", Quality::Standard)).await.unwrap();
    assert_eq!(jobs.ledger().balance().await, 120);

    let done = jobs.wait_for_terminal(&job.id).await.unwrap();
    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.error_message.is_some());
    assert_eq!(jobs.ledger().balance().await, 140);

    jobs.drain().await;
    assert_eq!(jobs.get(&job.id).await.unwrap().status, JobStatus::Failed);
    assert_eq!(jobs.ledger().balance().await, 140);
}

#[tokio::test(start_paused = true)]
async fn test_poll_budget_exhaustion_times_out() {
    let backend = Arc::new(ScriptedVideoBackend::new(vec![], PollReply::Pending));
    let jobs = registry(140, Arc::clone(&backend));

    let job = jobs.generate(request("x", Quality::Standard)).await.unwrap();
    let done = jobs.wait_for_terminal(&job.id).await.unwrap();

    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.error_message.unwrap().contains("timed out"));
    assert_eq!(jobs.ledger().balance().await, 140);
    assert_eq!(backend.poll_count(), 60);
}

#[tokio::test(start_paused = true)]
async fn test_insufficient_credits_mutates_nothing() {
    let backend = Arc::new(ScriptedVideoBackend::completing_after(0));
    let jobs = registry(25, Arc::clone(&backend));

    let err = jobs
        .generate(request("x", Quality::High))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GenerationError::InsufficientCredits {
            required: 30,
            available: 25
        }
    ));
    assert_eq!(jobs.ledger().balance().await, 25);
    assert!(jobs.list().await.is_empty());

    jobs.drain().await;
    assert_eq!(backend.submit_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_generations_never_overspend() {
    let backend = Arc::new(ScriptedVideoBackend::completing_after(1));
    let jobs = registry(50, backend);

    let attempts = (0..5).map(|i| {
        let jobs = Arc::clone(&jobs);
        async move { jobs.generate(request(&format!("clip {i}"), Quality::Standard)).await }
    });
    let results = join_all(attempts).await;

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(GenerationError::InsufficientCredits { .. })))
        .count();
    assert_eq!(accepted, 2);
    assert_eq!(rejected, 3);
    assert_eq!(jobs.ledger().balance().await, 10);

    jobs.drain().await;
    assert_eq!(jobs.ledger().balance().await, 10);
}

#[tokio::test(start_paused = true)]
async fn test_history_is_newest_first() {
    let backend = Arc::new(ScriptedVideoBackend::completing_after(0));
    let jobs = registry(140, backend);

    let first = jobs.generate(request("first", Quality::Standard)).await.unwrap();
    let second = jobs.generate(request("second", Quality::Standard)).await.unwrap();
    jobs.drain().await;

    let history = jobs.list().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, second.id);
    assert_eq!(history[1].id, first.id);
    assert!(history.iter().all(|job| job.status == JobStatus::Completed));
}

#[test]
fn test_estimate_is_pure() {
    let req = request("x", Quality::High);
    assert_eq!(estimate_credits(&req), estimate_credits(&req));
    assert_eq!(estimate_credits(&request("x", Quality::Standard)), 20);
}
