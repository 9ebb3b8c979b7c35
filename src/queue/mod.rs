//! Priority job queue service (C9).
//!
//! Thin service layer over `mediarch_db::queries::jobs`'s atomic claim,
//! plus a bounded worker pool that polls the queue and dispatches each
//! claimed job to the handler registered for its `JobKind`. Generalizes the
//! conversion pipeline's single-purpose dequeue loop into a kind-dispatched
//! dispatcher so the enrichment, publish, and notify handlers can share one
//! queue and one pool of workers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mediarch_common::{JobKind, JobPriority, Result};
use mediarch_db::models::{Job, JobStatus};
use mediarch_db::pool::{get_conn, DbPool};
use mediarch_db::queries::jobs::{self, FailOutcome};
use mediarch_db::queries::activity_log;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Implemented once per `JobKind` by the module that owns that kind of
/// work (enrichment orchestrator, publisher, notifier, scanners).
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<()>;
}

#[derive(Default)]
pub struct JobDispatcher {
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
}

impl JobDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: JobKind, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(kind, handler);
    }

    fn get(&self, kind: JobKind) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(&kind).cloned()
    }
}

/// Enqueue a job, deduplicating on `dedup_key` when given.
pub fn enqueue(
    pool: &DbPool,
    kind: JobKind,
    priority: JobPriority,
    payload: serde_json::Value,
    manual: bool,
    dedup_key: Option<&str>,
) -> Result<Job> {
    let conn = get_conn(pool)?;
    jobs::enqueue(&conn, kind, priority, &payload, manual, dedup_key)
}

pub fn stats(pool: &DbPool) -> Result<Vec<(JobStatus, i64)>> {
    let conn = get_conn(pool)?;
    jobs::get_stats(&conn)
}

/// Return jobs stuck in `processing` past `stale_after` back to `pending`,
/// for crash recovery at startup.
pub fn reclaim_stalled(pool: &DbPool, stale_after: Duration) -> Result<usize> {
    let conn = get_conn(pool)?;
    let cutoff = chrono::Utc::now() - chrono::Duration::from_std(stale_after).unwrap_or_default();
    jobs::reset_stalled(&conn, cutoff)
}

pub struct WorkerPoolConfig {
    pub concurrency: usize,
    pub poll_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Runs until `cancel` fires, continuously claiming and dispatching jobs
/// with at most `concurrency` handlers running at once.
pub async fn run_worker_pool(
    pool: DbPool,
    dispatcher: Arc<JobDispatcher>,
    config: WorkerPoolConfig,
    cancel: CancellationToken,
) {
    let semaphore = Arc::new(Semaphore::new(config.concurrency));

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let claimed = match get_conn(&pool) {
            Ok(conn) => jobs::pick_next(&conn).ok().flatten(),
            Err(e) => {
                error!(error = %e, "failed to get db connection for job claim");
                None
            }
        };

        let Some(job) = claimed else {
            tokio::select! {
                _ = tokio::time::sleep(config.poll_interval) => {}
                _ = cancel.cancelled() => break,
            }
            continue;
        };

        let permit = match semaphore.clone().acquire_owned().await {
            Ok(p) => p,
            Err(_) => break,
        };

        let pool = pool.clone();
        let dispatcher = dispatcher.clone();

        tokio::spawn(async move {
            let _permit = permit;
            dispatch_one(&pool, &dispatcher, job).await;
        });
    }
}

fn record_permanent_failure(pool: &DbPool, job: &Job, error_message: &str) {
    let Ok(conn) = get_conn(pool) else { return };
    let movie_id = job
        .payload
        .get("movie_id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok());
    let message = format!("job {} ({}) permanently failed: {error_message}", job.id, job.kind);
    if let Err(e) = activity_log::record(&conn, "error", &message, movie_id, Some(job.id)) {
        error!(error = %e, job_id = %job.id, "failed to write activity log entry for job failure");
    }
}

async fn dispatch_one(pool: &DbPool, dispatcher: &JobDispatcher, job: Job) {
    let Some(handler) = dispatcher.get(job.kind) else {
        warn!(kind = %job.kind, job_id = %job.id, "no handler registered for job kind, failing job");
        if let Ok(conn) = get_conn(pool) {
            if let Ok(FailOutcome::TerminallyFailed) = jobs::fail(&conn, job.id) {
                record_permanent_failure(pool, &job, "no handler registered for job kind");
            }
        }
        return;
    };

    match handler.handle(&job).await {
        Ok(()) => {
            info!(job_id = %job.id, kind = %job.kind, "job completed");
            if let Ok(conn) = get_conn(pool) {
                if let Err(e) = jobs::complete(&conn, job.id) {
                    error!(error = %e, job_id = %job.id, "failed to mark job completed");
                }
            }
        }
        Err(e) => {
            warn!(error = %e, job_id = %job.id, kind = %job.kind, "job failed");
            if let Ok(conn) = get_conn(pool) {
                match jobs::fail(&conn, job.id) {
                    Ok(FailOutcome::Requeued) => info!(job_id = %job.id, "job requeued for retry"),
                    Ok(FailOutcome::TerminallyFailed) => {
                        warn!(job_id = %job.id, "job permanently failed");
                        record_permanent_failure(pool, &job, &e.to_string());
                    }
                    Err(fail_err) => error!(error = %fail_err, job_id = %job.id, "failed to record job failure"),
                }
            }
        }
    }
}

/// Trigger a named job kind immediately, outside its normal cadence, using
/// `Manual` priority so it jumps ahead of background work.
pub fn trigger_now(pool: &DbPool, kind: JobKind, payload: serde_json::Value, dedup_key: Option<&str>) -> Result<Job> {
    enqueue(pool, kind, JobPriority::MANUAL, payload, true, dedup_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediarch_common::Error;
    use mediarch_db::pool::init_memory_pool;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
        fail_first_n: usize,
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        async fn handle(&self, _job: &Job) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first_n {
                return Err(Error::internal("synthetic failure"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatches_to_registered_handler() {
        let pool = init_memory_pool().unwrap();
        enqueue(&pool, JobKind::Enrich, JobPriority::BACKGROUND, serde_json::json!({}), false, None).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = JobDispatcher::new();
        dispatcher.register(
            JobKind::Enrich,
            Arc::new(CountingHandler { calls: calls.clone(), fail_first_n: 0 }),
        );

        let conn = get_conn(&pool).unwrap();
        let job = jobs::pick_next(&conn).unwrap().unwrap();
        drop(conn);

        dispatch_one(&pool, &dispatcher, job.clone()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = stats(&pool).unwrap();
        let total: i64 = stats.iter().map(|(_, c)| *c).sum();
        assert_eq!(total, 0, "a completed job is removed from the queue, not left in a terminal status");

        let conn = get_conn(&pool).unwrap();
        assert!(jobs::get(&conn, job.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn unregistered_kind_fails_job_immediately() {
        let pool = init_memory_pool().unwrap();
        enqueue(&pool, JobKind::Publish, JobPriority::BACKGROUND, serde_json::json!({}), false, None).unwrap();

        let dispatcher = JobDispatcher::new();
        let conn = get_conn(&pool).unwrap();
        let job = jobs::pick_next(&conn).unwrap().unwrap();
        drop(conn);

        dispatch_one(&pool, &dispatcher, job.clone()).await;

        let conn = get_conn(&pool).unwrap();
        let fetched = jobs::get(&conn, job.id).unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn failing_handler_requeues_job_until_retries_exhausted() {
        let pool = init_memory_pool().unwrap();
        enqueue(&pool, JobKind::Enrich, JobPriority::BACKGROUND, serde_json::json!({}), false, None).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = JobDispatcher::new();
        dispatcher.register(
            JobKind::Enrich,
            Arc::new(CountingHandler { calls: calls.clone(), fail_first_n: 10 }),
        );

        for _ in 0..3 {
            let conn = get_conn(&pool).unwrap();
            let job = jobs::pick_next(&conn).unwrap();
            drop(conn);
            if let Some(job) = job {
                dispatch_one(&pool, &dispatcher, job).await;
            }
        }

        let conn = get_conn(&pool).unwrap();
        assert!(jobs::pick_next(&conn).unwrap().is_none());
    }

    #[test]
    fn trigger_now_uses_manual_priority() {
        let pool = init_memory_pool().unwrap();
        let job = trigger_now(&pool, JobKind::FileScan, serde_json::json!({}), None).unwrap();
        assert_eq!(job.priority, JobPriority::MANUAL);
        assert!(job.manual);
    }
}
