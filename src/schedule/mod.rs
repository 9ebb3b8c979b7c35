//! Per-library cadence schedulers (C12) and the garbage collector (C13).
//!
//! Two tokio tasks tick independently: one ticks every `tick_interval_secs`
//! and enqueues `fileScan`/`providerUpdate` jobs for libraries whose cadence
//! has elapsed; the other fires once a day at a configured local hour and
//! runs the garbage collector. Both are plain polling loops guarded by a
//! `CancellationToken`, in the same shape as the job queue's worker pool.

pub mod gc;

use std::time::Duration;

use mediarch_common::{JobKind, JobPriority, LibraryId, Result};
use mediarch_db::pool::{get_conn, DbPool};
use mediarch_db::queries::{libraries, library_scheduler_config as scheduler_config};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::SchedulerConfig;
use crate::queue;

/// Check every library's scheduler config once; enqueue `fileScan` and/or
/// `providerUpdate` for any whose interval has elapsed since its last run.
/// Idempotent within a tick: a library whose dedup key is already queued
/// does not get a second job.
pub fn tick(pool: &DbPool) -> Result<()> {
    let conn = get_conn(pool)?;
    let configs = scheduler_config::list(&conn)?;
    let now = chrono::Utc::now();

    for config in configs {
        if config.file_scanner_enabled && due(config.last_file_scan_at, config.file_scanner_interval_hours, now) {
            enqueue_file_scan(pool, config.library_id)?;
        }
        if config.provider_updater_enabled
            && due(config.last_provider_update_at, config.provider_updater_interval_hours, now)
        {
            enqueue_provider_update(pool, config.library_id)?;
        }
    }

    Ok(())
}

fn due(last_run: Option<chrono::DateTime<chrono::Utc>>, interval_hours: i32, now: chrono::DateTime<chrono::Utc>) -> bool {
    match last_run {
        None => true,
        Some(last) => now - last >= chrono::Duration::hours(interval_hours as i64),
    }
}

fn dedup_key(prefix: &str, library_id: LibraryId) -> String {
    format!("{prefix}:{library_id}")
}

fn enqueue_file_scan(pool: &DbPool, library_id: LibraryId) -> Result<()> {
    let key = dedup_key("fileScan", library_id);
    queue::enqueue(
        pool,
        JobKind::FileScan,
        JobPriority::BACKGROUND,
        serde_json::json!({ "library_id": library_id }),
        false,
        Some(&key),
    )?;
    let conn = get_conn(pool)?;
    scheduler_config::record_file_scan(&conn, library_id)?;
    info!(%library_id, "enqueued scheduled file scan");
    Ok(())
}

fn enqueue_provider_update(pool: &DbPool, library_id: LibraryId) -> Result<()> {
    let key = dedup_key("providerUpdate", library_id);
    queue::enqueue(
        pool,
        JobKind::ProviderUpdate,
        JobPriority::BACKGROUND,
        serde_json::json!({ "library_id": library_id }),
        false,
        Some(&key),
    )?;
    let conn = get_conn(pool)?;
    scheduler_config::record_provider_update(&conn, library_id)?;
    info!(%library_id, "enqueued scheduled provider update");
    Ok(())
}

/// Enqueue a scan or update immediately, outside its normal cadence.
pub fn trigger_now(pool: &DbPool, library_id: LibraryId, kind: JobKind) -> Result<()> {
    if libraries::get_library(&get_conn(pool)?, library_id)?.is_none() {
        return Err(mediarch_common::Error::not_found("library"));
    }
    let key = dedup_key(&format!("manual:{kind}"), library_id);
    queue::trigger_now(pool, kind, serde_json::json!({ "library_id": library_id }), Some(&key))?;
    Ok(())
}

/// Run `tick` on a fixed interval until cancelled.
pub async fn run_scheduler_loop(pool: DbPool, config: SchedulerConfig, cancel: CancellationToken) {
    let interval = Duration::from_secs(config.tick_interval_secs);
    loop {
        if let Err(e) = tick(&pool) {
            error!(error = %e, "scheduler tick failed");
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => {
                warn!("scheduler loop cancelled");
                break;
            }
        }
    }
}

/// Handles `fileScan` jobs: walks a library's root directory, registers
/// every video file as an unidentified movie (idempotent on path), trimmed
/// of any codec/quality classification.
pub struct FileScanHandler {
    pool: DbPool,
}

impl FileScanHandler {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl queue::JobHandler for FileScanHandler {
    async fn handle(&self, job: &mediarch_db::models::Job) -> Result<()> {
        let library_id: LibraryId = job
            .payload
            .get("library_id")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| mediarch_common::Error::invalid_input("fileScan payload missing library_id"))?;

        let conn = get_conn(&self.pool)?;
        let library = libraries::get_library(&conn, library_id)?
            .ok_or_else(|| mediarch_common::Error::not_found("library"))?;

        let mut discovered = 0;
        for entry in walkdir::WalkDir::new(&library.root_path).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_dir() || !mediarch_common::paths::is_video_file(path) {
                continue;
            }
            mediarch_db::queries::movies::upsert_by_path(&conn, library_id, &path.to_string_lossy())?;
            discovered += 1;
        }

        info!(%library_id, discovered, "file scan completed");
        Ok(())
    }
}

/// Handles `providerUpdate` jobs: for every monitored, identified movie in
/// the library, enqueues an `enrich` job so the orchestrator refreshes its
/// metadata and assets from providers.
pub struct ProviderUpdateHandler {
    pool: DbPool,
}

impl ProviderUpdateHandler {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl queue::JobHandler for ProviderUpdateHandler {
    async fn handle(&self, job: &mediarch_db::models::Job) -> Result<()> {
        let library_id: LibraryId = job
            .payload
            .get("library_id")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| mediarch_common::Error::invalid_input("providerUpdate payload missing library_id"))?;

        let conn = get_conn(&self.pool)?;
        let candidates: Vec<_> = mediarch_db::queries::movies::list_by_library(&conn, library_id)?
            .into_iter()
            .filter(|m| m.monitored && m.status != mediarch_common::EnrichmentStatus::Unidentified)
            .collect();
        drop(conn);

        for movie in &candidates {
            queue::enqueue(
                &self.pool,
                JobKind::Enrich,
                JobPriority::BACKGROUND,
                serde_json::json!({ "movie_id": movie.id }),
                false,
                Some(&format!("enrich:{}", movie.id)),
            )?;
        }

        info!(%library_id, enqueued = candidates.len(), "provider update completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediarch_common::MediaType;
    use mediarch_db::pool::init_memory_pool;
    use mediarch_db::queries::jobs;

    fn setup_library(pool: &DbPool) -> LibraryId {
        let conn = get_conn(pool).unwrap();
        let library = libraries::create_library(&conn, "Movies", "/media/movies", MediaType::Movie).unwrap();
        scheduler_config::get_or_create_default(&conn, library.id).unwrap();
        library.id
    }

    #[test]
    fn tick_enqueues_due_libraries() {
        let pool = init_memory_pool().unwrap();
        setup_library(&pool);

        tick(&pool).unwrap();

        let conn = get_conn(&pool).unwrap();
        let stats = jobs::get_stats(&conn).unwrap();
        let pending: i64 = stats.iter().filter(|(s, _)| *s == mediarch_db::models::JobStatus::Pending).map(|(_, c)| *c).sum();
        assert_eq!(pending, 2);
    }

    #[test]
    fn tick_is_not_due_twice_in_a_row() {
        let pool = init_memory_pool().unwrap();
        setup_library(&pool);

        tick(&pool).unwrap();
        tick(&pool).unwrap();

        let conn = get_conn(&pool).unwrap();
        let stats = jobs::get_stats(&conn).unwrap();
        let pending: i64 = stats.iter().filter(|(s, _)| *s == mediarch_db::models::JobStatus::Pending).map(|(_, c)| *c).sum();
        assert_eq!(pending, 2, "second tick must not re-enqueue an already-fresh library");
    }

    #[test]
    fn trigger_now_bypasses_cadence() {
        let pool = init_memory_pool().unwrap();
        let library_id = setup_library(&pool);

        trigger_now(&pool, library_id, JobKind::FileScan).unwrap();

        let conn = get_conn(&pool).unwrap();
        let stats = jobs::get_stats(&conn).unwrap();
        let pending: i64 = stats.iter().filter(|(s, _)| *s == mediarch_db::models::JobStatus::Pending).map(|(_, c)| *c).sum();
        assert_eq!(pending, 1);
    }

    #[test]
    fn trigger_now_rejects_unknown_library() {
        let pool = init_memory_pool().unwrap();
        let bogus = LibraryId::new();
        assert!(trigger_now(&pool, bogus, JobKind::FileScan).is_err());
    }
}
