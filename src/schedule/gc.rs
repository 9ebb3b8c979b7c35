//! Garbage collector (C13).
//!
//! Runs once a day at a configured local hour: permanently purges
//! soft-deleted movies past their grace period, sweeps every cache table
//! for hashes no longer referenced by a `library_*_files` row and deletes
//! both the row and the underlying blob, then walks the cache directory
//! tree itself (the scanner's `WalkDir` shape, same as the publisher's
//! inventory walk) and deletes any file with no matching `cache_*_files`
//! row at all — the only way a crash-leftover `.tmp.<pid>` write or a
//! file dropped directly under the cache root is ever found. A recycle
//! bin is not implemented; deletion is soft-delete-then-purge only (see
//! DESIGN.md).

use std::collections::HashSet;
use std::time::Duration;

use mediarch_common::Result;
use mediarch_db::pool::{get_conn, DbPool};
use mediarch_db::queries::{activity_log, cache as cache_queries, movies};
use rusqlite::Connection;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::cache::{CacheKind, ContentCache};
use crate::config::GcConfig;

#[derive(Debug, Default, Clone, Copy)]
pub struct GcReport {
    pub movies_purged: usize,
    pub orphan_images_deleted: usize,
    pub orphan_videos_deleted: usize,
    pub orphan_texts_deleted: usize,
    pub orphan_audio_deleted: usize,
    pub disk_orphans_deleted: usize,
}

impl GcReport {
    pub fn orphans_deleted(&self) -> usize {
        self.orphan_images_deleted
            + self.orphan_videos_deleted
            + self.orphan_texts_deleted
            + self.orphan_audio_deleted
            + self.disk_orphans_deleted
    }
}

fn known_hashes(conn: &Connection, kind: CacheKind) -> Result<HashSet<String>> {
    match kind {
        CacheKind::Image => cache_queries::list_all_image_hashes(conn),
        CacheKind::Video => cache_queries::list_all_video_hashes(conn),
        CacheKind::Text => cache_queries::list_all_text_hashes(conn),
        CacheKind::Audio => cache_queries::list_all_audio_hashes(conn),
    }
}

/// Walk the cache directory tree for one kind and delete any file that is
/// either a crash-leftover temp write (`<hash>.tmp.<pid>`) or a blob whose
/// hash has no row at all in the matching `cache_*_files` table.
fn sweep_disk_orphans_for_kind(cache: &ContentCache, known: &HashSet<String>, kind: CacheKind) -> usize {
    let kind_dir = cache.root().join(kind.dirname());
    if !kind_dir.exists() {
        return 0;
    }

    let mut deleted = 0;
    for entry in WalkDir::new(&kind_dir).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else { continue };

        let hash = file_name.split(".tmp.").next().unwrap_or(file_name);
        let is_known = known.contains(hash);
        let is_tmp_leftover = file_name.contains(".tmp.");

        if is_tmp_leftover || !is_known {
            match std::fs::remove_file(path) {
                Ok(()) => deleted += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove orphan cache file"),
            }
        }
    }
    deleted
}

/// Walk every cache kind's directory on disk and delete anything with no
/// matching database row, including crash-leftover temp writes.
fn sweep_disk_orphans(conn: &Connection, cache: &ContentCache) -> Result<usize> {
    let mut deleted = 0;
    for kind in [CacheKind::Image, CacheKind::Video, CacheKind::Text, CacheKind::Audio] {
        let known = known_hashes(conn, kind)?;
        deleted += sweep_disk_orphans_for_kind(cache, &known, kind);
    }
    Ok(deleted)
}

/// Run one full collection pass.
pub fn collect(pool: &DbPool, cache: &ContentCache, config: &GcConfig) -> Result<GcReport> {
    let mut report = GcReport::default();
    let conn = get_conn(pool)?;

    let cutoff = chrono::Utc::now() - chrono::Duration::days(config.soft_delete_grace_days);
    for movie in movies::list_soft_deleted_before(&conn, cutoff)? {
        if movies::purge(&conn, movie.id)? {
            report.movies_purged += 1;
        }
    }

    for hash in cache_queries::list_orphan_image_hashes(&conn)? {
        cache.delete(CacheKind::Image, &hash)?;
        cache_queries::delete_image(&conn, &hash)?;
        report.orphan_images_deleted += 1;
    }
    for hash in cache_queries::list_orphan_video_hashes(&conn)? {
        cache.delete(CacheKind::Video, &hash)?;
        cache_queries::delete_video(&conn, &hash)?;
        report.orphan_videos_deleted += 1;
    }
    for hash in cache_queries::list_orphan_text_hashes(&conn)? {
        cache.delete(CacheKind::Text, &hash)?;
        cache_queries::delete_text(&conn, &hash)?;
        report.orphan_texts_deleted += 1;
    }
    for hash in cache_queries::list_orphan_audio_hashes(&conn)? {
        cache.delete(CacheKind::Audio, &hash)?;
        cache_queries::delete_audio(&conn, &hash)?;
        report.orphan_audio_deleted += 1;
    }

    report.disk_orphans_deleted = sweep_disk_orphans(&conn, cache)?;

    if report.movies_purged > 0 || report.orphans_deleted() > 0 {
        info!(
            movies_purged = report.movies_purged,
            orphans_deleted = report.orphans_deleted(),
            "garbage collection pass completed"
        );
        let message = format!(
            "gc pass: {} movies purged, {} orphan cache files deleted",
            report.movies_purged,
            report.orphans_deleted()
        );
        if let Err(e) = activity_log::record(&conn, "info", &message, None, None) {
            warn!(error = %e, "failed to write activity log entry for gc summary");
        }
    }

    Ok(report)
}

fn seconds_until_next_run(run_at_hour: u32) -> Duration {
    let now = chrono::Local::now();
    let today_run = now
        .date_naive()
        .and_hms_opt(run_at_hour.min(23), 0, 0)
        .expect("run_at_hour is clamped to a valid hour");
    let next_run = if now.naive_local() < today_run {
        today_run
    } else {
        today_run + chrono::Duration::days(1)
    };
    (next_run - now.naive_local()).to_std().unwrap_or(Duration::from_secs(86_400))
}

/// Sleep until the next configured run hour, collect, repeat, until cancelled.
pub async fn run_gc_loop(pool: DbPool, cache: ContentCache, config: GcConfig, cancel: CancellationToken) {
    loop {
        let wait = seconds_until_next_run(config.run_at_hour);
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancel.cancelled() => {
                warn!("garbage collector loop cancelled");
                break;
            }
        }

        if cancel.is_cancelled() {
            break;
        }

        match collect(&pool, &cache, &config) {
            Ok(report) => info!(?report, "garbage collector tick finished"),
            Err(e) => tracing::error!(error = %e, "garbage collector tick failed"),
        }
    }
}
