//! Persistent priority job queue database queries (C9).
//!
//! Claiming a job is a single `UPDATE ... RETURNING` statement rather than
//! a separate dequeue-then-start pair, so two workers racing `pick_next`
//! can never both observe the same row as `pending`.

use chrono::{DateTime, Utc};
use mediarch_common::{Error, JobId, JobKind, JobPriority, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::{Job, JobStatus};

fn row_to_job(row: &Row) -> rusqlite::Result<Job> {
    let started_at: Option<String> = row.get("started_at")?;
    Ok(Job {
        id: JobId::from(Uuid::parse_str(&row.get::<_, String>("id")?).unwrap()),
        kind: JobKind::from_str(&row.get::<_, String>("kind")?).unwrap(),
        priority: JobPriority(row.get("priority")?),
        payload: serde_json::from_str(&row.get::<_, String>("payload")?).unwrap_or(serde_json::Value::Null),
        status: JobStatus::from_str(&row.get::<_, String>("status")?).unwrap(),
        retry_count: row.get("retry_count")?,
        max_retries: row.get("max_retries")?,
        manual: row.get::<_, i64>("manual")? != 0,
        dedup_key: row.get("dedup_key")?,
        created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>("created_at")?)
            .unwrap()
            .with_timezone(&Utc),
        started_at: started_at.map(|s| DateTime::parse_from_rfc3339(&s).unwrap().with_timezone(&Utc)),
    })
}

const SELECT_COLUMNS: &str =
    "id, kind, priority, payload, status, retry_count, max_retries, manual, dedup_key, created_at, started_at";

/// Enqueue a new job.
///
/// If `dedup_key` is set and an active (pending/processing) job already
/// holds it, the insert is rejected by the partial unique index; the
/// caller should treat this as "already queued", not an error worth
/// surfacing to the user.
pub fn enqueue(
    conn: &Connection,
    kind: JobKind,
    priority: JobPriority,
    payload: &serde_json::Value,
    manual: bool,
    dedup_key: Option<&str>,
) -> Result<Job> {
    let id = JobId::new();
    let now = Utc::now();
    let payload_json = serde_json::to_string(payload).map_err(|e| Error::internal(e.to_string()))?;

    let rows_affected = conn.execute(
        "INSERT OR IGNORE INTO job_queue (id, kind, priority, payload, status, manual, dedup_key, created_at)
         VALUES (:id, :kind, :priority, :payload, :status, :manual, :dedup_key, :now)",
        rusqlite::named_params! {
            ":id": id.to_string(),
            ":kind": kind.to_string(),
            ":priority": priority.0,
            ":payload": payload_json,
            ":status": JobStatus::Pending.to_string(),
            ":manual": manual as i64,
            ":dedup_key": dedup_key,
            ":now": now.to_rfc3339(),
        },
    )?;

    if rows_affected == 0 {
        // Dedup key collision: an active job already owns this key.
        return get_by_dedup_key(conn, dedup_key.unwrap_or_default())?
            .ok_or_else(|| Error::internal("dedup conflict but no active job found"));
    }

    Ok(Job {
        id,
        kind,
        priority,
        payload: payload.clone(),
        status: JobStatus::Pending,
        retry_count: 0,
        max_retries: 3,
        manual,
        dedup_key: dedup_key.map(str::to_string),
        created_at: now,
        started_at: None,
    })
}

fn get_by_dedup_key(conn: &Connection, dedup_key: &str) -> Result<Option<Job>> {
    conn.query_row(
        &format!(
            "SELECT {SELECT_COLUMNS} FROM job_queue
             WHERE dedup_key = :key AND status IN ('pending', 'processing')"
        ),
        rusqlite::named_params! { ":key": dedup_key },
        row_to_job,
    )
    .optional()
    .map_err(Error::from)
}

/// Atomically claim the next pending job in priority order, transitioning
/// it to `processing` and stamping `started_at` in the same statement.
/// Returns `None` if the queue has no pending work.
pub fn pick_next(conn: &Connection) -> Result<Option<Job>> {
    let now = Utc::now().to_rfc3339();

    conn.query_row(
        &format!(
            "UPDATE job_queue SET status = 'processing', started_at = :now
             WHERE id = (
                SELECT id FROM job_queue
                WHERE status = 'pending'
                ORDER BY priority ASC, created_at ASC
                LIMIT 1
             )
             RETURNING {SELECT_COLUMNS}"
        ),
        rusqlite::named_params! { ":now": now },
        row_to_job,
    )
    .optional()
    .map_err(Error::from)
}

/// Outcome of recording a job failure: there is no persisted `failed`
/// status, since a terminally-failed job's row is deleted rather than
/// transitioned, so the caller needs this to know which happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Retries remain; the job was returned to `pending`.
    Requeued,
    /// Retries exhausted; the row has been removed from the queue.
    TerminallyFailed,
}

/// Mark a job completed by removing it from the queue. A completed job
/// has no further use for its row: there is no `completed` status to
/// transition to.
pub fn complete(conn: &Connection, id: JobId) -> Result<()> {
    let rows_affected = conn.execute(
        "DELETE FROM job_queue WHERE id = :id",
        rusqlite::named_params! { ":id": id.to_string() },
    )?;

    if rows_affected == 0 {
        return Err(Error::not_found("job"));
    }

    Ok(())
}

/// Record a job failure. If the job has retries remaining, it is returned
/// to `pending` for another claim; otherwise its row is removed from the
/// queue (terminal failure), leaving no `failed` row behind.
pub fn fail(conn: &Connection, id: JobId) -> Result<FailOutcome> {
    let row = conn
        .query_row(
            "SELECT retry_count, max_retries FROM job_queue WHERE id = :id",
            rusqlite::named_params! { ":id": id.to_string() },
            |row| Ok((row.get::<_, i32>(0)?, row.get::<_, i32>(1)?)),
        )
        .optional()?
        .ok_or_else(|| Error::not_found("job"))?;

    let (retry_count, max_retries) = row;

    if retry_count + 1 < max_retries {
        conn.execute(
            "UPDATE job_queue SET status = :status, retry_count = retry_count + 1,
             started_at = NULL WHERE id = :id",
            rusqlite::named_params! {
                ":id": id.to_string(),
                ":status": JobStatus::Pending.to_string(),
            },
        )?;
        Ok(FailOutcome::Requeued)
    } else {
        conn.execute(
            "DELETE FROM job_queue WHERE id = :id",
            rusqlite::named_params! { ":id": id.to_string() },
        )?;
        Ok(FailOutcome::TerminallyFailed)
    }
}

/// Return every `processing` job older than `stale_after` back to
/// `pending`, for crash recovery at startup. Returns the number reset.
pub fn reset_stalled(conn: &Connection, stale_after: DateTime<Utc>) -> Result<usize> {
    let rows_affected = conn.execute(
        "UPDATE job_queue SET status = 'pending', started_at = NULL
         WHERE status = 'processing' AND started_at < :cutoff",
        rusqlite::named_params! { ":cutoff": stale_after.to_rfc3339() },
    )?;

    Ok(rows_affected)
}

/// Queue depth by status, for operator visibility.
pub fn get_stats(conn: &Connection) -> Result<Vec<(JobStatus, i64)>> {
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM job_queue GROUP BY status")?;

    let stats = stmt
        .query_map([], |row| {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((JobStatus::from_str(&status).unwrap(), count))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(stats)
}

/// Get a job by ID.
pub fn get(conn: &Connection, id: JobId) -> Result<Option<Job>> {
    conn.query_row(
        &format!("SELECT {SELECT_COLUMNS} FROM job_queue WHERE id = :id"),
        rusqlite::named_params! { ":id": id.to_string() },
        row_to_job,
    )
    .optional()
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;

    #[test]
    fn test_enqueue_and_pick_next() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        enqueue(&conn, JobKind::Enrich, JobPriority::BACKGROUND, &serde_json::json!({}), false, None).unwrap();

        let claimed = pick_next(&conn).unwrap().unwrap();
        assert_eq!(claimed.kind, JobKind::Enrich);
        assert_eq!(claimed.status, JobStatus::Processing);
        assert!(claimed.started_at.is_some());
    }

    #[test]
    fn test_pick_next_orders_by_priority_then_age() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        enqueue(&conn, JobKind::FileScan, JobPriority::BACKGROUND, &serde_json::json!({}), false, None).unwrap();
        enqueue(&conn, JobKind::Enrich, JobPriority::USER, &serde_json::json!({}), false, None).unwrap();

        let claimed = pick_next(&conn).unwrap().unwrap();
        assert_eq!(claimed.kind, JobKind::Enrich);
    }

    #[test]
    fn test_pick_next_empty_queue_returns_none() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        assert!(pick_next(&conn).unwrap().is_none());
    }

    #[test]
    fn test_pick_next_does_not_return_same_job_twice() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        enqueue(&conn, JobKind::Enrich, JobPriority::BACKGROUND, &serde_json::json!({}), false, None).unwrap();

        let first = pick_next(&conn).unwrap();
        let second = pick_next(&conn).unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[test]
    fn test_complete_job_removes_row() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        enqueue(&conn, JobKind::Enrich, JobPriority::BACKGROUND, &serde_json::json!({}), false, None).unwrap();
        let claimed = pick_next(&conn).unwrap().unwrap();

        complete(&conn, claimed.id).unwrap();

        assert!(get(&conn, claimed.id).unwrap().is_none());
    }

    #[test]
    fn test_fail_retries_until_max_then_removes_row() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        enqueue(&conn, JobKind::Enrich, JobPriority::BACKGROUND, &serde_json::json!({}), false, None).unwrap();
        let claimed = pick_next(&conn).unwrap().unwrap();
        assert_eq!(claimed.max_retries, 3);

        assert_eq!(fail(&conn, claimed.id).unwrap(), FailOutcome::Requeued);
        let claimed = pick_next(&conn).unwrap().unwrap();
        assert_eq!(fail(&conn, claimed.id).unwrap(), FailOutcome::Requeued);
        let claimed = pick_next(&conn).unwrap().unwrap();
        assert_eq!(fail(&conn, claimed.id).unwrap(), FailOutcome::TerminallyFailed);

        assert!(pick_next(&conn).unwrap().is_none());
        assert!(get(&conn, claimed.id).unwrap().is_none());
    }

    #[test]
    fn test_reset_stalled_returns_processing_jobs_to_pending() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        enqueue(&conn, JobKind::Enrich, JobPriority::BACKGROUND, &serde_json::json!({}), false, None).unwrap();
        pick_next(&conn).unwrap();

        let future_cutoff = Utc::now() + chrono::Duration::hours(1);
        let reset = reset_stalled(&conn, future_cutoff).unwrap();
        assert_eq!(reset, 1);

        let claimed = pick_next(&conn).unwrap();
        assert!(claimed.is_some());
    }

    #[test]
    fn test_dedup_key_rejects_second_active_job() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let first = enqueue(
            &conn,
            JobKind::Publish,
            JobPriority::BACKGROUND,
            &serde_json::json!({}),
            false,
            Some("movie:abc"),
        )
        .unwrap();

        let second = enqueue(
            &conn,
            JobKind::Publish,
            JobPriority::BACKGROUND,
            &serde_json::json!({}),
            false,
            Some("movie:abc"),
        )
        .unwrap();

        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_dedup_key_allows_new_job_after_prior_completes() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let first = enqueue(
            &conn,
            JobKind::Publish,
            JobPriority::BACKGROUND,
            &serde_json::json!({}),
            false,
            Some("movie:abc"),
        )
        .unwrap();

        let claimed = pick_next(&conn).unwrap().unwrap();
        complete(&conn, claimed.id).unwrap();

        let second = enqueue(
            &conn,
            JobKind::Publish,
            JobPriority::BACKGROUND,
            &serde_json::json!({}),
            false,
            Some("movie:abc"),
        )
        .unwrap();

        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_get_stats() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        enqueue(&conn, JobKind::Enrich, JobPriority::BACKGROUND, &serde_json::json!({}), false, None).unwrap();
        enqueue(&conn, JobKind::Publish, JobPriority::BACKGROUND, &serde_json::json!({}), false, None).unwrap();
        pick_next(&conn).unwrap();

        let stats = get_stats(&conn).unwrap();
        let total: i64 = stats.iter().map(|(_, count)| count).sum();
        assert_eq!(total, 2);
    }
}
