//! Activity log database queries.
//!
//! Append-only event trail surfaced to operators: job failures, publish
//! results, and GC sweep summaries.

use chrono::{DateTime, Utc};
use mediarch_common::{JobId, MovieId, Result};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use crate::models::ActivityLogEntry;

fn row_to_entry(row: &Row) -> rusqlite::Result<ActivityLogEntry> {
    let movie_id: Option<String> = row.get("movie_id")?;
    let job_id: Option<String> = row.get("job_id")?;
    Ok(ActivityLogEntry {
        id: row.get("id")?,
        occurred_at: DateTime::parse_from_rfc3339(&row.get::<_, String>("occurred_at")?)
            .unwrap()
            .with_timezone(&Utc),
        level: row.get("level")?,
        message: row.get("message")?,
        movie_id: movie_id.map(|s| MovieId::from(Uuid::parse_str(&s).unwrap())),
        job_id: job_id.map(|s| JobId::from(Uuid::parse_str(&s).unwrap())),
    })
}

/// Append an event to the activity log.
pub fn record(
    conn: &Connection,
    level: &str,
    message: &str,
    movie_id: Option<MovieId>,
    job_id: Option<JobId>,
) -> Result<()> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO activity_log (id, level, message, movie_id, job_id)
         VALUES (:id, :level, :message, :movie_id, :job_id)",
        rusqlite::named_params! {
            ":id": id,
            ":level": level,
            ":message": message,
            ":movie_id": movie_id.map(|m| m.to_string()),
            ":job_id": job_id.map(|j| j.to_string()),
        },
    )?;
    Ok(())
}

/// List the most recent entries, newest first.
pub fn list_recent(conn: &Connection, limit: i64) -> Result<Vec<ActivityLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, occurred_at, level, message, movie_id, job_id
         FROM activity_log ORDER BY occurred_at DESC LIMIT :limit",
    )?;

    let entries = stmt
        .query_map(rusqlite::named_params! { ":limit": limit }, row_to_entry)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(entries)
}

/// List entries for a specific movie, newest first.
pub fn list_for_movie(conn: &Connection, movie_id: MovieId) -> Result<Vec<ActivityLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, occurred_at, level, message, movie_id, job_id
         FROM activity_log WHERE movie_id = :movie_id ORDER BY occurred_at DESC",
    )?;

    let entries = stmt
        .query_map(
            rusqlite::named_params! { ":movie_id": movie_id.to_string() },
            row_to_entry,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(entries)
}
