//! Movie database queries.
//!
//! CRUD plus the soft-delete and enrichment-status transitions the
//! orchestrator and garbage collector drive the entity through.

use chrono::{DateTime, Utc};
use mediarch_common::{EnrichmentStatus, Error, LibraryId, MovieId, Result};
use rusqlite::{OptionalExtension, Row};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::Movie;

fn opt_dt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .unwrap()
            .with_timezone(&Utc)
    })
}

fn row_to_movie(row: &Row) -> rusqlite::Result<Movie> {
    Ok(Movie {
        id: MovieId::from(Uuid::parse_str(&row.get::<_, String>("id")?).unwrap()),
        library_id: LibraryId::from(Uuid::parse_str(&row.get::<_, String>("library_id")?).unwrap()),
        file_path: row.get("file_path")?,
        title: row.get("title")?,
        sort_title: row.get("sort_title")?,
        original_title: row.get("original_title")?,
        year: row.get("year")?,
        plot: row.get("plot")?,
        tagline: row.get("tagline")?,
        runtime_minutes: row.get("runtime_minutes")?,
        release_date: row.get("release_date")?,
        tmdb_id: row.get("tmdb_id")?,
        imdb_id: row.get("imdb_id")?,
        tvdb_id: row.get("tvdb_id")?,
        status: EnrichmentStatus::from_str(&row.get::<_, String>("status")?).unwrap(),
        monitored: row.get::<_, i64>("monitored")? != 0,
        deleted_at: opt_dt(row.get("deleted_at")?),
        last_published_at: opt_dt(row.get("last_published_at")?),
        published_nfo_hash: row.get("published_nfo_hash")?,
        enriched_at: opt_dt(row.get("enriched_at")?),
        created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>("created_at")?)
            .unwrap()
            .with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&row.get::<_, String>("updated_at")?)
            .unwrap()
            .with_timezone(&Utc),
    })
}

const SELECT_COLUMNS: &str = "id, library_id, file_path, title, sort_title, original_title, year,
     plot, tagline, runtime_minutes, release_date, tmdb_id, imdb_id, tvdb_id, status, monitored,
     deleted_at, last_published_at, published_nfo_hash, enriched_at, created_at, updated_at";

/// Register a newly discovered file as an unidentified movie, or return the
/// existing row if the file scanner already knows this path.
pub fn upsert_by_path(
    conn: &rusqlite::Connection,
    library_id: LibraryId,
    file_path: &str,
) -> Result<Movie> {
    if let Some(existing) = get_by_path(conn, library_id, file_path)? {
        return Ok(existing);
    }

    let id = MovieId::new();
    let now = Utc::now();

    conn.execute(
        "INSERT INTO movies (id, library_id, file_path, title, status, created_at, updated_at)
         VALUES (:id, :library_id, :file_path, :title, :status, :now, :now)",
        rusqlite::named_params! {
            ":id": id.to_string(),
            ":library_id": library_id.to_string(),
            ":file_path": file_path,
            ":title": "",
            ":status": EnrichmentStatus::Unidentified.to_string(),
            ":now": now.to_rfc3339(),
        },
    )?;

    get_by_path(conn, library_id, file_path)?.ok_or_else(|| Error::internal("insert did not persist"))
}

/// Look up a movie by its library-scoped file path.
pub fn get_by_path(
    conn: &rusqlite::Connection,
    library_id: LibraryId,
    file_path: &str,
) -> Result<Option<Movie>> {
    conn.query_row(
        &format!(
            "SELECT {SELECT_COLUMNS} FROM movies WHERE library_id = :library_id AND file_path = :file_path"
        ),
        rusqlite::named_params! {
            ":library_id": library_id.to_string(),
            ":file_path": file_path,
        },
        row_to_movie,
    )
    .optional()
    .map_err(Error::from)
}

/// Get a movie by ID.
pub fn get(conn: &rusqlite::Connection, id: MovieId) -> Result<Option<Movie>> {
    conn.query_row(
        &format!("SELECT {SELECT_COLUMNS} FROM movies WHERE id = :id"),
        rusqlite::named_params! { ":id": id.to_string() },
        row_to_movie,
    )
    .optional()
    .map_err(Error::from)
}

/// List non-deleted movies in a library.
pub fn list_by_library(conn: &rusqlite::Connection, library_id: LibraryId) -> Result<Vec<Movie>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM movies WHERE library_id = :library_id AND deleted_at IS NULL
         ORDER BY title"
    ))?;

    let movies = stmt
        .query_map(
            rusqlite::named_params! { ":library_id": library_id.to_string() },
            row_to_movie,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(movies)
}

/// List movies whose enrichment status is `Identified` or later and are
/// monitored, i.e. eligible for the provider-fetch phase.
pub fn list_enrichment_candidates(conn: &rusqlite::Connection) -> Result<Vec<Movie>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM movies
         WHERE deleted_at IS NULL AND monitored = 1 AND status != 'unidentified'
         ORDER BY updated_at"
    ))?;

    let movies = stmt
        .query_map([], row_to_movie)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(movies)
}

/// Apply identified metadata to a previously unidentified movie.
pub fn mark_identified(
    conn: &rusqlite::Connection,
    id: MovieId,
    title: &str,
    tmdb_id: Option<i64>,
    imdb_id: Option<&str>,
) -> Result<()> {
    let rows_affected = conn.execute(
        "UPDATE movies SET title = :title, tmdb_id = :tmdb_id, imdb_id = :imdb_id,
         status = :status, updated_at = :now WHERE id = :id",
        rusqlite::named_params! {
            ":id": id.to_string(),
            ":title": title,
            ":tmdb_id": tmdb_id,
            ":imdb_id": imdb_id,
            ":status": EnrichmentStatus::Identified.to_string(),
            ":now": Utc::now().to_rfc3339(),
        },
    )?;

    if rows_affected == 0 {
        return Err(Error::not_found("movie"));
    }

    Ok(())
}

/// Apply metadata fields fetched from providers. Any field left `None`
/// is left untouched on the row.
#[allow(clippy::too_many_arguments)]
pub fn update_metadata(
    conn: &rusqlite::Connection,
    id: MovieId,
    title: Option<&str>,
    plot: Option<&str>,
    tagline: Option<&str>,
    runtime_minutes: Option<i32>,
    release_date: Option<&str>,
) -> Result<()> {
    let current = get(conn, id)?.ok_or_else(|| Error::not_found("movie"))?;
    let rows_affected = conn.execute(
        "UPDATE movies SET title = :title, plot = :plot, tagline = :tagline,
         runtime_minutes = :runtime_minutes, release_date = :release_date, updated_at = :now
         WHERE id = :id",
        rusqlite::named_params! {
            ":id": id.to_string(),
            ":title": title.unwrap_or(&current.title),
            ":plot": plot.or(current.plot.as_deref()),
            ":tagline": tagline.or(current.tagline.as_deref()),
            ":runtime_minutes": runtime_minutes.or(current.runtime_minutes),
            ":release_date": release_date.or(current.release_date.as_deref()),
            ":now": Utc::now().to_rfc3339(),
        },
    )?;

    if rows_affected == 0 {
        return Err(Error::not_found("movie"));
    }

    Ok(())
}

/// Update enrichment status.
pub fn set_status(conn: &rusqlite::Connection, id: MovieId, status: EnrichmentStatus) -> Result<()> {
    let rows_affected = conn.execute(
        "UPDATE movies SET status = :status, updated_at = :now WHERE id = :id",
        rusqlite::named_params! {
            ":id": id.to_string(),
            ":status": status.to_string(),
            ":now": Utc::now().to_rfc3339(),
        },
    )?;

    if rows_affected == 0 {
        return Err(Error::not_found("movie"));
    }

    Ok(())
}

/// Mark a movie's enrichment as complete, stamping `enriched_at`.
pub fn mark_enriched(conn: &rusqlite::Connection, id: MovieId) -> Result<()> {
    let now = Utc::now();
    let rows_affected = conn.execute(
        "UPDATE movies SET status = :status, enriched_at = :now, updated_at = :now WHERE id = :id",
        rusqlite::named_params! {
            ":id": id.to_string(),
            ":status": EnrichmentStatus::Enriched.to_string(),
            ":now": now.to_rfc3339(),
        },
    )?;

    if rows_affected == 0 {
        return Err(Error::not_found("movie"));
    }

    Ok(())
}

/// Record a successful publish: new NFO hash and timestamp.
pub fn mark_published(conn: &rusqlite::Connection, id: MovieId, nfo_hash: &str) -> Result<()> {
    let now = Utc::now();
    let rows_affected = conn.execute(
        "UPDATE movies SET published_nfo_hash = :hash, last_published_at = :now, updated_at = :now
         WHERE id = :id",
        rusqlite::named_params! {
            ":id": id.to_string(),
            ":hash": nfo_hash,
            ":now": now.to_rfc3339(),
        },
    )?;

    if rows_affected == 0 {
        return Err(Error::not_found("movie"));
    }

    Ok(())
}

/// Soft-delete a movie (the only deletion path enabled by default, see
/// DESIGN.md). The garbage collector later reclaims its published files.
pub fn soft_delete(conn: &rusqlite::Connection, id: MovieId) -> Result<()> {
    let rows_affected = conn.execute(
        "UPDATE movies SET deleted_at = :now, updated_at = :now WHERE id = :id AND deleted_at IS NULL",
        rusqlite::named_params! {
            ":id": id.to_string(),
            ":now": Utc::now().to_rfc3339(),
        },
    )?;

    if rows_affected == 0 {
        return Err(Error::not_found("movie"));
    }

    Ok(())
}

/// List movies soft-deleted before `cutoff`, for the garbage collector's
/// reclaim sweep.
pub fn list_soft_deleted_before(
    conn: &rusqlite::Connection,
    cutoff: DateTime<Utc>,
) -> Result<Vec<Movie>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM movies WHERE deleted_at IS NOT NULL AND deleted_at < :cutoff"
    ))?;

    let movies = stmt
        .query_map(
            rusqlite::named_params! { ":cutoff": cutoff.to_rfc3339() },
            row_to_movie,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(movies)
}

/// Permanently remove a movie row (cascades to actors, candidates, and
/// library file records). Called by the garbage collector after reclaim.
pub fn purge(conn: &rusqlite::Connection, id: MovieId) -> Result<bool> {
    let rows_affected = conn.execute(
        "DELETE FROM movies WHERE id = :id",
        rusqlite::named_params! { ":id": id.to_string() },
    )?;

    Ok(rows_affected > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::libraries::create_library;
    use mediarch_common::MediaType;

    fn setup() -> (r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>, LibraryId) {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let library = create_library(&conn, "Movies", "/media/movies", MediaType::Movie).unwrap();
        (conn, library.id)
    }

    #[test]
    fn test_upsert_by_path_creates_unidentified() {
        let (conn, library_id) = setup();
        let movie = upsert_by_path(&conn, library_id, "/media/movies/a.mkv").unwrap();
        assert_eq!(movie.status, EnrichmentStatus::Unidentified);
        assert_eq!(movie.title, "");
    }

    #[test]
    fn test_upsert_by_path_is_idempotent() {
        let (conn, library_id) = setup();
        let first = upsert_by_path(&conn, library_id, "/media/movies/a.mkv").unwrap();
        let second = upsert_by_path(&conn, library_id, "/media/movies/a.mkv").unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_mark_identified_transitions_status() {
        let (conn, library_id) = setup();
        let movie = upsert_by_path(&conn, library_id, "/media/movies/a.mkv").unwrap();

        mark_identified(&conn, movie.id, "The Matrix", Some(603), Some("tt0133093")).unwrap();

        let updated = get(&conn, movie.id).unwrap().unwrap();
        assert_eq!(updated.status, EnrichmentStatus::Identified);
        assert_eq!(updated.title, "The Matrix");
        assert_eq!(updated.tmdb_id, Some(603));
    }

    #[test]
    fn test_mark_enriched_stamps_timestamp() {
        let (conn, library_id) = setup();
        let movie = upsert_by_path(&conn, library_id, "/media/movies/a.mkv").unwrap();
        mark_identified(&conn, movie.id, "The Matrix", None, None).unwrap();

        mark_enriched(&conn, movie.id).unwrap();

        let updated = get(&conn, movie.id).unwrap().unwrap();
        assert_eq!(updated.status, EnrichmentStatus::Enriched);
        assert!(updated.enriched_at.is_some());
    }

    #[test]
    fn test_soft_delete_excludes_from_library_listing() {
        let (conn, library_id) = setup();
        let movie = upsert_by_path(&conn, library_id, "/media/movies/a.mkv").unwrap();

        soft_delete(&conn, movie.id).unwrap();

        let listed = list_by_library(&conn, library_id).unwrap();
        assert!(listed.is_empty());

        let still_exists = get(&conn, movie.id).unwrap();
        assert!(still_exists.unwrap().deleted_at.is_some());
    }

    #[test]
    fn test_soft_delete_twice_fails() {
        let (conn, library_id) = setup();
        let movie = upsert_by_path(&conn, library_id, "/media/movies/a.mkv").unwrap();
        soft_delete(&conn, movie.id).unwrap();
        assert!(soft_delete(&conn, movie.id).is_err());
    }

    #[test]
    fn test_list_soft_deleted_before_cutoff() {
        let (conn, library_id) = setup();
        let movie = upsert_by_path(&conn, library_id, "/media/movies/a.mkv").unwrap();
        soft_delete(&conn, movie.id).unwrap();

        let future_cutoff = Utc::now() + chrono::Duration::days(1);
        let due = list_soft_deleted_before(&conn, future_cutoff).unwrap();
        assert_eq!(due.len(), 1);

        let past_cutoff = Utc::now() - chrono::Duration::days(1);
        let not_due = list_soft_deleted_before(&conn, past_cutoff).unwrap();
        assert!(not_due.is_empty());
    }

    #[test]
    fn test_purge_removes_row() {
        let (conn, library_id) = setup();
        let movie = upsert_by_path(&conn, library_id, "/media/movies/a.mkv").unwrap();
        assert!(purge(&conn, movie.id).unwrap());
        assert!(get(&conn, movie.id).unwrap().is_none());
    }

    #[test]
    fn test_list_enrichment_candidates_excludes_unidentified() {
        let (conn, library_id) = setup();
        let a = upsert_by_path(&conn, library_id, "/media/movies/a.mkv").unwrap();
        upsert_by_path(&conn, library_id, "/media/movies/b.mkv").unwrap();
        mark_identified(&conn, a.id, "A", None, None).unwrap();

        let candidates = list_enrichment_candidates(&conn).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, a.id);
    }
}
