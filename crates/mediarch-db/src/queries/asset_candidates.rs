//! Asset candidate database queries (C7/C8).
//!
//! Candidates accumulate from the fetch orchestrator's per-provider fan-out
//! and are narrowed down to at most one `is_selected` row per asset type by
//! the asset selector.

use chrono::{DateTime, Utc};
use mediarch_common::{AssetCandidateId, AssetType, MovieId, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::AssetCandidate;

fn row_to_candidate(row: &Row) -> rusqlite::Result<AssetCandidate> {
    Ok(AssetCandidate {
        id: AssetCandidateId::from(Uuid::parse_str(&row.get::<_, String>("id")?).unwrap()),
        movie_id: MovieId::from(Uuid::parse_str(&row.get::<_, String>("movie_id")?).unwrap()),
        asset_type: AssetType::from_str(&row.get::<_, String>("asset_type")?).unwrap(),
        provider: row.get("provider")?,
        source_url: row.get("source_url")?,
        content_hash: row.get("content_hash")?,
        width: row.get("width")?,
        height: row.get("height")?,
        language: row.get("language")?,
        votes: row.get("votes")?,
        quality_hint: row.get("quality_hint")?,
        a_hash: row.get("a_hash")?,
        d_hash: row.get("d_hash")?,
        is_selected: row.get::<_, i64>("is_selected")? != 0,
        selection_reason: row.get("selection_reason")?,
        display_score: row.get("display_score")?,
        created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>("created_at")?)
            .unwrap()
            .with_timezone(&Utc),
    })
}

const SELECT_COLUMNS: &str = "id, movie_id, asset_type, provider, source_url, content_hash, width,
    height, language, votes, quality_hint, a_hash, d_hash, is_selected, selection_reason,
    display_score, created_at";

/// A candidate as surfaced by a single provider call, before persistence.
pub struct NewCandidate<'a> {
    pub asset_type: AssetType,
    pub provider: &'a str,
    pub source_url: &'a str,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub language: Option<&'a str>,
    pub votes: Option<f64>,
    pub quality_hint: Option<&'a str>,
}

/// Insert a candidate, ignoring it if the same provider already surfaced
/// the same URL for this movie/asset type (the unique index is the source
/// of truth for this idempotency, not an app-level check).
pub fn insert(conn: &Connection, movie_id: MovieId, candidate: &NewCandidate) -> Result<AssetCandidateId> {
    let id = AssetCandidateId::new();

    conn.execute(
        "INSERT OR IGNORE INTO asset_candidates
         (id, movie_id, asset_type, provider, source_url, width, height, language, votes, quality_hint, created_at)
         VALUES (:id, :movie_id, :asset_type, :provider, :source_url, :width, :height, :language, :votes, :quality_hint, :now)",
        rusqlite::named_params! {
            ":id": id.to_string(),
            ":movie_id": movie_id.to_string(),
            ":asset_type": candidate.asset_type.to_string(),
            ":provider": candidate.provider,
            ":source_url": candidate.source_url,
            ":width": candidate.width,
            ":height": candidate.height,
            ":language": candidate.language,
            ":votes": candidate.votes,
            ":quality_hint": candidate.quality_hint,
            ":now": Utc::now().to_rfc3339(),
        },
    )?;

    Ok(id)
}

/// List all candidates for a movie and asset type, for dedup/scoring.
pub fn list_for_asset_type(
    conn: &Connection,
    movie_id: MovieId,
    asset_type: AssetType,
) -> Result<Vec<AssetCandidate>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM asset_candidates
         WHERE movie_id = :movie_id AND asset_type = :asset_type"
    ))?;

    let candidates = stmt
        .query_map(
            rusqlite::named_params! {
                ":movie_id": movie_id.to_string(),
                ":asset_type": asset_type.to_string(),
            },
            row_to_candidate,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(candidates)
}

/// Populate the content hash and perceptual hashes once the analysis phase
/// has downloaded and cached a candidate's bytes.
pub fn set_analysis(
    conn: &Connection,
    id: AssetCandidateId,
    content_hash: &str,
    a_hash: Option<&str>,
    d_hash: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE asset_candidates SET content_hash = :hash, a_hash = :a_hash, d_hash = :d_hash
         WHERE id = :id",
        rusqlite::named_params! {
            ":id": id.to_string(),
            ":hash": content_hash,
            ":a_hash": a_hash,
            ":d_hash": d_hash,
        },
    )?;
    Ok(())
}

/// Mark a single candidate selected (display score + reason) and clear the
/// selection flag on every sibling with the same asset type, inside a
/// transaction so the "at most one selected" invariant never observes a
/// window with two or zero selections.
pub fn select(
    conn: &mut Connection,
    movie_id: MovieId,
    asset_type: AssetType,
    winner_id: AssetCandidateId,
    display_score: f64,
    reason: &str,
) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute(
        "UPDATE asset_candidates SET is_selected = 0, selection_reason = NULL, display_score = NULL
         WHERE movie_id = :movie_id AND asset_type = :asset_type",
        rusqlite::named_params! {
            ":movie_id": movie_id.to_string(),
            ":asset_type": asset_type.to_string(),
        },
    )?;

    tx.execute(
        "UPDATE asset_candidates SET is_selected = 1, selection_reason = :reason, display_score = :score
         WHERE id = :id",
        rusqlite::named_params! {
            ":id": winner_id.to_string(),
            ":reason": reason,
            ":score": display_score,
        },
    )?;

    tx.commit()?;
    Ok(())
}

/// Get the currently selected candidate for a movie/asset type, if any.
pub fn get_selected(
    conn: &Connection,
    movie_id: MovieId,
    asset_type: AssetType,
) -> Result<Option<AssetCandidate>> {
    conn.query_row(
        &format!(
            "SELECT {SELECT_COLUMNS} FROM asset_candidates
             WHERE movie_id = :movie_id AND asset_type = :asset_type AND is_selected = 1"
        ),
        rusqlite::named_params! {
            ":movie_id": movie_id.to_string(),
            ":asset_type": asset_type.to_string(),
        },
        row_to_candidate,
    )
    .optional()
    .map_err(mediarch_common::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::{libraries::create_library, movies::upsert_by_path};
    use mediarch_common::MediaType;

    fn setup_movie() -> (
        r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>,
        MovieId,
    ) {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let library = create_library(&conn, "Movies", "/media/movies", MediaType::Movie).unwrap();
        let movie = upsert_by_path(&conn, library.id, "/media/movies/a.mkv").unwrap();
        (conn, movie.id)
    }

    #[test]
    fn test_insert_and_list() {
        let (conn, movie_id) = setup_movie();

        insert(
            &conn,
            movie_id,
            &NewCandidate {
                asset_type: AssetType::Poster,
                provider: "tmdb",
                source_url: "https://example.com/a.jpg",
                width: Some(1000),
                height: Some(1500),
                language: Some("en"),
                votes: Some(8.0),
                quality_hint: None,
            },
        )
        .unwrap();

        let candidates = list_for_asset_type(&conn, movie_id, AssetType::Poster).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].provider, "tmdb");
    }

    #[test]
    fn test_insert_ignores_duplicate_url_from_same_provider() {
        let (conn, movie_id) = setup_movie();

        let new_candidate = NewCandidate {
            asset_type: AssetType::Poster,
            provider: "tmdb",
            source_url: "https://example.com/a.jpg",
            width: None,
            height: None,
            language: None,
            votes: None,
            quality_hint: None,
        };

        insert(&conn, movie_id, &new_candidate).unwrap();
        insert(&conn, movie_id, &new_candidate).unwrap();

        let candidates = list_for_asset_type(&conn, movie_id, AssetType::Poster).unwrap();
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_select_enforces_single_winner_per_asset_type() {
        let (mut conn, movie_id) = setup_movie();

        let first = insert(
            &conn,
            movie_id,
            &NewCandidate {
                asset_type: AssetType::Poster,
                provider: "tmdb",
                source_url: "https://example.com/a.jpg",
                width: None,
                height: None,
                language: None,
                votes: None,
                quality_hint: None,
            },
        )
        .unwrap();

        let second = insert(
            &conn,
            movie_id,
            &NewCandidate {
                asset_type: AssetType::Poster,
                provider: "fanart",
                source_url: "https://example.com/b.jpg",
                width: None,
                height: None,
                language: None,
                votes: None,
                quality_hint: None,
            },
        )
        .unwrap();

        select(&mut conn, movie_id, AssetType::Poster, first, 0.9, "language fit").unwrap();
        select(&mut conn, movie_id, AssetType::Poster, second, 0.95, "higher resolution").unwrap();

        let selected = get_selected(&conn, movie_id, AssetType::Poster).unwrap().unwrap();
        assert_eq!(selected.id, second);

        let all = list_for_asset_type(&conn, movie_id, AssetType::Poster).unwrap();
        assert_eq!(all.iter().filter(|c| c.is_selected).count(), 1);
    }

    #[test]
    fn test_set_analysis_populates_hashes() {
        let (conn, movie_id) = setup_movie();

        let id = insert(
            &conn,
            movie_id,
            &NewCandidate {
                asset_type: AssetType::Poster,
                provider: "tmdb",
                source_url: "https://example.com/a.jpg",
                width: None,
                height: None,
                language: None,
                votes: None,
                quality_hint: None,
            },
        )
        .unwrap();

        set_analysis(&conn, id, "deadbeef", Some("aaaa"), Some("bbbb")).unwrap();

        let candidates = list_for_asset_type(&conn, movie_id, AssetType::Poster).unwrap();
        assert_eq!(candidates[0].content_hash, Some("deadbeef".to_string()));
        assert_eq!(candidates[0].a_hash, Some("aaaa".to_string()));
    }
}
