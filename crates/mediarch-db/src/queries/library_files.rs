//! "Currently published" database queries.
//!
//! Each row records that a given asset type for a movie is published to a
//! given absolute path, backed by a given cache entry. The publisher
//! rebuilds these wholesale on every publish; the garbage
//! collector reads them to know what a soft-deleted movie's reclaim sweep
//! must remove.

use chrono::{DateTime, Utc};
use mediarch_common::{AssetType, CacheFileId, MovieId, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::{LibraryAudioFile, LibraryImageFile, LibraryTextFile, LibraryVideoFile};

fn row_to_image(row: &Row) -> rusqlite::Result<LibraryImageFile> {
    Ok(LibraryImageFile {
        id: row.get("id")?,
        movie_id: MovieId::from(Uuid::parse_str(&row.get::<_, String>("movie_id")?).unwrap()),
        asset_type: AssetType::from_str(&row.get::<_, String>("asset_type")?).unwrap(),
        cache_file_id: CacheFileId::from(Uuid::parse_str(&row.get::<_, String>("cache_file_id")?).unwrap()),
        absolute_path: row.get("absolute_path")?,
        created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>("created_at")?)
            .unwrap()
            .with_timezone(&Utc),
    })
}

/// Publish (or republish) an image asset type for a movie. Replaces any
/// existing row for this `(movie_id, asset_type)` pair, matching the
/// `UNIQUE(movie_id, asset_type)` constraint.
pub fn publish_image(
    conn: &Connection,
    movie_id: MovieId,
    asset_type: AssetType,
    cache_file_id: CacheFileId,
    absolute_path: &str,
) -> Result<LibraryImageFile> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    conn.execute(
        "INSERT INTO library_image_files (id, movie_id, asset_type, cache_file_id, absolute_path, created_at)
         VALUES (:id, :movie_id, :asset_type, :cache_file_id, :path, :now)
         ON CONFLICT(movie_id, asset_type) DO UPDATE SET
            cache_file_id = excluded.cache_file_id,
            absolute_path = excluded.absolute_path,
            created_at = excluded.created_at",
        rusqlite::named_params! {
            ":id": id,
            ":movie_id": movie_id.to_string(),
            ":asset_type": asset_type.to_string(),
            ":cache_file_id": cache_file_id.to_string(),
            ":path": absolute_path,
            ":now": now.to_rfc3339(),
        },
    )?;

    get_image(conn, movie_id, asset_type)?
        .ok_or_else(|| mediarch_common::Error::internal("publish did not persist"))
}

/// Get the currently published image record for a movie/asset type.
pub fn get_image(
    conn: &Connection,
    movie_id: MovieId,
    asset_type: AssetType,
) -> Result<Option<LibraryImageFile>> {
    conn.query_row(
        "SELECT id, movie_id, asset_type, cache_file_id, absolute_path, created_at
         FROM library_image_files WHERE movie_id = :movie_id AND asset_type = :asset_type",
        rusqlite::named_params! {
            ":movie_id": movie_id.to_string(),
            ":asset_type": asset_type.to_string(),
        },
        row_to_image,
    )
    .optional()
    .map_err(mediarch_common::Error::from)
}

/// List every published image record for a movie, e.g. to remove stale
/// files during a publish rebuild.
pub fn list_images_for_movie(conn: &Connection, movie_id: MovieId) -> Result<Vec<LibraryImageFile>> {
    let mut stmt = conn.prepare(
        "SELECT id, movie_id, asset_type, cache_file_id, absolute_path, created_at
         FROM library_image_files WHERE movie_id = :movie_id",
    )?;

    let rows = stmt
        .query_map(
            rusqlite::named_params! { ":movie_id": movie_id.to_string() },
            row_to_image,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Remove every published image record for a movie (used during reclaim).
pub fn delete_images_for_movie(conn: &Connection, movie_id: MovieId) -> Result<usize> {
    let rows_affected = conn.execute(
        "DELETE FROM library_image_files WHERE movie_id = :movie_id",
        rusqlite::named_params! { ":movie_id": movie_id.to_string() },
    )?;
    Ok(rows_affected)
}

fn row_to_video(row: &Row) -> rusqlite::Result<LibraryVideoFile> {
    Ok(LibraryVideoFile {
        id: row.get("id")?,
        movie_id: MovieId::from(Uuid::parse_str(&row.get::<_, String>("movie_id")?).unwrap()),
        asset_type: AssetType::from_str(&row.get::<_, String>("asset_type")?).unwrap(),
        cache_file_id: CacheFileId::from(Uuid::parse_str(&row.get::<_, String>("cache_file_id")?).unwrap()),
        absolute_path: row.get("absolute_path")?,
        created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>("created_at")?)
            .unwrap()
            .with_timezone(&Utc),
    })
}

/// Publish (or republish) the trailer for a movie.
pub fn publish_video(
    conn: &Connection,
    movie_id: MovieId,
    asset_type: AssetType,
    cache_file_id: CacheFileId,
    absolute_path: &str,
) -> Result<LibraryVideoFile> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    conn.execute(
        "INSERT INTO library_video_files (id, movie_id, asset_type, cache_file_id, absolute_path, created_at)
         VALUES (:id, :movie_id, :asset_type, :cache_file_id, :path, :now)
         ON CONFLICT(movie_id, asset_type) DO UPDATE SET
            cache_file_id = excluded.cache_file_id,
            absolute_path = excluded.absolute_path,
            created_at = excluded.created_at",
        rusqlite::named_params! {
            ":id": id,
            ":movie_id": movie_id.to_string(),
            ":asset_type": asset_type.to_string(),
            ":cache_file_id": cache_file_id.to_string(),
            ":path": absolute_path,
            ":now": now.to_rfc3339(),
        },
    )?;

    get_video(conn, movie_id, asset_type)?
        .ok_or_else(|| mediarch_common::Error::internal("publish did not persist"))
}

/// Get the currently published trailer record for a movie.
pub fn get_video(
    conn: &Connection,
    movie_id: MovieId,
    asset_type: AssetType,
) -> Result<Option<LibraryVideoFile>> {
    conn.query_row(
        "SELECT id, movie_id, asset_type, cache_file_id, absolute_path, created_at
         FROM library_video_files WHERE movie_id = :movie_id AND asset_type = :asset_type",
        rusqlite::named_params! {
            ":movie_id": movie_id.to_string(),
            ":asset_type": asset_type.to_string(),
        },
        row_to_video,
    )
    .optional()
    .map_err(mediarch_common::Error::from)
}

/// Remove every published trailer record for a movie (used by the
/// publisher's rebuild step and by reclaim).
pub fn delete_videos_for_movie(conn: &Connection, movie_id: MovieId) -> Result<usize> {
    let rows_affected = conn.execute(
        "DELETE FROM library_video_files WHERE movie_id = :movie_id",
        rusqlite::named_params! { ":movie_id": movie_id.to_string() },
    )?;
    Ok(rows_affected)
}

fn row_to_text(row: &Row) -> rusqlite::Result<LibraryTextFile> {
    Ok(LibraryTextFile {
        id: row.get("id")?,
        movie_id: MovieId::from(Uuid::parse_str(&row.get::<_, String>("movie_id")?).unwrap()),
        cache_file_id: CacheFileId::from(Uuid::parse_str(&row.get::<_, String>("cache_file_id")?).unwrap()),
        absolute_path: row.get("absolute_path")?,
        created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>("created_at")?)
            .unwrap()
            .with_timezone(&Utc),
    })
}

/// Publish (or republish) the NFO sidecar for a movie.
pub fn publish_text(
    conn: &Connection,
    movie_id: MovieId,
    cache_file_id: CacheFileId,
    absolute_path: &str,
) -> Result<LibraryTextFile> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    conn.execute(
        "INSERT INTO library_text_files (id, movie_id, cache_file_id, absolute_path, created_at)
         VALUES (:id, :movie_id, :cache_file_id, :path, :now)
         ON CONFLICT(movie_id) DO UPDATE SET
            cache_file_id = excluded.cache_file_id,
            absolute_path = excluded.absolute_path,
            created_at = excluded.created_at",
        rusqlite::named_params! {
            ":id": id,
            ":movie_id": movie_id.to_string(),
            ":cache_file_id": cache_file_id.to_string(),
            ":path": absolute_path,
            ":now": now.to_rfc3339(),
        },
    )?;

    get_text(conn, movie_id)?.ok_or_else(|| mediarch_common::Error::internal("publish did not persist"))
}

/// Get the currently published NFO record for a movie.
pub fn get_text(conn: &Connection, movie_id: MovieId) -> Result<Option<LibraryTextFile>> {
    conn.query_row(
        "SELECT id, movie_id, cache_file_id, absolute_path, created_at
         FROM library_text_files WHERE movie_id = :movie_id",
        rusqlite::named_params! { ":movie_id": movie_id.to_string() },
        row_to_text,
    )
    .optional()
    .map_err(mediarch_common::Error::from)
}

/// Remove the published NFO record for a movie (used by the publisher's
/// rebuild step and by reclaim).
pub fn delete_text_for_movie(conn: &Connection, movie_id: MovieId) -> Result<usize> {
    let rows_affected = conn.execute(
        "DELETE FROM library_text_files WHERE movie_id = :movie_id",
        rusqlite::named_params! { ":movie_id": movie_id.to_string() },
    )?;
    Ok(rows_affected)
}

fn row_to_audio(row: &Row) -> rusqlite::Result<LibraryAudioFile> {
    Ok(LibraryAudioFile {
        id: row.get("id")?,
        movie_id: MovieId::from(Uuid::parse_str(&row.get::<_, String>("movie_id")?).unwrap()),
        asset_type: AssetType::from_str(&row.get::<_, String>("asset_type")?).unwrap(),
        cache_file_id: CacheFileId::from(Uuid::parse_str(&row.get::<_, String>("cache_file_id")?).unwrap()),
        absolute_path: row.get("absolute_path")?,
        created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>("created_at")?)
            .unwrap()
            .with_timezone(&Utc),
    })
}

/// Publish (or republish) an audio asset for a movie.
pub fn publish_audio(
    conn: &Connection,
    movie_id: MovieId,
    asset_type: AssetType,
    cache_file_id: CacheFileId,
    absolute_path: &str,
) -> Result<LibraryAudioFile> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    conn.execute(
        "INSERT INTO library_audio_files (id, movie_id, asset_type, cache_file_id, absolute_path, created_at)
         VALUES (:id, :movie_id, :asset_type, :cache_file_id, :path, :now)
         ON CONFLICT(movie_id, asset_type) DO UPDATE SET
            cache_file_id = excluded.cache_file_id,
            absolute_path = excluded.absolute_path,
            created_at = excluded.created_at",
        rusqlite::named_params! {
            ":id": id,
            ":movie_id": movie_id.to_string(),
            ":asset_type": asset_type.to_string(),
            ":cache_file_id": cache_file_id.to_string(),
            ":path": absolute_path,
            ":now": now.to_rfc3339(),
        },
    )?;

    get_audio(conn, movie_id, asset_type)?
        .ok_or_else(|| mediarch_common::Error::internal("publish did not persist"))
}

/// Get the currently published audio record for a movie/asset type.
pub fn get_audio(
    conn: &Connection,
    movie_id: MovieId,
    asset_type: AssetType,
) -> Result<Option<LibraryAudioFile>> {
    conn.query_row(
        "SELECT id, movie_id, asset_type, cache_file_id, absolute_path, created_at
         FROM library_audio_files WHERE movie_id = :movie_id AND asset_type = :asset_type",
        rusqlite::named_params! {
            ":movie_id": movie_id.to_string(),
            ":asset_type": asset_type.to_string(),
        },
        row_to_audio,
    )
    .optional()
    .map_err(mediarch_common::Error::from)
}

/// Remove every published audio record for a movie (used by the
/// publisher's rebuild step and by reclaim).
pub fn delete_audio_for_movie(conn: &Connection, movie_id: MovieId) -> Result<usize> {
    let rows_affected = conn.execute(
        "DELETE FROM library_audio_files WHERE movie_id = :movie_id",
        rusqlite::named_params! { ":movie_id": movie_id.to_string() },
    )?;
    Ok(rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::{cache::put_image, libraries::create_library, movies::upsert_by_path};
    use mediarch_common::MediaType;

    fn setup() -> (
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
    fn test_publish_image_then_republish_updates_in_place() {
        let (conn, movie_id) = setup();

        let first_cached = put_image(&conn, "hash-1", "/cache/ha/hash-1", 10, None, None, None, None).unwrap();
        publish_image(&conn, movie_id, AssetType::Poster, first_cached.id, "/media/movies/a-poster.jpg").unwrap();

        let second_cached = put_image(&conn, "hash-2", "/cache/ha/hash-2", 10, None, None, None, None).unwrap();
        publish_image(&conn, movie_id, AssetType::Poster, second_cached.id, "/media/movies/a-poster.jpg").unwrap();

        let published = get_image(&conn, movie_id, AssetType::Poster).unwrap().unwrap();
        assert_eq!(published.cache_file_id, second_cached.id);

        let all = list_images_for_movie(&conn, movie_id).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn test_delete_images_for_movie() {
        let (conn, movie_id) = setup();

        let cached = put_image(&conn, "hash-1", "/cache/ha/hash-1", 10, None, None, None, None).unwrap();
        publish_image(&conn, movie_id, AssetType::Poster, cached.id, "/media/movies/a-poster.jpg").unwrap();

        let deleted = delete_images_for_movie(&conn, movie_id).unwrap();
        assert_eq!(deleted, 1);
        assert!(get_image(&conn, movie_id, AssetType::Poster).unwrap().is_none());
    }

    #[test]
    fn test_publish_text_single_nfo_per_movie() {
        use crate::queries::cache::put_text;

        let (conn, movie_id) = setup();
        let cached = put_text(&conn, "nfo-hash", "/cache/nf/nfo-hash", 200).unwrap();
        publish_text(&conn, movie_id, cached.id, "/media/movies/a.nfo").unwrap();

        let published = get_text(&conn, movie_id).unwrap().unwrap();
        assert_eq!(published.cache_file_id, cached.id);
    }

    #[test]
    fn test_delete_videos_for_movie() {
        use crate::queries::cache::put_video;

        let (conn, movie_id) = setup();
        let cached = put_video(&conn, "trailer-hash", "/cache/tr/trailer-hash", 1000, None).unwrap();
        publish_video(&conn, movie_id, AssetType::Trailer, cached.id, "/media/movies/a-trailer.mp4").unwrap();

        let deleted = delete_videos_for_movie(&conn, movie_id).unwrap();
        assert_eq!(deleted, 1);
        assert!(get_video(&conn, movie_id, AssetType::Trailer).unwrap().is_none());
    }

    #[test]
    fn test_delete_text_for_movie() {
        use crate::queries::cache::put_text;

        let (conn, movie_id) = setup();
        let cached = put_text(&conn, "nfo-hash", "/cache/nf/nfo-hash", 200).unwrap();
        publish_text(&conn, movie_id, cached.id, "/media/movies/a.nfo").unwrap();

        let deleted = delete_text_for_movie(&conn, movie_id).unwrap();
        assert_eq!(deleted, 1);
        assert!(get_text(&conn, movie_id).unwrap().is_none());
    }

    #[test]
    fn test_delete_audio_for_movie() {
        use crate::queries::cache::put_audio;

        let (conn, movie_id) = setup();
        let cached = put_audio(&conn, "theme-hash", "/cache/th/theme-hash", 500).unwrap();
        publish_audio(&conn, movie_id, AssetType::Trailer, cached.id, "/media/movies/theme.mp3").unwrap();

        let deleted = delete_audio_for_movie(&conn, movie_id).unwrap();
        assert_eq!(deleted, 1);
        assert!(get_audio(&conn, movie_id, AssetType::Trailer).unwrap().is_none());
    }
}
