//! Content-addressed cache database queries (C4).
//!
//! One table per media kind, keyed by the full SHA-256 hex digest of the
//! file's bytes. `image` carries the perceptual hashes the asset selector
//! dedups on; the other kinds only need presence/locking bookkeeping.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use mediarch_common::{CacheFileId, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::models::{CacheAudioFile, CacheImageFile, CacheTextFile, CacheVideoFile};

fn row_to_image(row: &Row) -> rusqlite::Result<CacheImageFile> {
    Ok(CacheImageFile {
        id: CacheFileId::from(Uuid::parse_str(&row.get::<_, String>("id")?).unwrap()),
        hash: row.get("hash")?,
        path: row.get("path")?,
        byte_size: row.get("byte_size")?,
        width: row.get("width")?,
        height: row.get("height")?,
        a_hash: row.get("a_hash")?,
        d_hash: row.get("d_hash")?,
        is_locked: row.get::<_, i64>("is_locked")? != 0,
        created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>("created_at")?)
            .unwrap()
            .with_timezone(&Utc),
    })
}

/// Insert a new cache row for a downloaded image, or return the existing
/// one if its hash is already present (the content-addressed cache is
/// append-only and dedups purely on hash).
pub fn put_image(
    conn: &Connection,
    hash: &str,
    path: &str,
    byte_size: i64,
    width: Option<i32>,
    height: Option<i32>,
    a_hash: Option<&str>,
    d_hash: Option<&str>,
) -> Result<CacheImageFile> {
    if let Some(existing) = get_image_by_hash(conn, hash)? {
        return Ok(existing);
    }

    let id = CacheFileId::new();
    conn.execute(
        "INSERT INTO cache_image_files (id, hash, path, byte_size, width, height, a_hash, d_hash, created_at)
         VALUES (:id, :hash, :path, :byte_size, :width, :height, :a_hash, :d_hash, :now)",
        rusqlite::named_params! {
            ":id": id.to_string(),
            ":hash": hash,
            ":path": path,
            ":byte_size": byte_size,
            ":width": width,
            ":height": height,
            ":a_hash": a_hash,
            ":d_hash": d_hash,
            ":now": Utc::now().to_rfc3339(),
        },
    )?;

    get_image_by_hash(conn, hash)?.ok_or_else(|| mediarch_common::Error::internal("insert did not persist"))
}

/// Look up a cached image by its content hash.
pub fn get_image_by_hash(conn: &Connection, hash: &str) -> Result<Option<CacheImageFile>> {
    conn.query_row(
        "SELECT id, hash, path, byte_size, width, height, a_hash, d_hash, is_locked, created_at
         FROM cache_image_files WHERE hash = :hash",
        rusqlite::named_params! { ":hash": hash },
        row_to_image,
    )
    .optional()
    .map_err(mediarch_common::Error::from)
}

/// List every image hash not referenced by any `library_image_files` row,
/// for the garbage collector's orphan sweep.
pub fn list_orphan_image_hashes(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT c.hash FROM cache_image_files c
         LEFT JOIN library_image_files l ON l.cache_file_id = c.id
         WHERE l.id IS NULL AND c.is_locked = 0",
    )?;

    let hashes = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(hashes)
}

/// Every hash this cache table knows about, for cross-referencing against
/// what actually exists on disk.
pub fn list_all_image_hashes(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT hash FROM cache_image_files")?;
    let hashes = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<HashSet<_>, _>>()?;
    Ok(hashes)
}

/// Delete a cache row by hash (the caller is responsible for removing the
/// underlying file from disk first).
pub fn delete_image(conn: &Connection, hash: &str) -> Result<bool> {
    let rows_affected = conn.execute(
        "DELETE FROM cache_image_files WHERE hash = :hash",
        rusqlite::named_params! { ":hash": hash },
    )?;
    Ok(rows_affected > 0)
}

fn row_to_video(row: &Row) -> rusqlite::Result<CacheVideoFile> {
    Ok(CacheVideoFile {
        id: CacheFileId::from(Uuid::parse_str(&row.get::<_, String>("id")?).unwrap()),
        hash: row.get("hash")?,
        path: row.get("path")?,
        byte_size: row.get("byte_size")?,
        duration_secs: row.get("duration_secs")?,
        is_locked: row.get::<_, i64>("is_locked")? != 0,
        created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>("created_at")?)
            .unwrap()
            .with_timezone(&Utc),
    })
}

/// Insert a new cache row for a downloaded trailer, or return the existing
/// one if its hash is already present.
pub fn put_video(
    conn: &Connection,
    hash: &str,
    path: &str,
    byte_size: i64,
    duration_secs: Option<f64>,
) -> Result<CacheVideoFile> {
    if let Some(existing) = get_video_by_hash(conn, hash)? {
        return Ok(existing);
    }

    let id = CacheFileId::new();
    conn.execute(
        "INSERT INTO cache_video_files (id, hash, path, byte_size, duration_secs, created_at)
         VALUES (:id, :hash, :path, :byte_size, :duration_secs, :now)",
        rusqlite::named_params! {
            ":id": id.to_string(),
            ":hash": hash,
            ":path": path,
            ":byte_size": byte_size,
            ":duration_secs": duration_secs,
            ":now": Utc::now().to_rfc3339(),
        },
    )?;

    get_video_by_hash(conn, hash)?.ok_or_else(|| mediarch_common::Error::internal("insert did not persist"))
}

/// Look up a cached video by its content hash.
pub fn get_video_by_hash(conn: &Connection, hash: &str) -> Result<Option<CacheVideoFile>> {
    conn.query_row(
        "SELECT id, hash, path, byte_size, duration_secs, is_locked, created_at
         FROM cache_video_files WHERE hash = :hash",
        rusqlite::named_params! { ":hash": hash },
        row_to_video,
    )
    .optional()
    .map_err(mediarch_common::Error::from)
}

/// List every video hash not referenced by any `library_video_files` row.
pub fn list_orphan_video_hashes(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT c.hash FROM cache_video_files c
         LEFT JOIN library_video_files l ON l.cache_file_id = c.id
         WHERE l.id IS NULL AND c.is_locked = 0",
    )?;
    let hashes = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(hashes)
}

/// Every hash this cache table knows about, for cross-referencing against
/// what actually exists on disk.
pub fn list_all_video_hashes(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT hash FROM cache_video_files")?;
    let hashes = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<HashSet<_>, _>>()?;
    Ok(hashes)
}

pub fn delete_video(conn: &Connection, hash: &str) -> Result<bool> {
    let rows_affected = conn.execute(
        "DELETE FROM cache_video_files WHERE hash = :hash",
        rusqlite::named_params! { ":hash": hash },
    )?;
    Ok(rows_affected > 0)
}

fn row_to_text(row: &Row) -> rusqlite::Result<CacheTextFile> {
    Ok(CacheTextFile {
        id: CacheFileId::from(Uuid::parse_str(&row.get::<_, String>("id")?).unwrap()),
        hash: row.get("hash")?,
        path: row.get("path")?,
        byte_size: row.get("byte_size")?,
        is_locked: row.get::<_, i64>("is_locked")? != 0,
        created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>("created_at")?)
            .unwrap()
            .with_timezone(&Utc),
    })
}

/// Insert a new cache row for a rendered NFO sidecar, or return the
/// existing one if this exact content already exists (this is how the
/// publisher's hash-based idempotent sync short-circuits a
/// no-op NFO rewrite).
pub fn put_text(conn: &Connection, hash: &str, path: &str, byte_size: i64) -> Result<CacheTextFile> {
    if let Some(existing) = get_text_by_hash(conn, hash)? {
        return Ok(existing);
    }

    let id = CacheFileId::new();
    conn.execute(
        "INSERT INTO cache_text_files (id, hash, path, byte_size, created_at)
         VALUES (:id, :hash, :path, :byte_size, :now)",
        rusqlite::named_params! {
            ":id": id.to_string(),
            ":hash": hash,
            ":path": path,
            ":byte_size": byte_size,
            ":now": Utc::now().to_rfc3339(),
        },
    )?;

    get_text_by_hash(conn, hash)?.ok_or_else(|| mediarch_common::Error::internal("insert did not persist"))
}

/// Look up a cached text file by its content hash.
pub fn get_text_by_hash(conn: &Connection, hash: &str) -> Result<Option<CacheTextFile>> {
    conn.query_row(
        "SELECT id, hash, path, byte_size, is_locked, created_at
         FROM cache_text_files WHERE hash = :hash",
        rusqlite::named_params! { ":hash": hash },
        row_to_text,
    )
    .optional()
    .map_err(mediarch_common::Error::from)
}

/// List every text hash not referenced by any `library_text_files` row.
pub fn list_orphan_text_hashes(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT c.hash FROM cache_text_files c
         LEFT JOIN library_text_files l ON l.cache_file_id = c.id
         WHERE l.id IS NULL AND c.is_locked = 0",
    )?;
    let hashes = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(hashes)
}

/// Every hash this cache table knows about, for cross-referencing against
/// what actually exists on disk.
pub fn list_all_text_hashes(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT hash FROM cache_text_files")?;
    let hashes = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<HashSet<_>, _>>()?;
    Ok(hashes)
}

pub fn delete_text(conn: &Connection, hash: &str) -> Result<bool> {
    let rows_affected = conn.execute(
        "DELETE FROM cache_text_files WHERE hash = :hash",
        rusqlite::named_params! { ":hash": hash },
    )?;
    Ok(rows_affected > 0)
}

fn row_to_audio(row: &Row) -> rusqlite::Result<CacheAudioFile> {
    Ok(CacheAudioFile {
        id: CacheFileId::from(Uuid::parse_str(&row.get::<_, String>("id")?).unwrap()),
        hash: row.get("hash")?,
        path: row.get("path")?,
        byte_size: row.get("byte_size")?,
        is_locked: row.get::<_, i64>("is_locked")? != 0,
        created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>("created_at")?)
            .unwrap()
            .with_timezone(&Utc),
    })
}

/// Insert a new cache row for a downloaded audio asset, or return the
/// existing one if its hash is already present.
pub fn put_audio(conn: &Connection, hash: &str, path: &str, byte_size: i64) -> Result<CacheAudioFile> {
    if let Some(existing) = get_audio_by_hash(conn, hash)? {
        return Ok(existing);
    }

    let id = CacheFileId::new();
    conn.execute(
        "INSERT INTO cache_audio_files (id, hash, path, byte_size, created_at)
         VALUES (:id, :hash, :path, :byte_size, :now)",
        rusqlite::named_params! {
            ":id": id.to_string(),
            ":hash": hash,
            ":path": path,
            ":byte_size": byte_size,
            ":now": Utc::now().to_rfc3339(),
        },
    )?;

    get_audio_by_hash(conn, hash)?.ok_or_else(|| mediarch_common::Error::internal("insert did not persist"))
}

/// Look up a cached audio file by its content hash.
pub fn get_audio_by_hash(conn: &Connection, hash: &str) -> Result<Option<CacheAudioFile>> {
    conn.query_row(
        "SELECT id, hash, path, byte_size, is_locked, created_at
         FROM cache_audio_files WHERE hash = :hash",
        rusqlite::named_params! { ":hash": hash },
        row_to_audio,
    )
    .optional()
    .map_err(mediarch_common::Error::from)
}

/// List every audio hash not referenced by any `library_audio_files` row.
pub fn list_orphan_audio_hashes(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT c.hash FROM cache_audio_files c
         LEFT JOIN library_audio_files l ON l.cache_file_id = c.id
         WHERE l.id IS NULL AND c.is_locked = 0",
    )?;
    let hashes = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(hashes)
}

/// Every hash this cache table knows about, for cross-referencing against
/// what actually exists on disk.
pub fn list_all_audio_hashes(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT hash FROM cache_audio_files")?;
    let hashes = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<HashSet<_>, _>>()?;
    Ok(hashes)
}

pub fn delete_audio(conn: &Connection, hash: &str) -> Result<bool> {
    let rows_affected = conn.execute(
        "DELETE FROM cache_audio_files WHERE hash = :hash",
        rusqlite::named_params! { ":hash": hash },
    )?;
    Ok(rows_affected > 0)
}
