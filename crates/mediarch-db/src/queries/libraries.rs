//! Library database queries.

use chrono::{DateTime, Utc};
use mediarch_common::{Error, LibraryId, MediaType, Result};
use rusqlite::Connection;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::Library;

fn row_to_library(row: &rusqlite::Row) -> rusqlite::Result<Library> {
    Ok(Library {
        id: LibraryId::from(Uuid::parse_str(&row.get::<_, String>(0)?).unwrap()),
        name: row.get(1)?,
        root_path: row.get(2)?,
        media_type: MediaType::from_str(&row.get::<_, String>(3)?).unwrap(),
        auto_enrich: row.get::<_, i64>(4)? != 0,
        auto_publish: row.get::<_, i64>(5)? != 0,
        created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(6)?)
            .unwrap()
            .with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(7)?)
            .unwrap()
            .with_timezone(&Utc),
    })
}

/// Create a new library.
pub fn create_library(
    conn: &Connection,
    name: &str,
    root_path: &str,
    media_type: MediaType,
) -> Result<Library> {
    let id = LibraryId::new();
    let now = Utc::now();

    conn.execute(
        "INSERT INTO libraries (id, name, root_path, media_type, created_at, updated_at)
         VALUES (:id, :name, :root_path, :media_type, :now, :now)",
        rusqlite::named_params! {
            ":id": id.to_string(),
            ":name": name,
            ":root_path": root_path,
            ":media_type": media_type.to_string(),
            ":now": now.to_rfc3339(),
        },
    )?;

    Ok(Library {
        id,
        name: name.to_string(),
        root_path: root_path.to_string(),
        media_type,
        auto_enrich: false,
        auto_publish: false,
        created_at: now,
        updated_at: now,
    })
}

/// Get a library by ID.
pub fn get_library(conn: &Connection, id: LibraryId) -> Result<Option<Library>> {
    let result = conn.query_row(
        "SELECT id, name, root_path, media_type, auto_enrich, auto_publish, created_at, updated_at
         FROM libraries WHERE id = :id",
        rusqlite::named_params! { ":id": id.to_string() },
        row_to_library,
    );

    match result {
        Ok(library) => Ok(Some(library)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::from(e)),
    }
}

/// List all libraries, ordered by name.
pub fn list_libraries(conn: &Connection) -> Result<Vec<Library>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, root_path, media_type, auto_enrich, auto_publish, created_at, updated_at
         FROM libraries ORDER BY name",
    )?;

    let libraries = stmt
        .query_map([], row_to_library)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(libraries)
}

/// Set a library's auto-enrich/auto-publish policy flags.
pub fn set_policy(
    conn: &Connection,
    id: LibraryId,
    auto_enrich: bool,
    auto_publish: bool,
) -> Result<()> {
    let rows_affected = conn.execute(
        "UPDATE libraries SET auto_enrich = :auto_enrich, auto_publish = :auto_publish,
         updated_at = :now WHERE id = :id",
        rusqlite::named_params! {
            ":id": id.to_string(),
            ":auto_enrich": auto_enrich as i64,
            ":auto_publish": auto_publish as i64,
            ":now": Utc::now().to_rfc3339(),
        },
    )?;

    if rows_affected == 0 {
        return Err(Error::not_found("library"));
    }

    Ok(())
}

/// Delete a library (cascades to movies and everything derived from them).
pub fn delete_library(conn: &Connection, id: LibraryId) -> Result<bool> {
    let rows_affected = conn.execute(
        "DELETE FROM libraries WHERE id = :id",
        rusqlite::named_params! { ":id": id.to_string() },
    )?;

    Ok(rows_affected > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;

    #[test]
    fn test_create_library() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let library = create_library(&conn, "Movies", "/media/movies", MediaType::Movie).unwrap();

        assert_eq!(library.name, "Movies");
        assert_eq!(library.media_type, MediaType::Movie);
        assert_eq!(library.root_path, "/media/movies");
        assert!(!library.auto_enrich);
    }

    #[test]
    fn test_get_library() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let created = create_library(&conn, "Movies", "/media/movies", MediaType::Movie).unwrap();

        let found = get_library(&conn, created.id).unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.name, "Movies");
    }

    #[test]
    fn test_get_library_not_found() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let result = get_library(&conn, LibraryId::new()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_list_libraries_sorted_by_name() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        create_library(&conn, "Zeta", "/z", MediaType::Movie).unwrap();
        create_library(&conn, "Alpha", "/a", MediaType::Movie).unwrap();

        let libraries = list_libraries(&conn).unwrap();
        assert_eq!(libraries.len(), 2);
        assert_eq!(libraries[0].name, "Alpha");
        assert_eq!(libraries[1].name, "Zeta");
    }

    #[test]
    fn test_set_policy() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let library = create_library(&conn, "Movies", "/media/movies", MediaType::Movie).unwrap();
        set_policy(&conn, library.id, true, true).unwrap();

        let updated = get_library(&conn, library.id).unwrap().unwrap();
        assert!(updated.auto_enrich);
        assert!(updated.auto_publish);
    }

    #[test]
    fn test_set_policy_not_found() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let result = set_policy(&conn, LibraryId::new(), true, true);
        assert!(result.is_err());
    }

    #[test]
    fn test_delete_library_cascades_to_movies() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let library = create_library(&conn, "Movies", "/media/movies", MediaType::Movie).unwrap();

        conn.execute(
            "INSERT INTO movies (id, library_id, file_path, title) VALUES (?, ?, ?, ?)",
            rusqlite::params![
                uuid::Uuid::new_v4().to_string(),
                library.id.to_string(),
                "/media/movies/a.mkv",
                "A"
            ],
        )
        .unwrap();

        let deleted = delete_library(&conn, library.id).unwrap();
        assert!(deleted);

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM movies WHERE library_id = ?",
                [library.id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 0);
    }
}
