//! Actor-enrichment database queries.
//!
//! The actor-enrichment phase replaces a movie's cast list
//! wholesale on each run rather than diffing, since providers return the
//! full cast every time.

use chrono::Utc;
use mediarch_common::{ActorId, MovieId, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::models::Actor;

fn row_to_actor(row: &Row) -> rusqlite::Result<Actor> {
    Ok(Actor {
        id: ActorId::from(Uuid::parse_str(&row.get::<_, String>("id")?).unwrap()),
        movie_id: MovieId::from(Uuid::parse_str(&row.get::<_, String>("movie_id")?).unwrap()),
        name: row.get("name")?,
        role: row.get("role")?,
        order_index: row.get("order_index")?,
        thumb_cache_hash: row.get("thumb_cache_hash")?,
        created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>("created_at")?)
            .unwrap()
            .with_timezone(&Utc),
    })
}

/// One cast member as returned by a provider, before insertion.
pub struct NewActor<'a> {
    pub name: &'a str,
    pub role: Option<&'a str>,
    pub order_index: i32,
}

/// Replace a movie's entire cast list with the newly fetched set, inside a
/// transaction so a crash mid-replace cannot leave a partial cast.
pub fn replace_cast(conn: &mut Connection, movie_id: MovieId, cast: &[NewActor]) -> Result<Vec<Actor>> {
    let tx = conn.transaction()?;

    tx.execute(
        "DELETE FROM actors WHERE movie_id = :movie_id",
        rusqlite::named_params! { ":movie_id": movie_id.to_string() },
    )?;

    let now = Utc::now();
    let mut inserted = Vec::with_capacity(cast.len());
    for actor in cast {
        let id = ActorId::new();
        tx.execute(
            "INSERT INTO actors (id, movie_id, name, role, order_index, created_at)
             VALUES (:id, :movie_id, :name, :role, :order_index, :now)",
            rusqlite::named_params! {
                ":id": id.to_string(),
                ":movie_id": movie_id.to_string(),
                ":name": actor.name,
                ":role": actor.role,
                ":order_index": actor.order_index,
                ":now": now.to_rfc3339(),
            },
        )?;

        inserted.push(Actor {
            id,
            movie_id,
            name: actor.name.to_string(),
            role: actor.role.map(str::to_string),
            order_index: actor.order_index,
            thumb_cache_hash: None,
            created_at: now,
        });
    }

    tx.commit()?;
    Ok(inserted)
}

/// List a movie's cast, ordered by billing order.
pub fn list_for_movie(conn: &Connection, movie_id: MovieId) -> Result<Vec<Actor>> {
    let mut stmt = conn.prepare(
        "SELECT id, movie_id, name, role, order_index, thumb_cache_hash, created_at
         FROM actors WHERE movie_id = :movie_id ORDER BY order_index",
    )?;

    let actors = stmt
        .query_map(
            rusqlite::named_params! { ":movie_id": movie_id.to_string() },
            row_to_actor,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(actors)
}

/// Attach a cached headshot hash to an actor once its thumbnail has been
/// downloaded and stored in the content-addressed cache.
pub fn set_thumb_hash(conn: &Connection, id: ActorId, hash: &str) -> Result<()> {
    conn.execute(
        "UPDATE actors SET thumb_cache_hash = :hash WHERE id = :id",
        rusqlite::named_params! { ":id": id.to_string(), ":hash": hash },
    )?;
    Ok(())
}

/// Get a single actor by ID.
pub fn get(conn: &Connection, id: ActorId) -> Result<Option<Actor>> {
    conn.query_row(
        "SELECT id, movie_id, name, role, order_index, thumb_cache_hash, created_at
         FROM actors WHERE id = :id",
        rusqlite::named_params! { ":id": id.to_string() },
        row_to_actor,
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
    fn test_replace_cast_inserts_in_order() {
        let (mut conn, movie_id) = setup_movie();

        let cast = vec![
            NewActor { name: "Keanu Reeves", role: Some("Neo"), order_index: 0 },
            NewActor { name: "Laurence Fishburne", role: Some("Morpheus"), order_index: 1 },
        ];
        let inserted = replace_cast(&mut conn, movie_id, &cast).unwrap();
        assert_eq!(inserted.len(), 2);

        let listed = list_for_movie(&conn, movie_id).unwrap();
        assert_eq!(listed[0].name, "Keanu Reeves");
        assert_eq!(listed[1].name, "Laurence Fishburne");
    }

    #[test]
    fn test_replace_cast_wholesale_drops_stale_members() {
        let (mut conn, movie_id) = setup_movie();

        replace_cast(
            &mut conn,
            movie_id,
            &[NewActor { name: "Old Cast Member", role: None, order_index: 0 }],
        )
        .unwrap();

        replace_cast(
            &mut conn,
            movie_id,
            &[NewActor { name: "New Cast Member", role: None, order_index: 0 }],
        )
        .unwrap();

        let listed = list_for_movie(&conn, movie_id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "New Cast Member");
    }

    #[test]
    fn test_set_thumb_hash() {
        let (mut conn, movie_id) = setup_movie();
        let inserted = replace_cast(
            &mut conn,
            movie_id,
            &[NewActor { name: "Keanu Reeves", role: None, order_index: 0 }],
        )
        .unwrap();

        set_thumb_hash(&conn, inserted[0].id, "deadbeef").unwrap();

        let fetched = get(&conn, inserted[0].id).unwrap().unwrap();
        assert_eq!(fetched.thumb_cache_hash, Some("deadbeef".to_string()));
    }
}
