//! Mediarch-DB: schema, migrations, and query operations.
//!
//! SQLite-backed persistence for libraries, movies, the content-addressed
//! cache, asset candidates, and the job queue, using rusqlite with r2d2
//! connection pooling.
//!
//! # Modules
//!
//! - `migrations` - embedded schema migrations
//! - `pool` - connection pool management
//! - `models` - Rust structs matching the schema
//! - `queries` - per-entity query operations
//!
//! # Example
//!
//! ```no_run
//! use mediarch_db::pool::{init_pool, get_conn};
//! use mediarch_db::queries::libraries;
//! use mediarch_common::MediaType;
//!
//! let pool = init_pool("/var/lib/mediarch/db.sqlite").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let library = libraries::create_library(&conn, "Movies", "/media/movies", MediaType::Movie).unwrap();
//! println!("Created library: {}", library.name);
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
