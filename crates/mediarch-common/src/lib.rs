//! Mediarch-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across mediarch:
//!
//! - **Typed IDs**: Type-safe UUID wrappers for libraries, movies, jobs, etc.
//! - **Core Types**: The closed enums the pipeline switches over exhaustively
//!   (media kind, asset type, job kind/priority, enrichment status).
//! - **Path Utilities**: Functions to detect file types by extension and
//!   sanitize filenames for the publisher.
//! - **Error Handling**: Common error types and result aliases.
//!
//! # Examples
//!
//! ```
//! use mediarch_common::{MovieId, MediaType, Error, Result};
//! use mediarch_common::paths::is_video_file;
//! use std::path::Path;
//!
//! // Create typed IDs
//! let movie_id = MovieId::new();
//!
//! // Work with media types
//! let media_type = MediaType::Movie;
//!
//! // Check file types
//! assert!(is_video_file(Path::new("movie.mkv")));
//!
//! // Use common error types
//! fn example() -> Result<()> {
//!     Err(Error::not_found("item"))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
