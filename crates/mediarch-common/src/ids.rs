//! Typed ID wrappers for type safety across mediarch.
//!
//! This module provides newtype wrappers around UUIDs to prevent mixing different
//! types of identifiers (e.g., using a LibraryId where a MovieId is expected).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a media library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LibraryId(Uuid);

impl LibraryId {
    /// Generate a new random library ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LibraryId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for LibraryId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<LibraryId> for Uuid {
    fn from(id: LibraryId) -> Self {
        id.0
    }
}

impl std::fmt::Display for LibraryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a movie entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovieId(Uuid);

impl MovieId {
    /// Generate a new random movie ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MovieId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for MovieId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<MovieId> for Uuid {
    fn from(id: MovieId) -> Self {
        id.0
    }
}

impl std::fmt::Display for MovieId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(Uuid);

impl ActorId {
    /// Generate a new random actor ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ActorId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<ActorId> for Uuid {
    fn from(id: ActorId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a proposed asset candidate (artwork or trailer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetCandidateId(Uuid);

impl AssetCandidateId {
    /// Generate a new random asset candidate ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AssetCandidateId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for AssetCandidateId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AssetCandidateId> for Uuid {
    fn from(id: AssetCandidateId) -> Self {
        id.0
    }
}

impl std::fmt::Display for AssetCandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a row in the content-addressed cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheFileId(Uuid);

impl CacheFileId {
    /// Generate a new random cache file ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CacheFileId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for CacheFileId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<CacheFileId> for Uuid {
    fn from(id: CacheFileId) -> Self {
        id.0
    }
}

impl std::fmt::Display for CacheFileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a new random job ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for JobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<JobId> for Uuid {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a recycle-bin entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecycleEntryId(Uuid);

impl RecycleEntryId {
    /// Generate a new random recycle entry ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecycleEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RecycleEntryId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<RecycleEntryId> for Uuid {
    fn from(id: RecycleEntryId) -> Self {
        id.0
    }
}

impl std::fmt::Display for RecycleEntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! impl_from_str {
    ($($id:ident),* $(,)?) => {
        $(
            impl std::str::FromStr for $id {
                type Err = uuid::Error;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    Ok(Self(Uuid::parse_str(s)?))
                }
            }
        )*
    };
}

impl_from_str!(LibraryId, MovieId, ActorId, AssetCandidateId, CacheFileId, JobId, RecycleEntryId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movie_id_creation() {
        let id1 = MovieId::new();
        let id2 = MovieId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_movie_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let movie_id = MovieId::from(uuid);
        let uuid_back: Uuid = movie_id.into();
        assert_eq!(uuid, uuid_back);
    }

    #[test]
    fn test_job_id_serialization() {
        let id = JobId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: JobId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_library_id_display() {
        let id = LibraryId::new();
        let display = format!("{}", id);
        assert!(!display.is_empty());
    }

    #[test]
    fn test_different_id_types_same_uuid() {
        let uuid = Uuid::new_v4();
        let _library_id = LibraryId::from(uuid);
        let _movie_id = MovieId::from(uuid);
        // Type system prevents mixing these at compile time
    }

    #[test]
    fn test_cache_file_id_default() {
        let id1 = CacheFileId::default();
        let id2 = CacheFileId::default();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_asset_candidate_id_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        let id = AssetCandidateId::new();
        set.insert(id);
        assert!(set.contains(&id));
    }

    #[test]
    fn test_actor_id_clone() {
        let id = ActorId::new();
        let cloned = id;
        assert_eq!(id, cloned);
    }

    #[test]
    fn test_recycle_entry_id_creation() {
        let id1 = RecycleEntryId::new();
        let id2 = RecycleEntryId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_library_id_roundtrips_through_display_and_from_str() {
        use std::str::FromStr;
        let id = LibraryId::new();
        let parsed = LibraryId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_movie_id_from_str_rejects_garbage() {
        use std::str::FromStr;
        assert!(MovieId::from_str("not-a-uuid").is_err());
    }
}
