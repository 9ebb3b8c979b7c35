//! Rust models matching the database schema.
//!
//! Strongly-typed structures mapping to tables created by the embedded
//! migrations, using the closed enums and typed IDs from `mediarch-common`.

use chrono::{DateTime, Utc};
use mediarch_common::{
    ActorId, AssetCandidateId, AssetType, CacheFileId, EnrichmentStatus, JobId, JobKind,
    JobPriority, LibraryId, MediaType, MovieId, RecycleEntryId, TestStatus,
};
use serde::{Deserialize, Serialize};

/// Row id for tables that have no dedicated typed-ID wrapper, following
/// the existing bare `String` alias convention (e.g. `MediaStreamId`).
pub type RowId = String;

/// Media library: a scanned root directory with enrichment policy flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Library {
    pub id: LibraryId,
    pub name: String,
    pub root_path: String,
    pub media_type: MediaType,
    pub auto_enrich: bool,
    pub auto_publish: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The concrete entity variant enriched by this pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub id: MovieId,
    pub library_id: LibraryId,
    pub file_path: String,
    pub title: String,
    pub sort_title: Option<String>,
    pub original_title: Option<String>,
    pub year: Option<i32>,
    pub plot: Option<String>,
    pub tagline: Option<String>,
    pub runtime_minutes: Option<i32>,
    pub release_date: Option<String>,
    pub tmdb_id: Option<i64>,
    pub imdb_id: Option<String>,
    pub tvdb_id: Option<i64>,
    pub status: EnrichmentStatus,
    pub monitored: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub last_published_at: Option<DateTime<Utc>>,
    pub published_nfo_hash: Option<String>,
    pub enriched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cast member of a movie, as supplied by an actor-enrichment provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Actor {
    pub id: ActorId,
    pub movie_id: MovieId,
    pub name: String,
    pub role: Option<String>,
    pub order_index: i32,
    pub thumb_cache_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Content-addressed cache entry for a downloaded image, keyed by the full
/// SHA-256 hex digest of its bytes. Carries the perceptual hashes used by
/// asset-selection dedup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheImageFile {
    pub id: CacheFileId,
    pub hash: String,
    pub path: String,
    pub byte_size: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub a_hash: Option<String>,
    pub d_hash: Option<String>,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
}

/// Content-addressed cache entry for a downloaded trailer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheVideoFile {
    pub id: CacheFileId,
    pub hash: String,
    pub path: String,
    pub byte_size: i64,
    pub duration_secs: Option<f64>,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
}

/// Content-addressed cache entry for an NFO sidecar or other text payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheTextFile {
    pub id: CacheFileId,
    pub hash: String,
    pub path: String,
    pub byte_size: i64,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
}

/// Content-addressed cache entry for theme music or similar audio assets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheAudioFile {
    pub id: CacheFileId,
    pub hash: String,
    pub path: String,
    pub byte_size: i64,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
}

/// A proposed artwork/trailer variant surfaced by a provider, before the
/// asset selector narrows candidates down to at most one per asset type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetCandidate {
    pub id: AssetCandidateId,
    pub movie_id: MovieId,
    pub asset_type: AssetType,
    pub provider: String,
    pub source_url: String,
    pub content_hash: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub language: Option<String>,
    pub votes: Option<f64>,
    pub quality_hint: Option<String>,
    pub a_hash: Option<String>,
    pub d_hash: Option<String>,
    pub is_selected: bool,
    pub selection_reason: Option<String>,
    pub display_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Record of "this image asset type is currently published to this path
/// for this movie", rebuilt wholesale on every publish.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryImageFile {
    pub id: RowId,
    pub movie_id: MovieId,
    pub asset_type: AssetType,
    pub cache_file_id: CacheFileId,
    pub absolute_path: String,
    pub created_at: DateTime<Utc>,
}

/// Published trailer record (single `library_video_files` row per movie
/// per asset type, i.e. at most one trailer).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryVideoFile {
    pub id: RowId,
    pub movie_id: MovieId,
    pub asset_type: AssetType,
    pub cache_file_id: CacheFileId,
    pub absolute_path: String,
    pub created_at: DateTime<Utc>,
}

/// Published NFO sidecar record; at most one per movie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryTextFile {
    pub id: RowId,
    pub movie_id: MovieId,
    pub cache_file_id: CacheFileId,
    pub absolute_path: String,
    pub created_at: DateTime<Utc>,
}

/// Published audio asset record (e.g. theme music).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryAudioFile {
    pub id: RowId,
    pub movie_id: MovieId,
    pub asset_type: AssetType,
    pub cache_file_id: CacheFileId,
    pub absolute_path: String,
    pub created_at: DateTime<Utc>,
}

/// Status of a job queue row. Closed set: a job is only ever `pending` or
/// `processing` while it exists — on success or terminal failure the row
/// is deleted rather than transitioned to a third status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            _ => Err(format!("unknown job status: {s}")),
        }
    }
}

/// A persisted job queue row (C9).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub priority: JobPriority,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub manual: bool,
    pub dedup_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Per-provider configuration and connection test state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    pub provider_name: String,
    pub enabled: bool,
    pub api_key: Option<String>,
    pub personal_api_key: Option<String>,
    pub language: String,
    pub region: Option<String>,
    pub options: Option<serde_json::Value>,
    pub last_test_at: Option<DateTime<Utc>>,
    pub last_test_status: TestStatus,
}

/// Per-asset-type auto-selection preset and provider priority order (C8).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoSelectionStrategy {
    pub id: RowId,
    pub asset_type: AssetType,
    pub preset: String,
    pub provider_priority: Vec<String>,
}

/// Per-library scheduler cadence configuration (C12).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibrarySchedulerConfig {
    pub library_id: LibraryId,
    pub file_scanner_enabled: bool,
    pub file_scanner_interval_hours: i32,
    pub provider_updater_enabled: bool,
    pub provider_updater_interval_hours: i32,
    pub last_file_scan_at: Option<DateTime<Utc>>,
    pub last_provider_update_at: Option<DateTime<Utc>>,
}

/// A single entry in the activity log surfaced to operators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityLogEntry {
    pub id: RowId,
    pub occurred_at: DateTime<Utc>,
    pub level: String,
    pub message: String,
    pub movie_id: Option<MovieId>,
    pub job_id: Option<JobId>,
}

/// Soft-deleted movie recycle-bin entry. Present in the schema but not
/// swept by the garbage collector in this implementation (see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecycleEntry {
    pub id: RecycleEntryId,
    pub movie_id: MovieId,
    pub original_path: String,
    pub current_path: Option<String>,
    pub size_bytes: i64,
    pub recycled_at: DateTime<Utc>,
}
