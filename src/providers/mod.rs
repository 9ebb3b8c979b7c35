//! Provider adapter contract and registry (C5/C6).
//!
//! Generalizes the existing `MetadataProvider` trait (one concrete method per
//! entity kind and response shape) into a single kind-parameterized contract
//! any number of heterogeneous metadata backends can implement uniformly,
//! plus the rate-limit/circuit-breaker/retry wrapping every adapter needs.

pub mod harness;
pub mod registry;
pub mod tmdb;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use mediarch_common::{AssetType, MediaType, Result};
use serde::{Deserialize, Serialize};

pub use harness::AdapterHarness;
pub use registry::ProviderRegistry;

/// Caller-declared urgency, used to pick per-call timeout and retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPriority {
    /// Short timeout (10s), few retries (2) — a user is waiting on this call.
    User,
    /// Long timeout (60s), more retries (5) — a background job is running it.
    Background,
}

impl FetchPriority {
    pub fn timeout(self) -> Duration {
        match self {
            Self::User => Duration::from_secs(10),
            Self::Background => Duration::from_secs(60),
        }
    }

    pub fn max_retries(self) -> u32 {
        match self {
            Self::User => 2,
            Self::Background => 5,
        }
    }
}

/// Static description of what a provider supports, used by the registry to
/// answer capability queries without invoking the provider.
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub entity_kinds: Vec<MediaType>,
    pub asset_types: Vec<AssetType>,
    pub metadata_fields: Vec<&'static str>,
    /// External ID keys this provider can resolve an entity from, in the
    /// order they should be tried (e.g. `["imdb", "tvdb"]`).
    pub external_id_lookup: Vec<&'static str>,
}

/// One hit from `search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub provider_result_id: String,
    pub title: String,
    pub year: Option<u16>,
    pub confidence: f64,
    pub external_ids: HashMap<String, String>,
}

/// Result of `get_metadata`: a partial map over a closed metadata-field set,
/// plus how much of that set was actually filled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataResponse {
    pub fields: HashMap<String, serde_json::Value>,
    pub completeness: f64,
    /// Billed cast, ordered. Empty if the provider has none or wasn't asked.
    pub cast: Vec<CastMember>,
}

/// One billed cast member as returned by a provider, before insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastMember {
    pub name: String,
    pub role: Option<String>,
    pub order: i32,
    /// Headshot URL, if the provider has one.
    pub thumbnail_url: Option<String>,
}

/// One candidate asset (poster, fanart, trailer, ...) offered by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetCandidate {
    pub asset_type: AssetType,
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub language: Option<String>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<u32>,
    pub quality_hint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConnectionTestResult {
    pub ok: bool,
    pub message: String,
}

/// Uniform contract every metadata backend implements. Call sites never see
/// raw transport errors: implementations translate failures to the typed
/// taxonomy in [`mediarch_common::Error`] before returning.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    async fn search(
        &self,
        query: &str,
        year: Option<u16>,
        entity_kind: MediaType,
        priority: FetchPriority,
    ) -> Result<Vec<SearchResult>>;

    async fn get_metadata(
        &self,
        provider_result_id: &str,
        entity_kind: MediaType,
        priority: FetchPriority,
    ) -> Result<MetadataResponse>;

    async fn get_assets(
        &self,
        provider_result_id: &str,
        entity_kind: MediaType,
        asset_types: &[AssetType],
        priority: FetchPriority,
    ) -> Result<Vec<AssetCandidate>>;

    async fn test_connection(&self) -> ConnectionTestResult;
}
