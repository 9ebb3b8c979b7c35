//! Enrichment orchestrator (C10).
//!
//! Runs the five-phase per-entity enrichment pipeline: provider fetch,
//! asset selection, actor enrichment, trailer analysis, trailer selection.
//! Phases run strictly in sequence; work within a phase fans out
//! concurrently. Generalizes `PipelineExecutor`'s validate-all-then-execute
//! shape (weighted progress, per-stage cancellation checks) from a flat
//! action list to five named phases.

use std::collections::HashMap;
use std::sync::Arc;

use mediarch_common::{AssetType, MediaType, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::providers::{CastMember, FetchPriority, ProviderRegistry};
use crate::select::{self, Candidate, ProviderPriority, Selection};

/// Progress notification, weighted by the phase's share of overall work
/// (mirrors `PipelineExecutor::report_progress`'s `(f32, &str)` shape).
pub type EnrichProgressCallback = Box<dyn Fn(f32, &str) + Send + Sync>;

const PHASE_WEIGHTS: [f32; 5] = [40.0, 30.0, 15.0, 10.0, 5.0];
const PHASE_NAMES: [&str; 5] = [
    "Provider Fetch",
    "Asset Selection",
    "Actor Enrichment",
    "Trailer Analysis",
    "Trailer Selection",
];

/// One entity's enrichment request: what to fetch and how.
pub struct EnrichmentRequest {
    pub entity_kind: MediaType,
    pub external_ids: HashMap<String, String>,
    pub asset_types: Vec<AssetType>,
    pub preferred_language: String,
    pub priority: FetchPriority,
    pub analyze_trailers: bool,
}

#[derive(Debug, Default)]
pub struct EnrichmentOutcome {
    pub metadata_fields: HashMap<String, serde_json::Value>,
    pub selected_assets: HashMap<AssetType, Selection>,
    /// Cast list chosen for this entity, ready to replace the stored roster.
    pub cast: Vec<CastMember>,
    pub actor_thumbnails_downloaded: usize,
    pub trailer_candidates_analyzed: usize,
    pub trailer_selected: bool,
    pub enriched: bool,
    pub warnings: Vec<String>,
}

pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    provider_priority: ProviderPriority,
}

impl Orchestrator {
    pub fn new(registry: Arc<ProviderRegistry>, provider_priority: ProviderPriority) -> Self {
        Self { registry, provider_priority }
    }

    fn report(&self, cb: Option<&EnrichProgressCallback>, phase_index: usize, detail: &str) {
        let progress: f32 = PHASE_WEIGHTS[..phase_index].iter().sum();
        let message = format!("{}: {}", PHASE_NAMES[phase_index], detail);
        if let Some(cb) = cb {
            cb(progress, &message);
        }
        info!(phase = PHASE_NAMES[phase_index], detail, "enrichment progress");
    }

    /// Run all five phases for one entity. `existing_assets` supplies any
    /// already-selected, possibly-locked assets so a phase-2 failure never
    /// regresses a previously published selection.
    pub async fn enrich(
        &self,
        request: EnrichmentRequest,
        existing_assets: HashMap<AssetType, Candidate>,
        cancel: &CancellationToken,
        progress: Option<EnrichProgressCallback>,
    ) -> Result<EnrichmentOutcome> {
        let mut outcome = EnrichmentOutcome::default();

        // Phase 1: Provider Fetch.
        self.report(progress.as_ref(), 0, "fetching provider metadata and assets");
        let fetch_results = crate::fetch::fetch_entity(
            &self.registry,
            request.entity_kind,
            &request.external_ids,
            &request.asset_types,
            request.priority,
            true,
            true,
            None,
        )
        .await;

        if fetch_results.all_failed() {
            warn!("phase 1 (provider fetch) failed completely, aborting enrichment");
            return Ok(outcome);
        }

        for (_provider, contribution) in &fetch_results.providers {
            if let Some(metadata) = &contribution.metadata {
                for (field, value) in &metadata.fields {
                    outcome.metadata_fields.entry(field.clone()).or_insert_with(|| value.clone());
                }
            }
        }
        for failed in &fetch_results.failed {
            outcome.warnings.push(format!("provider {} failed: {}", failed.provider, failed.error));
        }

        if cancel.is_cancelled() {
            return Ok(outcome);
        }

        // Phase 2: Asset Selection.
        self.report(progress.as_ref(), 1, "selecting best asset per type");
        let mut pool: HashMap<AssetType, Vec<Candidate>> = HashMap::new();
        for asset_type in &request.asset_types {
            let mut candidates: Vec<Candidate> = Vec::new();
            if let Some(existing) = existing_assets.get(asset_type) {
                candidates.push(existing.clone());
            }
            for (provider_name, contribution) in &fetch_results.providers {
                if let Some(assets) = &contribution.assets {
                    for asset in assets.iter().filter(|a| a.asset_type == *asset_type) {
                        candidates.push(Candidate {
                            asset_type: asset.asset_type,
                            provider: provider_name.to_string(),
                            url: asset.url.clone(),
                            width: asset.width,
                            height: asset.height,
                            language: asset.language.clone(),
                            vote_count: asset.vote_count.map(|v| v as f64),
                            quality_hint: asset.quality_hint.clone(),
                            content_hash: None,
                            perceptual: None,
                            is_locked: false,
                        });
                    }
                }
            }
            pool.insert(*asset_type, candidates);
        }

        let trailer_candidate_count = pool.get(&AssetType::Trailer).map(Vec::len).unwrap_or(0);

        for (asset_type, candidates) in pool {
            if candidates.is_empty() {
                continue;
            }
            if let Some(selection) = select::select(candidates, &request.preferred_language, &self.provider_priority) {
                outcome.selected_assets.insert(asset_type, selection);
            }
        }

        if cancel.is_cancelled() {
            return Ok(outcome);
        }

        // Phase 3: Actor Enrichment (non-fatal, best effort). Adopt the
        // billed cast from whichever contributing provider is most complete,
        // breaking ties by provider priority; a provider with no cast data
        // never overrides one that has it.
        self.report(progress.as_ref(), 2, "selecting cast list");
        let mut best: Option<(&str, f64, &Vec<CastMember>)> = None;
        for (provider_name, contribution) in &fetch_results.providers {
            let provider_name: &str = provider_name;
            let Some(metadata) = &contribution.metadata else { continue };
            if metadata.cast.is_empty() {
                continue;
            }
            let replace = match &best {
                None => true,
                Some((best_provider, best_completeness, _)) => {
                    metadata.completeness > *best_completeness
                        || (metadata.completeness == *best_completeness
                            && self.provider_priority.index_of(provider_name) < self.provider_priority.index_of(best_provider))
                }
            };
            if replace {
                best = Some((provider_name, metadata.completeness, &metadata.cast));
            }
        }
        outcome.cast = best.map(|(_, _, cast)| cast.clone()).unwrap_or_default();
        if outcome.cast.is_empty() {
            outcome.warnings.push("no provider returned cast data".to_string());
        }

        if cancel.is_cancelled() {
            return Ok(outcome);
        }

        // Phase 4: Trailer Analysis (feature-gated, non-fatal). Candidates
        // are already gathered in the phase 2 pool; this phase just reports
        // how many were under consideration for the caller's awareness.
        self.report(progress.as_ref(), 3, "analyzing trailer candidates");
        if request.analyze_trailers {
            outcome.trailer_candidates_analyzed = trailer_candidate_count;
        } else {
            outcome.warnings.push("trailer analysis skipped: feature disabled".to_string());
        }

        if cancel.is_cancelled() {
            return Ok(outcome);
        }

        // Phase 5: Trailer Selection (non-fatal). The winner, if any, was
        // already picked by the generalized selector in phase 2.
        self.report(progress.as_ref(), 4, "selecting best trailer");
        outcome.trailer_selected = outcome.selected_assets.contains_key(&AssetType::Trailer);

        outcome.enriched = true;
        Ok(outcome)
    }
}

fn cache_kind_for(asset_type: AssetType) -> crate::cache::CacheKind {
    if asset_type.is_video() {
        crate::cache::CacheKind::Video
    } else {
        crate::cache::CacheKind::Image
    }
}

fn metadata_string<'a>(fields: &'a HashMap<String, serde_json::Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(|v| v.as_str())
}

fn metadata_i64(fields: &HashMap<String, serde_json::Value>, key: &str) -> Option<i64> {
    fields.get(key).and_then(|v| v.as_i64())
}

/// Handles `enrich` jobs: runs the orchestrator for one movie, persists the
/// resulting metadata and selected asset candidates, caches the winning
/// asset bytes, and enqueues the publish job that writes them out.
pub struct EnrichJobHandler {
    pool: mediarch_db::pool::DbPool,
    cache: Arc<crate::cache::ContentCache>,
    orchestrator: Arc<Orchestrator>,
    http: reqwest::Client,
    preferred_language: String,
}

impl EnrichJobHandler {
    pub fn new(
        pool: mediarch_db::pool::DbPool,
        cache: Arc<crate::cache::ContentCache>,
        orchestrator: Arc<Orchestrator>,
        preferred_language: String,
    ) -> Self {
        Self { pool, cache, orchestrator, http: reqwest::Client::new(), preferred_language }
    }

    async fn cache_selection(&self, asset_type: AssetType, selection: &Selection) -> Result<Option<(String, i64)>> {
        let response = match self.http.get(&selection.winner.url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(%asset_type, url = %selection.winner.url, error = %e, "failed to download selected asset");
                return Ok(None);
            }
        };
        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!(%asset_type, error = %e, "failed to read selected asset body");
                return Ok(None);
            }
        };
        let (hash, _path) = self.cache.put(cache_kind_for(asset_type), &bytes)?;
        Ok(Some((hash, bytes.len() as i64)))
    }
}

#[async_trait::async_trait]
impl crate::queue::JobHandler for EnrichJobHandler {
    async fn handle(&self, job: &mediarch_db::models::Job) -> Result<()> {
        use mediarch_db::queries::{actors, asset_candidates, movies};

        let movie_id: mediarch_common::MovieId = job
            .payload
            .get("movie_id")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| mediarch_common::Error::invalid_input("enrich payload missing movie_id"))?;

        let mut conn = mediarch_db::pool::get_conn(&self.pool)?;
        let movie = movies::get(&conn, movie_id)?.ok_or_else(|| mediarch_common::Error::not_found("movie"))?;

        let mut external_ids = HashMap::new();
        if let Some(tmdb_id) = movie.tmdb_id {
            external_ids.insert("tmdb".to_string(), tmdb_id.to_string());
        }
        if let Some(imdb_id) = &movie.imdb_id {
            external_ids.insert("imdb".to_string(), imdb_id.clone());
        }
        if external_ids.is_empty() {
            return Err(mediarch_common::Error::invalid_input("movie has no external ids to enrich from"));
        }

        let mut existing_assets = HashMap::new();
        for asset_type in mediarch_common::AssetType::ALL {
            if let Some(selected) = asset_candidates::get_selected(&conn, movie_id, asset_type)? {
                existing_assets.insert(
                    asset_type,
                    Candidate {
                        asset_type,
                        provider: selected.provider.clone(),
                        url: selected.source_url.clone(),
                        width: selected.width.map(|w| w as u32),
                        height: selected.height.map(|h| h as u32),
                        language: selected.language,
                        vote_count: selected.votes,
                        quality_hint: selected.quality_hint,
                        content_hash: selected.content_hash,
                        perceptual: None,
                        is_locked: false,
                    },
                );
            }
        }

        let request = EnrichmentRequest {
            entity_kind: MediaType::Movie,
            external_ids,
            asset_types: mediarch_common::AssetType::ALL.to_vec(),
            preferred_language: self.preferred_language.clone(),
            priority: crate::providers::FetchPriority::Background,
            analyze_trailers: false,
        };

        let cancel = CancellationToken::new();
        let mut outcome = self.orchestrator.enrich(request, existing_assets, &cancel, None).await?;

        movies::update_metadata(
            &conn,
            movie_id,
            metadata_string(&outcome.metadata_fields, "title"),
            metadata_string(&outcome.metadata_fields, "plot"),
            metadata_string(&outcome.metadata_fields, "tagline"),
            metadata_i64(&outcome.metadata_fields, "runtime_minutes").map(|v| v as i32),
            metadata_string(&outcome.metadata_fields, "release_date"),
        )?;

        for (asset_type, selection) in &outcome.selected_assets {
            let candidate_id = asset_candidates::insert(
                &conn,
                movie_id,
                &asset_candidates::NewCandidate {
                    asset_type: *asset_type,
                    provider: &selection.winner.provider,
                    source_url: &selection.winner.url,
                    width: selection.winner.width.map(|w| w as i32),
                    height: selection.winner.height.map(|h| h as i32),
                    language: selection.winner.language.as_deref(),
                    votes: selection.winner.vote_count,
                    quality_hint: selection.winner.quality_hint.as_deref(),
                },
            )?;

            if let Some((hash, byte_size)) = self.cache_selection(*asset_type, selection).await? {
                asset_candidates::set_analysis(&conn, candidate_id, &hash, None, None)?;
                if asset_type.is_video() {
                    mediarch_db::queries::cache::put_video(&conn, &hash, "", byte_size, None)?;
                } else {
                    mediarch_db::queries::cache::put_image(&conn, &hash, "", byte_size, selection.winner.width.map(|w| w as i32), selection.winner.height.map(|h| h as i32), None, None)?;
                }
            }

            asset_candidates::select(&mut conn, movie_id, *asset_type, candidate_id, selection.display_score, &selection.reason)?;
        }

        if !outcome.cast.is_empty() {
            let new_actors: Vec<actors::NewActor> = outcome
                .cast
                .iter()
                .map(|member| actors::NewActor {
                    name: &member.name,
                    role: member.role.as_deref(),
                    order_index: member.order,
                })
                .collect();
            let inserted = actors::replace_cast(&mut conn, movie_id, &new_actors)?;

            let mut downloaded = 0usize;
            for (actor, member) in inserted.iter().zip(outcome.cast.iter()) {
                let Some(url) = &member.thumbnail_url else { continue };
                let response = match self.http.get(url).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(actor = %actor.name, error = %e, "failed to download actor thumbnail");
                        continue;
                    }
                };
                let bytes = match response.bytes().await {
                    Ok(b) => b,
                    Err(e) => {
                        warn!(actor = %actor.name, error = %e, "failed to read actor thumbnail body");
                        continue;
                    }
                };
                let (hash, _path) = self.cache.put(crate::cache::CacheKind::Image, &bytes)?;
                actors::set_thumb_hash(&conn, actor.id, &hash)?;
                downloaded += 1;
            }
            outcome.actor_thumbnails_downloaded = downloaded;
        }

        if outcome.enriched {
            movies::mark_enriched(&conn, movie_id)?;
            crate::queue::enqueue(
                &self.pool,
                mediarch_common::JobKind::Publish,
                mediarch_common::JobPriority::BACKGROUND,
                serde_json::json!({ "movie_id": movie_id }),
                false,
                Some(&format!("publish:{movie_id}")),
            )?;
        }

        for warning in &outcome.warnings {
            warn!(%movie_id, warning, "enrichment warning");
        }

        Ok(())
    }
}
