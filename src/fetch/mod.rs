//! Fetch orchestrator (C7).
//!
//! Given an entity and a priority class, fans out concurrently across every
//! enabled provider whose capabilities cover the entity kind, generalizing
//! `ProviderRegistry::search_movie`'s sequential-then-merge loop into a
//! per-provider `tokio::task` fan-out raced against a timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mediarch_common::{AssetType, MediaType};
use tracing::warn;

use crate::providers::{AssetCandidate, FetchPriority, MetadataResponse, ProviderAdapter, ProviderRegistry};

/// Progress notification emitted at the provider-call boundary, mirroring
/// the existing `ScanProgress`-style `Box<dyn Fn(_) + Send + Sync>` callback
/// shape used for scan progress.
#[derive(Debug, Clone)]
pub enum FetchEvent {
    Start { provider: &'static str },
    Complete { provider: &'static str },
    Failed { provider: &'static str, retryable: bool },
    Timeout { provider: &'static str },
}

pub type FetchProgressCallback = Box<dyn Fn(FetchEvent) + Send + Sync>;

/// What one provider contributed, if anything.
#[derive(Debug, Clone, Default)]
pub struct ProviderContribution {
    pub metadata: Option<MetadataResponse>,
    pub assets: Option<Vec<AssetCandidate>>,
}

#[derive(Debug, Clone)]
pub struct FailedProvider {
    pub provider: &'static str,
    pub error: String,
    pub retryable: bool,
}

/// Aggregated outcome of fanning a fetch out across every applicable provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderResults {
    pub providers: HashMap<&'static str, ProviderContribution>,
    pub completed: Vec<&'static str>,
    pub failed: Vec<FailedProvider>,
    pub timed_out: Vec<&'static str>,
}

impl ProviderResults {
    /// True iff no provider produced any data at all.
    pub fn all_failed(&self) -> bool {
        self.completed.is_empty()
    }
}

/// Resolve the provider-specific result ID for an entity from its known
/// external IDs, trying the provider's native key first, then its declared
/// lookup list in order.
fn resolve_provider_id(provider: &dyn ProviderAdapter, external_ids: &HashMap<String, String>) -> Option<String> {
    if let Some(id) = external_ids.get(provider.name()) {
        return Some(id.clone());
    }
    provider
        .capabilities()
        .external_id_lookup
        .iter()
        .find_map(|key| external_ids.get(*key).cloned())
}

/// Fetch metadata and/or assets for one entity across every registered
/// provider supporting `entity_kind`. `want_metadata`/`want_assets` gate
/// which calls are made; within a provider, metadata precedes assets so a
/// provider that has no metadata for this entity never wastes an asset call.
pub async fn fetch_entity(
    registry: &ProviderRegistry,
    entity_kind: MediaType,
    external_ids: &HashMap<String, String>,
    asset_types: &[AssetType],
    priority: FetchPriority,
    want_metadata: bool,
    want_assets: bool,
    progress: Option<Arc<FetchProgressCallback>>,
) -> ProviderResults {
    let providers = registry.supporting_entity(entity_kind);
    let mut tasks = Vec::with_capacity(providers.len());

    for provider in providers {
        let provider_id = match resolve_provider_id(provider.as_ref(), external_ids) {
            Some(id) => id,
            None => continue,
        };

        let asset_types = asset_types.to_vec();
        let progress = progress.clone();
        let timeout = priority.timeout();

        tasks.push(tokio::spawn(async move {
            let name = provider.name();
            if let Some(cb) = &progress {
                cb(FetchEvent::Start { provider: name });
            }

            let call = async {
                let metadata = if want_metadata {
                    Some(provider.get_metadata(&provider_id, entity_kind, priority).await)
                } else {
                    None
                };

                if let Some(Err(_)) = &metadata {
                    return (metadata, None);
                }

                let assets = if want_assets {
                    Some(provider.get_assets(&provider_id, entity_kind, &asset_types, priority).await)
                } else {
                    None
                };

                (metadata, assets)
            };

            match tokio::time::timeout(timeout, call).await {
                Ok((metadata, assets)) => (name, Ok((metadata, assets))),
                Err(_) => {
                    warn!(provider = name, "provider call timed out");
                    (name, Err(()))
                }
            }
        }));
    }

    let mut results = ProviderResults::default();

    for task in tasks {
        let (name, outcome) = match task.await {
            Ok(v) => v,
            Err(_) => continue,
        };

        match outcome {
            Err(()) => {
                results.timed_out.push(name);
                if let Some(cb) = &progress {
                    cb(FetchEvent::Timeout { provider: name });
                }
            }
            Ok((metadata, assets)) => {
                let metadata_err = metadata.as_ref().and_then(|m| m.as_ref().err());
                if let Some(err) = metadata_err {
                    results.failed.push(FailedProvider {
                        provider: name,
                        error: err.to_string(),
                        retryable: err.is_retryable(),
                    });
                    if let Some(cb) = &progress {
                        cb(FetchEvent::Failed { provider: name, retryable: err.is_retryable() });
                    }
                    continue;
                }

                let metadata_ok = metadata.and_then(|m| m.ok());
                let assets_ok = match assets {
                    Some(Ok(a)) => Some(a),
                    Some(Err(err)) => {
                        results.failed.push(FailedProvider {
                            provider: name,
                            error: err.to_string(),
                            retryable: err.is_retryable(),
                        });
                        None
                    }
                    None => None,
                };

                if metadata_ok.is_some() || assets_ok.is_some() {
                    results.completed.push(name);
                    if let Some(cb) = &progress {
                        cb(FetchEvent::Complete { provider: name });
                    }
                }

                results.providers.insert(
                    name,
                    ProviderContribution {
                        metadata: metadata_ok,
                        assets: assets_ok,
                    },
                );
            }
        }
    }

    results
}
