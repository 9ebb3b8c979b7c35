//! Provider registry (C6).
//!
//! Singleton holding each registered adapter's capabilities by name, plus
//! capability queries used by the fetch orchestrator (C7) to select which
//! providers apply to a given entity. Generalizes the existing
//! `ProviderRegistry` (which only ever dispatched `search_movie`) into
//! capability-indexed lookup across all five adapter operations.

use std::collections::HashMap;
use std::sync::Arc;

use mediarch_common::{AssetType, MediaType};

use super::ProviderAdapter;

pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn ProviderAdapter>>,
    order: Vec<&'static str>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register an adapter. Re-registering a name replaces it in place,
    /// preserving its position so provider-priority presets stay stable
    /// across a config reload.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        let name = adapter.name();
        if !self.providers.contains_key(name) {
            self.order.push(name);
        }
        self.providers.insert(name, adapter);
    }

    /// Explicit invalidation hook for when a provider's config changes
    /// (e.g. API key rotated, disabled) and its instance must be rebuilt.
    pub fn invalidate(&mut self, name: &str) {
        self.providers.remove(name);
        self.order.retain(|n| *n != name);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.providers.get(name).cloned()
    }

    pub fn all(&self) -> Vec<Arc<dyn ProviderAdapter>> {
        self.order.iter().filter_map(|name| self.providers.get(name).cloned()).collect()
    }

    /// Providers whose capabilities cover the given entity kind, in
    /// registration order.
    pub fn supporting_entity(&self, kind: MediaType) -> Vec<Arc<dyn ProviderAdapter>> {
        self.all()
            .into_iter()
            .filter(|p| p.capabilities().entity_kinds.contains(&kind))
            .collect()
    }

    /// Providers that can supply the given asset type for the given entity kind.
    pub fn supporting_asset(&self, kind: MediaType, asset_type: AssetType) -> Vec<Arc<dyn ProviderAdapter>> {
        self.supporting_entity(kind)
            .into_iter()
            .filter(|p| p.capabilities().asset_types.contains(&asset_type))
            .collect()
    }

    /// Providers that expose the given metadata field for the given entity kind.
    pub fn supporting_field(&self, kind: MediaType, field: &str) -> Vec<Arc<dyn ProviderAdapter>> {
        self.supporting_entity(kind)
            .into_iter()
            .filter(|p| p.capabilities().metadata_fields.contains(&field))
            .collect()
    }

    /// Providers that can resolve an entity from the given external-ID key
    /// (e.g. `"imdb"`).
    pub fn supporting_external_id(&self, key: &str) -> Vec<Arc<dyn ProviderAdapter>> {
        self.all()
            .into_iter()
            .filter(|p| p.capabilities().external_id_lookup.contains(&key))
            .collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
