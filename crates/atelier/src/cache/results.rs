//! The three per-collection resources behind the results view.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use super::SwrCache;
use crate::api::ResultsBackend;
use crate::catalog::CollectionId;
use crate::config::CacheConfig;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Collection,
    ModelStats,
    History,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Collection,
        ResourceKind::ModelStats,
        ResourceKind::History,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Collection => "collection",
            ResourceKind::ModelStats => "model_stats",
            ResourceKind::History => "history",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: ResourceKind,
    pub collection_id: CollectionId,
}

impl CacheKey {
    pub fn new(kind: ResourceKind, collection_id: &CollectionId) -> Self {
        Self {
            kind,
            collection_id: collection_id.clone(),
        }
    }
}

/// Whatever the view can paint right now. `None` means never fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultsSnapshot {
    pub collection: Option<Value>,
    pub model_stats: Option<Value>,
    pub history: Option<Value>,
}

impl ResultsSnapshot {
    pub fn is_empty(&self) -> bool {
        self.collection.is_none() && self.model_stats.is_none() && self.history.is_none()
    }
}

pub struct ResultsCache {
    backend: Arc<dyn ResultsBackend>,
    cache: SwrCache<CacheKey, Value, ApiError>,
    ttls: CacheConfig,
}

impl ResultsCache {
    pub fn new(backend: Arc<dyn ResultsBackend>, ttls: CacheConfig) -> Self {
        Self {
            backend,
            cache: SwrCache::new(),
            ttls,
        }
    }

    fn ttl_for(&self, kind: ResourceKind) -> Duration {
        match kind {
            ResourceKind::Collection => self.ttls.collection_ttl(),
            ResourceKind::ModelStats => self.ttls.model_stats_ttl(),
            ResourceKind::History => self.ttls.history_ttl(),
        }
    }

    /// Synchronous read of the last known values.
    pub fn paint(&self, collection: &CollectionId) -> ResultsSnapshot {
        let get = |kind| self.cache.get(&CacheKey::new(kind, collection));
        ResultsSnapshot {
            collection: get(ResourceKind::Collection),
            model_stats: get(ResourceKind::ModelStats),
            history: get(ResourceKind::History),
        }
    }

    /// Revalidates all three resources concurrently and returns the result.
    /// A resource whose fetch fails keeps its last known value.
    pub async fn refresh(&self, collection: &CollectionId) -> ResultsSnapshot {
        let (collection_value, model_stats, history) = tokio::join!(
            self.refresh_one(ResourceKind::Collection, collection),
            self.refresh_one(ResourceKind::ModelStats, collection),
            self.refresh_one(ResourceKind::History, collection),
        );
        ResultsSnapshot {
            collection: collection_value,
            model_stats,
            history,
        }
    }

    async fn refresh_one(&self, kind: ResourceKind, collection: &CollectionId) -> Option<Value> {
        let key = CacheKey::new(kind, collection);
        let backend = Arc::clone(&self.backend);
        let fetch = || async move {
            match kind {
                ResourceKind::Collection => backend.fetch_collection(collection).await,
                ResourceKind::ModelStats => backend.fetch_model_stats(collection).await,
                ResourceKind::History => backend.fetch_history(collection).await,
            }
        };

        match self
            .cache
            .get_or_fetch(key.clone(), fetch, self.ttl_for(kind))
            .await
        {
            Ok(value) => Some(value),
            Err(e) => {
                log_refresh_failure(kind, collection, &e);
                self.cache.get(&key)
            }
        }
    }

    /// Marks all three resources of a collection stale.
    pub fn invalidate(&self, collection: &CollectionId) -> usize {
        let count = self
            .cache
            .invalidate_where(|key| &key.collection_id == collection);
        log::debug!("Invalidated {} cached resources for {}", count, collection);
        count
    }
}

fn log_refresh_failure(kind: ResourceKind, collection: &CollectionId, error: &ApiError) {
    log::warn!(
        "Failed to refresh {} for collection {}: {}",
        kind.as_str(),
        collection,
        error
    );
}
