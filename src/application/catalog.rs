//! Read-through catalog cache.
//!
//! The whole catalog is read in full on every public page and feed request, so it is cached
//! as one serialized, newest-first list under a fixed key. Writes that change the episode
//! set call [`CatalogService::invalidate`] before responding.
//!
//! Cache failures never fail a read: a broken backend degrades to scanning the store.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::repos::{EpisodesRepo, RepoError};
use crate::cache::{CATALOG_CACHE_KEY, CacheBackend, CacheError};
use crate::domain::entities::EpisodeRecord;
use crate::domain::types::EpisodeOrder;

const SOURCE: &str = "application::catalog";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct CatalogService {
    episodes: Arc<dyn EpisodesRepo>,
    cache: Option<Arc<dyn CacheBackend>>,
    ttl: Duration,
}

impl CatalogService {
    pub fn new(
        episodes: Arc<dyn EpisodesRepo>,
        cache: Option<Arc<dyn CacheBackend>>,
        ttl: Duration,
    ) -> Self {
        Self {
            episodes,
            cache,
            ttl,
        }
    }

    /// Full catalog, newest `episode_date` first.
    pub async fn episodes(&self) -> Result<Vec<EpisodeRecord>, CatalogError> {
        let Some(cache) = &self.cache else {
            return self.scan().await;
        };

        if let Some(cached) = self.lookup(cache.as_ref()).await {
            counter!("gopherpods_catalog_cache_hit_total").increment(1);
            return Ok(cached);
        }
        counter!("gopherpods_catalog_cache_miss_total").increment(1);

        let episodes = self.scan().await?;
        if let Err(err) = self.fill(cache.as_ref(), &episodes).await {
            counter!("gopherpods_catalog_cache_fill_error_total").increment(1);
            warn!(target = SOURCE, error = %err, "failed to populate catalog cache");
        }
        Ok(episodes)
    }

    /// Catalog re-ordered for display.
    pub async fn ordered(&self, order: EpisodeOrder) -> Result<Vec<EpisodeRecord>, CatalogError> {
        let mut episodes = self.episodes().await?;
        order.apply(&mut episodes);
        Ok(episodes)
    }

    /// Drop the cached catalog. Failures are logged; the entry then lives until its TTL.
    pub async fn invalidate(&self) {
        let Some(cache) = &self.cache else {
            return;
        };

        match cache.delete(CATALOG_CACHE_KEY).await {
            Ok(()) => debug!(target = SOURCE, "catalog cache invalidated"),
            Err(err) => {
                counter!("gopherpods_catalog_cache_invalidate_error_total").increment(1);
                warn!(target = SOURCE, error = %err, "failed to invalidate catalog cache");
            }
        }
    }

    async fn scan(&self) -> Result<Vec<EpisodeRecord>, CatalogError> {
        self.episodes
            .list_episodes()
            .await
            .map_err(CatalogError::from)
    }

    async fn lookup(&self, cache: &dyn CacheBackend) -> Option<Vec<EpisodeRecord>> {
        let bytes = match cache.get(CATALOG_CACHE_KEY).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                warn!(target = SOURCE, error = %err, "catalog cache lookup failed");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(episodes) => Some(episodes),
            Err(err) => {
                warn!(
                    target = SOURCE,
                    error = %CacheError::Decode(err.to_string()),
                    "discarding undecodable catalog cache entry"
                );
                None
            }
        }
    }

    async fn fill(
        &self,
        cache: &dyn CacheBackend,
        episodes: &[EpisodeRecord],
    ) -> Result<(), CacheError> {
        let encoded =
            serde_json::to_vec(episodes).map_err(|err| CacheError::Encode(err.to_string()))?;
        cache
            .set(CATALOG_CACHE_KEY, Bytes::from(encoded), self.ttl)
            .await
    }
}
