//! Review/analysis cache.
//!
//! [`ReviewStore`] keeps every analyzed product in memory, keyed by
//! [`ProductId`], and writes each change through to an optional
//! [`CacheBackend`] so results survive restarts.
//!
//! Read-compute-write is not atomic: two concurrent requests for the same
//! uncached product both compute, and the last `put` wins. Both results were
//! computed from the same inputs, so either one is acceptable.

pub mod db;
pub mod json_file;

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{AnalysisError, VerdictResult};
use crate::model::{AnalysisResult, Listing, Product, ProductId};

pub use db::PgCacheBackend;
pub use json_file::JsonFileBackend;

/// One cached product and its analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub product: Product,
    pub analysis: AnalysisResult,
    pub computed_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(product: Product, analysis: AnalysisResult) -> Self {
        let computed_at = analysis.computed_at;
        Self {
            product,
            analysis,
            computed_at,
        }
    }

    pub fn listing(&self) -> Listing<'_> {
        Listing {
            product: &self.product,
            analysis: &self.analysis,
        }
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Within the expiry window; serve as is
    Fresh(CacheEntry),
    /// Expired but still usable when the source is down
    Stale(CacheEntry),
    Miss,
}

/// Durable storage behind the in-memory map.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn load_all(&self) -> anyhow::Result<Vec<CacheEntry>>;

    async fn save(&self, entry: &CacheEntry) -> anyhow::Result<()>;

    async fn remove(&self, id: &ProductId) -> anyhow::Result<()>;

    /// Delete entries computed before `cutoff`; returns how many were removed.
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64>;

    fn name(&self) -> &'static str;
}

pub struct ReviewStore {
    entries: RwLock<HashMap<ProductId, CacheEntry>>,
    backend: Option<Arc<dyn CacheBackend>>,
    expiry: Duration,
    stale_max_age: Duration,
}

impl ReviewStore {
    /// Memory-only store.
    pub fn new(settings: &Settings) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            backend: None,
            expiry: settings.cache_expiry(),
            stale_max_age: settings.stale_max_age(),
        }
    }

    /// Store backed by `backend`, preloaded with everything it holds.
    pub async fn with_backend(
        settings: &Settings,
        backend: Arc<dyn CacheBackend>,
    ) -> VerdictResult<Self> {
        let loaded = backend.load_all().await.map_err(AnalysisError::Cache)?;
        info!(backend = backend.name(), entries = loaded.len(), "Loaded review cache");

        let store = Self {
            entries: RwLock::new(
                loaded
                    .into_iter()
                    .map(|e| (e.product.id.clone(), e))
                    .collect(),
            ),
            backend: Some(backend),
            ..Self::new(settings)
        };
        Ok(store)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ProductId, CacheEntry>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ProductId, CacheEntry>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn lookup(&self, id: &ProductId) -> Lookup {
        self.lookup_at(id, Utc::now()).await
    }

    /// Classify the entry for `id` as of `now`. Entries past the stale max
    /// age are evicted here.
    pub async fn lookup_at(&self, id: &ProductId, now: DateTime<Utc>) -> Lookup {
        let entry = match self.read().get(id) {
            Some(entry) => entry.clone(),
            None => return Lookup::Miss,
        };

        let age = now - entry.computed_at;
        if age <= self.expiry {
            debug!(product_id = %id, age_hours = age.num_hours(), "Fresh cache hit");
            Lookup::Fresh(entry)
        } else if age <= self.stale_max_age {
            debug!(product_id = %id, age_days = age.num_days(), "Stale cache entry");
            Lookup::Stale(entry)
        } else {
            info!(product_id = %id, age_days = age.num_days(), "Evicting expired cache entry");
            self.write().remove(id);
            if let Some(backend) = &self.backend {
                if let Err(e) = backend.remove(id).await {
                    warn!(backend = backend.name(), product_id = %id, error = %e, "Cache eviction not persisted");
                }
            }
            Lookup::Miss
        }
    }

    /// Insert or replace, then write through to the backend. A backend
    /// failure is logged and the in-memory entry is kept.
    pub async fn put(&self, entry: CacheEntry) {
        let id = entry.product.id.clone();
        if let Some(backend) = &self.backend {
            if let Err(e) = backend.save(&entry).await {
                warn!(backend = backend.name(), product_id = %id, error = %e, "Cache write-through failed");
            }
        }
        self.write().insert(id, entry);
    }

    /// Every cached entry, stale ones included.
    pub fn snapshot(&self) -> Vec<CacheEntry> {
        self.read().values().cloned().collect()
    }

    /// Entries still within the expiry window at `now`. Only these back
    /// recommendations.
    pub fn fresh_snapshot(&self, now: DateTime<Utc>) -> Vec<CacheEntry> {
        let cutoff = now - self.expiry;
        self.read()
            .values()
            .filter(|e| e.computed_at >= cutoff)
            .cloned()
            .collect()
    }

    /// Drop entries computed before `cutoff`.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> VerdictResult<usize> {
        let removed = {
            let mut entries = self.write();
            let before = entries.len();
            entries.retain(|_, e| e.computed_at >= cutoff);
            before - entries.len()
        };
        if let Some(backend) = &self.backend {
            backend
                .purge_older_than(cutoff)
                .await
                .map_err(AnalysisError::Cache)?;
        }
        Ok(removed)
    }

    /// Drop everything older than the stale max age.
    pub async fn cleanup(&self) -> VerdictResult<usize> {
        let removed = self.purge_older_than(Utc::now() - self.stale_max_age).await?;
        info!(removed, remaining = self.len(), "Cache cleanup finished");
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{
        AnalysisMeta, ProductUrl, Provenance, RecommendationLabel, SentimentDistribution,
    };

    pub(crate) fn entry(asin: &str, computed_at: DateTime<Utc>) -> CacheEntry {
        let url = ProductUrl::parse(&format!("https://www.amazon.in/dp/{}", asin)).unwrap();
        let product = Product::new(&url, "Test phone", "smartphone");
        let analysis = AnalysisResult {
            product_id: product.id.clone(),
            score: 64,
            label: RecommendationLabel::Acceptable,
            pros: vec![("camera".into(), 0.4)],
            cons: vec![],
            aspects: vec![],
            distribution: SentimentDistribution::default(),
            meta: AnalysisMeta {
                confidence: 0.4,
                data_quality: 0.5,
                reviews_used: 6,
                sentences: 9,
                low_confidence: false,
                provenance: Provenance::Live,
                category: "smartphone".into(),
            },
            voice_verdict: String::new(),
            insight: String::new(),
            description: Default::default(),
            computed_at,
        };
        CacheEntry::new(product, analysis)
    }

    #[tokio::test]
    async fn test_fresh_stale_and_evicted() {
        let store = ReviewStore::new(&Settings::default());
        let now = Utc::now();
        let e = entry("B000000001", now - Duration::days(1));
        let id = e.product.id.clone();
        store.put(e.clone()).await;

        assert_eq!(store.lookup_at(&id, now).await, Lookup::Fresh(e.clone()));
        assert_eq!(
            store.lookup_at(&id, now + Duration::days(5)).await,
            Lookup::Stale(e.clone())
        );
        assert_eq!(store.lookup_at(&id, now + Duration::days(60)).await, Lookup::Miss);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_expiry_boundary_is_fresh() {
        let store = ReviewStore::new(&Settings::default());
        let now = Utc::now();
        let e = entry("B000000001", now - Duration::days(3));
        let id = e.product.id.clone();
        store.put(e).await;
        assert!(matches!(store.lookup_at(&id, now).await, Lookup::Fresh(_)));
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = ReviewStore::new(&Settings::default());
        let now = Utc::now();
        let first = entry("B000000001", now);
        let mut second = first.clone();
        second.analysis.score = 80;
        store.put(first).await;
        store.put(second.clone()).await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot()[0].analysis.score, 80);
    }

    #[tokio::test]
    async fn test_fresh_snapshot_skips_expired() {
        let store = ReviewStore::new(&Settings::default());
        let now = Utc::now();
        store.put(entry("B000000001", now - Duration::days(10))).await;
        store.put(entry("B000000002", now - Duration::days(1))).await;

        let fresh = store.fresh_snapshot(now);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].product.id.as_str(), "amazon:B000000002");
        assert_eq!(store.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_purge_older_than() {
        let store = ReviewStore::new(&Settings::default());
        let now = Utc::now();
        store.put(entry("B000000001", now - Duration::days(40))).await;
        store.put(entry("B000000002", now)).await;
        let removed = store.purge_older_than(now - Duration::days(30)).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
    }
}
