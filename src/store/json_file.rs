//! Cache snapshot kept in a single JSON file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use super::{CacheBackend, CacheEntry};
use crate::model::ProductId;

/// Serializes every entry as one JSON array. Writes go to a temporary file
/// that is renamed over the snapshot, so a crash never leaves half a file.
pub struct JsonFileBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> anyhow::Result<Vec<CacheEntry>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("corrupt cache file {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }

    async fn write_entries(&self, entries: &[CacheEntry]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), entries = entries.len(), "Cache snapshot written");
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for JsonFileBackend {
    async fn load_all(&self) -> anyhow::Result<Vec<CacheEntry>> {
        let _guard = self.lock.lock().await;
        self.read_entries().await
    }

    async fn save(&self, entry: &CacheEntry) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        match entries.iter_mut().find(|e| e.product.id == entry.product.id) {
            Some(existing) => *existing = entry.clone(),
            None => entries.push(entry.clone()),
        }
        self.write_entries(&entries).await
    }

    async fn remove(&self, id: &ProductId) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        let before = entries.len();
        entries.retain(|e| &e.product.id != id);
        if entries.len() != before {
            self.write_entries(&entries).await?;
        }
        Ok(())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        let before = entries.len();
        entries.retain(|e| e.computed_at >= cutoff);
        let removed = before - entries.len();
        if removed > 0 {
            self.write_entries(&entries).await?;
        }
        Ok(removed as u64)
    }

    fn name(&self) -> &'static str {
        "json_file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::store::tests::entry;
    use crate::store::{Lookup, ReviewStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let settings = Settings::default();
        let e = entry("B000000001", Utc::now());
        let id = e.product.id.clone();

        let store = ReviewStore::with_backend(&settings, Arc::new(JsonFileBackend::new(&path)))
            .await
            .unwrap();
        store.put(e.clone()).await;
        drop(store);

        let reloaded = ReviewStore::with_backend(&settings, Arc::new(JsonFileBackend::new(&path)))
            .await
            .unwrap();
        assert_eq!(reloaded.lookup(&id).await, Lookup::Fresh(e));
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("nested").join("cache.json"));
        assert!(backend.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purge_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("cache.json"));
        let now = Utc::now();
        backend.save(&entry("B000000001", now - chrono::Duration::days(45))).await.unwrap();
        backend.save(&entry("B000000002", now)).await.unwrap();

        let removed = backend.purge_older_than(now - chrono::Duration::days(30)).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(backend.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        assert!(JsonFileBackend::new(&path).load_all().await.is_err());
    }
}
