//! Persistent embedding cache
//!
//! Embeddings are keyed by the embedding dimension and the blake3 hash of the image
//! bytes, so the same photo uploaded twice only reaches the embedding service once.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use fjall::Keyspace;
use rand::RngExt;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt::Debug;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task;
use tracing::{debug, warn};

use crate::embedding::ImageEmbedder;

#[derive(Serialize, Deserialize)]
struct StoredEntry<T> {
    value: T,
    expires_at: u64, // Unix timestamp (seconds)
}

pub struct EmbeddingCache {
    store: Keyspace,
    ttl: Duration,
}

fn get_from_store(store: Keyspace, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
    Ok(store.get(key)?.map(|v| v.to_vec()))
}

impl EmbeddingCache {
    pub fn open(path: impl AsRef<Path>, ttl: Duration) -> Result<Self> {
        let db = fjall::Database::builder(&path).open()?;
        let items = db.keyspace("embeddings", fjall::KeyspaceCreateOptions::default)?;
        Ok(EmbeddingCache { store: items, ttl })
    }

    /// Cache key for an image embedded into `dimension` components
    #[must_use]
    pub fn key_for(image: &[u8], dimension: usize) -> String {
        format!("embedding:{dimension}:{}", blake3::hash(image).to_hex())
    }

    /// Stores a serializable value, expiring after the configured TTL with some jitter
    #[tracing::instrument(name = "put_cache", level = "debug", skip(self, value))]
    pub async fn put<T: Serialize + Send + Debug + 'static>(
        &self,
        key: &str,
        value: T,
    ) -> Result<()> {
        let store = self.store.clone();
        let key = key.as_bytes().to_vec();
        let jitter: f32 = rand::rng().random_range(0.9..1.1);
        let ttl = self.ttl.mul_f32(jitter);
        // Calculate expiry time
        let expires_at = SystemTime::now()
            .checked_add(ttl)
            .ok_or(anyhow!("TTL overflow"))?
            .duration_since(UNIX_EPOCH)?
            .as_secs();
        let entry = StoredEntry { value, expires_at };
        let bytes = postcard::to_stdvec(&entry)?;

        task::spawn_blocking(move || store.insert(key, bytes)).await??;
        Ok(())
    }

    /// Retrieves a value if it exists and has not expired.
    /// Returns `None` for cache misses or expired entries.
    #[tracing::instrument(name = "query_cache", level = "debug", skip(self))]
    pub async fn get<T: DeserializeOwned + Send + 'static>(&self, key: &str) -> Result<Option<T>> {
        let store = self.store.clone();
        let key_bytes = key.as_bytes().to_vec();

        let maybe_bytes: Option<Vec<u8>> =
            task::spawn_blocking(move || get_from_store(store, key_bytes)).await??;

        if let Some(bytes) = maybe_bytes {
            let entry: StoredEntry<T> = postcard::from_bytes(&bytes)?;
            let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

            if now < entry.expires_at {
                debug!("Key found and still fresh");
                Ok(Some(entry.value))
            } else {
                debug!("Key found but expired");
                self.remove(key).await?;
                Ok(None)
            }
        } else {
            debug!("Key not found");
            Ok(None)
        }
    }

    /// Manually removes a key from the cache.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let key = key.as_bytes().to_vec();
        let store = self.store.clone();
        task::spawn_blocking(move || store.remove(key)).await??;
        Ok(())
    }
}

/// Embedder that consults an [`EmbeddingCache`] before delegating.
/// Cache failures are logged and never stop the inner embedder from running.
/// Vectors that are not `dimension` long are neither served nor stored.
pub struct CachedEmbedder<E> {
    inner: E,
    cache: EmbeddingCache,
    dimension: usize,
}

impl<E: ImageEmbedder> CachedEmbedder<E> {
    pub fn new(inner: E, cache: EmbeddingCache, dimension: usize) -> Self {
        Self {
            inner,
            cache,
            dimension,
        }
    }

    async fn cached(&self, key: &str) -> Option<Vec<f32>> {
        match self.cache.get::<Vec<f32>>(key).await {
            Ok(Some(embedding)) if embedding.len() == self.dimension => Some(embedding),
            Ok(Some(embedding)) => {
                debug!(
                    "Dropping cached embedding with {} dimensions, expected {}",
                    embedding.len(),
                    self.dimension
                );
                if let Err(e) = self.cache.remove(key).await {
                    warn!("Failed to drop stale embedding: {}", e);
                }
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Embedding cache lookup failed: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl<E: ImageEmbedder> ImageEmbedder for CachedEmbedder<E> {
    async fn embed(&self, image: &[u8]) -> Option<Vec<f32>> {
        let key = EmbeddingCache::key_for(image, self.dimension);

        if let Some(embedding) = self.cached(&key).await {
            return Some(embedding);
        }

        let embedding = self.inner.embed(image).await?;
        if embedding.len() != self.dimension {
            warn!(
                "Embedder returned {} dimensions, expected {}",
                embedding.len(),
                self.dimension
            );
            return None;
        }

        if let Err(e) = self.cache.put(&key, embedding.clone()).await {
            warn!("Failed to cache embedding: {}", e);
        }
        Some(embedding)
    }
}
