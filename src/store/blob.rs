//! Content-addressed blob storage: hash-indexed bytes with reference
//! counting and deduplication, backing every regular file's content.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::config::KernelConfig;

/// A lowercase-hex content hash, the blob store's primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobHash(pub String);

impl BlobHash {
    pub fn of(bytes: &[u8]) -> Self {
        BlobHash(blake3::hash(bytes).to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlobHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Storage tier a blob is classified into based on size, for callers that
/// want to make placement decisions (the in-memory store keeps everything
/// resident regardless of tier).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobTier {
    Hot,
    Warm,
    Cold,
}

impl BlobTier {
    pub fn classify(size: u64, cfg: &KernelConfig) -> BlobTier {
        if size >= cfg.cold_tier_bytes {
            BlobTier::Cold
        } else if size >= cfg.warm_tier_bytes {
            BlobTier::Warm
        } else {
            BlobTier::Hot
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BlobInfo {
    pub size: u64,
    pub tier: BlobTier,
    pub refcount: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DedupStats {
    pub unique_blobs: u64,
    pub total_physical_bytes: u64,
    pub total_logical_bytes: u64,
    pub saved_bytes: u64,
}

/// Content-hash-indexed byte storage with reference counting. `write`
/// dedups on content; callers are responsible for calling `incref`/`decref`
/// to reflect how many entries point at a hash (the kernel does this on
/// create/overwrite/unlink/link).
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn write(&self, bytes: Vec<u8>) -> BlobHash;
    async fn get(&self, hash: &BlobHash) -> Option<Vec<u8>>;
    async fn info(&self, hash: &BlobHash) -> Option<BlobInfo>;
    async fn incref(&self, hash: &BlobHash);
    /// Decrement the refcount, collecting the blob if it reaches zero.
    /// Returns the refcount after the decrement, or `None` if the hash was
    /// unknown.
    async fn decref(&self, hash: &BlobHash) -> Option<u32>;
    async fn dedup_stats(&self) -> DedupStats;
}

struct StoredBlob {
    bytes: Vec<u8>,
    refcount: u32,
    tier: BlobTier,
}

/// An in-memory, `dashmap`-backed [`BlobStore`].
pub struct InMemoryBlobStore {
    blobs: DashMap<BlobHash, StoredBlob>,
    logical_refs: AtomicU64,
    config: KernelConfig,
}

impl InMemoryBlobStore {
    pub fn new(config: KernelConfig) -> Self {
        InMemoryBlobStore { blobs: DashMap::new(), logical_refs: AtomicU64::new(0), config }
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn write(&self, bytes: Vec<u8>) -> BlobHash {
        let hash = BlobHash::of(&bytes);
        if !self.blobs.contains_key(&hash) {
            let tier = BlobTier::classify(bytes.len() as u64, &self.config);
            tracing::debug!(hash = %hash, size = bytes.len(), ?tier, "blob stored");
            self.blobs.insert(hash.clone(), StoredBlob { bytes, refcount: 0, tier });
        }
        hash
    }

    async fn get(&self, hash: &BlobHash) -> Option<Vec<u8>> {
        self.blobs.get(hash).map(|b| b.bytes.clone())
    }

    async fn info(&self, hash: &BlobHash) -> Option<BlobInfo> {
        self.blobs.get(hash).map(|b| BlobInfo { size: b.bytes.len() as u64, tier: b.tier, refcount: b.refcount })
    }

    async fn incref(&self, hash: &BlobHash) {
        if let Some(mut b) = self.blobs.get_mut(hash) {
            b.refcount += 1;
            self.logical_refs.fetch_add(1, Ordering::Relaxed);
        }
    }

    async fn decref(&self, hash: &BlobHash) -> Option<u32> {
        let after = {
            let mut entry = self.blobs.get_mut(hash)?;
            entry.refcount = entry.refcount.saturating_sub(1);
            entry.refcount
        };
        self.logical_refs.fetch_sub(1, Ordering::Relaxed);
        if after == 0 {
            tracing::debug!(hash = %hash, "blob garbage collected");
            self.blobs.remove(hash);
        }
        Some(after)
    }

    async fn dedup_stats(&self) -> DedupStats {
        let mut stats = DedupStats::default();
        for entry in self.blobs.iter() {
            let size = entry.bytes.len() as u64;
            stats.unique_blobs += 1;
            stats.total_physical_bytes += size;
            stats.total_logical_bytes += size * entry.refcount.max(1) as u64;
            if entry.refcount > 1 {
                stats.saved_bytes += size * (entry.refcount as u64 - 1);
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_content_dedupes_to_one_blob() {
        let store = InMemoryBlobStore::default();
        let h1 = store.write(b"hello".to_vec()).await;
        let h2 = store.write(b"hello".to_vec()).await;
        assert_eq!(h1, h2);
        store.incref(&h1).await;
        store.incref(&h2).await;
        let info = store.info(&h1).await.unwrap();
        assert_eq!(info.refcount, 2);
    }

    #[tokio::test]
    async fn decref_to_zero_collects_the_blob() {
        let store = InMemoryBlobStore::default();
        let hash = store.write(b"data".to_vec()).await;
        store.incref(&hash).await;
        assert_eq!(store.decref(&hash).await, Some(0));
        assert!(store.get(&hash).await.is_none());
    }

    #[tokio::test]
    async fn dedup_stats_reports_saved_bytes() {
        let store = InMemoryBlobStore::default();
        let hash = store.write(vec![0u8; 100]).await;
        store.incref(&hash).await;
        store.incref(&hash).await;
        store.incref(&hash).await;
        let stats = store.dedup_stats().await;
        assert_eq!(stats.unique_blobs, 1);
        assert_eq!(stats.total_physical_bytes, 100);
        assert_eq!(stats.saved_bytes, 200);
    }

    #[tokio::test]
    async fn tiering_follows_configured_thresholds() {
        let mut cfg = KernelConfig::default();
        cfg.warm_tier_bytes = 10;
        cfg.cold_tier_bytes = 100;
        let store = InMemoryBlobStore::new(cfg);
        let small = store.write(vec![0u8; 5]).await;
        let warm = store.write(vec![1u8; 50]).await;
        let cold = store.write(vec![2u8; 200]).await;
        assert!(matches!(store.info(&small).await.unwrap().tier, BlobTier::Hot));
        assert!(matches!(store.info(&warm).await.unwrap().tier, BlobTier::Warm));
        assert!(matches!(store.info(&cold).await.unwrap().tier, BlobTier::Cold));
    }
}
