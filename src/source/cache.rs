//! Output artifact cache
//!
//! Every artifact a tool produces is kept here under a UUID key so a later
//! call can chain on it (`{"cache_key": ...}`) without touching the disk.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// A cached tool output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

struct CacheInner {
    lru: LruCache<String, CachedArtifact>,
    total_bytes: usize,
}

/// LRU cache with an entry count and a byte budget
pub struct ArtifactCache {
    inner: Mutex<CacheInner>,
    max_bytes: usize,
}

impl ArtifactCache {
    pub fn new(capacity: usize, max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                lru: LruCache::new(capacity),
                total_bytes: 0,
            }),
            max_bytes,
        }
    }

    /// Store an artifact under a fresh key.
    ///
    /// Returns `None` when the artifact alone is larger than the byte budget.
    /// Least recently used entries are evicted until the new one fits.
    pub fn insert(&self, artifact: CachedArtifact) -> Option<String> {
        let size = artifact.data.len();
        if size > self.max_bytes {
            tracing::debug!(
                file_name = %artifact.file_name,
                size,
                "artifact exceeds cache budget"
            );
            return None;
        }

        let mut inner = self.inner.lock();

        while inner.total_bytes + size > self.max_bytes {
            match inner.lru.pop_lru() {
                Some((_, evicted)) => {
                    inner.total_bytes = inner.total_bytes.saturating_sub(evicted.data.len());
                }
                None => break,
            }
        }

        let key = loop {
            let candidate = uuid::Uuid::new_v4().to_string();
            if !inner.lru.contains(&candidate) {
                break candidate;
            }
        };

        if let Some((_, evicted)) = inner.lru.push(key.clone(), artifact) {
            inner.total_bytes = inner.total_bytes.saturating_sub(evicted.data.len());
        }
        inner.total_bytes += size;

        Some(key)
    }

    pub fn get(&self, key: &str) -> Option<CachedArtifact> {
        self.inner.lock().lru.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().lru.contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    /// Bytes of artifact data currently held
    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }
}
