//! The abstract metadata store the operation kernel is bound to, plus a
//! `dashmap`-backed in-memory implementation suitable for tests and
//! single-process embedding.

pub mod blob;

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::entry::Entry;

/// Path-addressed storage for [`Entry`] records. Implementations need not be
/// transactional across operations, but MUST make each individual method
/// call atomic with respect to concurrent callers.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get(&self, path: &str) -> Option<Entry>;

    async fn has(&self, path: &str) -> bool {
        self.get(path).await.is_some()
    }

    /// Insert or overwrite the entry at `entry.path`.
    async fn insert(&self, entry: Entry);

    /// Remove and return the entry at `path`, if any.
    async fn remove(&self, path: &str) -> Option<Entry>;

    /// Direct children of the directory at `path` (no `.`/`..`), unordered.
    async fn children(&self, path: &str) -> Vec<Entry>;

    /// Allocate a fresh entry id, unique for the lifetime of the store.
    async fn next_id(&self) -> u64;

    async fn current_uid(&self) -> u32;
    async fn current_gid(&self) -> u32;
    async fn current_groups(&self) -> Vec<u32>;
    async fn is_root(&self) -> bool {
        self.current_uid().await == 0
    }
}

/// The identity the store reports operations as running under. Tests and
/// embedders construct this directly; there is no ambient process identity
/// to fall back on since the kernel never touches a host filesystem.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub uid: u32,
    pub gid: u32,
    pub groups: Vec<u32>,
}

impl Default for UserContext {
    fn default() -> Self {
        UserContext { uid: 0, gid: 0, groups: Vec::new() }
    }
}

/// An in-memory metadata store keyed by normalized absolute path.
pub struct InMemoryMetadataStore {
    entries: DashMap<String, Entry>,
    next_id: AtomicU64,
    user: UserContext,
}

impl InMemoryMetadataStore {
    /// Construct a store pre-seeded with a root directory, running under
    /// `user`.
    pub fn new(user: UserContext) -> Self {
        let store = InMemoryMetadataStore {
            entries: DashMap::new(),
            next_id: AtomicU64::new(1),
            user,
        };
        let root = Entry {
            id: 0,
            path: "/".to_string(),
            kind: crate::mode::Kind::Directory,
            mode: crate::mode::S_IFDIR | crate::mode::DEFAULT_DIR_MODE,
            uid: store.user.uid,
            gid: store.user.gid,
            size: 0,
            blob_ref: None,
            link_target: None,
            nlink: 2,
            atime: 0,
            mtime: 0,
            ctime: 0,
            birthtime: 0,
        };
        store.entries.insert("/".to_string(), root);
        store
    }

    /// Construct a store running as root (uid 0), the common test default.
    pub fn new_root() -> Self {
        Self::new(UserContext::default())
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn get(&self, path: &str) -> Option<Entry> {
        self.entries.get(path).map(|r| r.value().clone())
    }

    async fn insert(&self, entry: Entry) {
        self.entries.insert(entry.path.clone(), entry);
    }

    async fn remove(&self, path: &str) -> Option<Entry> {
        self.entries.remove(path).map(|(_, v)| v)
    }

    async fn children(&self, path: &str) -> Vec<Entry> {
        let prefix = if path == "/" { "/".to_string() } else { format!("{path}/") };
        self.entries
            .iter()
            .filter(|r| {
                let p = r.key();
                p.starts_with(&prefix) && !p[prefix.len()..].contains('/') && p.len() > prefix.len()
            })
            .map(|r| r.value().clone())
            .collect()
    }

    async fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn current_uid(&self) -> u32 {
        self.user.uid
    }

    async fn current_gid(&self) -> u32 {
        self.user.gid
    }

    async fn current_groups(&self) -> Vec<u32> {
        self.user.groups.clone()
    }
}
