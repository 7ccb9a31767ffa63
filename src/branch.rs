//! Copy-on-write branch overlay: a branch inherits unmodified entries from
//! its parent branch and privately records writes and deletions until
//! `commit` folds them upward or `discard` drops them.
//!
//! A branch with no parent is itself a complete store — the kernel's "main"
//! branch is simply a root `Branch`, so the operation kernel never needs to
//! distinguish a plain store from a branched one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use crate::entry::{Entry, Millis};
use crate::error::{ctor, KernelResult};
use crate::store::{MetadataStore, UserContext};

pub struct Branch {
    pub id: String,
    pub parent: Option<Arc<Branch>>,
    overrides: DashMap<String, Entry>,
    tombstones: DashSet<String>,
    next_id: AtomicU64,
    created_at: Millis,
    modified_at: AtomicI64,
    user: UserContext,
}

impl Branch {
    /// Create the root branch of a filesystem: no parent, backed entirely
    /// by its own overlay (which is to say, it behaves as a plain store).
    pub fn new_root(id: impl Into<String>, user: UserContext, now: Millis) -> Arc<Branch> {
        let branch = Branch {
            id: id.into(),
            parent: None,
            overrides: DashMap::new(),
            tombstones: DashSet::new(),
            next_id: AtomicU64::new(1),
            created_at: now,
            modified_at: AtomicI64::new(now),
            user,
        };
        let root_entry = Entry {
            id: 0,
            path: "/".to_string(),
            kind: crate::mode::Kind::Directory,
            mode: crate::mode::S_IFDIR | crate::mode::DEFAULT_DIR_MODE,
            uid: branch.user.uid,
            gid: branch.user.gid,
            size: 0,
            blob_ref: None,
            link_target: None,
            nlink: 2,
            atime: now,
            mtime: now,
            ctime: now,
            birthtime: now,
        };
        branch.overrides.insert("/".to_string(), root_entry);
        Arc::new(branch)
    }

    /// Fork a child branch from `parent`, sharing its user identity unless
    /// `user` overrides it.
    pub fn fork(parent: Arc<Branch>, id: impl Into<String>, user: Option<UserContext>, now: Millis) -> Arc<Branch> {
        let user = user.unwrap_or_else(|| UserContext {
            uid: parent.user.uid,
            gid: parent.user.gid,
            groups: parent.user.groups.clone(),
        });
        Arc::new(Branch {
            id: id.into(),
            parent: Some(parent),
            overrides: DashMap::new(),
            tombstones: DashSet::new(),
            next_id: AtomicU64::new(1),
            created_at: now,
            modified_at: AtomicI64::new(now),
            user,
        })
    }

    pub fn created_at(&self) -> Millis {
        self.created_at
    }

    pub fn modified_at(&self) -> Millis {
        self.modified_at.load(Ordering::Relaxed)
    }

    fn touch(&self, now: Millis) {
        self.modified_at.store(now, Ordering::Relaxed);
    }

    /// Whether `path` has a private override or tombstone recorded directly
    /// on this branch (as opposed to being inherited unmodified).
    pub fn is_dirty(&self, path: &str) -> bool {
        self.overrides.contains_key(path) || self.tombstones.contains(path)
    }

    /// Fold this branch's overrides and tombstones into its parent, then
    /// clear them. Fails `EINVAL` if this branch has no parent to commit
    /// into (the root branch is never committed; it has nowhere to go).
    pub async fn commit(&self, now: Millis) -> KernelResult<()> {
        let parent = self.parent.as_ref().ok_or_else(|| ctor::einval("branch-commit").with_path(&self.id))?;
        for r in self.overrides.iter() {
            parent.insert(r.value().clone()).await;
        }
        for t in self.tombstones.iter() {
            parent.remove(t.as_str()).await;
        }
        self.overrides.clear();
        self.tombstones.clear();
        self.touch(now);
        Ok(())
    }

    /// Drop every private override and tombstone, reverting to the parent's
    /// view. The parent is never touched (`I9`).
    pub fn discard(&self, now: Millis) {
        self.overrides.clear();
        self.tombstones.clear();
        self.touch(now);
    }
}

#[async_trait]
impl MetadataStore for Branch {
    async fn get(&self, path: &str) -> Option<Entry> {
        if self.tombstones.contains(path) {
            return None;
        }
        if let Some(e) = self.overrides.get(path) {
            return Some(e.value().clone());
        }
        match &self.parent {
            Some(parent) => parent.get(path).await,
            None => None,
        }
    }

    async fn insert(&self, entry: Entry) {
        self.tombstones.remove(&entry.path);
        self.overrides.insert(entry.path.clone(), entry);
    }

    async fn remove(&self, path: &str) -> Option<Entry> {
        let existing = self.get(path).await;
        self.overrides.remove(path);
        if existing.is_some() {
            self.tombstones.insert(path.to_string());
        }
        existing
    }

    async fn children(&self, path: &str) -> Vec<Entry> {
        let mut merged: HashMap<String, Entry> = HashMap::new();
        if let Some(parent) = &self.parent {
            for e in parent.children(path).await {
                if !self.tombstones.contains(&e.path) {
                    merged.insert(e.path.clone(), e);
                }
            }
        }
        let want_parent = crate::path::normalize(path);
        for r in self.overrides.iter() {
            let e = r.value();
            if e.path != "/" && crate::path::dirname(&e.path) == want_parent {
                merged.insert(e.path.clone(), e.clone());
            }
        }
        merged.into_values().collect()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{Kind, S_IFREG};

    fn file(path: &str) -> Entry {
        Entry {
            id: 0,
            path: path.to_string(),
            kind: Kind::Regular,
            mode: S_IFREG | 0o644,
            uid: 0,
            gid: 0,
            size: 0,
            blob_ref: None,
            link_target: None,
            nlink: 1,
            atime: 0,
            mtime: 0,
            ctime: 0,
            birthtime: 0,
        }
    }

    #[tokio::test]
    async fn child_sees_unmodified_parent_entries() {
        let root = Branch::new_root("main", UserContext::default(), 0);
        root.insert(file("/a.txt")).await;
        let child = Branch::fork(root.clone(), "feature", None, 1);
        assert!(child.get("/a.txt").await.is_some());
    }

    #[tokio::test]
    async fn writes_on_child_do_not_touch_parent() {
        let root = Branch::new_root("main", UserContext::default(), 0);
        root.insert(file("/a.txt")).await;
        let child = Branch::fork(root.clone(), "feature", None, 1);

        let mut modified = file("/a.txt");
        modified.size = 99;
        child.insert(modified).await;

        assert_eq!(root.get("/a.txt").await.unwrap().size, 0);
        assert_eq!(child.get("/a.txt").await.unwrap().size, 99);
    }

    #[tokio::test]
    async fn tombstone_hides_parent_entry_without_deleting_it() {
        let root = Branch::new_root("main", UserContext::default(), 0);
        root.insert(file("/a.txt")).await;
        let child = Branch::fork(root.clone(), "feature", None, 1);

        child.remove("/a.txt").await;
        assert!(child.get("/a.txt").await.is_none());
        assert!(root.get("/a.txt").await.is_some());
    }

    #[tokio::test]
    async fn commit_folds_overrides_into_parent() {
        let root = Branch::new_root("main", UserContext::default(), 0);
        let child = Branch::fork(root.clone(), "feature", None, 1);
        child.insert(file("/new.txt")).await;
        child.commit(2).await.unwrap();

        assert!(root.get("/new.txt").await.is_some());
        assert!(!child.is_dirty("/new.txt"));
    }

    #[tokio::test]
    async fn discard_drops_overrides_and_leaves_parent_untouched() {
        let root = Branch::new_root("main", UserContext::default(), 0);
        root.insert(file("/a.txt")).await;
        let child = Branch::fork(root.clone(), "feature", None, 1);
        child.remove("/a.txt").await;
        child.discard(2);

        assert!(child.get("/a.txt").await.is_some());
        assert!(root.get("/a.txt").await.is_some());
    }

    #[tokio::test]
    async fn children_merge_parent_and_overlay_views() {
        let root = Branch::new_root("main", UserContext::default(), 0);
        root.insert(file("/dir")).await;
        root.insert(file("/dir/a.txt")).await;
        let child = Branch::fork(root.clone(), "feature", None, 1);
        child.insert(file("/dir/b.txt")).await;
        child.remove("/dir/a.txt").await;

        let kids: Vec<_> = child.children("/dir").await.into_iter().map(|e| e.path).collect();
        assert!(kids.contains(&"/dir/b.txt".to_string()));
        assert!(!kids.contains(&"/dir/a.txt".to_string()));
    }

    #[test]
    fn root_has_no_parent() {
        let root = Branch::new_root("main", UserContext::default(), 0);
        assert!(root.parent.is_none());
    }
}
