//! Namespace-mutating operations: `mkdir`, `rmdir`, `unlink`, `rm`,
//! `rename`, `symlink`, `link`.

use std::future::Future;
use std::pin::Pin;

use super::{new_entry, now_millis, Kernel};
use crate::error::{ctor, KernelResult};
use crate::mode::{self, Kind};
use crate::store::blob::BlobHash;
use crate::validate;

impl Kernel {
    /// Create a directory. With `recursive`, missing ancestors are created
    /// and an already-existing directory at `path` is a silent success.
    pub async fn mkdir(&self, path: &str, recursive: bool, mode_override: Option<u32>) -> KernelResult<()> {
        let path = validate::validate_standalone_path(path, "mkdir")?;
        let mode_bits = mode_override.unwrap_or(mode::DEFAULT_DIR_MODE) & !mode::S_IFMT;

        if !recursive {
            let parent_path = crate::path::dirname(path);
            let parent = self.store.get(&parent_path).await.ok_or_else(|| ctor::enoent("mkdir").with_path(path))?;
            if !parent.is_directory() {
                return Err(ctor::enotdir("mkdir").with_path(path));
            }
            if self.store.has(path).await {
                return Err(ctor::eexist("mkdir").with_path(path));
            }
            return self.create_dir_entry(path, mode_bits).await;
        }

        let segments: Vec<&str> = path.trim_start_matches('/').split('/').filter(|s| !s.is_empty()).collect();
        let mut built = String::new();
        for seg in segments {
            built.push('/');
            built.push_str(seg);
            match self.store.get(&built).await {
                Some(e) if e.is_directory() => continue,
                Some(_) => return Err(ctor::eexist("mkdir").with_path(&built)),
                None => self.create_dir_entry(&built, mode_bits).await?,
            }
        }
        Ok(())
    }

    async fn create_dir_entry(&self, path: &str, mode_bits: u32) -> KernelResult<()> {
        let now = now_millis();
        let id = self.store.next_id().await;
        let uid = self.store.current_uid().await;
        let gid = self.store.current_gid().await;
        let entry = new_entry(id, path.to_string(), Kind::Directory, mode::S_IFDIR | mode_bits, uid, gid, now);
        self.store.insert(entry).await;
        Ok(())
    }

    /// Remove a directory. Non-recursive requires it be empty; recursive
    /// removes its contents depth-first first.
    ///
    /// Boxed explicitly (rather than a plain `async fn`) because it recurses
    /// into itself for nested directories.
    pub fn rmdir<'a>(&'a self, path: &'a str, recursive: bool) -> Pin<Box<dyn Future<Output = KernelResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let path = validate::validate_path(path, "rmdir")?;
            if path == "/" {
                return Err(ctor::eperm("rmdir").with_path(path));
            }
            let entry = self.store.get(path).await.ok_or_else(|| ctor::enoent("rmdir").with_path(path))?;
            if !entry.is_directory() {
                return Err(ctor::enotdir("rmdir").with_path(path));
            }

            let children = self.store.children(path).await;
            if !children.is_empty() && !recursive {
                return Err(ctor::enotempty("rmdir").with_path(path));
            }

            if recursive {
                for child in children {
                    if child.is_directory() {
                        self.rmdir(&child.path, true).await?;
                    } else {
                        self.unlink(&child.path).await?;
                    }
                }
            }

            self.store.remove(path).await;
            Ok(())
        })
    }

    /// Remove a directory entry of any name: a symlink removes the link
    /// itself, a regular file decrements its blob's refcount.
    pub async fn unlink(&self, path: &str) -> KernelResult<()> {
        let path = validate::validate_path(path, "unlink")?;
        let trailing_slash = path.ends_with('/') && path != "/";
        let lookup_path = path.trim_end_matches('/');
        let entry = self.store.get(lookup_path).await.ok_or_else(|| ctor::enoent("unlink").with_path(path))?;
        if entry.is_directory() {
            return Err(ctor::eisdir("unlink").with_path(path));
        }
        if trailing_slash {
            return Err(ctor::enotdir("unlink").with_path(path));
        }
        if let Some(hash) = &entry.blob_ref {
            self.blobs.decref(&BlobHash(hash.clone())).await;
        }
        self.store.remove(lookup_path).await;
        Ok(())
    }

    /// Remove a file or directory (recursively, if `recursive`). With
    /// `force`, a missing path is not an error.
    pub async fn rm(&self, path: &str, recursive: bool) -> KernelResult<()> {
        self.rm_inner(path, recursive, false).await
    }

    pub async fn rm_forced(&self, path: &str, recursive: bool) -> KernelResult<()> {
        self.rm_inner(path, recursive, true).await
    }

    async fn rm_inner(&self, path: &str, recursive: bool, force: bool) -> KernelResult<()> {
        let validated = validate::validate_path(path, "rm")?;
        let entry = match self.store.get(validated).await {
            Some(e) => e,
            None if force => return Ok(()),
            None => return Err(ctor::enoent("rm").with_path(path)),
        };
        if entry.is_directory() {
            self.rmdir(validated, recursive).await
        } else {
            self.unlink(validated).await
        }
    }

    /// Create an additional hard-linked name for an existing regular file.
    pub async fn link(&self, existing: &str, new: &str) -> KernelResult<()> {
        let existing = validate::validate_path(existing, "link")?;
        let new = validate::validate_path(new, "link")?;

        let source = crate::symlink::resolve(&*self.store, existing, true, self.config.max_symlink_depth, "link")
            .await?
            .ok_or_else(|| ctor::enoent("link").with_path(existing).with_dest(new))?;
        if source.is_directory() {
            return Err(ctor::eperm("link").with_path(existing).with_dest(new));
        }
        if self.store.has(new).await {
            return Err(ctor::eexist("link").with_path(existing).with_dest(new));
        }
        let new_parent_path = crate::path::dirname(new);
        let new_parent = self
            .store
            .get(&new_parent_path)
            .await
            .ok_or_else(|| ctor::enoent("link").with_path(existing).with_dest(new))?;
        if !new_parent.is_directory() {
            return Err(ctor::enotdir("link").with_path(existing).with_dest(new));
        }

        if let Some(hash) = &source.blob_ref {
            self.blobs.incref(&BlobHash(hash.clone())).await;
        }

        let now = now_millis();
        let new_nlink = source.nlink + 1;
        let mut updated_source = source.clone();
        updated_source.nlink = new_nlink;
        updated_source.ctime = now;
        self.store.insert(updated_source).await;

        let id = self.store.next_id().await;
        let mut linked = source;
        linked.id = id;
        linked.path = new.to_string();
        linked.nlink = new_nlink;
        linked.ctime = now;
        self.store.insert(linked).await;
        Ok(())
    }

    /// Create a symlink at `path` pointing at `target` (stored verbatim;
    /// need not resolve to anything).
    pub async fn symlink(&self, target: &str, path: &str, mode_override: Option<u32>) -> KernelResult<()> {
        let path = validate::validate_path(path, "symlink")?;
        if target.is_empty() {
            return Err(ctor::einval("symlink").with_path(path));
        }
        if self.store.has(path).await {
            return Err(ctor::eexist("symlink").with_path(path));
        }
        let parent_path = crate::path::dirname(path);
        let parent = self.store.get(&parent_path).await.ok_or_else(|| ctor::enoent("symlink").with_path(path))?;
        if !parent.is_directory() {
            return Err(ctor::enotdir("symlink").with_path(path));
        }

        let now = now_millis();
        let id = self.store.next_id().await;
        let uid = self.store.current_uid().await;
        let gid = self.store.current_gid().await;
        let mode_bits = mode_override.unwrap_or(mode::DEFAULT_SYMLINK_MODE) & !mode::S_IFMT;
        let mut entry = new_entry(id, path.to_string(), Kind::Symlink, mode::S_IFLNK | mode_bits, uid, gid, now);
        entry.link_target = Some(target.to_string());
        entry.size = target.len() as u64;
        self.store.insert(entry).await;
        Ok(())
    }

    /// Atomically move `old` to `new`, translating every descendant path
    /// when `old` is a directory.
    pub async fn rename(&self, old: &str, new: &str, overwrite: bool) -> KernelResult<()> {
        let old = validate::validate_path(old, "rename")?;
        let new = validate::validate_path(new, "rename")?;
        let old_norm = crate::path::normalize(old);
        let new_norm = crate::path::normalize(new);
        if old_norm == new_norm {
            return Ok(());
        }

        let source = self.store.get(&old_norm).await.ok_or_else(|| ctor::enoent("rename").with_path(old).with_dest(new))?;

        if source.is_directory() && (new_norm == old_norm || new_norm.starts_with(&format!("{old_norm}/"))) {
            return Err(ctor::einval("rename").with_path(old).with_dest(new));
        }

        let new_parent_path = crate::path::dirname(&new_norm);
        let new_parent = self
            .store
            .get(&new_parent_path)
            .await
            .ok_or_else(|| ctor::enoent("rename").with_path(old).with_dest(new))?;
        if !new_parent.is_directory() {
            return Err(ctor::enotdir("rename").with_path(old).with_dest(new));
        }

        let dest = self.store.get(&new_norm).await;
        if let Some(dest_entry) = &dest {
            match (source.is_directory(), dest_entry.is_directory()) {
                (false, true) => return Err(ctor::eisdir("rename").with_path(old).with_dest(new)),
                (true, false) => return Err(ctor::enotdir("rename").with_path(old).with_dest(new)),
                (false, false) => {
                    if !overwrite {
                        return Err(ctor::eexist("rename").with_path(old).with_dest(new));
                    }
                }
                (true, true) => {
                    if !self.store.children(&new_norm).await.is_empty() {
                        return Err(ctor::enotempty("rename").with_path(old).with_dest(new));
                    }
                }
            }
            if let Some(hash) = &dest_entry.blob_ref {
                self.blobs.decref(&BlobHash(hash.clone())).await;
            }
            self.store.remove(&new_norm).await;
        }

        if source.is_directory() {
            let subtree = self.collect_subtree(&old_norm).await;
            self.store.remove(&old_norm).await;
            let mut moved_root = source;
            moved_root.path = new_norm.clone();
            moved_root.ctime = now_millis();
            self.store.insert(moved_root).await;
            for child in subtree {
                self.store.remove(&child.path).await;
                let translated = new_norm.clone() + &child.path[old_norm.len()..];
                let mut moved = child;
                moved.path = translated;
                self.store.insert(moved).await;
            }
        } else {
            self.store.remove(&old_norm).await;
            let mut moved = source;
            moved.path = new_norm;
            moved.ctime = now_millis();
            self.store.insert(moved).await;
        }
        Ok(())
    }

    async fn collect_subtree(&self, root: &str) -> Vec<crate::entry::Entry> {
        let mut out = Vec::new();
        let mut stack = vec![root.to_string()];
        while let Some(dir) = stack.pop() {
            for child in self.store.children(&dir).await {
                if child.is_directory() {
                    stack.push(child.path.clone());
                }
                out.push(child);
            }
        }
        out
    }
}
