//! Content-mutating operations: `write_file`, `truncate`, `copy_file`.

use super::{new_entry, now_millis, Kernel};
use crate::error::{ctor, KernelResult};
use crate::mode::{self, Kind};
use crate::perm;
use crate::store::blob::BlobHash;
use crate::validate;

bitflags::bitflags! {
    /// Bits recognized by `copy_file`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CopyFlags: u32 {
        const EXCL = 0b01;
        const FICLONE = 0b10;
        const FICLONE_FORCE = 0b100;
    }
}

impl Kernel {
    /// Create or overwrite a regular file with `bytes`.
    pub async fn write_file(&self, path: &str, bytes: Vec<u8>, mode_override: Option<u32>) -> KernelResult<()> {
        let path = validate::validate_standalone_path(path, "write")?;
        if path == "/" {
            return Err(ctor::eisdir("write").with_path(path));
        }
        let parent_path = crate::path::dirname(path);
        let parent = self.store.get(&parent_path).await.ok_or_else(|| ctor::enoent("write").with_path(path))?;
        if !parent.is_directory() {
            return Err(ctor::enotdir("write").with_path(path));
        }

        let now = now_millis();
        let existing = self.store.get(path).await;
        if let Some(existing) = &existing {
            if existing.is_directory() {
                return Err(ctor::eisdir("write").with_path(path));
            }
            perm::access(&*self.store, existing, &[crate::mode::AccessMask::W_OK], "write", path).await?;
        }

        let new_hash = self.blobs.write(bytes.clone()).await;
        self.blobs.incref(&new_hash).await;

        let (id, uid, gid, birthtime, mode_bits) = match &existing {
            Some(e) => (e.id, e.uid, e.gid, e.birthtime, mode_override.unwrap_or(e.mode & !mode::S_IFMT)),
            None => (
                self.store.next_id().await,
                self.store.current_uid().await,
                self.store.current_gid().await,
                now,
                mode_override.unwrap_or(mode::DEFAULT_FILE_MODE),
            ),
        };

        if let Some(old) = &existing {
            if let Some(old_hash) = &old.blob_ref {
                self.blobs.decref(&BlobHash(old_hash.clone())).await;
            }
        }

        let mut entry = new_entry(id, path.to_string(), Kind::Regular, mode::S_IFREG | (mode_bits & !mode::S_IFMT), uid, gid, now);
        entry.birthtime = birthtime;
        entry.size = bytes.len() as u64;
        entry.blob_ref = Some(new_hash.0);
        entry.nlink = existing.as_ref().map(|e| e.nlink).unwrap_or(1);
        self.store.insert(entry).await;
        Ok(())
    }

    /// Resize a regular file, zero-filling on extension.
    pub async fn truncate(&self, path: &str, length: u64) -> KernelResult<()> {
        let path = validate::validate_path(path, "truncate")?;
        let entry = self.store.get(path).await.ok_or_else(|| ctor::enoent("truncate").with_path(path))?;
        if entry.is_directory() {
            return Err(ctor::eisdir("truncate").with_path(path));
        }
        if entry.size == length {
            return Ok(());
        }
        let mut bytes = match &entry.blob_ref {
            Some(hash) => self.blobs.get(&BlobHash(hash.clone())).await.unwrap_or_default(),
            None => Vec::new(),
        };
        bytes.resize(length as usize, 0);

        let new_hash = self.blobs.write(bytes).await;
        self.blobs.incref(&new_hash).await;
        if let Some(old_hash) = &entry.blob_ref {
            self.blobs.decref(&BlobHash(old_hash.clone())).await;
        }

        let now = now_millis();
        let mut updated = entry;
        updated.blob_ref = Some(new_hash.0);
        updated.size = length;
        updated.mtime = now;
        updated.ctime = now;
        self.store.insert(updated).await;
        Ok(())
    }

    /// Copy `src` to `dest`, preserving mode bits. `EXCL` rejects an
    /// existing destination; `FICLONE`/`FICLONE_FORCE` are accepted as
    /// hints and are naturally satisfied here since the destination shares
    /// the source's blob hash rather than duplicating bytes.
    pub async fn copy_file(&self, src: &str, dest: &str, flags: CopyFlags) -> KernelResult<()> {
        let src = validate::validate_path(src, "copy")?;
        let dest = validate::validate_path(dest, "copy")?;
        if src == "/" {
            return Err(ctor::eisdir("copy").with_path(src));
        }
        let source = self.store.get(src).await.ok_or_else(|| ctor::enoent("copy").with_path(src).with_dest(dest))?;
        if source.is_directory() {
            return Err(ctor::eisdir("copy").with_path(src));
        }
        let dest_parent_path = crate::path::dirname(dest);
        let dest_parent = self
            .store
            .get(&dest_parent_path)
            .await
            .ok_or_else(|| ctor::enoent("copy").with_path(src).with_dest(dest))?;
        if !dest_parent.is_directory() {
            return Err(ctor::enotdir("copy").with_path(src).with_dest(dest));
        }

        let existing_dest = self.store.get(dest).await;
        if existing_dest.is_some() && flags.contains(CopyFlags::EXCL) {
            return Err(ctor::eexist("copy").with_path(src).with_dest(dest));
        }
        if let Some(d) = &existing_dest {
            if d.is_directory() {
                return Err(ctor::eisdir("copy").with_path(src).with_dest(dest));
            }
        }

        let now = now_millis();
        if let Some(hash) = &source.blob_ref {
            self.blobs.incref(&BlobHash(hash.clone())).await;
        }
        if let Some(old) = &existing_dest {
            if let Some(old_hash) = &old.blob_ref {
                self.blobs.decref(&BlobHash(old_hash.clone())).await;
            }
        }

        let id = match &existing_dest {
            Some(d) => d.id,
            None => self.store.next_id().await,
        };
        let mut copied = source.clone();
        copied.id = id;
        copied.path = dest.to_string();
        copied.nlink = 1;
        copied.birthtime = now;
        copied.mtime = now;
        copied.ctime = now;
        self.store.insert(copied).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::Branch;
    use crate::kernel::ReadOptions;
    use crate::config::KernelConfig;
    use crate::store::blob::InMemoryBlobStore;
    use crate::store::UserContext;
    use std::sync::Arc;

    fn kernel() -> Kernel {
        let store = Branch::new_root("main", UserContext::default(), 0);
        Kernel::new(store, Arc::new(InMemoryBlobStore::default()), KernelConfig::default())
    }

    #[tokio::test]
    async fn write_then_read_roundtrips() {
        let k = kernel();
        k.write_file("/a.txt", b"hello".to_vec(), None).await.unwrap();
        assert_eq!(k.read_file("/a.txt", &ReadOptions::default()).await.unwrap().into_bytes(), b"hello");
    }

    #[tokio::test]
    async fn overwrite_decrefs_previous_blob() {
        let k = kernel();
        k.write_file("/a.txt", b"one".to_vec(), None).await.unwrap();
        k.write_file("/a.txt", b"two".to_vec(), None).await.unwrap();
        assert_eq!(k.read_file("/a.txt", &ReadOptions::default()).await.unwrap().into_bytes(), b"two");
        let stats = k.blobs.dedup_stats().await;
        assert_eq!(stats.unique_blobs, 1);
    }

    #[tokio::test]
    async fn write_to_missing_parent_is_enoent() {
        let k = kernel();
        assert!(k.write_file("/missing/a.txt", b"x".to_vec(), None).await.is_err());
    }

    #[tokio::test]
    async fn write_over_directory_is_eisdir() {
        let k = kernel();
        k.mkdir("/dir", false, None).await.unwrap();
        let err = k.write_file("/dir", b"x".to_vec(), None).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::EISDIR);
    }

    #[tokio::test]
    async fn truncate_extends_with_zeros() {
        let k = kernel();
        k.write_file("/a.txt", b"ab".to_vec(), None).await.unwrap();
        k.truncate("/a.txt", 4).await.unwrap();
        assert_eq!(k.read_file("/a.txt", &ReadOptions::default()).await.unwrap().into_bytes(), vec![b'a', b'b', 0, 0]);
    }

    #[tokio::test]
    async fn copy_preserves_content_and_mode() {
        let k = kernel();
        k.write_file("/a.txt", b"data".to_vec(), Some(0o600)).await.unwrap();
        k.copy_file("/a.txt", "/b.txt", CopyFlags::empty()).await.unwrap();
        assert_eq!(k.read_file("/b.txt", &ReadOptions::default()).await.unwrap().into_bytes(), b"data");
        let stats = k.stat("/b.txt").await.unwrap();
        assert_eq!(stats.mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn copy_excl_rejects_existing_dest() {
        let k = kernel();
        k.write_file("/a.txt", b"1".to_vec(), None).await.unwrap();
        k.write_file("/b.txt", b"2".to_vec(), None).await.unwrap();
        let err = k.copy_file("/a.txt", "/b.txt", CopyFlags::EXCL).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::EEXIST);
    }
}
