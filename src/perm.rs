//! POSIX owner/group/other permission checks against the current user
//! context reported by the metadata store.

use crate::entry::Entry;
use crate::error::{ctor, KernelResult};
use crate::mode::{self, AccessMask, PermClass};
use crate::store::MetadataStore;

fn classify(store_uid: u32, store_gid: u32, groups: &[u32], entry: &Entry) -> PermClass {
    if store_uid == entry.uid {
        PermClass::Owner
    } else if store_gid == entry.gid || groups.contains(&entry.gid) {
        PermClass::Group
    } else {
        PermClass::Other
    }
}

/// Test whether the current user may exercise `bit` against `entry`.
pub async fn check_access(store: &dyn MetadataStore, entry: &Entry, bit: AccessMask) -> bool {
    if bit == AccessMask::F_OK {
        return true;
    }
    if store.is_root().await {
        return true;
    }
    let uid = store.current_uid().await;
    let gid = store.current_gid().await;
    let groups = store.current_groups().await;
    let class = classify(uid, gid, &groups, entry);
    mode::has_perm(entry.mode, class, bit)
}

/// Test every bit in `bits`, failing with `EACCES` on the first missing one.
pub async fn access(
    store: &dyn MetadataStore,
    entry: &Entry,
    bits: &[AccessMask],
    syscall: &'static str,
    path: &str,
) -> KernelResult<()> {
    for bit in bits {
        if !check_access(store, entry, *bit).await {
            return Err(ctor::eacces(syscall).with_path(path));
        }
    }
    Ok(())
}

/// Authorize a `chmod`: only root or the owning user may change mode bits.
pub async fn authorize_chmod(store: &dyn MetadataStore, entry: &Entry, syscall: &'static str, path: &str) -> KernelResult<()> {
    if store.is_root().await {
        return Ok(());
    }
    let uid = store.current_uid().await;
    if uid == entry.uid {
        Ok(())
    } else {
        Err(ctor::eperm(syscall).with_path(path))
    }
}

/// Authorize a `chown`. Root may set any uid/gid. A non-root owner may only
/// change the group, and only to a group they belong to; changing uid, or
/// changing gid to a foreign group, is `EPERM`.
pub async fn authorize_chown(
    store: &dyn MetadataStore,
    entry: &Entry,
    new_uid: Option<u32>,
    new_gid: Option<u32>,
    syscall: &'static str,
    path: &str,
) -> KernelResult<()> {
    if store.is_root().await {
        return Ok(());
    }
    let uid = store.current_uid().await;
    if uid != entry.uid {
        return Err(ctor::eperm(syscall).with_path(path));
    }
    if let Some(target_uid) = new_uid {
        if target_uid != entry.uid {
            return Err(ctor::eperm(syscall).with_path(path));
        }
    }
    if let Some(target_gid) = new_gid {
        let groups = store.current_groups().await;
        let gid = store.current_gid().await;
        if target_gid != gid && !groups.contains(&target_gid) {
            return Err(ctor::eperm(syscall).with_path(path));
        }
    }
    Ok(())
}
