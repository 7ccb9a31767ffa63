//! Symlink chain resolution: single-step and full-chain, with a depth cap
//! and cycle detection.

use std::collections::HashSet;

use crate::entry::Entry;
use crate::error::{ctor, KernelResult};
use crate::path;
use crate::store::MetadataStore;

/// Resolve `start` to its terminal entry.
///
/// If `follow` is false and the entry at `start` is itself a symlink, it is
/// returned unresolved. Otherwise the chain is walked until a non-symlink
/// entry is found, `max_depth` steps are exceeded (`ELOOP`), or a step
/// resolves to nothing (`ENOENT`, since the chain was actively followed).
pub async fn resolve(
    store: &dyn MetadataStore,
    start: &str,
    follow: bool,
    max_depth: u32,
    syscall: &'static str,
) -> KernelResult<Option<Entry>> {
    let normalized = path::normalize(start);
    let mut current = match store.get(&normalized).await {
        Some(e) => e,
        None => return Ok(None),
    };

    if !follow && current.is_symlink() {
        return Ok(Some(current));
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut depth = 0u32;
    while current.is_symlink() {
        if depth >= max_depth {
            return Err(ctor::eloop_(syscall).with_path(start));
        }
        if !visited.insert(current.path.clone()) {
            return Err(ctor::eloop_(syscall).with_path(start));
        }
        let target = current.link_target.clone().unwrap_or_default();
        let next_path = if path::is_absolute(&target) {
            path::normalize(&target)
        } else {
            let parent = current.parent_path().unwrap_or_else(|| "/".to_string());
            path::join(&[&parent, &target])
        };
        current = match store.get(&next_path).await {
            Some(e) => e,
            None => return Err(ctor::enoent(syscall).with_path(start)),
        };
        depth += 1;
    }
    Ok(Some(current))
}

/// Resolve only the parent directory component of `path`, following any
/// symlinks along the way, without requiring the final component to exist.
/// Returns `None` if the parent does not exist or is not a directory.
pub async fn resolve_parent_dir(
    store: &dyn MetadataStore,
    path_str: &str,
    max_depth: u32,
    syscall: &'static str,
) -> KernelResult<Option<Entry>> {
    let parent = path::dirname(path_str);
    resolve(store, &parent, true, max_depth, syscall).await
}
