//! The operation kernel: the family of path operations that compose the
//! path, error, mode, validator, symlink, and permission modules into the
//! POSIX-flavored surface this crate exists to provide.

mod attr;
mod read;
mod tree;
mod write;

pub use attr::ModeArg;
pub use read::{Encoding, ReadOptions, ReadOutput, ReaddirEntry, ReaddirOptions, ReaddirPage};
pub use write::CopyFlags;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::KernelConfig;
use crate::entry::{Entry, Millis};
use crate::mode::Kind;
use crate::search::GlobCache;
use crate::store::blob::BlobStore;
use crate::store::MetadataStore;

/// The assembled kernel: a metadata store, a blob store, and the tunables
/// governing symlink depth, default ownership, and tiering.
pub struct Kernel {
    pub store: Arc<dyn MetadataStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub config: KernelConfig,
    glob_cache: GlobCache,
}

impl Kernel {
    pub fn new(store: Arc<dyn MetadataStore>, blobs: Arc<dyn BlobStore>, config: KernelConfig) -> Self {
        let glob_cache = crate::search::new_glob_cache(config.glob_cache_capacity);
        Kernel { store, blobs, config, glob_cache }
    }

    /// No durability target exists below the abstract metadata/blob stores;
    /// this exists only so an embedder wired to a batching backend has a
    /// symmetrical hook to call after a burst of writes.
    pub async fn sync_hint(&self) {}
}

/// Current wall-clock time in milliseconds since the epoch.
pub(crate) fn now_millis() -> Millis {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as Millis).unwrap_or(0)
}

pub(crate) fn new_entry(
    id: u64,
    path: String,
    kind: Kind,
    mode: u32,
    uid: u32,
    gid: u32,
    now: Millis,
) -> Entry {
    let nlink = if kind == Kind::Directory { 2 } else { 1 };
    Entry {
        id,
        path,
        kind,
        mode,
        uid,
        gid,
        size: 0,
        blob_ref: None,
        link_target: None,
        nlink,
        atime: now,
        mtime: now,
        ctime: now,
        birthtime: now,
    }
}
