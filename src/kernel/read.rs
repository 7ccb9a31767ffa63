//! Non-mutating operations: reads, stats, directory listing, search.

use std::future::Future;
use std::pin::Pin;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tokio_util::sync::CancellationToken;

use super::Kernel;
use crate::entry::{Entry, Stats};
use crate::error::{ctor, KernelResult};
use crate::mode::{AccessMask, Kind};
use crate::perm;
use crate::search::{self, SearchHit, SearchOptions};
use crate::symlink;
use crate::validate;

/// Text encoding applied to a `read_file` result. Absent means raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Ascii,
    Latin1,
    Base64,
    Hex,
}

/// Options governing a `read_file` call.
#[derive(Clone, Default)]
pub struct ReadOptions {
    pub encoding: Option<Encoding>,
    /// Checked before the read starts and again after the blob lookup
    /// suspension point; an already-cancelled token fails the read fast.
    pub signal: Option<CancellationToken>,
}

/// The decoded result of a `read_file` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutput {
    Raw(Vec<u8>),
    Text(String),
}

impl ReadOutput {
    /// The underlying bytes, regardless of which encoding produced them.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            ReadOutput::Raw(b) => b,
            ReadOutput::Text(s) => s.into_bytes(),
        }
    }
}

fn encode_output(bytes: Vec<u8>, encoding: Option<Encoding>, path: &str) -> KernelResult<ReadOutput> {
    match encoding {
        None => Ok(ReadOutput::Raw(bytes)),
        Some(Encoding::Utf8) => {
            String::from_utf8(bytes).map(ReadOutput::Text).map_err(|_| ctor::einval("read").with_path(path))
        }
        Some(Encoding::Ascii) => {
            if bytes.iter().all(u8::is_ascii) {
                Ok(ReadOutput::Text(bytes.into_iter().map(|b| b as char).collect()))
            } else {
                Err(ctor::einval("read").with_path(path))
            }
        }
        // latin1/binary: every byte maps directly to the Unicode scalar of the same value.
        Some(Encoding::Latin1) => Ok(ReadOutput::Text(bytes.into_iter().map(|b| b as char).collect())),
        Some(Encoding::Base64) => Ok(ReadOutput::Text(BASE64.encode(&bytes))),
        Some(Encoding::Hex) => Ok(ReadOutput::Text(hex::encode(bytes))),
    }
}

/// Options governing a `readdir` call.
#[derive(Debug, Clone, Default)]
pub struct ReaddirOptions {
    /// Attach each entry's `Kind` (directory/regular/symlink/...). Without
    /// this, entries carry only a name, mirroring a plain name listing.
    pub with_file_types: bool,
    /// Walk the whole subtree depth-first instead of just direct children;
    /// names become paths relative to the queried directory.
    pub recursive: bool,
    pub limit: Option<usize>,
    /// An opaque token returned as `ReaddirPage::cursor` by a previous call.
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaddirEntry {
    pub name: String,
    pub kind: Option<Kind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaddirPage {
    pub entries: Vec<ReaddirEntry>,
    /// `None` once the listing is exhausted.
    pub cursor: Option<String>,
}

fn parse_cursor(cursor: &str, syscall: &'static str) -> KernelResult<u64> {
    cursor.parse::<u64>().map_err(|_| ctor::einval(syscall).with_path(cursor))
}

impl Kernel {
    /// Read the full contents of a regular file, following symlinks.
    pub async fn read_file(&self, path: &str, opts: &ReadOptions) -> KernelResult<ReadOutput> {
        if matches!(&opts.signal, Some(s) if s.is_cancelled()) {
            return Err(ctor::ebusy("read").with_path(path));
        }
        let path = validate::validate_path(path, "read")?;
        if path.ends_with('/') && path != "/" {
            return Err(ctor::enoent("read").with_path(path));
        }
        let entry = symlink::resolve(&*self.store, path, true, self.config.max_symlink_depth, "read")
            .await?
            .ok_or_else(|| ctor::enoent("read").with_path(path))?;
        if entry.is_directory() {
            return Err(ctor::eisdir("read").with_path(path));
        }
        perm::access(&*self.store, &entry, &[AccessMask::R_OK], "read", path).await?;

        let bytes = match &entry.blob_ref {
            Some(hash) => self.blobs.get(&crate::store::blob::BlobHash(hash.clone())).await.unwrap_or_default(),
            None => Vec::new(),
        };

        if matches!(&opts.signal, Some(s) if s.is_cancelled()) {
            return Err(ctor::ebusy("read").with_path(path));
        }
        encode_output(bytes, opts.encoding, path)
    }

    /// Never fails: reports `false` for missing entries, broken/cyclic
    /// symlinks, or any validation failure.
    pub async fn exists(&self, path: &str) -> bool {
        let Ok(path) = validate::validate_path(path, "exists") else { return false };
        if path.ends_with('/') && path != "/" {
            let trimmed = path.trim_end_matches('/');
            return matches!(
                symlink::resolve(&*self.store, trimmed, true, self.config.max_symlink_depth, "exists").await,
                Ok(Some(e)) if e.is_directory()
            );
        }
        matches!(
            symlink::resolve(&*self.store, path, true, self.config.max_symlink_depth, "exists").await,
            Ok(Some(_))
        )
    }

    /// Test one or more access bits for the current user against `path`,
    /// following symlinks.
    pub async fn access(&self, path: &str, bits: &[AccessMask]) -> KernelResult<()> {
        let path = validate::validate_path(path, "access")?;
        let entry = symlink::resolve(&*self.store, path, true, self.config.max_symlink_depth, "access")
            .await?
            .ok_or_else(|| ctor::enoent("access").with_path(path))?;
        perm::access(&*self.store, &entry, bits, "access", path).await
    }

    /// Stat, following symlinks.
    pub async fn stat(&self, path: &str) -> KernelResult<Stats> {
        let path = validate::validate_path(path, "stat")?;
        let entry = symlink::resolve(&*self.store, path, true, self.config.max_symlink_depth, "stat")
            .await?
            .ok_or_else(|| ctor::enoent("stat").with_path(path))?;
        Ok(entry.to_stats())
    }

    /// Stat, without following a final symlink component.
    pub async fn lstat(&self, path: &str) -> KernelResult<Stats> {
        let path = validate::validate_path(path, "lstat")?;
        let entry = symlink::resolve(&*self.store, path, false, self.config.max_symlink_depth, "lstat")
            .await?
            .ok_or_else(|| ctor::enoent("lstat").with_path(path))?;
        Ok(entry.to_stats())
    }

    /// Read a symlink's raw target string.
    pub async fn readlink(&self, path: &str) -> KernelResult<String> {
        let path = validate::validate_path(path, "readlink")?;
        let entry = self.store.get(path).await.ok_or_else(|| ctor::enoent("readlink").with_path(path))?;
        if !entry.is_symlink() {
            return Err(ctor::einval("readlink").with_path(path));
        }
        Ok(entry.link_target.unwrap_or_default())
    }

    /// List a directory's contents, optionally recursive and paginated.
    ///
    /// Pagination mirrors a fileid-based resume cookie: the cursor returned
    /// in a page is the id of its last entry, and a subsequent call with
    /// that cursor skips everything up to and including it. A `None` cursor
    /// on the returned page means the listing is exhausted.
    pub async fn readdir(&self, path: &str, opts: &ReaddirOptions) -> KernelResult<ReaddirPage> {
        let path = validate::validate_path(path, "readdir")?;
        let entry = symlink::resolve(&*self.store, path, true, self.config.max_symlink_depth, "readdir")
            .await?
            .ok_or_else(|| ctor::enoent("readdir").with_path(path))?;
        if !entry.is_directory() {
            return Err(ctor::enotdir("readdir").with_path(path));
        }

        let listing: Vec<(String, Entry)> = if opts.recursive {
            self.collect_recursive(entry.path.clone(), entry.path.clone()).await
        } else {
            let mut children = self.store.children(&entry.path).await;
            children.sort_by(|a, b| a.name().cmp(b.name()));
            children.into_iter().map(|e| (e.name().to_string(), e)).collect()
        };

        let after = match &opts.cursor {
            Some(c) => parse_cursor(c, "readdir")?,
            None => 0,
        };
        let mut page: Vec<(String, Entry)> = listing.into_iter().filter(|(_, e)| e.id > after).collect();

        let limit = opts.limit.unwrap_or(page.len());
        let truncated = page.len() > limit;
        page.truncate(limit);

        let cursor = if truncated { page.last().map(|(_, e)| e.id.to_string()) } else { None };
        let entries = page
            .into_iter()
            .map(|(name, e)| ReaddirEntry { name, kind: opts.with_file_types.then_some(e.kind) })
            .collect();

        Ok(ReaddirPage { entries, cursor })
    }

    /// Depth-first walk of `dir_path`'s subtree, yielding each descendant
    /// paired with its path relative to `rel_root`. Boxed because it
    /// recurses into itself for nested directories.
    fn collect_recursive<'a>(
        &'a self,
        dir_path: String,
        rel_root: String,
    ) -> Pin<Box<dyn Future<Output = Vec<(String, Entry)>> + Send + 'a>> {
        Box::pin(async move {
            let mut out = Vec::new();
            let mut children = self.store.children(&dir_path).await;
            children.sort_by(|a, b| a.name().cmp(b.name()));
            for child in children {
                let rel = crate::path::relative(&rel_root, &child.path);
                let is_dir = child.is_directory();
                let child_path = child.path.clone();
                out.push((rel, child));
                if is_dir {
                    let mut nested = self.collect_recursive(child_path, rel_root.clone()).await;
                    out.append(&mut nested);
                }
            }
            out
        })
    }

    /// Recursive glob search rooted at `opts.path` (default `/`).
    pub async fn search(&self, pattern: &str, opts: &SearchOptions) -> KernelResult<Vec<SearchHit>> {
        search::search(&*self.store, &*self.blobs, &self.glob_cache, pattern, opts).await
    }
}
