//! Recursive path search: glob matching with excludes, optional content
//! grep, and depth/result-count gates.

use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use moka::sync::Cache;

use crate::entry::Dirent;
use crate::error::{ctor, KernelResult};
use crate::mode::Kind;
use crate::store::blob::BlobStore;
use crate::store::MetadataStore;

/// Options governing one `search` call.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub path: String,
    pub exclude: Vec<String>,
    pub max_depth: Option<u32>,
    pub show_hidden: bool,
    pub limit: Option<usize>,
    pub content_search: Option<String>,
    pub case_sensitive: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            path: "/".to_string(),
            exclude: Vec::new(),
            max_depth: None,
            show_hidden: false,
            limit: None,
            content_search: None,
            case_sensitive: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub path: String,
    pub kind: Kind,
    pub content_matches: Option<u64>,
}

/// A compiled-`GlobSet` cache, sized per [`crate::config::KernelConfig::glob_cache_capacity`].
pub type GlobCache = Cache<String, Arc<GlobSet>>;

/// Build a fresh cache with the configured capacity. One of these is owned
/// by each [`crate::kernel::Kernel`], so instances running with different
/// configs never share (or contend over) pattern compilation.
pub fn new_glob_cache(capacity: u64) -> GlobCache {
    Cache::new(capacity)
}

fn compiled_set(cache: &GlobCache, patterns: &[String], case_sensitive: bool) -> KernelResult<Arc<GlobSet>> {
    let key = format!("{}\u{0}{}", case_sensitive, patterns.join("\u{1}"));
    if let Some(hit) = cache.get(&key) {
        return Ok(hit);
    }
    let mut builder = GlobSetBuilder::new();
    for p in patterns {
        let glob = Glob::new(p).map_err(|_| ctor::einval("search").with_path(p))?;
        builder.add(glob);
    }
    let set = Arc::new(builder.build().map_err(|_| ctor::einval("search"))?);
    cache.insert(key, set.clone());
    Ok(set)
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.') && name != "." && name != ".."
}

/// Recursively search `store` (optionally reading blob content via `blobs`)
/// for entries under `opts.path` matching `pattern`.
pub async fn search(
    store: &dyn MetadataStore,
    blobs: &dyn BlobStore,
    cache: &GlobCache,
    pattern: &str,
    opts: &SearchOptions,
) -> KernelResult<Vec<SearchHit>> {
    let include = compiled_set(cache, &[pattern.to_string()], opts.case_sensitive)?;
    let exclude = if opts.exclude.is_empty() {
        None
    } else {
        Some(compiled_set(cache, &opts.exclude, opts.case_sensitive)?)
    };

    let root = crate::path::normalize(&opts.path);
    let root_entry = store
        .get(&root)
        .await
        .ok_or_else(|| ctor::enoent("search").with_path(&opts.path))?;
    if !root_entry.is_directory() {
        return Err(ctor::enotdir("search").with_path(&opts.path));
    }

    let mut hits = Vec::new();
    let mut stack: Vec<(String, u32)> = vec![(root, 0)];

    while let Some((dir, depth)) = stack.pop() {
        if let Some(max) = opts.max_depth {
            if depth > max {
                continue;
            }
        }
        let mut children = store.children(&dir).await;
        children.sort_by(|a, b| a.name().cmp(b.name()));

        for child in children {
            let dirent: Dirent = child.to_dirent();
            if !opts.show_hidden && is_hidden(&dirent.name) {
                continue;
            }
            let rel = crate::path::relative(&root, &child.path);

            let excluded = exclude
                .as_ref()
                .map(|set| set.is_match(&rel) || rel.split('/').any(|seg| set.is_match(seg)))
                .unwrap_or(false);

            if !excluded && include.is_match(&rel) {
                let content_matches = if let Some(needle) = &opts.content_search {
                    if child.is_regular() {
                        count_content_matches(blobs, &child, needle, opts.case_sensitive).await
                    } else {
                        None
                    }
                } else {
                    None
                };

                if opts.content_search.is_none() || content_matches.is_some() {
                    hits.push(SearchHit { path: child.path.clone(), kind: child.kind, content_matches });
                    if let Some(limit) = opts.limit {
                        if hits.len() >= limit {
                            return Ok(hits);
                        }
                    }
                }
            }

            if child.is_directory() && !excluded {
                stack.push((child.path.clone(), depth + 1));
            }
        }
    }

    Ok(hits)
}

async fn count_content_matches(
    blobs: &dyn BlobStore,
    entry: &crate::entry::Entry,
    needle: &str,
    case_sensitive: bool,
) -> Option<u64> {
    let hash = entry.blob_ref.as_ref()?;
    let bytes = blobs.get(&crate::store::blob::BlobHash(hash.clone())).await?;
    let text = String::from_utf8_lossy(&bytes);
    let count = if case_sensitive {
        text.matches(needle).count()
    } else {
        let lowered_needle = needle.to_lowercase();
        text.to_lowercase().matches(lowered_needle.as_str()).count()
    };
    if count > 0 {
        Some(count as u64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{Kind as K, S_IFDIR, S_IFREG};
    use crate::store::blob::InMemoryBlobStore;
    use crate::store::InMemoryMetadataStore;

    fn dir(path: &str) -> crate::entry::Entry {
        crate::entry::Entry {
            id: 0,
            path: path.to_string(),
            kind: K::Directory,
            mode: S_IFDIR | 0o755,
            uid: 0,
            gid: 0,
            size: 0,
            blob_ref: None,
            link_target: None,
            nlink: 2,
            atime: 0,
            mtime: 0,
            ctime: 0,
            birthtime: 0,
        }
    }

    async fn file_with_content(
        store: &InMemoryMetadataStore,
        blobs: &InMemoryBlobStore,
        path: &str,
        content: &[u8],
    ) {
        let hash = blobs.write(content.to_vec()).await;
        blobs.incref(&hash).await;
        store
            .insert(crate::entry::Entry {
                id: 0,
                path: path.to_string(),
                kind: K::Regular,
                mode: S_IFREG | 0o644,
                uid: 0,
                gid: 0,
                size: content.len() as u64,
                blob_ref: Some(hash.0.clone()),
                link_target: None,
                nlink: 1,
                atime: 0,
                mtime: 0,
                ctime: 0,
                birthtime: 0,
            })
            .await;
    }

    #[tokio::test]
    async fn glob_matches_nested_files() {
        let store = InMemoryMetadataStore::new_root();
        let blobs = InMemoryBlobStore::default();
        store.insert(dir("/src")).await;
        file_with_content(&store, &blobs, "/src/main.rs", b"fn main() {}").await;
        file_with_content(&store, &blobs, "/src/notes.txt", b"hello").await;

        let hits = search(&store, &blobs, &new_glob_cache(512), "**/*.rs", &SearchOptions::default()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "/src/main.rs");
    }

    #[tokio::test]
    async fn excludes_override_include_matches() {
        let store = InMemoryMetadataStore::new_root();
        let blobs = InMemoryBlobStore::default();
        store.insert(dir("/src")).await;
        file_with_content(&store, &blobs, "/src/main.rs", b"fn main() {}").await;
        file_with_content(&store, &blobs, "/src/gen.rs", b"generated").await;

        let opts = SearchOptions { exclude: vec!["**/gen.rs".to_string()], ..Default::default() };
        let hits = search(&store, &blobs, &new_glob_cache(512), "**/*.rs", &opts).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "/src/main.rs");
    }

    #[tokio::test]
    async fn hidden_entries_skipped_by_default() {
        let store = InMemoryMetadataStore::new_root();
        let blobs = InMemoryBlobStore::default();
        file_with_content(&store, &blobs, "/.secret", b"shh").await;
        let hits = search(&store, &blobs, &new_glob_cache(512), "*", &SearchOptions::default()).await.unwrap();
        assert!(hits.iter().all(|h| h.path != "/.secret"));
    }

    #[tokio::test]
    async fn content_search_filters_to_matching_files() {
        let store = InMemoryMetadataStore::new_root();
        let blobs = InMemoryBlobStore::default();
        file_with_content(&store, &blobs, "/a.txt", b"needle here").await;
        file_with_content(&store, &blobs, "/b.txt", b"nothing").await;

        let opts = SearchOptions { content_search: Some("needle".to_string()), ..Default::default() };
        let hits = search(&store, &blobs, &new_glob_cache(512), "*.txt", &opts).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "/a.txt");
        assert_eq!(hits[0].content_matches, Some(1));
    }
}
