//! Integration tests driving the assembled kernel end-to-end, in the style
//! of the fixture-based suites this crate's lineage uses for its VFS
//! backends.

use std::sync::Arc;

use vpfs::branch::Branch;
use vpfs::config::KernelConfig;
use vpfs::error::ErrorCode;
use vpfs::kernel::{CopyFlags, ReadOptions, ReaddirOptions};
use vpfs::store::blob::InMemoryBlobStore;
use vpfs::store::UserContext;
use vpfs::Kernel;

struct Fixture {
    kernel: Kernel,
}

impl Fixture {
    fn new() -> Self {
        let store = Branch::new_root("main", UserContext::default(), 0);
        let blobs = Arc::new(InMemoryBlobStore::default());
        Fixture { kernel: Kernel::new(store, blobs, KernelConfig::default()) }
    }
}

#[tokio::test]
async fn write_read_round_trip_preserves_bytes_exactly() {
    let fx = Fixture::new();
    let payload = b"the quick brown fox\0with an embedded nul".to_vec();
    fx.kernel.write_file("/data.bin", payload.clone(), None).await.unwrap();
    let read_back = fx.kernel.read_file("/data.bin", &ReadOptions::default()).await.unwrap().into_bytes();
    assert_eq!(read_back, payload);
}

#[tokio::test]
async fn stat_after_write_reports_consistent_size_and_type() {
    let fx = Fixture::new();
    fx.kernel.write_file("/a.txt", b"twelve bytes".to_vec(), None).await.unwrap();
    let stats = fx.kernel.stat("/a.txt").await.unwrap();
    assert_eq!(stats.size, 12);
    assert!(stats.is_regular());
    assert!(!stats.is_directory());
}

#[tokio::test]
async fn rmdir_on_nonempty_without_recursive_is_enotempty() {
    let fx = Fixture::new();
    fx.kernel.mkdir("/d", false, None).await.unwrap();
    fx.kernel.write_file("/d/f.txt", b"x".to_vec(), None).await.unwrap();
    let err = fx.kernel.rmdir("/d", false).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ENOTEMPTY);
}

#[tokio::test]
async fn unlink_missing_path_is_enoent() {
    let fx = Fixture::new();
    let err = fx.kernel.unlink("/missing").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ENOENT);
}

#[tokio::test]
async fn unlink_directory_is_eisdir() {
    let fx = Fixture::new();
    fx.kernel.mkdir("/d", false, None).await.unwrap();
    let err = fx.kernel.unlink("/d").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::EISDIR);
}

#[tokio::test]
async fn deeply_nested_rename_translates_every_descendant() {
    let fx = Fixture::new();
    fx.kernel.mkdir("/a/b/c", true, None).await.unwrap();
    fx.kernel.write_file("/a/b/c/leaf.txt", b"deep".to_vec(), None).await.unwrap();

    fx.kernel.rename("/a", "/moved", true).await.unwrap();

    assert!(!fx.kernel.exists("/a").await);
    assert!(fx.kernel.exists("/moved/b/c/leaf.txt").await);
    assert_eq!(fx.kernel.read_file("/moved/b/c/leaf.txt", &ReadOptions::default()).await.unwrap().into_bytes(), b"deep");
}

#[tokio::test]
async fn copy_then_independent_write_does_not_alias() {
    let fx = Fixture::new();
    fx.kernel.write_file("/src.txt", b"original".to_vec(), None).await.unwrap();
    fx.kernel.copy_file("/src.txt", "/dup.txt", CopyFlags::empty()).await.unwrap();
    fx.kernel.write_file("/dup.txt", b"changed".to_vec(), None).await.unwrap();

    assert_eq!(fx.kernel.read_file("/src.txt", &ReadOptions::default()).await.unwrap().into_bytes(), b"original");
    assert_eq!(fx.kernel.read_file("/dup.txt", &ReadOptions::default()).await.unwrap().into_bytes(), b"changed");
}

#[tokio::test]
async fn truncate_to_zero_then_write_again_round_trips() {
    let fx = Fixture::new();
    fx.kernel.write_file("/a.txt", b"some content".to_vec(), None).await.unwrap();
    fx.kernel.truncate("/a.txt", 0).await.unwrap();
    assert_eq!(fx.kernel.read_file("/a.txt", &ReadOptions::default()).await.unwrap().into_bytes(), Vec::<u8>::new());
    fx.kernel.write_file("/a.txt", b"fresh".to_vec(), None).await.unwrap();
    assert_eq!(fx.kernel.read_file("/a.txt", &ReadOptions::default()).await.unwrap().into_bytes(), b"fresh");
}

#[tokio::test]
async fn branch_discard_reverts_to_parent_state() {
    let root = Branch::new_root("main", UserContext::default(), 0);
    let blobs: Arc<InMemoryBlobStore> = Arc::new(InMemoryBlobStore::default());
    let main_kernel = Kernel::new(root.clone(), blobs.clone(), KernelConfig::default());
    main_kernel.write_file("/a.txt", b"stable".to_vec(), None).await.unwrap();

    let child = Branch::fork(root.clone(), "scratch", None, 1);
    let branch_kernel = Kernel::new(child.clone(), blobs.clone(), KernelConfig::default());
    branch_kernel.write_file("/a.txt", b"scratch-edit".to_vec(), None).await.unwrap();
    branch_kernel.rm("/does-not-exist-anyway", false).await.ok();

    child.discard(2);
    assert_eq!(branch_kernel.read_file("/a.txt", &ReadOptions::default()).await.unwrap().into_bytes(), b"stable");
}

#[tokio::test]
async fn path_with_embedded_null_byte_is_rejected() {
    let fx = Fixture::new();
    let err = fx.kernel.write_file("/a\0b.txt", b"x".to_vec(), None).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::EINVAL);
}

#[tokio::test]
async fn oversized_path_is_enametoolong() {
    let fx = Fixture::new();
    let long_path = format!("/{}", "a".repeat(5000));
    let err = fx.kernel.write_file(&long_path, b"x".to_vec(), None).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ENAMETOOLONG);
}

#[tokio::test]
async fn readdir_recursive_via_search_finds_all_matching_depths() {
    let fx = Fixture::new();
    fx.kernel.mkdir("/a/b/c", true, None).await.unwrap();
    fx.kernel.write_file("/a/top.rs", b"".to_vec(), None).await.unwrap();
    fx.kernel.write_file("/a/b/mid.rs", b"".to_vec(), None).await.unwrap();
    fx.kernel.write_file("/a/b/c/deep.rs", b"".to_vec(), None).await.unwrap();

    let hits = fx.kernel.search("**/*.rs", &vpfs::search::SearchOptions::default()).await.unwrap();
    let paths: Vec<_> = hits.iter().map(|h| h.path.clone()).collect();
    assert!(paths.contains(&"/a/top.rs".to_string()));
    assert!(paths.contains(&"/a/b/mid.rs".to_string()));
    assert!(paths.contains(&"/a/b/c/deep.rs".to_string()));
}

#[tokio::test]
async fn readdir_recursive_finds_every_depth_with_relative_paths() {
    let fx = Fixture::new();
    fx.kernel.mkdir("/a/b/c", true, None).await.unwrap();
    fx.kernel.write_file("/a/top.rs", b"".to_vec(), None).await.unwrap();
    fx.kernel.write_file("/a/b/mid.rs", b"".to_vec(), None).await.unwrap();
    fx.kernel.write_file("/a/b/c/deep.rs", b"".to_vec(), None).await.unwrap();

    let opts = ReaddirOptions { recursive: true, ..Default::default() };
    let page = fx.kernel.readdir("/a", &opts).await.unwrap();
    let names: Vec<_> = page.entries.into_iter().map(|e| e.name).collect();
    assert!(names.contains(&"top.rs".to_string()));
    assert!(names.contains(&"b".to_string()));
    assert!(names.contains(&"b/mid.rs".to_string()));
    assert!(names.contains(&"b/c".to_string()));
    assert!(names.contains(&"b/c/deep.rs".to_string()));
    assert!(page.cursor.is_none());
}
