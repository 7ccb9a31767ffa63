//! Metadata-mutating operations: `chmod`, `chown`, `utimes` and their
//! non-following (`l`-prefixed) variants.

use super::{now_millis, Kernel};
use crate::error::{ctor, KernelResult};
use crate::mode::{self, S_IFMT};
use crate::perm;
use crate::symlink;
use crate::validate;

/// A mode argument: either a literal numeric mode or a symbolic clause
/// string (`"u+x"`, `"go-w"`, `"a=rwx"`, comma-separated).
#[derive(Debug, Clone)]
pub enum ModeArg {
    Numeric(u32),
    Symbolic(String),
}

impl Kernel {
    async fn chmod_impl(&self, path: &str, arg: &ModeArg, follow: bool, syscall: &'static str) -> KernelResult<()> {
        let path = validate::validate_path(path, syscall)?;
        let entry = symlink::resolve(&*self.store, path, follow, self.config.max_symlink_depth, syscall)
            .await?
            .ok_or_else(|| ctor::enoent(syscall).with_path(path))?;
        perm::authorize_chmod(&*self.store, &entry, syscall, path).await?;

        let new_perm_bits = match arg {
            ModeArg::Numeric(m) => m & !S_IFMT,
            ModeArg::Symbolic(clauses) => {
                mode::apply_symbolic_mode(entry.mode, clauses, entry.is_directory())
                    .map_err(|_| ctor::einval(syscall).with_path(path))?
                    & !S_IFMT
            }
        };

        let mut updated = entry;
        updated.mode = (updated.mode & S_IFMT) | new_perm_bits;
        updated.ctime = now_millis();
        self.store.insert(updated).await;
        Ok(())
    }

    pub async fn chmod(&self, path: &str, arg: ModeArg) -> KernelResult<()> {
        self.chmod_impl(path, &arg, true, "chmod").await
    }

    pub async fn lchmod(&self, path: &str, arg: ModeArg) -> KernelResult<()> {
        self.chmod_impl(path, &arg, false, "lchmod").await
    }

    async fn chown_impl(
        &self,
        path: &str,
        uid: Option<u32>,
        gid: Option<u32>,
        follow: bool,
        syscall: &'static str,
    ) -> KernelResult<()> {
        let path = validate::validate_path(path, syscall)?;
        let entry = symlink::resolve(&*self.store, path, follow, self.config.max_symlink_depth, syscall)
            .await?
            .ok_or_else(|| ctor::enoent(syscall).with_path(path))?;
        perm::authorize_chown(&*self.store, &entry, uid, gid, syscall, path).await?;

        let mut updated = entry;
        if let Some(uid) = uid {
            updated.uid = uid;
        }
        if let Some(gid) = gid {
            updated.gid = gid;
        }
        updated.ctime = now_millis();
        self.store.insert(updated).await;
        Ok(())
    }

    pub async fn chown(&self, path: &str, uid: Option<u32>, gid: Option<u32>) -> KernelResult<()> {
        self.chown_impl(path, uid, gid, true, "chown").await
    }

    pub async fn lchown(&self, path: &str, uid: Option<u32>, gid: Option<u32>) -> KernelResult<()> {
        self.chown_impl(path, uid, gid, false, "lchown").await
    }

    /// Set `atime`/`mtime` explicitly; `ctime` always becomes now.
    pub async fn utimes(&self, path: &str, atime: Option<i64>, mtime: Option<i64>) -> KernelResult<()> {
        let path = validate::validate_path(path, "utimes")?;
        let entry = symlink::resolve(&*self.store, path, true, self.config.max_symlink_depth, "utimes")
            .await?
            .ok_or_else(|| ctor::enoent("utimes").with_path(path))?;

        let mut updated = entry;
        if let Some(a) = atime {
            updated.atime = a;
        }
        if let Some(m) = mtime {
            updated.mtime = m;
        }
        updated.ctime = now_millis();
        self.store.insert(updated).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::Branch;
    use crate::config::KernelConfig;
    use crate::store::blob::InMemoryBlobStore;
    use crate::store::UserContext;
    use std::sync::Arc;

    fn kernel() -> Kernel {
        let store = Branch::new_root("main", UserContext::default(), 0);
        Kernel::new(store, Arc::new(InMemoryBlobStore::default()), KernelConfig::default())
    }

    #[tokio::test]
    async fn chmod_numeric_preserves_type_bits() {
        let k = kernel();
        k.write_file("/a.txt", b"x".to_vec(), None).await.unwrap();
        k.chmod("/a.txt", ModeArg::Numeric(0o600)).await.unwrap();
        let stats = k.stat("/a.txt").await.unwrap();
        assert!(stats.is_regular());
        assert_eq!(stats.mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn chmod_symbolic_clause() {
        let k = kernel();
        k.write_file("/a.txt", b"x".to_vec(), None).await.unwrap();
        k.chmod("/a.txt", ModeArg::Symbolic("u+x".to_string())).await.unwrap();
        let stats = k.stat("/a.txt").await.unwrap();
        assert_eq!(stats.mode & 0o700, 0o744 & 0o700);
    }

    #[tokio::test]
    async fn chown_by_root_succeeds() {
        let k = kernel();
        k.write_file("/a.txt", b"x".to_vec(), None).await.unwrap();
        k.chown("/a.txt", Some(42), Some(7)).await.unwrap();
        let stats = k.stat("/a.txt").await.unwrap();
        assert_eq!(stats.uid, 42);
        assert_eq!(stats.gid, 7);
    }

    #[tokio::test]
    async fn utimes_sets_timestamps_and_touches_ctime() {
        let k = kernel();
        k.write_file("/a.txt", b"x".to_vec(), None).await.unwrap();
        k.utimes("/a.txt", Some(1000), Some(2000)).await.unwrap();
        let stats = k.stat("/a.txt").await.unwrap();
        assert_eq!(stats.atime, 1000);
        assert_eq!(stats.mtime, 2000);
    }
}
