//! The kernel's closed error taxonomy.
//!
//! Every fallible operation returns a [`KernelError`] drawn from this fixed
//! set of POSIX-flavored variants. Variants carry the syscall-ish name of the
//! operation that failed plus the path(s) involved, so a caller (or an RPC
//! adapter translating into wire form) can render a message shaped like
//! `ENOENT: no such file or directory, stat '/a/b'`.

use std::fmt;

/// Error code identifying which POSIX condition was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ENOENT,
    EPERM,
    EACCES,
    EBUSY,
    EEXIST,
    EXDEV,
    ENOTDIR,
    EISDIR,
    EINVAL,
    ENFILE,
    EMFILE,
    ENOSPC,
    EROFS,
    ENAMETOOLONG,
    ENOTEMPTY,
    ELOOP,
    EBADF,
}

impl ErrorCode {
    /// The conventional negative errno value for this code.
    pub fn errno(self) -> i32 {
        match self {
            ErrorCode::EPERM => -1,
            ErrorCode::ENOENT => -2,
            ErrorCode::EBADF => -9,
            ErrorCode::EACCES => -13,
            ErrorCode::EBUSY => -16,
            ErrorCode::EEXIST => -17,
            ErrorCode::EXDEV => -18,
            ErrorCode::ENOTDIR => -20,
            ErrorCode::EISDIR => -21,
            ErrorCode::EINVAL => -22,
            ErrorCode::ENFILE => -23,
            ErrorCode::EMFILE => -24,
            ErrorCode::ENOSPC => -28,
            ErrorCode::EROFS => -30,
            ErrorCode::ENAMETOOLONG => -36,
            ErrorCode::ENOTEMPTY => -39,
            ErrorCode::ELOOP => -40,
        }
    }

    /// The human-readable message POSIX conventionally associates with the code.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::ENOENT => "no such file or directory",
            ErrorCode::EPERM => "operation not permitted",
            ErrorCode::EACCES => "permission denied",
            ErrorCode::EBUSY => "resource busy or locked",
            ErrorCode::EEXIST => "file already exists",
            ErrorCode::EXDEV => "cross-device link not permitted",
            ErrorCode::ENOTDIR => "not a directory",
            ErrorCode::EISDIR => "illegal operation on a directory",
            ErrorCode::EINVAL => "invalid argument",
            ErrorCode::ENFILE => "file table overflow",
            ErrorCode::EMFILE => "too many open files",
            ErrorCode::ENOSPC => "no space left on device",
            ErrorCode::EROFS => "read-only file system",
            ErrorCode::ENAMETOOLONG => "name too long",
            ErrorCode::ENOTEMPTY => "directory not empty",
            ErrorCode::ELOOP => "too many symbolic links encountered",
            ErrorCode::EBADF => "bad file descriptor",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A kernel-level failure: a code plus the syscall-like context it occurred in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelError {
    pub code: ErrorCode,
    pub syscall: &'static str,
    pub path: Option<String>,
    pub dest: Option<String>,
}

impl KernelError {
    pub fn new(code: ErrorCode, syscall: &'static str) -> Self {
        KernelError { code, syscall, path: None, dest: None }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    pub fn errno(&self) -> i32 {
        self.code.errno()
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.code.message())?;
        if !self.syscall.is_empty() {
            write!(f, ", {}", self.syscall)?;
            if let Some(path) = &self.path {
                write!(f, " '{path}'")?;
                if let Some(dest) = &self.dest {
                    write!(f, " -> '{dest}'")?;
                }
            }
        }
        Ok(())
    }
}

impl std::error::Error for KernelError {}

/// Shorthand constructors used throughout the kernel operations.
macro_rules! err_ctor {
    ($name:ident, $code:ident) => {
        pub fn $name(syscall: &'static str) -> KernelError {
            KernelError::new(ErrorCode::$code, syscall)
        }
    };
}

#[allow(non_snake_case)]
pub mod ctor {
    use super::{ErrorCode, KernelError};

    err_ctor!(enoent, ENOENT);
    err_ctor!(eperm, EPERM);
    err_ctor!(eacces, EACCES);
    err_ctor!(ebusy, EBUSY);
    err_ctor!(eexist, EEXIST);
    err_ctor!(exdev, EXDEV);
    err_ctor!(enotdir, ENOTDIR);
    err_ctor!(eisdir, EISDIR);
    err_ctor!(einval, EINVAL);
    err_ctor!(enfile, ENFILE);
    err_ctor!(emfile, EMFILE);
    err_ctor!(enospc, ENOSPC);
    err_ctor!(erofs, EROFS);
    err_ctor!(enametoolong, ENAMETOOLONG);
    err_ctor!(enotempty, ENOTEMPTY);
    err_ctor!(eloop_, ELOOP);
    err_ctor!(ebadf, EBADF);
}

pub type KernelResult<T> = Result<T, KernelError>;
