//! A virtual POSIX filesystem kernel.
//!
//! Path-based operations (`write_file`, `read_file`, `stat`, `mkdir`,
//! `rename`, `symlink`, `search`, …) over a pluggable metadata store and
//! content-addressed blob store, with a copy-on-write branch overlay on
//! top. None of it touches a host filesystem — the metadata and blob
//! stores are the only state.
//!
//! The [`kernel::Kernel`] struct is the entry point: bind it to a
//! [`store::MetadataStore`] (a [`branch::Branch`] makes a good default,
//! since a root branch with no parent behaves as a plain store) and a
//! [`store::blob::BlobStore`], then call its operations.

pub mod branch;
pub mod config;
pub mod entry;
pub mod error;
pub mod kernel;
pub mod mode;
pub mod path;
pub mod perm;
pub mod search;
pub mod store;
pub mod symlink;
pub mod validate;

pub use entry::{Dirent, Entry, Stats};
pub use error::{ErrorCode, KernelError, KernelResult};
pub use kernel::{
    CopyFlags, Encoding, Kernel, ModeArg, ReadOptions, ReadOutput, ReaddirEntry, ReaddirOptions, ReaddirPage,
};
