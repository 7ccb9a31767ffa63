//! The inode-like [`Entry`] record and its read-only projections.

use crate::mode::{self, Kind};

/// Milliseconds since the Unix epoch.
pub type Millis = i64;

/// One filesystem object, addressed by its own absolute normalized path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: u64,
    pub path: String,
    pub kind: Kind,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub blob_ref: Option<String>,
    pub link_target: Option<String>,
    pub nlink: u32,
    pub atime: Millis,
    pub mtime: Millis,
    pub ctime: Millis,
    pub birthtime: Millis,
}

impl Entry {
    pub fn name(&self) -> &str {
        if self.path == "/" {
            return "";
        }
        match self.path.rfind('/') {
            Some(i) => &self.path[i + 1..],
            None => &self.path,
        }
    }

    pub fn parent_path(&self) -> Option<String> {
        if self.path == "/" {
            return None;
        }
        Some(crate::path::dirname(&self.path))
    }

    pub fn is_directory(&self) -> bool {
        self.kind == Kind::Directory
    }

    pub fn is_regular(&self) -> bool {
        self.kind == Kind::Regular
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == Kind::Symlink
    }

    pub fn to_stats(&self) -> Stats {
        Stats {
            kind: self.kind,
            mode: self.mode,
            uid: self.uid,
            gid: self.gid,
            size: self.size,
            nlink: self.nlink,
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
            birthtime: self.birthtime,
        }
    }

    pub fn to_dirent(&self) -> Dirent {
        Dirent {
            name: self.name().to_string(),
            parent_path: self.parent_path().unwrap_or_else(|| "/".to_string()),
            kind: self.kind,
        }
    }
}

/// A read-only snapshot of an entry's POSIX-visible attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub kind: Kind,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub nlink: u32,
    pub atime: Millis,
    pub mtime: Millis,
    pub ctime: Millis,
    pub birthtime: Millis,
}

impl Stats {
    pub fn is_regular(&self) -> bool {
        self.kind == Kind::Regular
    }
    pub fn is_directory(&self) -> bool {
        self.kind == Kind::Directory
    }
    pub fn is_symlink(&self) -> bool {
        self.kind == Kind::Symlink
    }
    pub fn mode_string(&self) -> String {
        mode::mode_to_string(self.mode)
    }
}

/// A lightweight directory entry, as returned by `readdir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dirent {
    pub name: String,
    pub parent_path: String,
    pub kind: Kind,
}

impl Dirent {
    pub fn path(&self) -> String {
        if self.parent_path == "/" {
            format!("/{}", self.name)
        } else {
            format!("{}/{}", self.parent_path, self.name)
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == Kind::Directory
    }
    pub fn is_regular(&self) -> bool {
        self.kind == Kind::Regular
    }
    pub fn is_symlink(&self) -> bool {
        self.kind == Kind::Symlink
    }
}
