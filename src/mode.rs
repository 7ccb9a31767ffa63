//! POSIX mode bits, file-type classification, and access-test constants.

use bitflags::bitflags;

/// Mask selecting the file-type bits out of a 16-bit mode word.
pub const S_IFMT: u32 = 0o170000;

pub const S_IFSOCK: u32 = 0o140000;
pub const S_IFLNK: u32 = 0o120000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFBLK: u32 = 0o060000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFCHR: u32 = 0o020000;
pub const S_IFIFO: u32 = 0o010000;

pub const S_ISUID: u32 = 0o4000;
pub const S_ISGID: u32 = 0o2000;
pub const S_ISVTX: u32 = 0o1000;

pub const S_IRUSR: u32 = 0o400;
pub const S_IWUSR: u32 = 0o200;
pub const S_IXUSR: u32 = 0o100;
pub const S_IRGRP: u32 = 0o040;
pub const S_IWGRP: u32 = 0o020;
pub const S_IXGRP: u32 = 0o010;
pub const S_IROTH: u32 = 0o004;
pub const S_IWOTH: u32 = 0o002;
pub const S_IXOTH: u32 = 0o001;

/// Default mode applied to a newly created regular file.
pub const DEFAULT_FILE_MODE: u32 = 0o644;
/// Default mode applied to a newly created directory.
pub const DEFAULT_DIR_MODE: u32 = 0o755;
/// Default mode applied to a newly created symlink (POSIX: ignored by most
/// operations, but reported as `0o777` by convention).
pub const DEFAULT_SYMLINK_MODE: u32 = 0o777 | S_IFLNK;

/// The classification of a filesystem entry, derived from `mode & S_IFMT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Regular,
    Directory,
    Symlink,
    BlockDevice,
    CharDevice,
    Fifo,
    Socket,
}

impl Kind {
    pub fn type_bits(self) -> u32 {
        match self {
            Kind::Regular => S_IFREG,
            Kind::Directory => S_IFDIR,
            Kind::Symlink => S_IFLNK,
            Kind::BlockDevice => S_IFBLK,
            Kind::CharDevice => S_IFCHR,
            Kind::Fifo => S_IFIFO,
            Kind::Socket => S_IFSOCK,
        }
    }

    pub fn from_mode(mode: u32) -> Option<Kind> {
        match mode & S_IFMT {
            S_IFREG => Some(Kind::Regular),
            S_IFDIR => Some(Kind::Directory),
            S_IFLNK => Some(Kind::Symlink),
            S_IFBLK => Some(Kind::BlockDevice),
            S_IFCHR => Some(Kind::CharDevice),
            S_IFIFO => Some(Kind::Fifo),
            S_IFSOCK => Some(Kind::Socket),
            _ => None,
        }
    }

    pub fn char(self) -> char {
        match self {
            Kind::Regular => '-',
            Kind::Directory => 'd',
            Kind::Symlink => 'l',
            Kind::BlockDevice => 'b',
            Kind::CharDevice => 'c',
            Kind::Fifo => 'p',
            Kind::Socket => 's',
        }
    }
}

/// Which class of owner a permission check applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermClass {
    Owner,
    Group,
    Other,
}

/// Test whether `mode` grants `bit` (one of `R_OK`/`W_OK`/`X_OK`) to `class`.
pub fn has_perm(mode: u32, class: PermClass, bit: AccessMask) -> bool {
    let shift = match class {
        PermClass::Owner => 6,
        PermClass::Group => 3,
        PermClass::Other => 0,
    };
    let want = match bit {
        AccessMask::R_OK => 0o4,
        AccessMask::W_OK => 0o2,
        AccessMask::X_OK => 0o1,
        AccessMask::F_OK => return true,
    };
    (mode >> shift) & want == want
}

bitflags! {
    /// `access(2)`-style test bits. `F_OK` is existence-only and is not a
    /// real permission bit; it is represented as zero so combining it with
    /// anything is a no-op.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessMaskBits: u32 {
        const R_OK = 0b100;
        const W_OK = 0b010;
        const X_OK = 0b001;
    }
}

/// A single requested access bit, kept as a plain enum for callers that want
/// to iterate bits one at a time (the permission checker reports the first
/// failing bit, per the kernel's access() contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum AccessMask {
    F_OK,
    R_OK,
    W_OK,
    X_OK,
}

impl AccessMask {
    /// Decompose a combined `AccessMaskBits` request into individual bits to
    /// test, in a stable order.
    pub fn bits_to_check(bits: AccessMaskBits) -> Vec<AccessMask> {
        let mut out = Vec::new();
        if bits.contains(AccessMaskBits::R_OK) {
            out.push(AccessMask::R_OK);
        }
        if bits.contains(AccessMaskBits::W_OK) {
            out.push(AccessMask::W_OK);
        }
        if bits.contains(AccessMaskBits::X_OK) {
            out.push(AccessMask::X_OK);
        }
        if out.is_empty() {
            out.push(AccessMask::F_OK);
        }
        out
    }
}

/// Render the nine permission characters (`rwxr-xr-x`-style), including
/// setuid/setgid/sticky substitutions (`s`/`S`, `s`/`S`, `t`/`T`).
pub fn mode_to_string(mode: u32) -> String {
    let mut out = String::with_capacity(10);
    let kind = Kind::from_mode(mode).map(Kind::char).unwrap_or('?');
    out.push(kind);

    let triplet = |r: bool, w: bool, x: bool, special: bool, lower: char, upper: char| -> String {
        let mut s = String::with_capacity(3);
        s.push(if r { 'r' } else { '-' });
        s.push(if w { 'w' } else { '-' });
        s.push(if special {
            if x { lower } else { upper }
        } else if x {
            'x'
        } else {
            '-'
        });
        s
    };

    out.push_str(&triplet(
        mode & S_IRUSR != 0,
        mode & S_IWUSR != 0,
        mode & S_IXUSR != 0,
        mode & S_ISUID != 0,
        's',
        'S',
    ));
    out.push_str(&triplet(
        mode & S_IRGRP != 0,
        mode & S_IWGRP != 0,
        mode & S_IXGRP != 0,
        mode & S_ISGID != 0,
        's',
        'S',
    ));
    out.push_str(&triplet(
        mode & S_IROTH != 0,
        mode & S_IWOTH != 0,
        mode & S_IXOTH != 0,
        mode & S_ISVTX != 0,
        't',
        'T',
    ));
    out
}

/// The single character POSIX `ls -l` uses for this mode's file type.
pub fn kind_char(mode: u32) -> char {
    Kind::from_mode(mode).map(Kind::char).unwrap_or('?')
}

pub fn is_regular(mode: u32) -> bool {
    mode & S_IFMT == S_IFREG
}
pub fn is_directory(mode: u32) -> bool {
    mode & S_IFMT == S_IFDIR
}
pub fn is_symlink(mode: u32) -> bool {
    mode & S_IFMT == S_IFLNK
}

/// Apply a symbolic mode clause (`u+x`, `go-w`, `a=r`, comma-separated) to an
/// existing mode, preserving file-type bits. `X` sets execute only if the
/// target is a directory or already has any execute bit set.
pub fn apply_symbolic_mode(mode: u32, clauses: &str, is_dir: bool) -> Result<u32, ()> {
    let mut result = mode;
    let had_any_exec = mode & (S_IXUSR | S_IXGRP | S_IXOTH) != 0;

    for clause in clauses.split(',') {
        let clause = clause.trim();
        if clause.is_empty() {
            return Err(());
        }
        let op_pos = clause.find(['+', '-', '=']).ok_or(())?;
        let who = &clause[..op_pos];
        let op = clause.as_bytes()[op_pos] as char;
        let perms = &clause[op_pos + 1..];

        let who = if who.is_empty() { "a" } else { who };
        let mut classes = Vec::new();
        for c in who.chars() {
            match c {
                'u' => classes.push(PermClass::Owner),
                'g' => classes.push(PermClass::Group),
                'o' => classes.push(PermClass::Other),
                'a' => {
                    classes.push(PermClass::Owner);
                    classes.push(PermClass::Group);
                    classes.push(PermClass::Other);
                }
                _ => return Err(()),
            }
        }

        let mut r = false;
        let mut w = false;
        let mut x = false;
        let mut s = false;
        let mut t = false;
        for c in perms.chars() {
            match c {
                'r' => r = true,
                'w' => w = true,
                'x' => x = true,
                'X' => {
                    if is_dir || had_any_exec {
                        x = true;
                    }
                }
                's' => s = true,
                't' => t = true,
                _ => return Err(()),
            }
        }

        for class in &classes {
            let (rb, wb, xb) = match class {
                PermClass::Owner => (S_IRUSR, S_IWUSR, S_IXUSR),
                PermClass::Group => (S_IRGRP, S_IWGRP, S_IXGRP),
                PermClass::Other => (S_IROTH, S_IWOTH, S_IXOTH),
            };
            let mut want = 0u32;
            if r {
                want |= rb;
            }
            if w {
                want |= wb;
            }
            if x {
                want |= xb;
            }
            let special = match class {
                PermClass::Owner => S_ISUID,
                PermClass::Group => S_ISGID,
                PermClass::Other => 0,
            };
            match op {
                '+' => {
                    result |= want;
                    if s {
                        result |= special;
                    }
                    if t && matches!(class, PermClass::Other) {
                        result |= S_ISVTX;
                    }
                }
                '-' => {
                    result &= !want;
                    if s {
                        result &= !special;
                    }
                    if t && matches!(class, PermClass::Other) {
                        result &= !S_ISVTX;
                    }
                }
                '=' => {
                    result &= !(rb | wb | xb);
                    result |= want;
                }
                _ => return Err(()),
            }
        }
    }
    Ok(result)
}
