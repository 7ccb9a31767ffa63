//! Input validation run on every raw path before normalization or any lookup.
//!
//! Validation rejects the path on character and length grounds; it never
//! consults the metadata store. Operations call [`validate_path`] first, so
//! a malformed argument never reaches the point of touching state.

use crate::error::{ctor, KernelError};

pub const MAX_PATH_LEN: usize = 4096;
pub const MAX_NAME_LEN: usize = 255;

const FORBIDDEN_CODEPOINTS: [char; 5] = ['\u{0000}', '\u{202E}', '\u{2028}', '\u{2029}', '\u{FFFD}'];

/// Validate a raw path argument for `syscall`. Returns the same string back
/// on success so callers can chain into normalization.
pub fn validate_path<'a>(path: &'a str, syscall: &'static str) -> Result<&'a str, KernelError> {
    if path.trim().is_empty() {
        return Err(ctor::einval(syscall).with_path(path));
    }
    if path.len() > MAX_PATH_LEN {
        return Err(ctor::enametoolong(syscall).with_path(path));
    }
    for segment in path.split('/') {
        if segment.len() > MAX_NAME_LEN {
            return Err(ctor::enametoolong(syscall).with_path(path));
        }
    }
    if path.contains("%00") {
        return Err(ctor::einval(syscall).with_path(path));
    }
    for ch in path.chars() {
        if (ch as u32) < 0x20 || ch as u32 == 0x7F {
            return Err(ctor::einval(syscall).with_path(path));
        }
        if FORBIDDEN_CODEPOINTS.contains(&ch) {
            return Err(ctor::einval(syscall).with_path(path));
        }
    }
    Ok(path)
}

/// Validate a path argument that is required to stand alone (not resolve
/// through intermediate components), rejecting bare `.`/`..`.
pub fn validate_standalone_path<'a>(path: &'a str, syscall: &'static str) -> Result<&'a str, KernelError> {
    let validated = validate_path(path, syscall)?;
    let trimmed = validated.trim();
    if trimmed == "." || trimmed == ".." {
        return Err(ctor::einval(syscall).with_path(path));
    }
    Ok(validated)
}

/// Validate a single path segment (used for names passed to `mkdir`,
/// `symlink` targets' final component, etc).
pub fn validate_name(name: &str, syscall: &'static str) -> Result<(), KernelError> {
    if name.is_empty() {
        return Err(ctor::einval(syscall).with_path(name));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ctor::enametoolong(syscall).with_path(name));
    }
    if name == "." || name == ".." || name.contains('/') {
        return Err(ctor::einval(syscall).with_path(name));
    }
    for ch in name.chars() {
        if (ch as u32) < 0x20 || ch as u32 == 0x7F || FORBIDDEN_CODEPOINTS.contains(&ch) {
            return Err(ctor::einval(syscall).with_path(name));
        }
    }
    Ok(())
}
