//! Layered configuration for the kernel's implementation-defined tunables.
//!
//! The operation contracts leave several values open (symlink depth cap,
//! blob tiering thresholds, glob cache sizing); [`KernelConfig`] carries
//! sensible defaults and an optional TOML override, mirroring how the
//! surrounding binary configures itself. Entry ownership is deliberately not
//! among these tunables: it comes from the bound [`crate::store::MetadataStore`]'s
//! [`crate::store::UserContext`], the kernel's one source of acting-identity.

use serde::Deserialize;

/// Tunables governing kernel behavior beyond the fixed operation contracts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Maximum symlink chain length before `ELOOP`.
    pub max_symlink_depth: u32,
    /// Whether `atime` is updated on reads (disabled by default, matching
    /// the common `relatime`-off posture of the backing stores this kernel
    /// targets).
    pub track_atime: bool,
    /// Blob sizes at or above this many bytes are tiered `warm` on write.
    pub warm_tier_bytes: u64,
    /// Blob sizes at or above this many bytes are tiered `cold` on write.
    pub cold_tier_bytes: u64,
    /// Cap on cached compiled glob patterns held by the search engine.
    pub glob_cache_capacity: u64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        KernelConfig {
            max_symlink_depth: 40,
            track_atime: false,
            warm_tier_bytes: 1 << 20,
            cold_tier_bytes: 1 << 30,
            glob_cache_capacity: 512,
        }
    }
}

impl KernelConfig {
    /// Parse a TOML document, falling back to defaults for unset fields.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}
