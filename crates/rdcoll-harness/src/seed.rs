//! Seed taxonomy for reproducible runs.
//!
//! One logged root seed fans out into purpose-specific streams via
//! `H(root || purpose_tag || scope_id)` with `H = xxh3_64`:
//!
//! - **harness**: input vectors and Fisher–Yates send orders.
//! - **device**: completion order of the simulated device.

use std::time::{SystemTime, UNIX_EPOCH};

use xxhash_rust::xxh3::xxh3_64;

/// Purpose-specific stream split off the root seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeedStream {
    Harness,
    Device,
}

impl SeedStream {
    const fn tag(self) -> &'static [u8] {
        match self {
            Self::Harness => b"harness",
            Self::Device => b"device",
        }
    }

    /// `xxh3_64(root_le || tag || scope_id)`.
    fn seed(self, root_seed: u64, scope_id: &str) -> u64 {
        let tag = self.tag();
        let mut material = Vec::with_capacity(8 + tag.len() + scope_id.len());
        material.extend_from_slice(&root_seed.to_le_bytes());
        material.extend_from_slice(tag);
        material.extend_from_slice(scope_id.as_bytes());
        xxh3_64(&material)
    }
}

/// Root seed plus the streams derived from it for one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedTaxonomy {
    /// Logged seed; replaying it reproduces the whole run.
    pub root: u64,
    /// Drives input vectors and send orders.
    pub harness: u64,
    /// Drives the simulated device's completion order.
    pub device: u64,
}

impl SeedTaxonomy {
    #[must_use]
    pub fn derive(root_seed: u64, scope_id: &str) -> Self {
        Self {
            root: root_seed,
            harness: SeedStream::Harness.seed(root_seed, scope_id),
            device: SeedStream::Device.seed(root_seed, scope_id),
        }
    }
}

/// Root seed from the wall clock, for runs without a configured seed.
#[must_use]
pub fn wall_clock_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    xxh3_64(&nanos.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_taxonomy_derivation_deterministic() {
        let a = SeedTaxonomy::derive(0xDEAD_BEEF, "rdcoll");
        let b = SeedTaxonomy::derive(0xDEAD_BEEF, "rdcoll");
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_taxonomy_streams_distinct() {
        let t = SeedTaxonomy::derive(42, "rdcoll");
        assert_ne!(t.harness, t.device);
        assert_ne!(t.harness, t.root);
        assert_ne!(t.device, t.root);
    }

    #[test]
    fn test_seed_stream_hashes_root_tag_and_scope() {
        let mut material = 7u64.to_le_bytes().to_vec();
        material.extend_from_slice(b"device");
        material.extend_from_slice(b"rdcoll");
        assert_eq!(SeedTaxonomy::derive(7, "rdcoll").device, xxh3_64(&material));
    }

    #[test]
    fn test_seed_taxonomy_scope_and_root_sensitive() {
        let a = SeedTaxonomy::derive(1, "scope_a");
        assert_ne!(a.harness, SeedTaxonomy::derive(1, "scope_b").harness);
        assert_ne!(a.device, SeedTaxonomy::derive(2, "scope_a").device);
    }
}
