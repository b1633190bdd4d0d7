//! Harness configuration.
//!
//! Defaults are the reference run: 4 levels of 256 words, 8 randomized test
//! sets, and a 2048-byte transmit/receive buffer.

use std::path::Path;

use rdcoll_error::{CollectiveError, Result};
use rdcoll_types::{
    DEFAULT_BUFFER_LEN, DEFAULT_MAX_LEVEL, DEFAULT_NUM_ELEMENTS, PacketGeometry, PacketMetadata,
};
use serde::{Deserialize, Serialize};

use crate::failure::MAX_TRIALS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Payload width in 32-bit words.
    pub num_elements: usize,
    /// Highest level in a test set; each set carries `max_level + 1` packets.
    pub max_level: u8,
    pub num_test_sets: usize,
    pub collective_id: u16,
    pub collective_type: u8,
    /// Opaque operation code (5 = reduce-add on the reference device).
    pub operation: u8,
    /// Size of the reusable transmit/receive buffers.
    pub buffer_len: usize,
    /// Root seed; drawn from the wall clock when absent.
    pub seed: Option<u64>,
    /// Hex-dump every packet at `debug` level.
    pub debug_dump_packets: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            num_elements: DEFAULT_NUM_ELEMENTS,
            max_level: DEFAULT_MAX_LEVEL,
            num_test_sets: 8,
            collective_id: 0xABCD,
            collective_type: 0x01,
            operation: 0x05,
            buffer_len: DEFAULT_BUFFER_LEN,
            seed: None,
            debug_dump_packets: false,
        }
    }
}

impl HarnessConfig {
    /// Parse and validate a TOML document. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns `Config` on parse or validation failure.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|err| CollectiveError::config(format!("failed to parse TOML: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// # Errors
    ///
    /// Returns `Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        let geometry = PacketGeometry::new(self.num_elements)
            .map_err(|err| CollectiveError::config(err.to_string()))?;
        if self.buffer_len < geometry.total_len() {
            return Err(CollectiveError::config(format!(
                "buffer_len {} is smaller than packet length {}",
                self.buffer_len,
                geometry.total_len()
            )));
        }
        if self.num_test_sets == 0 {
            return Err(CollectiveError::config("num_test_sets must be at least 1"));
        }
        if self.num_test_sets > MAX_TRIALS {
            return Err(CollectiveError::config(format!(
                "num_test_sets {} exceeds {MAX_TRIALS}",
                self.num_test_sets
            )));
        }
        if self.max_level == u8::MAX {
            return Err(CollectiveError::config(
                "max_level 255 leaves no room for the response level",
            ));
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `Config` if `num_elements` is zero.
    pub fn geometry(&self) -> Result<PacketGeometry> {
        PacketGeometry::new(self.num_elements)
            .map_err(|err| CollectiveError::config(err.to_string()))
    }

    /// Level-0 header shared by every packet of a run.
    #[must_use]
    pub const fn base_metadata(&self) -> PacketMetadata {
        PacketMetadata::new(
            self.collective_id,
            self.collective_type,
            self.operation,
            self.max_level,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_reference_run() {
        let config = HarnessConfig::default();
        config.validate().unwrap();
        assert_eq!(config.geometry().unwrap().total_len(), 1032);
        assert_eq!(config.base_metadata().to_bytes(), [0xCD, 0xAB, 1, 5, 0, 0, 3, 0]);
    }

    #[test]
    fn test_toml_partial_override() {
        let config = HarnessConfig::from_toml_str(
            "num_elements = 16\nmax_level = 5\nseed = 42\nnum_test_sets = 3\n",
        )
        .unwrap();
        assert_eq!(config.num_elements, 16);
        assert_eq!(config.max_level, 5);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.buffer_len, 2048);
    }

    #[test]
    fn test_toml_unknown_key_rejected() {
        let err = HarnessConfig::from_toml_str("num_elemnts = 16\n").unwrap_err();
        assert!(matches!(err, CollectiveError::Config { .. }));
    }

    #[test]
    fn test_validate_rejects_small_buffer() {
        let config = HarnessConfig {
            buffer_len: 1031,
            ..HarnessConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("1032"), "{err}");
    }

    #[test]
    fn test_validate_rejects_degenerate_values() {
        for bad in [
            HarnessConfig {
                num_elements: 0,
                ..HarnessConfig::default()
            },
            HarnessConfig {
                num_test_sets: 0,
                ..HarnessConfig::default()
            },
            HarnessConfig {
                num_test_sets: MAX_TRIALS + 1,
                ..HarnessConfig::default()
            },
            HarnessConfig {
                max_level: u8::MAX,
                ..HarnessConfig::default()
            },
        ] {
            assert!(bad.validate().is_err(), "{bad:?}");
        }
    }
}
