//! Packet geometry, metadata header, and payload vector.

use std::fmt;

use rdcoll_error::{CollectiveError, Result};
use serde::{Deserialize, Serialize};

/// Fixed metadata header size (bytes).
pub const METADATA_LEN: usize = 8;
/// Size of one payload element (bytes).
pub const BYTES_PER_ELEMENT: usize = 4;
/// Reference payload width.
pub const DEFAULT_NUM_ELEMENTS: usize = 256;
/// Reference maximum recursion level (levels `0..=3`).
pub const DEFAULT_MAX_LEVEL: u8 = 3;
/// Reference transmit/receive buffer size.
pub const DEFAULT_BUFFER_LEN: usize = 2048;

const METADATA_FIELDS: [&str; METADATA_LEN] = [
    "collective_id",
    "collective_id",
    "collective_type",
    "operation",
    "reserved",
    "reserved",
    "max_level",
    "current_level",
];

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Byte layout of a packet for a given payload width.
///
/// The payload length is `num_elements * 4` regardless of level, so one
/// geometry describes every packet of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PacketGeometry {
    num_elements: usize,
}

impl PacketGeometry {
    /// Geometry for `num_elements` payload words.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMetadata` if `num_elements` is zero or the byte length
    /// overflows `usize`.
    pub fn new(num_elements: usize) -> Result<Self> {
        if num_elements == 0 {
            return Err(CollectiveError::invalid_metadata(
                "packet geometry needs at least one payload element",
            ));
        }
        num_elements
            .checked_mul(BYTES_PER_ELEMENT)
            .and_then(|len| len.checked_add(METADATA_LEN))
            .ok_or_else(|| {
                CollectiveError::invalid_metadata(format!(
                    "payload of {num_elements} elements overflows usize"
                ))
            })?;
        Ok(Self { num_elements })
    }

    /// 256 elements, 1032 bytes total.
    #[must_use]
    pub const fn reference() -> Self {
        Self {
            num_elements: DEFAULT_NUM_ELEMENTS,
        }
    }

    #[must_use]
    pub const fn num_elements(self) -> usize {
        self.num_elements
    }

    #[must_use]
    pub const fn payload_len(self) -> usize {
        self.num_elements * BYTES_PER_ELEMENT
    }

    #[must_use]
    pub const fn total_len(self) -> usize {
        METADATA_LEN + self.payload_len()
    }

    /// Classify a byte offset within a packet of this geometry.
    ///
    /// Offsets past the end are reported as `Trailing`.
    #[must_use]
    pub fn region_of(self, offset: usize) -> PacketRegion {
        if offset < METADATA_LEN {
            PacketRegion::Metadata {
                field: METADATA_FIELDS[offset],
            }
        } else if offset < self.total_len() {
            let rel = offset - METADATA_LEN;
            PacketRegion::Payload {
                element_index: rel / BYTES_PER_ELEMENT,
                byte_in_element: rel % BYTES_PER_ELEMENT,
            }
        } else {
            PacketRegion::Trailing
        }
    }
}

impl Default for PacketGeometry {
    fn default() -> Self {
        Self::reference()
    }
}

/// Where a byte offset falls inside a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "region")]
pub enum PacketRegion {
    Metadata {
        field: &'static str,
    },
    Payload {
        element_index: usize,
        byte_in_element: usize,
    },
    Trailing,
}

impl fmt::Display for PacketRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metadata { field } => write!(f, "metadata byte ({field})"),
            Self::Payload {
                element_index,
                byte_in_element,
            } => write!(f, "element {element_index}, byte {byte_in_element}"),
            Self::Trailing => f.write_str("past end of packet"),
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// The 8-byte packet header.
///
/// Request packets satisfy `current_level <= max_level`. Device responses
/// carry `current_level = input level + 1` and may therefore exceed
/// `max_level` by one; decoding does not enforce the request invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PacketMetadata {
    pub collective_id: u16,
    pub collective_type: u8,
    pub operation: u8,
    pub reserved: [u8; 2],
    pub max_level: u8,
    pub current_level: u8,
}

impl PacketMetadata {
    /// Header for a run; `current_level` starts at 0 and `reserved` is zero.
    #[must_use]
    pub const fn new(
        collective_id: u16,
        collective_type: u8,
        operation: u8,
        max_level: u8,
    ) -> Self {
        Self {
            collective_id,
            collective_type,
            operation,
            reserved: [0; 2],
            max_level,
            current_level: 0,
        }
    }

    /// Same header with a different `current_level`.
    #[must_use]
    pub const fn with_level(self, current_level: u8) -> Self {
        Self {
            current_level,
            ..self
        }
    }

    /// Check the request-side invariants.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMetadata` if `current_level > max_level` or the
    /// reserved bytes are non-zero.
    pub fn validate_request(&self) -> Result<()> {
        if self.current_level > self.max_level {
            return Err(CollectiveError::invalid_metadata(format!(
                "current_level {} exceeds max_level {}",
                self.current_level, self.max_level
            )));
        }
        if self.reserved != [0; 2] {
            return Err(CollectiveError::invalid_metadata(format!(
                "reserved bytes must be zero, got {:02x?}",
                self.reserved
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; METADATA_LEN] {
        let id = self.collective_id.to_le_bytes();
        [
            id[0],
            id[1],
            self.collective_type,
            self.operation,
            self.reserved[0],
            self.reserved[1],
            self.max_level,
            self.current_level,
        ]
    }

    #[must_use]
    pub fn from_bytes(bytes: &[u8; METADATA_LEN]) -> Self {
        Self {
            collective_id: u16::from_le_bytes([bytes[0], bytes[1]]),
            collective_type: bytes[2],
            operation: bytes[3],
            reserved: [bytes[4], bytes[5]],
            max_level: bytes[6],
            current_level: bytes[7],
        }
    }

    /// Number of levels in a test set (`max_level + 1`).
    #[must_use]
    pub fn num_levels(&self) -> usize {
        usize::from(self.max_level) + 1
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Vector of 32-bit words carried after the header.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Payload(Vec<u32>);

impl Payload {
    #[must_use]
    pub const fn from_vec(elements: Vec<u32>) -> Self {
        Self(elements)
    }

    #[must_use]
    pub fn zeroed(num_elements: usize) -> Self {
        Self(vec![0; num_elements])
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Elementwise sum modulo 2^32.
    ///
    /// # Errors
    ///
    /// Returns `PayloadLength` when the operands differ in width.
    pub fn wrapping_add(&self, other: &Self) -> Result<Self> {
        if self.len() != other.len() {
            return Err(CollectiveError::PayloadLength {
                expected: self.len(),
                actual: other.len(),
            });
        }
        Ok(Self(
            self.0
                .iter()
                .zip(&other.0)
                .map(|(a, b)| a.wrapping_add(*b))
                .collect(),
        ))
    }
}

impl From<Vec<u32>> for Payload {
    fn from(elements: Vec<u32>) -> Self {
        Self(elements)
    }
}

impl AsRef<[u32]> for Payload {
    fn as_ref(&self) -> &[u32] {
        &self.0
    }
}

/// Decoded header plus payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub metadata: PacketMetadata,
    pub payload: Payload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_geometry_lengths() {
        let g = PacketGeometry::reference();
        assert_eq!(g.num_elements(), 256);
        assert_eq!(g.payload_len(), 1024);
        assert_eq!(g.total_len(), 1032);
    }

    #[test]
    fn test_geometry_rejects_zero_elements() {
        assert!(PacketGeometry::new(0).is_err());
        assert!(PacketGeometry::new(usize::MAX).is_err());
        assert_eq!(PacketGeometry::new(8).unwrap().total_len(), 40);
    }

    #[test]
    fn test_region_classification() {
        let g = PacketGeometry::reference();
        assert_eq!(
            g.region_of(7),
            PacketRegion::Metadata {
                field: "current_level"
            }
        );
        assert_eq!(
            g.region_of(8),
            PacketRegion::Payload {
                element_index: 0,
                byte_in_element: 0
            }
        );
        assert_eq!(
            g.region_of(8 + 4 * 17 + 2),
            PacketRegion::Payload {
                element_index: 17,
                byte_in_element: 2
            }
        );
        assert_eq!(g.region_of(1032), PacketRegion::Trailing);
    }

    #[test]
    fn test_metadata_layout_little_endian_id() {
        let meta = PacketMetadata::new(0xABCD, 0x01, 0x05, 3).with_level(2);
        assert_eq!(meta.to_bytes(), [0xCD, 0xAB, 0x01, 0x05, 0, 0, 3, 2]);
        assert_eq!(PacketMetadata::from_bytes(&meta.to_bytes()), meta);
    }

    #[test]
    fn test_validate_request_level_bound() {
        let meta = PacketMetadata::new(1, 1, 1, 3);
        assert!(meta.with_level(3).validate_request().is_ok());
        assert!(meta.with_level(4).validate_request().is_err());
        let mut dirty = meta;
        dirty.reserved = [0, 1];
        assert!(dirty.validate_request().is_err());
    }

    #[test]
    fn test_payload_wrapping_add_overflows_silently() {
        let a = Payload::from_vec(vec![u32::MAX, 1]);
        let b = Payload::from_vec(vec![2, 3]);
        assert_eq!(a.wrapping_add(&b).unwrap().as_slice(), &[1, 4]);
        assert!(a.wrapping_add(&Payload::zeroed(3)).is_err());
    }

    #[test]
    fn test_region_serializes_tagged() {
        let json = serde_json::to_string(&PacketRegion::Payload {
            element_index: 3,
            byte_in_element: 1,
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"region":"payload","element_index":3,"byte_in_element":1}"#
        );
    }
}
