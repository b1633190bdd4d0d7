//! Response verifier.
//!
//! For each received frame, in order:
//! 1. exact length check (`LengthMismatch`),
//! 2. decode and recover the input level from `current_level - 1`
//!    (`LevelOutOfRange`),
//! 3. duplicate check against the per-set [`SeenLevels`] (`DuplicateLevel`),
//! 4. render the expected response: sent header with the observed level,
//!    payload from the expected-output table,
//! 5. byte-exact comparison, reporting the first differing byte
//!    (`ContentMismatch`).

use rdcoll_error::{CollectiveError, Result};
use rdcoll_types::{
    BYTES_PER_ELEMENT, METADATA_LEN, PacketGeometry, PacketMetadata, PacketRegion, codec,
};
use tracing::debug;

use crate::failure::{ByteMismatch, FailureKind};
use crate::reference::ExpectedOutputTable;

/// Input levels already answered within one test set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenLevels {
    seen: Vec<bool>,
    count: usize,
}

impl SeenLevels {
    #[must_use]
    pub fn new(num_levels: usize) -> Self {
        Self {
            seen: vec![false; num_levels],
            count: 0,
        }
    }

    /// Mark `level`; returns `false` if it was already marked or is out of
    /// range.
    pub fn mark(&mut self, level: u8) -> bool {
        match self.seen.get_mut(usize::from(level)) {
            Some(slot) if !*slot => {
                *slot = true;
                self.count += 1;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn contains(&self, level: u8) -> bool {
        self.seen.get(usize::from(level)).copied().unwrap_or(false)
    }

    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.count == self.seen.len()
    }

    #[must_use]
    pub fn missing(&self) -> Vec<u8> {
        self.seen
            .iter()
            .enumerate()
            .filter(|(_, seen)| !**seen)
            .map(|(level, _)| level as u8)
            .collect()
    }
}

/// First differing byte of `actual` against `expected`, with its region.
#[must_use]
pub fn first_mismatch(
    expected: &[u8],
    actual: &[u8],
    geometry: PacketGeometry,
) -> Option<ByteMismatch> {
    let offset = expected
        .iter()
        .zip(actual)
        .position(|(e, a)| e != a)?;
    let region = geometry.region_of(offset);
    let (expected_element, actual_element) = match region {
        PacketRegion::Payload { element_index, .. } => {
            let start = METADATA_LEN + element_index * BYTES_PER_ELEMENT;
            (word_at(expected, start), word_at(actual, start))
        }
        _ => (None, None),
    };
    Some(ByteMismatch {
        offset,
        region,
        expected_byte: expected[offset],
        actual_byte: actual[offset],
        expected_element,
        actual_element,
    })
}

fn word_at(bytes: &[u8], start: usize) -> Option<u32> {
    let chunk = bytes.get(start..start + BYTES_PER_ELEMENT)?;
    Some(u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
}

/// `LengthMismatch` for a frame of the wrong size, naming the response level
/// when the frame still carries a full header.
#[must_use]
pub fn length_mismatch(expected: usize, frame: &[u8]) -> FailureKind {
    FailureKind::LengthMismatch {
        expected,
        actual: frame.len(),
        observed_level: frame.get(METADATA_LEN - 1).copied(),
    }
}

/// Checks responses of one test set against its expected-output table.
#[derive(Debug)]
pub struct ResponseVerifier<'t> {
    table: &'t ExpectedOutputTable,
    sent: PacketMetadata,
    geometry: PacketGeometry,
    expected_buf: Vec<u8>,
}

impl<'t> ResponseVerifier<'t> {
    /// `sent` is the header used for the set's requests; its
    /// `current_level` is ignored.
    #[must_use]
    pub fn new(
        table: &'t ExpectedOutputTable,
        sent: PacketMetadata,
        geometry: PacketGeometry,
    ) -> Self {
        Self {
            table,
            sent,
            geometry,
            expected_buf: vec![0; geometry.total_len()],
        }
    }

    /// Verify one received frame and return the input level it answers.
    ///
    /// Marks the level in `seen` before the content comparison, so a later
    /// duplicate is rejected even if this response was wrong.
    pub fn verify(
        &mut self,
        received: &[u8],
        seen: &mut SeenLevels,
    ) -> std::result::Result<u8, FailureKind> {
        let total = self.geometry.total_len();
        if received.len() != total {
            return Err(length_mismatch(total, received));
        }
        let packet = codec::decode(received, self.geometry)
            .map_err(|_| length_mismatch(total, received))?;

        let observed = packet.metadata.current_level;
        let max_response_level = self.sent.max_level.saturating_add(1);
        let level = match observed.checked_sub(1) {
            Some(level) if level <= self.sent.max_level => level,
            _ => {
                return Err(FailureKind::LevelOutOfRange {
                    observed,
                    max_response_level,
                });
            }
        };

        if !seen.mark(level) {
            return Err(FailureKind::DuplicateLevel { level });
        }

        if self.render_expected(observed, level).is_err() {
            return Err(FailureKind::LevelOutOfRange {
                observed,
                max_response_level,
            });
        }
        if let Some(mismatch) = first_mismatch(&self.expected_buf, received, self.geometry) {
            return Err(FailureKind::ContentMismatch { level, mismatch });
        }

        debug!(level, observed, "response verified");
        Ok(level)
    }

    fn render_expected(&mut self, observed: u8, level: u8) -> Result<()> {
        let Some(payload) = self.table.get(level) else {
            return Err(CollectiveError::invalid_metadata(format!(
                "no expected output for level {level}"
            )));
        };
        codec::encode_into(
            &self.sent.with_level(observed),
            payload,
            self.geometry,
            &mut self.expected_buf,
        )?;
        Ok(())
    }
}
