//! Reference accumulator: expected device output per level.
//!
//! `out[0] = in[0]` and `out[k] = in[k] .+ out[k-1]` (wrapping u32 adds).
//! The table is built once per test set from the pre-generated inputs and
//! never consults anything received from the device, so it is independent
//! of response arrival order.

use std::fmt::Write as _;

use rdcoll_error::{CollectiveError, Result};
use rdcoll_types::Payload;
use sha2::{Digest, Sha256};

/// Expected output for `level`, computed from `inputs[0..=level]`.
///
/// # Errors
///
/// Returns `InvalidMetadata` when fewer than `level + 1` inputs are given and
/// `PayloadLength` when input widths differ.
pub fn expected_output(level: usize, inputs: &[Payload]) -> Result<Payload> {
    let Some(first) = inputs.first() else {
        return Err(no_input(level));
    };
    if level >= inputs.len() {
        return Err(no_input(level));
    }
    let mut acc = first.clone();
    for input in &inputs[1..=level] {
        acc = input.wrapping_add(&acc)?;
    }
    Ok(acc)
}

fn no_input(level: usize) -> CollectiveError {
    CollectiveError::invalid_metadata(format!("no input vector for level {level}"))
}

/// Expected outputs for every level of one test set. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedOutputTable {
    entries: Vec<Payload>,
}

impl ExpectedOutputTable {
    /// Build the whole chain iteratively, one add per level.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMetadata` for an empty input list and `PayloadLength`
    /// when input widths differ.
    pub fn build(inputs: &[Payload]) -> Result<Self> {
        let Some(first) = inputs.first() else {
            return Err(no_input(0));
        };
        let mut entries = Vec::with_capacity(inputs.len());
        entries.push(first.clone());
        for input in &inputs[1..] {
            let next = input.wrapping_add(&entries[entries.len() - 1])?;
            entries.push(next);
        }
        Ok(Self { entries })
    }

    #[must_use]
    pub fn get(&self, level: u8) -> Option<&Payload> {
        self.entries.get(usize::from(level))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hex SHA-256 over every entry's words (LE), in level order.
    #[must_use]
    pub fn sha256_hex(&self) -> String {
        let mut hasher = Sha256::new();
        for entry in &self.entries {
            for word in entry.as_slice() {
                hasher.update(word.to_le_bytes());
            }
        }
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        hex
    }
}
