//! Failure taxonomy and host-completion detail codes.
//!
//! Every failure is terminal for the run. A [`HarnessFailure`] names the
//! trial it happened in and maps onto a single integer detail code:
//!
//! ```text
//!  detail_code = (family << 20) | trial_index
//! ```

use std::fmt;

use rdcoll_error::CollectiveError;
use rdcoll_types::PacketRegion;
use serde::Serialize;
use thiserror::Error;

/// Bits reserved for the trial index in a detail code.
pub const TRIAL_INDEX_BITS: u32 = 20;
/// Exclusive upper bound on trial indices that fit in a detail code.
pub const MAX_TRIALS: usize = 1 << TRIAL_INDEX_BITS;

/// First differing byte between an expected and a received packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ByteMismatch {
    pub offset: usize,
    pub region: PacketRegion,
    pub expected_byte: u8,
    pub actual_byte: u8,
    /// Whole words around the byte, present for payload mismatches.
    pub expected_element: Option<u32>,
    pub actual_element: Option<u32>,
}

impl fmt::Display for ByteMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "byte {} ({}): expected {:#04x}, got {:#04x}",
            self.offset, self.region, self.expected_byte, self.actual_byte
        )?;
        if let (Some(expected), Some(actual)) = (self.expected_element, self.actual_element) {
            write!(f, "; element expected {expected:#010x}, got {actual:#010x}")?;
        }
        Ok(())
    }
}

/// Why a single response (or receive call) was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FailureKind {
    /// Receive primitive returned a non-positive length.
    #[error("transport error: receive returned length {length}")]
    Transport { length: isize },

    /// Wrong total size. `observed_level` is the header's `current_level`
    /// when the frame is long enough to carry one.
    #[error(
        "length mismatch: expected {expected} bytes, got {actual}{}",
        .observed_level.map_or_else(String::new, observed_level_note)
    )]
    LengthMismatch {
        expected: usize,
        actual: usize,
        observed_level: Option<u8>,
    },

    /// Response level does not correspond to any input level of the set.
    #[error("response level {observed} outside 1..={max_response_level}")]
    LevelOutOfRange {
        observed: u8,
        max_response_level: u8,
    },

    /// A second response for an input level already answered in this set.
    #[error("duplicate response for input level {level}")]
    DuplicateLevel { level: u8 },

    #[error("content mismatch for input level {level}: {mismatch}")]
    ContentMismatch { level: u8, mismatch: ByteMismatch },
}

impl FailureKind {
    #[must_use]
    pub const fn family(&self) -> FailureFamily {
        match self {
            Self::Transport { .. } => FailureFamily::Transport,
            Self::LengthMismatch { .. } => FailureFamily::LengthMismatch,
            Self::ContentMismatch { .. } => FailureFamily::ContentMismatch,
            Self::DuplicateLevel { .. } => FailureFamily::DuplicateLevel,
            Self::LevelOutOfRange { .. } => FailureFamily::LevelOutOfRange,
        }
    }

    /// Input level the failure is attributed to, when known.
    #[must_use]
    pub const fn level(&self) -> Option<u8> {
        match self {
            Self::DuplicateLevel { level } | Self::ContentMismatch { level, .. } => Some(*level),
            Self::LengthMismatch {
                observed_level: Some(observed),
                ..
            } => observed.checked_sub(1),
            _ => None,
        }
    }
}

fn observed_level_note(level: u8) -> String {
    format!(" (response level {level})")
}

/// Failure from either the device or local setup.
#[derive(Debug, Error)]
pub enum FailureCause {
    #[error(transparent)]
    Verification(#[from] FailureKind),

    #[error("harness error: {0}")]
    Internal(#[from] CollectiveError),
}

impl FailureCause {
    #[must_use]
    pub const fn family(&self) -> FailureFamily {
        match self {
            Self::Verification(kind) => kind.family(),
            Self::Internal(_) => FailureFamily::Internal,
        }
    }
}

/// Numeric code family, allocated by failure phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u64)]
pub enum FailureFamily {
    Transport = 1,
    LengthMismatch = 2,
    ContentMismatch = 3,
    DuplicateLevel = 4,
    LevelOutOfRange = 5,
    Internal = 6,
}

impl FailureFamily {
    #[must_use]
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(Self::Transport),
            2 => Some(Self::LengthMismatch),
            3 => Some(Self::ContentMismatch),
            4 => Some(Self::DuplicateLevel),
            5 => Some(Self::LevelOutOfRange),
            6 => Some(Self::Internal),
            _ => None,
        }
    }
}

/// A detail code split back into its family and trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureCode {
    pub family: FailureFamily,
    pub trial: usize,
}

impl FailureCode {
    #[must_use]
    pub const fn encode(self) -> u64 {
        ((self.family as u64) << TRIAL_INDEX_BITS) | (self.trial as u64 & (MAX_TRIALS as u64 - 1))
    }

    #[must_use]
    pub const fn decode(code: u64) -> Option<Self> {
        match FailureFamily::from_code(code >> TRIAL_INDEX_BITS) {
            Some(family) => Some(Self {
                family,
                trial: (code & (MAX_TRIALS as u64 - 1)) as usize,
            }),
            None => None,
        }
    }
}

/// Run-level failure: which trial, and what went wrong.
#[derive(Debug, Error)]
#[error("trial {trial} failed: {cause}")]
pub struct HarnessFailure {
    pub trial: usize,
    #[source]
    pub cause: FailureCause,
}

impl HarnessFailure {
    pub fn new(trial: usize, cause: impl Into<FailureCause>) -> Self {
        Self {
            trial,
            cause: cause.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> FailureCode {
        FailureCode {
            family: self.cause.family(),
            trial: self.trial,
        }
    }

    /// Integer handed to the host-completion collaborator.
    #[must_use]
    pub const fn detail_code(&self) -> u64 {
        self.code().encode()
    }

    #[must_use]
    pub const fn kind(&self) -> Option<&FailureKind> {
        match &self.cause {
            FailureCause::Verification(kind) => Some(kind),
            FailureCause::Internal(_) => None,
        }
    }
}
