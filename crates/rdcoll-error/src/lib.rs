//! Error type shared by every `rdcoll` crate.
//!
//! Verification verdicts (duplicate levels, content mismatches, ...) are not
//! errors in this sense; they live in `rdcoll_harness::failure` as a closed
//! failure taxonomy. This crate covers codec, configuration, and I/O faults.

use thiserror::Error;

/// Primary error type for codec, configuration, and journal operations.
#[derive(Debug, Error)]
pub enum CollectiveError {
    /// Input is shorter than a full packet.
    #[error("malformed packet: expected at least {expected} bytes, got {actual}")]
    MalformedPacket { expected: usize, actual: usize },

    /// A payload with the wrong number of elements was handed to the encoder.
    #[error("payload length mismatch: expected {expected} elements, got {actual}")]
    PayloadLength { expected: usize, actual: usize },

    /// Header fields violate a packet invariant.
    #[error("invalid packet metadata: {detail}")]
    InvalidMetadata { detail: String },

    /// A transmit or receive buffer cannot hold a full packet.
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// Harness configuration rejected by validation or parsing.
    #[error("invalid configuration: {detail}")]
    Config { detail: String },

    /// Journal serialization failure.
    #[error("json error: {detail}")]
    Json { detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollectiveError {
    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config {
            detail: detail.into(),
        }
    }

    pub fn invalid_metadata(detail: impl Into<String>) -> Self {
        Self::InvalidMetadata {
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CollectiveError>;
