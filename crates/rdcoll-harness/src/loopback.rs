//! Single-packet loopback check against a packet-modifier device.
//!
//! Sends `01 02 .. 20` (32 bytes, zero-padded buffer) and expects the same
//! bytes back with byte 0 inverted. Failure codes: 3 transport, 4 length,
//! 5 content.

use thiserror::Error;
use tracing::{debug, info};

use crate::dump::hex_dump;
use crate::nic::{CompletionStatus, HostCompletion, Nic};

pub const LOOPBACK_PACKET_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoopbackFailure {
    #[error("receive returned non-positive length {length}")]
    Transport { length: isize },

    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("mismatch at byte {offset}: expected {expected:#04x}, got {actual:#04x}")]
    ContentMismatch { offset: usize, expected: u8, actual: u8 },
}

impl LoopbackFailure {
    #[must_use]
    pub const fn code(&self) -> u64 {
        match self {
            Self::Transport { .. } => 3,
            Self::LengthMismatch { .. } => 4,
            Self::ContentMismatch { .. } => 5,
        }
    }
}

/// Transmit the test pattern and verify the modified echo.
///
/// # Errors
///
/// Returns the first check that failed.
pub fn run_loopback_check<N: Nic + ?Sized>(
    nic: &mut N,
    buffer_len: usize,
) -> Result<(), LoopbackFailure> {
    let buffer_len = buffer_len.max(LOOPBACK_PACKET_LEN);
    let mut tx_buf = vec![0u8; buffer_len];
    let mut rx_buf = vec![0u8; buffer_len];
    for (i, byte) in tx_buf[..LOOPBACK_PACKET_LEN].iter_mut().enumerate() {
        *byte = (i + 1) as u8;
    }

    let mut expected = tx_buf[..LOOPBACK_PACKET_LEN].to_vec();
    expected[0] = !tx_buf[0];

    info!(mac = format_args!("{:012x}", nic.mac_address()), "starting loopback check");
    debug!("{}", hex_dump("Original TX data", &tx_buf[..LOOPBACK_PACKET_LEN]));
    nic.send(&tx_buf[..LOOPBACK_PACKET_LEN]);

    let length = nic.recv(&mut rx_buf);
    if length <= 0 {
        return Err(LoopbackFailure::Transport { length });
    }
    let actual_len = length.unsigned_abs();
    if actual_len != LOOPBACK_PACKET_LEN {
        return Err(LoopbackFailure::LengthMismatch {
            expected: LOOPBACK_PACKET_LEN,
            actual: actual_len,
        });
    }
    debug!("{}", hex_dump("Actual RX data", &rx_buf[..actual_len]));

    if let Some(offset) = expected
        .iter()
        .zip(&rx_buf[..actual_len])
        .position(|(e, a)| e != a)
    {
        return Err(LoopbackFailure::ContentMismatch {
            offset,
            expected: expected[offset],
            actual: rx_buf[offset],
        });
    }
    info!("loopback check passed");
    Ok(())
}

/// Run the check and signal its verdict to `host`.
pub fn run_and_signal<N: Nic + ?Sized, H: HostCompletion + ?Sized>(
    nic: &mut N,
    buffer_len: usize,
    host: &mut H,
) -> CompletionStatus {
    let status = match run_loopback_check(nic, buffer_len) {
        Ok(()) => CompletionStatus::Pass,
        Err(failure) => {
            tracing::error!(code = failure.code(), "loopback check failed: {failure}");
            CompletionStatus::Fail {
                code: failure.code(),
            }
        }
    };
    host.complete(status);
    status
}
