//! External collaborator seams: the NIC and the host-completion signal.

use tracing::{error, info};

/// Link-layer primitives of the network interface driving the device.
///
/// `recv` blocks until one frame is available, writes it into `buf`, and
/// returns its length. A length `<= 0` means error or timeout. A returned
/// length larger than `buf` means the frame did not fit.
pub trait Nic {
    /// Best-effort transmit of one frame.
    fn send(&mut self, frame: &[u8]);

    fn recv(&mut self, buf: &mut [u8]) -> isize;

    fn mac_address(&self) -> u64 {
        0
    }
}

impl<N: Nic + ?Sized> Nic for &mut N {
    fn send(&mut self, frame: &[u8]) {
        (**self).send(frame);
    }

    fn recv(&mut self, buf: &mut [u8]) -> isize {
        (**self).recv(buf)
    }

    fn mac_address(&self) -> u64 {
        (**self).mac_address()
    }
}

/// Final verdict handed to the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Pass,
    Fail { code: u64 },
}

impl CompletionStatus {
    /// `tohost` encoding: `1` on pass, `(code << 1) | 1` on failure, with a
    /// zero code replaced by `0xFF` so a failure never reads as a pass.
    #[must_use]
    pub const fn tohost_value(self) -> u64 {
        match self {
            Self::Pass => 1,
            Self::Fail { code } => {
                let code = if code == 0 { 0xFF } else { code };
                (code << 1) | 1
            }
        }
    }

    /// Inverse of [`tohost_value`](Self::tohost_value); `None` for values
    /// without the low completion bit.
    #[must_use]
    pub const fn from_tohost(value: u64) -> Option<Self> {
        if value & 1 == 0 {
            return None;
        }
        match value >> 1 {
            0 => Some(Self::Pass),
            code => Some(Self::Fail { code }),
        }
    }

    #[must_use]
    pub const fn is_pass(self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Receives the single pass/fail signal at the end of a run.
pub trait HostCompletion {
    fn complete(&mut self, status: CompletionStatus);
}

/// In-process stand-in for the memory-mapped `tohost` word.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TohostRegister {
    value: Option<u64>,
}

impl TohostRegister {
    #[must_use]
    pub const fn new() -> Self {
        Self { value: None }
    }

    /// Raw register contents, `None` until completion is signalled.
    #[must_use]
    pub const fn value(&self) -> Option<u64> {
        self.value
    }

    #[must_use]
    pub fn status(&self) -> Option<CompletionStatus> {
        self.value.and_then(CompletionStatus::from_tohost)
    }
}

impl HostCompletion for TohostRegister {
    fn complete(&mut self, status: CompletionStatus) {
        let value = status.tohost_value();
        match status {
            CompletionStatus::Pass => info!(tohost = value, "signalling simulation success"),
            CompletionStatus::Fail { code } => {
                error!(code, tohost = value, "signalling simulation failure");
            }
        }
        self.value = Some(value);
    }
}
