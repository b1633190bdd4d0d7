//! In-process device models implementing [`Nic`].
//!
//! [`RecursiveDoublingDevice`] is a conformant reference device: it buffers
//! each level's input, answers level `k` once levels `0..=k` have arrived
//! (so its accumulation does not depend on send order), and completes
//! responses in a configurable order. [`DeviceFault`]s turn it into a
//! misbehaving device for negative testing.
//!
//! [`PacketModifierDevice`] is the loopback model: echo with byte 0 inverted.

use std::collections::VecDeque;
use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rdcoll_types::{PacketGeometry, PacketMetadata, Payload, codec};
use tracing::{debug, warn};

use crate::nic::Nic;

/// Order in which pending responses are handed back by `recv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOrder {
    /// Oldest completion first.
    Fifo,
    /// Uniformly random pending completion, from a seeded generator.
    Seeded(u64),
    /// Input levels in the given order, restarting each round. Falls back to
    /// the oldest completion when the scripted level is not pending.
    Scripted(Vec<u8>),
}

/// Misbehaviour injected into a device's responses for one input level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFault {
    /// Emit the response twice.
    DuplicateResponse { level: u8 },
    /// Emit the response one byte short.
    TruncateResponse { level: u8 },
    /// Flip `bit` of the response byte at `byte_offset`.
    FlipBit { level: u8, byte_offset: usize, bit: u8 },
    /// Never emit the response.
    DropResponse { level: u8 },
    /// Echo the input level instead of incrementing it.
    SkipLevelIncrement { level: u8 },
}

impl DeviceFault {
    const fn level(&self) -> u8 {
        match self {
            Self::DuplicateResponse { level }
            | Self::TruncateResponse { level }
            | Self::FlipBit { level, .. }
            | Self::DropResponse { level }
            | Self::SkipLevelIncrement { level } => *level,
        }
    }
}

impl fmt::Display for DeviceFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateResponse { level } => write!(f, "DuplicateResponse(level={level})"),
            Self::TruncateResponse { level } => write!(f, "TruncateResponse(level={level})"),
            Self::FlipBit {
                level,
                byte_offset,
                bit,
            } => write!(f, "FlipBit(level={level}, byte={byte_offset}, bit={bit})"),
            Self::DropResponse { level } => write!(f, "DropResponse(level={level})"),
            Self::SkipLevelIncrement { level } => write!(f, "SkipLevelIncrement(level={level})"),
        }
    }
}

#[derive(Debug)]
struct Completion {
    input_level: u8,
    frame: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Recursive-doubling device
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct RecursiveDoublingDevice {
    geometry: PacketGeometry,
    order: CompletionOrder,
    rng: StdRng,
    faults: Vec<DeviceFault>,
    /// Inputs of the current round, indexed by level.
    inputs: Vec<Option<(PacketMetadata, Payload)>>,
    /// Accumulated outputs already computed this round (a prefix of levels).
    sums: Vec<Payload>,
    pending: VecDeque<Completion>,
    script_cursor: usize,
    rejected_frames: u64,
    rounds_completed: u64,
}

impl RecursiveDoublingDevice {
    #[must_use]
    pub fn new(geometry: PacketGeometry, order: CompletionOrder) -> Self {
        let seed = match &order {
            CompletionOrder::Seeded(seed) => *seed,
            _ => 0,
        };
        Self {
            geometry,
            order,
            rng: StdRng::seed_from_u64(seed),
            faults: Vec::new(),
            inputs: Vec::new(),
            sums: Vec::new(),
            pending: VecDeque::new(),
            script_cursor: 0,
            rejected_frames: 0,
            rounds_completed: 0,
        }
    }

    #[must_use]
    pub fn with_fault(mut self, fault: DeviceFault) -> Self {
        self.faults.push(fault);
        self
    }

    /// Frames the device could not parse and silently dropped.
    #[must_use]
    pub const fn rejected_frames(&self) -> u64 {
        self.rejected_frames
    }

    #[must_use]
    pub const fn rounds_completed(&self) -> u64 {
        self.rounds_completed
    }

    #[must_use]
    pub fn pending_responses(&self) -> usize {
        self.pending.len()
    }

    fn has_fault(&self, level: u8, pred: impl Fn(&DeviceFault) -> bool) -> bool {
        self.faults.iter().any(|f| f.level() == level && pred(f))
    }

    fn accept(&mut self, frame: &[u8]) {
        let packet = match codec::decode(frame, self.geometry) {
            Ok(packet) => packet,
            Err(err) => {
                warn!(error = %err, len = frame.len(), "device dropped malformed frame");
                self.rejected_frames += 1;
                return;
            }
        };
        let meta = packet.metadata;
        if meta.current_level > meta.max_level {
            warn!(
                level = meta.current_level,
                max_level = meta.max_level,
                "device dropped frame with out-of-range level"
            );
            self.rejected_frames += 1;
            return;
        }

        let num_levels = meta.num_levels();
        if self.inputs.len() != num_levels {
            self.start_round(num_levels);
        }
        let level = usize::from(meta.current_level);
        if self.inputs[level].is_some() {
            // A repeated level starts a fresh collective round.
            self.start_round(num_levels);
        }
        self.inputs[level] = Some((meta, packet.payload));
        self.advance();
    }

    fn start_round(&mut self, num_levels: usize) {
        self.inputs = vec![None; num_levels];
        self.sums.clear();
        self.script_cursor = 0;
    }

    /// Compute every newly ready level: level `k` is ready once `0..=k` are
    /// all present.
    fn advance(&mut self) {
        while self.sums.len() < self.inputs.len() {
            let level = self.sums.len();
            let Some((meta, input)) = self.inputs[level].clone() else {
                break;
            };
            let sum = match self.sums.last() {
                None => input,
                Some(prev) => match input.wrapping_add(prev) {
                    Ok(sum) => sum,
                    Err(err) => {
                        warn!(error = %err, level, "device width mismatch");
                        return;
                    }
                },
            };
            self.emit(meta, level as u8, &sum);
            self.sums.push(sum);
        }
        if self.sums.len() == self.inputs.len() {
            self.rounds_completed += 1;
            self.inputs.clear();
            self.sums.clear();
        }
    }

    fn emit(&mut self, meta: PacketMetadata, level: u8, sum: &Payload) {
        if self.has_fault(level, |f| matches!(f, DeviceFault::DropResponse { .. })) {
            debug!(level, "device dropping response");
            return;
        }
        let out_level = if self.has_fault(level, |f| {
            matches!(f, DeviceFault::SkipLevelIncrement { .. })
        }) {
            level
        } else {
            level.wrapping_add(1)
        };
        let mut frame = vec![0u8; self.geometry.total_len()];
        let response_meta = meta.with_level(out_level);
        if let Err(err) = codec::encode_into(&response_meta, sum, self.geometry, &mut frame) {
            warn!(error = %err, level, "device failed to encode response");
            return;
        }

        for fault in &self.faults {
            match *fault {
                DeviceFault::FlipBit {
                    level: l,
                    byte_offset,
                    bit,
                } if l == level => {
                    if let Some(byte) = frame.get_mut(byte_offset) {
                        *byte ^= 1 << (bit % 8);
                    }
                }
                DeviceFault::TruncateResponse { level: l } if l == level => {
                    frame.pop();
                }
                _ => {}
            }
        }

        let copies = if self.has_fault(level, |f| {
            matches!(f, DeviceFault::DuplicateResponse { .. })
        }) {
            2
        } else {
            1
        };
        for _ in 0..copies {
            self.pending.push_back(Completion {
                input_level: level,
                frame: frame.clone(),
            });
        }
        debug!(level, out_level, pending = self.pending.len(), "device completed level");
    }

    fn next_completion(&mut self) -> Option<Completion> {
        if self.pending.is_empty() {
            return None;
        }
        let index = match &self.order {
            CompletionOrder::Fifo => 0,
            CompletionOrder::Seeded(_) => self.rng.gen_range(0..self.pending.len()),
            CompletionOrder::Scripted(script) => {
                let wanted = if script.is_empty() {
                    None
                } else {
                    script.get(self.script_cursor % script.len()).copied()
                };
                self.script_cursor += 1;
                wanted
                    .and_then(|level| self.pending.iter().position(|c| c.input_level == level))
                    .unwrap_or(0)
            }
        };
        self.pending.remove(index)
    }
}

impl Nic for RecursiveDoublingDevice {
    fn send(&mut self, frame: &[u8]) {
        self.accept(frame);
    }

    fn recv(&mut self, buf: &mut [u8]) -> isize {
        let Some(completion) = self.next_completion() else {
            return -1;
        };
        let n = completion.frame.len().min(buf.len());
        buf[..n].copy_from_slice(&completion.frame[..n]);
        isize::try_from(completion.frame.len()).unwrap_or(isize::MAX)
    }

    fn mac_address(&self) -> u64 {
        0x0012_6d00_0002
    }
}

// ---------------------------------------------------------------------------
// Loopback packet modifier
// ---------------------------------------------------------------------------

/// Echoes every frame with its first byte inverted.
#[derive(Debug, Default)]
pub struct PacketModifierDevice {
    pending: VecDeque<Vec<u8>>,
}

impl PacketModifierDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Nic for PacketModifierDevice {
    fn send(&mut self, frame: &[u8]) {
        let mut echo = frame.to_vec();
        if let Some(first) = echo.first_mut() {
            *first = !*first;
        }
        self.pending.push_back(echo);
    }

    fn recv(&mut self, buf: &mut [u8]) -> isize {
        let Some(frame) = self.pending.pop_front() else {
            return -1;
        };
        let n = frame.len().min(buf.len());
        buf[..n].copy_from_slice(&frame[..n]);
        isize::try_from(frame.len()).unwrap_or(isize::MAX)
    }

    fn mac_address(&self) -> u64 {
        0x0012_6d00_0001
    }
}
