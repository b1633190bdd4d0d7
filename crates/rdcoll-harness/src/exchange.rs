//! Exchange driver: transmit every level of a test set, then collect one
//! response per level in whatever order the device completes them.
//!
//! Send and receive are strictly separate phases. No acknowledgement is
//! awaited between sends, and a non-positive receive length is fatal; there
//! is no retry, timeout, or backoff.

use rdcoll_error::CollectiveError;
use rdcoll_types::{METADATA_LEN, codec};
use serde::{Deserialize, Serialize};
use tracing::{Level, debug, enabled};

use crate::dump::{element_dump, hex_dump};
use crate::failure::{FailureCause, FailureKind};
use crate::nic::Nic;
use crate::test_set::TestSet;
use crate::verifier::{ResponseVerifier, SeenLevels};

/// Orders observed during one exchange, by input level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeOutcome {
    pub send_order: Vec<u8>,
    pub receive_order: Vec<u8>,
}

#[derive(Debug)]
pub struct ExchangeDriver<N: Nic> {
    nic: N,
    tx_buf: Vec<u8>,
    rx_buf: Vec<u8>,
    dump_packets: bool,
}

impl<N: Nic> ExchangeDriver<N> {
    /// Driver with reusable transmit/receive buffers of `buffer_len` bytes.
    pub fn new(nic: N, buffer_len: usize) -> Self {
        Self {
            nic,
            tx_buf: vec![0; buffer_len],
            rx_buf: vec![0; buffer_len],
            dump_packets: false,
        }
    }

    #[must_use]
    pub fn with_packet_dumps(mut self, enabled: bool) -> Self {
        self.dump_packets = enabled;
        self
    }

    pub fn nic(&self) -> &N {
        &self.nic
    }

    /// Run one test set to completion.
    ///
    /// # Errors
    ///
    /// Returns the first verification failure, or an internal error if the
    /// buffers cannot hold a packet.
    pub fn run(&mut self, test_set: &TestSet) -> Result<ExchangeOutcome, FailureCause> {
        let geometry = test_set.geometry;
        let total = geometry.total_len();
        if self.rx_buf.len() < total {
            return Err(CollectiveError::BufferTooSmall {
                needed: total,
                available: self.rx_buf.len(),
            }
            .into());
        }

        for &level in &test_set.send_order {
            let meta = test_set.metadata.with_level(level);
            meta.validate_request()?;
            let n = codec::encode_into(
                &meta,
                &test_set.inputs[usize::from(level)],
                geometry,
                &mut self.tx_buf,
            )?;
            if self.dump_packets && enabled!(Level::DEBUG) {
                debug!("{}", hex_dump(&format!("TX level {level}"), &self.tx_buf[..n]));
            }
            self.nic.send(&self.tx_buf[..n]);
            debug!(trial = test_set.index, level, len = n, "packet sent");
        }

        let mut verifier = ResponseVerifier::new(&test_set.table, test_set.metadata, geometry);
        let mut seen = SeenLevels::new(test_set.num_levels());
        let mut receive_order = Vec::with_capacity(test_set.num_levels());
        while !seen.is_complete() {
            self.rx_buf.fill(0);
            let length = self.nic.recv(&mut self.rx_buf);
            if length <= 0 {
                debug!(
                    trial = test_set.index,
                    length,
                    missing = ?seen.missing(),
                    "receive failed"
                );
                return Err(FailureKind::Transport { length }.into());
            }
            let n = length.unsigned_abs();
            if n > self.rx_buf.len() {
                return Err(FailureKind::LengthMismatch {
                    expected: total,
                    actual: n,
                    observed_level: self.rx_buf.get(METADATA_LEN - 1).copied(),
                }
                .into());
            }
            let frame = &self.rx_buf[..n];
            if self.dump_packets && enabled!(Level::DEBUG) {
                debug!("{}", hex_dump("RX", frame));
                if let Ok(packet) = codec::decode(frame, geometry) {
                    debug!("{}", element_dump("RX payload", packet.payload.as_slice()));
                }
            }
            let level = verifier.verify(frame, &mut seen)?;
            debug!(trial = test_set.index, level, "response accepted");
            receive_order.push(level);
        }

        Ok(ExchangeOutcome {
            send_order: test_set.send_order.clone(),
            receive_order,
        })
    }
}
