//! One randomized trial: per-level inputs, a send order, and the expected
//! output table derived from the inputs.

use rand::{Rng, RngCore};
use rdcoll_error::{CollectiveError, Result};
use rdcoll_types::{PacketGeometry, PacketMetadata, Payload};

use crate::reference::ExpectedOutputTable;

/// Unbiased in-place Fisher–Yates shuffle.
pub fn fisher_yates_shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// Uniformly random permutation of `0..num_levels`.
pub fn random_level_order<R: Rng + ?Sized>(num_levels: usize, rng: &mut R) -> Vec<u8> {
    let mut order: Vec<u8> = (0..num_levels).map(|level| level as u8).collect();
    fisher_yates_shuffle(&mut order, rng);
    order
}

/// Independent random input vector per level.
pub fn random_inputs<R: RngCore + ?Sized>(
    num_levels: usize,
    geometry: PacketGeometry,
    rng: &mut R,
) -> Vec<Payload> {
    (0..num_levels)
        .map(|_| {
            Payload::from_vec(
                (0..geometry.num_elements())
                    .map(|_| rng.next_u32())
                    .collect(),
            )
        })
        .collect()
}

/// Deterministic `level * 1000 + index + 1` inputs used by the fixed
/// four-packet scenario.
#[must_use]
pub fn patterned_inputs(num_levels: usize, geometry: PacketGeometry) -> Vec<Payload> {
    (0..num_levels)
        .map(|level| {
            Payload::from_vec(
                (0..geometry.num_elements())
                    .map(|i| (level * 1000 + i + 1) as u32)
                    .collect(),
            )
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct TestSet {
    pub index: usize,
    pub geometry: PacketGeometry,
    /// Header shared by every packet; `current_level` is set per send.
    pub metadata: PacketMetadata,
    pub inputs: Vec<Payload>,
    /// Permutation of `0..=max_level` in transmit order.
    pub send_order: Vec<u8>,
    pub table: ExpectedOutputTable,
}

impl TestSet {
    /// Draw inputs and a send order from `rng`, then build the table.
    ///
    /// # Errors
    ///
    /// Propagates table construction failures.
    pub fn generate<R: Rng + ?Sized>(
        index: usize,
        metadata: PacketMetadata,
        geometry: PacketGeometry,
        rng: &mut R,
    ) -> Result<Self> {
        let num_levels = metadata.num_levels();
        let inputs = random_inputs(num_levels, geometry, rng);
        let send_order = random_level_order(num_levels, rng);
        Self::from_parts(index, metadata, geometry, inputs, send_order)
    }

    /// Assemble a test set from explicit inputs and send order.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the input count or send order does not cover
    /// exactly `0..=max_level`, and `PayloadLength` if an input has the wrong
    /// width.
    pub fn from_parts(
        index: usize,
        metadata: PacketMetadata,
        geometry: PacketGeometry,
        inputs: Vec<Payload>,
        send_order: Vec<u8>,
    ) -> Result<Self> {
        let num_levels = metadata.num_levels();
        if inputs.len() != num_levels {
            return Err(CollectiveError::config(format!(
                "test set {index} has {} input vectors for {num_levels} levels",
                inputs.len()
            )));
        }
        if let Some(bad) = inputs
            .iter()
            .find(|input| input.len() != geometry.num_elements())
        {
            return Err(CollectiveError::PayloadLength {
                expected: geometry.num_elements(),
                actual: bad.len(),
            });
        }
        let mut covered = vec![false; num_levels];
        for &level in &send_order {
            match covered.get_mut(usize::from(level)) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(CollectiveError::config(format!(
                        "send order {send_order:?} is not a permutation of 0..{num_levels}"
                    )));
                }
            }
        }
        if send_order.len() != num_levels {
            return Err(CollectiveError::config(format!(
                "send order {send_order:?} is not a permutation of 0..{num_levels}"
            )));
        }

        let table = ExpectedOutputTable::build(&inputs)?;
        Ok(Self {
            index,
            geometry,
            metadata: metadata.with_level(0),
            inputs,
            send_order,
            table,
        })
    }

    #[must_use]
    pub fn num_levels(&self) -> usize {
        self.inputs.len()
    }
}
