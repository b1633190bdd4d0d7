//! Shared helpers for the harness integration tests.

#![allow(dead_code)]

use rdcoll_harness::ExchangeOutcome;
use rdcoll_harness::device::{CompletionOrder, DeviceFault, RecursiveDoublingDevice};
use rdcoll_harness::exchange::ExchangeDriver;
use rdcoll_harness::failure::FailureCause;
use rdcoll_harness::test_set::{TestSet, patterned_inputs};
use rdcoll_types::{DEFAULT_BUFFER_LEN, PacketGeometry, PacketMetadata};

pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn reference_metadata(max_level: u8) -> PacketMetadata {
    PacketMetadata::new(0xABCD, 0x01, 0x05, max_level)
}

/// The fixed four-packet set: `inputs[level][i] = level * 1000 + i + 1`.
pub fn patterned_set(geometry: PacketGeometry, send_order: Vec<u8>) -> TestSet {
    let num_levels = send_order.len();
    let max_level = u8::try_from(num_levels - 1).expect("level count fits in u8");
    TestSet::from_parts(
        0,
        reference_metadata(max_level),
        geometry,
        patterned_inputs(num_levels, geometry),
        send_order,
    )
    .expect("valid patterned test set")
}

pub fn run_against(
    set: &TestSet,
    order: CompletionOrder,
    faults: &[DeviceFault],
) -> Result<ExchangeOutcome, FailureCause> {
    let mut device = RecursiveDoublingDevice::new(set.geometry, order);
    for fault in faults {
        device = device.with_fault(fault.clone());
    }
    ExchangeDriver::new(device, DEFAULT_BUFFER_LEN).run(set)
}
