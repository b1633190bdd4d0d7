//! Reference model and out-of-order verifier for a hardware
//! recursive-doubling reduction collective.
//!
//! A run is a sequence of test sets. Each set draws one random input vector
//! per level, sends every level in a shuffled order, and checks every
//! response against an expected-output table built before any packet is
//! sent. Responses may arrive in any order; each level must arrive exactly
//! once with the exact expected bytes.
//!
//! The NIC and the host-completion signal are traits ([`Nic`],
//! [`HostCompletion`]) so the same orchestration drives the in-process
//! [`RecursiveDoublingDevice`] model and real transports.

pub mod config;
pub mod device;
pub mod dump;
pub mod exchange;
pub mod failure;
pub mod journal;
pub mod loopback;
pub mod nic;
pub mod orchestrator;
pub mod reference;
pub mod report;
pub mod seed;
pub mod test_set;
pub mod verifier;

pub use config::HarnessConfig;
pub use device::{CompletionOrder, DeviceFault, PacketModifierDevice, RecursiveDoublingDevice};
pub use exchange::{ExchangeDriver, ExchangeOutcome};
pub use failure::{
    ByteMismatch, FailureCause, FailureCode, FailureFamily, FailureKind, HarnessFailure,
};
pub use journal::{RunJournal, RunStatus};
pub use loopback::{LoopbackFailure, run_loopback_check};
pub use nic::{CompletionStatus, HostCompletion, Nic, TohostRegister};
pub use orchestrator::{Orchestrator, SEED_SCOPE, completion_status, signal_completion};
pub use reference::{ExpectedOutputTable, expected_output};
pub use report::{RunReport, TrialReport};
pub use seed::SeedTaxonomy;
pub use test_set::TestSet;
pub use verifier::{ResponseVerifier, SeenLevels};
