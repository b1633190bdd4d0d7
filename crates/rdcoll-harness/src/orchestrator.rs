//! Test-set orchestrator.
//!
//! ```text
//!  Orchestrator::run_all(num_test_sets, num_levels)
//!    for each trial:
//!      ├── draw inputs + Fisher–Yates send order from the injected RNG
//!      ├── build the expected-output table (before any I/O)
//!      ├── ExchangeDriver::run → send all, receive all, verify each
//!      └── failure? → abort the whole run (no partial credit)
//!    └── RunReport
//! ```
//!
//! The injected RNG is the only state carried from one trial to the next.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rdcoll_error::CollectiveError;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::HarnessConfig;
use crate::exchange::ExchangeDriver;
use crate::failure::HarnessFailure;
use crate::journal::{JournalEventKind, RunJournal, RunStatus};
use crate::nic::{CompletionStatus, HostCompletion, Nic};
use crate::report::{RunReport, TrialReport, failure_triage_line};
use crate::seed::SeedTaxonomy;
use crate::test_set::TestSet;

/// Scope id used when deriving per-purpose seeds from the root seed.
pub const SEED_SCOPE: &str = "rdcoll";

#[derive(Debug)]
pub struct Orchestrator<N: Nic, R: Rng> {
    config: HarnessConfig,
    driver: ExchangeDriver<N>,
    rng: R,
    seed: u64,
    journal: Option<RunJournal>,
}

impl<N: Nic> Orchestrator<N, StdRng> {
    /// Orchestrator whose RNG is the harness stream of `root_seed`.
    pub fn seeded(config: HarnessConfig, nic: N, root_seed: u64) -> Self {
        let seeds = SeedTaxonomy::derive(root_seed, SEED_SCOPE);
        Self::new(config, nic, StdRng::seed_from_u64(seeds.harness), root_seed)
    }
}

impl<N: Nic, R: Rng> Orchestrator<N, R> {
    /// `seed` is recorded in logs and reports; it should be the seed `rng`
    /// was created from.
    pub fn new(config: HarnessConfig, nic: N, rng: R, seed: u64) -> Self {
        let driver = ExchangeDriver::new(nic, config.buffer_len)
            .with_packet_dumps(config.debug_dump_packets);
        Self {
            config,
            driver,
            rng,
            seed,
            journal: None,
        }
    }

    #[must_use]
    pub fn with_journal(mut self, journal: RunJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub const fn seed(&self) -> u64 {
        self.seed
    }

    pub fn nic(&self) -> &N {
        self.driver.nic()
    }

    /// Run the configured number of test sets at the configured depth.
    ///
    /// # Errors
    ///
    /// Returns the first failure of any trial.
    pub fn run(&mut self) -> Result<RunReport, HarnessFailure> {
        let num_levels = usize::from(self.config.max_level) + 1;
        self.run_all(self.config.num_test_sets, num_levels)
    }

    /// Run `num_test_sets` randomized trials of `num_levels` packets each.
    ///
    /// # Errors
    ///
    /// Returns the first failure; configuration problems are reported
    /// against trial 0 with the internal failure family.
    pub fn run_all(
        &mut self,
        num_test_sets: usize,
        num_levels: usize,
    ) -> Result<RunReport, HarnessFailure> {
        let result = self.run_trials(num_test_sets, num_levels);
        match &result {
            Ok(report) => {
                info!(
                    seed = self.seed,
                    trials = report.trials.len(),
                    "{}",
                    report.triage_line()
                );
                self.finish_journal(RunStatus::Passed);
            }
            Err(failure) => {
                error!(
                    seed = self.seed,
                    trial = failure.trial,
                    code = failure.detail_code(),
                    "{}",
                    failure_triage_line(failure, self.seed)
                );
                self.record_failure(failure);
                self.finish_journal(RunStatus::Failed);
            }
        }
        result
    }

    fn run_trials(
        &mut self,
        num_test_sets: usize,
        num_levels: usize,
    ) -> Result<RunReport, HarnessFailure> {
        let max_level = num_levels
            .checked_sub(1)
            .and_then(|max| u8::try_from(max).ok())
            .ok_or_else(|| {
                HarnessFailure::new(
                    0,
                    CollectiveError::config(format!("num_levels {num_levels} outside 1..=255")),
                )
            })?;
        let config = HarnessConfig {
            max_level,
            num_test_sets,
            ..self.config.clone()
        };
        config.validate().map_err(|err| HarnessFailure::new(0, err))?;
        let geometry = config.geometry().map_err(|err| HarnessFailure::new(0, err))?;
        let metadata = config.base_metadata();

        info!(
            seed = self.seed,
            num_test_sets,
            num_levels,
            num_elements = geometry.num_elements(),
            packet_len = geometry.total_len(),
            "starting recursive-doubling verification run"
        );

        let mut report = RunReport::new(self.seed, num_levels, geometry.num_elements());
        for trial in 0..num_test_sets {
            let set = TestSet::generate(trial, metadata, geometry, &mut self.rng)
                .map_err(|err| HarnessFailure::new(trial, err))?;
            let table_sha256 = set.table.sha256_hex();
            info!(
                trial,
                send_order = ?set.send_order,
                table_sha256 = %table_sha256,
                "test set prepared"
            );
            self.journal_event(JournalEventKind::TrialStart, "trial_start", || {
                let mut payload = BTreeMap::new();
                payload.insert("trial".to_owned(), Value::from(trial));
                payload.insert("send_order".to_owned(), Value::from(set.send_order.clone()));
                payload.insert("table_sha256".to_owned(), Value::from(table_sha256.clone()));
                payload
            });

            let outcome = self
                .driver
                .run(&set)
                .map_err(|cause| HarnessFailure::new(trial, cause))?;

            info!(
                trial,
                receive_order = ?outcome.receive_order,
                "test set verified"
            );
            self.journal_event(JournalEventKind::TrialPass, "trial_pass", || {
                let mut payload = BTreeMap::new();
                payload.insert("trial".to_owned(), Value::from(trial));
                payload.insert(
                    "receive_order".to_owned(),
                    Value::from(outcome.receive_order.clone()),
                );
                payload
            });
            report.trials.push(TrialReport {
                trial,
                send_order: outcome.send_order,
                receive_order: outcome.receive_order,
                table_sha256,
            });
        }
        Ok(report)
    }

    fn journal_event(
        &mut self,
        kind: JournalEventKind,
        message: &str,
        payload: impl FnOnce() -> BTreeMap<String, Value>,
    ) {
        if let Some(journal) = self.journal.as_mut() {
            if let Err(err) = journal.emit(kind, message, payload()) {
                warn!(error = %err, "run journal write failed");
            }
        }
    }

    fn record_failure(&mut self, failure: &HarnessFailure) {
        self.journal_event(JournalEventKind::Failure, "failure", || {
            let mut payload = BTreeMap::new();
            payload.insert("trial".to_owned(), Value::from(failure.trial));
            payload.insert("code".to_owned(), Value::from(failure.detail_code()));
            payload.insert("message".to_owned(), Value::from(failure.to_string()));
            if let Some(kind) = failure.kind() {
                if let Ok(detail) = serde_json::to_value(kind) {
                    payload.insert("detail".to_owned(), detail);
                }
            }
            payload
        });
    }

    fn finish_journal(&mut self, status: RunStatus) {
        if let Some(journal) = self.journal.take() {
            if let Err(err) = journal.finish(status) {
                warn!(error = %err, "run journal finalize failed");
            }
        }
    }
}

/// Host-completion status for a finished run.
#[must_use]
pub fn completion_status(result: &Result<RunReport, HarnessFailure>) -> CompletionStatus {
    match result {
        Ok(_) => CompletionStatus::Pass,
        Err(failure) => CompletionStatus::Fail {
            code: failure.detail_code(),
        },
    }
}

/// Hand the run verdict to the host-completion collaborator.
pub fn signal_completion<H: HostCompletion + ?Sized>(
    result: &Result<RunReport, HarnessFailure>,
    host: &mut H,
) -> CompletionStatus {
    let status = completion_status(result);
    host.complete(status);
    status
}
