//! Serializable run summaries and the one-line failure triage output.

use serde::{Deserialize, Serialize};

use crate::failure::HarnessFailure;

/// Schema tag for serialized run reports.
pub const REPORT_SCHEMA_V1: &str = "rdcoll.report.v1";

/// Summary of one run that passed every trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub schema_version: String,
    /// Root seed; re-running with it reproduces every trial exactly.
    pub seed: u64,
    pub num_levels: usize,
    pub num_elements: usize,
    pub trials: Vec<TrialReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialReport {
    pub trial: usize,
    pub send_order: Vec<u8>,
    pub receive_order: Vec<u8>,
    pub table_sha256: String,
}

impl RunReport {
    #[must_use]
    pub fn new(seed: u64, num_levels: usize, num_elements: usize) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_V1.to_owned(),
            seed,
            num_levels,
            num_elements,
            trials: Vec::new(),
        }
    }

    /// Number of trials whose responses arrived in a different order than
    /// they were sent.
    #[must_use]
    pub fn reordered_trials(&self) -> usize {
        self.trials
            .iter()
            .filter(|t| t.send_order != t.receive_order)
            .count()
    }

    #[must_use]
    pub fn triage_line(&self) -> String {
        format!(
            "PASS: {} trials x {} levels x {} elements, {} reordered, seed={:#018x}",
            self.trials.len(),
            self.num_levels,
            self.num_elements,
            self.reordered_trials(),
            self.seed,
        )
    }
}

#[must_use]
pub fn failure_triage_line(failure: &HarnessFailure, seed: u64) -> String {
    format!(
        "FAIL: {failure} (code={:#x}, seed={seed:#018x})",
        failure.detail_code()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::FailureKind;

    #[test]
    fn test_triage_lines() {
        let mut report = RunReport::new(42, 4, 256);
        report.trials.push(TrialReport {
            trial: 0,
            send_order: vec![0, 1, 2, 3],
            receive_order: vec![0, 1, 2, 3],
            table_sha256: String::new(),
        });
        report.trials.push(TrialReport {
            trial: 1,
            send_order: vec![2, 0, 3, 1],
            receive_order: vec![0, 3, 2, 1],
            table_sha256: String::new(),
        });
        assert_eq!(report.reordered_trials(), 1);
        assert!(report.triage_line().starts_with("PASS: 2 trials x 4 levels"));

        let failure = HarnessFailure::new(1, FailureKind::DuplicateLevel { level: 3 });
        let line = failure_triage_line(&failure, 42);
        assert!(line.starts_with("FAIL: trial 1 failed: duplicate"), "{line}");
        assert!(line.contains("code=0x400001"), "{line}");
    }
}
