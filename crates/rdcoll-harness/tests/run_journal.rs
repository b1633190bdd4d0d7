//! Orchestrated runs write a replayable journal.

mod common;

use common::init_test_logging;
use rdcoll_harness::device::{CompletionOrder, DeviceFault, RecursiveDoublingDevice};
use rdcoll_harness::journal::{
    JournalEventKind, JournalMeta, RunJournal, RunStatus, read_events, validate_required_files,
};
use rdcoll_harness::seed::SeedTaxonomy;
use rdcoll_harness::{HarnessConfig, Orchestrator, SEED_SCOPE};

fn config() -> HarnessConfig {
    HarnessConfig {
        num_elements: 32,
        num_test_sets: 3,
        seed: Some(0xC0FFEE),
        ..HarnessConfig::default()
    }
}

fn seeded_device(config: &HarnessConfig, seed: u64) -> RecursiveDoublingDevice {
    RecursiveDoublingDevice::new(
        config.geometry().unwrap(),
        CompletionOrder::Seeded(SeedTaxonomy::derive(seed, SEED_SCOPE).device),
    )
}

fn journaled_run(base: &std::path::Path, suite: &str) -> std::path::PathBuf {
    let config = config();
    let seed = 0xC0FFEE;
    let journal = RunJournal::create(base, suite, seed, &config).unwrap();
    let root = journal.root().to_path_buf();
    let nic = seeded_device(&config, seed);
    Orchestrator::seeded(config, nic, seed)
        .with_journal(journal)
        .run()
        .unwrap();
    root
}

#[test]
fn test_passing_run_journal_lifecycle() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let root = journaled_run(dir.path(), "pass");
    validate_required_files(&root).unwrap();

    let meta: JournalMeta =
        serde_json::from_slice(&std::fs::read(root.join("meta.json")).unwrap()).unwrap();
    assert_eq!(meta.seed, 0xC0FFEE);
    assert_eq!(meta.config, config());

    let events = read_events(&root).unwrap();
    let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
    assert_eq!(kinds.first(), Some(&JournalEventKind::RunStart));
    assert_eq!(kinds.last(), Some(&JournalEventKind::RunEnd));
    assert_eq!(
        kinds
            .iter()
            .filter(|k| **k == JournalEventKind::TrialPass)
            .count(),
        3
    );
    assert_eq!(events.last().unwrap().status, Some(RunStatus::Passed));
    for (step, event) in events.iter().enumerate() {
        assert_eq!(event.step, step as u64);
    }
    let first_trial = events
        .iter()
        .find(|e| e.kind == JournalEventKind::TrialStart)
        .unwrap();
    let digest = first_trial.payload["table_sha256"].as_str().unwrap();
    assert_eq!(digest.len(), 64);
}

#[test]
fn test_same_seed_journals_match() {
    let dir = tempfile::tempdir().unwrap();
    let a = read_events(&journaled_run(dir.path(), "a")).unwrap();
    let b = read_events(&journaled_run(dir.path(), "b")).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_failing_run_journal_records_failure() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let config = config();
    let journal = RunJournal::create(dir.path(), "fail", 7, &config).unwrap();
    let root = journal.root().to_path_buf();
    let nic = RecursiveDoublingDevice::new(config.geometry().unwrap(), CompletionOrder::Fifo)
        .with_fault(DeviceFault::DropResponse { level: 0 });
    let failure = Orchestrator::seeded(config, nic, 7)
        .with_journal(journal)
        .run()
        .unwrap_err();
    assert_eq!(failure.trial, 0);

    let events = read_events(&root).unwrap();
    let failure_event = events
        .iter()
        .find(|e| e.kind == JournalEventKind::Failure)
        .unwrap();
    assert_eq!(failure_event.payload["code"].as_u64(), Some(1 << 20));
    assert_eq!(failure_event.payload["detail"]["kind"].as_str(), Some("transport"));
    assert_eq!(events.last().unwrap().status, Some(RunStatus::Failed));
}
