//! Run journal: a reproduction bundle for one orchestrated run.
//!
//! - `meta.json` for the schema version, suite, root seed, and config
//! - `events.jsonl` for lifecycle events, one JSON object per line
//!
//! Each trial's `trial_start` event carries the SHA-256 of its expected
//! output table, so two runs from the same seed can be diffed line by line.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use rdcoll_error::{CollectiveError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::config::HarnessConfig;

pub const JOURNAL_SCHEMA_VERSION: u32 = 1;

pub const REQUIRED_JOURNAL_FILES: [&str; 2] = ["meta.json", "events.jsonl"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalEventKind {
    RunStart,
    TrialStart,
    TrialPass,
    Failure,
    RunEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Passed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalMeta {
    pub schema_version: u32,
    pub suite: String,
    pub seed: u64,
    pub harness_version: String,
    pub config: HarnessConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEvent {
    pub kind: JournalEventKind,
    pub status: Option<RunStatus>,
    pub step: u64,
    pub message: String,
    pub payload: BTreeMap<String, Value>,
}

#[derive(Debug)]
pub struct RunJournal {
    root: PathBuf,
    events_path: PathBuf,
    next_step: u64,
}

impl RunJournal {
    /// Create `<base_dir>/<suite>-<seed>` with `meta.json` and an
    /// `events.jsonl` holding the `run_start` event.
    ///
    /// # Errors
    ///
    /// Returns `Config` for an empty suite name, `Io`/`Json` on write
    /// failures.
    pub fn create(base_dir: &Path, suite: &str, seed: u64, config: &HarnessConfig) -> Result<Self> {
        if suite.is_empty() {
            return Err(CollectiveError::config("journal suite must be non-empty"));
        }
        let root = base_dir.join(format!("{suite}-{seed:016x}"));
        fs::create_dir_all(&root)?;

        let meta = JournalMeta {
            schema_version: JOURNAL_SCHEMA_VERSION,
            suite: suite.to_owned(),
            seed,
            harness_version: env!("CARGO_PKG_VERSION").to_owned(),
            config: config.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&meta).map_err(json_error)?;
        fs::write(root.join("meta.json"), bytes)?;

        let events_path = root.join("events.jsonl");
        fs::write(&events_path, b"")?;

        let mut journal = Self {
            root,
            events_path,
            next_step: 0,
        };
        let mut payload = BTreeMap::new();
        payload.insert("seed".to_owned(), Value::from(seed));
        journal.emit(JournalEventKind::RunStart, "run_start", payload)?;
        info!(suite, seed, root = %journal.root.display(), "run journal initialized");
        Ok(journal)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// # Errors
    ///
    /// Returns `Io`/`Json` if the event cannot be appended.
    pub fn emit(
        &mut self,
        kind: JournalEventKind,
        message: impl Into<String>,
        payload: BTreeMap<String, Value>,
    ) -> Result<()> {
        let event = JournalEvent {
            kind,
            status: None,
            step: self.next_step,
            message: message.into(),
            payload,
        };
        self.next_step = self.next_step.saturating_add(1);
        self.append(&event)
    }

    /// Append `run_end` and return the bundle directory.
    ///
    /// # Errors
    ///
    /// Returns `Io`/`Json` if the event cannot be appended.
    pub fn finish(self, status: RunStatus) -> Result<PathBuf> {
        let event = JournalEvent {
            kind: JournalEventKind::RunEnd,
            status: Some(status),
            step: self.next_step,
            message: "run_end".to_owned(),
            payload: BTreeMap::new(),
        };
        self.append(&event)?;
        info!(root = %self.root.display(), status = ?status, "run journal finalized");
        Ok(self.root)
    }

    fn append(&self, event: &JournalEvent) -> Result<()> {
        let line = serde_json::to_string(event).map_err(json_error)?;
        let mut file = OpenOptions::new().append(true).open(&self.events_path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

/// Parse every event of a journal, in order.
///
/// # Errors
///
/// Returns `Io` if the file is unreadable and `Json` on a malformed line.
pub fn read_events(root: &Path) -> Result<Vec<JournalEvent>> {
    let text = fs::read_to_string(root.join("events.jsonl"))?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(json_error))
        .collect()
}

/// # Errors
///
/// Returns `Config` naming the missing files.
pub fn validate_required_files(root: &Path) -> Result<()> {
    let missing: Vec<&str> = REQUIRED_JOURNAL_FILES
        .iter()
        .copied()
        .filter(|name| !root.join(name).is_file())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CollectiveError::config(format!(
            "journal {} is missing {missing:?}",
            root.display()
        )))
    }
}

fn json_error(err: serde_json::Error) -> CollectiveError {
    CollectiveError::Json {
        detail: err.to_string(),
    }
}
