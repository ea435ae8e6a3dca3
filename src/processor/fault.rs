//! Actionable fault recording.
//!
//! An actionable fault is a failure someone should be told about: a known-bad
//! error that retrying will not fix. The [`FaultRecorder`] processor folds
//! such failures into a [`FaultLedger`], one entry per (source, queue, kind),
//! counting repeats. The ledger lives in memory only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::ExceptionProcessor;
use crate::error::{BoxError, Classification, ExceptionKind, JobError};
use crate::handler::ExceptionContext;

/// Identity of an actionable fault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaultKey {
    /// Job source
    pub source: String,
    /// Queue the job ran on
    pub queue: String,
    /// Exception kind name
    pub error_name: String,
}

impl FaultKey {
    /// Build a key from its parts.
    pub fn new(
        source: impl Into<String>,
        queue: impl Into<String>,
        error_name: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            queue: queue.into(),
            error_name: error_name.into(),
        }
    }
}

/// A recorded fault with its occurrence count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionableFault {
    /// Which fault this is
    pub key: FaultKey,
    /// Number of occurrences
    pub count: u64,
    /// Message of the most recent occurrence
    pub last_message: String,
    /// When the fault was first recorded
    pub first_seen: DateTime<Utc>,
    /// When the fault was last recorded
    pub last_seen: DateTime<Utc>,
}

/// Thread-safe in-memory fault store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct FaultLedger {
    faults: Arc<RwLock<HashMap<FaultKey, ActionableFault>>>,
}

impl FaultLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence, creating the fault or bumping its count.
    pub fn record(&self, error: &JobError, context: &ExceptionContext) -> Result<(), BoxError> {
        let key = FaultKey::new(context.source(), context.queue(), error.kind().as_str());
        let now = Utc::now();

        let mut faults = self
            .faults
            .write()
            .map_err(|_| "fault ledger lock poisoned")?;
        let fault = faults.entry(key.clone()).or_insert_with(|| ActionableFault {
            key,
            count: 0,
            last_message: String::new(),
            first_seen: now,
            last_seen: now,
        });
        fault.count += 1;
        fault.last_message = error.message().to_string();
        fault.last_seen = now;

        tracing::debug!(
            source = %fault.key.source,
            queue = %fault.key.queue,
            error_name = %fault.key.error_name,
            count = fault.count,
            "recorded actionable fault"
        );
        Ok(())
    }

    /// Look up a fault by source, queue and kind.
    pub fn find(&self, source: &str, queue: &str, kind: &ExceptionKind) -> Option<ActionableFault> {
        let key = FaultKey::new(source, queue, kind.as_str());
        self.faults
            .read()
            .ok()
            .and_then(|faults| faults.get(&key).cloned())
    }

    /// All recorded faults, most frequent first.
    pub fn faults(&self) -> Vec<ActionableFault> {
        let mut faults: Vec<ActionableFault> = match self.faults.read() {
            Ok(faults) => faults.values().cloned().collect(),
            Err(_) => Vec::new(),
        };
        faults.sort_by(|a, b| b.count.cmp(&a.count));
        faults
    }

    /// Number of distinct faults.
    pub fn len(&self) -> usize {
        self.faults.read().map(|faults| faults.len()).unwrap_or(0)
    }

    /// Returns true if no fault has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Processor that records actionable faults.
///
/// Only failures whose classification is in the recorded set reach the
/// ledger; by default that is `unretryables`.
#[derive(Debug, Clone)]
pub struct FaultRecorder {
    ledger: FaultLedger,
    recorded: Vec<Classification>,
}

impl FaultRecorder {
    /// Create a recorder that records unretryable failures.
    pub fn new(ledger: FaultLedger) -> Self {
        Self {
            ledger,
            recorded: vec![Classification::Unretryables],
        }
    }

    /// Replace the set of classifications that are recorded.
    pub fn recording(mut self, classifications: impl IntoIterator<Item = Classification>) -> Self {
        self.recorded = classifications.into_iter().collect();
        self
    }

    /// Returns true if failures of `classification` are recorded.
    pub fn records(&self, classification: Classification) -> bool {
        self.recorded.contains(&classification)
    }

    /// The ledger this recorder writes to.
    pub fn ledger(&self) -> &FaultLedger {
        &self.ledger
    }
}

impl ExceptionProcessor for FaultRecorder {
    fn name(&self) -> &str {
        "actionable_fault"
    }

    fn process(
        &self,
        error: &JobError,
        classification: Classification,
        context: &ExceptionContext,
    ) -> Result<(), BoxError> {
        if !self.records(classification) {
            return Ok(());
        }
        self.ledger.record(error, context)
    }
}
