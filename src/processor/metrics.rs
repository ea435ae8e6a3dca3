//! Exception metrics collection.
//!
//! [`ExceptionMetrics`] is a thread-safe counter sink shared between the
//! [`MetricsProcessor`] that feeds it and whoever reads it afterwards. Every
//! increment is also emitted as a `tracing` event named
//! `exception_handler.<classification>`, the shape a statsd bridge expects.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::ExceptionProcessor;
use crate::error::{BoxError, Classification, JobError};
use crate::handler::ExceptionContext;

/// Prefix for emitted metric names.
pub const METRIC_PREFIX: &str = "exception_handler";

/// Point-in-time copy of the collected counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Total handled failures
    pub total: u64,
    /// Counts by classification tag
    pub by_classification: BTreeMap<String, u64>,
    /// Counts by exception kind
    pub by_kind: BTreeMap<String, u64>,
    /// Counts by queue
    pub by_queue: BTreeMap<String, u64>,
    /// Counts by job source
    pub by_source: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    /// Number of failures handled under `classification`.
    pub fn count(&self, classification: Classification) -> u64 {
        self.by_classification
            .get(classification.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// The most frequently seen exception kind.
    pub fn most_common_kind(&self) -> Option<&str> {
        self.by_kind
            .iter()
            .max_by_key(|(_, count)| *count)
            .map(|(kind, _)| kind.as_str())
    }

    fn record(
        &mut self,
        error: &JobError,
        classification: Classification,
        context: &ExceptionContext,
    ) {
        self.total += 1;
        *self
            .by_classification
            .entry(classification.as_str().to_string())
            .or_insert(0) += 1;
        *self
            .by_kind
            .entry(error.kind().as_str().to_string())
            .or_insert(0) += 1;
        *self.by_queue.entry(context.queue().to_string()).or_insert(0) += 1;
        *self
            .by_source
            .entry(context.source().to_string())
            .or_insert(0) += 1;
    }
}

/// Thread-safe metrics sink. Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct ExceptionMetrics {
    inner: Arc<RwLock<MetricsSnapshot>>,
}

impl ExceptionMetrics {
    /// Create an empty metrics sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one handled failure.
    ///
    /// Fails only if the counters were poisoned by a panicking writer.
    pub fn record(
        &self,
        error: &JobError,
        classification: Classification,
        context: &ExceptionContext,
    ) -> Result<(), BoxError> {
        let mut state = self
            .inner
            .write()
            .map_err(|_| "exception metrics lock poisoned")?;
        state.record(error, classification, context);

        tracing::debug!(
            metric = %format!("{}.{}", METRIC_PREFIX, classification),
            kind = %error.kind(),
            queue = context.queue(),
            source = context.source(),
            "increment"
        );
        Ok(())
    }

    /// Copy the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(state) = self.inner.read() {
            state.clone()
        } else {
            MetricsSnapshot::default()
        }
    }
}

/// Processor that counts every handled failure.
#[derive(Debug, Clone, Default)]
pub struct MetricsProcessor {
    metrics: ExceptionMetrics,
}

impl MetricsProcessor {
    /// Create a processor feeding `metrics`.
    pub fn new(metrics: ExceptionMetrics) -> Self {
        Self { metrics }
    }

    /// The sink this processor feeds.
    pub fn metrics(&self) -> &ExceptionMetrics {
        &self.metrics
    }
}

impl ExceptionProcessor for MetricsProcessor {
    fn name(&self) -> &str {
        "metrics"
    }

    fn process(
        &self,
        error: &JobError,
        classification: Classification,
        context: &ExceptionContext,
    ) -> Result<(), BoxError> {
        self.metrics.record(error, classification, context)
    }
}

/// Format metrics for display.
pub fn format_metrics(snapshot: &MetricsSnapshot) -> String {
    let mut output = String::from("## Exception Metrics\n\n");

    output.push_str(&format!("- **Handled**: {}\n", snapshot.total));
    for classification in [
        Classification::Ignorables,
        Classification::Retryables,
        Classification::Unretryables,
        Classification::Unknown,
    ] {
        output.push_str(&format!(
            "- **{}**: {}\n",
            classification,
            snapshot.count(classification)
        ));
    }
    if let Some(kind) = snapshot.most_common_kind() {
        output.push_str(&format!("- **Most common kind**: `{}`\n", kind));
    }

    if !snapshot.by_kind.is_empty() {
        output.push_str("\n### By Kind\n");
        for (kind, count) in &snapshot.by_kind {
            output.push_str(&format!("- `{}`: {}\n", kind, count));
        }
    }

    if !snapshot.by_queue.is_empty() {
        output.push_str("\n### By Queue\n");
        for (queue, count) in &snapshot.by_queue {
            output.push_str(&format!("- `{}`: {}\n", queue, count));
        }
    }

    output
}
