//! Side-effecting processors invoked for every handled failure
//!
//! The handler calls each registered [`ExceptionProcessor`] in order with the
//! failure, its classification and the job context. Two built-in processors
//! ship with the crate: [`MetricsProcessor`] and [`FaultRecorder`]. The pair is
//! assembled by [`default_processors`] and injected into the handler.

pub mod fault;
pub mod metrics;

use crate::error::{BoxError, Classification, JobError};
use crate::handler::ExceptionContext;

pub use fault::{ActionableFault, FaultKey, FaultLedger, FaultRecorder};
pub use metrics::{format_metrics, ExceptionMetrics, MetricsProcessor, MetricsSnapshot};

/// A component notified about every handled failure.
///
/// Errors returned from [`process`](ExceptionProcessor::process) are not
/// isolated: they abort the handler's pipeline and propagate to the caller.
pub trait ExceptionProcessor: Send {
    /// Short name used when reporting this processor's failures.
    fn name(&self) -> &str;

    /// Handles one classified failure.
    fn process(
        &self,
        error: &JobError,
        classification: Classification,
        context: &ExceptionContext,
    ) -> Result<(), BoxError>;
}

/// Builds the built-in processor list: metrics first, then fault recording.
///
/// The sinks are shared handles, so the caller keeps its copies to read the
/// results once the handler has run.
pub fn default_processors(
    metrics: &ExceptionMetrics,
    faults: &FaultLedger,
) -> Vec<Box<dyn ExceptionProcessor>> {
    vec![
        Box::new(MetricsProcessor::new(metrics.clone())),
        Box::new(FaultRecorder::new(faults.clone())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> ExceptionContext {
        ExceptionContext::new("ReportJob", "default", vec![json!(1)]).unwrap()
    }

    #[test]
    fn test_default_processors_order() {
        let processors = default_processors(&ExceptionMetrics::new(), &FaultLedger::new());
        let names: Vec<&str> = processors.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["metrics", "actionable_fault"]);
    }

    #[test]
    fn test_default_processors_share_sinks() {
        let metrics = ExceptionMetrics::new();
        let faults = FaultLedger::new();
        let processors = default_processors(&metrics, &faults);
        let error = JobError::new("no_method_error", "undefined method");

        for processor in &processors {
            processor
                .process(&error, Classification::Unretryables, &context())
                .unwrap();
        }

        assert_eq!(metrics.snapshot().total, 1);
        assert_eq!(faults.len(), 1);
    }
}
