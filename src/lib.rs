//! Jobguard - exception classification and dispatch for background jobs
//!
//! A unit of work runs inside an [`ExceptionHandler`]. When it fails, the
//! failure is classified as ignorable, retryable, unretryable or unknown,
//! passed through the registered processors (metrics, fault recording), and
//! then either absorbed, turned into a retry signal, or handed back unchanged.
//!
//! ```
//! use jobguard::error::{ExceptionKind, HandlerError, JobError};
//! use jobguard::handler::{ExceptionContext, ExceptionHandler};
//! use jobguard::processor::{default_processors, ExceptionMetrics, FaultLedger};
//! use serde_json::json;
//!
//! let metrics = ExceptionMetrics::new();
//! let faults = FaultLedger::new();
//! let context = ExceptionContext::new("ReportJob", "default", vec![json!(42)])?;
//! let mut handler = ExceptionHandler::builder(context)
//!     .processors(default_processors(&metrics, &faults))
//!     .build();
//!
//! let result = handler.process(|| -> Result<(), JobError> {
//!     Err(JobError::new(ExceptionKind::TIMEOUT, "execution expired"))
//! });
//!
//! assert!(matches!(result, Err(HandlerError::RetryRequested)));
//! assert_eq!(metrics.snapshot().total, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod identity;
pub mod logging;
pub mod processor;

pub use error::{Bucket, Classification, ExceptionKind, HandlerError, JobError};
pub use handler::{ExceptionContext, ExceptionHandler, Outcome};
