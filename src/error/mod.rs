//! Failure values, classification types and the handler's error union
//!
//! Work hands the handler a [`JobError`]. The handler classifies it by its
//! [`ExceptionKind`] into a [`Classification`], and anything that leaves
//! [`ExceptionHandler::process`](crate::handler::ExceptionHandler::process) as
//! an error is a [`HandlerError`].

pub mod classification;
pub mod job_error;
pub mod kind;

use std::io;
use thiserror::Error;

// Re-export main types for convenient access
pub use classification::{Bucket, Classification, UnknownBucket};
pub use job_error::JobError;
pub use kind::{ExceptionKind, KindHierarchy};

/// Boxed error returned by processors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the exception handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A retryable failure was handled and the caller should retry the work.
    ///
    /// The original failure is not carried; it is available through
    /// [`ExceptionHandler::error`](crate::handler::ExceptionHandler::error).
    #[error("retryable error; retry requested")]
    RetryRequested,

    /// A failure no bucket claimed, propagated unchanged.
    #[error(transparent)]
    Unknown(JobError),

    /// An invalid bucket name was passed to the registry.
    #[error(transparent)]
    InvalidBucket(#[from] UnknownBucket),

    /// A processor failed while handling a failure.
    #[error("exception processor '{processor}' failed: {source}")]
    Processor {
        /// Name of the failing processor.
        processor: String,
        /// The processor's error.
        #[source]
        source: BoxError,
    },

    /// The logger failed while writing a record.
    #[error("failed to write exception log: {0}")]
    Logger(#[source] io::Error),
}

impl HandlerError {
    /// Returns true if this is the retry signal.
    pub fn is_retry_requested(&self) -> bool {
        matches!(self, HandlerError::RetryRequested)
    }

    /// Returns true if this is a configuration error.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, HandlerError::InvalidBucket(_))
    }

    /// Returns the propagated failure when this is an unknown error.
    pub fn as_unknown(&self) -> Option<&JobError> {
        match self {
            HandlerError::Unknown(error) => Some(error),
            _ => None,
        }
    }

    /// Consumes the error, returning the propagated failure if it was unknown.
    pub fn into_unknown(self) -> Option<JobError> {
        match self {
            HandlerError::Unknown(error) => Some(error),
            _ => None,
        }
    }
}

/// Result type for handler operations.
pub type HandlerResult<T> = Result<T, HandlerError>;
