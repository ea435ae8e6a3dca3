//! Description of the unit of work a handler guards.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised when an [`ExceptionContext`] fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// A required field was empty.
    #[error("{0} can't be blank")]
    Blank(&'static str),
}

/// Where a unit of work came from and what it was called with.
///
/// All three fields are required to be non-empty. The handler never changes
/// a context; it forwards it to every processor as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionContext {
    source: String,
    queue: String,
    args: Vec<Value>,
}

impl ExceptionContext {
    /// Creates a validated context.
    pub fn new(
        source: impl Into<String>,
        queue: impl Into<String>,
        args: Vec<Value>,
    ) -> Result<Self, ContextError> {
        let context = Self {
            source: source.into(),
            queue: queue.into(),
            args,
        };
        context.validate()?;
        Ok(context)
    }

    /// Checks the presence rules, reporting the first blank field.
    pub fn validate(&self) -> Result<(), ContextError> {
        if self.source.trim().is_empty() {
            return Err(ContextError::Blank("source"));
        }
        if self.queue.trim().is_empty() {
            return Err(ContextError::Blank("queue"));
        }
        if self.args.is_empty() {
            return Err(ContextError::Blank("args"));
        }
        Ok(())
    }

    /// The job or component that produced the work.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The queue or channel the work was taken from.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// The arguments the work was invoked with.
    pub fn args(&self) -> &[Value] {
        &self.args
    }
}
