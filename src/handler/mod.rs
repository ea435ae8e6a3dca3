//! The exception handler: runs a unit of work and dispatches its failure.
//!
//! [`ExceptionHandler::process`] invokes the work once. A returned error is
//! classified against the [`Registry`] (ignorables, then retryables, then
//! unretryables, else unknown), pushed through the common pipeline (capture,
//! optional dump to the [`TaggedLogger`], every [`ExceptionProcessor`] in
//! order) and then:
//!
//! | classification | result of `process`                                        |
//! |----------------|------------------------------------------------------------|
//! | ignorables     | `Ok(Outcome::Absorbed)`                                    |
//! | retryables     | `Err(HandlerError::RetryRequested)`, or absorbed if rescued |
//! | unretryables   | `Ok(Outcome::Absorbed)`                                    |
//! | unknown        | `Err(HandlerError::Unknown(original))`                     |
//!
//! Panics are not failures in this sense: they unwind through `process`
//! untouched and no pipeline step runs.
//!
//! A handler is meant to guard one logical unit of work; `process` and `add`
//! take `&mut self`.

pub mod context;
pub mod registry;

pub use context::{ContextError, ExceptionContext};
pub use registry::Registry;

use crate::error::{
    Bucket, Classification, ExceptionKind, HandlerError, HandlerResult, JobError, KindHierarchy,
};
use crate::logging::{TaggedLogger, WriterLogger, COMPONENT_TAG};
use crate::processor::ExceptionProcessor;

/// How a call to [`ExceptionHandler::process`] ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The work succeeded and returned this value.
    Completed(T),
    /// The work failed and the failure was absorbed on this path.
    Absorbed(Classification),
}

impl<T> Outcome<T> {
    /// Returns true if the work failed and the failure was absorbed.
    pub fn is_absorbed(&self) -> bool {
        matches!(self, Outcome::Absorbed(_))
    }

    /// Returns the work's value if it completed.
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Absorbed(_) => None,
        }
    }

    /// Returns the absorbing classification, if any.
    pub fn classification(&self) -> Option<Classification> {
        match self {
            Outcome::Completed(_) => None,
            Outcome::Absorbed(classification) => Some(*classification),
        }
    }
}

/// Classifies and dispatches failures raised by a unit of work.
pub struct ExceptionHandler {
    context: ExceptionContext,
    registry: Registry,
    processors: Vec<Box<dyn ExceptionProcessor>>,
    logger: Box<dyn TaggedLogger>,
    rescue_retryable_errors: bool,
    dump_exceptions: bool,
    error: Option<JobError>,
}

impl std::fmt::Debug for ExceptionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExceptionHandler")
            .field("context", &self.context)
            .field("registry", &self.registry)
            .field(
                "processors",
                &self.processors.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("rescue_retryable_errors", &self.rescue_retryable_errors)
            .field("dump_exceptions", &self.dump_exceptions)
            .field("error", &self.error)
            .finish()
    }
}

impl ExceptionHandler {
    /// Start building a handler for `context`.
    pub fn builder(context: ExceptionContext) -> ExceptionHandlerBuilder {
        ExceptionHandlerBuilder::new(context)
    }

    /// Adds `kind` to the bucket named `bucket`.
    ///
    /// Unknown bucket names fail with [`HandlerError::InvalidBucket`] and
    /// leave the registry untouched.
    pub fn add(&mut self, kind: impl Into<ExceptionKind>, bucket: &str) -> HandlerResult<()> {
        self.registry.add(kind, bucket)
    }

    /// Adds `kind` to `bucket`.
    pub fn add_to(&mut self, kind: impl Into<ExceptionKind>, bucket: Bucket) {
        self.registry.add_to(kind, bucket);
    }

    /// Kinds that are fully absorbed.
    pub fn ignorables(&self) -> &[ExceptionKind] {
        self.registry.ignorables()
    }

    /// Kinds that trigger the retry signal.
    pub fn retryables(&self) -> &[ExceptionKind] {
        self.registry.retryables()
    }

    /// Kinds that are recorded and absorbed.
    pub fn unretryables(&self) -> &[ExceptionKind] {
        self.registry.unretryables()
    }

    /// The classification registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The context forwarded to processors.
    pub fn context(&self) -> &ExceptionContext {
        &self.context
    }

    /// Whether retryable failures are absorbed instead of signalled.
    pub fn rescue_retryable_errors(&self) -> bool {
        self.rescue_retryable_errors
    }

    /// Whether failures are dumped to the logger.
    pub fn dump_exceptions(&self) -> bool {
        self.dump_exceptions
    }

    /// The most recently handled failure.
    ///
    /// A successful `process` call leaves the previous value in place.
    pub fn error(&self) -> Option<&JobError> {
        self.error.as_ref()
    }

    /// Returns true if any failure has been handled.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Runs `work` once and dispatches its failure, if any.
    ///
    /// # Errors
    ///
    /// - [`HandlerError::RetryRequested`] for a retryable failure when
    ///   retryable errors are not rescued;
    /// - [`HandlerError::Unknown`] carrying the original failure when no
    ///   bucket matched;
    /// - [`HandlerError::Logger`] or [`HandlerError::Processor`] when a
    ///   pipeline step fails, which pre-empts the path's own result.
    pub fn process<T, E, F>(&mut self, work: F) -> HandlerResult<Outcome<T>>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<JobError>,
    {
        match work() {
            Ok(value) => Ok(Outcome::Completed(value)),
            Err(error) => self.handle(error.into()),
        }
    }

    fn handle<T>(&mut self, error: JobError) -> HandlerResult<Outcome<T>> {
        let classification = self.registry.classify(error.kind());
        tracing::debug!(
            kind = %error.kind(),
            classification = %classification,
            source = self.context.source(),
            queue = self.context.queue(),
            "handling job failure"
        );

        self.common_actions(&error, classification)?;

        match classification {
            Classification::Ignorables | Classification::Unretryables => {
                Ok(Outcome::Absorbed(classification))
            }
            Classification::Retryables => {
                self.escalate_retryable()?;
                Ok(Outcome::Absorbed(classification))
            }
            Classification::Unknown => Err(HandlerError::Unknown(error)),
        }
    }

    /// Steps shared by every path: capture, dump, then notify processors.
    fn common_actions(
        &mut self,
        error: &JobError,
        classification: Classification,
    ) -> HandlerResult<()> {
        self.error = Some(error.clone());

        self.log(error, classification)?;

        for processor in &self.processors {
            processor
                .process(error, classification, &self.context)
                .map_err(|source| HandlerError::Processor {
                    processor: processor.name().to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    fn log(&mut self, error: &JobError, classification: Classification) -> HandlerResult<()> {
        if !self.dump_exceptions {
            return Ok(());
        }

        let summary = format!("Caught {} error: {}", classification, error.message());
        self.logger
            .log(COMPONENT_TAG, &summary)
            .map_err(HandlerError::Logger)?;
        for frame in error.backtrace() {
            self.logger
                .log(COMPONENT_TAG, frame)
                .map_err(HandlerError::Logger)?;
        }
        Ok(())
    }

    fn escalate_retryable(&self) -> HandlerResult<()> {
        if self.rescue_retryable_errors {
            return Ok(());
        }
        tracing::debug!("signalling retry for retryable failure");
        Err(HandlerError::RetryRequested)
    }
}

/// Builder for [`ExceptionHandler`].
///
/// Defaults: retryable failures are signalled, exception dumping is off, no
/// processors (use [`default_processors`](crate::processor::default_processors)
/// for the built-in pair), a [`WriterLogger`] on stdout, and a
/// [`Registry`] with the default retryables and built-in hierarchy.
pub struct ExceptionHandlerBuilder {
    context: ExceptionContext,
    registry: Registry,
    processors: Vec<Box<dyn ExceptionProcessor>>,
    logger: Box<dyn TaggedLogger>,
    rescue_retryable_errors: bool,
    dump_exceptions: bool,
}

impl std::fmt::Debug for ExceptionHandlerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExceptionHandlerBuilder")
            .field("context", &self.context)
            .field("registry", &self.registry)
            .field(
                "processors",
                &self.processors.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("rescue_retryable_errors", &self.rescue_retryable_errors)
            .field("dump_exceptions", &self.dump_exceptions)
            .finish()
    }
}

impl ExceptionHandlerBuilder {
    /// Create a builder with the defaults listed on the type.
    pub fn new(context: ExceptionContext) -> Self {
        Self {
            context,
            registry: Registry::new(),
            processors: Vec::new(),
            logger: Box::new(WriterLogger::stdout()),
            rescue_retryable_errors: false,
            dump_exceptions: false,
        }
    }

    /// Absorb retryable failures instead of raising the retry signal.
    pub fn rescue_retryable_errors(mut self, rescue: bool) -> Self {
        self.rescue_retryable_errors = rescue;
        self
    }

    /// Dump every handled failure to the logger.
    pub fn dump_exceptions(mut self, enabled: bool) -> Self {
        self.dump_exceptions = enabled;
        self
    }

    /// Append one processor.
    pub fn processor(mut self, processor: impl ExceptionProcessor + 'static) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Replace the processor list.
    pub fn processors(mut self, processors: Vec<Box<dyn ExceptionProcessor>>) -> Self {
        self.processors = processors;
        self
    }

    /// Replace the logger.
    pub fn logger(mut self, logger: impl TaggedLogger + 'static) -> Self {
        self.logger = Box::new(logger);
        self
    }

    /// Replace the registry.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Start from a fresh registry using `hierarchy`.
    pub fn hierarchy(mut self, hierarchy: KindHierarchy) -> Self {
        self.registry = Registry::with_hierarchy(hierarchy);
        self
    }

    /// Build the handler.
    pub fn build(self) -> ExceptionHandler {
        ExceptionHandler {
            context: self.context,
            registry: self.registry,
            processors: self.processors,
            logger: self.logger,
            rescue_retryable_errors: self.rescue_retryable_errors,
            dump_exceptions: self.dump_exceptions,
            error: None,
        }
    }
}
