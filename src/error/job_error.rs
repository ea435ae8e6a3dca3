//! The failure value a unit of work hands back to the handler.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Arc;

use super::ExceptionKind;

/// A failure raised by a unit of work.
///
/// Carries the kind used for classification, a human-readable message, the
/// recorded backtrace frames (one entry per frame) and optionally the error
/// that caused it. Cloning is cheap; the source is shared.
#[derive(Clone)]
pub struct JobError {
    kind: ExceptionKind,
    message: String,
    backtrace: Vec<String>,
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl JobError {
    /// Creates a failure of the given kind with no backtrace.
    pub fn new(kind: impl Into<ExceptionKind>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            backtrace: Vec::new(),
            source: None,
        }
    }

    /// Wraps an existing error under the given kind, using its message.
    pub fn from_error<E>(kind: impl Into<ExceptionKind>, error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            kind: kind.into(),
            message: error.to_string(),
            backtrace: Vec::new(),
            source: Some(Arc::new(error)),
        }
    }

    /// Replaces the recorded backtrace frames.
    pub fn with_backtrace<I, S>(mut self, frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.backtrace = frames.into_iter().map(Into::into).collect();
        self
    }

    /// Records the current call stack, if backtraces are enabled for the
    /// process (`RUST_BACKTRACE` / `RUST_LIB_BACKTRACE`).
    pub fn capture_backtrace(mut self) -> Self {
        let backtrace = Backtrace::capture();
        if backtrace.status() == BacktraceStatus::Captured {
            self.backtrace = frames(&backtrace);
        }
        self
    }

    /// The kind used to classify this failure.
    pub fn kind(&self) -> &ExceptionKind {
        &self.kind
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Recorded backtrace frames, outermost call last.
    pub fn backtrace(&self) -> &[String] {
        &self.backtrace
    }
}

/// One entry per frame: `N: symbol`, with its `at file:line` location folded
/// onto the same entry.
fn frames(backtrace: &Backtrace) -> Vec<String> {
    let mut frames: Vec<String> = Vec::new();
    for line in backtrace.to_string().lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        match frames.last_mut() {
            Some(frame) if line.starts_with("at ") => {
                frame.push(' ');
                frame.push_str(line);
            }
            _ => frames.push(line.to_string()),
        }
    }
    frames
}

impl fmt::Debug for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("frames", &self.backtrace.len())
            .field("source", &self.source.as_ref().map(|s| s.to_string()))
            .finish()
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for JobError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn StdError + 'static))
    }
}

/// Two failures are equal when kind, message and frames match; the source is
/// not compared.
impl PartialEq for JobError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.message == other.message
            && self.backtrace == other.backtrace
    }
}

impl Eq for JobError {}

impl From<io::Error> for JobError {
    fn from(error: io::Error) -> Self {
        let kind = match error.kind() {
            io::ErrorKind::TimedOut => ExceptionKind::TIMEOUT,
            io::ErrorKind::ConnectionRefused => ExceptionKind::CONNECTION_REFUSED,
            io::ErrorKind::NotConnected => ExceptionKind::NETWORK_UNREACHABLE,
            _ => ExceptionKind::IO,
        };
        Self::from_error(kind, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_error() {
        let error = JobError::new("argument_error", "bad argument");

        assert_eq!(error.kind(), &ExceptionKind::new("argument_error"));
        assert_eq!(error.message(), "bad argument");
        assert!(error.backtrace().is_empty());
        assert!(error.source().is_none());
    }

    #[test]
    fn test_display_is_message() {
        let error = JobError::new(ExceptionKind::TIMEOUT, "execution expired");
        assert_eq!(format!("{}", error), "execution expired");
    }

    #[test]
    fn test_with_backtrace() {
        let error = JobError::new("standard_error", "This is a test")
            .with_backtrace(["/line1", "/line2"]);
        assert_eq!(error.backtrace(), ["/line1", "/line2"]);
    }

    #[test]
    fn test_frames_fold_locations() {
        let frames = frames(&Backtrace::force_capture());

        assert!(!frames.is_empty());
        assert!(frames[0].starts_with("0: "));
        assert!(frames.iter().all(|frame| !frame.starts_with("at ")));
    }

    #[test]
    fn test_capture_backtrace_keeps_message() {
        let error = JobError::new("standard_error", "This is a test").capture_backtrace();

        assert_eq!(error.message(), "This is a test");
        if Backtrace::capture().status() != BacktraceStatus::Captured {
            assert!(error.backtrace().is_empty());
        }
    }

    #[test]
    fn test_io_timeout_maps_to_timeout() {
        let error = JobError::from(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));

        assert_eq!(error.kind(), &ExceptionKind::TIMEOUT);
        assert_eq!(error.message(), "read timed out");
        assert!(error.source().is_some());
    }

    #[test]
    fn test_io_connection_refused() {
        let error = JobError::from(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert_eq!(error.kind(), &ExceptionKind::CONNECTION_REFUSED);
    }

    #[test]
    fn test_io_other_maps_to_io() {
        let error = JobError::from(io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(error.kind(), &ExceptionKind::IO);
    }

    #[test]
    fn test_equality_ignores_source() {
        let with_source = JobError::from_error(
            "io",
            io::Error::new(io::ErrorKind::Other, "boom"),
        );
        let without_source = JobError::new("io", "boom");
        assert_eq!(with_source, without_source);
    }

    #[test]
    fn test_clone_shares_source() {
        let error = JobError::from(io::Error::new(io::ErrorKind::Other, "boom"));
        let cloned = error.clone();
        assert_eq!(error, cloned);
        assert_eq!(cloned.source().map(|s| s.to_string()), Some("boom".to_string()));
    }
}
