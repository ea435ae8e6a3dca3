//! Exception kinds and the is-a table used to match them.
//!
//! Every failure carries an [`ExceptionKind`], a stable string discriminant.
//! Registry buckets hold kinds, and a [`KindHierarchy`] built at startup lets a
//! bucket entry match a whole family of kinds (registering `timeout` also
//! catches `exit:124` once that exit code is declared a child of `timeout`).

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Stable discriminant identifying what kind of failure occurred.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExceptionKind(Cow<'static, str>);

impl ExceptionKind {
    /// An operation exceeded its time limit.
    pub const TIMEOUT: ExceptionKind = ExceptionKind(Cow::Borrowed("timeout"));
    /// The remote network or host could not be reached.
    pub const NETWORK_UNREACHABLE: ExceptionKind =
        ExceptionKind(Cow::Borrowed("network_unreachable"));
    /// The remote end actively refused the connection.
    pub const CONNECTION_REFUSED: ExceptionKind =
        ExceptionKind(Cow::Borrowed("connection_refused"));
    /// Generic I/O failure with no more specific kind.
    pub const IO: ExceptionKind = ExceptionKind(Cow::Borrowed("io"));
    /// A process was terminated by a signal.
    pub const SIGNAL: ExceptionKind = ExceptionKind(Cow::Borrowed("signal"));

    /// Creates a kind from any name.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// The kind for a process that exited with a non-zero status code.
    pub fn exit_code(code: i32) -> Self {
        Self(Cow::Owned(format!("exit:{}", code)))
    }

    /// Returns the status code if this is an `exit:<code>` kind.
    pub fn exit_status(&self) -> Option<i32> {
        self.0.strip_prefix("exit:").and_then(|code| code.parse().ok())
    }

    /// Returns the kind's name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Kinds the retryable bucket starts out with.
    pub fn default_retryables() -> Vec<ExceptionKind> {
        vec![
            Self::TIMEOUT,
            Self::NETWORK_UNREACHABLE,
            Self::CONNECTION_REFUSED,
        ]
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for ExceptionKind {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl From<String> for ExceptionKind {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

/// Explicit is-a table between exception kinds.
///
/// Each kind has at most one parent. Lookups walk from a kind up through its
/// ancestors; a cycle ends the walk instead of looping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KindHierarchy {
    parents: HashMap<ExceptionKind, ExceptionKind>,
}

impl KindHierarchy {
    /// Creates an empty hierarchy where every kind only matches itself.
    pub fn new() -> Self {
        Self::default()
    }

    /// The hierarchy installed when nothing else is configured.
    ///
    /// Exit code 124 (coreutils `timeout`), 137 (SIGKILL) and 143 (SIGTERM)
    /// are treated as timeouts.
    pub fn builtin() -> Self {
        Self::new()
            .with_parent(ExceptionKind::exit_code(124), ExceptionKind::TIMEOUT)
            .with_parent(ExceptionKind::exit_code(137), ExceptionKind::TIMEOUT)
            .with_parent(ExceptionKind::exit_code(143), ExceptionKind::TIMEOUT)
    }

    /// Declares `child` to be a kind of `parent`, replacing any previous parent.
    pub fn with_parent(
        mut self,
        child: impl Into<ExceptionKind>,
        parent: impl Into<ExceptionKind>,
    ) -> Self {
        self.insert(child, parent);
        self
    }

    /// In-place form of [`with_parent`](Self::with_parent).
    pub fn insert(&mut self, child: impl Into<ExceptionKind>, parent: impl Into<ExceptionKind>) {
        self.parents.insert(child.into(), parent.into());
    }

    /// Returns the direct parent of `kind`, if any.
    pub fn parent(&self, kind: &ExceptionKind) -> Option<&ExceptionKind> {
        self.parents.get(kind)
    }

    /// Returns `kind` followed by each of its ancestors, nearest first.
    pub fn lineage<'a>(&'a self, kind: &'a ExceptionKind) -> Vec<&'a ExceptionKind> {
        let mut seen: HashSet<&ExceptionKind> = HashSet::new();
        let mut lineage = Vec::new();
        let mut current = Some(kind);

        while let Some(k) = current {
            if !seen.insert(k) {
                break;
            }
            lineage.push(k);
            current = self.parents.get(k);
        }

        lineage
    }

    /// Returns true if `kind` is `ancestor` or descends from it.
    pub fn is_a(&self, kind: &ExceptionKind, ancestor: &ExceptionKind) -> bool {
        self.lineage(kind).into_iter().any(|k| k == ancestor)
    }

    /// Number of declared parent links.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Returns true if no parent links are declared.
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display_and_as_str() {
        let kind = ExceptionKind::new("argument_error");
        assert_eq!(kind.as_str(), "argument_error");
        assert_eq!(format!("{}", kind), "argument_error");
    }

    #[test]
    fn test_borrowed_and_owned_kinds_are_equal() {
        let borrowed = ExceptionKind::from("timeout");
        let owned = ExceptionKind::from("timeout".to_string());
        assert_eq!(borrowed, owned);
        assert_eq!(borrowed, ExceptionKind::TIMEOUT);
    }

    #[test]
    fn test_exit_code_kind() {
        assert_eq!(ExceptionKind::exit_code(2).as_str(), "exit:2");
        assert_eq!(ExceptionKind::exit_code(2).exit_status(), Some(2));
        assert_eq!(ExceptionKind::TIMEOUT.exit_status(), None);
    }

    #[test]
    fn test_default_retryables() {
        let defaults = ExceptionKind::default_retryables();
        assert_eq!(defaults.len(), 3);
        assert!(defaults.contains(&ExceptionKind::TIMEOUT));
        assert!(defaults.contains(&ExceptionKind::NETWORK_UNREACHABLE));
        assert!(defaults.contains(&ExceptionKind::CONNECTION_REFUSED));
    }

    #[test]
    fn test_empty_hierarchy_only_matches_self() {
        let hierarchy = KindHierarchy::new();
        let kind = ExceptionKind::new("a");

        assert!(hierarchy.is_a(&kind, &kind));
        assert!(!hierarchy.is_a(&kind, &ExceptionKind::new("b")));
        assert!(hierarchy.is_empty());
    }

    #[test]
    fn test_transitive_is_a() {
        let hierarchy = KindHierarchy::new()
            .with_parent("read_timeout", "timeout")
            .with_parent("timeout", "transient");

        let read_timeout = ExceptionKind::new("read_timeout");
        assert!(hierarchy.is_a(&read_timeout, &ExceptionKind::TIMEOUT));
        assert!(hierarchy.is_a(&read_timeout, &ExceptionKind::new("transient")));
        assert!(!hierarchy.is_a(&ExceptionKind::TIMEOUT, &read_timeout));
    }

    #[test]
    fn test_lineage_order() {
        let hierarchy = KindHierarchy::new()
            .with_parent("c", "b")
            .with_parent("b", "a");
        let c = ExceptionKind::new("c");

        let names: Vec<&str> = hierarchy.lineage(&c).iter().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_cycle_terminates() {
        let hierarchy = KindHierarchy::new()
            .with_parent("a", "b")
            .with_parent("b", "a");
        let a = ExceptionKind::new("a");

        assert_eq!(hierarchy.lineage(&a).len(), 2);
        assert!(!hierarchy.is_a(&a, &ExceptionKind::new("c")));
    }

    #[test]
    fn test_builtin_maps_exit_codes_to_timeout() {
        let hierarchy = KindHierarchy::builtin();

        for code in [124, 137, 143] {
            assert!(hierarchy.is_a(&ExceptionKind::exit_code(code), &ExceptionKind::TIMEOUT));
        }
        assert!(!hierarchy.is_a(&ExceptionKind::exit_code(1), &ExceptionKind::TIMEOUT));
        assert_eq!(hierarchy.len(), 3);
    }
}
