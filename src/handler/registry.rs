//! The three classification buckets and their lookup rules.

use crate::error::{Bucket, Classification, ExceptionKind, HandlerError, KindHierarchy};

/// Registry of exception kinds per bucket.
///
/// Buckets only grow. A kind may sit in several buckets at once; lookups
/// resolve that by testing buckets in precedence order (ignorables,
/// retryables, unretryables).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    ignorables: Vec<ExceptionKind>,
    retryables: Vec<ExceptionKind>,
    unretryables: Vec<ExceptionKind>,
    hierarchy: KindHierarchy,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates a registry with the default retryables and the built-in
    /// kind hierarchy.
    pub fn new() -> Self {
        Self::with_hierarchy(KindHierarchy::builtin())
    }

    /// Creates a registry with the default retryables and a custom hierarchy.
    pub fn with_hierarchy(hierarchy: KindHierarchy) -> Self {
        Self {
            ignorables: Vec::new(),
            retryables: ExceptionKind::default_retryables(),
            unretryables: Vec::new(),
            hierarchy,
        }
    }

    /// Adds `kind` to the bucket named `bucket`.
    ///
    /// Fails with [`HandlerError::InvalidBucket`] without touching any bucket
    /// when the name is not one of `ignorables`, `retryables`, `unretryables`.
    pub fn add(
        &mut self,
        kind: impl Into<ExceptionKind>,
        bucket: &str,
    ) -> Result<(), HandlerError> {
        let bucket: Bucket = bucket.parse()?;
        self.add_to(kind, bucket);
        Ok(())
    }

    /// Adds `kind` to `bucket`.
    pub fn add_to(&mut self, kind: impl Into<ExceptionKind>, bucket: Bucket) {
        self.bucket_mut(bucket).push(kind.into());
    }

    /// Read-only view of a bucket, in insertion order.
    pub fn kinds(&self, bucket: Bucket) -> &[ExceptionKind] {
        match bucket {
            Bucket::Ignorables => &self.ignorables,
            Bucket::Retryables => &self.retryables,
            Bucket::Unretryables => &self.unretryables,
        }
    }

    /// Kinds that are fully absorbed.
    pub fn ignorables(&self) -> &[ExceptionKind] {
        &self.ignorables
    }

    /// Kinds that trigger the retry escalator.
    pub fn retryables(&self) -> &[ExceptionKind] {
        &self.retryables
    }

    /// Kinds that are absorbed after recording.
    pub fn unretryables(&self) -> &[ExceptionKind] {
        &self.unretryables
    }

    /// The is-a table used when matching kinds.
    pub fn hierarchy(&self) -> &KindHierarchy {
        &self.hierarchy
    }

    /// Returns true if `kind`, or one of its ancestors, is in `bucket`.
    pub fn contains(&self, bucket: Bucket, kind: &ExceptionKind) -> bool {
        let members = self.kinds(bucket);
        self.hierarchy
            .lineage(kind)
            .into_iter()
            .any(|k| members.contains(k))
    }

    /// Classifies `kind`; the first matching bucket wins, otherwise
    /// [`Classification::Unknown`].
    pub fn classify(&self, kind: &ExceptionKind) -> Classification {
        Bucket::ALL
            .into_iter()
            .find(|bucket| self.contains(*bucket, kind))
            .map(Classification::from)
            .unwrap_or(Classification::Unknown)
    }

    fn bucket_mut(&mut self, bucket: Bucket) -> &mut Vec<ExceptionKind> {
        match bucket {
            Bucket::Ignorables => &mut self.ignorables,
            Bucket::Retryables => &mut self.retryables,
            Bucket::Unretryables => &mut self.unretryables,
        }
    }
}
