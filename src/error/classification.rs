//! Classification types for handled job failures
//!
//! A failure is routed into exactly one [`Classification`]. Three of them are
//! backed by configurable registry buckets ([`Bucket`]); `Unknown` is the fixed
//! fallback for anything no bucket claims and can never be added to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A configurable registry bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// Known-benign failures that are fully absorbed.
    Ignorables,
    /// Transient failures that may go away on a retry.
    Retryables,
    /// Known-bad failures not worth retrying but worth recording.
    Unretryables,
}

impl Bucket {
    /// All buckets in classification precedence order.
    pub const ALL: [Bucket; 3] = [Bucket::Ignorables, Bucket::Retryables, Bucket::Unretryables];

    /// Returns the bucket's canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Ignorables => "ignorables",
            Bucket::Retryables => "retryables",
            Bucket::Unretryables => "unretryables",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a bucket.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("Invalid error category: {0}.")]
pub struct UnknownBucket(pub String);

impl FromStr for Bucket {
    type Err = UnknownBucket;

    /// Accepts the canonical plural names and their singular forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ignorables" | "ignorable" => Ok(Bucket::Ignorables),
            "retryables" | "retryable" => Ok(Bucket::Retryables),
            "unretryables" | "unretryable" => Ok(Bucket::Unretryables),
            other => Err(UnknownBucket(other.to_string())),
        }
    }
}

/// The path a handled failure was routed through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Matched the ignorable bucket.
    Ignorables,
    /// Matched the retryable bucket.
    Retryables,
    /// Matched the unretryable bucket.
    Unretryables,
    /// Matched no bucket.
    Unknown,
}

impl Classification {
    /// Returns the tag passed to processors and written to logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Ignorables => "ignorables",
            Classification::Retryables => "retryables",
            Classification::Unretryables => "unretryables",
            Classification::Unknown => "unknown",
        }
    }

    /// Returns the registry bucket behind this classification, if any.
    pub fn bucket(&self) -> Option<Bucket> {
        match self {
            Classification::Ignorables => Some(Bucket::Ignorables),
            Classification::Retryables => Some(Bucket::Retryables),
            Classification::Unretryables => Some(Bucket::Unretryables),
            Classification::Unknown => None,
        }
    }
}

impl From<Bucket> for Classification {
    fn from(bucket: Bucket) -> Self {
        match bucket {
            Bucket::Ignorables => Classification::Ignorables,
            Bucket::Retryables => Classification::Retryables,
            Bucket::Unretryables => Classification::Unretryables,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
