//! Handler configuration.
//!
//! Settings come from an optional TOML file, then `JOBGUARD__*` environment
//! overrides, then the `DUMP_EXCEPTIONS` switch. Everything is read once when
//! the configuration is loaded; the handler never looks at the environment.
//!
//! ```toml
//! rescue_retryable_errors = false
//! dump_exceptions = false
//!
//! [buckets]
//! ignorables = ["argument_error"]
//! retryables = ["exit:75"]
//! unretryables = ["no_method_error"]
//!
//! [[hierarchy]]
//! child = "ReadTimeout"
//! parent = "timeout"
//! ```
//!
//! Bucket lists can also be set from the environment as comma-separated
//! values, e.g. `JOBGUARD__BUCKETS__IGNORABLES=argument_error,exit:3`.

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::error::{ExceptionKind, HandlerError, KindHierarchy};
use crate::handler::{ExceptionContext, ExceptionHandlerBuilder, Registry};
use crate::logging::flag_enabled;

/// Environment variable that turns exception dumping on.
pub const DUMP_EXCEPTIONS_VAR: &str = "DUMP_EXCEPTIONS";

/// Prefix for environment overrides, e.g. `JOBGUARD__RESCUE_RETRYABLE_ERRORS=true`.
pub const ENV_PREFIX: &str = "JOBGUARD";

/// Errors that can occur when loading handler configuration.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// The configuration file was not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// The configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(#[from] ConfigError),

    /// The configuration file path is invalid.
    #[error("invalid configuration path: {0}")]
    InvalidPath(String),
}

/// A child kind to parent kind link in the configured hierarchy.
///
/// Stored as a table rather than a map entry so the kind names keep their
/// case.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HierarchyLink {
    /// The more specific kind
    pub child: String,
    /// The kind it is treated as
    pub parent: String,
}

/// Extra kinds per bucket, added on top of the registry defaults.
///
/// Keys are bucket names; anything other than `ignorables`, `retryables` or
/// `unretryables` is rejected when the configuration is applied.
pub type BucketConfig = BTreeMap<String, Vec<String>>;

/// Handler settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HandlerConfig {
    /// Absorb retryable failures instead of signalling a retry
    #[serde(default)]
    pub rescue_retryable_errors: bool,
    /// Dump handled failures to the logger
    #[serde(default)]
    pub dump_exceptions: bool,
    /// Kinds to add per bucket
    #[serde(default)]
    pub buckets: BucketConfig,
    /// Parent links added on top of the built-in hierarchy
    #[serde(default)]
    pub hierarchy: Vec<HierarchyLink>,
}

impl HandlerConfig {
    /// Load configuration from a TOML file with environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration file does not exist
    /// - The configuration file cannot be parsed
    /// - The path is invalid
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use jobguard::config::HandlerConfig;
    ///
    /// let config = HandlerConfig::load("jobguard.toml")?;
    /// # Ok::<(), jobguard::config::ConfigLoadError>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        let path_str = path
            .to_str()
            .ok_or_else(|| ConfigLoadError::InvalidPath(format!("{:?}", path)))?;

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound(path_str.to_string()));
        }

        let builder = Config::builder().add_source(File::new(path_str, FileFormat::Toml));
        Self::build(builder)
    }

    /// Load configuration from environment overrides only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        Self::build(Config::builder())
    }

    /// Parse configuration from a TOML string, without environment overrides.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigLoadError> {
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("buckets.ignorables")
                    .with_list_parse_key("buckets.retryables")
                    .with_list_parse_key("buckets.unretryables"),
            )
            .build()?;

        let mut handler_config: HandlerConfig = config.try_deserialize()?;
        if let Ok(value) = std::env::var(DUMP_EXCEPTIONS_VAR) {
            handler_config.dump_exceptions = flag_enabled(Some(&value));
        }
        Ok(handler_config)
    }

    /// Add `kind` to the bucket named `bucket` in this configuration.
    pub fn with_kind(mut self, bucket: &str, kind: impl Into<String>) -> Self {
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .push(kind.into());
        self
    }

    /// The built-in hierarchy extended with the configured links.
    pub fn kind_hierarchy(&self) -> KindHierarchy {
        let mut hierarchy = KindHierarchy::builtin();
        for link in &self.hierarchy {
            hierarchy.insert(
                ExceptionKind::from(link.child.clone()),
                ExceptionKind::from(link.parent.clone()),
            );
        }
        hierarchy
    }

    /// Build the registry described by this configuration.
    ///
    /// Fails with [`HandlerError::InvalidBucket`] on the first unknown bucket
    /// name.
    pub fn registry(&self) -> Result<Registry, HandlerError> {
        let mut registry = Registry::with_hierarchy(self.kind_hierarchy());
        for (bucket, kinds) in &self.buckets {
            for kind in kinds {
                registry.add(ExceptionKind::from(kind.clone()), bucket)?;
            }
        }
        Ok(registry)
    }

    /// Start a handler builder for `context` with these settings applied.
    ///
    /// Processors and logger are left at the builder defaults.
    pub fn handler_builder(
        &self,
        context: ExceptionContext,
    ) -> Result<ExceptionHandlerBuilder, HandlerError> {
        Ok(ExceptionHandlerBuilder::new(context)
            .registry(self.registry()?)
            .rescue_retryable_errors(self.rescue_retryable_errors)
            .dump_exceptions(self.dump_exceptions))
    }
}
