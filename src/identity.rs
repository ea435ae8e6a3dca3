//! Crate identity information.

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Human-facing label.
pub const LABEL: &str = "Jobguard";

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Label and version, e.g. `Jobguard 0.1.0`.
pub fn version_label() -> String {
    format!("{} {}", LABEL, VERSION)
}
