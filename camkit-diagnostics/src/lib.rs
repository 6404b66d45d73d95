//! # camkit diagnostics
//!
//! Logging setup for camkit. Installs a `tracing` subscriber whose events
//! carry the `[CK-WEB]` prefix and whose debug output can be switched on and
//! off at runtime.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod debug_logger;

// Re-export main types
pub use debug_logger::{DebugLogger, LoggingConfig, LoggingError, PrefixedFormat, LOG_PREFIX};
