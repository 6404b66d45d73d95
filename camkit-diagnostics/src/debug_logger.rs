//! Structured debug logging

use camkit_core::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::{FmtContext, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{reload, EnvFilter, Registry};

/// Prefix written before every log line
pub const LOG_PREFIX: &str = "[CK-WEB]";

const QUIET_DIRECTIVE: &str = "camkit=info";
const DEBUG_DIRECTIVE: &str = "camkit=debug";

/// Logging failures
#[derive(Error, Debug)]
pub enum LoggingError {
    /// A global subscriber is already installed
    #[error("Logging already initialized: {reason}")]
    AlreadyInitialized {
        /// Underlying reason
        reason: String,
    },

    /// Filter directive could not be parsed
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter {
        /// The rejected directive
        filter: String,
        /// Parser message
        reason: String,
    },

    /// The installed subscriber is gone
    #[error("Log filter reload failed: {reason}")]
    Reload {
        /// Underlying reason
        reason: String,
    },
}

impl LoggingError {
    /// Logging problems never affect capture
    pub fn is_recoverable(&self) -> bool {
        true
    }

    /// Error category for handling
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Logger settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit camkit debug events
    pub debug: bool,
    /// Explicit directive overriding the debug switch, e.g. `camkit_media=trace`
    pub filter: Option<String>,
    /// Colorize output
    #[serde(default)]
    pub ansi: bool,
}

impl LoggingConfig {
    /// Directive the filter is built from
    pub fn directive(&self) -> String {
        match &self.filter {
            Some(filter) => filter.clone(),
            None if self.debug => DEBUG_DIRECTIVE.to_string(),
            None => QUIET_DIRECTIVE.to_string(),
        }
    }

    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        let directive = self.directive();
        EnvFilter::try_new(&directive).map_err(|e| LoggingError::InvalidFilter {
            filter: directive,
            reason: e.to_string(),
        })
    }
}

/// Event formatter that writes [`LOG_PREFIX`] before the wrapped format
#[derive(Debug, Clone, Default)]
pub struct PrefixedFormat<F = format::Format> {
    inner: F,
}

impl<F> PrefixedFormat<F> {
    /// Wrap an existing formatter
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

impl<S, N, F> FormatEvent<S, N> for PrefixedFormat<F>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    F: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "{} ", LOG_PREFIX)?;
        self.inner.format_event(ctx, writer, event)
    }
}

/// Handle to an installed camkit subscriber
///
/// Cloning shares the same filter; [`set_debug`](Self::set_debug) on any
/// clone affects every one.
#[derive(Debug, Clone)]
pub struct DebugLogger {
    handle: reload::Handle<EnvFilter, Registry>,
    config: LoggingConfig,
    debug: Arc<AtomicBool>,
}

impl DebugLogger {
    /// Build a subscriber writing to `writer`, without installing it
    pub fn build<W>(
        config: &LoggingConfig,
        writer: W,
    ) -> Result<(impl Subscriber + Send + Sync + 'static, DebugLogger), LoggingError>
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        let (filter, handle) = reload::Layer::new(config.env_filter()?);
        let subscriber = tracing_subscriber::registry().with(filter).with(
            tracing_subscriber::fmt::layer()
                .event_format(PrefixedFormat::new(format::Format::default()))
                .with_ansi(config.ansi)
                .with_writer(writer),
        );

        let logger = DebugLogger {
            handle,
            config: config.clone(),
            debug: Arc::new(AtomicBool::new(config.debug)),
        };
        Ok((subscriber, logger))
    }

    /// Install the global subscriber writing to stderr
    ///
    /// `RUST_LOG` replaces the configured directive when set. Fails with
    /// [`LoggingError::AlreadyInitialized`] if any global subscriber exists.
    pub fn init(config: &LoggingConfig) -> Result<DebugLogger, LoggingError> {
        let mut config = config.clone();
        if let Ok(env) = std::env::var(EnvFilter::DEFAULT_ENV) {
            if !env.is_empty() {
                config.filter = Some(env);
            }
        }

        let (subscriber, logger) = Self::build(&config, std::io::stderr)?;
        tracing::subscriber::set_global_default(subscriber).map_err(|e| {
            LoggingError::AlreadyInitialized {
                reason: e.to_string(),
            }
        })?;

        tracing::debug!("camkit logging initialized with {}", config.directive());
        Ok(logger)
    }

    /// Switch camkit debug events on or off
    ///
    /// An explicit filter directive is kept as is; only the flag changes.
    pub fn set_debug(&self, debug: bool) -> Result<(), LoggingError> {
        self.debug.store(debug, Ordering::SeqCst);
        if self.config.filter.is_some() {
            return Ok(());
        }

        let filter = LoggingConfig {
            debug,
            ..self.config.clone()
        }
        .env_filter()?;
        self.handle
            .reload(filter)
            .map_err(|e| LoggingError::Reload {
                reason: e.to_string(),
            })
    }

    /// Whether debug events are enabled
    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::SeqCst)
    }
}
