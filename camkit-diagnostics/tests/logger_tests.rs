//! Tests for the prefixed, debug-gated subscriber

use camkit_diagnostics::{DebugLogger, LoggingConfig, LoggingError, LOG_PREFIX};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_logger(
    config: LoggingConfig,
) -> (impl tracing::Subscriber + Send + Sync + 'static, DebugLogger, Capture) {
    let capture = Capture::default();
    let writer = capture.clone();
    let (subscriber, logger) = DebugLogger::build(&config, move || writer.clone()).unwrap();
    (subscriber, logger, capture)
}

#[test]
fn test_lines_carry_prefix() {
    let (subscriber, _logger, capture) = capture_logger(LoggingConfig::default());

    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(target: "camkit_media::recording", "Recording started");
    });

    let lines = capture.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with(LOG_PREFIX));
    assert!(lines[0].contains("Recording started"));
}

#[test]
fn test_debug_is_gated_at_runtime() {
    let (subscriber, logger, capture) = capture_logger(LoggingConfig::default());
    assert!(!logger.is_debug());

    tracing::subscriber::with_default(subscriber, || {
        tracing::debug!(target: "camkit_core::devices", "hidden");
        logger.set_debug(true).unwrap();
        tracing::debug!(target: "camkit_core::devices", "shown");
        logger.set_debug(false).unwrap();
        tracing::debug!(target: "camkit_core::devices", "hidden again");
    });

    let lines = capture.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("shown"));
}

#[test]
fn test_other_targets_are_filtered() {
    let config = LoggingConfig {
        debug: true,
        ..Default::default()
    };
    let (subscriber, _logger, capture) = capture_logger(config);

    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(target: "hyper::client", "unrelated");
        tracing::debug!(target: "camkit::session", "session detail");
    });

    let lines = capture.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("session detail"));
}

#[test]
fn test_global_init_once() {
    let logger = DebugLogger::init(&LoggingConfig::default()).unwrap();
    logger.set_debug(true).unwrap();
    assert!(logger.is_debug());

    let second = DebugLogger::init(&LoggingConfig::default());
    assert!(matches!(second, Err(LoggingError::AlreadyInitialized { .. })));
}
