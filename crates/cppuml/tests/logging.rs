//! Tests for logging functionality
//!
//! These tests verify that logging initialization works with different
//! configurations and that pipeline stages emit their spans and events.

use std::io;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use cppuml::core::logging::{init_logging, LogFormat, LOG_FORMAT_ENV, LOG_LEVEL_ENV};
use cppuml::prelude::*;
use tracing_subscriber::util::SubscriberInitExt;

/// Writer that keeps everything in memory
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture(level: tracing::Level) -> (Captured, tracing::subscriber::DefaultGuard) {
    let captured = Captured::default();
    let writer = captured.clone();
    let guard = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(level)
        .set_default();
    (captured, guard)
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_log_format_parsing() {
    assert_eq!(LogFormat::from_str("compact").unwrap(), LogFormat::Compact);
    assert_eq!(LogFormat::from_str("pretty").unwrap(), LogFormat::Pretty);
    assert_eq!(LogFormat::from_str("json").unwrap(), LogFormat::Json);
    assert_eq!(LogFormat::from_str("COMPACT").unwrap(), LogFormat::Compact);
    assert!(LogFormat::from_str("invalid").is_err());
}

#[test]
fn test_log_format_variants() {
    let variants = LogFormat::variants();
    assert!(variants.contains(&"compact"));
    assert!(variants.contains(&"pretty"));
    assert!(variants.contains(&"json"));
}

#[test]
fn test_environment_variable_names() {
    assert_eq!(LOG_LEVEL_ENV, "CPPUML_LOG_LEVEL");
    assert_eq!(LOG_FORMAT_ENV, "CPPUML_LOG_FORMAT");
}

#[test]
fn test_init_logging_with_levels_and_formats() {
    // Only the first call can install the global subscriber; the rest must
    // fail gracefully rather than panic
    let _ = init_logging(Some("trace"), Some("compact"));
    let _ = init_logging(Some("debug"), Some("pretty"));
    let _ = init_logging(Some("warn"), Some("json"));
    let _ = init_logging(Some("off"), Some("compact"));
    let _ = init_logging(Some("not a level"), Some("compact"));
    let _ = init_logging(None, None);
}

#[test]
fn test_init_logging_invalid_format() {
    let result = init_logging(Some("info"), Some("invalid_format"));
    assert!(result.is_err());
}

// ============================================================================
// Pipeline spans and events
// ============================================================================

#[test]
fn test_resolve_and_render_emit_events() {
    let (captured, _guard) = capture(tracing::Level::DEBUG);

    let unit = cppuml::extract_source("ab.cpp", "class A {}; class B : public A {};").unwrap();
    let output = PlantUmlRenderer::new().render_unit(&unit);
    assert!(output.contains("A <|-- B"));

    let logs = captured.text();
    assert!(logs.contains("resolve_project"));
    assert!(logs.contains("Project resolved"));
    assert!(logs.contains("render_plantuml"));
    assert!(logs.contains("Rendering completed"));
}

#[test]
fn test_failed_unit_is_warned() {
    let (captured, _guard) = capture(tracing::Level::INFO);

    let pipeline = Pipeline::treesitter();
    let report = pipeline.extract_all(&["/nonexistent/cppuml/missing.cpp".into()], &[]);
    assert_eq!(report.failures.len(), 1);

    let logs = captured.text();
    assert!(logs.contains("WARN"));
    assert!(logs.contains("Unit extraction failed"));
    assert!(logs.contains("Extraction finished"));
}

#[test]
fn test_level_filter_hides_debug_events() {
    let (captured, _guard) = capture(tracing::Level::WARN);

    let unit = cppuml::extract_source("a.cpp", "class A {};").unwrap();
    let _ = PlantUmlRenderer::new().render_unit(&unit);

    let logs = captured.text();
    assert!(!logs.contains("Rendering completed"));
    assert!(!logs.contains("Project resolved"));
}
