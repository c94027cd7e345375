//! Integration tests for the protocol session handler.
//!
//! Sessions run over in-memory duplex pipes, so every test sees exactly
//! the bytes a KSysGuard frontend would.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use ksg_core::{Sensor, SensorError, SensorRegistry, SensorResult, ValueType};
use ksg_protocol::{banner, PROMPT};
use ksg_server::server::{SessionEnd, SessionError, SessionHandler, MAX_LINE_LENGTH};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf};

// ============================================================================
// Test Helpers
// ============================================================================

/// Sensor with fixed readings and a switch to make reads fail.
#[derive(Debug)]
struct MockSensor {
    name: String,
    description: String,
    value_type: ValueType,
    unit: String,
    value: String,
    min: String,
    max: String,
    failing: Arc<AtomicBool>,
}

impl MockSensor {
    fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            description: "GPU Clock Speed".to_string(),
            value_type: ValueType::Integer,
            unit: "Mhz".to_string(),
            value: value.to_string(),
            min: "300".to_string(),
            max: "2100".to_string(),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    fn float(mut self) -> Self {
        self.value_type = ValueType::Float;
        self
    }

    fn described(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Returns a switch that makes all later reads fail.
    fn failure_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.failing)
    }

    fn read(&self, reading: &str) -> SensorResult<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SensorError::Unavailable {
                sensor: self.name.clone(),
                reason: "device gone".to_string(),
            });
        }
        Ok(reading.to_string())
    }
}

impl Sensor for MockSensor {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn value_type(&self) -> ValueType {
        self.value_type
    }
    fn units(&self) -> &str {
        &self.unit
    }
    fn value(&self) -> SensorResult<String> {
        self.read(&self.value)
    }
    fn min(&self) -> SensorResult<String> {
        self.read(&self.min)
    }
    fn max(&self) -> SensorResult<String> {
        self.read(&self.max)
    }
}

fn registry_with(sensors: Vec<MockSensor>) -> SensorRegistry {
    let mut registry = SensorRegistry::new();
    for sensor in sensors {
        assert!(registry.add(sensor));
    }
    registry
}

/// Feeds `input` to a fresh session, closes the client's write side and
/// returns everything the session wrote plus how it ended.
async fn run_session(
    registry: SensorRegistry,
    input: &[u8],
) -> (String, Result<SessionEnd, SessionError>) {
    let (mut client, server) = tokio::io::duplex(256 * 1024);
    let (reader, writer) = tokio::io::split(server);
    let handler = SessionHandler::new(reader, writer, Arc::new(registry), "test");
    let session = tokio::spawn(handler.run());

    client.write_all(input).await.unwrap();
    client.shutdown().await.unwrap();

    let mut output = String::new();
    client.read_to_string(&mut output).await.unwrap();

    (output, session.await.unwrap())
}

/// Reader whose every read fails, like a reset connection.
struct BrokenReader;

impl AsyncRead for BrokenReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset",
        )))
    }
}

/// Banner plus the first prompt.
fn greeting() -> String {
    format!("{}\n{}", banner(), PROMPT)
}

// ============================================================================
// Command Tests
// ============================================================================

#[tokio::test]
async fn test_greeting_then_eof() {
    let (output, end) = run_session(SensorRegistry::new(), b"").await;
    assert_eq!(output, format!("{}\n", greeting()));
    assert_eq!(end.unwrap(), SessionEnd::EndOfInput);
}

#[tokio::test]
async fn test_value_query() {
    let registry = registry_with(vec![MockSensor::new("sclk", "1400")]);
    let (output, _) = run_session(registry, b"sclk\n").await;
    assert_eq!(output, format!("{}1400\n{PROMPT}\n", greeting()));
}

#[tokio::test]
async fn test_info_query() {
    let registry = registry_with(vec![MockSensor::new("sclk", "1400")]);
    let (output, _) = run_session(registry, b"sclk?\n").await;
    assert_eq!(
        output,
        format!("{}GPU Clock Speed\t300\t2100\tMhz\n{PROMPT}\n", greeting())
    );
}

#[tokio::test]
async fn test_info_query_replaces_tabs_in_description() {
    let sensor = MockSensor::new("sclk", "1400").described("GPU\tClock\tSpeed");
    let (output, _) = run_session(registry_with(vec![sensor]), b"sclk?\n").await;
    assert!(output.contains("GPU Clock Speed\t300\t2100\tMhz\n"));
}

#[tokio::test]
async fn test_monitors_lists_every_sensor_once() {
    let registry = registry_with(vec![
        MockSensor::new("sclk", "1400"),
        MockSensor::new("pcie", "8.0").float(),
        MockSensor::new("mclk", "875"),
    ]);
    let (output, _) = run_session(registry, b"monitors\n").await;

    let listing = output
        .strip_prefix(&greeting())
        .and_then(|rest| rest.strip_suffix(&format!("{PROMPT}\n")))
        .expect("listing between prompts");

    let mut lines: Vec<_> = listing.split_inclusive('\n').collect();
    lines.sort_unstable();
    assert_eq!(lines, vec!["mclk\tinteger\n", "pcie\tfloat\n", "sclk\tinteger\n"]);
}

#[tokio::test]
async fn test_monitors_on_empty_registry() {
    let (output, _) = run_session(SensorRegistry::new(), b"monitors\n").await;
    assert_eq!(output, format!("{}{PROMPT}\n", greeting()));
}

#[tokio::test]
async fn test_quit_ends_session_without_further_output() {
    let registry = registry_with(vec![MockSensor::new("sclk", "1400")]);
    let (output, end) = run_session(registry, b"quit\nsclk\n").await;
    assert_eq!(output, greeting());
    assert_eq!(end.unwrap(), SessionEnd::Quit);
}

#[tokio::test]
async fn test_unknown_line_is_ignored() {
    let registry = registry_with(vec![MockSensor::new("sclk", "1400")]);
    let (output, end) = run_session(registry, b"bogus\nmclk?\n\nsclk\n").await;
    assert_eq!(
        output,
        format!("{}{PROMPT}{PROMPT}{PROMPT}1400\n{PROMPT}\n", greeting())
    );
    assert_eq!(end.unwrap(), SessionEnd::EndOfInput);
}

#[tokio::test]
async fn test_surrounding_whitespace_and_crlf() {
    let registry = registry_with(vec![MockSensor::new("sclk", "1400")]);
    let (output, _) = run_session(registry, b"  sclk \r\n").await;
    assert_eq!(output, format!("{}1400\n{PROMPT}\n", greeting()));
}

#[tokio::test]
async fn test_final_line_without_newline_is_processed() {
    let registry = registry_with(vec![MockSensor::new("sclk", "1400")]);
    let (output, _) = run_session(registry, b"sclk").await;
    assert_eq!(output, format!("{}1400\n{PROMPT}\n", greeting()));
}

#[tokio::test]
async fn test_invalid_utf8_does_not_end_session() {
    let registry = registry_with(vec![MockSensor::new("sclk", "1400")]);
    let (output, end) = run_session(registry, b"\xff\xfe\nsclk\n").await;
    assert_eq!(output, format!("{}{PROMPT}1400\n{PROMPT}\n", greeting()));
    assert_eq!(end.unwrap(), SessionEnd::EndOfInput);
}

// ============================================================================
// Failure Tests
// ============================================================================

#[tokio::test]
async fn test_failed_read_yields_no_reply() {
    let sensor = MockSensor::new("sclk", "1400");
    let switch = sensor.failure_switch();
    let registry = registry_with(vec![sensor, MockSensor::new("mclk", "875")]);
    switch.store(true, Ordering::SeqCst);

    let (output, end) = run_session(registry, b"sclk\nmclk\n").await;
    assert_eq!(output, format!("{}{PROMPT}875\n{PROMPT}\n", greeting()));
    assert_eq!(end.unwrap(), SessionEnd::EndOfInput);
}

#[tokio::test]
async fn test_failed_bounds_still_send_info_line() {
    let sensor = MockSensor::new("sclk", "1400");
    let switch = sensor.failure_switch();
    let registry = registry_with(vec![sensor]);
    switch.store(true, Ordering::SeqCst);

    let (output, _) = run_session(registry, b"sclk?\n").await;
    assert_eq!(
        output,
        format!("{}GPU Clock Speed\t\t\tMhz\n{PROMPT}\n", greeting())
    );
}

#[tokio::test]
async fn test_read_error_still_writes_trailing_newline() {
    let (mut client, server) = tokio::io::duplex(64 * 1024);
    let handler = SessionHandler::new(BrokenReader, server, Arc::new(SensorRegistry::new()), "test");

    let end = handler.run().await;
    assert!(matches!(end, Err(SessionError::Io(_))));

    let mut output = String::new();
    client.read_to_string(&mut output).await.unwrap();
    assert_eq!(output, format!("{}\n", greeting()));
}

#[tokio::test]
async fn test_long_unmatched_line_keeps_session_open() {
    let mut input = vec![b'x'; 5000];
    input.extend_from_slice(b"\nmonitors\n");

    let (output, end) = run_session(SensorRegistry::new(), &input).await;
    assert_eq!(output, format!("{}{PROMPT}{PROMPT}\n", greeting()));
    assert_eq!(end.unwrap(), SessionEnd::EndOfInput);
}

#[tokio::test]
async fn test_overlong_line_is_discarded() {
    let registry = registry_with(vec![MockSensor::new("sclk", "1400")]);
    // Spans several read chunks before its newline arrives.
    let mut input = vec![b'a'; MAX_LINE_LENGTH * 3 + 10];
    input.extend_from_slice(b"\nsclk\n");

    let (output, end) = run_session(registry, &input).await;
    assert_eq!(output, format!("{}{PROMPT}1400\n{PROMPT}\n", greeting()));
    assert_eq!(end.unwrap(), SessionEnd::EndOfInput);
}

#[tokio::test]
async fn test_overlong_final_line_without_newline() {
    let input = vec![b'a'; MAX_LINE_LENGTH + 1];
    let (output, end) = run_session(SensorRegistry::new(), &input).await;
    assert_eq!(output, format!("{}{PROMPT}\n", greeting()));
    assert_eq!(end.unwrap(), SessionEnd::EndOfInput);
}

#[tokio::test]
async fn test_line_at_limit_is_accepted() {
    let registry = registry_with(vec![MockSensor::new("sclk", "1400")]);
    let mut input = vec![b' '; MAX_LINE_LENGTH - 4];
    input.extend_from_slice(b"sclk\n");

    let (output, end) = run_session(registry, &input).await;
    assert_eq!(output, format!("{}1400\n{PROMPT}\n", greeting()));
    assert_eq!(end.unwrap(), SessionEnd::EndOfInput);
}

// ============================================================================
// Keyword Precedence
// ============================================================================

#[tokio::test]
async fn test_keyword_wins_over_sensor_name() {
    let registry = registry_with(vec![MockSensor::new("quit", "1")]);
    let (output, end) = run_session(registry, b"quit\n").await;
    assert_eq!(output, greeting());
    assert_eq!(end.unwrap(), SessionEnd::Quit);
}

#[tokio::test]
async fn test_reserved_name_metadata_still_reachable() {
    let registry = registry_with(vec![MockSensor::new("monitors", "1")]);
    let (output, _) = run_session(registry, b"monitors?\n").await;
    assert!(output.contains("GPU Clock Speed\t300\t2100\tMhz\n"));
}
