//! Structured JSON logger
//!
//! - Deterministic key ordering
//! - Explicit severity levels
//! - One log line = one event
//! - Synchronous, no buffering
//!
//! The logger is a handle, not a global: clones share one sink.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use super::Event;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Per-object detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
    /// Store cannot serve
    Fatal = 4,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
enum Sink {
    /// stdout, with ERROR and FATAL going to stderr
    Stdio,
    Memory(Arc<Mutex<Vec<String>>>),
    Discard,
}

/// Lines captured by an in-memory logger.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LogCapture {
    /// Captured lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Captured lines parsed as JSON
    pub fn records(&self) -> Vec<serde_json::Value> {
        self.lines()
            .iter()
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect()
    }

    /// Whether any captured line carries `event`
    pub fn contains_event(&self, event: &str) -> bool {
        self.records().iter().any(|r| r["event"] == event)
    }
}

/// A structured logger that outputs JSON lines
#[derive(Clone)]
pub struct Logger {
    sink: Sink,
    min_severity: Severity,
}

impl Logger {
    /// Logger writing to the process's standard streams
    pub fn stdio() -> Self {
        Self {
            sink: Sink::Stdio,
            min_severity: Severity::Info,
        }
    }

    /// Logger that drops everything
    pub fn discard() -> Self {
        Self {
            sink: Sink::Discard,
            min_severity: Severity::Fatal,
        }
    }

    /// Logger recording every line in memory, at all severities
    pub fn capture() -> (Self, LogCapture) {
        let capture = LogCapture::default();
        let logger = Self {
            sink: Sink::Memory(Arc::clone(&capture.lines)),
            min_severity: Severity::Trace,
        };
        (logger, capture)
    }

    /// Drops lines below `severity`
    pub fn with_min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }

    /// Log an event at its own severity
    pub fn event(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(event.severity(), event.as_str(), fields);
    }

    /// Log an event with the given severity and fields
    ///
    /// Fields are output in deterministic order (alphabetical by key)
    pub fn log(&self, severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if severity < self.min_severity {
            return;
        }
        let line = render(severity, event, fields);
        match &self.sink {
            Sink::Stdio if severity >= Severity::Error => write_line(&mut io::stderr(), &line),
            Sink::Stdio => write_line(&mut io::stdout(), &line),
            Sink::Memory(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(line.trim_end().to_string());
                }
            }
            Sink::Discard => {}
        }
    }

    /// Log at TRACE level
    pub fn trace(&self, event: &str, fields: &[(&str, &str)]) {
        self.log(Severity::Trace, event, fields);
    }

    /// Log at INFO level
    pub fn info(&self, event: &str, fields: &[(&str, &str)]) {
        self.log(Severity::Info, event, fields);
    }

    /// Log at WARN level
    pub fn warn(&self, event: &str, fields: &[(&str, &str)]) {
        self.log(Severity::Warn, event, fields);
    }

    /// Log at ERROR level
    pub fn error(&self, event: &str, fields: &[(&str, &str)]) {
        self.log(Severity::Error, event, fields);
    }

    /// Log at FATAL level
    pub fn fatal(&self, event: &str, fields: &[(&str, &str)]) {
        self.log(Severity::Fatal, event, fields);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sink = match self.sink {
            Sink::Stdio => "stdio",
            Sink::Memory(_) => "memory",
            Sink::Discard => "discard",
        };
        f.debug_struct("Logger")
            .field("sink", &sink)
            .field("min_severity", &self.min_severity)
            .finish()
    }
}

fn write_line<W: Write>(writer: &mut W, line: &str) {
    // Write atomically (one syscall)
    let _ = writer.write_all(line.as_bytes());
    let _ = writer.flush();
}

/// Renders one JSON line: event first, then severity, then sorted fields.
fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(256);

    output.push_str("{\"event\":\"");
    escape_json_string(&mut output, event);
    output.push_str("\",\"severity\":\"");
    output.push_str(severity.as_str());
    output.push('"');

    let mut sorted_fields: Vec<_> = fields.iter().collect();
    sorted_fields.sort_by_key(|(k, _)| *k);

    for (key, value) in sorted_fields {
        output.push_str(",\"");
        escape_json_string(&mut output, key);
        output.push_str("\":\"");
        escape_json_string(&mut output, value);
        output.push('"');
    }

    output.push_str("}\n");
    output
}

fn escape_json_string(output: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            c if c.is_control() => {
                output.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => output.push(c),
        }
    }
}
