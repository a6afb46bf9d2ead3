//! JSON I/O handling for the CLI
//!
//! - Input: one JSON document via stdin (`add` only)
//! - Output: one JSON object per command via stdout
//! - UTF-8 only

use std::io::{self, Read, Write};

use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Reads the objects to add from stdin.
///
/// Accepts a bare array or an envelope `{"objects": [...]}`.
pub fn read_objects() -> CliResult<Vec<Value>> {
    let mut input = String::new();
    io::stdin().lock().read_to_string(&mut input)?;
    parse_objects(&input)
}

fn parse_objects(input: &str) -> CliResult<Vec<Value>> {
    if input.trim().is_empty() {
        return Err(CliError::io_error("Empty input"));
    }
    match serde_json::from_str(input)? {
        Value::Array(objects) => Ok(objects),
        Value::Object(mut envelope) => match envelope.remove("objects") {
            Some(Value::Array(objects)) => Ok(objects),
            _ => Err(CliError::io_error("envelope has no 'objects' array")),
        },
        _ => Err(CliError::io_error("expected an array or an envelope")),
    }
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}
