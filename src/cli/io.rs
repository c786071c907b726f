//! JSON I/O handling for CLI
//!
//! - Input: one JSON request document on stdin
//! - Output: one JSON response object on stdout
//! - UTF-8 only

use std::io::{self, Read, Write};

use serde::Deserialize;
use serde_json::{json, Value};

use super::errors::{CliError, CliResult};

/// A query request: the root entity and the query document
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryRequest {
    pub entity: String,
    #[serde(default = "empty_document")]
    pub query: Value,
}

fn empty_document() -> Value {
    json!({})
}

/// Read a JSON request from stdin
pub fn read_request() -> CliResult<QueryRequest> {
    let mut input = String::new();
    io::stdin().lock().read_to_string(&mut input)?;
    parse_request(&input)
}

/// Parse request text
pub fn parse_request(input: &str) -> CliResult<QueryRequest> {
    if input.trim().is_empty() {
        return Err(CliError::io_error("Empty input"));
    }

    serde_json::from_str(input)
        .map_err(|e| CliError::invalid_request(format!("Invalid request: {}", e)))
}

/// Success envelope
pub fn ok_response(data: Value) -> Value {
    json!({
        "status": "ok",
        "data": data
    })
}

/// Error envelope
pub fn error_response(code: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "code": code,
        "message": message
    })
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_json(&ok_response(data))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_json(&error_response(code, message))
}

/// Write one JSON value and a newline to stdout
pub fn write_json(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}
