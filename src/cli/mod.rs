//! CLI module for mongoquery
//!
//! Provides command-line interface for:
//! - explain: compile a query document and print its plan
//! - query: compile, execute against a JSON data file, print rows

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{execute_request, explain, explain_request, query, result_json, run, run_command, Config};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{parse_request, read_request, write_error, write_response, QueryRequest};
