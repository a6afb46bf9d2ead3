//! CLI module for taxiidb
//!
//! Provides command-line access to a configured store:
//! - check: load and verify, printing the consistency report
//! - discovery, collections: registry reads
//! - manifest, objects, versions: filtered reads
//! - add, delete: writes (file engine only)

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, Query, Target};
pub use commands::{run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_objects, write_error, write_response};
