//! taxiidb CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`. On failure the error
//! is written to stdout as a JSON error response and the process exits
//! non-zero.

use taxiidb::cli;

fn main() {
    if let Err(e) = cli::run() {
        if cli::write_error(e.code_str(), e.message()).is_err() {
            eprintln!("{}", e);
        }
        std::process::exit(1);
    }
}
