//! CLI argument definitions using clap
//!
//! Commands:
//! - taxiidb check --config <path>
//! - taxiidb discovery --config <path>
//! - taxiidb collections --config <path> --root <name>
//! - taxiidb manifest --config <path> --root <name> --collection <id> [--filter k=v]... [--limit n]
//! - taxiidb objects --config <path> --root <name> --collection <id> [--filter k=v]... [--limit n]
//! - taxiidb versions --config <path> --root <name> --collection <id> --id <object-id>
//! - taxiidb add --config <path> --root <name> --collection <id> < objects.json
//! - taxiidb delete --config <path> --root <name> --collection <id> --id <object-id>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// taxiidb - versioned object store and manifest engine
#[derive(Parser, Debug)]
#[command(name = "taxiidb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Location of one collection.
#[derive(Args, Debug, Clone)]
pub struct Target {
    /// Path to configuration file
    #[arg(long, default_value = "./taxiidb.json")]
    pub config: PathBuf,

    /// API root name
    #[arg(long)]
    pub root: String,

    /// Collection id or alias
    #[arg(long)]
    pub collection: String,
}

/// Query filters, as `key=value` pairs.
#[derive(Args, Debug, Clone, Default)]
pub struct Query {
    /// Filter such as `match[type]=indicator` or `added_after=2017-01-01T00:00:00Z`
    #[arg(long = "filter", value_parser = parse_filter)]
    pub filters: Vec<(String, String)>,

    /// Maximum rows to return
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the store, load the configured snapshot and report consistency
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./taxiidb.json")]
        config: PathBuf,
    },

    /// Print the discovery document and API root information
    Discovery {
        /// Path to configuration file
        #[arg(long, default_value = "./taxiidb.json")]
        config: PathBuf,
    },

    /// List the collections of an API root
    Collections {
        /// Path to configuration file
        #[arg(long, default_value = "./taxiidb.json")]
        config: PathBuf,

        /// API root name
        #[arg(long)]
        root: String,
    },

    /// List manifest entries
    Manifest {
        #[command(flatten)]
        target: Target,
        #[command(flatten)]
        query: Query,
    },

    /// List objects
    Objects {
        #[command(flatten)]
        target: Target,
        #[command(flatten)]
        query: Query,
    },

    /// List the versions of one object
    Versions {
        #[command(flatten)]
        target: Target,
        /// Object id
        #[arg(long)]
        id: String,
        #[command(flatten)]
        query: Query,
    },

    /// Add objects read from stdin (a JSON array or an envelope with "objects")
    Add {
        #[command(flatten)]
        target: Target,
        /// Request time; defaults to now
        #[arg(long)]
        request_time: Option<String>,
    },

    /// Delete versions of one object
    Delete {
        #[command(flatten)]
        target: Target,
        /// Object id
        #[arg(long)]
        id: String,
        #[command(flatten)]
        query: Query,
    },
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
