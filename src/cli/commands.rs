//! CLI command implementations
//!
//! Every command opens the store from its config file, performs one
//! operation and prints one JSON response. Startup follows the same path
//! as an embedded store: engine, snapshot load, consistency check.
//!
//! `add` and `delete` require the file engine; a memory store does not
//! outlive the command.

use std::path::Path;

use chrono::Utc;
use serde_json::{json, Value};

use crate::backend::{Backend, LISTING_FILTERS, OBJECT_FILTERS, VERSION_FILTERS};
use crate::config::{EngineConfig, StoreConfig};
use crate::engine::open_engine;
use crate::filter::{FilterArgs, Page};
use crate::loader::{BulkLoader, LoadOutcome};
use crate::model::{ManifestEntry, StoredObject};
use crate::observability::{Logger, Severity};
use crate::version::{parse_version, to_version, VersionKey};

use super::args::{Command, Query, Target};
use super::errors::{CliError, CliResult};
use super::io::{read_objects, write_response};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Check { config } => check(&config),
        Command::Discovery { config } => discovery(&config),
        Command::Collections { config, root } => collections(&config, &root),
        Command::Manifest { target, query } => manifest(&target, &query),
        Command::Objects { target, query } => objects(&target, &query),
        Command::Versions { target, id, query } => versions(&target, &id, &query),
        Command::Add {
            target,
            request_time,
        } => add(&target, request_time.as_deref()),
        Command::Delete { target, id, query } => delete(&target, &id, &query),
    }
}

/// Command output stays on stdout; only errors are logged, to stderr.
fn logger() -> Logger {
    Logger::stdio().with_min_severity(Severity::Error)
}

fn open(config_path: &Path) -> CliResult<Backend> {
    let config = StoreConfig::load(config_path)?;
    Ok(Backend::open(config, logger())?)
}

/// Loads a config that can keep a write past the end of the command.
fn writable_config(config_path: &Path) -> CliResult<StoreConfig> {
    let config = StoreConfig::load(config_path)?;
    if matches!(config.engine, EngineConfig::Memory) {
        return Err(CliError::config_error(format!(
            "{}: writes only persist with the file engine",
            config_path.display()
        )));
    }
    Ok(config)
}

/// Loads and checks the store without refusing to start, so the report can
/// be printed even when it lists violations.
pub fn check(config_path: &Path) -> CliResult<()> {
    let config = StoreConfig::load(config_path)?;
    let engine = open_engine(&config.engine)?;

    let load = match &config.initial_snapshot {
        Some(path) => {
            match BulkLoader::new(engine.clone(), logger()).load_file(path, config.clear_on_start)? {
                LoadOutcome::Loaded(stats) => json!({ "loaded": stats }),
                LoadOutcome::Skipped => json!("skipped"),
            }
        }
        None => Value::Null,
    };

    let backend = Backend::with_engine(engine, config, logger());
    let report = backend.check()?;
    write_response(json!({
        "consistent": report.is_consistent(),
        "load": load,
        "report": report,
    }))?;
    report.into_result()?;
    Ok(())
}

pub fn discovery(config_path: &Path) -> CliResult<()> {
    let backend = open(config_path)?;
    let roots = backend
        .engine()
        .api_root_names()?
        .iter()
        .filter_map(|name| backend.api_root_info(name).transpose())
        .collect::<Result<Vec<_>, _>>()?;

    write_response(json!({
        "discovery": backend.discovery()?,
        "api_roots": roots,
    }))
}

pub fn collections(config_path: &Path, root: &str) -> CliResult<()> {
    let backend = open(config_path)?;
    let collections = backend
        .collections(root)?
        .into_iter()
        .map(|c| -> CliResult<Value> {
            let stats = backend.collection_stats(root, &c.id)?;
            Ok(json!({"collection": c, "stats": stats}))
        })
        .collect::<CliResult<Vec<_>>>()?;
    write_response(json!({ "collections": collections }))
}

pub fn manifest(target: &Target, query: &Query) -> CliResult<()> {
    let backend = open(&target.config)?;
    let page = backend.manifest(
        &target.root,
        &target.collection,
        &filter_args(query),
        LISTING_FILTERS,
        query.limit,
    )?;
    write_response(envelope(&page, page.items.iter().map(ManifestEntry::to_json).collect()))
}

pub fn objects(target: &Target, query: &Query) -> CliResult<()> {
    let backend = open(&target.config)?;
    let page = backend.objects(
        &target.root,
        &target.collection,
        &filter_args(query),
        LISTING_FILTERS,
        query.limit,
    )?;
    write_response(object_envelope(&page))
}

pub fn versions(target: &Target, id: &str, query: &Query) -> CliResult<()> {
    let backend = open(&target.config)?;
    let page = backend.object_versions(
        &target.root,
        &target.collection,
        id,
        &filter_args(query),
        VERSION_FILTERS,
        query.limit,
    )?;
    let versions: Vec<String> = page.items.iter().map(VersionKey::to_string).collect();
    write_response(json!({
        "more": page.more,
        "next": page.next,
        "versions": versions,
    }))
}

pub fn add(target: &Target, request_time: Option<&str>) -> CliResult<()> {
    let request_time = match request_time {
        Some(raw) => parse_version(raw).map_err(|e| CliError::config_error(format!("--request-time: {}", e)))?,
        None => to_version(&Utc::now()),
    };
    let config = writable_config(&target.config)?;
    let objects = read_objects()?;

    let backend = Backend::open(config, logger())?;
    let report = backend.add_objects(&target.root, &target.collection, &objects, request_time)?;
    write_response(serde_json::to_value(&report)?)
}

pub fn delete(target: &Target, id: &str, query: &Query) -> CliResult<()> {
    let backend = Backend::open(writable_config(&target.config)?, logger())?;
    let removed = backend.delete_object(
        &target.root,
        &target.collection,
        id,
        &filter_args(query),
        OBJECT_FILTERS,
    )?;
    let removed: Vec<String> = removed.iter().map(VersionKey::to_string).collect();
    write_response(json!({ "id": id, "deleted_versions": removed }))
}

fn filter_args(query: &Query) -> FilterArgs {
    query.filters.iter().cloned().collect()
}

fn envelope<T>(page: &Page<T>, objects: Vec<Value>) -> Value {
    json!({
        "more": page.more,
        "next": page.next,
        "objects": objects,
    })
}

fn object_envelope(page: &Page<StoredObject>) -> Value {
    envelope(page, page.items.iter().map(|o| o.body.clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::CliErrorCode;
    use std::fs;
    use tempfile::TempDir;

    fn target(dir: &TempDir, engine: Value) -> Target {
        let config = dir.path().join("taxiidb.json");
        fs::write(&config, json!({ "engine": engine }).to_string()).unwrap();
        Target {
            config,
            root: "api1".to_string(),
            collection: "91a7b528-80eb-42ed-a74d-c6fbd5a26116".to_string(),
        }
    }

    #[test]
    fn test_add_refuses_memory_engine() {
        let dir = TempDir::new().unwrap();
        let target = target(&dir, json!({"kind": "memory"}));

        let err = add(&target, None).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
        assert!(err.message().contains("file engine"));
    }

    #[test]
    fn test_delete_refuses_memory_engine() {
        let dir = TempDir::new().unwrap();
        let target = target(&dir, json!({"kind": "memory"}));

        let err = delete(&target, "indicator--6770298f-0fd8-471a-ab8c-1c658a46574e", &Query::default())
            .unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }

    #[test]
    fn test_file_engine_config_is_writable() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        let target = target(&dir, json!({"kind": "file", "data_dir": data_dir.clone()}));

        let config = writable_config(&target.config).unwrap();
        assert_eq!(config.engine, EngineConfig::File { data_dir });
    }
}
