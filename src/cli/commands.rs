//! CLI command implementations
//!
//! Each command loads the configuration, the schema file and (for `query`)
//! the data file, reads one request from stdin and writes one response.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::QueryConfig;
use crate::executor::{ExecutionEngine, MemoryEngine, MemoryStore, ResultSet};
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::planner::{ExplainPlan, Query};
use crate::schema::{SchemaAdapter, SchemaLoader, SchemaRegistry};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_error, write_response, QueryRequest};

/// Configuration file structure (`mongoquery.json`)
///
/// Relative paths resolve against the directory holding the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema document (required)
    pub schema_path: String,

    /// JSON data file used by `query` (optional, default: empty store)
    #[serde(default)]
    pub data_path: Option<String>,

    /// Compiler limits
    #[serde(default)]
    pub query: QueryConfig,

    #[serde(skip)]
    base_dir: PathBuf,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let mut config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        config.validate()?;

        let source = path.display().to_string();
        log_event_with_fields(Event::ConfigLoaded, &[("path", source.as_str())]);

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.schema_path.trim().is_empty() {
            return Err(CliError::config_error("schema_path must not be empty"));
        }

        if matches!(&self.data_path, Some(p) if p.trim().is_empty()) {
            return Err(CliError::config_error("data_path must not be empty when set"));
        }

        self.query
            .validate()
            .map_err(|e| CliError::config_error(format!("Invalid query config: {}", e)))
    }

    pub fn schema_file(&self) -> PathBuf {
        self.base_dir.join(&self.schema_path)
    }

    pub fn data_file(&self) -> Option<PathBuf> {
        self.data_path.as_ref().map(|p| self.base_dir.join(p))
    }

    /// Applies `query.log_level` to the global logger
    pub fn apply_log_level(&self) -> CliResult<()> {
        let severity = self.query.severity().map_err(CliError::config_error)?;
        Logger::set_min_severity(severity);
        Ok(())
    }
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Explain { config } => explain(&config),
        Command::Query { config } => query(&config),
    }
}

/// Compiles the stdin request and prints its explain plan.
///
/// A rejected query is still a successful explain: the response carries the
/// rejection clause, code and reason.
pub fn explain(config_path: &Path) -> CliResult<()> {
    let (config, registry) = boot(config_path)?;
    let request = read_request()?;

    let plan = explain_request(&registry, &config.query, &request);
    write_response(serde_json::to_value(&plan)?)
}

/// Compiles and executes the stdin request and prints the result rows.
pub fn query(config_path: &Path) -> CliResult<()> {
    let (config, registry) = boot(config_path)?;
    let store = match config.data_file() {
        Some(path) => MemoryStore::load_file(&path)
            .map_err(|e| CliError::data_error(format!("{}: {}", e.code(), e)))?,
        None => MemoryStore::new(),
    };
    let request = read_request()?;

    match execute_request(&registry, &store, &config.query, &request) {
        Ok(result) => write_response(result_json(&result)),
        Err(err) => {
            write_error(err.code_str(), err.message())?;
            Err(err)
        }
    }
}

fn boot(config_path: &Path) -> CliResult<(Config, SchemaRegistry)> {
    let config = Config::load(config_path)?;
    config.apply_log_level()?;
    let registry = SchemaLoader::load_file(&config.schema_file())?;
    Ok((config, registry))
}

/// Explain plan for one request
pub fn explain_request(
    registry: &SchemaRegistry,
    config: &QueryConfig,
    request: &QueryRequest,
) -> ExplainPlan {
    let compiled = Query::from_document_with_config(
        registry,
        &request.entity,
        &request.query,
        config.clone(),
    )
    .and_then(|plan| {
        let schema = registry.entity(&plan.entity)?;
        Ok(ExplainPlan::from_plan(&plan, schema))
    });

    let plan = compiled.unwrap_or_else(|err| ExplainPlan::from_error(&err));
    let accepted = plan.accepted.to_string();
    log_event_with_fields(
        Event::ExplainComplete,
        &[("entity", request.entity.as_str()), ("accepted", accepted.as_str())],
    );
    plan
}

/// Compiles and executes one request
pub fn execute_request(
    registry: &SchemaRegistry,
    store: &MemoryStore,
    config: &QueryConfig,
    request: &QueryRequest,
) -> CliResult<ResultSet> {
    let plan = Query::from_document_with_config(
        registry,
        &request.entity,
        &request.query,
        config.clone(),
    )?;
    let engine = MemoryEngine::new(registry, store);
    Ok(engine.execute(&plan)?)
}

/// Response body for an executed query
pub fn result_json(result: &ResultSet) -> Value {
    json!({
        "mode": result.mode().as_str(),
        "columns": result.columns(),
        "count": result.count(),
        "rows": result.to_json(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::errors::CliErrorCode;
    use std::io::Write;
    use tempfile::TempDir;

    const SCHEMA: &str = r#"{
        "entities": [
            {
                "name": "User",
                "primary_key": "id",
                "fields": [
                    {"name": "id", "kind": "numeric"},
                    {"name": "age", "kind": "numeric"}
                ]
            }
        ]
    }"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn request(entity: &str, query: Value) -> QueryRequest {
        QueryRequest {
            entity: entity.to_string(),
            query,
        }
    }

    #[test]
    fn test_config_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "mongoquery.json",
            r#"{"schema_path": "schema.json", "data_path": "data.json"}"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.schema_file(), dir.path().join("schema.json"));
        assert_eq!(config.data_file(), Some(dir.path().join("data.json")));
        assert_eq!(config.query, QueryConfig::default());
    }

    #[test]
    fn test_config_rejects_bad_query_section() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "mongoquery.json",
            r#"{"schema_path": "schema.json", "query": {"max_join_depth": 0}}"#,
        );

        let err = Config::load(&path).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
        assert!(err.message().contains("max_join_depth"));
    }

    #[test]
    fn test_config_missing_file() {
        let err = Config::load(Path::new("/nonexistent/mongoquery.json")).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }

    #[test]
    fn test_explain_request_accepted_and_rejected() {
        let registry = SchemaLoader::load_str("test", SCHEMA).unwrap();
        let config = QueryConfig::default();

        let plan = explain_request(&registry, &config, &request("User", json!({"sort": "age-"})));
        assert!(plan.accepted);
        assert_eq!(plan.sort, vec!["age desc".to_string()]);

        let plan = explain_request(&registry, &config, &request("User", json!({"filter": {"age": {"$foo": 1}}})));
        assert!(!plan.accepted);
        assert_eq!(plan.rejection_code.as_deref(), Some("MQ_UNKNOWN_OPERATOR"));
    }

    #[test]
    fn test_execute_request() {
        let registry = SchemaLoader::load_str("test", SCHEMA).unwrap();
        let store = MemoryStore::from_json(json!({
            "User": [{"id": 1, "age": 20}, {"id": 2, "age": 16}]
        }))
        .unwrap();

        let result = execute_request(
            &registry,
            &store,
            &QueryConfig::default(),
            &request("User", json!({"filter": {"age": {"$gt": 18}}})),
        )
        .unwrap();
        assert_eq!(
            result_json(&result),
            json!({"mode": "rows", "columns": ["id", "age"], "count": 1, "rows": [{"id": 1, "age": 20}]})
        );

        let err = execute_request(
            &registry,
            &MemoryStore::new(),
            &QueryConfig::default(),
            &request("User", json!({})),
        )
        .unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::QueryFailed);
    }
}
