use mate_agent::{CheckpointError, SqliteCheckpointer, SupervisorDriver, ToolRegistry};
use mate_core::{
    load_app_config, AppConfig, ConfigError, Validate, ValidationIssue, ValidationLevel,
};
use mate_store::TaskStore;
use mate_web::{run_web_server, AppState, WebError};
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_CONFIG: &str = "config/taskmate.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliArgs {
    config_path: PathBuf,
    bind_override: Option<String>,
    tasks_override: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliCommand {
    Run(CliArgs),
    Help(String),
}

#[derive(Debug, thiserror::Error)]
enum MainError {
    #[error("{0}")]
    Args(String),
    #[error("failed to load config at {path}: {source}")]
    LoadConfig {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
    #[error("{0}")]
    InvalidConfig(String),
    #[error("failed to prepare checkpoint directory {path}: {source}")]
    CheckpointDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to open checkpoint store at {path}: {source}")]
    Checkpoints {
        path: PathBuf,
        #[source]
        source: CheckpointError,
    },
    #[error(transparent)]
    Web(#[from] WebError),
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("taskmate failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), MainError> {
    let mut argv = env::args();
    let program = argv.next().unwrap_or_else(|| "taskmate".to_string());
    let command = parse_cli_args(argv.collect::<Vec<_>>(), &program)?;
    let CliCommand::Run(args) = command else {
        let CliCommand::Help(text) = command else {
            unreachable!();
        };
        println!("{text}");
        return Ok(());
    };

    let mut config = load_config(&args.config_path)?;
    if let Some(tasks_path) = args.tasks_override {
        config.storage.tasks_path = tasks_path;
    }
    validate_config(&config.validate())?;
    let bind = resolve_bind(args.bind_override, &config.web.bind)?;

    let store = TaskStore::open(&config.storage.tasks_path);
    let checkpointer = open_checkpoints(&config.storage.checkpoint_path)?;
    let driver = SupervisorDriver::new(ToolRegistry::new(store.clone()), checkpointer);

    println!(
        "taskmate binding to {bind} (tasks at {})",
        config.storage.tasks_path.display()
    );
    run_web_server(&bind, AppState::new(store, Arc::new(driver))).await?;
    Ok(())
}

fn load_config(path: &Path) -> Result<AppConfig, MainError> {
    match load_app_config(path) {
        Ok(config) => Ok(config),
        Err(ConfigError::Read { ref source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            println!("taskmate: no config at {}, using defaults", path.display());
            Ok(AppConfig::default())
        }
        Err(source) => Err(MainError::LoadConfig {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn open_checkpoints(path: &Path) -> Result<Arc<SqliteCheckpointer>, MainError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| MainError::CheckpointDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    let checkpointer = SqliteCheckpointer::open(path).map_err(|source| MainError::Checkpoints {
        path: path.to_path_buf(),
        source,
    })?;
    checkpointer
        .migrate()
        .map_err(|source| MainError::Checkpoints {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Arc::new(checkpointer))
}

fn resolve_bind(bind_override: Option<String>, config_bind: &str) -> Result<String, MainError> {
    let candidate = bind_override.unwrap_or_else(|| config_bind.to_string());
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return Err(MainError::Args(
            "bind address must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_config(issues: &[ValidationIssue]) -> Result<(), MainError> {
    let errors = issues
        .iter()
        .filter(|issue| issue.level == ValidationLevel::Error)
        .collect::<Vec<_>>();
    if errors.is_empty() {
        return Ok(());
    }

    let rendered = errors
        .iter()
        .map(|issue| format!("{}: {}", issue.code, issue.message))
        .collect::<Vec<_>>()
        .join("; ");
    Err(MainError::InvalidConfig(format!(
        "config validation failed ({rendered})"
    )))
}

fn parse_cli_args(args: Vec<String>, program: &str) -> Result<CliCommand, MainError> {
    let mut parsed = CliArgs {
        config_path: PathBuf::from(DEFAULT_CONFIG),
        bind_override: None,
        tasks_override: None,
    };

    let mut idx = 0usize;
    while idx < args.len() {
        let arg = &args[idx];
        match arg.as_str() {
            "--help" | "-h" => return Ok(CliCommand::Help(usage(program))),
            "--config" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| MainError::Args("missing value for --config".to_string()))?;
                parsed.config_path = PathBuf::from(value);
            }
            "--bind" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| MainError::Args("missing value for --bind".to_string()))?;
                parsed.bind_override = Some(value.clone());
            }
            "--tasks" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| MainError::Args("missing value for --tasks".to_string()))?;
                parsed.tasks_override = Some(PathBuf::from(value));
            }
            other => {
                return Err(MainError::Args(format!(
                    "unknown argument: {other}\n\n{}",
                    usage(program)
                )));
            }
        }
        idx += 1;
    }

    Ok(CliCommand::Run(parsed))
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {program} [--config <path>] [--bind <ip:port>] [--tasks <path>]\n\
Defaults:\n\
  --config {DEFAULT_CONFIG}\n\
  --bind from config.web.bind\n\
  --tasks from config.storage.tasks_path"
    )
}

#[cfg(test)]
mod tests {
    use super::{parse_cli_args, resolve_bind, usage, CliArgs, CliCommand};
    use std::path::PathBuf;

    #[test]
    fn parse_cli_args_applies_defaults() {
        let parsed = parse_cli_args(Vec::new(), "taskmate").expect("parse");
        assert_eq!(
            parsed,
            CliCommand::Run(CliArgs {
                config_path: PathBuf::from("config/taskmate.toml"),
                bind_override: None,
                tasks_override: None,
            })
        );
    }

    #[test]
    fn parse_cli_args_applies_overrides() {
        let parsed = parse_cli_args(
            vec![
                "--config".to_string(),
                "/tmp/taskmate.toml".to_string(),
                "--bind".to_string(),
                "0.0.0.0:9000".to_string(),
                "--tasks".to_string(),
                "/tmp/tasks.json".to_string(),
            ],
            "taskmate",
        )
        .expect("parse");
        assert_eq!(
            parsed,
            CliCommand::Run(CliArgs {
                config_path: PathBuf::from("/tmp/taskmate.toml"),
                bind_override: Some("0.0.0.0:9000".to_string()),
                tasks_override: Some(PathBuf::from("/tmp/tasks.json")),
            })
        );
    }

    #[test]
    fn parse_cli_args_help_returns_help_command() {
        let parsed = parse_cli_args(vec!["--help".to_string()], "taskmate").expect("parse");
        assert_eq!(parsed, CliCommand::Help(usage("taskmate")));
    }

    #[test]
    fn parse_cli_args_reports_unknown_argument_with_usage() {
        let err = parse_cli_args(vec!["--bad".to_string()], "taskmate").expect_err("should fail");
        let rendered = err.to_string();
        assert!(rendered.contains("unknown argument: --bad"));
        assert!(rendered.contains("Usage: taskmate"));
    }

    #[test]
    fn parse_cli_args_requires_values_for_flags() {
        let err =
            parse_cli_args(vec!["--config".to_string()], "taskmate").expect_err("missing config");
        assert_eq!(err.to_string(), "missing value for --config");

        let err = parse_cli_args(vec!["--bind".to_string()], "taskmate").expect_err("missing bind");
        assert_eq!(err.to_string(), "missing value for --bind");

        let err =
            parse_cli_args(vec!["--tasks".to_string()], "taskmate").expect_err("missing tasks");
        assert_eq!(err.to_string(), "missing value for --tasks");
    }

    #[test]
    fn resolve_bind_prefers_override_and_rejects_blank_values() {
        let resolved =
            resolve_bind(Some("127.0.0.1:9999".to_string()), "127.0.0.1:8000").expect("resolve");
        assert_eq!(resolved, "127.0.0.1:9999");

        let resolved = resolve_bind(None, "127.0.0.1:8000").expect("fallback");
        assert_eq!(resolved, "127.0.0.1:8000");

        let err = resolve_bind(Some("   ".to_string()), "127.0.0.1:8000")
            .expect_err("blank override should fail");
        assert_eq!(err.to_string(), "bind address must not be empty");
    }
}
