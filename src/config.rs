//! Configuration module for the file transfer server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

/// Default port when serving from the thread pool.
pub const DEFAULT_THREAD_PORT: u16 = 7778;
/// Default port when serving from the process pool.
pub const DEFAULT_PROCESS_PORT: u16 = 7779;

/// Worker pool strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolMode {
    /// Shared-memory pool of worker threads.
    Thread,
    /// Pool of forked worker processes fed over a Unix socket pair.
    Process,
}

impl std::fmt::Display for PoolMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolMode::Thread => write!(f, "thread"),
            PoolMode::Process => write!(f, "process"),
        }
    }
}

/// Command-line arguments for the file server
#[derive(Parser, Debug)]
#[command(name = "ferryd")]
#[command(version = "0.1.0")]
#[command(about = "A file transfer server with swappable worker pools", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0:7778)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Worker pool strategy
    #[arg(short = 'p', long, value_enum)]
    pub pool: Option<PoolMode>,

    /// Number of pool workers
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Directory the file store serves and writes
    #[arg(short = 'r', long)]
    pub root: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize, Default)]
pub struct ServerConfig {
    /// Address to bind to
    pub listen: Option<String>,
    /// Worker pool strategy
    pub pool: Option<PoolMode>,
    /// Number of pool workers
    pub workers: Option<usize>,
}

/// Storage-related configuration
#[derive(Debug, Deserialize, Default)]
pub struct StorageConfig {
    /// Directory the file store serves and writes
    pub root: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen(pool: PoolMode) -> String {
    let port = match pool {
        PoolMode::Thread => DEFAULT_THREAD_PORT,
        PoolMode::Process => DEFAULT_PROCESS_PORT,
    };
    format!("0.0.0.0:{}", port)
}

fn default_workers() -> usize {
    5
}

fn default_root() -> PathBuf {
    PathBuf::from("files")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub pool: PoolMode,
    pub workers: usize,
    pub root: PathBuf,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Config::from_cli(CliArgs::parse())
    }

    /// Resolve already-parsed CLI arguments against their TOML file.
    pub fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        // Merge CLI args with TOML config (CLI takes precedence). The
        // default listen port follows the resolved pool mode, so the two
        // strategies can run side by side out of the box.
        let pool = cli
            .pool
            .or(toml_config.server.pool)
            .unwrap_or(PoolMode::Thread);
        let workers = cli
            .workers
            .or(toml_config.server.workers)
            .unwrap_or_else(default_workers);
        if workers == 0 {
            return Err(ConfigError::NoWorkers);
        }

        Ok(Config {
            listen: cli
                .listen
                .or(toml_config.server.listen)
                .unwrap_or_else(|| default_listen(pool)),
            pool,
            workers,
            root: cli
                .root
                .or(toml_config.storage.root)
                .unwrap_or_else(default_root),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    NoWorkers,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::NoWorkers => {
                write!(f, "Worker count must be at least 1")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_args() -> CliArgs {
        CliArgs {
            config: None,
            listen: None,
            pool: None,
            workers: None,
            root: None,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            listen = "0.0.0.0:9000"
            pool = "process"
            workers = 8

            [storage]
            root = "/srv/files"

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.as_deref(), Some("0.0.0.0:9000"));
        assert_eq!(config.server.pool, Some(PoolMode::Process));
        assert_eq!(config.server.workers, Some(8));
        assert_eq!(config.storage.root, Some(PathBuf::from("/srv/files")));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_cli(bare_args()).unwrap();
        assert_eq!(config.listen, "0.0.0.0:7778");
        assert_eq!(config.pool, PoolMode::Thread);
        assert_eq!(config.workers, 5);
        assert_eq!(config.root, PathBuf::from("files"));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_default_port_follows_pool_mode() {
        let mut args = bare_args();
        args.pool = Some(PoolMode::Process);
        let config = Config::from_cli(args).unwrap();
        assert_eq!(config.listen, "0.0.0.0:7779");
    }

    #[test]
    fn test_cli_takes_precedence_over_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ferryd.toml");
        std::fs::write(
            &path,
            r#"
            [server]
            listen = "0.0.0.0:9000"
            pool = "process"
            workers = 2
        "#,
        )
        .unwrap();

        let mut args = bare_args();
        args.config = Some(path);
        args.workers = Some(12);
        let config = Config::from_cli(args).unwrap();

        // CLI wins where given, TOML fills the rest.
        assert_eq!(config.workers, 12);
        assert_eq!(config.listen, "0.0.0.0:9000");
        assert_eq!(config.pool, PoolMode::Process);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut args = bare_args();
        args.workers = Some(0);
        match Config::from_cli(args) {
            Err(ConfigError::NoWorkers) => {}
            other => panic!("Expected NoWorkers, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let mut args = bare_args();
        args.config = Some(PathBuf::from("/nonexistent/ferryd.toml"));
        match Config::from_cli(args) {
            Err(ConfigError::FileRead(path, _)) => {
                assert_eq!(path, PathBuf::from("/nonexistent/ferryd.toml"))
            }
            other => panic!("Expected FileRead, got {:?}", other),
        }
    }
}
