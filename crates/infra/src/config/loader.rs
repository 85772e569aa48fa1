//! Configuration loader
//!
//! Loads the client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `LRSYNC_ENDPOINT` is missing, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Every loaded configuration is validated before it is returned.
//!
//! ## Environment Variables
//! - `LRSYNC_ENDPOINT`: Base URL of the record store (required)
//! - `LRSYNC_FLUSH_INTERVAL`: Seconds between automatic flushes, 0 disables
//! - `LRSYNC_BATCH_SIZE`: Statements per batch request
//! - `LRSYNC_REQUEST_TIMEOUT`: Request timeout in seconds
//! - `LRSYNC_SERVER_ERRORS_ARE_FAILURES`: Treat 4xx/5xx as failures (true/false)
//! - `LRSYNC_NICE_ERROR_MESSAGES`: Replace server messages (true/false)
//! - `LRSYNC_QUEUE_PATH`: File backing the statement queue
//! - `LRSYNC_MAX_PERMANENT_RETRIES`: Retry bound for permanently failing
//!   statements
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./lrsync.toml` or `./lrsync.json` (current working directory)
//! 2. `../lrsync.toml` or `../lrsync.json` (parent directory)
//! 3. `../../lrsync.toml` or `../../lrsync.json` (grandparent directory)
//! 4. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use lrsync_domain::{ClientConfig, LrsError, Result};

use crate::errors::InfraError;

const CONFIG_NAMES: [&str; 2] = ["lrsync.toml", "lrsync.json"];
const PROBE_DIRS: [&str; 3] = [".", "..", "../.."];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the endpoint
/// variable is missing or a value is invalid, falls back to a config file.
///
/// # Errors
/// Returns `LrsError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The loaded configuration fails validation
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `LRSYNC_ENDPOINT` is required; every other variable falls back to
/// the [`ClientConfig`] default.
///
/// # Errors
/// Returns `LrsError::Config` if the endpoint is missing or a value does
/// not parse.
pub fn load_from_env() -> Result<ClientConfig> {
    let mut config = ClientConfig::new(env_var("LRSYNC_ENDPOINT")?);

    if let Some(secs) = env_parse::<u64>("LRSYNC_FLUSH_INTERVAL", "flush interval")? {
        config.flush_interval_secs = secs;
    }
    if let Some(size) = env_parse::<usize>("LRSYNC_BATCH_SIZE", "batch size")? {
        config.batch_size = size;
    }
    if let Some(secs) = env_parse::<u64>("LRSYNC_REQUEST_TIMEOUT", "request timeout")? {
        config.request_timeout_secs = secs;
    }
    config.server_errors_are_failures =
        env_bool("LRSYNC_SERVER_ERRORS_ARE_FAILURES", config.server_errors_are_failures);
    config.nice_error_messages =
        env_bool("LRSYNC_NICE_ERROR_MESSAGES", config.nice_error_messages);
    config.queue_path = std::env::var_os("LRSYNC_QUEUE_PATH").map(PathBuf::from);
    config.max_permanent_retries =
        env_parse::<u32>("LRSYNC_MAX_PERMANENT_RETRIES", "retry bound")?;

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `LrsError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - The configuration fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(LrsError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            LrsError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| LrsError::Config(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| InfraError::from(e).into()),
        "json" => serde_json::from_str(contents)
            .map_err(|e| LrsError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(LrsError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches the current working directory and its two parents, then the
/// executable's directory and its two parents.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| {
            PROBE_DIRS.iter().flat_map(move |dir| CONFIG_NAMES.iter().map(move |name| root.join(dir).join(name)))
        })
        .find(|path| path.is_file())
}

/// Get required environment variable
///
/// # Errors
/// Returns `LrsError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| LrsError::Config(format!("Missing required environment variable: {}", key)))
}

/// Parse an optional environment variable.
///
/// # Errors
/// Returns `LrsError::Config` if the variable is set but does not parse.
fn env_parse<T>(key: &str, what: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| LrsError::Config(format!("Invalid {}: {}", what, e))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
