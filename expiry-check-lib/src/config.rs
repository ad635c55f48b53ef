//! Configuration file parsing and management.
//!
//! This module loads `[defaults]` from TOML files, reads `EC_*` environment
//! variables, and merges both with proper precedence rules. The check mode is
//! deliberately absent: it is only ever chosen on the command line.

use crate::error::ExpiryCheckError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    /// Default values for CLI options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,
}

/// Default configuration values that map to CLI options.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DefaultsConfig {
    /// Concurrency budget
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,

    /// TLS connect + handshake timeout (as string, e.g., "5s", "30s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// WHOIS query timeout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois_timeout: Option<String>,

    /// Port for certificate checks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Skip blank/invalid input lines instead of stopping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_invalid: Option<bool>,

    /// Default domains file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to log which config files were picked up
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    ///
    /// A missing file is a `FileError`; a file that does not parse or holds
    /// out-of-range values is a `ConfigError`.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, ExpiryCheckError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ExpiryCheckError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            ExpiryCheckError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            ExpiryCheckError::config(format!(
                "Failed to parse TOML configuration {}: {}",
                path.display(),
                e
            ))
        })?;

        self.validate_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config is the lowest, then the home directory, then the current
    /// directory. Broken discovered files are reported and skipped.
    pub fn discover_and_load(&self) -> Result<FileConfig, ExpiryCheckError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "ignoring config file"),
            }
        }

        if self.verbose && !loaded_files.is_empty() {
            for path in &loaded_files {
                info!(path = %path.display(), "loaded config file");
            }
        }

        Ok(merged_config)
    }

    /// Looks for configuration files in the current directory.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        let candidates = ["./expiry-check.toml", "./.expiry-check.toml"];

        candidates
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    /// Looks for configuration files in the user's home directory.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".expiry-check.toml", "expiry-check.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// Follows the XDG Base Directory Specification.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("expiry-check").join("config.toml");
        path.exists().then_some(path)
    }

    /// Merge two configurations. Values from `higher` take precedence.
    pub fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: match (lower.defaults, higher.defaults) {
                (Some(lower_defaults), Some(higher_defaults)) => Some(DefaultsConfig {
                    threads: higher_defaults.threads.or(lower_defaults.threads),
                    timeout: higher_defaults.timeout.or(lower_defaults.timeout),
                    whois_timeout: higher_defaults.whois_timeout.or(lower_defaults.whois_timeout),
                    port: higher_defaults.port.or(lower_defaults.port),
                    skip_invalid: higher_defaults.skip_invalid.or(lower_defaults.skip_invalid),
                    file: higher_defaults.file.or(lower_defaults.file),
                }),
                (None, Some(higher_defaults)) => Some(higher_defaults),
                (Some(lower_defaults), None) => Some(lower_defaults),
                (None, None) => None,
            },
        }
    }

    fn validate_config(&self, config: &FileConfig) -> Result<(), ExpiryCheckError> {
        let Some(defaults) = &config.defaults else {
            return Ok(());
        };

        if let Some(threads) = defaults.threads {
            validate_threads(threads)?;
        }

        for (key, value) in [
            ("timeout", &defaults.timeout),
            ("whois_timeout", &defaults.whois_timeout),
        ] {
            if let Some(timeout_str) = value {
                if parse_timeout_string(timeout_str).is_none() {
                    return Err(ExpiryCheckError::config(format!(
                        "Invalid {} '{}'. Use format like '5s', '30s', '2m'",
                        key, timeout_str
                    )));
                }
            }
        }

        if defaults.port == Some(0) {
            return Err(ExpiryCheckError::config("Port must be between 1 and 65535"));
        }

        if let Some(file) = &defaults.file {
            if file.trim().is_empty() {
                return Err(ExpiryCheckError::config("Default file cannot be empty"));
            }
        }

        Ok(())
    }
}

/// Budgets above this are accepted but logged.
const LARGE_THREADS: usize = 500;

/// Check a concurrency budget. Any budget of at least 1 is accepted.
pub fn validate_threads(threads: usize) -> Result<(), ExpiryCheckError> {
    if threads == 0 {
        return Err(ExpiryCheckError::config("Threads must be at least 1"));
    }
    if threads > LARGE_THREADS {
        warn!(threads, "Large concurrency budget; each check holds an open socket or process");
    }
    Ok(())
}

/// Environment variable configuration that mirrors CLI options.
///
/// This represents configuration values that can be set via `EC_*`
/// environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub threads: Option<usize>,
    pub timeout: Option<String>,
    pub whois_timeout: Option<String>,
    pub skip_invalid: Option<bool>,
    pub file: Option<String>,
    pub config: Option<String>,
}

/// Load configuration from the process environment.
///
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config(verbose: bool) -> EnvConfig {
    env_config_from(|key| env::var(key).ok(), verbose)
}

/// Build an [`EnvConfig`] from any variable lookup.
pub fn env_config_from<F>(lookup: F, verbose: bool) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();

    if let Some(val) = lookup("EC_THREADS") {
        match val.trim().parse::<usize>() {
            Ok(threads) if validate_threads(threads).is_ok() => {
                env_config.threads = Some(threads);
                log_env(verbose, "EC_THREADS", &val);
            }
            _ => warn!("Invalid EC_THREADS='{}', must be at least 1", val),
        }
    }

    for (key, slot) in [
        ("EC_TIMEOUT", &mut env_config.timeout),
        ("EC_WHOIS_TIMEOUT", &mut env_config.whois_timeout),
    ] {
        if let Some(val) = lookup(key) {
            if parse_timeout_string(&val).is_some() {
                log_env(verbose, key, &val);
                *slot = Some(val);
            } else {
                warn!("Invalid {}='{}', use format like '5s', '30s', '2m'", key, val);
            }
        }
    }

    if let Some(val) = lookup("EC_SKIP_INVALID") {
        match parse_bool(&val) {
            Some(flag) => {
                env_config.skip_invalid = Some(flag);
                log_env(verbose, "EC_SKIP_INVALID", &val);
            }
            None => warn!("Invalid EC_SKIP_INVALID='{}', use true/false", val),
        }
    }

    for (key, slot) in [
        ("EC_FILE", &mut env_config.file),
        ("EC_CONFIG", &mut env_config.config),
    ] {
        if let Some(val) = lookup(key) {
            if !val.trim().is_empty() {
                log_env(verbose, key, &val);
                *slot = Some(val);
            }
        }
    }

    env_config
}

fn log_env(verbose: bool, key: &str, value: &str) {
    if verbose {
        info!("Using {}={}", key, value);
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a timeout string like "5s", "30s", "2m" into a duration.
///
/// A bare number is taken as seconds. Zero is rejected.
pub fn parse_timeout_string(timeout_str: &str) -> Option<Duration> {
    let timeout_str = timeout_str.trim().to_lowercase();

    let seconds = if let Some(secs) = timeout_str.strip_suffix('s') {
        secs.parse::<u64>().ok()
    } else if let Some(mins) = timeout_str.strip_suffix('m') {
        mins.parse::<u64>().ok().and_then(|m| m.checked_mul(60))
    } else {
        timeout_str.parse::<u64>().ok()
    }?;

    (seconds > 0).then(|| Duration::from_secs(seconds))
}
