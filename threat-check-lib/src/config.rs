//! Configuration file parsing and management.
//!
//! Settings come from four layers, highest precedence first: CLI flags,
//! `TC_*` environment variables, a TOML file, and built-in defaults. This
//! module owns the file and environment layers and the resolved
//! [`RunConfig`]; the CLI applies its own flags on top.

use crate::error::ThreatCheckError;
use crate::protocols::webrisk::DEFAULT_ENDPOINT;
use crate::types::{PoolConfig, ThreatCategory};
use crate::utils::parse_timeout_string;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default chart location, relative to the working directory.
pub const DEFAULT_CHART_PATH: &str = "resources/threat_analysis_chart.svg";

/// Default log file location, relative to the working directory.
pub const DEFAULT_LOG_PATH: &str = "resources/log.txt";

/// Upper bound for concurrency and worker settings.
pub const MAX_CONCURRENCY: usize = 100;

/// Upper bound for the per-lookup timeout, in seconds.
pub const MAX_TIMEOUT_SECS: u64 = 3600;

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Input and output locations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths: Option<PathsConfig>,

    /// Default values for pool options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Verdict source settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceConfig>,
}

/// File locations used by a run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathsConfig {
    /// CSV file with a `Link` column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    /// Results table written after verification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
}

/// Default values that map to CLI options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    /// Maximum lookups in flight
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Worker loops draining the queue
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Per-lookup timeout, e.g. "10s"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Threat types to query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat_types: Option<Vec<String>>,
}

/// Verdict source configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourceConfig {
    /// Base URL of the Web Risk API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to emit warnings for config issues
    pub verbose: bool,
}

impl ConfigManager {
    /// Create a new configuration manager.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The parsed and validated configuration.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, ThreatCheckError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ThreatCheckError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            ThreatCheckError::config(format!(
                "Failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: FileConfig = toml::from_str(&content)?;

        self.validate_config(&config)?;

        Ok(config)
    }

    /// Load the local configuration file, if one exists.
    ///
    /// Looks for `./threat-check.toml`, then `./.threat-check.toml`.
    pub fn discover_and_load(&self) -> Result<FileConfig, ThreatCheckError> {
        match self.get_local_config_path() {
            Some(path) => {
                if self.verbose {
                    eprintln!("🔧 Using config file {}", path.display());
                }
                self.load_file(path)
            }
            None => Ok(FileConfig::default()),
        }
    }

    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./threat-check.toml", "./.threat-check.toml"]
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), ThreatCheckError> {
        if let Some(defaults) = &config.defaults {
            if let Some(concurrency) = defaults.concurrency {
                validate_range("Concurrency", concurrency)?;
            }

            if let Some(workers) = defaults.workers {
                validate_range("Workers", workers)?;
            }

            if let Some(timeout_str) = &defaults.timeout {
                parse_timeout(timeout_str)?;
            }

            if let Some(threat_types) = &defaults.threat_types {
                parse_threat_types(threat_types)?;
            }
        }

        if let Some(paths) = &config.paths {
            for (name, value) in [
                ("input", &paths.input),
                ("results", &paths.results),
                ("chart", &paths.chart),
                ("log", &paths.log),
            ] {
                if matches!(value, Some(v) if v.trim().is_empty()) {
                    return Err(ThreatCheckError::config(format!(
                        "paths.{} cannot be empty",
                        name
                    )));
                }
            }
        }

        if let Some(endpoint) = config.source.as_ref().and_then(|s| s.endpoint.as_ref()) {
            if endpoint.trim().is_empty() {
                return Err(ThreatCheckError::config("source.endpoint cannot be empty"));
            }
        }

        Ok(())
    }
}

fn validate_range(name: &str, value: usize) -> Result<(), ThreatCheckError> {
    if value == 0 || value > MAX_CONCURRENCY {
        return Err(ThreatCheckError::config(format!(
            "{} must be between 1 and {}",
            name, MAX_CONCURRENCY
        )));
    }
    Ok(())
}

/// Parse a timeout setting into a `Duration`.
pub fn parse_timeout(timeout_str: &str) -> Result<Duration, ThreatCheckError> {
    parse_timeout_string(timeout_str)
        .map(Duration::from_secs)
        .ok_or_else(|| {
            ThreatCheckError::config(format!(
                "Invalid timeout '{}'. Use format like '5s', '30s', '2m' (max {}s)",
                timeout_str, MAX_TIMEOUT_SECS
            ))
        })
}

/// Parse threat type names (case-insensitive), keeping order.
pub fn parse_threat_types<S: AsRef<str>>(
    names: &[S],
) -> Result<Vec<ThreatCategory>, ThreatCheckError> {
    if names.is_empty() {
        return Err(ThreatCheckError::config("threat_types cannot be empty"));
    }
    names
        .iter()
        .map(|name| {
            name.as_ref()
                .parse::<ThreatCategory>()
                .map_err(ThreatCheckError::config)
        })
        .collect()
}

/// Environment variable configuration that mirrors CLI options.
///
/// Values come from `TC_*` variables; the older names used by earlier
/// deployments (`CSV_FILE`, `GOOGLE_API_KEY`, ...) are accepted as aliases.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub input: Option<String>,
    pub results: Option<String>,
    pub chart: Option<String>,
    pub log: Option<String>,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub concurrency: Option<usize>,
    pub workers: Option<usize>,
    pub timeout: Option<String>,
    pub threat_types: Option<Vec<ThreatCategory>>,
    pub config: Option<String>,
}

/// Load configuration from the process environment.
///
/// Invalid values are ignored, with a warning when `verbose`.
pub fn load_env_config(verbose: bool) -> EnvConfig {
    load_env_config_from(|key| env::var(key).ok(), verbose)
}

/// Load configuration from an arbitrary variable lookup.
pub fn load_env_config_from<F>(lookup: F, verbose: bool) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();

    // First non-blank value among the given names.
    let var = |names: &[&'static str]| -> Option<(&'static str, String)> {
        names.iter().find_map(|name| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .map(|v| (*name, v.trim().to_string()))
        })
    };
    let report = |name: &str, value: &str| {
        if verbose {
            eprintln!("🔧 Using {}={}", name, value);
        }
    };

    for (names, slot) in [
        (&["TC_INPUT", "CSV_FILE"][..], &mut env_config.input),
        (&["TC_RESULTS", "RESULTS_FILE"][..], &mut env_config.results),
        (&["TC_CHART", "CHART_FILE"][..], &mut env_config.chart),
        (&["TC_LOG", "LOG_FILE"][..], &mut env_config.log),
        (&["TC_ENDPOINT"][..], &mut env_config.endpoint),
        (&["TC_CONFIG"][..], &mut env_config.config),
    ] {
        if let Some((name, value)) = var(names) {
            report(name, &value);
            *slot = Some(value);
        }
    }

    // API key is never echoed
    if let Some((name, value)) = var(&["TC_API_KEY", "GOOGLE_API_KEY"]) {
        report(name, "<redacted>");
        env_config.api_key = Some(value);
    }

    for (name, slot) in [
        ("TC_CONCURRENCY", &mut env_config.concurrency),
        ("TC_WORKERS", &mut env_config.workers),
    ] {
        if let Some((name, value)) = var(&[name]) {
            match value.parse::<usize>() {
                Ok(n) if (1..=MAX_CONCURRENCY).contains(&n) => {
                    report(name, &value);
                    *slot = Some(n);
                }
                _ => {
                    if verbose {
                        eprintln!(
                            "⚠️ Invalid {}='{}', must be 1-{}",
                            name, value, MAX_CONCURRENCY
                        );
                    }
                }
            }
        }
    }

    if let Some((name, value)) = var(&["TC_TIMEOUT"]) {
        if parse_timeout_string(&value).is_some() {
            report(name, &value);
            env_config.timeout = Some(value);
        } else if verbose {
            eprintln!(
                "⚠️ Invalid {}='{}', use format like '5s', '30s', '2m'",
                name, value
            );
        }
    }

    if let Some((name, value)) = var(&["TC_THREAT_TYPES"]) {
        let names: Vec<&str> = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        match parse_threat_types(&names) {
            Ok(types) => {
                report(name, &value);
                env_config.threat_types = Some(types);
            }
            Err(e) => {
                if verbose {
                    eprintln!("⚠️ Invalid {}='{}': {}", name, value, e);
                }
            }
        }
    }

    env_config
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: Option<PathBuf>,
    pub results: Option<PathBuf>,
    pub chart: PathBuf,
    pub log: PathBuf,
    pub api_key: Option<String>,
    pub endpoint: String,
    pub pool: PoolConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input: None,
            results: None,
            chart: PathBuf::from(DEFAULT_CHART_PATH),
            log: PathBuf::from(DEFAULT_LOG_PATH),
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            pool: PoolConfig::default(),
        }
    }
}

impl RunConfig {
    /// Overlay values from a (validated) configuration file.
    pub fn apply_file(&mut self, file: &FileConfig) -> Result<(), ThreatCheckError> {
        if let Some(paths) = &file.paths {
            if let Some(input) = &paths.input {
                self.input = Some(PathBuf::from(input));
            }
            if let Some(results) = &paths.results {
                self.results = Some(PathBuf::from(results));
            }
            if let Some(chart) = &paths.chart {
                self.chart = PathBuf::from(chart);
            }
            if let Some(log) = &paths.log {
                self.log = PathBuf::from(log);
            }
        }

        if let Some(defaults) = &file.defaults {
            if let Some(concurrency) = defaults.concurrency {
                self.pool.concurrency = concurrency;
            }
            if let Some(workers) = defaults.workers {
                self.pool.workers = Some(workers);
            }
            if let Some(timeout) = &defaults.timeout {
                self.pool.timeout = parse_timeout(timeout)?;
            }
            if let Some(threat_types) = &defaults.threat_types {
                self.pool.categories = parse_threat_types(threat_types)?;
            }
        }

        if let Some(endpoint) = file.source.as_ref().and_then(|s| s.endpoint.as_ref()) {
            self.endpoint = endpoint.clone();
        }

        Ok(())
    }

    /// Overlay values from the environment.
    pub fn apply_env(&mut self, env: &EnvConfig) -> Result<(), ThreatCheckError> {
        if let Some(input) = &env.input {
            self.input = Some(PathBuf::from(input));
        }
        if let Some(results) = &env.results {
            self.results = Some(PathBuf::from(results));
        }
        if let Some(chart) = &env.chart {
            self.chart = PathBuf::from(chart);
        }
        if let Some(log) = &env.log {
            self.log = PathBuf::from(log);
        }
        if let Some(api_key) = &env.api_key {
            self.api_key = Some(api_key.clone());
        }
        if let Some(endpoint) = &env.endpoint {
            self.endpoint = endpoint.clone();
        }
        if let Some(concurrency) = env.concurrency {
            self.pool.concurrency = concurrency;
        }
        if let Some(workers) = env.workers {
            self.pool.workers = Some(workers);
        }
        if let Some(timeout) = &env.timeout {
            self.pool.timeout = parse_timeout(timeout)?;
        }
        if let Some(threat_types) = &env.threat_types {
            self.pool.categories = threat_types.clone();
        }
        Ok(())
    }

    /// Path of the URL list.
    pub fn input(&self) -> Result<&Path, ThreatCheckError> {
        required(&self.input, "Input file path", "--input, TC_INPUT or [paths] input")
    }

    /// Path of the results table.
    pub fn results(&self) -> Result<&Path, ThreatCheckError> {
        required(
            &self.results,
            "Results file path",
            "--output, TC_RESULTS or [paths] results",
        )
    }

    /// Check everything a run needs before any work starts.
    ///
    /// The API key is only required when lookups will actually be made.
    pub fn validate(&self, require_api_key: bool) -> Result<(), ThreatCheckError> {
        self.input()?;
        self.results()?;

        if require_api_key && self.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(ThreatCheckError::config(
                "Web Risk API key is not set (use TC_API_KEY or GOOGLE_API_KEY)",
            ));
        }

        validate_range("Concurrency", self.pool.concurrency)?;
        if let Some(workers) = self.pool.workers {
            validate_range("Workers", workers)?;
        }
        if self.pool.categories.is_empty() {
            return Err(ThreatCheckError::config("At least one threat type is required"));
        }
        if self.pool.timeout.is_zero() || self.pool.timeout.as_secs() > MAX_TIMEOUT_SECS {
            return Err(ThreatCheckError::config(format!(
                "Timeout must be between 1s and {}s",
                MAX_TIMEOUT_SECS
            )));
        }
        if self.endpoint.trim().is_empty() {
            return Err(ThreatCheckError::config("Endpoint cannot be empty"));
        }

        Ok(())
    }
}

fn required<'a>(
    value: &'a Option<PathBuf>,
    what: &str,
    hint: &str,
) -> Result<&'a Path, ThreatCheckError> {
    match value {
        Some(path) if !path.as_os_str().is_empty() => Ok(path.as_path()),
        _ => Err(ThreatCheckError::config(format!(
            "{} is not set (use {})",
            what, hint
        ))),
    }
}
