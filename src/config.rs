//! Run settings: an optional TOML file layered under command-line flags.
//!
//! The file is looked up at ./novelscrape.toml, then
//! $XDG_CONFIG_HOME/novelscrape/config.toml (or ~/.config/novelscrape/config.toml).
//! Precedence for every key is flag, then file, then built-in default.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Request timeout when neither flag nor config sets one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Worker threads for page and chapter fetches when neither flag nor config sets them.
pub const DEFAULT_WORKERS: usize = 4;

const FILE_NAME: &str = "novelscrape.toml";

/// Config file contents. Every key is optional; unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Directory for the JSON file when -o is not set. Relative to CWD.
    pub output_dir: Option<PathBuf>,
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Size of the fetch worker pool.
    pub workers: Option<usize>,
}

/// Candidate config files, most specific first.
fn candidate_paths(cwd: &Path, config_dir: Option<PathBuf>) -> Vec<PathBuf> {
    let mut paths = vec![cwd.join(FILE_NAME)];
    if let Some(d) = config_dir {
        paths.push(d.join("novelscrape").join("config.toml"));
    }
    paths
}

/// First existing file of `paths`, parsed.
fn load_first(paths: &[PathBuf]) -> Result<Option<Config>, String> {
    match paths.iter().find(|p| p.exists()) {
        Some(path) => load_config_from(path).map(Some),
        None => Ok(None),
    }
}

/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    load_first(&candidate_paths(&cwd, dirs::config_dir()))
}

/// Read and parse one config file.
pub fn load_config_from(path: &Path) -> Result<Config, String> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
    toml::from_str(&s).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
}

/// Values set on the command line. `None` defers to the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
    pub workers: Option<usize>,
}

/// Effective settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub output_dir: PathBuf,
    /// `None` keeps the HTTP client's browser-like default.
    pub user_agent: Option<String>,
    pub timeout_secs: u64,
    pub workers: usize,
}

impl Settings {
    /// Layer `flags` over `file` over the defaults. Zero timeouts or worker counts are rejected.
    pub fn resolve(flags: Overrides, file: Option<&Config>) -> Result<Self, String> {
        let timeout_secs = flags
            .timeout_secs
            .or_else(|| file.and_then(|c| c.timeout_secs))
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err("Timeout must be at least 1 second".to_string());
        }
        let workers = flags
            .workers
            .or_else(|| file.and_then(|c| c.workers))
            .unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            return Err("Worker count must be at least 1".to_string());
        }
        Ok(Self {
            output_dir: file
                .and_then(|c| c.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from(".")),
            user_agent: flags
                .user_agent
                .or_else(|| file.and_then(|c| c.user_agent.clone())),
            timeout_secs,
            workers,
        })
    }
}
