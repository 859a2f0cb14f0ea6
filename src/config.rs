//! Configuration for quickcap.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (QUICKCAP_API_URL, QUICKCAP_API_KEY, QUICKCAP_HOME)
//! 2. Config file (.quickcap/config.yaml)
//! 3. Defaults (~/.quickcap, local API server)
//!
//! Config file discovery:
//! - Searches current directory and parents for .quickcap/config.yaml
//!
//! The resolved config is loaded once at startup and passed by value into
//! the components that need it; there is no global.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Default base URL for the remote capture API
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

/// Default per-request deadline
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default retry budget for transient network failures
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Fixed database file name under the home directory
pub const DB_FILE_NAME: &str = "captures.db";

/// Default toast lifetime in milliseconds
pub const DEFAULT_TOAST_DURATION_MS: u64 = 3000;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub api: Option<ApiConfig>,
    #[serde(default)]
    pub paths: Option<PathsConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative paths resolve against the config file's
    /// parent directory)
    pub home: Option<String>,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote capture API
    pub base_url: String,
    /// Bearer credential sent with every request
    pub api_key: String,
    /// Per-request deadline
    pub timeout: Duration,
    /// Retry budget for transient network failures
    pub max_retries: u32,
    /// Absolute path to the quickcap home (local state)
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Config {
    /// Path to the local capture database.
    pub fn db_path(&self) -> PathBuf {
        self.home.join(DB_FILE_NAME)
    }

    /// Load configuration from all sources.
    pub fn load() -> Result<Self> {
        let default_home = dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(".quickcap");

        let config_file = find_config_file();

        let (api, home) = if let Some(ref config_path) = config_file {
            let config = load_config_file(config_path)?;

            // .quickcap/ directory, base for relative paths
            let quickcap_dir = config_path.parent().unwrap_or(Path::new("."));

            let home = if let Ok(env_home) = std::env::var("QUICKCAP_HOME") {
                PathBuf::from(env_home)
            } else if let Some(home_path) = config.paths.as_ref().and_then(|p| p.home.as_ref()) {
                resolve_path(quickcap_dir, home_path)
            } else {
                default_home
            };

            (config.api.unwrap_or_default(), home)
        } else {
            let home = std::env::var("QUICKCAP_HOME")
                .map(PathBuf::from)
                .unwrap_or(default_home);

            (ApiConfig::default(), home)
        };

        let base_url = std::env::var("QUICKCAP_API_URL")
            .ok()
            .or(api.base_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let api_key = std::env::var("QUICKCAP_API_KEY")
            .ok()
            .or(api.api_key)
            .unwrap_or_default();

        if api_key.is_empty() {
            tracing::warn!("No API key configured; remote calls will be unauthenticated");
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout: Duration::from_secs(api.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            max_retries: api.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            home,
            config_file,
        })
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".quickcap").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let quickcap_dir = temp.path().join(".quickcap");
        std::fs::create_dir_all(&quickcap_dir).unwrap();

        let config_path = quickcap_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
api:
  base_url: https://notes.example.org
  api_key: secret
  timeout_seconds: 10
paths:
  home: ./
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.version, "1.0");

        let api = config.api.unwrap();
        assert_eq!(api.base_url, Some("https://notes.example.org".to_string()));
        assert_eq!(api.api_key, Some("secret".to_string()));
        assert_eq!(api.timeout_seconds, Some(10));
        assert_eq!(api.max_retries, None);

        assert_eq!(config.paths.unwrap().home, Some("./".to_string()));
    }

    #[test]
    fn test_db_path_under_home() {
        let config = Config {
            base_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            home: PathBuf::from("/test/.quickcap"),
            config_file: None,
        };

        assert_eq!(config.db_path(), PathBuf::from("/test/.quickcap/captures.db"));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./state"),
            PathBuf::from("/home/user/project/state")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
