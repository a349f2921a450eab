//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.module-agent.toml` files, environment variables and CLI flags.
//! The merged [`Config`] is built once at startup and passed down.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".module-agent.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Collector (dashboard) settings.
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Scanner settings.
    #[serde(default)]
    pub scanner: ScannerConfig,
}

/// General agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Seconds between report cycles.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,

    /// Identifier sent instead of the host's FQDN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval(),
            student_id: None,
        }
    }
}

fn default_interval() -> u64 {
    30
}

/// Dashboard endpoint and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Report endpoint URL.
    #[serde(default = "default_url")]
    pub url: String,

    /// Basic Auth user name.
    #[serde(default = "default_username")]
    pub username: String,

    /// Basic Auth password. Usually injected through `DASHBOARD_PASSWORD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Request timeout in seconds; unset means no timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    /// Honor HTTP(S)_PROXY environment variables.
    #[serde(default = "default_true")]
    pub use_proxy: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: default_username(),
            password: None,
            timeout_seconds: None,
            use_proxy: true,
        }
    }
}

fn default_url() -> String {
    "http://192.168.1.100:8000/api/report".to_string()
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_true() -> bool {
    true
}

/// Module scanner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Workshop root; defaults to three levels above the executable's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Glob for module directory names.
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Validator script name inside each module.
    #[serde(default = "default_validator")]
    pub validator: String,

    /// Interpreter used to run validators.
    #[serde(default = "default_shell")]
    pub shell: PathBuf,

    /// Validator timeout in seconds; unset means validators may run forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator_timeout_seconds: Option<u64>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            root: None,
            pattern: default_pattern(),
            validator: default_validator(),
            shell: default_shell(),
            validator_timeout_seconds: None,
        }
    }
}

fn default_pattern() -> String {
    "module-*".to_string()
}

fn default_validator() -> String {
    "validate.sh".to_string()
}

fn default_shell() -> PathBuf {
    PathBuf::from("/bin/bash")
}

/// Three directory levels above the directory holding the running binary.
pub fn default_workshop_root() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| {
            let dir = exe.parent()?;
            dir.ancestors()
                .nth(3)
                .or_else(|| dir.ancestors().last())
                .map(Path::to_path_buf)
        })
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments (and their environment variables) take precedence,
    /// but only when explicitly provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.url {
            self.collector.url = url.clone();
        }
        if let Some(ref user) = args.user {
            self.collector.username = user.clone();
        }
        if let Some(ref password) = args.password {
            self.collector.password = Some(password.clone());
        }
        if let Some(timeout) = args.http_timeout {
            self.collector.timeout_seconds = Some(timeout);
        }

        if let Some(ref root) = args.root {
            self.scanner.root = Some(root.clone());
        }
        if let Some(ref shell) = args.shell {
            self.scanner.shell = shell.clone();
        }
        if let Some(timeout) = args.validator_timeout {
            self.scanner.validator_timeout_seconds = Some(timeout);
        }

        if let Some(interval) = args.interval {
            self.general.interval_seconds = interval;
        }
        if let Some(ref id) = args.student_id {
            self.general.student_id = Some(id.clone());
        }
    }

    /// Check the merged configuration for values the agent cannot run with.
    pub fn validate(&self) -> Result<()> {
        let url = &self.collector.url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("Collector URL must start with 'http://' or 'https://': {}", url);
        }

        if self.general.interval_seconds == 0 {
            anyhow::bail!("Report interval must be at least 1 second");
        }

        if self.scanner.pattern.is_empty() {
            anyhow::bail!("Module pattern must not be empty");
        }

        if let Err(e) = glob::Pattern::new(&self.scanner.pattern) {
            anyhow::bail!("Invalid module pattern '{}': {}", self.scanner.pattern, e);
        }

        if self.scanner.validator_timeout_seconds == Some(0) {
            anyhow::bail!("Validator timeout must be at least 1 second");
        }

        if self.collector.timeout_seconds == Some(0) {
            anyhow::bail!("Collector timeout must be at least 1 second");
        }

        if self.scanner.validator.is_empty() {
            anyhow::bail!("Validator name must not be empty");
        }

        Ok(())
    }

    /// The workshop root to scan.
    pub fn workshop_root(&self) -> PathBuf {
        self.scanner.root.clone().unwrap_or_else(default_workshop_root)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
