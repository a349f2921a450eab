//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including environment fallbacks and validation.

use clap::Parser;
use std::path::PathBuf;

/// module-agent - workshop progress heartbeat
///
/// Periodically runs each module's validate.sh under the workshop root
/// and reports the results, with this host's identity, to the dashboard.
///
/// Examples:
///   module-agent
///   module-agent --url http://dashboard.local:8000/api/report --interval 10
///   module-agent --root ~/workshop --dry-run
///   module-agent --once
///   module-agent --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Dashboard endpoint receiving the reports
    ///
    /// Default: http://192.168.1.100:8000/api/report
    #[arg(long, value_name = "URL", env = "DASHBOARD_URL")]
    pub url: Option<String>,

    /// Workshop root containing the module-* directories
    ///
    /// Default: three directory levels above the agent executable.
    #[arg(long, value_name = "DIR", env = "WORKSHOP_ROOT")]
    pub root: Option<PathBuf>,

    /// Seconds to wait between report cycles (default: 30)
    #[arg(short, long, value_name = "SECS", env = "AGENT_INTERVAL")]
    pub interval: Option<u64>,

    /// User name for dashboard Basic Auth (default: admin)
    #[arg(long, value_name = "USER", env = "DASHBOARD_USER")]
    pub user: Option<String>,

    /// Password for dashboard Basic Auth
    #[arg(
        long,
        value_name = "PASSWORD",
        env = "DASHBOARD_PASSWORD",
        hide_env_values = true
    )]
    pub password: Option<String>,

    /// Identifier reported instead of this host's FQDN
    #[arg(long, value_name = "ID", env = "STUDENT_ID")]
    pub student_id: Option<String>,

    /// Kill validators that run longer than this many seconds
    ///
    /// Without this, a hung validator blocks the agent indefinitely.
    #[arg(long, value_name = "SECS", env = "VALIDATOR_TIMEOUT")]
    pub validator_timeout: Option<u64>,

    /// Timeout for the report request in seconds
    #[arg(long, value_name = "SECS")]
    pub http_timeout: Option<u64>,

    /// Interpreter used to run validators (default: /bin/bash)
    #[arg(long, value_name = "PATH")]
    pub shell: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .module-agent.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Run a single report cycle and exit
    ///
    /// Exit code 1 when the report could not be delivered.
    #[arg(long)]
    pub once: bool,

    /// Scan modules and print the report without sending it
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .module-agent.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Dashboard URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.interval == Some(0) {
            return Err("Interval must be at least 1 second".to_string());
        }

        if self.validator_timeout == Some(0) {
            return Err("Validator timeout must be at least 1 second".to_string());
        }

        if self.http_timeout == Some(0) {
            return Err("HTTP timeout must be at least 1 second".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.once && self.dry_run {
            return Err("Cannot use both --once and --dry-run".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
