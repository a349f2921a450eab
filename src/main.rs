//! module-agent - workshop progress heartbeat
//!
//! Scans the workshop's module directories, classifies each one by
//! running its validator, and reports the results to the dashboard on a
//! fixed interval.
//!
//! Exit codes:
//!   0 - Stopped normally (Ctrl-C, or a successful --once / --dry-run)
//!   1 - Startup error, or the --once report could not be delivered

mod cli;
mod config;
mod error;
mod identity;
mod models;
mod reporter;
mod scanner;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use identity::NetworkIdentity;
use models::Report;
use reporter::{AgentConfig, ClientConfig, ReportClient, ReporterAgent};
use scanner::{ModuleScanner, ScanConfig};
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    debug!("module-agent v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_agent(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Agent failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .module-agent.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("Set DASHBOARD_PASSWORD in the environment rather than in the file.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `RUST_LOG` takes precedence over the CLI verbosity flags.
fn init_logging(args: &Args) {
    let level = args.log_level();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::default().add_directive(LevelFilter::from_level(level).into())
    });

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Build the agent from configuration and run it. Returns the exit code.
async fn run_agent(args: Args) -> Result<i32> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let root = config.workshop_root();
    if !root.is_dir() {
        warn!("Workshop root {} is not a directory", root.display());
    }

    let scanner = ModuleScanner::new(root, ScanConfig::from(&config.scanner))?;
    let identity = NetworkIdentity::resolve(config.general.student_id.as_deref());

    // Handle --dry-run: scan and print the payload
    if args.dry_run {
        return handle_dry_run(&identity, &scanner).await;
    }

    info!(
        "Agent started. ID: {}, IP: {}",
        identity.hostname, identity.ip_address
    );
    info!("Reporting to: {}", config.collector.url);
    info!(
        "Workshop root: {} (every {}s)",
        scanner.root().display(),
        config.general.interval_seconds
    );

    if config.collector.password.is_none() {
        warn!("No dashboard password configured (DASHBOARD_PASSWORD); sending an empty one");
    }
    if config.scanner.validator_timeout_seconds.is_none() {
        debug!("No validator timeout set; a hung validator will block the agent");
    }

    let client = ReportClient::new(ClientConfig::from(&config.collector))?;

    let agent_config = AgentConfig {
        interval: Duration::from_secs(config.general.interval_seconds),
        max_cycles: args.once.then_some(1),
    };

    let agent = ReporterAgent::new(agent_config, identity, scanner, client);
    let summary = agent.run().await;

    debug!(
        "Agent stopped after {} cycles ({} sent, {} failed)",
        summary.cycles, summary.sent, summary.failed
    );

    if args.once && summary.failed > 0 {
        return Ok(1);
    }

    Ok(0)
}

/// Handle --dry-run: scan modules, print the report JSON, exit.
async fn handle_dry_run(identity: &NetworkIdentity, scanner: &ModuleScanner) -> Result<i32> {
    info!("Dry run: scanning {} (no report sent)", scanner.root().display());

    let modules = scanner.scan().await;
    let report = Report::new(
        identity.hostname.clone(),
        identity.ip_address.to_string(),
        modules,
    );

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    println!("{}", json);
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
