//! Module scanner for discovering and classifying workshop modules.
//!
//! Every immediate subdirectory of the workshop root whose name matches the
//! module pattern is a module. A module's status comes from the exit code of
//! its validator script, or `PENDING` when it has none.

use crate::models::{ModuleStatus, ModuleStatuses};
use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Configuration for module scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Glob matched against directory names (e.g., "module-*")
    pub pattern: String,
    /// Validator file name looked up inside each module
    pub validator: String,
    /// Interpreter the validator is run with
    pub shell: PathBuf,
    /// Upper bound on a validator run; `None` waits forever.
    /// On expiry the validator's whole process group is killed.
    pub validator_timeout: Option<Duration>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            pattern: "module-*".to_string(),
            validator: "validate.sh".to_string(),
            shell: PathBuf::from("/bin/bash"),
            validator_timeout: None,
        }
    }
}

impl From<&crate::config::ScannerConfig> for ScanConfig {
    fn from(config: &crate::config::ScannerConfig) -> Self {
        Self {
            pattern: config.pattern.clone(),
            validator: config.validator.clone(),
            shell: config.shell.clone(),
            validator_timeout: config.validator_timeout_seconds.map(Duration::from_secs),
        }
    }
}

/// Directory names are matched one path component at a time, and a
/// leading dot must be matched literally, so `*` skips hidden directories.
const MODULE_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Scanner for the modules under a workshop root.
pub struct ModuleScanner {
    config: ScanConfig,
    pattern: Pattern,
    root: PathBuf,
}

impl ModuleScanner {
    /// Create a new module scanner, compiling the module pattern.
    pub fn new(root: PathBuf, config: ScanConfig) -> Result<Self> {
        let pattern = Pattern::new(&config.pattern)
            .with_context(|| format!("Invalid module pattern '{}'", config.pattern))?;

        Ok(Self {
            config,
            pattern,
            root,
        })
    }

    /// The workshop root being scanned.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find module directories, sorted by name.
    ///
    /// An unreadable root yields no modules.
    pub fn discover(&self) -> Vec<PathBuf> {
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        let mut modules = Vec::new();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    warn!("Cannot read workshop root {}: {}", self.root.display(), e);
                    break;
                }
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            if self.is_module_name(&entry.file_name().to_string_lossy()) {
                modules.push(entry.into_path());
            }
        }

        modules
    }

    /// Check a directory name against the module pattern.
    pub fn is_module_name(&self, name: &str) -> bool {
        self.pattern.matches_with(name, MODULE_MATCH)
    }

    /// Scan all modules and classify each one.
    ///
    /// Modules are checked one after another; a failure in one module
    /// only affects that module's status.
    pub async fn scan(&self) -> ModuleStatuses {
        let mut results = ModuleStatuses::new();

        for dir in self.discover() {
            let Some(name) = dir.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };

            let status = self.check_module(&dir).await;
            debug!("Module {} -> {}", name, status);
            results.insert(name, status);
        }

        results
    }

    /// Determine the status of a single module directory.
    pub async fn check_module(&self, module_dir: &Path) -> ModuleStatus {
        let script = module_dir.join(&self.config.validator);

        if !script.is_file() {
            return ModuleStatus::Pending;
        }

        self.run_validator(module_dir, &script).await
    }

    /// Run a validator with the module as working directory, output discarded.
    async fn run_validator(&self, module_dir: &Path, script: &Path) -> ModuleStatus {
        let mut command = Command::new(&self.config.shell);
        command
            .arg(script)
            .current_dir(module_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to run validator {}: {}", script.display(), e);
                return ModuleStatus::Error;
            }
        };
        let mut validator = ValidatorProcess { child };

        let result = match self.config.validator_timeout {
            Some(limit) => match tokio::time::timeout(limit, validator.child.wait()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        "Validator {} timed out after {}s",
                        script.display(),
                        limit.as_secs_f64()
                    );
                    return ModuleStatus::Error;
                }
            },
            None => validator.child.wait().await,
        };

        match result {
            Ok(status) => ModuleStatus::from_exit_code(status.code()),
            Err(e) => {
                warn!("Failed to wait for validator {}: {}", script.display(), e);
                ModuleStatus::Error
            }
        }
    }
}

/// A spawned validator running in its own process group.
///
/// Dropping it before the validator has been waited on (timeout, or the
/// cycle being abandoned) kills the whole group, so commands started by the
/// script die with it.
struct ValidatorProcess {
    child: Child,
}

impl Drop for ValidatorProcess {
    fn drop(&mut self) {
        // `id` is `None` once the child has been reaped.
        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            // SAFETY: kill(2) takes no pointers; a negative pid targets the
            // process group the validator leads.
            unsafe {
                libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
            }
        }
    }
}
