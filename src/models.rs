//! Data models for the module agent.
//!
//! This module contains the status values computed by the scanner and
//! the report payload sent to the dashboard.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Completion state of a workshop module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleStatus {
    /// Validator exited 0
    Ok,
    /// No validator, or validator exited 100
    Pending,
    /// Validator exited 101
    InProgress,
    /// Validator exited with any other code
    Fail,
    /// Validator could not be run
    Error,
}

impl ModuleStatus {
    /// Classify a validator exit code.
    ///
    /// `None` means the process ended without a code (killed by a signal),
    /// which counts as a failed check rather than an invocation error.
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => ModuleStatus::Ok,
            Some(100) => ModuleStatus::Pending,
            Some(101) => ModuleStatus::InProgress,
            _ => ModuleStatus::Fail,
        }
    }

    /// Wire representation used in the report payload.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleStatus::Ok => "OK",
            ModuleStatus::Pending => "PENDING",
            ModuleStatus::InProgress => "IN_PROGRESS",
            ModuleStatus::Fail => "FAIL",
            ModuleStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Module name to status, ordered by name.
pub type ModuleStatuses = BTreeMap<String, ModuleStatus>;

/// The status report sent to the dashboard each cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Identifier of the reporting host (its FQDN unless overridden).
    pub student_id: String,
    /// Outbound IP address of the host.
    pub ip_address: String,
    /// Status of every discovered module.
    pub modules: ModuleStatuses,
}

impl Report {
    /// Build a report for the given identity and scan result.
    pub fn new(
        student_id: impl Into<String>,
        ip_address: impl Into<String>,
        modules: ModuleStatuses,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            ip_address: ip_address.into(),
            modules,
        }
    }

    /// One-line rendering of the module statuses for log output.
    pub fn status_line(&self) -> String {
        let entries: Vec<String> = self
            .modules
            .iter()
            .map(|(name, status)| format!("{}: {}", name, status))
            .collect();
        format!("{{{}}}", entries.join(", "))
    }
}
