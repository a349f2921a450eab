//! Scan-then-report loop.
//!
//! Each cycle scans the workshop modules, builds a [`Report`] and posts it.
//! Delivery failures are logged and swallowed here, at the cycle boundary,
//! so one outage never stops later cycles.

use crate::error::ReportError;
use crate::identity::NetworkIdentity;
use crate::models::Report;
use crate::reporter::client::ReportClient;
use crate::scanner::ModuleScanner;
use std::time::Duration;
use tracing::{error, info, warn};

/// Configuration for the reporting loop.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Pause between cycles.
    pub interval: Duration,
    /// Stop after this many cycles; `None` runs until interrupted.
    pub max_cycles: Option<usize>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            max_cycles: None,
        }
    }
}

/// Outcome counts of a finished loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub cycles: usize,
    pub sent: usize,
    pub failed: usize,
}

/// The reporting agent.
pub struct ReporterAgent {
    config: AgentConfig,
    identity: NetworkIdentity,
    scanner: ModuleScanner,
    client: ReportClient,
}

impl ReporterAgent {
    /// Create an agent. The identity is fixed for the agent's lifetime.
    pub fn new(
        config: AgentConfig,
        identity: NetworkIdentity,
        scanner: ModuleScanner,
        client: ReportClient,
    ) -> Self {
        Self {
            config,
            identity,
            scanner,
            client,
        }
    }

    /// Scan the modules and build this cycle's report.
    pub async fn build_report(&self) -> Report {
        let modules = self.scanner.scan().await;
        Report::new(
            self.identity.hostname.clone(),
            self.identity.ip_address.to_string(),
            modules,
        )
    }

    /// Run one scan-and-send cycle.
    pub async fn run_cycle(&self) -> Result<Report, ReportError> {
        let report = self.build_report().await;
        let status = self.client.send(&report).await?;

        if status.is_success() {
            info!("Report sent. Status: {}", report.status_line());
        } else {
            warn!(
                "Report sent, collector answered {}. Status: {}",
                status,
                report.status_line()
            );
        }

        Ok(report)
    }

    /// Run cycles until the configured limit or Ctrl-C.
    ///
    /// Ctrl-C is honored at any point: a cycle in flight is abandoned,
    /// which also kills a running validator.
    pub async fn run(&self) -> LoopSummary {
        let mut summary = LoopSummary::default();

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            let outcome = tokio::select! {
                outcome = self.run_cycle() => outcome,
                _ = &mut shutdown => {
                    info!("Interrupted during report cycle, stopping agent");
                    break;
                }
            };

            match outcome {
                Ok(_) => summary.sent += 1,
                Err(e) => {
                    error!("Error reporting status: {}", e);
                    summary.failed += 1;
                }
            }
            summary.cycles += 1;

            if let Some(max) = self.config.max_cycles {
                if summary.cycles >= max {
                    break;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = &mut shutdown => {
                    info!("Interrupted, stopping agent");
                    break;
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::client::ClientConfig;
    use crate::reporter::test_support::{spawn_collector, unreachable_url};
    use crate::scanner::ScanConfig;
    use serial_test::serial;
    use std::fs;
    use std::net::{IpAddr, Ipv4Addr};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn make_agent(root: &Path, url: String, max_cycles: Option<usize>) -> ReporterAgent {
        let scanner = ModuleScanner::new(
            root.to_path_buf(),
            ScanConfig {
                shell: PathBuf::from("sh"),
                ..ScanConfig::default()
            },
        )
        .unwrap();
        let client = ReportClient::new(ClientConfig {
            url,
            username: "admin".to_string(),
            password: Some("secret".to_string()),
            timeout_seconds: Some(5),
            use_proxy: false,
        })
        .unwrap();
        let identity = NetworkIdentity {
            hostname: "lab01.example.org".to_string(),
            ip_address: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)),
        };
        let config = AgentConfig {
            interval: Duration::from_millis(20),
            max_cycles,
        };

        ReporterAgent::new(config, identity, scanner, client)
    }

    fn add_module(root: &Path, name: &str, validator: Option<&str>) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        if let Some(body) = validator {
            fs::write(dir.join("validate.sh"), body).unwrap();
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_cycle_reports_scanned_modules() {
        let tmp = TempDir::new().unwrap();
        add_module(tmp.path(), "module-01", None);
        add_module(tmp.path(), "module-02", Some("exit 0\n"));

        let (url, mut requests) = spawn_collector(200).await;
        let agent = make_agent(tmp.path(), url, Some(1));

        let report = agent.run_cycle().await.unwrap();
        assert_eq!(report.student_id, "lab01.example.org");
        assert_eq!(report.ip_address, "10.0.0.7");

        let request = requests.recv().await.unwrap();
        let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(
            body["modules"],
            serde_json::json!({"module-01": "PENDING", "module-02": "OK"})
        );
    }

    #[tokio::test]
    #[serial]
    async fn test_empty_workshop_still_reports() {
        let tmp = TempDir::new().unwrap();
        let (url, mut requests) = spawn_collector(200).await;
        let agent = make_agent(tmp.path(), url, Some(1));

        let summary = agent.run().await;
        assert_eq!(summary.sent, 1);

        let request = requests.recv().await.unwrap();
        let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(body["modules"], serde_json::json!({}));
    }

    #[tokio::test]
    #[serial]
    async fn test_transport_errors_do_not_stop_the_loop() {
        let tmp = TempDir::new().unwrap();
        add_module(tmp.path(), "module-03", Some("exit 101\n"));

        let agent = make_agent(tmp.path(), unreachable_url(), Some(3));
        let summary = agent.run().await;

        assert_eq!(
            summary,
            LoopSummary {
                cycles: 3,
                sent: 0,
                failed: 3
            }
        );
    }

    #[tokio::test]
    #[serial]
    async fn test_loop_rescans_every_cycle() {
        let tmp = TempDir::new().unwrap();
        add_module(tmp.path(), "module-01", Some("exit 0\n"));

        let (url, mut requests) = spawn_collector(200).await;
        let agent = make_agent(tmp.path(), url, Some(2));

        let summary = agent.run().await;
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.failed, 0);

        for _ in 0..2 {
            let request = requests.recv().await.unwrap();
            let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
            assert_eq!(body["modules"]["module-01"], "OK");
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_collector_error_status_counts_as_sent() {
        let tmp = TempDir::new().unwrap();
        let (url, _requests) = spawn_collector(503).await;
        let agent = make_agent(tmp.path(), url, Some(1));

        let summary = agent.run().await;
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    #[serial]
    async fn test_interrupt_during_cycle_stops_the_loop() {
        let tmp = TempDir::new().unwrap();
        add_module(tmp.path(), "module-01", Some("sleep 5\nexit 0\n"));

        let agent = make_agent(tmp.path(), unreachable_url(), Some(3));

        tokio::spawn(async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let status = std::process::Command::new("kill")
                .args(["-INT", &std::process::id().to_string()])
                .status()
                .unwrap();
            assert!(status.success());
        });

        let started = std::time::Instant::now();
        let summary = agent.run().await;

        assert_eq!(summary, LoopSummary::default());
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
