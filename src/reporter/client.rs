//! HTTP client for the dashboard collector.

use crate::error::ReportError;
use crate::models::Report;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// Settings for the report client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: String,
    pub username: String,
    pub password: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub use_proxy: bool,
}

impl From<&crate::config::CollectorConfig> for ClientConfig {
    fn from(config: &crate::config::CollectorConfig) -> Self {
        Self {
            url: config.url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            timeout_seconds: config.timeout_seconds,
            use_proxy: config.use_proxy,
        }
    }
}

/// Posts reports to the collector with HTTP Basic Authentication.
pub struct ReportClient {
    config: ClientConfig,
    http_client: reqwest::Client,
}

impl ReportClient {
    /// Create a new client.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("module-agent/", env!("CARGO_PKG_VERSION")));

        if let Some(seconds) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(seconds));
        }
        if !config.use_proxy {
            builder = builder.no_proxy();
        }

        let http_client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Send one report. The response body is ignored.
    ///
    /// Returns the HTTP status the collector answered with; only
    /// transport failures are errors.
    pub async fn send(&self, report: &Report) -> Result<StatusCode, ReportError> {
        debug!("Posting report for {} to {}", report.student_id, self.config.url);

        let response = self
            .http_client
            .post(&self.config.url)
            .basic_auth(&self.config.username, self.config.password.as_deref())
            .json(report)
            .send()
            .await
            .map_err(|e| {
                ReportError::from_transport(e, &self.config.url, self.config.timeout_seconds)
            })?;

        Ok(response.status())
    }
}
