//! Error types for report delivery.

use thiserror::Error;

/// Failure to deliver a report to the collector.
///
/// Only transport-level failures are errors; a collector answering with a
/// non-success status still counts as delivered.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    /// The collector could not be reached.
    #[error("cannot connect to collector at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Any other failure while sending the request.
    #[error("failed to send report: {0}")]
    Request(#[from] reqwest::Error),
}

impl ReportError {
    /// Classify a reqwest error for the given collector URL.
    pub fn from_transport(error: reqwest::Error, url: &str, timeout_seconds: Option<u64>) -> Self {
        if error.is_timeout() {
            ReportError::Timeout {
                url: url.to_string(),
                seconds: timeout_seconds.unwrap_or_default(),
            }
        } else if error.is_connect() {
            ReportError::Connect {
                url: url.to_string(),
                source: error,
            }
        } else {
            ReportError::Request(error)
        }
    }
}
