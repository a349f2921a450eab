//! Report delivery and the polling loop.
//!
//! This module provides the HTTP client that posts reports to the
//! dashboard and the loop that drives scan-then-report cycles.

pub mod agent_loop;
pub mod client;

pub use agent_loop::{AgentConfig, ReporterAgent};
pub use client::{ClientConfig, ReportClient};

/// Minimal stand-in for the dashboard used by the reporter tests.
#[cfg(test)]
pub(crate) mod test_support {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// A request as seen by the fake collector.
    #[derive(Debug)]
    pub struct CapturedRequest {
        pub request_line: String,
        pub headers: Vec<(String, String)>,
        pub body: String,
    }

    impl CapturedRequest {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        }
    }

    /// Start a collector on a random local port answering every request
    /// with `status`. Returns the report URL and a channel of requests.
    pub async fn spawn_collector(
        status: u16,
    ) -> (String, mpsc::UnboundedReceiver<CapturedRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let Some(request) = read_request(&mut stream).await else {
                    continue;
                };
                let response = format!(
                    "HTTP/1.1 {} Status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
                let _ = tx.send(request);
            }
        });

        (format!("http://{}/api/report", addr), rx)
    }

    async fn read_request(stream: &mut tokio::net::TcpStream) -> Option<CapturedRequest> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];

        let head_end = loop {
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos;
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let mut lines = head.split("\r\n");
        let request_line = lines.next()?.to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();

        let content_length = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.parse::<usize>().ok())
            .unwrap_or(0);

        let body_start = head_end + 4;
        while buf.len() < body_start + content_length {
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let body_end = buf.len().min(body_start + content_length);
        let body = String::from_utf8_lossy(&buf[body_start..body_end]).to_string();

        Some(CapturedRequest {
            request_line,
            headers,
            body,
        })
    }

    /// A URL nothing listens on.
    pub fn unreachable_url() -> String {
        "http://127.0.0.1:1/api/report".to_string()
    }
}
