//! Lotto ingest: Downloader
//!
//! One bounded GET per call, outcome classified, nothing thrown. Retry and
//! fallback policy belong to the orchestrator.

use std::fmt;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Body(String),
    /// DNS, connect, TLS, timeout or body-read failure.
    Unreachable(String),
    BadStatus(u16),
    /// 2xx with a blank body.
    Empty,
}

impl Outcome {
    pub fn is_body(&self) -> bool {
        matches!(self, Outcome::Body(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Body(b) => write!(f, "body ({} bytes)", b.len()),
            Outcome::Unreachable(reason) => write!(f, "unreachable: {reason}"),
            Outcome::BadStatus(code) => write!(f, "HTTP {code}"),
            Outcome::Empty => f.write_str("empty body"),
        }
    }
}

pub struct Downloader {
    client: reqwest::Client,
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader {
    pub fn new() -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("text/csv,text/html,application/xhtml+xml,*/*;q=0.8"),
        );

        Self {
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .default_headers(headers)
                .gzip(true)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Single attempt bounded by `timeout` (connect + headers + body).
    pub async fn fetch(&self, url: &str, timeout: Duration) -> Outcome {
        let resp = match self.client.get(url).timeout(timeout).send().await {
            Ok(r) => r,
            Err(e) => return Outcome::Unreachable(describe(&e)),
        };

        let status = resp.status();
        if !status.is_success() {
            debug!("GET {url} → {status}");
            return Outcome::BadStatus(status.as_u16());
        }

        match resp.text().await {
            Ok(body) if body.trim().is_empty() => Outcome::Empty,
            Ok(body) => {
                debug!("GET {url} → {status} ({} bytes)", body.len());
                Outcome::Body(body)
            }
            Err(e) => Outcome::Unreachable(describe(&e)),
        }
    }
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out: {e}")
    } else if e.is_connect() {
        format!("connect failed: {e}")
    } else {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn body_on_success() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rows.csv");
                then.status(200).body("Draw Date,Winning Numbers\n");
            })
            .await;

        let out = Downloader::new().fetch(&server.url("/rows.csv"), Duration::from_secs(5)).await;
        assert_eq!(out, Outcome::Body("Draw Date,Winning Numbers\n".into()));
    }

    #[tokio::test]
    async fn non_success_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(503).body("maintenance");
            })
            .await;

        let out = Downloader::new().fetch(&server.url("/x"), Duration::from_secs(5)).await;
        assert_eq!(out, Outcome::BadStatus(503));
    }

    #[tokio::test]
    async fn blank_body_is_empty() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).body("  \n");
            })
            .await;

        let out = Downloader::new().fetch(&server.url("/x"), Duration::from_secs(5)).await;
        assert_eq!(out, Outcome::Empty);
    }

    #[tokio::test]
    async fn timeout_is_unreachable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).body("late").delay(Duration::from_secs(3));
            })
            .await;

        let out = Downloader::new().fetch(&server.url("/x"), Duration::from_millis(200)).await;
        assert!(matches!(out, Outcome::Unreachable(ref r) if r.starts_with("timed out")), "{out:?}");
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let out = Downloader::new().fetch("http://127.0.0.1:9/", Duration::from_secs(2)).await;
        assert!(matches!(out, Outcome::Unreachable(_)));
    }
}
