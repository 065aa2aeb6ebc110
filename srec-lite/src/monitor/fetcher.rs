//! Status page fetching.
//!
//! The liveness checker only needs "give me the body at this URL". That is
//! expressed as the [`PageFetcher`] trait so the poll loop can be exercised
//! without a network.

use async_trait::async_trait;
use thiserror::Error;
use tracing::trace;

/// Failure to obtain a status page.
///
/// A fetch error means the source's state is unknown for this cycle; it is
/// never interpreted as "offline".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request could not be sent or the connection failed.
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// The server answered with a non-success status code.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The response body could not be read.
    #[error("failed to read body from {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    pub fn request(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Request { url, .. } | Self::Status { url, .. } | Self::Body { url, .. } => url,
        }
    }
}

/// Fetches the raw body of a status page.
#[async_trait]
pub trait PageFetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// [`PageFetcher`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        trace!(url = %url, "Fetching status page");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::request(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::Status {
            url: "https://example.com/alice/".to_string(),
            status: 503,
        };
        assert_eq!(err.to_string(), "https://example.com/alice/ returned HTTP 503");
        assert_eq!(err.url(), "https://example.com/alice/");
    }

    #[tokio::test]
    async fn test_connection_refused_is_request_error() {
        // Grab a free port, then release it so nothing is listening there.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let fetcher = HttpPageFetcher::new(reqwest::Client::new());
        let url = format!("http://127.0.0.1:{port}/bob/");
        let err = fetcher.fetch(&url).await.unwrap_err();

        assert!(matches!(err, FetchError::Request { .. }));
        assert_eq!(err.url(), url);
    }
}
