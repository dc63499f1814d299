//! HTTP source for upstream dividend pages
//!
//! Fetches the raw HTML of a security's dividends page. Any transport failure,
//! timeout or non-success status is reported as a `FetchError`; callers treat
//! it as fatal for the run.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

/// Default dividends page, `{code}` is replaced with the lower-case ticker
pub const DEFAULT_SOURCE_URL: &str = "https://www.investsmart.com.au/shares/asx-{code}/dividends";

/// Placeholder substituted with the ticker in the URL template
const CODE_PLACEHOLDER: &str = "{code}";

/// Upstream pages reject obvious bot user agents
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36";

/// Errors that can occur when fetching a dividends page
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL template has nowhere to put the ticker
    #[error("Source URL template must contain {{code}}: '{0}'")]
    InvalidTemplate(String),

    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request did not complete within the configured timeout
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    /// Connection, TLS or body read failure
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },
}

/// Client for fetching dividends pages from the upstream site
#[derive(Debug, Clone)]
pub struct DividendSource {
    /// HTTP client with browser headers and request timeout applied
    http_client: Client,
    /// URL template containing `{code}`
    url_template: String,
}

impl DividendSource {
    /// Creates a source for the given URL template and per-request timeout
    pub fn new(url_template: &str, timeout: Duration) -> Result<Self, FetchError> {
        if !url_template.contains(CODE_PLACEHOLDER) {
            return Err(FetchError::InvalidTemplate(url_template.to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("text/html"));

        let http_client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            http_client,
            url_template: url_template.to_string(),
        })
    }

    /// Builds the page URL for a ticker
    pub fn url_for(&self, code: &str) -> String {
        self.url_template
            .replace(CODE_PLACEHOLDER, &code.to_ascii_lowercase())
    }

    /// Fetches the raw dividends page for a ticker
    ///
    /// # Returns
    /// * `Ok(String)` - The page body
    /// * `Err(FetchError)` - On timeout, transport failure or non-success status
    pub async fn fetch(&self, code: &str) -> Result<String, FetchError> {
        let url = self.url_for(code);
        debug!(%url, "fetching dividends page");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url, status });
        }

        let body = response.text().await.map_err(|e| classify(&url, e))?;
        debug!(%url, bytes = body.len(), "fetched dividends page");
        Ok(body)
    }
}

/// Separates timeouts from other transport errors
fn classify(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_template_without_placeholder() {
        let result = DividendSource::new("https://example.com/dividends", Duration::from_secs(5));
        assert!(matches!(result, Err(FetchError::InvalidTemplate(_))));
    }

    #[test]
    fn test_url_for_lowercases_code() {
        let source = DividendSource::new(DEFAULT_SOURCE_URL, Duration::from_secs(5)).unwrap();
        assert_eq!(
            source.url_for("VHY"),
            "https://www.investsmart.com.au/shares/asx-vhy/dividends"
        );
    }

    #[test]
    fn test_invalid_template_message_mentions_placeholder() {
        let err = DividendSource::new("https://example.com", Duration::from_secs(5)).unwrap_err();
        assert!(err.to_string().contains("{code}"));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_is_error() {
        // Port 9 (discard) is not listening on loopback in test environments
        let source =
            DividendSource::new("http://127.0.0.1:9/{code}", Duration::from_secs(2)).unwrap();
        let result = source.fetch("VHY").await;
        assert!(matches!(
            result,
            Err(FetchError::Http { .. }) | Err(FetchError::Timeout { .. })
        ));
    }
}
