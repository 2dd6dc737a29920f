//! # Remote Fetch
//!
//! Purpose: Issue the peer-protocol GET (`{base}{group}/{key}`, both
//! segments percent-encoded) and decode the binary response body.
//!
//! ## Design Principles
//! 1. **Shared Connection Pool**: The `reqwest` client is injected so every
//!    peer of a pool reuses one pool of connections.
//! 2. **Fail Fast**: Non-success statuses and framing problems surface
//!    immediately as typed errors.
//! 3. **Binary-Safe Paths**: Group and key are escaped per path segment, so
//!    keys containing `/`, `%`, or spaces survive the round trip.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use prost::Message;
use reqwest::StatusCode;
use thiserror::Error;

use shoal_cache::PeerFetcher;
use shoal_common::{BoxError, FetchResponse};

/// Characters escaped inside the group and key path segments. `/` and `%`
/// must be in the set so the server can split the path unambiguously.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'%')
    .add(b'+');

/// Result type for peer fetches.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors surfaced while talking to a remote owner.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network failure or invalid HTTP exchange.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The peer answered with a non-success status.
    #[error("peer returned status {0}")]
    Status(StatusCode),
    /// The response body was not a valid wire message.
    #[error("decoding response body: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// HTTP client for one remote peer.
pub struct HttpFetcher {
    base_url: String,
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher for the peer behind `base_url` (peer address plus
    /// base path, e.g. `http://127.0.0.1:8001/_geecache/`). A missing
    /// trailing slash is added.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        HttpFetcher { base_url, client }
    }

    /// The peer's base URL, always slash-terminated.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches and decodes the value for `key` in `group`.
    pub async fn get(&self, group: &str, key: &str) -> FetchResult<Vec<u8>> {
        let url = self.url_for(group, key);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.bytes().await?;
        let decoded = FetchResponse::decode(body.as_ref())?;
        Ok(decoded.value)
    }

    fn url_for(&self, group: &str, key: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            utf8_percent_encode(group, SEGMENT),
            utf8_percent_encode(key, SEGMENT)
        )
    }
}

#[async_trait]
impl PeerFetcher for HttpFetcher {
    async fn fetch(&self, group: &str, key: &str) -> Result<Vec<u8>, BoxError> {
        self.get(group, key).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_escape_path_segments() {
        let fetcher = HttpFetcher::new(reqwest::Client::new(), "http://peer:8001/_geecache/");
        assert_eq!(
            fetcher.url_for("scores", "Tom"),
            "http://peer:8001/_geecache/scores/Tom"
        );
        assert_eq!(
            fetcher.url_for("my group", "a/b%c"),
            "http://peer:8001/_geecache/my%20group/a%2Fb%25c"
        );
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let fetcher = HttpFetcher::new(reqwest::Client::new(), "http://peer:8001/_geecache");
        assert_eq!(fetcher.base_url(), "http://peer:8001/_geecache/");
    }
}
