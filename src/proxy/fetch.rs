//! Outbound fetching.
//!
//! A single bounded GET per client request, no retries. Cookies,
//! authorization, and request bodies never cross over; the only inbound
//! header forwarded is `User-Agent`. Redirects are followed by the transport,
//! and the post-redirect URL is reported back as the resolution base for the
//! body's relative references.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL, or server connectivity issue")]
    Upstream(#[source] reqwest::Error),
    #[error("couldn't read returned body")]
    BodyRead(#[source] reqwest::Error),
}

/// Outcome of one upstream GET.
#[derive(Debug)]
pub struct FetchResult {
    /// Post-redirect location; always absolute.
    pub final_url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Issues outbound GET requests with bounded timeouts.
pub struct UpstreamFetcher {
    client: reqwest::Client,
}

impl UpstreamFetcher {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch `target`, forwarding the client's `User-Agent` when present.
    pub async fn fetch(
        &self,
        target: &Url,
        user_agent: Option<&HeaderValue>,
    ) -> Result<FetchResult, FetchError> {
        let mut request = self.client.get(target.clone());
        if let Some(ua) = user_agent {
            request = request.header(USER_AGENT, ua);
        }

        let response = request.send().await.map_err(FetchError::Upstream)?;
        let final_url = response.url().clone();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(FetchError::BodyRead)?;

        Ok(FetchResult { final_url, status, headers, body })
    }
}
