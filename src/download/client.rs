//! HTTP transport: opens a streaming GET and hands back headers and body.
//!
//! The status code is reported, never judged. A 404 page is data like any
//! other body.

use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, redirect};
use tracing::{debug, instrument, warn};
use url::Url;

use super::error::DownloadError;
use super::options::TransportOptions;
use crate::user_agent;

/// Response body as a stream of chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes, DownloadError>>;

/// What is known about a response once its headers arrive.
#[derive(Debug, Clone)]
pub struct ResponseMetadata {
    /// The URL as requested.
    pub request_url: String,
    /// The URL after redirects.
    pub final_url: Url,
    pub status: u16,
    /// Case-insensitive header map.
    pub headers: HeaderMap,
}

impl ResponseMetadata {
    /// Returns a header value when it is present and valid ASCII.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header(reqwest::header::CONTENT_TYPE.as_str())
    }

    #[must_use]
    pub fn content_disposition(&self) -> Option<&str> {
        self.header(reqwest::header::CONTENT_DISPOSITION.as_str())
    }

    /// Whether the status code is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client configured from [`TransportOptions`].
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    headers: HeaderMap,
}

impl HttpClient {
    /// Builds a client for the given transport options.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] when reqwest rejects the
    /// configuration. Header names or values that are not valid HTTP are
    /// skipped with a warning.
    pub fn from_transport(transport: &TransportOptions) -> Result<Self, DownloadError> {
        let user_agent = transport
            .user_agent
            .clone()
            .unwrap_or_else(user_agent::default_user_agent);

        let mut builder = Client::builder()
            .gzip(true)
            .redirect(redirect::Policy::limited(transport.max_redirects))
            .user_agent(user_agent);
        if !transport.verify_tls {
            warn!("TLS certificate verification disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(secs) = transport.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(DownloadError::client)?;

        Ok(Self {
            client,
            headers: request_headers(transport),
        })
    }

    /// Sends a GET for `url` and resolves once the response headers arrive.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidUrl`] when `url` does not parse or is not
    ///   http(s)
    /// - [`DownloadError::Network`] / [`DownloadError::Timeout`] when the
    ///   request cannot be sent
    ///
    /// Errors while reading the body surface as `Network` items on the
    /// returned stream.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn open_stream(
        &self,
        url: &str,
    ) -> Result<(ResponseMetadata, ByteStream), DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::invalid_url(url));
        }

        let response = self
            .client
            .get(parsed)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let metadata = ResponseMetadata {
            request_url: url.to_string(),
            final_url: response.url().clone(),
            status: response.status().as_u16(),
            headers: response.headers().clone(),
        };
        debug!(
            status = metadata.status,
            final_url = %metadata.final_url,
            content_type = metadata.content_type().unwrap_or(""),
            "response headers received"
        );

        let owned_url = url.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| DownloadError::network(owned_url.clone(), e)))
            .boxed();

        Ok((metadata, body))
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

fn request_headers(transport: &TransportOptions) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in &transport.headers {
        let parsed = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        );
        match parsed {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "skipping invalid request header"),
        }
    }
    headers
}
