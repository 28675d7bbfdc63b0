//! HTTP access
//!
//! Everything the crate fetches is a plain GET returning text or JSON. The
//! [`HttpClient`] trait keeps resolvers and the quality selector independent
//! of the transport.

use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("nrk_downloader/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while fetching a resource
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP client could not be constructed
    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The server answered 404
    #[error("Not found: {0}")]
    NotFound(String),

    /// The server answered with another non-success status
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// The request could not be sent or the body could not be read
    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The body was not the expected JSON document
    #[error("Failed to parse response from {url}: {reason}")]
    Parse { url: String, reason: String },
}

/// A client able to GET a URL as text
pub trait HttpClient: Send + Sync {
    /// Fetches `url` and returns the response body
    ///
    /// # Errors
    ///
    /// Non-success statuses are errors, 404 is reported as [`FetchError::NotFound`].
    fn get_text(&self, url: &str) -> Result<String, FetchError>;
}

/// Fetches `url` and deserializes the body as JSON
pub fn get_json<T: DeserializeOwned>(client: &dyn HttpClient, url: &str) -> Result<T, FetchError> {
    let body = client.get_text(url)?;
    serde_json::from_str(&body).map_err(|e| FetchError::Parse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// [`HttpClient`] backed by a blocking reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::blocking::Client,
}

impl ReqwestHttpClient {
    /// Creates a client with the crate's user agent and a request timeout
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestHttpClient {
    fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if response.status() == 404 {
            return Err(FetchError::NotFound(url.to_string()));
        }

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.text().map_err(|e| FetchError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}
