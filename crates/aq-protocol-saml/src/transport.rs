//! SOAP-over-HTTP transport.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Default request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Reply from a SOAP endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapReply {
    /// HTTP status code.
    pub status: u16,
    /// Response body. Only read for `200 OK`; empty otherwise.
    pub body: Vec<u8>,
}

/// Transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent.
    #[error("making SOAP post request: {0}")]
    Send(String),

    /// The response body could not be read.
    #[error("reading response body: {0}")]
    ReadBody(String),
}

/// Sends SOAP requests.
#[async_trait]
pub trait SoapTransport: Send + Sync {
    /// POSTs `body` to `url` as `text/xml`.
    async fn post(&self, url: &str, body: String) -> Result<SoapReply, TransportError>;
}

/// [`SoapTransport`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpSoapTransport {
    client: reqwest::Client,
}

impl HttpSoapTransport {
    /// Creates a transport with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Send(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SoapTransport for HttpSoapTransport {
    async fn post(&self, url: &str, body: String) -> Result<SoapReply, TransportError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;

        let status = response.status().as_u16();
        debug!(url, status, "SOAP response received");
        if status != 200 {
            return Ok(SoapReply {
                status,
                body: Vec::new(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::ReadBody(e.to_string()))?;
        Ok(SoapReply {
            status,
            body: body.to_vec(),
        })
    }
}
