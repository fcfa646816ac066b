//! Transport seam for the conversions endpoint.

use relay_core::event::EventBatch;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TransportResponse, TransportFailure>> + Send + 'a>>;

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Request-level failure (no HTTP status). Timeouts and connection
/// failures are retryable; everything else is terminal.
#[derive(Debug, Clone)]
pub struct TransportFailure {
    pub retryable: bool,
    pub message: String,
}

pub trait ConversionTransport: Send + Sync + 'static {
    fn post<'a>(&'a self, batch: &'a EventBatch) -> TransportFuture<'a>;
}

impl<T: ConversionTransport + ?Sized> ConversionTransport for Arc<T> {
    fn post<'a>(&'a self, batch: &'a EventBatch) -> TransportFuture<'a> {
        (**self).post(batch)
    }
}

/// Production transport: POST the batch as JSON with a bearer credential
/// and a bounded request timeout.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
}

impl HttpTransport {
    pub fn new(
        endpoint: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            access_token: access_token.into(),
        })
    }
}

fn classify_reqwest_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

impl ConversionTransport for HttpTransport {
    fn post<'a>(&'a self, batch: &'a EventBatch) -> TransportFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.access_token)
                .json(batch)
                .send()
                .await
                .map_err(|err| TransportFailure {
                    retryable: classify_reqwest_error(&err),
                    message: err.to_string(),
                })?;

            let status = response.status().as_u16();
            let body = response.text().await.map_err(|err| TransportFailure {
                retryable: classify_reqwest_error(&err),
                message: err.to_string(),
            })?;

            Ok(TransportResponse { status, body })
        })
    }
}
