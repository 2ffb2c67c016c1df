// ABOUTME: HTTP upload transport that POSTs cached JSON bodies to their destination URLs.
// ABOUTME: Success is decided by a pluggable response check; every error folds into a false outcome.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use spool_core::{CacheConfig, UploadTransport};
use thiserror::Error;

/// Decides whether a received response counts as a delivered payload.
pub type ResponseCheck = Arc<dyn Fn(&reqwest::Response) -> bool + Send + Sync>;

/// Errors from building the transport or making a single request.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build http client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("response rejected: status {status}")]
    Rejected { status: reqwest::StatusCode },
}

/// Accept any 2xx response.
pub fn accept_success_status() -> ResponseCheck {
    Arc::new(|response| response.status().is_success())
}

/// Accept 2xx responses unless they are HTML. Captive portals on hotel and
/// airport networks answer every request with a 200 login page.
pub fn reject_captive_portal() -> ResponseCheck {
    Arc::new(|response| {
        if !response.status().is_success() {
            return false;
        }
        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("text/html"));
        !is_html
    })
}

/// POSTs each body as `application/json` to its destination.
pub struct HttpTransport {
    client: reqwest::Client,
    api_key: Option<String>,
    check: ResponseCheck,
}

impl HttpTransport {
    /// Build a transport using the timeout and API key from `config`.
    pub fn new(config: &CacheConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(TransportError::ClientBuild)?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            check: accept_success_status(),
        })
    }

    /// Replace the response check.
    pub fn with_response_check(mut self, check: ResponseCheck) -> Self {
        self.check = check;
        self
    }

    /// Send one body and apply the response check.
    pub async fn post(&self, destination: &str, body: &str) -> Result<(), TransportError> {
        let mut request = self
            .client
            .post(destination)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, format!("APIKEY:DATA {}", key));
        }

        let response = request.send().await?;
        let status = response.status();
        if (self.check)(&response) {
            Ok(())
        } else {
            Err(TransportError::Rejected { status })
        }
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn attempt_delivery(&self, destination: &str, body: &str) -> bool {
        match self.post(destination, body).await {
            Ok(()) => {
                tracing::debug!(destination = %destination, bytes = body.len(), "payload delivered");
                true
            }
            Err(e) => {
                tracing::warn!(destination = %destination, error = %e, "delivery attempt failed");
                false
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}
