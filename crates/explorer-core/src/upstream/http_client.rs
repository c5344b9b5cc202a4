use reqwest::{Client, ClientBuilder};
use std::{sync::Arc, time::Duration};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::upstream::UpstreamError;

/// Configuration for HTTP client concurrency and timeout behavior.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Maximum number of concurrent HTTP requests allowed
    pub concurrent_limit: usize,
    /// Permit acquisition timeout in milliseconds
    pub permit_timeout_ms: u64,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Credentials sent as HTTP basic authentication
    pub basic_auth: Option<(String, String)>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            concurrent_limit: 16,
            permit_timeout_ms: 5_000,
            request_timeout: Duration::from_secs(30),
            basic_auth: None,
        }
    }
}

/// HTTP client with semaphore-based concurrency control.
///
/// The node's RPC server handles a small fixed number of work queue slots, so the engine
/// bounds its own concurrency instead of relying on the node to reject excess requests.
pub struct HttpClient {
    client: Client,
    concurrent_limit: Arc<Semaphore>,
    config: HttpClientConfig,
}

/// RAII guard ensuring semaphore permits are always released.
struct PermitGuard {
    _permit: OwnedSemaphorePermit,
    semaphore: Arc<Semaphore>,
}

impl PermitGuard {
    fn new(permit: OwnedSemaphorePermit, semaphore: Arc<Semaphore>) -> Self {
        Self { _permit: permit, semaphore }
    }
}

impl Drop for PermitGuard {
    fn drop(&mut self) {
        tracing::trace!(
            available_permits = self.semaphore.available_permits(),
            "permit guard dropped"
        );
    }
}

impl HttpClient {
    /// Sanitizes network errors so node URLs and credentials never reach logs.
    fn sanitize_network_error(error: &reqwest::Error) -> String {
        if error.is_connect() {
            "connection refused or unreachable".to_string()
        } else if error.is_timeout() {
            "connection timed out".to_string()
        } else if error.is_request() {
            "request failed".to_string()
        } else if error.is_body() {
            "response body error".to_string()
        } else if error.is_decode() {
            "response decode error".to_string()
        } else {
            "network error".to_string()
        }
    }

    /// Creates a new HTTP client with the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build or the
    /// concurrency limit is zero.
    pub fn with_config(config: HttpClientConfig) -> Result<Self, UpstreamError> {
        if config.concurrent_limit == 0 {
            return Err(UpstreamError::ConcurrencyLimit(
                "concurrency limit must be non-zero".to_string(),
            ));
        }

        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .timeout(config.request_timeout)
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("explorer-core/", env!("CARGO_PKG_VERSION")))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build http client");
                UpstreamError::ConnectionFailed(format!("HTTP client build failed: {e}"))
            })?;

        Ok(Self {
            client,
            concurrent_limit: Arc::new(Semaphore::new(config.concurrent_limit)),
            config,
        })
    }

    /// Sends an HTTP POST with a JSON body and returns the raw response body.
    ///
    /// The node answers JSON-RPC errors with HTTP 404/500 and a JSON body, so those
    /// statuses are returned as a body when it parses as JSON.
    ///
    /// # Errors
    ///
    /// - [`UpstreamError::Timeout`] if permit acquisition or the request times out
    /// - [`UpstreamError::ConcurrencyLimit`] if the semaphore is closed
    /// - [`UpstreamError::HttpError`] for other non-success HTTP status codes
    /// - [`UpstreamError::ConnectionFailed`] for network-related failures
    pub async fn send_request(
        &self,
        url: &str,
        body: bytes::Bytes,
    ) -> Result<bytes::Bytes, UpstreamError> {
        let permit = tokio::time::timeout(
            Duration::from_millis(self.config.permit_timeout_ms),
            Arc::clone(&self.concurrent_limit).acquire_owned(),
        )
        .await
        .map_err(|_| {
            tracing::warn!(
                available_permits = self.concurrent_limit.available_permits(),
                "http client semaphore acquisition timeout"
            );
            UpstreamError::Timeout
        })?
        .map_err(|_| UpstreamError::ConcurrencyLimit("semaphore closed".to_string()))?;

        let _permit_guard = PermitGuard::new(permit, Arc::clone(&self.concurrent_limit));

        let mut request = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .body(body);
        if let Some((username, password)) = &self.config.basic_auth {
            request = request.basic_auth(username, Some(password));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout
            } else {
                UpstreamError::ConnectionFailed(Self::sanitize_network_error(&e))
            }
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(UpstreamError::Network)?;

        if status.is_success() {
            return Ok(bytes);
        }

        let carries_rpc_error = matches!(status.as_u16(), 404 | 500) &&
            serde_json::from_slice::<serde_json::Value>(&bytes).is_ok();
        if carries_rpc_error {
            return Ok(bytes);
        }

        let raw_text = String::from_utf8_lossy(&bytes);
        let sanitized_text = raw_text.chars().take(256).collect::<String>();
        tracing::trace!(status = status.as_u16(), "http request failed");
        Err(UpstreamError::HttpError(status.as_u16(), sanitized_text))
    }

    #[cfg(test)]
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.concurrent_limit.available_permits()
    }
}
