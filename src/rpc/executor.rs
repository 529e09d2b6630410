//! Request executor with timeout and failover
//!
//! Each attempt asks the selector for an endpoint, races the request against
//! the request timeout and feeds the outcome back into the registry. Failed
//! attempts are retried on a fresh selection until the attempt budget
//! (`max_retries + 1`) is spent.

use super::registry::EndpointRegistry;
use super::selector::EndpointSelector;
use super::types::{AttemptOutcome, RequestAttempt, RpcEndpoint};
use crate::errors::UpstreamError;
use crate::logger::{self, LogTag};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const DEFAULT_MAX_RETRIES: u32 = 2;

pub struct RequestExecutor {
    registry: Arc<EndpointRegistry>,
    selector: Arc<EndpointSelector>,
    request_timeout: Duration,
    max_retries: u32,
}

impl RequestExecutor {
    pub fn new(
        registry: Arc<EndpointRegistry>,
        selector: Arc<EndpointSelector>,
        request_timeout: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            registry,
            selector,
            request_timeout,
            max_retries,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Run `request_fn` against selected endpoints until one succeeds
    ///
    /// `max_retries` overrides the configured retry count for this call.
    /// Every failure, whatever its kind, counts against the endpoint and is
    /// retried until the attempt budget is spent.
    pub async fn with_fallback<T, F, Fut>(
        &self,
        mut request_fn: F,
        max_retries: Option<u32>,
    ) -> Result<T, UpstreamError>
    where
        F: FnMut(RpcEndpoint) -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let max_retries = max_retries.unwrap_or(self.max_retries);
        let mut attempts: u32 = 0;
        let mut last_error: Option<UpstreamError> = None;

        while attempts <= max_retries {
            let endpoint = self.selector.select_endpoint();
            let started_at = Utc::now();
            let start = Instant::now();

            let result = match timeout(self.request_timeout, request_fn(endpoint.clone())).await {
                Ok(result) => result,
                Err(_) => Err(UpstreamError::RequestTimeout {
                    endpoint: endpoint.name.clone(),
                    timeout_ms: self.request_timeout.as_millis() as u64,
                }),
            };
            let elapsed = start.elapsed();
            attempts += 1;

            let outcome = match &result {
                Ok(_) => AttemptOutcome::Success,
                Err(e) if e.is_timeout() => AttemptOutcome::Timeout,
                Err(_) => AttemptOutcome::Error,
            };
            let attempt = RequestAttempt {
                endpoint: endpoint.id,
                endpoint_name: endpoint.name.clone(),
                started_at,
                duration: elapsed,
                outcome,
            };
            logger::debug(
                LogTag::Rpc,
                &format!("Attempt {}/{}: {}", attempts, max_retries + 1, attempt),
            );

            match result {
                Ok(value) => {
                    self.registry
                        .update_metrics(endpoint.id, elapsed.as_secs_f64() * 1000.0, true);
                    return Ok(value);
                }
                Err(e) => {
                    self.registry.update_metrics(endpoint.id, 0.0, false);
                    logger::debug(
                        LogTag::Rpc,
                        &format!("Request to {} failed: {}", endpoint.name, e),
                    );
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error.unwrap_or(UpstreamError::NoEndpointsAvailable);
        logger::warning(
            LogTag::Rpc,
            &format!("All {} attempts failed, last error: {}", attempts, last_error),
        );
        Err(UpstreamError::AllEndpointsFailed {
            attempts,
            last_error: Box::new(last_error),
        })
    }
}
