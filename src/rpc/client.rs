//! JSON-RPC 2.0 transport over HTTP
//!
//! Sends one POST per call to the endpoint's primary URL, falling back to its
//! secondary URL when the primary is unreachable or does not answer in time.
//! The client timeout is split evenly between an endpoint's URLs, so a hanging
//! primary leaves the secondary its share of the attempt. Non-2xx responses
//! and JSON-RPC `error` objects become `UpstreamError::Upstream` and are not
//! retried on the secondary URL.

use super::types::RpcEndpoint;
use crate::errors::UpstreamError;
use crate::logger::{self, LogTag};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub struct JsonRpcClient {
    http: reqwest::Client,
    timeout: Duration,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// `timeout` bounds one `call`, across all URLs of the endpoint
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Network {
                endpoint: "http-client".to_string(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    /// Call `method` on `endpoint` and return the JSON-RPC `result`
    pub async fn call(
        &self,
        endpoint: &RpcEndpoint,
        method: &str,
        params: Value,
    ) -> Result<Value, UpstreamError> {
        let mut last_error = None;
        let url_timeout = self.url_timeout(endpoint.urls().count());

        for url in endpoint.urls() {
            match self
                .call_url(&endpoint.name, url, method, params.clone(), url_timeout)
                .await
            {
                Ok(value) => return Ok(value),
                Err(e @ (UpstreamError::Network { .. } | UpstreamError::RequestTimeout { .. })) => {
                    logger::debug(
                        LogTag::Rpc,
                        &format!("{} unreachable at {}: {}", endpoint.name, url, e),
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| UpstreamError::Network {
            endpoint: endpoint.name.clone(),
            message: "no URL configured".to_string(),
        }))
    }

    /// Share of the call timeout given to each of `url_count` URLs
    fn url_timeout(&self, url_count: usize) -> Duration {
        self.timeout / url_count.max(1) as u32
    }

    async fn call_url(
        &self,
        endpoint_name: &str,
        url: &str,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, UpstreamError> {
        let mut payload = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
        });
        if !params.is_null() {
            payload["params"] = params;
        }

        let response = self
            .http
            .post(url)
            .timeout(timeout)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| classify_transport_error(endpoint_name, timeout, e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport_error(endpoint_name, timeout, e))?;

        parse_response(endpoint_name, status, &body)
    }
}

fn classify_transport_error(endpoint_name: &str, timeout: Duration, err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::RequestTimeout {
            endpoint: endpoint_name.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        match UpstreamError::from(err) {
            UpstreamError::Network { message, .. } => UpstreamError::Network {
                endpoint: endpoint_name.to_string(),
                message,
            },
            UpstreamError::Upstream { status, message, .. } => UpstreamError::Upstream {
                endpoint: endpoint_name.to_string(),
                status,
                message,
            },
            other => other,
        }
    }
}

/// Turn an HTTP status and body into the JSON-RPC `result` or an error
pub fn parse_response(endpoint_name: &str, status: u16, body: &str) -> Result<Value, UpstreamError> {
    if !(200..300).contains(&status) {
        let snippet: String = body.chars().take(200).collect();
        return Err(UpstreamError::http_status(endpoint_name, status, &snippet));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| UpstreamError::malformed(endpoint_name, format!("Invalid JSON: {}", e)))?;

    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(UpstreamError::malformed(
            endpoint_name,
            format!("RPC error {}: {}", code, message),
        ));
    }

    match value.get("result") {
        Some(result) => Ok(result.clone()),
        None => Err(UpstreamError::malformed(
            endpoint_name,
            "Response has neither result nor error",
        )),
    }
}
