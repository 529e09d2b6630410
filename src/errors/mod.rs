//! Error types for the upstream-access layer
//!
//! Transient failures (`RequestTimeout`, `Network`, `Upstream`) are retried by
//! the request executor; only `AllEndpointsFailed` reaches callers of
//! `with_fallback`. `ProbeFailure` never leaves the health checker.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UpstreamError {
    #[error("Health probe failed for {endpoint}: {reason}")]
    ProbeFailure { endpoint: String, reason: String },

    #[error("Request to {endpoint} timed out after {timeout_ms}ms")]
    RequestTimeout { endpoint: String, timeout_ms: u64 },

    #[error("Network error from {endpoint}: {message}")]
    Network { endpoint: String, message: String },

    #[error("Upstream error from {endpoint}: {message}")]
    Upstream {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    #[error("All endpoints failed after {attempts} attempts: {last_error}")]
    AllEndpointsFailed {
        attempts: u32,
        last_error: Box<UpstreamError>,
    },

    #[error("No upstream endpoints configured")]
    NoEndpointsAvailable,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl UpstreamError {
    /// Build an `Upstream` error for a non-success HTTP status
    pub fn http_status(endpoint: &str, status: u16, body: &str) -> Self {
        UpstreamError::Upstream {
            endpoint: endpoint.to_string(),
            status: Some(status),
            message: format!("HTTP {}: {}", status, body),
        }
    }

    /// Build an `Upstream` error for a malformed or error-carrying payload
    pub fn malformed(endpoint: &str, message: impl Into<String>) -> Self {
        UpstreamError::Upstream {
            endpoint: endpoint.to_string(),
            status: None,
            message: message.into(),
        }
    }

    /// Whether the executor should retry after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            UpstreamError::ProbeFailure { .. }
                | UpstreamError::RequestTimeout { .. }
                | UpstreamError::Network { .. }
                | UpstreamError::Upstream { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, UpstreamError::RequestTimeout { .. })
    }

    /// The innermost error carried by an `AllEndpointsFailed`
    pub fn root_cause(&self) -> &UpstreamError {
        match self {
            UpstreamError::AllEndpointsFailed { last_error, .. } => last_error.root_cause(),
            other => other,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map(|u| u.host_str().unwrap_or("unknown").to_string())
            .unwrap_or_else(|| "unknown".to_string());

        if err.is_decode() {
            UpstreamError::malformed(&endpoint, format!("Failed to decode response: {}", err))
        } else if let Some(status) = err.status() {
            UpstreamError::http_status(&endpoint, status.as_u16(), &err.to_string())
        } else {
            UpstreamError::Network {
                endpoint,
                message: err.to_string(),
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse config file '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("Failed to write config file '{path}': {message}")]
    Write { path: String, message: String },

    #[error("Invalid config field '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        let timeout = UpstreamError::RequestTimeout {
            endpoint: "primary".to_string(),
            timeout_ms: 5000,
        };
        assert!(timeout.is_recoverable());
        assert!(timeout.is_timeout());

        assert!(UpstreamError::http_status("primary", 502, "bad gateway").is_recoverable());
        assert!(!UpstreamError::NoEndpointsAvailable.is_recoverable());

        let exhausted = UpstreamError::AllEndpointsFailed {
            attempts: 3,
            last_error: Box::new(timeout.clone()),
        };
        assert!(!exhausted.is_recoverable());
    }

    #[test]
    fn test_exhausted_error_preserves_last_message() {
        let upstream = UpstreamError::malformed("backup", "missing result field");
        let exhausted = UpstreamError::AllEndpointsFailed {
            attempts: 3,
            last_error: Box::new(upstream.clone()),
        };

        assert_eq!(exhausted.root_cause(), &upstream);
        assert!(exhausted.to_string().contains("missing result field"));
        assert!(exhausted.to_string().contains("3 attempts"));
    }
}
