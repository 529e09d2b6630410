//! Endpoint records and request attempt types shared by the RPC layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Static preference tier of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointPriority {
    Primary,
    Secondary,
}

impl EndpointPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointPriority::Primary => "primary",
            EndpointPriority::Secondary => "secondary",
        }
    }
}

impl fmt::Display for EndpointPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stable registry index of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointId(pub usize);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One upstream endpoint: static identity plus mutable health state
#[derive(Debug, Clone, PartialEq)]
pub struct RpcEndpoint {
    pub id: EndpointId,
    pub name: String,
    pub primary_url: String,
    pub secondary_url: Option<String>,
    pub priority: EndpointPriority,

    pub is_healthy: bool,

    /// Consecutive-failure score; successes decrement it by one
    pub failure_count: u32,

    /// Exponential moving average of successful response times
    pub avg_response_time_ms: f64,

    pub last_health_check_at: Option<DateTime<Utc>>,
}

impl RpcEndpoint {
    pub fn new(
        id: EndpointId,
        name: &str,
        primary_url: &str,
        secondary_url: Option<&str>,
        priority: EndpointPriority,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            primary_url: primary_url.to_string(),
            secondary_url: secondary_url.map(str::to_string),
            priority,
            is_healthy: true,
            failure_count: 0,
            avg_response_time_ms: 0.0,
            last_health_check_at: None,
        }
    }

    /// URLs to try for this endpoint, primary first
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_url.as_str()).chain(self.secondary_url.as_deref())
    }

    pub fn is_primary(&self) -> bool {
        self.priority == EndpointPriority::Primary
    }

    /// Back to the state it had at registry construction
    pub(crate) fn reset_health(&mut self) {
        self.is_healthy = true;
        self.failure_count = 0;
        self.avg_response_time_ms = 0.0;
        self.last_health_check_at = None;
    }
}

/// Serializable endpoint view for status pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointStatus {
    pub name: String,
    pub url: String,
    pub priority: EndpointPriority,
    pub is_healthy: bool,
    pub failure_count: u32,
    pub avg_response_time_ms: f64,
    pub last_health_check_at: Option<DateTime<Utc>>,
}

impl From<&RpcEndpoint> for EndpointStatus {
    fn from(endpoint: &RpcEndpoint) -> Self {
        Self {
            name: endpoint.name.clone(),
            url: endpoint.primary_url.clone(),
            priority: endpoint.priority,
            is_healthy: endpoint.is_healthy,
            failure_count: endpoint.failure_count,
            avg_response_time_ms: endpoint.avg_response_time_ms,
            last_health_check_at: endpoint.last_health_check_at,
        }
    }
}

/// Result of one request attempt against one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Timeout,
    Error,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Timeout => "timeout",
            AttemptOutcome::Error => "error",
        }
    }
}

/// One execution of a request function against one endpoint
#[derive(Debug, Clone)]
pub struct RequestAttempt {
    pub endpoint: EndpointId,
    pub endpoint_name: String,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub outcome: AttemptOutcome,
}

impl fmt::Display for RequestAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} in {}ms",
            self.endpoint_name,
            self.outcome.as_str(),
            self.duration.as_millis()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_serde() {
        assert_eq!(
            serde_json::to_string(&EndpointPriority::Secondary).unwrap(),
            "\"secondary\""
        );
        let parsed: EndpointPriority = serde_json::from_str("\"primary\"").unwrap();
        assert_eq!(parsed, EndpointPriority::Primary);
    }

    #[test]
    fn test_urls_primary_first() {
        let ep = RpcEndpoint::new(
            EndpointId(0),
            "helius",
            "https://a.example",
            Some("https://b.example"),
            EndpointPriority::Primary,
        );
        let urls: Vec<&str> = ep.urls().collect();
        assert_eq!(urls, vec!["https://a.example", "https://b.example"]);
    }
}
