//! Endpoint registry
//!
//! Owns every endpoint record. All health mutations go through
//! `update_metrics`, which keeps `failure_count >= max_failures` implying
//! `!is_healthy` under a single write lock.

use super::types::{EndpointId, EndpointStatus, RpcEndpoint};
use crate::config::EndpointConfig;
use crate::errors::UpstreamError;
use crate::logger::{self, LogTag};
use chrono::Utc;
use parking_lot::RwLock;

/// Weight of the newest sample in the latency moving average
pub const LATENCY_EMA_ALPHA: f64 = 0.3;

pub const DEFAULT_MAX_FAILURES: u32 = 3;

/// Health flip caused by a metrics update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    BecameUnhealthy,
    Recovered,
}

/// Endpoint records in registry order; holds at least one endpoint
#[derive(Debug, Clone)]
pub struct EndpointList {
    first: RpcEndpoint,
    rest: Vec<RpcEndpoint>,
}

impl EndpointList {
    /// `None` for an empty list
    pub fn new(endpoints: Vec<RpcEndpoint>) -> Option<Self> {
        let mut iter = endpoints.into_iter();
        let first = iter.next()?;
        Some(Self {
            first,
            rest: iter.collect(),
        })
    }

    pub fn len(&self) -> usize {
        1 + self.rest.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RpcEndpoint> {
        std::iter::once(&self.first).chain(self.rest.iter())
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut RpcEndpoint> {
        std::iter::once(&mut self.first).chain(self.rest.iter_mut())
    }

    pub fn get(&self, id: EndpointId) -> Option<&RpcEndpoint> {
        match id.0 {
            0 => Some(&self.first),
            n => self.rest.get(n - 1),
        }
    }

    fn get_mut(&mut self, id: EndpointId) -> Option<&mut RpcEndpoint> {
        match id.0 {
            0 => Some(&mut self.first),
            n => self.rest.get_mut(n - 1),
        }
    }

    /// Endpoint with the lowest failure count; ties go to the earlier one
    pub fn least_failed(&self) -> &RpcEndpoint {
        self.rest.iter().fold(&self.first, |best, endpoint| {
            if endpoint.failure_count < best.failure_count {
                endpoint
            } else {
                best
            }
        })
    }

    pub fn to_vec(&self) -> Vec<RpcEndpoint> {
        self.iter().cloned().collect()
    }
}

pub struct EndpointRegistry {
    endpoints: RwLock<EndpointList>,
    max_failures: u32,
}

impl EndpointRegistry {
    /// Build from configuration, preserving order; ids are list indices
    pub fn new(configs: &[EndpointConfig], max_failures: u32) -> Result<Self, UpstreamError> {
        let endpoints = configs
            .iter()
            .enumerate()
            .map(|(index, cfg)| {
                RpcEndpoint::new(
                    EndpointId(index),
                    &cfg.name,
                    &cfg.primary_url,
                    cfg.secondary_url.as_deref(),
                    cfg.priority,
                )
            })
            .collect();

        Self::from_endpoints(endpoints, max_failures)
    }

    /// Build from prepared records; ids are reassigned to list indices
    pub fn from_endpoints(
        mut endpoints: Vec<RpcEndpoint>,
        max_failures: u32,
    ) -> Result<Self, UpstreamError> {
        for (index, endpoint) in endpoints.iter_mut().enumerate() {
            endpoint.id = EndpointId(index);
        }
        let endpoints = EndpointList::new(endpoints).ok_or(UpstreamError::NoEndpointsAvailable)?;

        Ok(Self {
            endpoints: RwLock::new(endpoints),
            max_failures: max_failures.max(1),
        })
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    /// Record the outcome of a request or probe
    ///
    /// Success folds `response_time_ms` into the moving average and lowers
    /// the failure count by one; the endpoint turns healthy again only once
    /// the count is back to zero. Failure raises the count and marks the
    /// endpoint unhealthy at `max_failures`.
    pub fn update_metrics(
        &self,
        id: EndpointId,
        response_time_ms: f64,
        success: bool,
    ) -> Option<HealthTransition> {
        let mut endpoints = self.endpoints.write();
        let Some(endpoint) = endpoints.get_mut(id) else {
            logger::debug(LogTag::Rpc, &format!("Metrics update for unknown endpoint {}", id));
            return None;
        };

        let transition = if success {
            endpoint.avg_response_time_ms = endpoint.avg_response_time_ms * (1.0 - LATENCY_EMA_ALPHA)
                + response_time_ms * LATENCY_EMA_ALPHA;
            endpoint.failure_count = endpoint.failure_count.saturating_sub(1);

            if !endpoint.is_healthy && endpoint.failure_count == 0 {
                endpoint.is_healthy = true;
                Some(HealthTransition::Recovered)
            } else {
                None
            }
        } else {
            endpoint.failure_count += 1;

            if endpoint.is_healthy && endpoint.failure_count >= self.max_failures {
                endpoint.is_healthy = false;
                Some(HealthTransition::BecameUnhealthy)
            } else {
                None
            }
        };

        match transition {
            Some(HealthTransition::BecameUnhealthy) => logger::warning(
                LogTag::Rpc,
                &format!(
                    "Endpoint {} marked unhealthy after {} consecutive failures",
                    endpoint.name, endpoint.failure_count
                ),
            ),
            Some(HealthTransition::Recovered) => logger::info(
                LogTag::Rpc,
                &format!("Endpoint {} recovered", endpoint.name),
            ),
            None => {}
        }

        transition
    }

    /// Stamp the time of the latest health probe
    pub fn record_health_check(&self, id: EndpointId) {
        if let Some(endpoint) = self.endpoints.write().get_mut(id) {
            endpoint.last_health_check_at = Some(Utc::now());
        }
    }

    /// Copy of every endpoint record, in registry order
    pub fn snapshot(&self) -> Vec<RpcEndpoint> {
        self.endpoints.read().to_vec()
    }

    /// Same as `snapshot`, typed as non-empty
    pub fn endpoint_list(&self) -> EndpointList {
        self.endpoints.read().clone()
    }

    pub fn statuses(&self) -> Vec<EndpointStatus> {
        self.endpoints.read().iter().map(EndpointStatus::from).collect()
    }

    pub fn get(&self, id: EndpointId) -> Option<RpcEndpoint> {
        self.endpoints.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }

    pub fn healthy_count(&self) -> usize {
        self.endpoints.read().iter().filter(|e| e.is_healthy).count()
    }

    /// Restore every endpoint to its initial healthy state
    pub fn reset(&self) {
        for endpoint in self.endpoints.write().iter_mut() {
            endpoint.reset_health();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::types::EndpointPriority;

    fn registry() -> EndpointRegistry {
        let endpoints = vec![
            RpcEndpoint::new(EndpointId(0), "a", "https://a.example", None, EndpointPriority::Primary),
            RpcEndpoint::new(EndpointId(0), "b", "https://b.example", None, EndpointPriority::Secondary),
        ];
        EndpointRegistry::from_endpoints(endpoints, DEFAULT_MAX_FAILURES).unwrap()
    }

    #[test]
    fn test_empty_registry_rejected() {
        let result = EndpointRegistry::from_endpoints(Vec::new(), 3);
        assert!(matches!(result, Err(UpstreamError::NoEndpointsAvailable)));
    }

    #[test]
    fn test_endpoint_list_least_failed() {
        let registry = registry();
        assert_eq!(registry.endpoint_list().least_failed().name, "a");

        registry.update_metrics(EndpointId(0), 0.0, false);
        let list = registry.endpoint_list();
        assert_eq!(list.len(), 2);
        assert_eq!(list.least_failed().name, "b");
        assert_eq!(list.get(EndpointId(1)).map(|e| e.name.as_str()), Some("b"));
        assert!(list.get(EndpointId(2)).is_none());
    }

    #[test]
    fn test_ids_follow_registry_order() {
        let registry = registry();
        let ids: Vec<EndpointId> = registry.snapshot().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![EndpointId(0), EndpointId(1)]);
    }

    #[test]
    fn test_latency_moving_average() {
        let registry = registry();
        let id = EndpointId(0);

        registry.update_metrics(id, 100.0, true);
        assert!((registry.get(id).unwrap().avg_response_time_ms - 30.0).abs() < 1e-9);

        registry.update_metrics(id, 200.0, true);
        // 30 * 0.7 + 200 * 0.3
        assert!((registry.get(id).unwrap().avg_response_time_ms - 81.0).abs() < 1e-9);

        // Failures leave the average untouched
        registry.update_metrics(id, 0.0, false);
        assert!((registry.get(id).unwrap().avg_response_time_ms - 81.0).abs() < 1e-9);
    }

    #[test]
    fn test_unhealthy_exactly_at_threshold() {
        let registry = registry();
        let id = EndpointId(0);

        assert_eq!(registry.update_metrics(id, 0.0, false), None);
        assert_eq!(registry.update_metrics(id, 0.0, false), None);
        assert!(registry.get(id).unwrap().is_healthy);

        assert_eq!(
            registry.update_metrics(id, 0.0, false),
            Some(HealthTransition::BecameUnhealthy)
        );
        let ep = registry.get(id).unwrap();
        assert!(!ep.is_healthy);
        assert_eq!(ep.failure_count, 3);
    }

    #[test]
    fn test_recovery_needs_failure_count_zero() {
        let registry = registry();
        let id = EndpointId(0);
        for _ in 0..3 {
            registry.update_metrics(id, 0.0, false);
        }

        assert_eq!(registry.update_metrics(id, 50.0, true), None);
        assert_eq!(registry.update_metrics(id, 50.0, true), None);
        let ep = registry.get(id).unwrap();
        assert_eq!(ep.failure_count, 1);
        assert!(!ep.is_healthy);

        assert_eq!(
            registry.update_metrics(id, 50.0, true),
            Some(HealthTransition::Recovered)
        );
        assert!(registry.get(id).unwrap().is_healthy);
    }

    #[test]
    fn test_failure_count_never_negative() {
        let registry = registry();
        registry.update_metrics(EndpointId(1), 10.0, true);
        assert_eq!(registry.get(EndpointId(1)).unwrap().failure_count, 0);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let registry = registry();
        for _ in 0..4 {
            registry.update_metrics(EndpointId(1), 0.0, false);
        }
        registry.record_health_check(EndpointId(1));

        registry.reset();
        let ep = registry.get(EndpointId(1)).unwrap();
        assert!(ep.is_healthy);
        assert_eq!(ep.failure_count, 0);
        assert!(ep.last_health_check_at.is_none());
    }

    #[test]
    fn test_unknown_endpoint_ignored() {
        let registry = registry();
        assert_eq!(registry.update_metrics(EndpointId(9), 0.0, false), None);
        assert_eq!(registry.healthy_count(), 2);
    }
}
