//! Endpoint selection
//!
//! Healthy primaries are served round-robin; when none is healthy, any
//! healthy endpoint is. With nothing healthy the least-failed endpoint is
//! returned so callers degrade instead of failing outright.

use super::registry::EndpointRegistry;
use super::types::RpcEndpoint;
use crate::logger::{self, LogTag};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct EndpointSelector {
    registry: Arc<EndpointRegistry>,
    counter: AtomicUsize,
}

impl EndpointSelector {
    pub fn new(registry: Arc<EndpointRegistry>) -> Self {
        Self {
            registry,
            counter: AtomicUsize::new(0),
        }
    }

    pub fn select_endpoint(&self) -> RpcEndpoint {
        let endpoints = self.registry.endpoint_list();

        let healthy: Vec<&RpcEndpoint> = endpoints.iter().filter(|e| e.is_healthy).collect();

        if healthy.is_empty() {
            let fallback = endpoints.least_failed();
            logger::debug(
                LogTag::Rpc,
                &format!(
                    "No healthy endpoints, falling back to {} ({} failures)",
                    fallback.name, fallback.failure_count
                ),
            );
            return fallback.clone();
        }

        let primaries: Vec<&RpcEndpoint> =
            healthy.iter().copied().filter(|e| e.is_primary()).collect();
        let pool = if primaries.is_empty() { healthy } else { primaries };

        let index = self.counter.fetch_add(1, Ordering::Relaxed) % pool.len();
        pool[index].clone()
    }

    /// Restart the round-robin sequence
    pub fn reset(&self) {
        self.counter.store(0, Ordering::Relaxed);
    }
}
