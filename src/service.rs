//! Upstream service
//!
//! Owns one endpoint registry, selector, request executor, health checker and
//! cache orchestrator, built from a `Config`. Construct it once and share it
//! through `Arc`; there is no global instance.

use crate::cache::{self, CacheOrchestrator, CacheStats, CacheStore, CacheValue, OrchestratorStats};
use crate::config::{validate_config, Config};
use crate::errors::UpstreamError;
use crate::logger::{self, LogTag};
use crate::rpc::{
    EndpointProbe, EndpointRegistry, EndpointSelector, EndpointStatus, HealthChecker, HttpProbe,
    JsonRpcClient, ProbeOutcome, RequestExecutor, RpcEndpoint,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Namespace used by `cached_rpc_call`
pub const RPC_CALLS_NAMESPACE: &str = "rpc-calls";

/// Full service snapshot for status pages
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub endpoints: Vec<EndpointStatus>,
    pub healthy_endpoints: usize,
    pub health_checker_running: bool,
    pub cache: Vec<CacheStats>,
    pub producers: OrchestratorStats,
}

struct SweeperTask {
    handle: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

pub struct UpstreamService {
    config: Config,
    registry: Arc<EndpointRegistry>,
    selector: Arc<EndpointSelector>,
    executor: RequestExecutor,
    health: Arc<HealthChecker>,
    cache: CacheOrchestrator,
    client: JsonRpcClient,
    sweeper: Mutex<Option<SweeperTask>>,
}

impl UpstreamService {
    /// Build with the default HTTP `getHealth` probe
    pub fn new(config: Config) -> Result<Self, UpstreamError> {
        let probe = HttpProbe::new(Duration::from_millis(config.health.timeout_ms))?;
        Self::with_probe(config, Arc::new(probe))
    }

    /// Build with a custom health probe
    pub fn with_probe(config: Config, probe: Arc<dyn EndpointProbe>) -> Result<Self, UpstreamError> {
        if config.upstream.endpoints.is_empty() {
            return Err(UpstreamError::NoEndpointsAvailable);
        }
        validate_config(&config)?;

        let registry = Arc::new(EndpointRegistry::new(
            &config.upstream.endpoints,
            config.upstream.max_failures,
        )?);
        let selector = Arc::new(EndpointSelector::new(registry.clone()));

        let request_timeout = Duration::from_millis(config.upstream.request_timeout_ms);
        let executor = RequestExecutor::new(
            registry.clone(),
            selector.clone(),
            request_timeout,
            config.upstream.max_retries,
        );

        let health = Arc::new(HealthChecker::new(
            registry.clone(),
            probe,
            Duration::from_millis(config.health.interval_ms),
            Duration::from_millis(config.health.timeout_ms),
        ));

        let store: CacheStore<CacheValue> = CacheStore::with_namespaces(
            Duration::from_secs(config.cache.default_ttl_secs),
            config
                .cache
                .namespaces
                .iter()
                .map(|ns| (ns.name.clone(), ns.to_namespace_config())),
        );
        let cache = CacheOrchestrator::new(Arc::new(store), config.cache.single_flight);

        let client = JsonRpcClient::new(request_timeout)?;

        logger::info(
            LogTag::System,
            &format!(
                "Upstream service ready: {} endpoints, {} cache namespaces",
                registry.len(),
                config.cache.namespaces.len()
            ),
        );

        Ok(Self {
            config,
            registry,
            selector,
            executor,
            health,
            cache,
            client,
            sweeper: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    /// Start background tasks (health checker, cache sweeper) per config
    pub fn start(&self) {
        if self.config.health.enabled {
            self.health.start();
        } else {
            logger::info(LogTag::Health, "Health checks disabled by configuration");
        }

        if self.config.cache.sweep_enabled {
            let mut sweeper = self.sweeper.lock();
            if sweeper.is_none() {
                let shutdown = Arc::new(Notify::new());
                let handle = cache::spawn_sweeper(
                    self.cache.store().clone(),
                    Duration::from_secs(self.config.cache.sweep_interval_secs),
                    shutdown.clone(),
                );
                *sweeper = Some(SweeperTask { handle, shutdown });
            }
        }
    }

    /// Stop background tasks and wait for them to exit
    pub async fn shutdown(&self) {
        self.health.stop().await;

        let sweeper = self.sweeper.lock().take();
        if let Some(task) = sweeper {
            task.shutdown.notify_one();
            if let Err(e) = task.handle.await {
                logger::warning(LogTag::Cache, &format!("Cache sweeper ended abnormally: {}", e));
            }
        }

        logger::info(LogTag::System, "Upstream service stopped");
    }

    /// Restore endpoints, round-robin position and cache to their initial state
    pub fn reset(&self) {
        self.registry.reset();
        self.selector.reset();
        self.cache.reset();
        logger::debug(LogTag::System, "Upstream service state reset");
    }

    pub fn select_endpoint(&self) -> RpcEndpoint {
        self.selector.select_endpoint()
    }

    /// Run `request_fn` with timeout and failover; see `RequestExecutor::with_fallback`
    pub async fn with_fallback<T, F, Fut>(
        &self,
        request_fn: F,
        max_retries: Option<u32>,
    ) -> Result<T, UpstreamError>
    where
        F: FnMut(RpcEndpoint) -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        self.executor.with_fallback(request_fn, max_retries).await
    }

    /// Get-or-populate; see `CacheOrchestrator::cache_wrapper`
    pub async fn cache_wrapper<T, E, F, Fut>(
        &self,
        namespace: &str,
        key: &str,
        producer: F,
        ttl_override: Option<Duration>,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.cache
            .cache_wrapper(namespace, key, producer, ttl_override)
            .await
    }

    /// One JSON-RPC call with timeout and failover
    pub async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, UpstreamError> {
        let client = &self.client;
        self.executor
            .with_fallback(
                |endpoint| {
                    let params = params.clone();
                    async move { client.call(&endpoint, method, params).await }
                },
                None,
            )
            .await
    }

    /// `rpc_call` behind the `rpc-calls` cache namespace
    pub async fn cached_rpc_call(&self, method: &str, params: Value) -> Result<Value, UpstreamError> {
        let key = format!("{}:{}", method, params);
        self.cache
            .cache_wrapper(RPC_CALLS_NAMESPACE, &key, || self.rpc_call(method, params), None)
            .await
    }

    /// Probe all endpoints once, outside the periodic schedule
    pub async fn check_now(&self) -> Vec<ProbeOutcome> {
        self.health.run_cycle().await
    }

    pub fn get_status(&self) -> Vec<EndpointStatus> {
        self.registry.statuses()
    }

    pub fn cache_stats(&self, namespace: &str) -> Option<CacheStats> {
        self.cache.stats(namespace)
    }

    pub fn status_report(&self) -> ServiceStatus {
        ServiceStatus {
            endpoints: self.get_status(),
            healthy_endpoints: self.registry.healthy_count(),
            health_checker_running: self.health.is_running(),
            cache: self.cache.store().all_stats(),
            producers: self.cache.orchestrator_stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;
    use crate::rpc::EndpointPriority;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProbe {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EndpointProbe for CountingProbe {
        async fn probe(&self, endpoint: &RpcEndpoint) -> Result<(), UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if endpoint.name == "down" {
                Err(UpstreamError::http_status(&endpoint.name, 500, "error"))
            } else {
                Ok(())
            }
        }
    }

    fn endpoint(name: &str, priority: EndpointPriority) -> EndpointConfig {
        EndpointConfig {
            name: name.to_string(),
            primary_url: format!("https://{}.example", name),
            secondary_url: None,
            priority,
        }
    }

    fn config(endpoints: Vec<EndpointConfig>) -> Config {
        let mut config = Config::default();
        config.upstream.endpoints = endpoints;
        config
    }

    fn service(endpoints: Vec<EndpointConfig>) -> (Arc<CountingProbe>, UpstreamService) {
        let probe = Arc::new(CountingProbe {
            calls: AtomicUsize::new(0),
        });
        let service = UpstreamService::with_probe(config(endpoints), probe.clone()).unwrap();
        (probe, service)
    }

    #[test]
    fn test_empty_endpoint_list_rejected() {
        let probe = Arc::new(CountingProbe {
            calls: AtomicUsize::new(0),
        });
        let result = UpstreamService::with_probe(config(Vec::new()), probe);
        assert!(matches!(result, Err(UpstreamError::NoEndpointsAvailable)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let probe = Arc::new(CountingProbe {
            calls: AtomicUsize::new(0),
        });
        let mut cfg = config(vec![endpoint("a", EndpointPriority::Primary)]);
        cfg.upstream.endpoints[0].primary_url = "ftp://nope".to_string();

        let result = UpstreamService::with_probe(cfg, probe);
        assert!(matches!(result, Err(UpstreamError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_probes_immediately_and_shutdown_stops() {
        let (probe, service) = service(vec![
            endpoint("up", EndpointPriority::Primary),
            endpoint("down", EndpointPriority::Secondary),
        ]);

        service.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
        assert!(service.status_report().health_checker_running);

        let statuses = service.get_status();
        assert!(statuses.iter().all(|s| s.last_health_check_at.is_some()));
        assert_eq!(statuses[1].failure_count, 1);

        service.shutdown().await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
        assert!(!service.status_report().health_checker_running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_fallback_flow() {
        let (_, service) = service(vec![
            endpoint("a", EndpointPriority::Primary),
            endpoint("b", EndpointPriority::Primary),
        ]);
        let requests = AtomicUsize::new(0);

        for _ in 0..3 {
            let slot: Result<u64, UpstreamError> = service
                .cache_wrapper(
                    "rpc-calls",
                    "getSlot",
                    || {
                        service.with_fallback(
                            |endpoint| {
                                requests.fetch_add(1, Ordering::SeqCst);
                                async move {
                                    if endpoint.name == "a" {
                                        Err(UpstreamError::http_status("a", 502, "bad gateway"))
                                    } else {
                                        Ok(245_000_000)
                                    }
                                }
                            },
                            None,
                        )
                    },
                    None,
                )
                .await;
            assert_eq!(slot, Ok(245_000_000));
        }

        // One miss: a fails, b answers. Later calls are cache hits.
        assert_eq!(requests.load(Ordering::SeqCst), 2);
        let stats = service.cache_stats("rpc-calls").unwrap();
        assert_eq!(stats.hit_count, 2);
        assert_eq!(stats.miss_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_restores_initial_state() {
        let (_, service) = service(vec![endpoint("a", EndpointPriority::Primary)]);

        for _ in 0..3 {
            service.registry().update_metrics(crate::rpc::EndpointId(0), 0.0, false);
        }
        let _: Result<u8, UpstreamError> = service
            .cache_wrapper("price", "sol", || async { Ok(1) }, None)
            .await;

        service.reset();
        assert!(service.select_endpoint().is_healthy);
        let stats = service.cache_stats("price").unwrap();
        assert_eq!(stats.key_count, 0);
        assert_eq!(stats.miss_count, 0);
    }

    #[test]
    fn test_status_report_serializes() {
        let (_, service) = service(vec![endpoint("a", EndpointPriority::Primary)]);
        let json = serde_json::to_value(service.status_report()).unwrap();
        assert_eq!(json["endpoints"][0]["name"], "a");
        assert_eq!(json["endpoints"][0]["priority"], "primary");
        assert_eq!(json["healthy_endpoints"], 1);
    }
}
