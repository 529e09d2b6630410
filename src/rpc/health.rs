//! Background health checker
//!
//! Probes every registered endpoint concurrently, once right away and then on
//! a fixed interval, recording each result through the registry exactly like
//! a normal request (latency on success, zero on failure).

use super::registry::EndpointRegistry;
use super::types::{EndpointId, RpcEndpoint};
use crate::errors::UpstreamError;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Instant};

pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_millis(30_000);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Liveness check for a single endpoint
#[async_trait]
pub trait EndpointProbe: Send + Sync {
    /// Ok when the endpoint answered and reports itself usable
    async fn probe(&self, endpoint: &RpcEndpoint) -> Result<(), UpstreamError>;
}

/// Result of probing one endpoint
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub endpoint: EndpointId,
    pub name: String,
    pub latency: Duration,
    pub error: Option<UpstreamError>,
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

struct RunningTask {
    handle: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

pub struct HealthChecker {
    registry: Arc<EndpointRegistry>,
    probe: Arc<dyn EndpointProbe>,
    interval: Duration,
    probe_timeout: Duration,
    task: Mutex<Option<RunningTask>>,
}

impl HealthChecker {
    pub fn new(
        registry: Arc<EndpointRegistry>,
        probe: Arc<dyn EndpointProbe>,
        interval: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            probe,
            interval,
            probe_timeout,
            task: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|task| !task.handle.is_finished())
            .unwrap_or(false)
    }

    /// Spawn the periodic loop; the first cycle runs immediately
    ///
    /// Calling `start` while the loop is already running does nothing.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.as_ref().map(|t| !t.handle.is_finished()).unwrap_or(false) {
            logger::debug(LogTag::Health, "Health checker already running");
            return;
        }

        let shutdown = Arc::new(Notify::new());
        let checker = self.clone();
        let handle = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { checker.run_loop(shutdown).await }
        });

        *task = Some(RunningTask { handle, shutdown });
    }

    /// Signal the loop to stop and wait for it to exit
    pub async fn stop(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.shutdown.notify_one();
            if let Err(e) = task.handle.await {
                logger::warning(LogTag::Health, &format!("Health checker task ended abnormally: {}", e));
            }
        }
    }

    async fn run_loop(self: Arc<Self>, shutdown: Arc<Notify>) {
        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        logger::info(
            LogTag::Health,
            &format!(
                "Starting health checks for {} endpoints (interval={}ms, timeout={}ms)",
                self.registry.len(),
                self.interval.as_millis(),
                self.probe_timeout.as_millis()
            ),
        );

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    logger::info(LogTag::Health, "Health checks shutting down");
                    break;
                }
                _ = timer.tick() => {
                    self.run_cycle().await;
                }
            }
        }
    }

    /// Probe every endpoint once, concurrently, and record the results
    pub async fn run_cycle(&self) -> Vec<ProbeOutcome> {
        let endpoints = self.registry.snapshot();
        let outcomes = join_all(endpoints.iter().map(|endpoint| self.probe_one(endpoint))).await;

        for outcome in &outcomes {
            match &outcome.error {
                None => {
                    let latency_ms = outcome.latency.as_secs_f64() * 1000.0;
                    self.registry.update_metrics(outcome.endpoint, latency_ms, true);
                }
                Some(e) => {
                    logger::debug(LogTag::Health, &e.to_string());
                    self.registry.update_metrics(outcome.endpoint, 0.0, false);
                }
            }
            self.registry.record_health_check(outcome.endpoint);
        }

        let healthy = self.registry.healthy_count();
        logger::debug(
            LogTag::Health,
            &format!("Health cycle done: {}/{} endpoints healthy", healthy, outcomes.len()),
        );
        if healthy == 0 {
            logger::warning(LogTag::Health, "No healthy endpoints after health check");
        }

        outcomes
    }

    async fn probe_one(&self, endpoint: &RpcEndpoint) -> ProbeOutcome {
        let start = Instant::now();
        let error = match timeout(self.probe_timeout, self.probe.probe(endpoint)).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(UpstreamError::ProbeFailure {
                endpoint: endpoint.name.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Some(UpstreamError::ProbeFailure {
                endpoint: endpoint.name.clone(),
                reason: format!("timed out after {}ms", self.probe_timeout.as_millis()),
            }),
        };

        ProbeOutcome {
            endpoint: endpoint.id,
            name: endpoint.name.clone(),
            latency: start.elapsed(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::registry::DEFAULT_MAX_FAILURES;
    use crate::rpc::types::EndpointPriority;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Probe with scripted failures and a fixed delay
    struct ScriptedProbe {
        failing: Mutex<HashSet<String>>,
        hanging: HashSet<String>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(delay: Duration) -> Self {
            Self {
                failing: Mutex::new(HashSet::new()),
                hanging: HashSet::new(),
                delay,
                calls: AtomicUsize::new(0),
            }
        }

        fn fail(&self, name: &str) {
            self.failing.lock().insert(name.to_string());
        }

        fn heal(&self, name: &str) {
            self.failing.lock().remove(name);
        }
    }

    #[async_trait]
    impl EndpointProbe for ScriptedProbe {
        async fn probe(&self, endpoint: &RpcEndpoint) -> Result<(), UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hanging.contains(&endpoint.name) {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(self.delay).await;
            if self.failing.lock().contains(&endpoint.name) {
                Err(UpstreamError::http_status(&endpoint.name, 503, "down"))
            } else {
                Ok(())
            }
        }
    }

    fn registry() -> Arc<EndpointRegistry> {
        let endpoints = ["a", "b"]
            .iter()
            .map(|name| {
                RpcEndpoint::new(
                    EndpointId(0),
                    name,
                    &format!("https://{}.example", name),
                    None,
                    EndpointPriority::Primary,
                )
            })
            .collect();
        Arc::new(EndpointRegistry::from_endpoints(endpoints, DEFAULT_MAX_FAILURES).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_records_latency_and_failures() {
        let registry = registry();
        let probe = Arc::new(ScriptedProbe::new(Duration::from_millis(40)));
        probe.fail("b");
        let checker = HealthChecker::new(registry.clone(), probe, DEFAULT_HEALTH_INTERVAL, DEFAULT_PROBE_TIMEOUT);

        let outcomes = checker.run_cycle().await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_success());
        assert!(matches!(outcomes[1].error, Some(UpstreamError::ProbeFailure { .. })));

        let a = registry.get(EndpointId(0)).unwrap();
        assert!((a.avg_response_time_ms - 12.0).abs() < 1.0);
        assert!(a.last_health_check_at.is_some());
        assert_eq!(registry.get(EndpointId(1)).unwrap().failure_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probes_run_concurrently() {
        let registry = registry();
        let probe = Arc::new(ScriptedProbe::new(Duration::from_secs(2)));
        let checker = HealthChecker::new(registry, probe, DEFAULT_HEALTH_INTERVAL, DEFAULT_PROBE_TIMEOUT);

        let start = Instant::now();
        checker.run_cycle().await;
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_times_out() {
        let registry = registry();
        let mut probe = ScriptedProbe::new(Duration::ZERO);
        probe.hanging.insert("a".to_string());
        let checker = HealthChecker::new(registry.clone(), Arc::new(probe), DEFAULT_HEALTH_INTERVAL, DEFAULT_PROBE_TIMEOUT);

        let start = Instant::now();
        let outcomes = checker.run_cycle().await;
        assert!(start.elapsed() >= DEFAULT_PROBE_TIMEOUT);
        assert!(outcomes[0].error.as_ref().unwrap().to_string().contains("timed out"));
        assert!(outcomes[1].is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_on_interval() {
        let registry = registry();
        let probe = Arc::new(ScriptedProbe::new(Duration::ZERO));
        let checker = Arc::new(HealthChecker::new(
            registry,
            probe.clone(),
            Duration::from_secs(30),
            DEFAULT_PROBE_TIMEOUT,
        ));

        checker.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 4);

        checker.stop().await;
        assert!(!checker.is_running());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unhealthy_endpoint_recovers_through_probes() {
        let registry = registry();
        let probe = Arc::new(ScriptedProbe::new(Duration::from_millis(5)));
        let checker = HealthChecker::new(registry.clone(), probe.clone(), DEFAULT_HEALTH_INTERVAL, DEFAULT_PROBE_TIMEOUT);

        probe.fail("a");
        for _ in 0..3 {
            checker.run_cycle().await;
        }
        assert!(!registry.get(EndpointId(0)).unwrap().is_healthy);

        probe.heal("a");
        for _ in 0..2 {
            checker.run_cycle().await;
        }
        assert!(!registry.get(EndpointId(0)).unwrap().is_healthy);
        checker.run_cycle().await;
        assert!(registry.get(EndpointId(0)).unwrap().is_healthy);
    }
}
