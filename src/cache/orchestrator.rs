//! Get-or-populate wrapper around the cache store
//!
//! `cache_wrapper` returns a live cached value when there is one; otherwise it
//! awaits the producer, stores a successful result and returns it. Producer
//! failures are returned unchanged and never cached.
//!
//! With single-flight enabled, concurrent misses on the same key wait for the
//! first caller's producer and then re-read the cache. A waiter that still
//! finds nothing (the leader failed or was cancelled) runs its own producer.

use super::store::{CacheStats, CacheStore};
use crate::logger::{self, LogTag};
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Type-erased cached value; callers get their concrete type back by downcast
pub type CacheValue = Arc<dyn Any + Send + Sync>;

type FlightKey = (String, String);

/// Producer-side counters kept by the orchestrator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrchestratorStats {
    pub producer_calls: u64,
    pub producer_failures: u64,
    pub coalesced_waits: u64,
}

pub struct CacheOrchestrator {
    store: Arc<CacheStore<CacheValue>>,
    single_flight: bool,
    in_flight: Mutex<HashMap<FlightKey, Arc<Notify>>>,
    producer_calls: AtomicU64,
    producer_failures: AtomicU64,
    coalesced_waits: AtomicU64,
}

/// Removes the in-flight marker and wakes waiters, even if the leader's
/// future is dropped mid-flight
struct FlightGuard<'a> {
    in_flight: &'a Mutex<HashMap<FlightKey, Arc<Notify>>>,
    key: FlightKey,
    notify: Arc<Notify>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
        self.notify.notify_waiters();
    }
}

enum FlightRole {
    Leader(Arc<Notify>),
    Follower(Arc<Notify>),
}

impl CacheOrchestrator {
    pub fn new(store: Arc<CacheStore<CacheValue>>, single_flight: bool) -> Self {
        Self {
            store,
            single_flight,
            in_flight: Mutex::new(HashMap::new()),
            producer_calls: AtomicU64::new(0),
            producer_failures: AtomicU64::new(0),
            coalesced_waits: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<CacheStore<CacheValue>> {
        &self.store
    }

    /// Get-or-populate
    ///
    /// An entry holding a different type than `T` is treated as a miss and
    /// overwritten by the producer's result.
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
        let flight_guard = loop {
            if let Some(value) = self.lookup::<T>(namespace, key) {
                logger::debug(LogTag::Cache, &format!("Hit {}/{}", namespace, key));
                return Ok(value);
            }

            if !self.single_flight {
                break None;
            }

            match self.join_flight(namespace, key) {
                FlightRole::Leader(notify) => {
                    break Some(FlightGuard {
                        in_flight: &self.in_flight,
                        key: (namespace.to_string(), key.to_string()),
                        notify,
                    });
                }
                FlightRole::Follower(notify) => {
                    let notified = notify.notified();
                    tokio::pin!(notified);
                    notified.as_mut().enable();

                    // Leader may have finished between join_flight and enable()
                    let still_running = self
                        .in_flight
                        .lock()
                        .get(&(namespace.to_string(), key.to_string()))
                        .map(|current| Arc::ptr_eq(current, &notify))
                        .unwrap_or(false);

                    if still_running {
                        self.coalesced_waits.fetch_add(1, Ordering::Relaxed);
                        logger::debug(
                            LogTag::Cache,
                            &format!("Waiting for in-flight producer {}/{}", namespace, key),
                        );
                        notified.await;
                    }
                }
            }
        };

        let result = self.populate(namespace, key, producer, ttl_override).await;
        drop(flight_guard);
        result
    }

    fn lookup<T: Clone + Send + Sync + 'static>(&self, namespace: &str, key: &str) -> Option<T> {
        let value = self.store.get_if(namespace, key, |value| {
            let matches = (**value).is::<T>();
            if !matches {
                logger::warning(
                    LogTag::Cache,
                    &format!(
                        "Cached value for {}/{} is not a {}, refreshing",
                        namespace,
                        key,
                        std::any::type_name::<T>()
                    ),
                );
            }
            matches
        })?;
        value.downcast_ref::<T>().cloned()
    }

    fn join_flight(&self, namespace: &str, key: &str) -> FlightRole {
        let mut in_flight = self.in_flight.lock();
        let flight_key = (namespace.to_string(), key.to_string());

        match in_flight.get(&flight_key) {
            Some(notify) => FlightRole::Follower(notify.clone()),
            None => {
                let notify = Arc::new(Notify::new());
                in_flight.insert(flight_key, notify.clone());
                FlightRole::Leader(notify)
            }
        }
    }

    async fn populate<T, E, F, Fut>(
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
        logger::debug(LogTag::Cache, &format!("Miss {}/{}, calling producer", namespace, key));
        self.producer_calls.fetch_add(1, Ordering::Relaxed);

        match producer().await {
            Ok(value) => {
                self.store
                    .set(namespace, key, Arc::new(value.clone()), ttl_override);
                Ok(value)
            }
            Err(e) => {
                self.producer_failures.fetch_add(1, Ordering::Relaxed);
                logger::debug(
                    LogTag::Cache,
                    &format!("Producer failed for {}/{}, nothing cached", namespace, key),
                );
                Err(e)
            }
        }
    }

    pub fn stats(&self, namespace: &str) -> Option<CacheStats> {
        self.store.stats(namespace)
    }

    pub fn orchestrator_stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            producer_calls: self.producer_calls.load(Ordering::Relaxed),
            producer_failures: self.producer_failures.load(Ordering::Relaxed),
            coalesced_waits: self.coalesced_waits.load(Ordering::Relaxed),
        }
    }

    /// Drop all entries and counters
    pub fn reset(&self) {
        self.store.clear_all();
        self.producer_calls.store(0, Ordering::Relaxed);
        self.producer_failures.store(0, Ordering::Relaxed);
        self.coalesced_waits.store(0, Ordering::Relaxed);
    }
}
