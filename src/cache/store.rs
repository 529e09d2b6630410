//! Namespaced in-memory cache with per-entry TTL and LRU eviction
//!
//! Thread-safe, generic over the value type. Each namespace has its own
//! lock, default TTL, optional capacity and metrics.

use super::config::NamespaceConfig;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Cache entry with TTL tracking
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
    last_access_tick: u64,
}

impl<V> CacheEntry<V> {
    /// Visible only while `now < inserted_at + ttl`
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.inserted_at + self.ttl
    }
}

/// Per-namespace counters behind `CacheStats`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CacheMetrics {
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
    inserts: u64,
}

/// Point-in-time statistics for one namespace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub namespace: String,
    pub key_count: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub eviction_count: u64,
    pub expiration_count: u64,
    pub insert_count: u64,
    pub ttl_seconds: u64,
    pub capacity: Option<usize>,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

struct Namespace<V> {
    config: NamespaceConfig,
    entries: HashMap<String, CacheEntry<V>>,
    metrics: CacheMetrics,
    access_tick: u64,
}

impl<V> Namespace<V> {
    fn new(config: NamespaceConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            metrics: CacheMetrics::default(),
            access_tick: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.access_tick += 1;
        self.access_tick
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - self.entries.len();
        self.metrics.expirations += removed as u64;
        removed
    }

    fn evict_lru(&mut self) {
        let lru_key = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access_tick)
            .map(|(key, _)| key.clone());

        if let Some(key) = lru_key {
            self.entries.remove(&key);
            self.metrics.evictions += 1;
        }
    }
}

/// Namespaced cache store
pub struct CacheStore<V> {
    namespaces: RwLock<HashMap<String, Arc<Mutex<Namespace<V>>>>>,
    default_ttl: Duration,
}

impl<V: Clone> CacheStore<V> {
    /// Create an empty store; unknown namespaces are created on first `set`
    /// with `default_ttl`
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Create a store with a fixed set of namespaces
    pub fn with_namespaces<I>(default_ttl: Duration, namespaces: I) -> Self
    where
        I: IntoIterator<Item = (String, NamespaceConfig)>,
    {
        let store = Self::new(default_ttl);
        for (name, config) in namespaces {
            store.register_namespace(&name, config);
        }
        store
    }

    /// Register (or reconfigure) a namespace; existing entries are kept
    pub fn register_namespace(&self, name: &str, config: NamespaceConfig) {
        let mut namespaces = self.namespaces.write();
        match namespaces.get(name) {
            Some(ns) => ns.lock().config = config,
            None => {
                namespaces.insert(name.to_string(), Arc::new(Mutex::new(Namespace::new(config))));
            }
        }
    }

    fn namespace(&self, name: &str) -> Option<Arc<Mutex<Namespace<V>>>> {
        self.namespaces.read().get(name).cloned()
    }

    fn namespace_or_create(&self, name: &str) -> Arc<Mutex<Namespace<V>>> {
        if let Some(ns) = self.namespace(name) {
            return ns;
        }
        let config = NamespaceConfig {
            ttl: self.default_ttl,
            capacity: None,
        };
        self.namespaces
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Namespace::new(config))))
            .clone()
    }

    /// Get value from cache (returns None if expired or missing)
    ///
    /// An unknown namespace returns None without recording anything.
    pub fn get(&self, namespace: &str, key: &str) -> Option<V> {
        let ns = self.namespace(namespace)?;
        Self::read_entry(&ns, key, |_| true)
    }

    /// Get a live value that also satisfies `accept`
    ///
    /// A rejected value counts as a miss and is left in place for the caller
    /// to overwrite. An unknown namespace is created with the default TTL so
    /// the miss is recorded.
    pub fn get_if<F>(&self, namespace: &str, key: &str, accept: F) -> Option<V>
    where
        F: FnOnce(&V) -> bool,
    {
        let ns = self.namespace_or_create(namespace);
        Self::read_entry(&ns, key, accept)
    }

    fn read_entry<F>(ns: &Mutex<Namespace<V>>, key: &str, accept: F) -> Option<V>
    where
        F: FnOnce(&V) -> bool,
    {
        let mut guard = ns.lock();
        let ns = &mut *guard;
        let now = Instant::now();
        let tick = ns.next_tick();

        let expired = match ns.entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                if accept(&entry.value) {
                    entry.last_access_tick = tick;
                    let value = entry.value.clone();
                    ns.metrics.hits += 1;
                    return Some(value);
                }
                false
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            ns.entries.remove(key);
            ns.metrics.expirations += 1;
        }
        ns.metrics.misses += 1;
        None
    }

    /// Insert or overwrite a value
    ///
    /// Uses the namespace TTL unless `ttl_override` is given. Inserting a new
    /// key into a full namespace first drops expired entries, then evicts the
    /// least recently used one.
    pub fn set(&self, namespace: &str, key: &str, value: V, ttl_override: Option<Duration>) {
        let ns = self.namespace_or_create(namespace);
        let mut guard = ns.lock();
        let ns = &mut *guard;
        let now = Instant::now();
        let ttl = ttl_override.unwrap_or(ns.config.ttl);

        if let Some(capacity) = ns.config.capacity {
            if !ns.entries.contains_key(key) && ns.entries.len() >= capacity {
                ns.purge_expired(now);
                while !ns.entries.is_empty() && ns.entries.len() >= capacity {
                    ns.evict_lru();
                }
            }
        }

        let tick = ns.next_tick();
        ns.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                inserted_at: now,
                ttl,
                last_access_tick: tick,
            },
        );
        ns.metrics.inserts += 1;
    }

    /// Remove specific key; returns whether a live entry was removed
    pub fn remove(&self, namespace: &str, key: &str) -> bool {
        match self.namespace(namespace) {
            Some(ns) => {
                let mut ns = ns.lock();
                let now = Instant::now();
                ns.entries
                    .remove(key)
                    .map(|entry| !entry.is_expired(now))
                    .unwrap_or(false)
            }
            None => false,
        }
    }

    /// Statistics for one namespace, `None` if it does not exist
    pub fn stats(&self, namespace: &str) -> Option<CacheStats> {
        let ns = self.namespace(namespace)?;
        let ns = ns.lock();
        let now = Instant::now();

        Some(CacheStats {
            namespace: namespace.to_string(),
            key_count: ns.entries.values().filter(|e| !e.is_expired(now)).count(),
            hit_count: ns.metrics.hits,
            miss_count: ns.metrics.misses,
            eviction_count: ns.metrics.evictions,
            expiration_count: ns.metrics.expirations,
            insert_count: ns.metrics.inserts,
            ttl_seconds: ns.config.ttl.as_secs(),
            capacity: ns.config.capacity,
        })
    }

    /// Statistics for every namespace, sorted by name
    pub fn all_stats(&self) -> Vec<CacheStats> {
        self.namespaces()
            .iter()
            .filter_map(|name| self.stats(name))
            .collect()
    }

    /// Registered namespace names, sorted
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop all expired entries in every namespace; returns how many were removed
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let namespaces: Vec<_> = self.namespaces.read().values().cloned().collect();
        namespaces
            .iter()
            .map(|ns| ns.lock().purge_expired(now))
            .sum()
    }

    /// Clear all entries of one namespace (metrics are kept)
    pub fn clear(&self, namespace: &str) {
        if let Some(ns) = self.namespace(namespace) {
            ns.lock().entries.clear();
        }
    }

    /// Clear all entries and metrics of every namespace
    pub fn clear_all(&self) {
        for ns in self.namespaces.read().values() {
            let mut ns = ns.lock();
            ns.entries.clear();
            ns.metrics = CacheMetrics::default();
            ns.access_tick = 0;
        }
    }

    /// Total live entries across namespaces
    pub fn len(&self) -> usize {
        self.all_stats().iter().map(|s| s.key_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CacheStore<String> {
        CacheStore::with_namespaces(
            Duration::from_secs(30),
            vec![
                ("price".to_string(), NamespaceConfig::custom(5, None)),
                ("small".to_string(), NamespaceConfig::custom(60, Some(2))),
            ],
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_basic_operations() {
        let cache = store();

        cache.set("price", "sol-usd", "142.10".to_string(), None);
        assert_eq!(cache.get("price", "sol-usd"), Some("142.10".to_string()));
        assert_eq!(cache.get("price", "nonexistent"), None);

        let stats = cache.stats("price").unwrap();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.key_count, 1);
        assert_eq!(stats.ttl_seconds, 5);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_boundary() {
        let cache = store();
        cache.set("price", "sol-usd", "142.10".to_string(), None);

        tokio::time::advance(Duration::from_millis(4_900)).await;
        assert_eq!(cache.get("price", "sol-usd"), Some("142.10".to_string()));

        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(cache.get("price", "sol-usd"), None);

        let stats = cache.stats("price").unwrap();
        assert_eq!(stats.expiration_count, 1);
        assert_eq!(stats.key_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_exactly_at_ttl() {
        let cache = store();
        cache.set("price", "k", "v".to_string(), Some(Duration::from_secs(2)));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("price", "k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_override_and_overwrite() {
        let cache = store();
        cache.set("price", "k", "old".to_string(), Some(Duration::from_secs(1)));
        cache.set("price", "k", "new".to_string(), Some(Duration::from_secs(20)));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.get("price", "k"), Some("new".to_string()));
        assert_eq!(cache.stats("price").unwrap().key_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lru_eviction() {
        let cache = store();

        cache.set("small", "key1", "value1".to_string(), None);
        cache.set("small", "key2", "value2".to_string(), None);
        // Touch key1 so key2 becomes least recently used
        assert!(cache.get("small", "key1").is_some());
        cache.set("small", "key3", "value3".to_string(), None);

        assert_eq!(cache.get("small", "key2"), None);
        assert_eq!(cache.get("small", "key1"), Some("value1".to_string()));
        assert_eq!(cache.get("small", "key3"), Some("value3".to_string()));
        assert_eq!(cache.stats("small").unwrap().eviction_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_namespace_prefers_dropping_expired() {
        let cache = store();

        cache.set("small", "short", "a".to_string(), Some(Duration::from_secs(1)));
        cache.set("small", "long", "b".to_string(), None);
        tokio::time::advance(Duration::from_secs(2)).await;
        cache.set("small", "fresh", "c".to_string(), None);

        let stats = cache.stats("small").unwrap();
        assert_eq!(stats.eviction_count, 0);
        assert_eq!(stats.expiration_count, 1);
        assert_eq!(cache.get("small", "long"), Some("b".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_namespace() {
        let cache = store();
        assert_eq!(cache.get("validator-set", "epoch"), None);
        assert!(cache.stats("validator-set").is_none());

        cache.set("validator-set", "epoch", "612".to_string(), None);
        let stats = cache.stats("validator-set").unwrap();
        assert_eq!(stats.ttl_seconds, 30);
        assert_eq!(stats.key_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_and_clear() {
        let cache = store();
        cache.set("price", "a", "1".to_string(), None);
        cache.set("small", "b", "2".to_string(), None);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 1);

        assert!(cache.remove("small", "b"));
        assert!(!cache.remove("small", "b"));
        assert!(cache.is_empty());

        cache.set("price", "c", "3".to_string(), None);
        let _ = cache.get("price", "c");
        cache.clear_all();
        let stats = cache.stats("price").unwrap();
        assert_eq!(stats.key_count, 0);
        assert_eq!(stats.hit_count, 0);
        assert_eq!(cache.namespaces(), vec!["price".to_string(), "small".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_if_rejection_counts_as_miss() {
        let cache = store();
        cache.set("price", "k", "142.10".to_string(), None);

        assert_eq!(cache.get_if("price", "k", |v| v.starts_with('9')), None);
        assert_eq!(
            cache.get_if("price", "k", |v| v.starts_with('1')),
            Some("142.10".to_string())
        );

        let stats = cache.stats("price").unwrap();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.key_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_if_registers_unknown_namespace() {
        let cache = store();
        assert!(cache.get("adhoc", "k").is_none());
        assert!(cache.stats("adhoc").is_none());

        assert_eq!(cache.get_if("adhoc", "k", |_| true), None);
        let stats = cache.stats("adhoc").unwrap();
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.ttl_seconds, 30);
    }
}
