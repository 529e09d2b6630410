//! Configuration schemas - all config structures defined once with defaults
//!
//! Each struct is defined using the `config_struct!` macro, so every field can
//! be omitted from the TOML file and falls back to the value written here.
use crate::cache::config::NamespaceConfig;
use crate::config_struct;
use crate::rpc::types::EndpointPriority;

// ============================================================================
// ROOT CONFIGURATION
// ============================================================================

config_struct! {
    /// Root configuration consumed by `UpstreamService`
    pub struct Config {
        upstream: UpstreamConfig = UpstreamConfig::default(),
        health: HealthConfig = HealthConfig::default(),
        cache: CacheSettings = CacheSettings::default(),
    }
}

// ============================================================================
// UPSTREAM (RPC) CONFIGURATION
// ============================================================================

config_struct! {
    /// Request executor and endpoint registry settings
    pub struct UpstreamConfig {
        /// Per-attempt timeout for requests issued through `with_fallback`
        request_timeout_ms: u64 = 5_000,

        /// Retries after the first attempt (total attempts = max_retries + 1)
        max_retries: u32 = 2,

        /// Consecutive failures before an endpoint is marked unhealthy
        max_failures: u32 = 3,

        /// Static endpoint list, registry order is preserved
        endpoints: Vec<EndpointConfig> = vec![
            EndpointConfig {
                name: "solana-mainnet".to_string(),
                primary_url: "https://api.mainnet-beta.solana.com".to_string(),
                secondary_url: None,
                priority: EndpointPriority::Primary,
            },
            EndpointConfig {
                name: "ankr".to_string(),
                primary_url: "https://rpc.ankr.com/solana".to_string(),
                secondary_url: None,
                priority: EndpointPriority::Secondary,
            },
        ],
    }
}

config_struct! {
    /// One upstream endpoint
    pub struct EndpointConfig {
        name: String = String::new(),
        primary_url: String = String::new(),

        /// Alternate URL for the same provider, tried by the HTTP probe and
        /// JSON-RPC client when the primary URL cannot be reached
        secondary_url: Option<String> = None,

        priority: EndpointPriority = EndpointPriority::Primary,
    }
}

// ============================================================================
// HEALTH CHECK CONFIGURATION
// ============================================================================

config_struct! {
    /// Background health checker settings
    pub struct HealthConfig {
        enabled: bool = true,

        /// Time between probe cycles
        interval_ms: u64 = 30_000,

        /// Per-probe timeout
        timeout_ms: u64 = 5_000,
    }
}

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

config_struct! {
    /// Cache store and orchestrator settings
    pub struct CacheSettings {
        /// TTL for namespaces created on first write (not listed below)
        default_ttl_secs: u64 = 60,

        /// Active expiry sweep; lazy expiry on read always applies
        sweep_enabled: bool = true,
        sweep_interval_secs: u64 = 60,

        /// Coalesce concurrent misses for the same key into one producer call
        single_flight: bool = false,

        namespaces: Vec<CacheNamespaceConfig> = vec![
            CacheNamespaceConfig::from_preset("price", NamespaceConfig::price()),
            CacheNamespaceConfig::from_preset("rpc-calls", NamespaceConfig::rpc_calls()),
            CacheNamespaceConfig::from_preset("validator-set", NamespaceConfig::validator_set()),
        ],
    }
}

config_struct! {
    /// One named cache partition
    pub struct CacheNamespaceConfig {
        name: String = String::new(),
        ttl_secs: u64 = 60,

        /// Max entries before LRU eviction (unbounded when absent)
        capacity: Option<usize> = None,
    }
}

impl CacheNamespaceConfig {
    pub fn from_preset(name: &str, preset: NamespaceConfig) -> Self {
        Self {
            name: name.to_string(),
            ttl_secs: preset.ttl.as_secs(),
            capacity: preset.capacity,
        }
    }

    pub fn to_namespace_config(&self) -> NamespaceConfig {
        NamespaceConfig::custom(self.ttl_secs, self.capacity)
    }
}
