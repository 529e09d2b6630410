//! Cache configuration per namespace
//!
//! TTLs and capacities tuned for the dashboard's upstream data:
//! - Price quotes: short TTL (price API refreshes every minute)
//! - Raw RPC call results: very short TTL (slot/epoch data moves fast)
//! - Validator set: long TTL (changes once per epoch)

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Default time-to-live for entries written without an override
    pub ttl: Duration,

    /// Maximum number of entries (LRU eviction when exceeded)
    pub capacity: Option<usize>,
}

impl NamespaceConfig {
    /// Price API quotes
    pub fn price() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            capacity: Some(2000),
        }
    }

    /// Results of raw RPC calls proxied for the dashboard
    pub fn rpc_calls() -> Self {
        Self {
            ttl: Duration::from_secs(15),
            capacity: Some(5000),
        }
    }

    /// Validator set snapshots (stable within an epoch)
    pub fn validator_set() -> Self {
        Self {
            ttl: Duration::from_secs(600), // 10 minutes
            capacity: Some(100),
        }
    }

    /// Custom configuration
    pub fn custom(ttl_secs: u64, capacity: Option<usize>) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_secs),
            capacity,
        }
    }
}
