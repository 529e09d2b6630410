//! Multi-endpoint RPC access
//!
//! - `registry`: endpoint records and health metrics
//! - `selector`: healthy-primary round-robin with degrade-not-fail fallback
//! - `executor`: timeout + failover loop (`with_fallback`)
//! - `health`: periodic background probing
//! - `client` / `probe`: JSON-RPC over HTTP and the default `getHealth` probe

pub mod client;
pub mod executor;
pub mod health;
pub mod probe;
pub mod registry;
pub mod selector;
pub mod types;

pub use client::JsonRpcClient;
pub use executor::RequestExecutor;
pub use health::{EndpointProbe, HealthChecker, ProbeOutcome};
pub use probe::HttpProbe;
pub use registry::{EndpointList, EndpointRegistry, HealthTransition};
pub use selector::EndpointSelector;
pub use types::{
    AttemptOutcome, EndpointId, EndpointPriority, EndpointStatus, RequestAttempt, RpcEndpoint,
};
