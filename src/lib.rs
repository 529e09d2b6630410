pub mod arguments;
pub mod cache;
pub mod config;
pub mod display;
pub mod errors; // Structured error handling
pub mod logger;
pub mod rpc;
pub mod service;

pub use errors::{ConfigError, UpstreamError};
pub use service::UpstreamService;
