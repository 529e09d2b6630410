//! Configuration system
//!
//! - `macros`: the `config_struct!` macro (struct + defaults in one place)
//! - `schemas`: every configuration section
//! - `utils`: TOML loading, saving and validation

pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::{
    CacheNamespaceConfig, CacheSettings, Config, EndpointConfig, HealthConfig, UpstreamConfig,
};
pub use utils::{load_config_from_path, parse_config, save_config, validate_config, CONFIG_FILE_PATH};
