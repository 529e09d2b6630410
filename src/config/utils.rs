//! Configuration utilities - loading, saving and validation
//!
//! The loaded `Config` is returned to the caller and handed to
//! `UpstreamService::new`; there is no process-wide config instance.
use super::schemas::Config;
use crate::errors::ConfigError;
use crate::logger::{self, LogTag};
use std::collections::HashSet;
use std::path::Path;

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "chainpulse.toml";

/// Load configuration from a TOML file
///
/// A missing file yields the built-in defaults. The result is validated
/// before it is returned.
pub fn load_config_from_path(path: &str) -> Result<Config, ConfigError> {
    let config = if Path::new(path).exists() {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_string(),
            message: e.to_string(),
        })?;

        parse_config(&contents).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_string(),
                message,
            },
            other => other,
        })?
    } else {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path),
        );
        Config::default()
    };

    validate_config(&config)?;
    Ok(config)
}

/// Parse configuration from TOML text without validating it
pub fn parse_config(contents: &str) -> Result<Config, ConfigError> {
    toml::from_str::<Config>(contents).map_err(|e| ConfigError::Parse {
        path: "<inline>".to_string(),
        message: e.to_string(),
    })
}

/// Write configuration to disk as TOML
pub fn save_config(config: &Config, path: &str) -> Result<(), ConfigError> {
    let contents = toml::to_string_pretty(config).map_err(|e| ConfigError::Write {
        path: path.to_string(),
        message: format!("Failed to serialize config: {}", e),
    })?;

    std::fs::write(path, contents).map_err(|e| ConfigError::Write {
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// Check invariants the service relies on at construction time
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let upstream = &config.upstream;

    if upstream.endpoints.is_empty() {
        return Err(ConfigError::invalid(
            "upstream.endpoints",
            "at least one endpoint is required",
        ));
    }

    let mut names = HashSet::new();
    for (index, endpoint) in upstream.endpoints.iter().enumerate() {
        let field = format!("upstream.endpoints[{}]", index);

        if endpoint.name.trim().is_empty() {
            return Err(ConfigError::invalid(format!("{}.name", field), "must not be empty"));
        }
        if !names.insert(endpoint.name.as_str()) {
            return Err(ConfigError::invalid(
                format!("{}.name", field),
                format!("duplicate endpoint name '{}'", endpoint.name),
            ));
        }

        validate_url(&format!("{}.primary_url", field), &endpoint.primary_url)?;
        if let Some(secondary) = &endpoint.secondary_url {
            validate_url(&format!("{}.secondary_url", field), secondary)?;
        }
    }

    if upstream.request_timeout_ms == 0 {
        return Err(ConfigError::invalid("upstream.request_timeout_ms", "must be > 0"));
    }
    if upstream.max_failures == 0 {
        return Err(ConfigError::invalid("upstream.max_failures", "must be > 0"));
    }

    if config.health.enabled {
        if config.health.interval_ms == 0 {
            return Err(ConfigError::invalid("health.interval_ms", "must be > 0"));
        }
        if config.health.timeout_ms == 0 {
            return Err(ConfigError::invalid("health.timeout_ms", "must be > 0"));
        }
    }

    if config.cache.default_ttl_secs == 0 {
        return Err(ConfigError::invalid("cache.default_ttl_secs", "must be > 0"));
    }
    if config.cache.sweep_enabled && config.cache.sweep_interval_secs == 0 {
        return Err(ConfigError::invalid("cache.sweep_interval_secs", "must be > 0"));
    }

    let mut namespaces = HashSet::new();
    for ns in &config.cache.namespaces {
        let field = format!("cache.namespaces.{}", ns.name);
        if ns.name.trim().is_empty() {
            return Err(ConfigError::invalid("cache.namespaces.name", "must not be empty"));
        }
        if !namespaces.insert(ns.name.as_str()) {
            return Err(ConfigError::invalid(field, "duplicate namespace"));
        }
        if ns.ttl_secs == 0 {
            return Err(ConfigError::invalid(format!("{}.ttl_secs", field), "must be > 0"));
        }
        if ns.capacity == Some(0) {
            return Err(ConfigError::invalid(format!("{}.capacity", field), "must be > 0"));
        }
    }

    Ok(())
}

fn validate_url(field: &str, raw: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| ConfigError::invalid(field, format!("invalid URL '{}': {}", raw, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::invalid(
            field,
            format!("unsupported scheme '{}'", other),
        )),
    }
}
