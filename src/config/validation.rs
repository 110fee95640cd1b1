use crate::config::types::{Config, CrawlerConfig, OutputConfig, SearchConfig, SourceEntry};
use crate::resolver::MAX_REQUEST_LIMIT;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    validate_search_config(&config.search)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.pool_size < 1 || config.pool_size > 32 {
        return Err(ConfigError::Validation(format!(
            "pool_size must be between 1 and 32, got {}",
            config.pool_size
        )));
    }

    if config.worker_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "worker_timeout_ms must be >= 100ms, got {}ms",
            config.worker_timeout_ms
        )));
    }

    if config.global_deadline_ms <= config.worker_timeout_ms {
        return Err(ConfigError::Validation(format!(
            "global_deadline_ms ({}ms) must be longer than worker_timeout_ms ({}ms)",
            config.global_deadline_ms, config.worker_timeout_ms
        )));
    }

    if let Some(proxy) = &config.proxy_url {
        Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy_url '{}': {}", proxy, e)))?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.metrics_path.is_empty() {
        return Err(ConfigError::Validation(
            "metrics_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if config.default_limit == 0 || config.default_limit > MAX_REQUEST_LIMIT {
        return Err(ConfigError::Validation(format!(
            "default_limit must be between 1 and {}, got {}",
            MAX_REQUEST_LIMIT, config.default_limit
        )));
    }

    Ok(())
}

/// Validates the source roster
fn validate_sources(sources: &[SourceEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for entry in sources {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source name cannot be empty".to_string(),
            ));
        }

        if !seen.insert(entry.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name '{}'",
                entry.name
            )));
        }

        if let Some(base) = &entry.base_url {
            let url = Url::parse(base).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", base, e))
            })?;

            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::InvalidUrl(format!(
                    "base-url must use http or https: {}",
                    base
                )));
            }
        }
    }

    Ok(())
}
