use crate::config::types::{
    CategoryEntry, Config, FetchConfig, PaginationConfig, ProxyBackend, ProxyConfig,
    PublicListConfig, ReportConfig, ResidentialConfig, StorageConfig,
};
use crate::proxy::parse_entry;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_config(&config.fetch)?;
    validate_proxy_config(&config.proxy)?;
    validate_storage_config(&config.storage)?;
    validate_report_config(&config.report)?;
    validate_pagination_config(&config.pagination)?;
    validate_categories(&config.categories)?;
    Ok(())
}

/// Validates fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 20 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 20, got {}",
            config.max_attempts
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "connect_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates that the selected backend is fully configured
fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    match config.backend {
        ProxyBackend::Residential => {
            let residential = config.residential.as_ref().ok_or_else(|| {
                ConfigError::Validation(
                    "backend \"residential\" requires a [proxy.residential] section".to_string(),
                )
            })?;
            validate_residential(residential)
        }
        ProxyBackend::Relay => {
            let relay = config.relay.as_ref().ok_or_else(|| {
                ConfigError::Validation(
                    "backend \"relay\" requires a [proxy.relay] section".to_string(),
                )
            })?;
            validate_host_port(&relay.host, relay.port)
        }
        ProxyBackend::PublicList => {
            let list = config.public_list.as_ref().ok_or_else(|| {
                ConfigError::Validation(
                    "backend \"public-list\" requires a [proxy.public-list] section".to_string(),
                )
            })?;
            validate_public_list(list)
        }
    }
}

fn validate_residential(config: &ResidentialConfig) -> Result<(), ConfigError> {
    validate_host_port(&config.host, config.port)?;

    if config.username.is_empty() {
        return Err(ConfigError::Validation(
            "residential username cannot be empty".to_string(),
        ));
    }

    if config.password.is_none() {
        return Err(ConfigError::Validation(
            "residential proxy needs either password or password-env".to_string(),
        ));
    }

    if let Some(code) = config
        .countries
        .iter()
        .find(|c| c.len() != 2 || !c.chars().all(|ch| ch.is_ascii_alphabetic()))
    {
        return Err(ConfigError::Validation(format!(
            "country code must be two letters, got '{}'",
            code
        )));
    }

    Ok(())
}

/// An empty list is allowed here; the proxy source reports exhaustion at run time
fn validate_public_list(config: &PublicListConfig) -> Result<(), ConfigError> {
    for entry in &config.proxies {
        let handle = parse_entry(entry, config.protocol)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        validate_host_port(&handle.host, handle.port)?;
    }

    if config.max_failures < 1 {
        return Err(ConfigError::Validation(
            "max_failures must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_host_port(host: &str, port: u16) -> Result<(), ConfigError> {
    if host.is_empty() {
        return Err(ConfigError::Validation(
            "proxy host cannot be empty".to_string(),
        ));
    }
    if port == 0 {
        return Err(ConfigError::Validation(format!(
            "proxy port for {} cannot be 0",
            host
        )));
    }
    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates skip report configuration
fn validate_report_config(config: &ReportConfig) -> Result<(), ConfigError> {
    if config.skip_report_path.is_empty() {
        return Err(ConfigError::Validation(
            "skip_report_path cannot be empty".to_string(),
        ));
    }

    if config.flush_every == Some(0) {
        return Err(ConfigError::Validation(
            "flush_every must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates pagination configuration
fn validate_pagination_config(config: &PaginationConfig) -> Result<(), ConfigError> {
    if !config.page_path.contains("{page}") {
        return Err(ConfigError::Validation(format!(
            "page_path must contain the {{page}} placeholder, got '{}'",
            config.page_path
        )));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1 when set".to_string(),
        ));
    }

    if config.max_consecutive_failures < 1 {
        return Err(ConfigError::Validation(
            "max_consecutive_failures must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates category entry points
fn validate_categories(categories: &[CategoryEntry]) -> Result<(), ConfigError> {
    for entry in categories {
        let url = Url::parse(&entry.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid category URL '{}': {}", entry.url, e))
        })?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::InvalidUrl(format!(
                "Category URL '{}' must use http or https",
                entry.url
            )));
        }
    }

    Ok(())
}
