use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// After parsing, the password of the residential backend is resolved from
/// its environment variable (if `password-env` is set) and the entries of a
/// public proxy list file are merged into the inline list. The result is then
/// validated.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, resolve or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let mut config: Config = toml::from_str(&content)?;

    resolve_secrets(&mut config, |name| std::env::var(name).ok())?;
    merge_proxy_file(&mut config)?;

    validate(&config)?;

    Ok(config)
}

/// Fills in secrets that the configuration references by name
///
/// `lookup` maps an environment variable name to its value. An inline
/// `password` always wins over `password-env`.
pub fn resolve_secrets<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(residential) = config.proxy.residential.as_mut() {
        if residential.password.is_none() {
            if let Some(var) = &residential.password_env {
                let value = lookup(var).ok_or_else(|| ConfigError::MissingSecret(var.clone()))?;
                residential.password = Some(value);
            }
        }
    }
    Ok(())
}

/// Reads the public proxy list file, if any, and appends its entries
///
/// Blank lines and lines starting with `#` are ignored.
fn merge_proxy_file(config: &mut Config) -> Result<(), ConfigError> {
    let Some(list) = config.proxy.public_list.as_mut() else {
        return Ok(());
    };
    let Some(file) = &list.file else {
        return Ok(());
    };

    let content = std::fs::read_to_string(file)?;
    let before = list.proxies.len();
    list.proxies.extend(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string),
    );
    tracing::debug!(
        "Loaded {} proxies from {}",
        list.proxies.len() - before,
        file
    );

    Ok(())
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at start-up so that runs can be matched to the configuration
/// that produced them.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
