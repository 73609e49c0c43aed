//! Configuration loading and management

use anyhow::{bail, Result};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "GRACEFUL_LOG";

/// Environment variable enabling failure reporting outside of shutdown
pub const ANY_CONTEXT_ENV: &str = "GRACEFUL_ANY_CONTEXT";

/// Runner configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `tracing_subscriber` filter directive
    pub log_filter: String,

    /// Report child failures even when the scope was not cancelled
    pub any_context: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            any_context: false,
        }
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(filter) = lookup(LOG_ENV).filter(|f| !f.trim().is_empty()) {
            config.log_filter = filter;
        }

        if let Some(raw) = lookup(ANY_CONTEXT_ENV) {
            config.any_context = parse_bool(ANY_CONTEXT_ENV, &raw)?;
        }

        Ok(config)
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("invalid boolean for {}: {:?}", key, other),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.log_filter, "info");
        assert!(!config.any_context);
    }

    #[test]
    fn test_config_from_env() {
        let config = load(&[(LOG_ENV, "graceful=debug"), (ANY_CONTEXT_ENV, "TRUE")]).unwrap();
        assert_eq!(config.log_filter, "graceful=debug");
        assert!(config.any_context);
    }

    #[test]
    fn test_blank_filter_keeps_default() {
        let config = load(&[(LOG_ENV, "  ")]).unwrap();
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_invalid_bool_rejected() {
        let err = load(&[(ANY_CONTEXT_ENV, "maybe")]).unwrap_err();
        assert!(err.to_string().contains(ANY_CONTEXT_ENV));
    }
}
