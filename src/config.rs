use serde::Deserialize;

use crate::storage::{Keyspace, DEFAULT_INDEX_KEY, DEFAULT_KEY_PREFIX, DEFAULT_PAGE_SIZE};

// ============================================================================
// Store Configuration
// ============================================================================
//
// Environment variables (all optional):
// - ORDERS_REDIS_URL   Redis connection URL
// - ORDERS_KEY_PREFIX  prefix of order record keys
// - ORDERS_INDEX_KEY   key of the index set
// - ORDERS_PAGE_SIZE   default page size for listings
//
// ============================================================================

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub redis_url: String,
    pub key_prefix: String,
    pub index_key: String,
    pub default_page_size: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            index_key: DEFAULT_INDEX_KEY.to_string(),
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; unset variables keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("ORDERS_REDIS_URL") {
            config.redis_url = url;
        }
        if let Some(prefix) = lookup("ORDERS_KEY_PREFIX") {
            config.key_prefix = prefix;
        }
        if let Some(index) = lookup("ORDERS_INDEX_KEY") {
            config.index_key = index;
        }
        if let Some(size) = lookup("ORDERS_PAGE_SIZE") {
            config.default_page_size = size.parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    name: "ORDERS_PAGE_SIZE",
                    reason: e.to_string(),
                }
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redis_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "redis_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.key_prefix.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "key_prefix",
                reason: "must not be empty".to_string(),
            });
        }
        if self.index_key.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "index_key",
                reason: "must not be empty".to_string(),
            });
        }
        // the index set must not collide with any record key
        if Keyspace::new(&self.key_prefix, &self.index_key)
            .parse_record_key(&self.index_key)
            .is_some()
        {
            return Err(ConfigError::InvalidValue {
                name: "index_key",
                reason: format!("{} is shaped like an order record key", self.index_key),
            });
        }
        if self.default_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "default_page_size",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn keyspace(&self) -> Keyspace {
        Keyspace::new(&self.key_prefix, &self.index_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.keyspace(), Keyspace::default());
        assert_eq!(config.default_page_size, 50);
    }

    #[test]
    fn test_overrides() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("ORDERS_REDIS_URL", "redis://cache:6380/1"),
            ("ORDERS_KEY_PREFIX", "shop:order"),
            ("ORDERS_INDEX_KEY", "shop:orders"),
            ("ORDERS_PAGE_SIZE", "10"),
        ]))
        .unwrap();

        assert_eq!(config.redis_url, "redis://cache:6380/1");
        assert_eq!(config.keyspace().record_key(3), "shop:order:3");
        assert_eq!(config.keyspace().index_key(), "shop:orders");
        assert_eq!(config.default_page_size, 10);
    }

    #[test]
    fn test_invalid_page_size() {
        let result = StoreConfig::from_lookup(lookup(&[("ORDERS_PAGE_SIZE", "lots")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name: "ORDERS_PAGE_SIZE", .. })
        ));

        let result = StoreConfig::from_lookup(lookup(&[("ORDERS_PAGE_SIZE", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_index_key_must_not_look_like_a_record() {
        let result = StoreConfig::from_lookup(lookup(&[("ORDERS_INDEX_KEY", "order:1")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { name: "index_key", .. })));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: StoreConfig = serde_json::from_str(r#"{"key_prefix":"o"}"#).unwrap();
        assert_eq!(config.key_prefix, "o");
        assert_eq!(config.index_key, DEFAULT_INDEX_KEY);
    }
}
