//! Façade configuration.

use serde::{Deserialize, Serialize};
use sqlmapper_core::{ConfigError, DEFAULT_DATA_SOURCE, Error, Result};

/// Default number of entities written per batch chunk.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Environment variable overriding [`DbConfig::batch_size`].
pub const BATCH_SIZE_ENV: &str = "SQLMAPPER_BATCH_SIZE";

/// Environment variable overriding [`DbConfig::default_data_source`].
pub const DATA_SOURCE_ENV: &str = "SQLMAPPER_DATA_SOURCE";

/// Configuration for a [`Db`](crate::Db).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Entities per chunk for `save_batch` / `update_batch_by_id`
    pub batch_size: usize,
    /// Data source that entities without an explicit one are routed to
    pub default_data_source: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            default_data_source: DEFAULT_DATA_SOURCE.to_string(),
        }
    }
}

impl DbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the batch chunk size.
    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    /// Set the data source used for entities that do not name one.
    pub fn default_data_source(mut self, name: impl Into<String>) -> Self {
        self.default_data_source = name.into();
        self
    }

    /// Parse a JSON document; missing keys keep their defaults.
    #[allow(clippy::result_large_err)]
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            Error::Config(ConfigError {
                message: format!("invalid DbConfig JSON: {e}"),
                source: Some(Box::new(e)),
            })
        })?;
        config.validate()
    }

    /// Defaults overridden by `SQLMAPPER_BATCH_SIZE` and
    /// `SQLMAPPER_DATA_SOURCE`.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    #[allow(clippy::result_large_err)]
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(raw) = lookup(BATCH_SIZE_ENV) {
            config.batch_size = raw.trim().parse().map_err(|e| {
                Error::Config(ConfigError {
                    message: format!("{BATCH_SIZE_ENV}={raw:?} is not a batch size"),
                    source: Some(Box::new(e)),
                })
            })?;
        }
        if let Some(raw) = lookup(DATA_SOURCE_ENV) {
            config.default_data_source = raw.trim().to_string();
        }
        config.validate()
    }

    /// Reject a zero batch size or a blank data source.
    #[allow(clippy::result_large_err)]
    pub fn validate(self) -> Result<Self> {
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be at least 1"));
        }
        if self.default_data_source.trim().is_empty() {
            return Err(Error::config("default_data_source cannot be empty"));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = DbConfig::default();
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.default_data_source, "default");
    }

    #[test]
    fn test_builder() {
        let config = DbConfig::new().batch_size(50).default_data_source("primary");
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.default_data_source, "primary");
    }

    #[test]
    fn test_from_json_partial() {
        let config = DbConfig::from_json(r#"{"batch_size": 250}"#).unwrap();
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.default_data_source, "default");
    }

    #[test]
    fn test_from_json_rejects_zero_and_garbage() {
        assert!(matches!(
            DbConfig::from_json(r#"{"batch_size": 0}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(DbConfig::from_json("{"), Err(Error::Config(_))));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> =
            HashMap::from([(BATCH_SIZE_ENV, " 20 "), (DATA_SOURCE_ENV, "archive")]);
        let config = DbConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_string())).unwrap();
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.default_data_source, "archive");

        let bad = DbConfig::from_lookup(|k| (k == BATCH_SIZE_ENV).then(|| "many".to_string()));
        assert!(matches!(bad, Err(Error::Config(_))));

        let empty = DbConfig::from_lookup(|_| None).unwrap();
        assert_eq!(empty, DbConfig::default());
    }
}
