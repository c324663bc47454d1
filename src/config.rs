//! Shard connection configuration
//!
//! Read from the environment after loading `.env`. Each local shard falls
//! back to `DATABASE_URL` so a single database can host all five shards.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{DataAccessError, Result};
use crate::shard::Shard;

/// Connection pool settings shared by every shard
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 100,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(3000 * 60)), // 3000 minutes
            max_lifetime: Some(Duration::from_secs(3000 * 60)),
        }
    }
}

/// Federation configuration
#[derive(Debug, Clone)]
pub struct FederationConfig {
    pub urls: BTreeMap<Shard, String>,
    pub pool: PoolSettings,
}

pub fn url_var(shard: Shard) -> &'static str {
    match shard {
        Shard::Global => "SALES_GLOBAL_DATABASE_URL",
        Shard::Local1 => "SALES_LOCAL1_DATABASE_URL",
        Shard::Local2 => "SALES_LOCAL2_DATABASE_URL",
        Shard::Local3 => "SALES_LOCAL3_DATABASE_URL",
        Shard::Local4 => "SALES_LOCAL4_DATABASE_URL",
    }
}

impl FederationConfig {
    /// Load from the process environment, honouring a `.env` file if present
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fallback = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        let mut urls = BTreeMap::new();
        for shard in Shard::ALL {
            let url = lookup(url_var(shard))
                .filter(|v| !v.trim().is_empty())
                .or_else(|| fallback.clone())
                .ok_or_else(|| {
                    DataAccessError::Configuration(format!(
                        "no database URL for shard '{}': set {} or DATABASE_URL",
                        shard,
                        url_var(shard)
                    ))
                })?;
            urls.insert(shard, url);
        }

        let mut pool = PoolSettings::default();
        if let Some(size) = parse_var(&lookup, "SALES_DB_POOL_SIZE")? {
            pool.max_connections = size;
        }
        if let Some(secs) = parse_var(&lookup, "SALES_DB_ACQUIRE_TIMEOUT_SECS")? {
            pool.acquire_timeout = Duration::from_secs(secs);
        }

        Ok(Self { urls, pool })
    }

    /// Every shard pointed at the same database
    pub fn single(database_url: impl Into<String>) -> Self {
        let url = database_url.into();
        Self {
            urls: Shard::ALL.iter().map(|s| (*s, url.clone())).collect(),
            pool: PoolSettings::default(),
        }
    }

    pub fn url(&self, shard: Shard) -> Result<&str> {
        self.urls
            .get(&shard)
            .map(String::as_str)
            .ok_or_else(|| DataAccessError::Configuration(format!("no URL for shard '{}'", shard)))
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            DataAccessError::Configuration(format!("{} has invalid value '{}'", key, raw))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn locals_fall_back_to_database_url() {
        let config = FederationConfig::from_lookup(env(&[
            ("DATABASE_URL", "postgres://localhost/sales"),
            ("SALES_LOCAL2_DATABASE_URL", "postgres://db2/sales"),
        ]))
        .unwrap();
        assert_eq!(config.url(Shard::Local2).unwrap(), "postgres://db2/sales");
        assert_eq!(config.url(Shard::Local4).unwrap(), "postgres://localhost/sales");
        assert_eq!(config.pool.max_connections, 100);
    }

    #[test]
    fn missing_url_is_configuration_error() {
        let err = FederationConfig::from_lookup(env(&[(
            "SALES_GLOBAL_DATABASE_URL",
            "postgres://localhost/sales",
        )]))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("local1"));
    }

    #[test]
    fn pool_overrides_are_parsed() {
        let config = FederationConfig::from_lookup(env(&[
            ("DATABASE_URL", "postgres://localhost/sales"),
            ("SALES_DB_POOL_SIZE", "8"),
            ("SALES_DB_ACQUIRE_TIMEOUT_SECS", "2"),
        ]))
        .unwrap();
        assert_eq!(config.pool.max_connections, 8);
        assert_eq!(config.pool.acquire_timeout, Duration::from_secs(2));

        let err = FederationConfig::from_lookup(env(&[
            ("DATABASE_URL", "postgres://localhost/sales"),
            ("SALES_DB_POOL_SIZE", "lots"),
        ]))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
