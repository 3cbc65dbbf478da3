//! Environment-driven process configuration.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Postgres connection settings. Absent when `DATABASE_URL` is unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Stream names the engine consumes from and publishes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    pub catalog: String,
    pub orders: String,
    pub prices: String,
    /// Consumer group prefix; each worker appends its own suffix.
    pub group_id: String,
    /// Consumer name within each group. Must stay the same across restarts
    /// so unacknowledged entries are picked up again.
    pub consumer_name: String,
}

impl TopicConfig {
    pub fn catalog_group(&self) -> String {
        format!("{}-catalog", self.group_id)
    }

    pub fn orders_group(&self) -> String {
        format!("{}-orders", self.group_id)
    }

    /// Consumer group for `topic`: the worker groups for the consumed
    /// topics, `<group_id>-<topic>` for anything else.
    pub fn group_for(&self, topic: &str) -> String {
        if topic == self.catalog {
            self.catalog_group()
        } else if topic == self.orders {
            self.orders_group()
        } else {
            format!("{}-{topic}", self.group_id)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingConfig {
    pub http_addr: SocketAddr,
    pub database: Option<DatabaseConfig>,
    pub redis_url: Option<String>,
    pub topics: TopicConfig,
    pub shutdown_grace_secs: u64,
}

impl PricingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source.
    ///
    /// Empty values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let http_addr = match var("PRICING_HTTP_ADDR") {
            Some(raw) => raw
                .parse::<SocketAddr>()
                .map_err(|e| ConfigError::invalid("PRICING_HTTP_ADDR", raw, e.to_string()))?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let database = match var("DATABASE_URL") {
            Some(url) => {
                let max_connections = parse_or("DATABASE_MAX_CONNECTIONS", var("DATABASE_MAX_CONNECTIONS"), 10u32)?;
                if max_connections == 0 {
                    return Err(ConfigError::invalid(
                        "DATABASE_MAX_CONNECTIONS",
                        "0",
                        "must be greater than 0",
                    ));
                }
                Some(DatabaseConfig { url, max_connections })
            }
            None => None,
        };

        let topics = TopicConfig {
            catalog: var("PRICING_CATALOG_TOPIC").unwrap_or_else(|| "catalog.events".to_string()),
            orders: var("PRICING_ORDERS_TOPIC").unwrap_or_else(|| "order.events".to_string()),
            prices: var("PRICING_PRICE_TOPIC").unwrap_or_else(|| "pricing.events".to_string()),
            group_id: var("PRICING_GROUP_ID").unwrap_or_else(|| "pricing".to_string()),
            consumer_name: var("PRICING_CONSUMER_NAME").unwrap_or_else(|| "worker-1".to_string()),
        };
        if topics.catalog == topics.prices || topics.orders == topics.prices {
            return Err(ConfigError::invalid(
                "PRICING_PRICE_TOPIC",
                topics.prices,
                "must differ from the consumed topics",
            ));
        }

        let shutdown_grace_secs = parse_or("PRICING_SHUTDOWN_GRACE_SECS", var("PRICING_SHUTDOWN_GRACE_SECS"), 5u64)?;

        Ok(Self {
            http_addr,
            database,
            redis_url: var("REDIS_URL"),
            topics,
            shutdown_grace_secs,
        })
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::invalid(name, raw.clone(), e.to_string())),
        None => Ok(default),
    }
}
