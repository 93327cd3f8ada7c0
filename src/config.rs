//! Runtime configuration from environment variables (and `.env` via dotenvy).

use std::str::FromStr;
use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "sqlite://storefront.db";
const DEFAULT_PORT: u16 = 8083;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_PRODUCTS_PER_PAGE: u32 = 20;
const DEFAULT_RELATED_PER_PAGE: u32 = 4;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub port: u16,
    pub nats_url: Option<String>,
    pub currency: String,
    pub products_per_page: u32,
    pub related_per_page: u32,
    /// Admin routes answer 403 while this is unset.
    pub admin_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            port: DEFAULT_PORT,
            nats_url: None,
            currency: DEFAULT_CURRENCY.to_string(),
            products_per_page: DEFAULT_PRODUCTS_PER_PAGE,
            related_per_page: DEFAULT_RELATED_PER_PAGE,
            admin_token: None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} has invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();
        let products_per_page = parse_or(get("PRODUCTS_PER_PAGE"), "PRODUCTS_PER_PAGE", defaults.products_per_page)?;
        let related_per_page = parse_or(get("RELATED_PER_PAGE"), "RELATED_PER_PAGE", defaults.related_per_page)?;
        if products_per_page == 0 {
            return Err(ConfigError::Invalid { key: "PRODUCTS_PER_PAGE", value: "0".into() });
        }
        if related_per_page == 0 {
            return Err(ConfigError::Invalid { key: "RELATED_PER_PAGE", value: "0".into() });
        }
        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: parse_or(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", defaults.max_connections)?,
            port: parse_or(get("PORT"), "PORT", defaults.port)?,
            nats_url: get("NATS_URL"),
            currency: get("STORE_CURRENCY").map(|c| c.to_uppercase()).unwrap_or(defaults.currency),
            products_per_page,
            related_per_page,
            admin_token: get("ADMIN_TOKEN"),
        })
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
    }
}
