//! Application configuration
//!
//! Settings come from the process environment, optionally seeded from a `.env`
//! file. Every key has a default so a bare environment still produces a usable
//! configuration for local runs.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use log::warn;

use crate::api::resilience::RateLimitConfig;

/// Default number of records per SQL transaction
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default HTTP progress cadence (records between progress lines)
pub const DEFAULT_PROGRESS_INTERVAL: usize = 100;

/// Connection parameters for the relational backend
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    /// Full connection URL; wins over the individual fields when set
    pub url: Option<String>,
}

/// Settings for the HTTP backend
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub rate_limit: RateLimitConfig,
    /// Log a progress line every N records
    pub progress_interval: usize,
    pub timeout: Duration,
    /// Select the HTTP backend instead of the database
    pub use_api: bool,
}

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db: DatabaseConfig,
    pub api: ApiConfig,
    /// Records per transaction for the relational backend
    pub batch_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "your-password".to_string(),
            dbname: "your-database".to_string(),
            url: None,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            rate_limit: RateLimitConfig::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            timeout: Duration::from_secs(30),
            use_api: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db: DatabaseConfig::default(),
            api: ApiConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl DatabaseConfig {
    /// Connection URL for sqlx
    pub fn connection_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "postgres://{}:{}@{}:{}/{}?sslmode=disable",
                urlencoding::encode(&self.user),
                urlencoding::encode(&self.password),
                self.host,
                self.port,
                urlencoding::encode(&self.dbname)
            ),
        }
    }
}

impl AppConfig {
    /// Load `.env` (if present) and read the configuration from the environment
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();
        let string = |key: &str, fallback: &str| lookup(key).unwrap_or_else(|| fallback.to_string());

        let rate_per_second: u32 = parse_or(&lookup, "API_RATE_LIMIT", 60);

        let config = AppConfig {
            db: DatabaseConfig {
                host: string("DB_HOST", &defaults.db.host),
                port: parse_or(&lookup, "DB_PORT", defaults.db.port),
                user: string("DB_USER", &defaults.db.user),
                password: string("DB_PASSWORD", &defaults.db.password),
                dbname: string("DB_NAME", &defaults.db.dbname),
                url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
            },
            api: ApiConfig {
                base_url: string("API_BASE_URL", "").trim_end_matches('/').to_string(),
                api_key: string("API_KEY", ""),
                rate_limit: RateLimitConfig::per_second(rate_per_second),
                progress_interval: parse_or(
                    &lookup,
                    "API_PROGRESS_INTERVAL",
                    defaults.api.progress_interval,
                ),
                timeout: Duration::from_secs(parse_or(&lookup, "API_TIMEOUT_SECS", 30)),
                use_api: parse_bool_or(&lookup, "USE_API", false),
            },
            batch_size: parse_or(&lookup, "BATCH_SIZE", defaults.batch_size),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the selected backend unusable
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            anyhow::bail!("BATCH_SIZE must be greater than zero");
        }
        if self.api.progress_interval == 0 {
            anyhow::bail!("API_PROGRESS_INTERVAL must be greater than zero");
        }
        if self.api.use_api && self.api.base_url.is_empty() {
            anyhow::bail!("USE_API is set but API_BASE_URL is empty");
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, fallback: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring invalid value {:?} for {}, using default", raw, key);
                fallback
            }
        },
        None => fallback,
    }
}

fn parse_bool_or<F>(lookup: &F, key: &str, fallback: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "t" | "true" | "yes" | "on" => true,
            "0" | "f" | "false" | "no" | "off" => false,
            _ => {
                warn!("Ignoring invalid value {:?} for {}, using default", raw, key);
                fallback
            }
        },
        None => fallback,
    }
}
