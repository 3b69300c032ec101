/// Configuration management for the API server
///
/// This module loads configuration from environment variables (and a `.env`
/// file when present) and provides a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 3000)
/// - `CORS_ORIGINS`: Comma-separated allowed origins (default: *)
/// - `PRODUCTION`: Enables HSTS (default: false)
/// - `STORE_BACKEND`: `postgres` or `memory` (default: postgres)
/// - `DATABASE_HOST`, `DATABASE_PORT`, `DATABASE_USER`, `DATABASE_PASSWORD`,
///   `DATABASE_NAME`: store connection parameters
/// - `DATABASE_MAX_CONNECTIONS` (10), `DATABASE_MIN_CONNECTIONS` (1),
///   `DATABASE_ACQUIRE_TIMEOUT_SECONDS` (30), `DATABASE_ACQUIRE_POLICY` (wait),
///   `DATABASE_IDLE_TIMEOUT_SECONDS` (600), `DATABASE_MAX_LIFETIME_SECONDS` (1800),
///   `DATABASE_TEST_BEFORE_ACQUIRE` (true): pool tuning
/// - `LOG_FORMAT`: `pretty` or `json` (default: pretty)
/// - `RUST_LOG`: Log filter
///
/// # Example
///
/// ```no_run
/// use rowgate_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use rowgate_shared::db::pool::{AcquirePolicy, DatabaseConfig};
use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Which store implementation serves requests
    pub backend: StoreBackend,

    /// Connection pool and store connection parameters
    pub database: DatabaseConfig,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (enables HSTS)
    pub production: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: vec!["*".to_string()],
            production: false,
        }
    }
}

/// Store implementation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreBackend {
    /// PostgreSQL server
    #[default]
    Postgres,

    /// In-process store; data does not survive a restart
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!(
                "unknown store backend '{}', expected 'postgres' or 'memory'",
                other
            )),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

impl LogFormat {
    /// Reads `LOG_FORMAT`, defaulting to pretty output
    pub fn from_env() -> anyhow::Result<Self> {
        parse_or(&|key: &str| env::var(key).ok(), "LOG_FORMAT", LogFormat::Pretty)
    }
}

/// Parses `key` if set, otherwise returns `default`
fn parse_or<T, F>(get: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        _ => Ok(default),
    }
}

/// Parses an optional duration in seconds where `0` means disabled
fn parse_optional_seconds<F>(get: &F, key: &str, default: u64) -> anyhow::Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    let seconds: u64 = parse_or(get, key, default)?;
    Ok((seconds > 0).then_some(seconds))
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key: &str| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup
    ///
    /// `from_env` uses the process environment; tests pass a map.
    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ApiConfig::default();
        let api = ApiConfig {
            host: get("API_HOST").unwrap_or(defaults.host),
            port: parse_or(&get, "API_PORT", defaults.port)?,
            cors_origins: get("CORS_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|origin| origin.trim().to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            production: parse_or(&get, "PRODUCTION", defaults.production)?,
        };

        let backend: StoreBackend = parse_or(&get, "STORE_BACKEND", StoreBackend::Postgres)?;

        let pool_defaults = DatabaseConfig::default();
        let database_name = get("DATABASE_NAME").unwrap_or_default();
        if backend == StoreBackend::Postgres && database_name.trim().is_empty() {
            anyhow::bail!("DATABASE_NAME environment variable is required");
        }

        let max_connections: u32 =
            parse_or(&get, "DATABASE_MAX_CONNECTIONS", pool_defaults.max_connections)?;
        if max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be at least 1");
        }

        let min_connections: u32 =
            parse_or(&get, "DATABASE_MIN_CONNECTIONS", pool_defaults.min_connections)?;
        if min_connections > max_connections {
            anyhow::bail!(
                "DATABASE_MIN_CONNECTIONS ({}) cannot exceed DATABASE_MAX_CONNECTIONS ({})",
                min_connections,
                max_connections
            );
        }

        let database = DatabaseConfig {
            host: get("DATABASE_HOST").unwrap_or(pool_defaults.host),
            port: parse_or(&get, "DATABASE_PORT", pool_defaults.port)?,
            username: get("DATABASE_USER").unwrap_or(pool_defaults.username),
            password: get("DATABASE_PASSWORD").filter(|password| !password.is_empty()),
            database: database_name,
            max_connections,
            min_connections,
            acquire_timeout_seconds: parse_or(
                &get,
                "DATABASE_ACQUIRE_TIMEOUT_SECONDS",
                pool_defaults.acquire_timeout_seconds,
            )?,
            acquire_policy: parse_or::<AcquirePolicy, _>(
                &get,
                "DATABASE_ACQUIRE_POLICY",
                pool_defaults.acquire_policy,
            )?,
            idle_timeout_seconds: parse_optional_seconds(&get, "DATABASE_IDLE_TIMEOUT_SECONDS", 600)?,
            max_lifetime_seconds: parse_optional_seconds(&get, "DATABASE_MAX_LIFETIME_SECONDS", 1800)?,
            test_before_acquire: parse_or(
                &get,
                "DATABASE_TEST_BEFORE_ACQUIRE",
                pool_defaults.test_before_acquire,
            )?,
        };

        Ok(Self {
            api,
            backend,
            database,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
