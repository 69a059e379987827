use std::{env, fmt, str::FromStr, time::Duration};

use lexikon_core::cache::CacheTtls;

/// Which repository implementation to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StorageBackend {
    Memory,
    Sqlite,
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "inmemory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(format!("Unknown storage backend: {other}")),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CacheBackend {
    Memory,
    Redis,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(format!("Unknown cache backend: {other}")),
        }
    }
}

/// Connection settings for PostgreSQL.
#[derive(Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Maximum open connections in the pool.
    pub max_open: u32,
    /// Connections kept open while idle.
    pub max_idle: u32,
    /// Connections are recycled after this long.
    pub max_lifetime: Duration,
}

impl PostgresConfig {
    /// Connection URL, password included.
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

// The password never reaches logs
impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("max_open", &self.max_open)
            .field("max_idle", &self.max_idle)
            .field("max_lifetime", &self.max_lifetime)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Path to the SQLite database file; `:memory:` opens a private database.
    pub sqlite_path: String,
    pub postgres: PostgresConfig,
    /// Log every statement the backend executes.
    pub debug: bool,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub redis_url: String,
    pub max_entries: usize,
    pub ttls: CacheTtls,
    /// Upper bound on any single cache call.
    pub op_timeout: Duration,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace prefixed to every cache key (default: "dev").
    pub env: String,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `LEXIKON_ENV` - Cache key namespace (default: "dev")
    /// - `STORAGE_BACKEND` - memory, sqlite or postgres (default: memory)
    /// - `SQLITE_PATH` - SQLite database path (default: "lexikon.db")
    /// - `PG_HOST`, `PG_PORT`, `PG_USER`, `PG_PASSWORD`, `PG_DATABASE` - PostgreSQL connection
    /// - `DB_MAX_OPEN` - Pool size (default: 10)
    /// - `DB_MAX_IDLE` - Idle connections kept (default: 2)
    /// - `DB_MAX_LIFETIME_SECONDS` - Connection lifetime (default: 1800)
    /// - `DB_DEBUG` - Statement logging (default: false)
    /// - `CACHE_BACKEND` - memory or redis (default: memory)
    /// - `REDIS_URL` - Redis connection URL (default: "redis://localhost:6379")
    /// - `CACHE_MAX_ENTRIES` - Maximum in-memory cache entries (default: 10,000)
    /// - `CACHE_ENTITY_TTL_SECONDS`, `CACHE_LIST_TTL_SECONDS`, `CACHE_SOCIAL_TTL_SECONDS` - TTL tiers (300/60/30)
    /// - `CACHE_OP_TIMEOUT_MS` - Per-call cache timeout (default: 250)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let storage = StorageConfig {
            backend: lookup("STORAGE_BACKEND")
                .and_then(|v| v.parse().ok())
                .unwrap_or(StorageBackend::Memory),
            sqlite_path: string("SQLITE_PATH", "lexikon.db"),
            postgres: PostgresConfig {
                host: string("PG_HOST", "localhost"),
                port: parsed("PG_PORT")
                    .and_then(|p| u16::try_from(p).ok())
                    .unwrap_or(5432),
                user: string("PG_USER", "postgres"),
                password: string("PG_PASSWORD", ""),
                database: string("PG_DATABASE", "lexikon"),
                max_open: parsed("DB_MAX_OPEN")
                    .and_then(|v| u32::try_from(v).ok())
                    .filter(|v| *v > 0)
                    .unwrap_or(10),
                max_idle: parsed("DB_MAX_IDLE")
                    .and_then(|v| u32::try_from(v).ok())
                    .unwrap_or(2),
                max_lifetime: Duration::from_secs(
                    parsed("DB_MAX_LIFETIME_SECONDS").unwrap_or(1800),
                ),
            },
            debug: lookup("DB_DEBUG").is_some_and(|v| is_truthy(&v)),
        };

        let cache = CacheConfig {
            backend: lookup("CACHE_BACKEND")
                .and_then(|v| v.parse().ok())
                .unwrap_or(CacheBackend::Memory),
            redis_url: string("REDIS_URL", "redis://localhost:6379"),
            max_entries: parsed("CACHE_MAX_ENTRIES")
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(10_000),
            ttls: CacheTtls::from_secs(
                parsed("CACHE_ENTITY_TTL_SECONDS"),
                parsed("CACHE_LIST_TTL_SECONDS"),
                parsed("CACHE_SOCIAL_TTL_SECONDS"),
            ),
            op_timeout: Duration::from_millis(
                parsed("CACHE_OP_TIMEOUT_MS")
                    .filter(|v| *v > 0)
                    .unwrap_or(250),
            ),
        };

        Self {
            env: string("LEXIKON_ENV", "dev"),
            storage,
            cache,
        }
    }

    /// In-memory storage and cache, for tests.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self::from_lookup(|key| match key {
            "LEXIKON_ENV" => Some("test".to_string()),
            _ => None,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::from_lookup(|_| None);

        assert_eq!(config.env, "dev");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.sqlite_path, "lexikon.db");
        assert_eq!(config.storage.postgres.port, 5432);
        assert_eq!(config.storage.postgres.max_open, 10);
        assert!(!config.storage.debug);
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.cache.redis_url, "redis://localhost:6379");
        assert_eq!(config.cache.max_entries, 10_000);
        assert_eq!(config.cache.ttls, CacheTtls::default());
        assert_eq!(config.cache.op_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_values_from_environment() {
        let config = Config::from_lookup(lookup_from(&[
            ("LEXIKON_ENV", "prod"),
            ("STORAGE_BACKEND", "Postgres"),
            ("PG_HOST", "db.internal"),
            ("PG_PORT", "6543"),
            ("DB_MAX_LIFETIME_SECONDS", "60"),
            ("DB_DEBUG", "true"),
            ("CACHE_BACKEND", "redis"),
            ("CACHE_LIST_TTL_SECONDS", "15"),
        ]));

        assert_eq!(config.env, "prod");
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.storage.postgres.host, "db.internal");
        assert_eq!(config.storage.postgres.port, 6543);
        assert_eq!(config.storage.postgres.max_lifetime, Duration::from_secs(60));
        assert!(config.storage.debug);
        assert_eq!(config.cache.backend, CacheBackend::Redis);
        assert_eq!(config.cache.ttls.list, Duration::from_secs(15));
    }

    #[test]
    fn test_zero_ttl_falls_back_to_default() {
        let config = Config::from_lookup(lookup_from(&[("CACHE_ENTITY_TTL_SECONDS", "0")]));
        assert_eq!(config.cache.ttls.entity, Duration::from_secs(300));
    }

    #[test]
    fn test_unparseable_values_use_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("STORAGE_BACKEND", "mongo"),
            ("PG_PORT", "not-a-port"),
            ("CACHE_OP_TIMEOUT_MS", "0"),
        ]));

        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.postgres.port, 5432);
        assert_eq!(config.cache.op_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_postgres_debug_hides_password() {
        let mut config = Config::from_lookup(|_| None);
        config.storage.postgres.password = "hunter2".to_string();

        assert!(config.storage.postgres.url().contains("hunter2"));
        assert!(!format!("{:?}", config.storage.postgres).contains("hunter2"));
    }
}
