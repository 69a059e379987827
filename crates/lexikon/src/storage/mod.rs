//! Storage backend implementations.
//!
//! This module provides concrete implementations of the repository traits
//! defined in `lexikon_core::storage`, plus the cache-aside decorators that
//! wrap them. The backend is selected at startup from configuration by
//! [`connect`]; call sites only ever see `dyn DictionaryRepository`.
//!
//! - `memory`: in-process store, data is lost on exit
//! - `sqlite`: embedded single-writer database (`rusqlite` + `tokio-rusqlite`)
//! - `postgres`: PostgreSQL connection pool (`sqlx`)

pub mod cached;
pub mod inmemory;
pub mod postgres;
pub mod sqlite;

use std::sync::Arc;

use anyhow::Context;
use lexikon_core::storage::DictionaryRepository;

use crate::config::{StorageBackend, StorageConfig};

pub use inmemory::{InMemoryAnnotations, InMemoryRepository};
pub use postgres::PostgresRepository;
pub use sqlite::SqliteRepository;

/// Opens the configured repository backend and applies its schema.
pub async fn connect(config: &StorageConfig) -> anyhow::Result<Arc<dyn DictionaryRepository>> {
    let repository: Arc<dyn DictionaryRepository> = match config.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory storage");
            Arc::new(InMemoryRepository::new())
        }
        StorageBackend::Sqlite => {
            tracing::info!(path = %config.sqlite_path, "Opening SQLite storage");
            let repo = SqliteRepository::new(&config.sqlite_path, config.debug)
                .await
                .with_context(|| format!("Failed to open SQLite database at {}", config.sqlite_path))?;
            Arc::new(repo)
        }
        StorageBackend::Postgres => {
            tracing::info!(
                host = %config.postgres.host,
                port = config.postgres.port,
                database = %config.postgres.database,
                "Connecting to PostgreSQL storage"
            );
            let repo = PostgresRepository::connect(&config.postgres, config.debug)
                .await
                .context("Failed to connect to PostgreSQL")?;
            Arc::new(repo)
        }
    };
    Ok(repository)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_connect_memory_backend() {
        let config = Config::for_tests();

        let repo = connect(&config.storage).await.unwrap();

        assert_eq!(repo.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_connect_sqlite_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::for_tests();
        config.storage.backend = StorageBackend::Sqlite;
        config.storage.sqlite_path = dir.path().join("lexikon.db").to_string_lossy().to_string();

        let repo = connect(&config.storage).await.unwrap();

        assert_eq!(repo.backend_name(), "sqlite");
        repo.close().await.unwrap();
    }
}
