//! PostgreSQL storage backend implementation using `sqlx`.

mod conversions;
mod error;
mod repository;
mod schema;

pub use repository::PostgresRepository;
