//! In-memory storage backend.
//!
//! Provides a thread-safe, non-persistent repository for tests and local
//! development, plus the process-local annotation store.

mod annotations;
mod repository;

pub use annotations::InMemoryAnnotations;
pub use repository::InMemoryRepository;
