//! Functional core for lexikon.
//!
//! Pure domain types, the repository and cache contracts, cache key design
//! and the invalidation policy. Nothing in this crate performs I/O on its
//! own; backends live in the `lexikon` crate.

pub mod cache;
pub mod dictionary;
pub mod storage;
