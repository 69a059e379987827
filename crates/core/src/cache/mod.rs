mod error;
mod invalidation;
mod keys;
mod patterns;
mod serialization;
mod traits;
mod ttl;

pub use error::{CacheError, Result};
pub use invalidation::{InvalidationSet, Mutation};
pub use keys::{canonical_query, KeySpace};
pub use patterns::pattern_matches;
pub use serialization::{decode, encode, SerializationError};
pub use traits::Cache;
pub use ttl::{CacheTtls, TtlTier, DEFAULT_ENTITY_TTL, DEFAULT_LIST_TTL, DEFAULT_SOCIAL_TTL};
