//! Request-scoped context module.
//!
//! Provides the `RequestContext` extractor that bundles request-scoped state
//! (acting user, request id) to complement application-scoped `AppState`.

mod extractor;
mod types;

pub use types::{RequestContext, RequestError, RequestId};
