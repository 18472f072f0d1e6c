//! Caching subsystem.
//!
//! [`response::ResponseCache`] holds tool results keyed on a digest of
//! (tool name, arguments). It is owned by the
//! [`CachingMiddleware`](crate::middleware::CachingMiddleware) stage and
//! consulted only after the outer stages (logging, timing, rate limiting,
//! retry) have run. See [`response`] module docs for expiry and capacity
//! semantics.

pub mod response;

pub use response::{CacheConfig, CacheKey, CacheStats, ResponseCache};
