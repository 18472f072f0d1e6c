//! Client for the upstream R2R REST API.
//!
//! Provides [`R2rClient`], which issues one JSON request per call with
//! bearer-token auth and a fixed timeout. Retries are not handled here;
//! see [`RetryMiddleware`](crate::middleware::RetryMiddleware).

mod upstream;

pub use upstream::{Method, R2rClient};
