//! HTTP middleware components.
//!
//! Middleware run before route handlers and can enrich the request
//! (e.g. with the resolved requester) or short-circuit it.

/// Requester address resolution
pub mod requester;
