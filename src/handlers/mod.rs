//! HTTP request handlers (route handlers).
//!
//! Handlers extract the request, call the session service and turn its
//! result into a JSON response.

/// Service health endpoint
pub mod health;
/// Check / activate endpoint
pub mod partner_session;
