//! Business logic services.
//!
//! Services hold the session invariants, separated from HTTP handlers and
//! from the store that persists them.

pub mod session_service;
