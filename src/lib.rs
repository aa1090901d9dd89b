//! Partner access sessions.
//!
//! Temporary, code-based content access for an education platform. A
//! partner hands out access codes; redeeming one grants the requester's
//! network address a time-boxed session, optionally scoped to one module.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum, one action-dispatched endpoint plus `/health`
//! - **Database**: PostgreSQL with sqlx; an in-memory store for tests
//! - **Client**: [`client::AccessSessionHook`] talks to the endpoint with
//!   reqwest, mirrors the session locally and drives a countdown
//! - **Format**: JSON requests/responses

pub mod app;
pub mod client;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
