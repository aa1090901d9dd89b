//! Persistence boundary for sessions and the access code registry.
//!
//! The session service only talks to an [`AccessStore`]. The Postgres
//! implementation is what the server runs on; the in-memory one backs
//! tests and local experiments.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::access_code::RedeemRejection;
use crate::models::access_session::AccessSession;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgAccessStore;

/// Everything needed to redeem a code and record the resulting session.
#[derive(Debug, Clone)]
pub struct NewActivation {
    /// Requester address the session is bound to
    pub ip_address: String,
    /// Normalised code
    pub code: String,
    /// Module the requester is trying to open, if any
    pub module_id: Option<String>,
    pub now: DateTime<Utc>,
}

/// Result of an atomic redeem-and-record attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// The code was redeemed and this session recorded.
    Created(AccessSession),
    /// The address gained a live session while we were deciding.
    AlreadyActive(AccessSession),
    /// The address has redeemed this code before.
    AlreadyUsed,
    /// The registry refused the code. Nothing was written.
    Rejected(RedeemRejection),
    /// The insert hit a uniqueness constraint. Nothing was written.
    Conflict,
}

pub trait AccessStore: Send + Sync {
    /// Mark every live row whose `expires_at <= now` as inactive.
    /// Returns how many rows changed.
    fn deactivate_expired(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Most recent active, unexpired session for the address.
    fn find_active_session(
        &self,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<AccessSession>, AppError>> + Send;

    /// Whether the address has ever activated this code, expired or not.
    fn has_redeemed(
        &self,
        ip_address: &str,
        code: &str,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Redeem the code against the registry and insert the session as one
    /// atomic step. Either both happen or neither does.
    fn activate(
        &self,
        activation: NewActivation,
    ) -> impl Future<Output = Result<ActivationOutcome, AppError>> + Send;

    /// Cheap connectivity check for the health endpoint.
    fn ping(&self) -> impl Future<Output = Result<(), AppError>> + Send;
}
