//! Access session models.
//!
//! This module defines:
//! - `AccessSession`: one row per successful activation
//! - `SessionView`: the public session shape shared by the server response,
//!   the client hook and its local mirror
//! - Helpers for expiry, module scoping and countdown formatting

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::access_code::RedeemedCode;

/// Represents an access session record from the database.
///
/// # Database Table
///
/// Maps to the `access_sessions` table. Each session:
/// - Is bound to the requester's network address at activation time
/// - Copies partner, module and duration from the redeemed code
/// - Has a fixed `expires_at` that is never extended
///
/// Rows are never deleted; an expired row still proves the address has
/// used its code.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AccessSession {
    pub id: Uuid,

    /// Requester address the grant is bound to
    pub ip_address: String,

    /// Normalised code redeemed to create this session
    pub code: String,

    pub partner_id: Uuid,

    /// NULL grants access to every module
    pub module_id: Option<String>,

    pub activity_duration_minutes: i32,

    pub started_at: DateTime<Utc>,

    /// `started_at + activity_duration_minutes`
    pub expires_at: DateTime<Utc>,

    /// Flipped to false by the expiry sweep
    pub is_active: bool,
}

impl AccessSession {
    /// Build the session granted by a redemption that happened at `now`.
    pub fn from_redemption(ip_address: &str, redeemed: RedeemedCode, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            ip_address: ip_address.to_string(),
            code: redeemed.code,
            partner_id: redeemed.partner_id,
            module_id: redeemed.module_id,
            activity_duration_minutes: redeemed.activity_duration_minutes,
            started_at: now,
            expires_at: now + Duration::minutes(i64::from(redeemed.activity_duration_minutes)),
            is_active: true,
        }
    }

    /// Whether this row still grants access at `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }
}

/// Public fields of a session.
///
/// This is the `session` object on the wire and the JSON stored in the
/// client's local mirror. The requester address is deliberately absent.
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "code": "USUM25",
///   "partner_id": "7d0c2d4e-5f7e-4bb8-9b62-2f1f5f0c9a11",
///   "module_id": "mod-js-101",
///   "activity_duration_minutes": 60,
///   "started_at": "2025-06-01T10:00:00Z",
///   "expires_at": "2025-06-01T11:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub id: Uuid,
    pub code: String,
    pub partner_id: Uuid,
    pub module_id: Option<String>,
    pub activity_duration_minutes: i32,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<AccessSession> for SessionView {
    fn from(session: AccessSession) -> Self {
        Self {
            id: session.id,
            code: session.code,
            partner_id: session.partner_id,
            module_id: session.module_id,
            activity_duration_minutes: session.activity_duration_minutes,
            started_at: session.started_at,
            expires_at: session.expires_at,
        }
    }
}

impl SessionView {
    /// Expiry is exclusive: at `expires_at` the grant is over.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Whole seconds left, rounded up, so the value only reaches zero once
    /// the session has actually expired.
    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.expires_at - now).num_milliseconds();
        if millis <= 0 {
            return 0;
        }
        (millis as u64).div_ceil(1000)
    }

    /// Module scoping, ignoring expiry.
    ///
    /// Unscoped sessions cover every module; a request for no particular
    /// module is covered by any session.
    pub fn covers_module(&self, module_id: Option<&str>) -> bool {
        match (self.module_id.as_deref(), module_id) {
            (None, _) | (_, None) => true,
            (Some(scope), Some(requested)) => scope == requested,
        }
    }
}

/// Render a countdown as `H:MM:SS` from one hour up, `M:SS` below.
pub fn format_countdown(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}
