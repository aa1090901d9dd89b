//! Access code registry model and redeem result types.
//!
//! This module defines:
//! - `AccessCode`: a redeemable partner code as stored in the registry
//! - `RedeemedCode` / `RedeemRejection`: the strict result of a redeem attempt
//! - Input normalisation for codes and module ids

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;

/// Longest code accepted before it reaches the registry.
pub const MAX_CODE_LEN: usize = 64;

pub const MAX_MODULE_ID_LEN: usize = 128;

/// Represents an access code record from the registry.
///
/// # Database Table
///
/// Maps to the `access_codes` table. Codes are matched case-insensitively
/// and stored upper-cased.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccessCode {
    pub id: Uuid,

    /// The redeemable token
    pub code: String,

    /// Partner that issued the code
    pub partner_id: Uuid,

    /// Module the code is restricted to
    ///
    /// NULL means the code unlocks every module.
    pub module_id: Option<String>,

    /// Length of the access window granted per activation
    pub activity_duration_minutes: i32,

    pub max_uses: i32,

    pub current_uses: i32,

    /// Partners can switch a code off without deleting it
    pub is_active: bool,

    /// After this instant the code can no longer be redeemed
    ///
    /// NULL means the code never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

/// What a successful redemption hands back to the session service.
///
/// The duration is captured here so later edits to the code never change
/// an existing grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemedCode {
    pub code: String,
    pub partner_id: Uuid,
    pub module_id: Option<String>,
    pub activity_duration_minutes: i32,
}

/// Why the registry refused to redeem a code.
///
/// The messages are shown to end users as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RedeemRejection {
    #[error("Invalid access code")]
    NotFound,

    #[error("This access code is no longer active")]
    Inactive,

    #[error("This access code has expired")]
    Expired,

    #[error("This access code has reached its maximum number of uses")]
    Exhausted,

    #[error("This access code is not valid for this module")]
    WrongModule,
}

impl RedeemRejection {
    pub fn kind(&self) -> &'static str {
        match self {
            RedeemRejection::NotFound => "code_not_found",
            RedeemRejection::Inactive => "code_inactive",
            RedeemRejection::Expired => "code_expired",
            RedeemRejection::Exhausted => "code_exhausted",
            RedeemRejection::WrongModule => "code_wrong_module",
        }
    }
}

impl AccessCode {
    /// Decide whether this code may be redeemed right now for `module_id`.
    ///
    /// Does not touch `current_uses`; the store increments it in the same
    /// atomic step that records the session.
    pub fn check_redeemable(
        &self,
        module_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RedeemedCode, RedeemRejection> {
        if !self.is_active {
            return Err(RedeemRejection::Inactive);
        }

        if let Some(expires_at) = self.expires_at {
            if now >= expires_at {
                return Err(RedeemRejection::Expired);
            }
        }

        if self.current_uses >= self.max_uses {
            return Err(RedeemRejection::Exhausted);
        }

        if let (Some(scope), Some(requested)) = (self.module_id.as_deref(), module_id) {
            if scope != requested {
                return Err(RedeemRejection::WrongModule);
            }
        }

        Ok(RedeemedCode {
            code: self.code.clone(),
            partner_id: self.partner_id,
            module_id: self.module_id.clone(),
            activity_duration_minutes: self.activity_duration_minutes,
        })
    }
}

/// Canonical form of a user-typed code: trimmed and upper-cased.
///
/// # Errors
///
/// `InvalidRequest` if the code is empty, too long, or contains characters
/// other than ASCII letters, digits, `-` and `_`.
pub fn normalize_code(raw: &str) -> Result<String, AppError> {
    let code = raw.trim();

    if code.is_empty() {
        return Err(AppError::InvalidRequest(
            "Access code is required".to_string(),
        ));
    }

    if code.len() > MAX_CODE_LEN {
        return Err(AppError::InvalidRequest(
            "Access code is too long".to_string(),
        ));
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::InvalidRequest(
            "Access code contains invalid characters".to_string(),
        ));
    }

    Ok(code.to_ascii_uppercase())
}

/// Blank module ids mean "no specific module".
pub fn normalize_module_id(raw: Option<&str>) -> Result<Option<String>, AppError> {
    let Some(module_id) = raw.map(str::trim).filter(|m| !m.is_empty()) else {
        return Ok(None);
    };

    if module_id.len() > MAX_MODULE_ID_LEN {
        return Err(AppError::InvalidRequest(
            "Module id is too long".to_string(),
        ));
    }

    Ok(Some(module_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn code(module_id: Option<&str>) -> AccessCode {
        AccessCode {
            id: Uuid::new_v4(),
            code: "USUM25".to_string(),
            partner_id: Uuid::new_v4(),
            module_id: module_id.map(String::from),
            activity_duration_minutes: 60,
            max_uses: 2,
            current_uses: 0,
            is_active: true,
            expires_at: Some(Utc::now() + Duration::days(30)),
        }
    }

    #[test]
    fn redeemable_code_reports_its_grant() {
        let access_code = code(Some("mod-js-101"));
        let redeemed = access_code
            .check_redeemable(Some("mod-js-101"), Utc::now())
            .unwrap();

        assert_eq!(redeemed.code, "USUM25");
        assert_eq!(redeemed.partner_id, access_code.partner_id);
        assert_eq!(redeemed.module_id.as_deref(), Some("mod-js-101"));
        assert_eq!(redeemed.activity_duration_minutes, 60);
    }

    #[test]
    fn exhausted_code_is_rejected() {
        let mut access_code = code(None);
        access_code.current_uses = 2;

        assert_eq!(
            access_code.check_redeemable(None, Utc::now()),
            Err(RedeemRejection::Exhausted)
        );
    }

    #[test]
    fn code_expiry_is_exclusive() {
        let access_code = code(None);
        let expires_at = access_code.expires_at.unwrap();

        assert!(
            access_code
                .check_redeemable(None, expires_at - Duration::seconds(1))
                .is_ok()
        );
        assert_eq!(
            access_code.check_redeemable(None, expires_at),
            Err(RedeemRejection::Expired)
        );
    }

    #[test]
    fn code_without_expiry_never_expires() {
        let mut access_code = code(None);
        access_code.expires_at = None;

        assert!(
            access_code
                .check_redeemable(None, Utc::now() + Duration::days(3650))
                .is_ok()
        );
    }

    #[test]
    fn deactivated_code_is_rejected() {
        let mut access_code = code(None);
        access_code.is_active = false;

        assert_eq!(
            access_code.check_redeemable(None, Utc::now()),
            Err(RedeemRejection::Inactive)
        );
    }

    #[test]
    fn module_scoped_code_only_matches_its_module() {
        let access_code = code(Some("mod-js-101"));

        assert_eq!(
            access_code.check_redeemable(Some("mod-py-201"), Utc::now()),
            Err(RedeemRejection::WrongModule)
        );
        // No specific module requested: the session stays scoped to the code's module
        assert_eq!(
            access_code
                .check_redeemable(None, Utc::now())
                .unwrap()
                .module_id
                .as_deref(),
            Some("mod-js-101")
        );
        // Unscoped codes fit any module
        assert!(code(None).check_redeemable(Some("mod-py-201"), Utc::now()).is_ok());
    }

    #[test]
    fn codes_are_normalized() {
        assert_eq!(normalize_code("  usum25 ").unwrap(), "USUM25");
        assert_eq!(normalize_code("Partner_2025-a").unwrap(), "PARTNER_2025-A");
    }

    #[test]
    fn malformed_codes_are_rejected() {
        let too_long = "X".repeat(MAX_CODE_LEN + 1);
        for raw in ["", "   ", "has space", "semi;colon", too_long.as_str()] {
            assert!(
                matches!(normalize_code(raw), Err(AppError::InvalidRequest(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn blank_module_ids_mean_no_module() {
        assert_eq!(normalize_module_id(None).unwrap(), None);
        assert_eq!(normalize_module_id(Some("  ")).unwrap(), None);
        assert_eq!(
            normalize_module_id(Some(" mod-js-101 ")).unwrap().as_deref(),
            Some("mod-js-101")
        );
        assert!(normalize_module_id(Some(&"m".repeat(MAX_MODULE_ID_LEN + 1))).is_err());
    }
}
