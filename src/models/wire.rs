//! Request and response bodies of the partner session endpoint.
//!
//! A single endpoint serves both operations; the `action` field selects
//! which one runs.

use serde::{Deserialize, Serialize};

use crate::models::access_session::SessionView;

/// Request body.
///
/// ```json
/// {"action": "check"}
/// {"action": "activate", "code": "USUM25", "module_id": "mod-js-101"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SessionRequest {
    Check,
    Activate {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        module_id: Option<String>,
    },
}

/// Response to `check`.
///
/// `{"active": false}` or `{"active": true, "session": {...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionView>,
}

impl CheckResponse {
    pub fn inactive() -> Self {
        Self {
            active: false,
            session: None,
        }
    }

    pub fn active(session: SessionView) -> Self {
        Self {
            active: true,
            session: Some(session),
        }
    }
}

/// Response to `activate`.
///
/// Failures use the same shape with `success: false` and an `error` string,
/// which is also what every server error renders as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateResponse {
    pub success: bool,

    /// Set when a valid session already existed and nothing was redeemed
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub already_active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionView>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActivateResponse {
    pub fn created(session: SessionView) -> Self {
        Self {
            success: true,
            already_active: false,
            session: Some(session),
            error: None,
        }
    }

    pub fn already_active(session: SessionView) -> Self {
        Self {
            success: true,
            already_active: true,
            session: Some(session),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_are_selected_by_action() {
        let check: SessionRequest = serde_json::from_value(json!({"action": "check"})).unwrap();
        assert_eq!(check, SessionRequest::Check);

        let activate: SessionRequest = serde_json::from_value(json!({
            "action": "activate",
            "code": "usum25",
            "module_id": "mod-js-101"
        }))
        .unwrap();
        assert_eq!(
            activate,
            SessionRequest::Activate {
                code: Some("usum25".to_string()),
                module_id: Some("mod-js-101".to_string()),
            }
        );

        assert!(serde_json::from_value::<SessionRequest>(json!({"action": "extend"})).is_err());
    }

    #[test]
    fn inactive_check_has_no_session_field() {
        let body = serde_json::to_value(CheckResponse::inactive()).unwrap();
        assert_eq!(body, json!({"active": false}));
    }

    #[test]
    fn failure_body_parses_as_activate_response() {
        let body: ActivateResponse = serde_json::from_value(json!({
            "success": false,
            "error": "Invalid access code"
        }))
        .unwrap();

        assert!(!body.success);
        assert!(!body.already_active);
        assert_eq!(body.error.as_deref(), Some("Invalid access code"));
    }
}
