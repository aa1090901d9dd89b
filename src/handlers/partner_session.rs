//! Partner session HTTP handler.
//!
//! One endpoint, two operations, selected by the `action` field:
//! - `{"action": "check"}` - is there a live session for this requester?
//! - `{"action": "activate", "code": "...", "module_id": "..."}` - redeem a code

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};

use crate::{
    app::AppState,
    error::AppError,
    middleware::requester::Requester,
    models::wire::{ActivateResponse, CheckResponse, SessionRequest},
    services::session_service::Activation,
    store::AccessStore,
};

/// Dispatch a session request.
///
/// # Endpoint
///
/// `POST /api/v1/partner-session`
///
/// # Responses
///
/// Check (200 OK):
///
/// ```json
/// {"active": false}
/// {"active": true, "session": {"id": "...", "code": "USUM25", "expires_at": "..."}}
/// ```
///
/// Activate (200 OK):
///
/// ```json
/// {"success": true, "session": {...}}
/// {"success": true, "already_active": true, "session": {...}}
/// ```
///
/// Failures (400 for validation and business denials, 500 otherwise):
///
/// ```json
/// {"success": false, "error": "This access code has expired"}
/// ```
///
/// The requester address comes from the `Requester` extension set by the
/// requester middleware, never from the body.
pub async fn partner_session<S: AccessStore + 'static>(
    State(state): State<AppState<S>>,
    Extension(requester): Extension<Requester>,
    payload: Result<Json<SessionRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected session request body");
        AppError::InvalidRequest("Invalid request body".to_string())
    })?;

    match request {
        SessionRequest::Check => {
            let body = match state.service.check(requester.address).await? {
                Some(session) => CheckResponse::active(session.into()),
                None => CheckResponse::inactive(),
            };

            Ok(Json(body).into_response())
        }
        SessionRequest::Activate { code, module_id } => {
            let code = code.unwrap_or_default();
            let activation = state
                .service
                .activate(requester.address, &code, module_id.as_deref())
                .await?;

            let body = match activation {
                Activation::Created(session) => ActivateResponse::created(session.into()),
                Activation::AlreadyActive(session) => {
                    ActivateResponse::already_active(session.into())
                }
            };

            Ok(Json(body).into_response())
        }
    }
}
