//! Router assembly.
//!
//! Public routes (`/health`) and the session endpoint share one state; the
//! session endpoint additionally runs the requester middleware.

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::Config,
    handlers,
    middleware::requester::{AddressPolicy, resolve_requester},
    services::session_service::SessionService,
    store::AccessStore,
};

pub const SESSION_PATH: &str = "/api/v1/partner-session";

/// State shared with every handler.
pub struct AppState<S> {
    pub service: Arc<SessionService<S>>,
}

impl<S> AppState<S> {
    pub fn new(service: SessionService<S>) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

/// Build the HTTP router.
pub fn router<S: AccessStore + 'static>(state: AppState<S>, config: &Config) -> Router {
    let policy = AddressPolicy {
        trust_forwarded_headers: config.trust_forwarded_headers,
    };

    let session_routes = Router::new()
        .route(SESSION_PATH, post(handlers::partner_session::partner_session::<S>))
        // Every session request needs a resolved requester
        .route_layer(axum_middleware::from_fn_with_state(policy, resolve_requester));

    Router::new()
        .route("/health", get(handlers::health::health_check::<S>))
        .merge(session_routes)
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Browser callers hit the endpoint cross-origin, so preflights must pass.
fn cors_layer(config: &Config) -> CorsLayer {
    let origin = match config.allowed_origins() {
        None => AllowOrigin::from(Any),
        Some(origins) => AllowOrigin::list(origins.iter().filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|_| tracing::warn!(%origin, "Ignoring invalid CORS origin"))
                .ok()
        })),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-client-info"),
        ])
}
