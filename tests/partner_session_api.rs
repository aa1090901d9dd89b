//! End-to-end tests for the partner session endpoint, driven through the
//! assembled router with an in-memory store and a manual clock.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use partner_session::{
    app::{self, AppState, SESSION_PATH},
    clock::ManualClock,
    config::Config,
    models::access_code::AccessCode,
    services::session_service::SessionService,
    store::MemoryStore,
};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

fn test_config(trust_forwarded_headers: bool) -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        server_port: 0,
        cors_allowed_origins: None,
        trust_forwarded_headers,
        expiry_sweep_interval_secs: None,
    }
}

fn usum25() -> AccessCode {
    AccessCode {
        id: Uuid::new_v4(),
        code: "USUM25".to_string(),
        partner_id: Uuid::new_v4(),
        module_id: Some("mod-js-101".to_string()),
        activity_duration_minutes: 60,
        max_uses: 100,
        current_uses: 0,
        is_active: true,
        expires_at: Some(Utc::now() + Duration::days(30)),
    }
}

fn setup() -> (Router, MemoryStore, ManualClock) {
    let store = MemoryStore::new();
    store.insert_code(usum25());

    let clock = ManualClock::new(Utc::now());
    let service = SessionService::new(store.clone(), Arc::new(clock.clone()));
    let router = app::router(AppState::new(service), &test_config(true));

    (router, store, clock)
}

async fn post(router: &Router, forwarded_for: Option<&str>, body: Value) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri(SESSION_PATH)
        .header("content-type", "application/json");
    if let Some(address) = forwarded_for {
        request = request.header("x-forwarded-for", address);
    }

    let response = router
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn activate_check_and_expire() {
    let (router, store, clock) = setup();

    let (status, body) = post(
        &router,
        Some("1.2.3.4"),
        json!({"action": "activate", "code": "USUM25", "module_id": "mod-js-101"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body.get("already_active").is_none());
    assert_eq!(body["session"]["activity_duration_minutes"], 60);
    assert_eq!(body["session"]["module_id"], "mod-js-101");
    assert!(body["session"].get("ip_address").is_none());
    assert_eq!(store.code("USUM25").unwrap().current_uses, 1);
    let session_id = body["session"]["id"].clone();

    let (status, body) = post(&router, Some("1.2.3.4"), json!({"action": "check"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], true);
    assert_eq!(body["session"]["id"], session_id);

    clock.advance(Duration::minutes(61));

    let (status, body) = post(&router, Some("1.2.3.4"), json!({"action": "check"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"active": false}));
}

#[tokio::test]
async fn repeated_check_returns_identical_data() {
    let (router, _store, _clock) = setup();
    post(
        &router,
        Some("1.2.3.4"),
        json!({"action": "activate", "code": "usum25"}),
    )
    .await;

    let (_, first) = post(&router, Some("1.2.3.4"), json!({"action": "check"})).await;
    let (_, second) = post(&router, Some("1.2.3.4"), json!({"action": "check"})).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn second_activation_reports_already_active() {
    let (router, store, _clock) = setup();
    let activate = json!({"action": "activate", "code": "USUM25"});

    let (_, first) = post(&router, Some("1.2.3.4"), activate.clone()).await;
    let (status, second) = post(&router, Some("1.2.3.4"), activate).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["success"], true);
    assert_eq!(second["already_active"], true);
    assert_eq!(second["session"]["id"], first["session"]["id"]);
    assert_eq!(store.code("USUM25").unwrap().current_uses, 1);
}

#[tokio::test]
async fn concurrent_activations_create_one_session() {
    let (router, store, _clock) = setup();

    let requests = (0..12).map(|_| {
        let router = router.clone();
        async move {
            post(
                &router,
                Some("1.2.3.4"),
                json!({"action": "activate", "code": "USUM25"}),
            )
            .await
        }
    });
    let handles: Vec<_> = requests.map(tokio::spawn).collect();

    for handle in handles {
        let (status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    assert_eq!(store.sessions().len(), 1);
    assert_eq!(store.code("USUM25").unwrap().current_uses, 1);
}

#[tokio::test]
async fn used_code_is_denied_after_expiry() {
    let (router, _store, clock) = setup();
    let activate = json!({"action": "activate", "code": "USUM25"});

    post(&router, Some("1.2.3.4"), activate.clone()).await;
    clock.advance(Duration::minutes(61));

    let (status, body) = post(&router, Some("1.2.3.4"), activate).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("already been used on this device")
    );
}

#[tokio::test]
async fn business_denials_are_bad_requests() {
    let (router, _store, _clock) = setup();

    let (status, body) = post(
        &router,
        Some("1.2.3.4"),
        json!({"action": "activate", "code": "USUM25", "module_id": "mod-py-201"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "This access code is not valid for this module");

    let (status, body) = post(
        &router,
        Some("1.2.3.4"),
        json!({"action": "activate", "code": "MISSING"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid access code");
}

#[tokio::test]
async fn malformed_requests_are_rejected() {
    let (router, store, _clock) = setup();

    let (status, body) = post(&router, Some("1.2.3.4"), json!({"action": "activate"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Access code is required");

    let (status, body) = post(&router, Some("1.2.3.4"), json!({"action": "extend"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    assert!(store.sessions().is_empty());
}

#[tokio::test]
async fn requests_without_an_address_are_rejected() {
    let (router, _store, _clock) = setup();

    let (status, body) = post(&router, None, json!({"action": "check"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unable to determine client address");
}

#[tokio::test]
async fn sessions_are_bound_to_the_requesting_address() {
    let (router, _store, _clock) = setup();
    post(
        &router,
        Some("1.2.3.4"),
        json!({"action": "activate", "code": "USUM25"}),
    )
    .await;

    let (_, body) = post(&router, Some("5.6.7.8"), json!({"action": "check"})).await;

    assert_eq!(body, json!({"active": false}));
}

#[tokio::test]
async fn health_reports_connected_store() {
    let (router, _store, _clock) = setup();

    let response = router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}
