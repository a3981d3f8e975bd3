//! Integration tests for the HTTP routes, driven through the router directly

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tokio::time::timeout;
use tower::ServiceExt;
use wa_gateway::delegate::{SimulatedConfig, SimulatedDelegate};
use wa_gateway::lifecycle::{EventKind, LifecycleConfig, LifecycleController, LifecycleEvent};
use wa_gateway::server::{create_router, AppState};
use wa_gateway::session::SessionId;

struct TestApp {
    router: Router,
    controller: LifecycleController,
    _sessions: TempDir,
}

fn app_with(qr_delay: Duration, simulation: bool) -> TestApp {
    app_from(
        SimulatedConfig {
            qr_delay,
            ..SimulatedConfig::default()
        },
        simulation,
    )
}

fn app_from(sim: SimulatedConfig, simulation: bool) -> TestApp {
    let sessions = tempdir().unwrap();
    let simulator = Arc::new(SimulatedDelegate::new(sim));
    let controller = LifecycleController::new(LifecycleConfig::new(sessions.path()), simulator.clone());
    let router = create_router(AppState {
        controller: controller.clone(),
        simulator: simulation.then_some(simulator),
    });

    TestApp {
        router,
        controller,
        _sessions: sessions,
    }
}

fn app() -> TestApp {
    app_with(Duration::from_millis(10), true)
}

async fn call(app: &TestApp, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

async fn create(app: &TestApp, id: &str, name: &str) -> SessionId {
    let mut sub = app.controller.subscribe(&[EventKind::Qr]);
    let (status, body) = call(
        app,
        Method::POST,
        "/api/whatsapp/create",
        Some(json!({ "connectionId": id, "name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let id = SessionId::new(id);
    timeout(Duration::from_secs(2), async {
        while let Some(event) = sub.recv().await {
            if matches!(event, LifecycleEvent::Qr { ref connection_id, .. } if *connection_id == id) {
                return;
            }
        }
    })
    .await
    .expect("QR code should be generated");
    id
}

async fn create_paired(app: &TestApp, id: &str) -> SessionId {
    let id = create(app, id, "Paired").await;
    assert!(app.controller.mark_paired(id.as_str(), "+15551234567").await);
    id
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));
}

#[tokio::test]
async fn test_create_with_and_without_id() {
    let app = app();

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/whatsapp/create",
        Some(json!({ "connectionId": "shop-1", "name": "Shop" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["connectionId"], "shop-1");

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/whatsapp/create",
        Some(json!({ "name": "Minted" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["connectionId"].as_str().unwrap().starts_with("wa_"));
}

#[tokio::test]
async fn test_create_errors() {
    let app = app();
    create(&app, "dup", "First").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/whatsapp/create",
        Some(json!({ "connectionId": "dup", "name": "Second" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "duplicate_session");
    assert!(body["error"].as_str().unwrap().contains("dup"));

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/whatsapp/create",
        Some(json!({ "connectionId": "nameless" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn test_qr_before_generation_is_unavailable() {
    let app = app_with(Duration::from_secs(60), true);
    call(
        &app,
        Method::POST,
        "/api/whatsapp/create",
        Some(json!({ "connectionId": "slow", "name": "Slow" })),
    )
    .await;

    let (status, body) = call(&app, Method::GET, "/api/whatsapp/qr/slow", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "qr_unavailable");

    let (status, body) = call(&app, Method::GET, "/api/whatsapp/qr/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn test_qr_formats() {
    let app = app();
    create(&app, "qr", "Qr").await;

    let (status, body) = call(&app, Method::GET, "/api/whatsapp/qr/qr", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["qrCode"]
        .as_str()
        .unwrap()
        .starts_with("data:image/svg+xml;base64,"));

    let (status, body) = call(&app, Method::GET, "/api/whatsapp/qr/qr?format=payload", None).await;
    assert_eq!(status, StatusCode::OK);
    let payload = body["qrCode"].as_str().unwrap();
    assert_eq!(
        Some(payload.to_string()),
        app.controller.get_pairing_artifact("qr").await.unwrap()
    );

    app.controller.mark_paired("qr", "+15550000").await;
    let (status, body) = call(&app, Method::GET, "/api/whatsapp/qr/qr", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "qr_unavailable");
}

#[tokio::test]
async fn test_status_and_listing() {
    let app = app();
    create(&app, "a", "Alpha").await;
    create_paired(&app, "b").await;

    let (status, body) = call(&app, Method::GET, "/api/whatsapp/status/a", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connectionId"], "a");
    assert_eq!(body["name"], "Alpha");
    assert_eq!(body["status"], "awaiting_pairing");
    assert_eq!(body["hasQrCode"], true);
    assert_eq!(body["phoneNumber"], Value::Null);

    let (status, body) = call(&app, Method::GET, "/api/whatsapp/status/b", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "connected");
    assert_eq!(body["phoneNumber"], "+15551234567");
    assert_eq!(body["hasQrCode"], false);

    let (status, body) = call(&app, Method::GET, "/api/whatsapp/connections", None).await;
    assert_eq!(status, StatusCode::OK);
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["id"], "a");
    assert!(list[0]["createdAt"].is_string());

    let (status, body) = call(&app, Method::GET, "/api/whatsapp/status/zzz", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn test_send_message() {
    let app = app();
    create(&app, "waiting", "Waiting").await;
    create_paired(&app, "ready").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/whatsapp/send/waiting",
        Some(json!({ "to": "+15557654321", "message": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "not_connected");

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/whatsapp/send/ready",
        Some(json!({ "to": "+15557654321", "message": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/whatsapp/send/ready",
        Some(json!({ "to": "abc", "message": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/whatsapp/send/ghost",
        Some(json!({ "to": "+15557654321", "message": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_disconnect_removes_connection() {
    let app = app();
    create_paired(&app, "bye").await;

    let (status, body) = call(&app, Method::DELETE, "/api/whatsapp/disconnect/bye", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = call(&app, Method::GET, "/api/whatsapp/status/bye", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, Method::DELETE, "/api/whatsapp/disconnect/bye", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn test_failed_disconnect_keeps_connection() {
    let app = app_from(
        SimulatedConfig {
            qr_delay: Duration::from_millis(10),
            fail_destroy: true,
            ..SimulatedConfig::default()
        },
        true,
    );
    create_paired(&app, "stuck").await;

    let (status, body) = call(&app, Method::DELETE, "/api/whatsapp/disconnect/stuck", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "delegate_failure");

    let (status, body) = call(&app, Method::GET, "/api/whatsapp/status/stuck", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "disconnected");

    // The handle was already released from the session, so a retry removes it
    let (status, _) = call(&app, Method::DELETE, "/api/whatsapp/disconnect/stuck", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::GET, "/api/whatsapp/status/stuck", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_disconnect_after_shutdown_is_unavailable() {
    let app = app();
    create(&app, "late", "Late").await;
    app.controller.shutdown().await;

    let (status, body) = call(&app, Method::DELETE, "/api/whatsapp/disconnect/late", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["kind"], "shut_down");
}

#[tokio::test]
async fn test_disconnect_after_loss_still_removes() {
    let app = app();
    let id = create_paired(&app, "lost").await;
    assert!(app.controller.connection_lost(id.as_str(), "offline").await);

    let (status, _) = call(&app, Method::DELETE, "/api/whatsapp/disconnect/lost", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.controller.list().await.is_empty());
}

#[tokio::test]
async fn test_refresh_and_rename() {
    let app = app();
    create(&app, "r", "Before").await;
    let before = app.controller.get_pairing_artifact("r").await.unwrap();

    let (status, _) = call(&app, Method::POST, "/api/whatsapp/refresh/r", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(app.controller.get_pairing_artifact("r").await.unwrap(), before);

    let (status, _) = call(
        &app,
        Method::PATCH,
        "/api/whatsapp/connections/r",
        Some(json!({ "name": "After" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.controller.get_status("r").await.unwrap().name, "After");

    app.controller.mark_paired("r", "+15550000").await;
    let (status, body) = call(&app, Method::POST, "/api/whatsapp/refresh/r", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "invalid_transition");
}

#[tokio::test]
async fn test_simulation_routes() {
    let app = app();
    let id = create(&app, "sim", "Sim").await;
    let mut sub = app
        .controller
        .subscribe(&[EventKind::Connected, EventKind::MessageReceived, EventKind::Disconnected]);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/whatsapp/simulate/sim/pair",
        Some(json!({ "phoneNumber": "+15551112222" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let event = timeout(Duration::from_secs(2), sub.recv()).await.unwrap().unwrap();
    assert!(matches!(event, LifecycleEvent::Connected { .. }));

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/whatsapp/simulate/sim/message",
        Some(json!({ "from": "15553334444@c.us", "body": "hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let event = timeout(Duration::from_secs(2), sub.recv()).await.unwrap().unwrap();
    assert!(matches!(event, LifecycleEvent::MessageReceived { ref body, .. } if body == "hello"));

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/whatsapp/simulate/sim/lose",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let event = timeout(Duration::from_secs(2), sub.recv()).await.unwrap().unwrap();
    assert!(matches!(event, LifecycleEvent::Disconnected { .. }));
    assert_eq!(
        app.controller.get_status(id.as_str()).await.unwrap().state.as_str(),
        "disconnected"
    );

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/whatsapp/simulate/sim/pair",
        Some(json!({ "phoneNumber": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn test_simulation_routes_absent_when_disabled() {
    let app = app_with(Duration::from_millis(10), false);
    create(&app, "plain", "Plain").await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/whatsapp/simulate/plain/pair",
        Some(json!({ "phoneNumber": "+15551112222" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_shut_down_controller_rejects_create() {
    let app = app();
    app.controller.shutdown().await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/whatsapp/create",
        Some(json!({ "name": "Late" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["kind"], "shut_down");
}
