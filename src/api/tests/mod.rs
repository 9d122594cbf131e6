use super::*;
use crate::Config;
use crate::orchestrator::test_helpers::{create_test_orchestrator, wait_for_terminal};
use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use std::time::Duration;
use tower::ServiceExt;


/// Build a router over an in-memory orchestrator; `configure` may adjust the config
fn create_test_app(configure: impl FnOnce(&mut Config)) -> (Router, Arc<Orchestrator>) {
    let t = create_test_orchestrator(configure);
    let orchestrator = Arc::new(t.orchestrator);
    let config = orchestrator.get_config();
    (create_router(orchestrator.clone(), config), orchestrator)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_api_server_graceful_shutdown() {
    let t = create_test_orchestrator(|config| {
        config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    });
    let orchestrator = Arc::new(t.orchestrator);
    let config = orchestrator.get_config();

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(start_api_server_with_shutdown(
        orchestrator,
        config,
        async move {
            let _ = stop_rx.await;
        },
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    stop_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_bind_failure_is_io_error() {
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = occupied.local_addr().unwrap();

    let t = create_test_orchestrator(|config| {
        config.server.api.bind_address = addr;
    });
    let orchestrator = Arc::new(t.orchestrator);
    let config = orchestrator.get_config();

    let result = start_api_server(orchestrator, config).await;
    assert!(matches!(result, Err(crate::error::Error::Io(_))));
}

#[tokio::test]
async fn test_cors_enabled() {
    let (app, _orchestrator) = create_test_app(|config| {
        config.server.api.cors_enabled = true;
        config.server.api.cors_origins = vec!["*".to_string()];
    });

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_cors_specific_origin() {
    let (app, _orchestrator) = create_test_app(|config| {
        config.server.api.cors_enabled = true;
        config.server.api.cors_origins = vec!["http://allowed.test".to_string()];
    });

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://allowed.test")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "http://allowed.test"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let (app, _orchestrator) = create_test_app(|config| {
        config.server.api.cors_enabled = false;
    });

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(
        response
            .headers()
            .get("access-control-allow-origin")
            .is_none()
    );
}

#[tokio::test]
async fn test_request_id_is_generated() {
    let (app, _orchestrator) = create_test_app(|_| {});

    let response = app.oneshot(get("/health")).await.unwrap();

    let id = response
        .headers()
        .get(request_id::REQUEST_ID_HEADER)
        .expect("request id header");
    assert!(uuid::Uuid::parse_str(id.to_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (app, _orchestrator) = create_test_app(|_| {});

    let request = Request::builder()
        .uri("/downloads/missing")
        .header("X-Request-ID", "trace-123")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response
            .headers()
            .get(request_id::REQUEST_ID_HEADER)
            .unwrap(),
        "trace-123"
    );
}

#[tokio::test]
async fn test_swagger_ui_toggle() {
    let (app, _orchestrator) = create_test_app(|config| {
        config.server.api.swagger_ui = false;
    });
    let response = app.oneshot(get("/swagger-ui/index.html")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let (app, _orchestrator) = create_test_app(|config| {
        config.server.api.swagger_ui = true;
    });
    let response = app.oneshot(get("/swagger-ui/index.html")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
