use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

use mosaic::config::Config;
use mosaic::content_store::ContentStore;
use mosaic::hub::NotificationHub;
use mosaic::server::build_router;
use mosaic::state::AppState;
use mosaic::store::MemoryStore;
use mosaic::utils::sha1_hex;

fn test_config(data_dir: &std::path::Path, max_chunk_size: usize) -> Config {
    Config {
        data_dir: data_dir.to_path_buf(),
        host: "127.0.0.1".to_string(),
        port: 0,
        max_chunk_size,
        worker_threads: 1,
    }
}

fn test_app(max_chunk_size: usize) -> (TempDir, Router) {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path(), max_chunk_size);

    let content = ContentStore::open(temp_dir.path().join("blobs")).unwrap();
    let store = Arc::new(MemoryStore::new());
    let hub = NotificationHub::spawn();
    let state = Arc::new(AppState::new(store, content, hub, config.max_chunk_size));

    let app = build_router(state, &config);
    (temp_dir, app)
}

// the rate limiter keys on the peer address, which a oneshot request
// does not carry unless we plant it ourselves
fn with_peer(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    let addr: SocketAddr = "127.0.0.1:54321".parse().unwrap();
    builder.extension(ConnectInfo(addr))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (_dir, app) = test_app(1024);

    let response = app
        .oneshot(
            with_peer(Request::builder().uri("/health"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "mosaic");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (_dir, app) = test_app(1024);

    let response = app
        .oneshot(
            with_peer(Request::builder().uri("/nope"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_and_status_over_http() {
    let (_dir, app) = test_app(1024);

    let payload = serde_json::json!({
        "name": "notes.txt",
        "hash": sha1_hex(b"helloworld"),
        "size": 10,
        "num_chunks": 2,
    });
    let response = app
        .clone()
        .oneshot(
            with_peer(Request::builder().method("POST").uri("/files"))
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let file = body_json(response).await;
    assert_eq!(file["name"], "notes.txt");
    assert_eq!(file["state"], "Incomplete");
    let id = file["id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(
            with_peer(Request::builder().uri(format!("/files/{}", id)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let status = body_json(response).await;
    assert_eq!(status["state"], "Incomplete");
    assert_eq!(status["chunks_needed"], 2);
}

#[tokio::test]
async fn test_chunk_rejections_over_http() {
    let (_dir, app) = test_app(1024);

    // empty body is caught by the handler
    let response = app
        .clone()
        .oneshot(
            with_peer(Request::builder().method("POST").uri("/chunks"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "validation failed: chunk payload is empty");

    // a body past the request limit never reaches the handler
    let response = app
        .oneshot(
            with_peer(Request::builder().method("POST").uri("/chunks"))
                .body(Body::from(vec![0u8; 4096]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_ws_route_requires_upgrade() {
    let (_dir, app) = test_app(1024);

    let response = app
        .oneshot(
            with_peer(Request::builder().uri("/ws"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_delete_unknown_file_is_404() {
    let (_dir, app) = test_app(1024);

    let response = app
        .oneshot(
            with_peer(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/files/{}", uuid::Uuid::new_v4())),
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().starts_with("not found"));
}
