#![cfg(feature = "server")]

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use common::{player_fixture, FRAME};
use kioskplayback::api::kiosk_api_router;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

async fn call(router: axum::Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_status_uses_wire_field_names() {
    let f = player_fixture(&["a.mp4"]);
    f.player.start().await.unwrap();
    f.backend.set_elapsed_ms(12_400);

    let (status, body) = call(kiosk_api_router(f.player.clone()), get("/status")).await;

    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["playing"], json!(true));
    assert_eq!(value["current_time"], json!(12));
    assert_eq!(value["current_video"]["path"], json!(f.paths[0]));
    assert_eq!(value["current_video"]["duration"], json!(2));

    f.player.shutdown().await;
}

#[tokio::test]
async fn test_preview_is_404_until_a_frame_exists() {
    let f = player_fixture(&["a.mp4"]);
    f.player.start().await.unwrap();
    let router = kiosk_api_router(f.player.clone());

    let (status, _) = call(router.clone(), get("/preview.png")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(router.clone(), post_json("/preview/toggle", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["preview_enabled"], json!(true));

    tokio::time::sleep(Duration::from_millis(120)).await;
    let response = router.clone().oneshot(get("/preview.png")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], FRAME);

    f.player.shutdown().await;
}

#[tokio::test]
async fn test_post_config_updates_display_name_and_videos() {
    let f = player_fixture(&["a.mp4", "b.mp4"]);
    f.player.start().await.unwrap();
    let router = kiosk_api_router(f.player.clone());

    let request = json!({
        "display_name": "Temporary Exhibit",
        "videos": [
            { "path": f.paths[0], "enabled": true, "order": 1 },
            { "path": f.paths[1], "enabled": false, "order": 0 }
        ]
    });
    let (status, body) = call(router.clone(), post_json("/config", request)).await;

    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["status"], json!("success"));
    assert_eq!(value["state"], json!("playing"));
    assert_eq!(value["playlist_size"], json!(1));

    let (_, body) = call(router.clone(), get("/config")).await;
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["display_name"], json!("Temporary Exhibit"));

    let (_, body) = call(router, get("/playlist")).await;
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 1);
    assert_eq!(value[0]["path"], json!(f.paths[0]));

    f.player.shutdown().await;
}

#[tokio::test]
async fn test_dark_mode_toggle_route() {
    let f = player_fixture(&[]);
    let router = kiosk_api_router(f.player.clone());
    let initial = f.config.get_dark_mode().unwrap();

    let (status, body) = call(router.clone(), post_json("/dark_mode/toggle", json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["status"], json!("success"));
    assert_eq!(value["dark_mode"], json!(!initial));

    let (_, body) = call(router, get("/config")).await;
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["dark_mode"], json!(!initial));
}
