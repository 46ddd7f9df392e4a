use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tower::ServiceExt;

use photopin::geo::Coordinate;
use photopin::server::{create_app, AppState, LocationSource};
use photopin::settings::Settings;

fn seoul() -> Coordinate {
    Coordinate::new(37.5665, 126.978)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => request
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn write_png(path: &Path) {
    image::RgbImage::from_pixel(16, 16, image::Rgb([10, 120, 200]))
        .save(path)
        .unwrap();
}

async fn wait_for_event(rx: &mut tokio::sync::broadcast::Receiver<photopin::events::AppEvent>, kind: &str) {
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            match rx.recv().await {
                Ok(event) if event.event_type == kind => return,
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => panic!("event channel closed: {e}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("no {kind} event"));
}

#[tokio::test]
async fn serves_the_embedded_page() {
    let app = create_app(AppState::new(Settings::default(), LocationSource::Disabled));
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn fresh_session_state() {
    let app = create_app(AppState::new(Settings::default(), LocationSource::Disabled));
    let (status, state) = call(&app, "GET", "/api/state", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["photo_count"], 0);
    assert_eq!(state["map_status"], "uninitialized");
    assert_eq!(state["location"]["status"], "idle");
}

#[tokio::test]
async fn upload_then_open_map_then_remove() {
    let dir = tempfile::Builder::new().prefix("photos").tempdir().unwrap();
    write_png(&dir.path().join("a.png"));
    write_png(&dir.path().join("b.png"));
    std::fs::write(dir.path().join("notes.txt"), b"not a photo").unwrap();

    let state = AppState::new(Settings::default(), LocationSource::Fixed(seoul()));
    let mut events = state.event_sender.subscribe();
    let app = create_app(state);

    let (status, body) = call(
        &app,
        "POST",
        "/api/photos",
        Some(json!({ "paths": [dir.path(), dir.path().join("notes.txt")] })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["files"], 3);

    wait_for_event(&mut events, "upload_complete").await;

    let (_, state) = call(&app, "GET", "/api/state", None).await;
    assert_eq!(state["photo_count"], 2);
    assert_eq!(state["pending_markers"], 2);
    let tiles = state["tiles"].as_array().unwrap();
    assert_eq!(tiles.len(), 2);
    let first_id = tiles[0]["id"].as_u64().unwrap();

    let (status, photo) = call(&app, "GET", &format!("/api/photos/{first_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(photo["name"], "a.png");
    assert!(photo["share_url"].as_str().unwrap().starts_with("https://maps.google.com/?q="));

    let (status, _) = call(&app, "POST", "/api/map/open", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, map) = call(&app, "GET", "/api/map", None).await;
    assert_eq!(map["ready"], true);
    // Two photos plus the user marker.
    assert_eq!(map["markers"].as_array().unwrap().len(), 3);

    let (_, fit) = call(&app, "POST", "/api/map/fit", None).await;
    assert_eq!(fit["outcome"], "fitted");
    assert_eq!(fit["markers"], 2);

    let (status, _) = call(&app, "DELETE", &format!("/api/photos/{first_id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, "DELETE", &format!("/api/photos/{first_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, map) = call(&app, "GET", "/api/map", None).await;
    assert_eq!(map["markers"].as_array().unwrap().len(), 2);

    let (_, cleared) = call(&app, "DELETE", "/api/photos", None).await;
    assert_eq!(cleared["removed"], 1);
    let (_, fit) = call(&app, "POST", "/api/map/fit", None).await;
    assert_eq!(fit["outcome"], "nothing_to_show");
}

#[tokio::test]
async fn marker_events_resolve_to_photo_ids() {
    let dir = tempfile::Builder::new().prefix("photos").tempdir().unwrap();
    write_png(&dir.path().join("pin.png"));

    let state = AppState::new(Settings::default(), LocationSource::Fixed(seoul()));
    let mut events = state.event_sender.subscribe();
    let app = create_app(state);

    call(&app, "POST", "/api/map/open", None).await;
    call(&app, "POST", "/api/photos", Some(json!({ "paths": [dir.path().join("pin.png")] }))).await;
    wait_for_event(&mut events, "upload_complete").await;

    let (_, map) = call(&app, "GET", "/api/map", None).await;
    let photo_marker = map["markers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["icon"] == "photo")
        .unwrap()
        .clone();
    let handle = photo_marker["handle"].as_u64().unwrap();

    let (status, click) = call(&app, "POST", &format!("/api/map/markers/{handle}/click"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(click["action"], "info_popup");
    assert_eq!(click["photo_id"], photo_marker["photo_id"]);

    let (_, hover) = call(&app, "POST", &format!("/api/map/markers/{handle}/hover"), None).await;
    assert_eq!(hover["action"], "bounce");
    assert_eq!(hover["duration_ms"], 700);

    let (status, _) = call(&app, "POST", &format!("/api/map/markers/{handle}/wiggle"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(&app, "POST", "/api/map/markers/999/click", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn browser_location_updates_the_panel() {
    let app = create_app(AppState::new(Settings::default(), LocationSource::Browser));

    let (status, _) = call(
        &app,
        "POST",
        "/api/location",
        Some(json!({ "latitude": 48.8566, "longitude": 2.3522 })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, state) = call(&app, "GET", "/api/state", None).await;
    assert_eq!(state["location"]["display"], "Latitude: 48.856600, Longitude: 2.352200");

    let (status, _) = call(&app, "POST", "/api/location", Some(json!({ "latitude": 123.0, "longitude": 0.0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, "POST", "/api/location", Some(json!({ "error": "permission_denied" }))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, state) = call(&app, "GET", "/api/state", None).await;
    assert_eq!(state["location"]["status"], "failed");
    assert_eq!(state["location"]["display"], "Location access was denied.");
}

#[tokio::test]
async fn location_posts_need_browser_geolocation() {
    let app = create_app(AppState::new(Settings::default(), LocationSource::Fixed(seoul())));
    let (status, _) = call(&app, "POST", "/api/location", Some(json!({ "latitude": 1.0, "longitude": 2.0 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn empty_or_missing_paths_are_bad_requests() {
    let app = create_app(AppState::new(Settings::default(), LocationSource::Disabled));
    let (status, _) = call(&app, "POST", "/api/photos", Some(json!({ "paths": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(&app, "POST", "/api/photos", Some(json!({ "paths": ["/definitely/not/here"] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn settings_include_the_map_help() {
    let app = create_app(AppState::new(Settings::default(), LocationSource::Browser));
    let (status, body) = call(&app, "GET", "/api/settings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settings"]["max_file_size"], 5 * 1024 * 1024);
    assert_eq!(body["browser_geolocation"], true);
    assert!(body["map_help"].as_str().unwrap().contains("Double-click"));
}
