use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;

pub mod events;
pub mod handlers;
pub mod state;

pub use self::state::{AppState, LocationSource};
use handlers::{
    add_photos, clear_photos, delete_photo, events_stream, fit_map, get_map, get_photo, get_photo_image,
    get_photo_preview, get_settings, get_state, index_html, marker_event, open_map, post_location, recenter_map,
    request_location, script_js, style_css,
};

// Create the main application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_html))
        .route("/style.css", get(style_css))
        .route("/script.js", get(script_js))
        .route("/api/state", get(get_state))
        .route("/api/photos", post(add_photos).delete(clear_photos))
        .route("/api/photos/:id", get(get_photo).delete(delete_photo))
        .route("/api/photos/:id/preview", get(get_photo_preview))
        .route("/api/photos/:id/image", get(get_photo_image))
        .route("/api/location", post(post_location))
        .route("/api/location/request", post(request_location))
        .route("/api/map", get(get_map))
        .route("/api/map/open", post(open_map))
        .route("/api/map/fit", post(fit_map))
        .route("/api/map/recenter", post(recenter_map))
        .route("/api/map/markers/:handle/:event", post(marker_event))
        .route("/api/settings", get(get_settings))
        .route("/api/events", get(events_stream))
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

/// Serves on 127.0.0.1 until Ctrl+C.
pub async fn start_server(state: AppState, port: u16) -> Result<()> {
    let app = create_app(state);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    println!("   ✅ HTTP server started successfully at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("\n👋 Shutting down...");
            }
        })
        .await?;
    Ok(())
}
