use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{sse::Event as SseEvent, Html, IntoResponse, Json, Response, Sse},
};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::path::PathBuf;
use tokio_stream::Stream;

use crate::constants::MAP_HELP;
use crate::file_input::{collect_paths, load_blobs};
use crate::geo::Coordinate;
use crate::location::GeolocationError;
use crate::map::leaflet::MapView;
use crate::map::{FitOutcome, MarkerEvent, MarkerHandle, MarkerInteraction};
use crate::registry::PhotoId;
use crate::session::{PhotoView, SessionError, SessionSnapshot, MAP_NOT_OPEN, NOTHING_TO_SHOW};

use super::events::event_stream;
use super::state::AppState;

#[derive(RustEmbed)]
#[folder = "frontend/"]
struct Asset;

fn embedded(path: &str, content_type: &'static str) -> Response {
    match Asset::get(path) {
        Some(file) => ([(header::CONTENT_TYPE, content_type)], file.data.into_owned()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn index_html() -> Response {
    match Asset::get("index.html") {
        Some(file) => Html(file.data.into_owned()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn style_css() -> Response {
    embedded("style.css", "text/css")
}

pub async fn script_js() -> Response {
    embedded("script.js", "application/javascript")
}

fn not_found(e: SessionError) -> StatusCode {
    tracing::debug!(error = %e, "lookup miss");
    StatusCode::NOT_FOUND
}

pub async fn get_state(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.lock().snapshot())
}

#[derive(Debug, Deserialize)]
pub struct AddPhotosRequest {
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct AddPhotosResponse {
    pub files: usize,
}

/// Loads the files behind `paths` and runs them through an upload batch in
/// the background. Progress arrives over `/api/events`.
pub async fn add_photos(
    State(state): State<AppState>,
    Json(request): Json<AddPhotosRequest>,
) -> Result<(StatusCode, Json<AddPhotosResponse>), (StatusCode, String)> {
    if request.paths.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "No paths given".to_string()));
    }

    let max_size = state.settings.max_file_size;
    let blobs = tokio::task::spawn_blocking(move || {
        collect_paths(&request.paths).map(|paths| load_blobs(&paths, max_size))
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "file loading task failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "File loading failed".to_string())
    })?
    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let files = blobs.len();
    if files == 0 {
        return Err((StatusCode::BAD_REQUEST, "No files found".to_string()));
    }

    let session = state.session.clone();
    tokio::spawn(async move {
        let report = session.handle_files(blobs).await;
        tracing::info!(batch = report.batch, committed = report.committed.len(), rejected = report.rejected.len(), "batch finished");
    });

    Ok((StatusCode::ACCEPTED, Json(AddPhotosResponse { files })))
}

pub async fn clear_photos(State(state): State<AppState>) -> Json<serde_json::Value> {
    let removed = state.session.lock().clear_all();
    Json(json!({ "removed": removed }))
}

pub async fn delete_photo(State(state): State<AppState>, Path(id): Path<PhotoId>) -> Result<StatusCode, StatusCode> {
    state.session.lock().remove_photo(id).map_err(not_found)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_photo(State(state): State<AppState>, Path(id): Path<PhotoId>) -> Result<Json<PhotoView>, StatusCode> {
    let view = state.session.lock().photo_view(id).map_err(not_found)?;
    Ok(Json(view))
}

pub async fn get_photo_preview(State(state): State<AppState>, Path(id): Path<PhotoId>) -> Result<Response, StatusCode> {
    let image = state.session.lock().tile_image(id).ok_or(StatusCode::NOT_FOUND)?;
    Ok((
        [
            (header::CONTENT_TYPE, image.mime_type),
            (header::CACHE_CONTROL, "public, max-age=31536000"),
        ],
        image.data.to_vec(),
    )
        .into_response())
}

/// Original bytes; `?download=1` asks the browser to save them.
pub async fn get_photo_image(
    State(state): State<AppState>,
    Path(id): Path<PhotoId>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, StatusCode> {
    let blob = {
        let session = state.session.lock();
        session.photo(id).map_err(not_found)?.blob.clone()
    };

    let disposition = if params.contains_key("download") {
        format!("attachment; filename=\"{}\"", blob.name.replace('"', ""))
    } else {
        "inline".to_string()
    };
    Ok((
        [
            (header::CONTENT_TYPE, blob.mime_type.clone()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        blob.data.to_vec(),
    )
        .into_response())
}

/// Answer from the page's `navigator.geolocation`: either a position or an
/// error code.
#[derive(Debug, Deserialize)]
pub struct LocationReport {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub error: Option<GeolocationError>,
}

pub async fn post_location(
    State(state): State<AppState>,
    Json(report): Json<LocationReport>,
) -> Result<StatusCode, StatusCode> {
    let Some(browser) = state.browser_geolocation.as_ref() else {
        return Err(StatusCode::CONFLICT);
    };

    let result = match (report.latitude, report.longitude, report.error) {
        (_, _, Some(error)) => Err(error),
        (Some(latitude), Some(longitude), None) => {
            let coordinate = Coordinate { latitude, longitude };
            if !coordinate.is_valid() {
                return Err(StatusCode::BAD_REQUEST);
            }
            Ok(coordinate)
        }
        _ => return Err(StatusCode::BAD_REQUEST),
    };

    state.session.report_browser_location(browser, result);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn request_location(State(state): State<AppState>) -> Json<serde_json::Value> {
    let started = state.session.request_location();
    Json(json!({ "started": started }))
}

pub async fn open_map(State(state): State<AppState>) -> Result<Json<serde_json::Value>, StatusCode> {
    let status = state
        .session
        .open_map(state.map_factory.as_ref())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(json!({ "status": status })))
}

pub async fn get_map(State(state): State<AppState>) -> Json<MapView> {
    Json(state.map_view.snapshot())
}

pub async fn fit_map(State(state): State<AppState>) -> Json<serde_json::Value> {
    let outcome = state.session.lock().fit_all_markers();
    let body = match outcome {
        FitOutcome::Fitted { bounds, markers } => json!({ "outcome": "fitted", "bounds": bounds, "markers": markers }),
        FitOutcome::NothingToShow => json!({ "outcome": "nothing_to_show", "message": NOTHING_TO_SHOW }),
        FitOutcome::MapUnavailable => json!({ "outcome": "map_unavailable", "message": MAP_NOT_OPEN }),
    };
    Json(body)
}

pub async fn recenter_map(State(state): State<AppState>) -> Json<serde_json::Value> {
    let recentered = state.session.lock().recenter();
    Json(json!({ "recentered": recentered }))
}

pub async fn marker_event(
    State(state): State<AppState>,
    Path((handle, event)): Path<(MarkerHandle, String)>,
) -> Result<Json<MarkerInteraction>, StatusCode> {
    let event: MarkerEvent = event.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
    let interaction = state
        .session
        .marker_interaction(handle, event)
        .map_err(not_found)?;
    Ok(Json(interaction))
}

pub async fn get_settings(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "settings": *state.settings,
        "map_help": MAP_HELP,
        "browser_geolocation": state.browser_geolocation.is_some(),
    }))
}

pub async fn events_stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    event_stream(&state.event_sender)
}
