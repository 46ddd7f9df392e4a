//! The one owner of photo state. `PhotoSession` holds the registry, the map
//! binding, the tiles and the location tracker; `SessionHandle` shares it
//! with async tasks, which never hold the lock across an `.await`.

use parking_lot::{Mutex, MutexGuard};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::constants::{PREVIEW_SIZE, PROGRESS_GRACE_MS, PROGRESS_TICK_MS};
use crate::events::{emit, AppEvent, EventData, EventSender};
use crate::geo::Coordinate;
use crate::image_processing::{create_preview, ImageSource};
use crate::location::{
    wait_for_location, BrowserGeolocation, GeolocationError, GeolocationProvider, GeolocationTracker,
    LocationStatus, PositionFuture,
};
use crate::map::{
    FitOutcome, MapBinding, MapOptions, MapStatus, MapWidgetFactory, MarkerEvent, MarkerHandle, MarkerInteraction,
};
use crate::presentation::{PresentationSync, TileView};
use crate::registry::{PhotoBlob, PhotoEntry, PhotoId, PhotoRegistry};
use crate::settings::Settings;
use crate::upload::{BatchPhase, ProgressSimulator, UploadBatch};
use crate::utils::format_file_size;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("photo {0} not found")]
    PhotoNotFound(PhotoId),
    #[error("marker {0} not found")]
    MarkerNotFound(MarkerHandle),
}

pub const NOTHING_TO_SHOW: &str = "There are no photos to show on the map.";
pub const MAP_NOT_OPEN: &str = "Open the map tab first.";

#[derive(Debug, Clone, Serialize)]
pub struct LocationView {
    pub display: String,
    pub user_location: Option<Coordinate>,
    #[serde(flatten)]
    pub status: LocationStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub tiles: Vec<TileView>,
    pub photo_count: usize,
    pub live_markers: usize,
    pub pending_markers: usize,
    pub map_status: MapStatus,
    pub location: LocationView,
    pub debug: bool,
}

/// Everything the photo popup shows.
#[derive(Debug, Clone, Serialize)]
pub struct PhotoView {
    pub id: PhotoId,
    pub name: String,
    pub mime_type: String,
    pub size_label: String,
    pub coordinate: Coordinate,
    pub coordinate_label: String,
    pub uploaded_at: String,
    pub image_url: String,
    pub share_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch: u64,
    pub phase: BatchPhase,
    pub total_files: usize,
    pub rejected: Vec<String>,
    pub committed: Vec<PhotoId>,
}

pub struct PhotoSession {
    settings: Settings,
    registry: PhotoRegistry,
    map: MapBinding,
    presentation: PresentationSync,
    tracker: GeolocationTracker,
    events: EventSender,
    rng: StdRng,
    location_display: String,
    next_batch: u64,
}

impl PhotoSession {
    pub fn new(settings: Settings, provider: Arc<dyn GeolocationProvider>, events: EventSender, rng: StdRng) -> Self {
        let map = MapBinding::new(
            MapOptions {
                center: settings.default_location,
                zoom: settings.default_zoom,
            },
            settings.bounce_duration(),
        );
        PhotoSession {
            settings,
            registry: PhotoRegistry::new(),
            map,
            presentation: PresentationSync::new(),
            tracker: GeolocationTracker::new(provider),
            events,
            rng,
            location_display: "Locating...".to_string(),
            next_batch: 1,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &PhotoRegistry {
        &self.registry
    }

    pub fn map(&self) -> &MapBinding {
        &self.map
    }

    pub fn presentation(&self) -> &PresentationSync {
        &self.presentation
    }

    pub fn user_location(&self) -> Option<Coordinate> {
        self.tracker.user_location()
    }

    pub fn location_display(&self) -> &str {
        &self.location_display
    }

    /// Coordinate for a newly committed photo: the user's location spread by
    /// the configured jitter, or the default location when none is known.
    pub fn generate_coordinate(&mut self) -> Coordinate {
        match self.tracker.user_location() {
            Some(location) => location.jittered(self.settings.random_offset, &mut self.rng),
            None => {
                tracing::debug!("no user location, using default");
                self.settings.default_location
            }
        }
    }

    /// Validates a selection and opens a batch for it. Rejections are
    /// reported to the page right away.
    pub fn start_batch(&mut self, files: Vec<PhotoBlob>) -> UploadBatch {
        let id = self.next_batch;
        self.next_batch += 1;
        let batch = UploadBatch::new(id, files, self.settings.max_file_size);

        for rejection in batch.rejections() {
            emit(
                &self.events,
                AppEvent::new(
                    "upload_rejected",
                    EventData {
                        batch: Some(id),
                        file_name: Some(rejection.file_name().to_string()),
                        message: Some(rejection.to_string()),
                        ..Default::default()
                    },
                ),
            );
        }
        emit(
            &self.events,
            AppEvent::new(
                "upload_started",
                EventData {
                    batch: Some(id),
                    total_files: Some(batch.total_files()),
                    accepted: Some(batch.accepted_count()),
                    rejected: Some(batch.rejections().len()),
                    phase: Some(batch.phase().as_str().to_string()),
                    ..Default::default()
                },
            ),
        );
        batch
    }

    /// Admits one file, then places (or queues) its marker.
    pub fn commit_photo(&mut self, blob: PhotoBlob) -> PhotoEntry {
        let coordinate = self.generate_coordinate();
        let entry = self.registry.admit(blob, coordinate);
        let handle = self.map.add_photo_marker(&entry);
        tracing::info!(photo = %entry.id, name = entry.name(), %coordinate, queued = handle.is_none(), "photo committed");

        emit(
            &self.events,
            AppEvent::new(
                "photo_committed",
                EventData {
                    photo_id: Some(entry.id),
                    file_name: Some(entry.blob.name.clone()),
                    coordinate: Some(coordinate),
                    ..Default::default()
                },
            ),
        );
        entry
    }

    /// Adds the tile for a finished preview. Returns `false` when the photo
    /// was removed while its preview was being made.
    pub fn attach_preview(&mut self, id: PhotoId, image: Option<ImageSource>) -> bool {
        let Some(entry) = self.registry.get(id) else {
            tracing::debug!(photo = %id, "preview finished for a removed photo, dropping it");
            return false;
        };
        self.presentation.add_tile(entry, image);
        emit(
            &self.events,
            AppEvent::new(
                "tile_added",
                EventData {
                    photo_id: Some(id),
                    ..Default::default()
                },
            ),
        );
        true
    }

    pub fn remove_photo(&mut self, id: PhotoId) -> Result<PhotoEntry, SessionError> {
        let entry = self
            .presentation
            .remove_everything(&mut self.registry, &mut self.map, id)?;
        emit(
            &self.events,
            AppEvent::new(
                "photo_removed",
                EventData {
                    photo_id: Some(id),
                    file_name: Some(entry.blob.name.clone()),
                    ..Default::default()
                },
            ),
        );
        Ok(entry)
    }

    /// Bulk clear: every photo, marker, queued marker and tile.
    pub fn clear_all(&mut self) -> usize {
        let removed = self.registry.clear();
        let markers = self.map.clear_photo_markers();
        let tiles = self.presentation.clear();
        tracing::info!(photos = removed.len(), markers, tiles, "cleared all photos");
        emit(&self.events, AppEvent::notice("photos_cleared", "All photos removed."));
        removed.len()
    }

    /// Starts a location query unless one is in flight. An unsupported
    /// environment is reported the first time only; it never recovers.
    pub fn begin_location_request(&mut self) -> Option<PositionFuture> {
        let known_unsupported = self.tracker.is_unsupported();
        match self.tracker.request_location() {
            Ok(query) => query,
            Err(error) => {
                if !known_unsupported {
                    self.report_location_error(error);
                }
                None
            }
        }
    }

    pub fn on_location_resolved(&mut self, coordinate: Coordinate) {
        let first = self.tracker.resolve(coordinate);
        self.location_display = coordinate.display();
        self.map.place_user_marker(coordinate);
        if first {
            self.map.recenter(Some(coordinate));
        }
        emit(
            &self.events,
            AppEvent::new(
                "location_updated",
                EventData {
                    coordinate: Some(coordinate),
                    message: Some(self.location_display.clone()),
                    ..Default::default()
                },
            ),
        );
    }

    pub fn on_location_failed(&mut self, error: GeolocationError) {
        self.tracker.reject(error);
        self.report_location_error(error);
    }

    fn report_location_error(&mut self, error: GeolocationError) {
        self.location_display = error.to_string();
        emit(&self.events, AppEvent::notice("location_error", error.to_string()));
    }

    pub fn marker_event(&mut self, handle: MarkerHandle, event: MarkerEvent) -> Result<MarkerInteraction, SessionError> {
        self.map.marker_event(handle, event).ok_or_else(|| {
            tracing::warn!(%handle, ?event, "event for unknown marker");
            SessionError::MarkerNotFound(handle)
        })
    }

    pub fn end_bounce(&mut self, handle: MarkerHandle) -> bool {
        self.map.end_bounce(handle)
    }

    pub fn fit_all_markers(&mut self) -> FitOutcome {
        let outcome = self.map.fit_all_markers();
        match outcome {
            FitOutcome::NothingToShow => emit(&self.events, AppEvent::notice("map_notice", NOTHING_TO_SHOW)),
            FitOutcome::MapUnavailable => emit(&self.events, AppEvent::notice("map_notice", MAP_NOT_OPEN)),
            FitOutcome::Fitted { .. } => {}
        }
        outcome
    }

    pub fn recenter(&mut self) -> bool {
        self.map.recenter(self.tracker.user_location())
    }

    pub fn photo(&self, id: PhotoId) -> Result<&PhotoEntry, SessionError> {
        self.registry.get(id).ok_or(SessionError::PhotoNotFound(id))
    }

    pub fn photo_view(&self, id: PhotoId) -> Result<PhotoView, SessionError> {
        let entry = self.photo(id)?;
        Ok(PhotoView {
            id,
            name: entry.blob.name.clone(),
            mime_type: entry.blob.mime_type.clone(),
            size_label: format_file_size(entry.blob.size),
            coordinate: entry.coordinate,
            coordinate_label: entry.coordinate.display(),
            uploaded_at: entry.admitted_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            image_url: format!("/api/photos/{}/image", id),
            share_url: entry.coordinate.share_url(),
        })
    }

    pub fn tile_image(&self, id: PhotoId) -> Option<ImageSource> {
        self.presentation.tile(id).and_then(|t| t.image.clone())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let location = self.tracker.snapshot();
        SessionSnapshot {
            tiles: self.presentation.tiles().iter().map(|t| t.view()).collect(),
            photo_count: self.registry.len(),
            live_markers: self.map.markers().len(),
            pending_markers: self.map.pending().len(),
            map_status: self.map.status(),
            location: LocationView {
                display: self.location_display.clone(),
                user_location: location.user_location,
                status: location.status,
            },
            debug: self.settings.debug_mode,
        }
    }

    fn emit(&self, event: AppEvent) {
        emit(&self.events, event);
    }
}

/// Cloneable, lock-guarded access to the session for handlers and tasks.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<PhotoSession>>,
}

impl SessionHandle {
    pub fn new(session: PhotoSession) -> Self {
        SessionHandle {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Builds a session from settings with an entropy-seeded rng.
    pub fn from_settings(settings: Settings, provider: Arc<dyn GeolocationProvider>, events: EventSender) -> Self {
        Self::new(PhotoSession::new(settings, provider, events, StdRng::from_entropy()))
    }

    pub fn lock(&self) -> MutexGuard<'_, PhotoSession> {
        self.inner.lock()
    }

    /// Starts a location query in the background. Returns `false` when none
    /// was started (already in flight, or unsupported).
    pub fn request_location(&self) -> bool {
        let query = self.lock().begin_location_request();
        match query {
            Some(query) => {
                self.drive_query(query);
                true
            }
            None => false,
        }
    }

    fn drive_query(&self, query: PositionFuture) {
        let handle = self.clone();
        tokio::spawn(async move {
            let result = query.await;
            handle.apply_location(result);
        });
    }

    fn apply_location(&self, result: Result<Coordinate, GeolocationError>) {
        let mut session = self.lock();
        match result {
            Ok(coordinate) => session.on_location_resolved(coordinate),
            Err(error) => session.on_location_failed(error),
        }
    }

    /// An answer posted by the page's geolocation. Goes to the waiting query
    /// when there is one, otherwise straight into the session.
    pub fn report_browser_location(&self, browser: &BrowserGeolocation, result: Result<Coordinate, GeolocationError>) {
        if !browser.report(result) {
            self.apply_location(result);
        }
    }

    /// The user's location, asking for it first when unknown. Gives up after
    /// the configured timeout or when the query fails.
    pub async fn ensure_location(&self) -> Option<Coordinate> {
        let (rx, query, timeout) = {
            let mut session = self.lock();
            if let Some(location) = session.user_location() {
                return Some(location);
            }
            let query = session.begin_location_request();
            if query.is_none() && matches!(session.tracker.snapshot().status, LocationStatus::Failed { .. }) {
                return None;
            }
            (session.tracker.subscribe(), query, session.settings.location_timeout())
        };
        if let Some(query) = query {
            self.drive_query(query);
        }

        self.lock().emit(AppEvent::notice("location_waiting", "Waiting for your location..."));
        match tokio::time::timeout(timeout, wait_for_location(rx)).await {
            Ok(location) => location,
            Err(_) => {
                tracing::warn!(?timeout, "no location in time, photos go to the default location");
                None
            }
        }
    }

    /// Runs one upload batch end to end: wait for a location, validate,
    /// animate progress, commit, then decode previews.
    pub async fn handle_files(&self, files: Vec<PhotoBlob>) -> BatchReport {
        self.ensure_location().await;

        let (mut batch, mut rng) = {
            let mut session = self.lock();
            let seed: u64 = session.rng.gen();
            (session.start_batch(files), StdRng::seed_from_u64(seed))
        };
        let rejected = batch.rejections().iter().map(|r| r.to_string()).collect();

        if batch.phase() == BatchPhase::Rejected {
            tracing::info!(batch = batch.id, "nothing to upload");
            return BatchReport {
                batch: batch.id,
                phase: batch.phase(),
                total_files: batch.total_files(),
                rejected,
                committed: Vec::new(),
            };
        }

        for progress in ProgressSimulator::new(&mut rng) {
            tokio::time::sleep(Duration::from_millis(PROGRESS_TICK_MS)).await;
            self.lock().emit(AppEvent::new(
                "upload_progress",
                EventData {
                    batch: Some(batch.id),
                    progress: Some(progress),
                    ..Default::default()
                },
            ));
        }
        tokio::time::sleep(Duration::from_millis(PROGRESS_GRACE_MS)).await;

        let Some(files) = batch.take_for_commit() else {
            tracing::warn!(batch = batch.id, "batch already committed");
            return BatchReport {
                batch: batch.id,
                phase: batch.phase(),
                total_files: batch.total_files(),
                rejected,
                committed: Vec::new(),
            };
        };

        let entries: Vec<PhotoEntry> = {
            let mut session = self.lock();
            files.into_iter().map(|blob| session.commit_photo(blob)).collect()
        };
        let committed: Vec<PhotoId> = entries.iter().map(|e| e.id).collect();

        let previews = entries.into_iter().map(|entry| {
            let handle = self.clone();
            async move {
                let data = entry.blob.data.clone();
                let image = match tokio::task::spawn_blocking(move || create_preview(&data, PREVIEW_SIZE)).await {
                    Ok(Ok(image)) => Some(image),
                    Ok(Err(e)) => {
                        tracing::warn!(photo = %entry.id, name = entry.name(), error = %e, "preview failed");
                        None
                    }
                    Err(e) => {
                        tracing::error!(photo = %entry.id, error = %e, "preview task panicked");
                        None
                    }
                };
                handle.lock().attach_preview(entry.id, image);
            }
        });
        futures::future::join_all(previews).await;

        batch.finish();
        let duration = {
            let session = self.lock();
            let duration = session.settings.success_message_duration();
            session.emit(AppEvent::new(
                "upload_complete",
                EventData {
                    batch: Some(batch.id),
                    accepted: Some(committed.len()),
                    message: Some(format!("{} photo(s) uploaded.", committed.len())),
                    duration_ms: Some(duration.as_millis() as u64),
                    phase: Some(batch.phase().as_str().to_string()),
                    ..Default::default()
                },
            ));
            duration
        };

        let handle = self.clone();
        let batch_id = batch.id;
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            handle.lock().emit(AppEvent::new(
                "success_cleared",
                EventData {
                    batch: Some(batch_id),
                    ..Default::default()
                },
            ));
        });

        BatchReport {
            batch: batch.id,
            phase: batch.phase(),
            total_files: batch.total_files(),
            rejected,
            committed,
        }
    }

    /// Map tab activation. The widget is built outside the lock and handed
    /// back to the binding, which re-checks its state before installing it.
    pub fn open_map(&self, factory: &dyn MapWidgetFactory) -> anyhow::Result<MapStatus> {
        let options = {
            let mut session = self.lock();
            match session.map.begin_initialization() {
                crate::map::InitGate::Proceed => *session.map.options(),
                _ => return Ok(session.map.status()),
            }
        };

        let built = factory.create_map(&options);

        let mut session = self.lock();
        match built {
            Ok(widget) => {
                let user_location = session.tracker.user_location();
                session.map.complete_initialization(widget, user_location);
                session.emit(AppEvent::notice("map_ready", "Map ready."));
                Ok(session.map.status())
            }
            Err(e) => {
                session.map.abort_initialization();
                tracing::error!(error = %e, "failed to create map");
                Err(e)
            }
        }
    }

    /// Applies a marker event; a hover bounce is stopped again after the
    /// configured duration.
    pub fn marker_interaction(&self, handle: MarkerHandle, event: MarkerEvent) -> Result<MarkerInteraction, SessionError> {
        let interaction = self.lock().marker_event(handle, event)?;
        if let MarkerInteraction::Bounce { handle, duration } = interaction {
            let session = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                if session.lock().end_bounce(handle) {
                    tracing::trace!(%handle, "bounce finished");
                }
            });
        }
        Ok(interaction)
    }
}
