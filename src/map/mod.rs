//! Map binding: owns the lazily created map widget, the live markers and the
//! queue of markers requested before the widget existed.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::geo::{Bounds, Coordinate};
use crate::registry::{PhotoEntry, PhotoId};

pub mod leaflet;
pub mod pending;

pub use pending::{PendingMarkerQueue, PendingMarkerRequest};

/// Widget-issued reference to a rendered marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerHandle(u64);

impl MarkerHandle {
    pub fn new(raw: u64) -> Self {
        MarkerHandle(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MarkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MarkerHandle {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(MarkerHandle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerIcon {
    Photo,
    UserLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerAnimation {
    Drop,
    Bounce,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSpec {
    pub position: Coordinate,
    pub icon: MarkerIcon,
    pub title: String,
    pub animation: Option<MarkerAnimation>,
    pub photo_id: Option<PhotoId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapOptions {
    pub center: Coordinate,
    pub zoom: u8,
}

/// The map capability. Implementations render markers somewhere and report
/// marker events back through [`MapBinding::marker_event`].
pub trait MapWidget: Send {
    fn create_marker(&mut self, marker: MarkerSpec) -> MarkerHandle;
    fn remove_marker(&mut self, handle: MarkerHandle);
    fn set_animation(&mut self, handle: MarkerHandle, animation: Option<MarkerAnimation>);
    fn set_center(&mut self, center: Coordinate);
    fn set_zoom(&mut self, zoom: u8);
    fn fit_bounds(&mut self, bounds: Bounds);
}

pub trait MapWidgetFactory: Send + Sync {
    fn create_map(&self, options: &MapOptions) -> Result<Box<dyn MapWidget>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerEvent {
    Click,
    DoubleClick,
    Hover,
}

impl FromStr for MarkerEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "click" => Ok(MarkerEvent::Click),
            "dblclick" | "doubleclick" => Ok(MarkerEvent::DoubleClick),
            "hover" | "mouseover" => Ok(MarkerEvent::Hover),
            other => Err(format!("unknown marker event '{}'", other)),
        }
    }
}

/// What the UI should do in response to a marker event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MarkerInteraction {
    InfoPopup {
        photo_id: PhotoId,
        title: String,
        coordinate: Coordinate,
    },
    OpenViewer {
        photo_id: PhotoId,
    },
    Bounce {
        handle: MarkerHandle,
        #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
        duration: Duration,
    },
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveMarker {
    pub handle: MarkerHandle,
    pub photo_id: Option<PhotoId>,
    pub title: String,
    pub position: Coordinate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MapStatus {
    Uninitialized,
    Initializing,
    Ready,
}

/// Answer to a request to start building the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitGate {
    /// Caller now owns the initialization and must complete or abort it.
    Proceed,
    InProgress,
    AlreadyReady,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FitOutcome {
    Fitted { bounds: Bounds, markers: usize },
    NothingToShow,
    MapUnavailable,
}

enum MapState {
    Uninitialized,
    Initializing,
    Ready(Box<dyn MapWidget>),
}

pub struct MapBinding {
    state: MapState,
    options: MapOptions,
    bounce_duration: Duration,
    pending: PendingMarkerQueue,
    markers: Vec<LiveMarker>,
    user_marker: Option<LiveMarker>,
}

impl MapBinding {
    pub fn new(options: MapOptions, bounce_duration: Duration) -> Self {
        MapBinding {
            state: MapState::Uninitialized,
            options,
            bounce_duration,
            pending: PendingMarkerQueue::new(),
            markers: Vec::new(),
            user_marker: None,
        }
    }

    pub fn status(&self) -> MapStatus {
        match self.state {
            MapState::Uninitialized => MapStatus::Uninitialized,
            MapState::Initializing => MapStatus::Initializing,
            MapState::Ready(_) => MapStatus::Ready,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, MapState::Ready(_))
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    pub fn begin_initialization(&mut self) -> InitGate {
        match self.state {
            MapState::Uninitialized => {
                self.state = MapState::Initializing;
                tracing::debug!("map initialization started");
                InitGate::Proceed
            }
            MapState::Initializing => InitGate::InProgress,
            MapState::Ready(_) => InitGate::AlreadyReady,
        }
    }

    /// Installs the widget built after [`begin_initialization`] returned
    /// `Proceed`, then drains the pending queue. A known user location gets
    /// its marker and becomes the center.
    /// Returns `false` (dropping `widget`) when the binding is no longer
    /// waiting for one.
    ///
    /// [`begin_initialization`]: MapBinding::begin_initialization
    pub fn complete_initialization(
        &mut self,
        mut widget: Box<dyn MapWidget>,
        user_location: Option<Coordinate>,
    ) -> bool {
        if !matches!(self.state, MapState::Initializing) {
            tracing::warn!(status = ?self.status(), "discarding map widget, binding is not initializing");
            return false;
        }

        widget.set_center(self.options.center);
        widget.set_zoom(self.options.zoom);

        let drained = self.pending.drain_into(widget.as_mut());
        tracing::info!(markers = drained.len(), "map ready, drained pending markers");
        self.markers.extend(drained);
        self.state = MapState::Ready(widget);

        if let Some(location) = user_location {
            self.place_user_marker(location);
            self.recenter(Some(location));
        }
        true
    }

    pub fn abort_initialization(&mut self) {
        if matches!(self.state, MapState::Initializing) {
            self.state = MapState::Uninitialized;
        }
    }

    /// Builds the widget in one step. Returns `Ok(false)` when the map was
    /// already ready or being built elsewhere.
    pub fn initialize_with(
        &mut self,
        factory: &dyn MapWidgetFactory,
        user_location: Option<Coordinate>,
    ) -> Result<bool> {
        if self.begin_initialization() != InitGate::Proceed {
            return Ok(false);
        }
        match factory.create_map(&self.options) {
            Ok(widget) => Ok(self.complete_initialization(widget, user_location)),
            Err(e) => {
                self.abort_initialization();
                Err(e)
            }
        }
    }

    /// Creates the marker now when the map is ready, otherwise queues it and
    /// returns `None`.
    pub fn add_photo_marker(&mut self, entry: &PhotoEntry) -> Option<MarkerHandle> {
        let request = PendingMarkerRequest {
            photo_id: entry.id,
            title: entry.blob.name.clone(),
            coordinate: entry.coordinate,
        };

        match &mut self.state {
            MapState::Ready(widget) => {
                let handle = widget.create_marker(request.to_spec());
                tracing::debug!(photo = %entry.id, %handle, "marker added");
                self.markers.push(LiveMarker {
                    handle,
                    photo_id: Some(entry.id),
                    title: request.title,
                    position: request.coordinate,
                });
                Some(handle)
            }
            _ => {
                tracing::debug!(photo = %entry.id, "map not ready, marker queued");
                self.pending.enqueue(request);
                None
            }
        }
    }

    /// Removes the first photo marker (live, else pending) titled `name`.
    pub fn remove_marker_by_name(&mut self, name: &str) -> bool {
        if let Some(index) = self.markers.iter().position(|m| m.title == name) {
            self.discard_marker(index);
            return true;
        }
        self.pending.remove_by_name(name).is_some()
    }

    pub fn remove_photo_marker(&mut self, photo_id: PhotoId) -> bool {
        if let Some(index) = self.markers.iter().position(|m| m.photo_id == Some(photo_id)) {
            self.discard_marker(index);
            return true;
        }
        self.pending.remove_by_photo(photo_id).is_some()
    }

    fn discard_marker(&mut self, index: usize) {
        let marker = self.markers.remove(index);
        if let MapState::Ready(widget) = &mut self.state {
            widget.remove_marker(marker.handle);
        }
    }

    /// Removes every photo marker and queued request; the user marker stays.
    pub fn clear_photo_markers(&mut self) -> usize {
        let mut removed = self.pending.clear();
        for marker in std::mem::take(&mut self.markers) {
            if let MapState::Ready(widget) = &mut self.state {
                widget.remove_marker(marker.handle);
            }
            removed += 1;
        }
        removed
    }

    /// Places (or moves) the "my location" marker. Skipped when the map does
    /// not exist yet; initialization places it from the current location.
    pub fn place_user_marker(&mut self, location: Coordinate) -> Option<MarkerHandle> {
        let MapState::Ready(widget) = &mut self.state else {
            tracing::debug!("map not ready, user marker skipped");
            return None;
        };

        if let Some(old) = self.user_marker.take() {
            widget.remove_marker(old.handle);
        }
        let title = crate::constants::USER_LOCATION_TITLE.to_string();
        let handle = widget.create_marker(MarkerSpec {
            position: location,
            icon: MarkerIcon::UserLocation,
            title: title.clone(),
            animation: None,
            photo_id: None,
        });
        self.user_marker = Some(LiveMarker {
            handle,
            photo_id: None,
            title,
            position: location,
        });
        Some(handle)
    }

    pub fn fit_all_markers(&mut self) -> FitOutcome {
        let MapState::Ready(widget) = &mut self.state else {
            return FitOutcome::MapUnavailable;
        };
        match Bounds::covering(self.markers.iter().map(|m| &m.position)) {
            Some(bounds) => {
                widget.fit_bounds(bounds);
                tracing::debug!(markers = self.markers.len(), "fitted map to markers");
                FitOutcome::Fitted {
                    bounds,
                    markers: self.markers.len(),
                }
            }
            None => FitOutcome::NothingToShow,
        }
    }

    pub fn recenter(&mut self, user_location: Option<Coordinate>) -> bool {
        match (&mut self.state, user_location) {
            (MapState::Ready(widget), Some(location)) => {
                widget.set_center(location);
                widget.set_zoom(self.options.zoom);
                true
            }
            _ => false,
        }
    }

    pub fn marker_event(&mut self, handle: MarkerHandle, event: MarkerEvent) -> Option<MarkerInteraction> {
        let MapState::Ready(widget) = &mut self.state else {
            return None;
        };
        let marker = self.markers.iter().find(|m| m.handle == handle)?;
        let photo_id = marker.photo_id?;

        let interaction = match event {
            MarkerEvent::Click => MarkerInteraction::InfoPopup {
                photo_id,
                title: marker.title.clone(),
                coordinate: marker.position,
            },
            MarkerEvent::DoubleClick => MarkerInteraction::OpenViewer { photo_id },
            MarkerEvent::Hover => {
                widget.set_animation(handle, Some(MarkerAnimation::Bounce));
                MarkerInteraction::Bounce {
                    handle,
                    duration: self.bounce_duration,
                }
            }
        };
        Some(interaction)
    }

    /// Stops a bounce started by a hover. No-op if the marker is gone.
    pub fn end_bounce(&mut self, handle: MarkerHandle) -> bool {
        let MapState::Ready(widget) = &mut self.state else {
            return false;
        };
        if !self.markers.iter().any(|m| m.handle == handle) {
            return false;
        }
        widget.set_animation(handle, None);
        true
    }

    pub fn markers(&self) -> &[LiveMarker] {
        &self.markers
    }

    pub fn user_marker(&self) -> Option<&LiveMarker> {
        self.user_marker.as_ref()
    }

    pub fn pending(&self) -> &PendingMarkerQueue {
        &self.pending
    }

    pub fn marker_for_photo(&self, photo_id: PhotoId) -> Option<MarkerHandle> {
        self.markers
            .iter()
            .find(|m| m.photo_id == Some(photo_id))
            .map(|m| m.handle)
    }
}
