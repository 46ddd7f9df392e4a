use crate::geo::Coordinate;
use crate::registry::PhotoId;

use super::{LiveMarker, MapWidget, MarkerAnimation, MarkerIcon, MarkerSpec};

/// A photo marker requested before the map existed.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMarkerRequest {
    pub photo_id: PhotoId,
    pub title: String,
    pub coordinate: Coordinate,
}

impl PendingMarkerRequest {
    pub(crate) fn to_spec(&self) -> MarkerSpec {
        MarkerSpec {
            position: self.coordinate,
            icon: MarkerIcon::Photo,
            title: self.title.clone(),
            animation: Some(MarkerAnimation::Drop),
            photo_id: Some(self.photo_id),
        }
    }
}

/// FIFO buffer of marker requests, drained once when the map becomes ready.
#[derive(Debug, Default)]
pub struct PendingMarkerQueue {
    requests: Vec<PendingMarkerRequest>,
}

impl PendingMarkerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, request: PendingMarkerRequest) {
        self.requests.push(request);
    }

    /// Materializes every queued request in insertion order. The queue is
    /// emptied before the first marker is created, so it is never observed
    /// half drained.
    pub fn drain_into(&mut self, widget: &mut dyn MapWidget) -> Vec<LiveMarker> {
        let requests = std::mem::take(&mut self.requests);
        requests
            .into_iter()
            .map(|request| {
                let handle = widget.create_marker(request.to_spec());
                LiveMarker {
                    handle,
                    photo_id: Some(request.photo_id),
                    title: request.title,
                    position: request.coordinate,
                }
            })
            .collect()
    }

    /// Cancels the first request titled `name`.
    pub fn remove_by_name(&mut self, name: &str) -> Option<PendingMarkerRequest> {
        let index = self.requests.iter().position(|r| r.title == name)?;
        Some(self.requests.remove(index))
    }

    pub fn remove_by_photo(&mut self, photo_id: PhotoId) -> Option<PendingMarkerRequest> {
        let index = self.requests.iter().position(|r| r.photo_id == photo_id)?;
        Some(self.requests.remove(index))
    }

    pub fn clear(&mut self) -> usize {
        let count = self.requests.len();
        self.requests.clear();
        count
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingMarkerRequest> {
        self.requests.iter()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
