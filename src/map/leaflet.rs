//! Map widget backed by the Leaflet page. The widget keeps a view model that
//! the page fetches from `/api/map` and renders with Leaflet.

use anyhow::Result;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

use crate::geo::{Bounds, Coordinate};
use crate::registry::PhotoId;

use super::{MapOptions, MapWidget, MapWidgetFactory, MarkerAnimation, MarkerHandle, MarkerIcon, MarkerSpec};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Viewport {
    Center { center: Coordinate, zoom: u8 },
    Fit { bounds: Bounds },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedMarker {
    pub handle: MarkerHandle,
    pub position: Coordinate,
    pub icon: MarkerIcon,
    pub title: String,
    pub animation: Option<MarkerAnimation>,
    pub photo_id: Option<PhotoId>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MapView {
    pub ready: bool,
    pub viewport: Option<Viewport>,
    /// Bumped whenever the page should move the camera.
    pub viewport_revision: u64,
    pub markers: Vec<PublishedMarker>,
    /// Bumped on every change.
    pub revision: u64,
}

/// View model shared between the widget living inside the session and the
/// HTTP handlers serving it.
#[derive(Debug, Clone, Default)]
pub struct SharedMapView(Arc<RwLock<MapView>>);

impl SharedMapView {
    pub fn snapshot(&self) -> MapView {
        self.0.read().clone()
    }

    fn update(&self, f: impl FnOnce(&mut MapView)) {
        let mut view = self.0.write();
        f(&mut view);
        view.revision += 1;
    }
}

pub struct LeafletMap {
    view: SharedMapView,
    zoom: u8,
    next_handle: u64,
}

impl MapWidget for LeafletMap {
    fn create_marker(&mut self, marker: MarkerSpec) -> MarkerHandle {
        let handle = MarkerHandle::new(self.next_handle);
        self.next_handle += 1;
        self.view.update(|view| {
            view.markers.push(PublishedMarker {
                handle,
                position: marker.position,
                icon: marker.icon,
                title: marker.title,
                animation: marker.animation,
                photo_id: marker.photo_id,
            })
        });
        handle
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        self.view.update(|view| view.markers.retain(|m| m.handle != handle));
    }

    fn set_animation(&mut self, handle: MarkerHandle, animation: Option<MarkerAnimation>) {
        self.view.update(|view| {
            if let Some(marker) = view.markers.iter_mut().find(|m| m.handle == handle) {
                marker.animation = animation;
            }
        });
    }

    fn set_center(&mut self, center: Coordinate) {
        let zoom = self.zoom;
        self.view.update(|view| {
            view.viewport = Some(Viewport::Center { center, zoom });
            view.viewport_revision += 1;
        });
    }

    fn set_zoom(&mut self, zoom: u8) {
        self.zoom = zoom;
        self.view.update(|view| {
            if let Some(Viewport::Center { zoom: current, .. }) = &mut view.viewport {
                *current = zoom;
                view.viewport_revision += 1;
            }
        });
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        self.view.update(|view| {
            view.viewport = Some(Viewport::Fit { bounds });
            view.viewport_revision += 1;
        });
    }
}

#[derive(Debug, Clone, Default)]
pub struct LeafletFactory {
    view: SharedMapView,
}

impl LeafletFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> SharedMapView {
        self.view.clone()
    }
}

impl MapWidgetFactory for LeafletFactory {
    fn create_map(&self, options: &MapOptions) -> Result<Box<dyn MapWidget>> {
        self.view.update(|view| {
            view.ready = true;
            view.markers.clear();
            view.viewport = Some(Viewport::Center {
                center: options.center,
                zoom: options.zoom,
            });
            view.viewport_revision += 1;
        });
        Ok(Box::new(LeafletMap {
            view: self.view.clone(),
            zoom: options.zoom,
            next_handle: 1,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> MapOptions {
        MapOptions {
            center: Coordinate::new(37.5665, 126.978),
            zoom: 15,
        }
    }

    #[test]
    fn view_reflects_widget_calls() {
        let factory = LeafletFactory::new();
        assert!(!factory.view().snapshot().ready);

        let mut map = factory.create_map(&options()).unwrap();
        let a = map.create_marker(MarkerSpec {
            position: Coordinate::new(1.0, 2.0),
            icon: MarkerIcon::Photo,
            title: "a.jpg".into(),
            animation: Some(MarkerAnimation::Drop),
            photo_id: None,
        });
        let b = map.create_marker(MarkerSpec {
            position: Coordinate::new(3.0, 4.0),
            icon: MarkerIcon::Photo,
            title: "b.jpg".into(),
            animation: None,
            photo_id: None,
        });
        assert_ne!(a, b);

        map.set_animation(b, Some(MarkerAnimation::Bounce));
        map.remove_marker(a);

        let view = factory.view().snapshot();
        assert!(view.ready);
        assert_eq!(view.markers.len(), 1);
        assert_eq!(view.markers[0].title, "b.jpg");
        assert_eq!(view.markers[0].animation, Some(MarkerAnimation::Bounce));
    }

    #[test]
    fn viewport_changes_bump_the_revision() {
        let factory = LeafletFactory::new();
        let mut map = factory.create_map(&options()).unwrap();
        let before = factory.view().snapshot().viewport_revision;

        let bounds = Bounds {
            south: 1.0,
            west: 2.0,
            north: 3.0,
            east: 4.0,
        };
        map.fit_bounds(bounds);
        let view = factory.view().snapshot();
        assert_eq!(view.viewport, Some(Viewport::Fit { bounds }));
        assert!(view.viewport_revision > before);

        map.set_center(Coordinate::new(5.0, 6.0));
        map.set_zoom(12);
        assert_eq!(
            factory.view().snapshot().viewport,
            Some(Viewport::Center {
                center: Coordinate::new(5.0, 6.0),
                zoom: 12
            })
        );
    }
}
