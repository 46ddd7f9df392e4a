//! Preview tiles shown under the upload area, kept 1:1 with the registry.

use serde::Serialize;

use crate::image_processing::ImageSource;
use crate::map::MapBinding;
use crate::registry::{PhotoEntry, PhotoId, PhotoRegistry};
use crate::session::SessionError;
use crate::utils::format_file_size;

#[derive(Debug, Clone)]
pub struct PreviewTile {
    pub id: PhotoId,
    pub name: String,
    pub size_label: String,
    pub coordinate_label: String,
    /// `None` when the file could not be decoded; the tile stays removable.
    pub image: Option<ImageSource>,
}

/// What the page needs to draw a tile.
#[derive(Debug, Clone, Serialize)]
pub struct TileView {
    pub id: PhotoId,
    pub name: String,
    pub size_label: String,
    pub coordinate_label: String,
    pub preview_url: Option<String>,
}

impl PreviewTile {
    pub fn view(&self) -> TileView {
        TileView {
            id: self.id,
            name: self.name.clone(),
            size_label: self.size_label.clone(),
            coordinate_label: self.coordinate_label.clone(),
            preview_url: self
                .image
                .as_ref()
                .map(|_| format!("/api/photos/{}/preview", self.id)),
        }
    }
}

#[derive(Debug, Default)]
pub struct PresentationSync {
    tiles: Vec<PreviewTile>,
}

impl PresentationSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tile(&mut self, entry: &PhotoEntry, image: Option<ImageSource>) {
        if self.tiles.iter().any(|t| t.id == entry.id) {
            tracing::warn!(photo = %entry.id, "tile already present");
            return;
        }
        self.tiles.push(PreviewTile {
            id: entry.id,
            name: entry.blob.name.clone(),
            size_label: format_file_size(entry.blob.size),
            coordinate_label: entry.coordinate.display(),
            image,
        });
    }

    pub fn remove_tile(&mut self, id: PhotoId) -> bool {
        let before = self.tiles.len();
        self.tiles.retain(|t| t.id != id);
        self.tiles.len() != before
    }

    /// User-initiated removal. Drops the registry entry, its marker or queued
    /// marker request and its tile under a single `&mut` borrow of each, so
    /// no caller can observe a half-removed photo.
    ///
    /// On a registry miss the marker and tile for `id` are still swept and
    /// the miss is reported as [`SessionError::PhotoNotFound`].
    pub fn remove_everything(
        &mut self,
        registry: &mut PhotoRegistry,
        map: &mut MapBinding,
        id: PhotoId,
    ) -> Result<PhotoEntry, SessionError> {
        let entry = registry.remove(id);
        let marker_removed = map.remove_photo_marker(id);
        let tile_removed = self.remove_tile(id);

        match entry {
            Some(entry) => {
                tracing::debug!(photo = %id, name = entry.name(), marker_removed, tile_removed, "photo removed");
                Ok(entry)
            }
            None => {
                tracing::warn!(photo = %id, marker_removed, tile_removed, "remove requested for unknown photo");
                Err(SessionError::PhotoNotFound(id))
            }
        }
    }

    pub fn clear(&mut self) -> usize {
        let count = self.tiles.len();
        self.tiles.clear();
        count
    }

    pub fn tiles(&self) -> &[PreviewTile] {
        &self.tiles
    }

    pub fn tile(&self, id: PhotoId) -> Option<&PreviewTile> {
        self.tiles.iter().find(|t| t.id == id)
    }
}
