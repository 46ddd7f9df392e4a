use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::geo::Coordinate;

/// Opaque identifier handed out by [`PhotoRegistry::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoId(u64);

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PhotoId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(PhotoId)
    }
}

// A selected file: name, size, MIME type and its bytes
#[derive(Clone)]
pub struct PhotoBlob {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub data: Arc<[u8]>,
}

impl PhotoBlob {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: data.len() as u64,
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// A file known only by its metadata, for one too large to be read.
    pub fn unread(name: impl Into<String>, mime_type: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            data: Arc::from(Vec::new()),
        }
    }
}

impl fmt::Debug for PhotoBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhotoBlob")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PhotoEntry {
    pub id: PhotoId,
    pub blob: PhotoBlob,
    pub coordinate: Coordinate,
    pub admitted_at: DateTime<Local>,
}

impl PhotoEntry {
    pub fn name(&self) -> &str {
        &self.blob.name
    }
}

/// Ordered record of every admitted photo. Insertion order is display order.
#[derive(Debug)]
pub struct PhotoRegistry {
    photos: Vec<PhotoEntry>,
    next_id: u64,
}

impl Default for PhotoRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PhotoRegistry {
    pub fn new() -> Self {
        PhotoRegistry {
            photos: Vec::new(),
            next_id: 1,
        }
    }

    /// Assigns a fresh id and appends the photo. Ids come from a counter that
    /// only moves forward, so a removed id is never handed out again.
    pub fn admit(&mut self, blob: PhotoBlob, coordinate: Coordinate) -> PhotoEntry {
        let id = PhotoId(self.next_id);
        self.next_id += 1;

        let entry = PhotoEntry {
            id,
            blob,
            coordinate,
            admitted_at: Local::now(),
        };
        self.photos.push(entry.clone());
        entry
    }

    pub fn remove(&mut self, id: PhotoId) -> Option<PhotoEntry> {
        let index = self.photos.iter().position(|p| p.id == id)?;
        Some(self.photos.remove(index))
    }

    pub fn get(&self, id: PhotoId) -> Option<&PhotoEntry> {
        self.photos.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: PhotoId) -> bool {
        self.get(id).is_some()
    }

    /// First entry, in insertion order, whose file name equals `name`.
    pub fn find_by_name(&self, name: &str) -> Option<&PhotoEntry> {
        self.photos.iter().find(|p| p.blob.name == name)
    }

    pub fn all(&self) -> &[PhotoEntry] {
        &self.photos
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    /// Drops every entry and returns the ids that were removed.
    pub fn clear(&mut self) -> Vec<PhotoId> {
        self.photos.drain(..).map(|p| p.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn blob(name: &str) -> PhotoBlob {
        PhotoBlob::new(name, "image/jpeg", vec![0xFF, 0xD8, 0xFF])
    }

    fn here() -> Coordinate {
        Coordinate::new(37.5, 127.0)
    }

    #[test]
    fn admit_keeps_insertion_order() {
        let mut registry = PhotoRegistry::new();
        registry.admit(blob("a.jpg"), here());
        registry.admit(blob("b.jpg"), here());
        registry.admit(blob("c.jpg"), here());

        let names: Vec<_> = registry.all().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, ["a.jpg", "b.jpg", "c.jpg"]);
    }

    #[test]
    fn length_tracks_admits_minus_successful_removes() {
        let mut registry = PhotoRegistry::new();
        let mut admitted = 0;
        let mut removed = 0;
        let mut live = Vec::new();

        for round in 0..50u64 {
            let entry = registry.admit(blob(&format!("{round}.jpg")), here());
            admitted += 1;
            live.push(entry.id);

            if round % 3 == 0 {
                let victim = live.remove(0);
                if registry.remove(victim).is_some() {
                    removed += 1;
                }
                // A second removal of the same id is a miss.
                assert!(registry.remove(victim).is_none());
            }
            assert_eq!(registry.len(), admitted - removed);
        }

        let ids: HashSet<_> = registry.all().iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), registry.len());
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut registry = PhotoRegistry::new();
        let first = registry.admit(blob("a.jpg"), here()).id;
        registry.remove(first);
        registry.clear();
        let second = registry.admit(blob("a.jpg"), here()).id;
        assert_ne!(first, second);
    }

    #[test]
    fn find_by_name_returns_the_first_match() {
        let mut registry = PhotoRegistry::new();
        let first = registry.admit(blob("same.jpg"), here()).id;
        let second = registry.admit(blob("same.jpg"), Coordinate::new(1.0, 1.0)).id;

        assert_eq!(registry.find_by_name("same.jpg").map(|p| p.id), Some(first));
        registry.remove(first);
        assert_eq!(registry.find_by_name("same.jpg").map(|p| p.id), Some(second));
        assert!(registry.find_by_name("missing.jpg").is_none());
    }

    #[test]
    fn photo_id_round_trips_through_text() {
        let mut registry = PhotoRegistry::new();
        let id = registry.admit(blob("a.jpg"), here()).id;
        assert_eq!(id.to_string().parse::<PhotoId>().unwrap(), id);
    }
}
