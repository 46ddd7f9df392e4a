//! Coordinates, bounding boxes and the jitter used to spread photo markers.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Builds a coordinate, clamping latitude into [-90, 90] and wrapping
    /// longitude into [-180, 180].
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: latitude.clamp(-90.0, 90.0),
            longitude: wrap_longitude(longitude),
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Offsets both axes by an independent draw from `[-magnitude/2, magnitude/2)`.
    pub fn jittered<R: Rng + ?Sized>(&self, magnitude: f64, rng: &mut R) -> Self {
        let dlat = (rng.gen::<f64>() - 0.5) * magnitude;
        let dlng = (rng.gen::<f64>() - 0.5) * magnitude;
        Self::new(self.latitude + dlat, self.longitude + dlng)
    }

    /// Six-decimal label used by tiles, popups and the location panel.
    pub fn display(&self) -> String {
        format!("Latitude: {:.6}, Longitude: {:.6}", self.latitude, self.longitude)
    }

    /// Four-decimal label used inside marker info windows.
    pub fn short_display(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    pub fn share_url(&self) -> String {
        format!("https://maps.google.com/?q={},{}", self.latitude, self.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

impl FromStr for Coordinate {
    type Err = String;

    /// Parses `"LAT,LNG"` (whitespace allowed around either number).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| format!("expected LAT,LNG but got '{}'", s))?;
        let latitude: f64 = lat
            .trim()
            .parse()
            .map_err(|_| format!("invalid latitude '{}'", lat.trim()))?;
        let longitude: f64 = lng
            .trim()
            .parse()
            .map_err(|_| format!("invalid longitude '{}'", lng.trim()))?;
        let coordinate = Coordinate { latitude, longitude };
        if !coordinate.is_valid() {
            return Err(format!("coordinate out of range: {}", s));
        }
        Ok(coordinate)
    }
}

fn wrap_longitude(longitude: f64) -> f64 {
    if (-180.0..=180.0).contains(&longitude) {
        return longitude;
    }
    let wrapped = (longitude + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && longitude > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// Geographic bounding box of a set of coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    /// Returns `None` for an empty set.
    pub fn covering<'a, I>(coordinates: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Coordinate>,
    {
        let mut iter = coordinates.into_iter();
        let first = iter.next()?;
        let mut bounds = Bounds {
            south: first.latitude,
            west: first.longitude,
            north: first.latitude,
            east: first.longitude,
        };
        for c in iter {
            bounds.extend(c);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, c: &Coordinate) {
        self.south = self.south.min(c.latitude);
        self.north = self.north.max(c.latitude);
        self.west = self.west.min(c.longitude);
        self.east = self.east.max(c.longitude);
    }

    pub fn contains(&self, c: &Coordinate) -> bool {
        c.latitude >= self.south
            && c.latitude <= self.north
            && c.longitude >= self.west
            && c.longitude <= self.east
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
    }
}
