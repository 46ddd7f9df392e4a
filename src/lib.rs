//! PhotoPin: pick photos, tag them with your location and browse them as
//! markers on a Leaflet map served from a local process.

pub mod constants;
pub mod events;
pub mod exif_parser;
pub mod file_input;
pub mod geo;
pub mod image_processing;
pub mod location;
pub mod map;
pub mod presentation;
pub mod registry;
pub mod server;
pub mod session;
pub mod settings;
pub mod upload;
pub mod utils;
