// Port configuration
pub const DEFAULT_PORT: u16 = 3001;

// Upload limits
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024; // 5MB

// Map defaults (Seoul City Hall)
pub const DEFAULT_LATITUDE: f64 = 37.5665;
pub const DEFAULT_LONGITUDE: f64 = 126.9780;
pub const DEFAULT_ZOOM: u8 = 15;

// Spread applied around the user's location so photos taken in one spot don't stack
pub const RANDOM_OFFSET: f64 = 0.001;

// UI timings, milliseconds
pub const BOUNCE_ANIMATION_DURATION_MS: u64 = 700;
pub const SUCCESS_MESSAGE_DURATION_MS: u64 = 3000;
pub const LOCATION_TIMEOUT_MS: u64 = 10_000;

// Simulated upload progress
pub const PROGRESS_TICK_MS: u64 = 200;
pub const PROGRESS_GRACE_MS: u64 = 500;
pub const PROGRESS_MAX_STEP: f64 = 15.0;
pub const PROGRESS_MIN_STEP: f64 = 0.5;

// Image sizes
pub const PREVIEW_SIZE: u32 = 240;
pub const JPEG_QUALITY: u8 = 85;

pub const USER_LOCATION_TITLE: &str = "My current location";

pub const MAP_HELP: &str = "🗺️ Using the map

📍 Red markers: uploaded photo locations
🔵 Blue dot: your current location

📱 Markers:
• Click: show photo info
• Double-click: open the photo
• Hover: bounce

🎛️ Controls:
📍 Jump to my location
🖼️ Zoom to fit every photo
❓ Show this help";
