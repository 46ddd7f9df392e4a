use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::geo::Coordinate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub port: u16,
    #[serde(default)]
    pub auto_open_browser: bool,
    pub max_file_size: u64,
    pub default_location: Coordinate,
    pub default_zoom: u8,
    pub random_offset: f64,
    pub bounce_animation_duration: u64,
    pub success_message_duration: u64,
    pub location_timeout: u64,
    #[serde(default)]
    pub debug_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            auto_open_browser: false,
            max_file_size: MAX_FILE_SIZE,
            default_location: Coordinate::new(DEFAULT_LATITUDE, DEFAULT_LONGITUDE),
            default_zoom: DEFAULT_ZOOM,
            random_offset: RANDOM_OFFSET,
            bounce_animation_duration: BOUNCE_ANIMATION_DURATION_MS,
            success_message_duration: SUCCESS_MESSAGE_DURATION_MS,
            location_timeout: LOCATION_TIMEOUT_MS,
            debug_mode: false,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Settings::default());
        }
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        Ok(Self::parse(&content))
    }

    /// Parses `key = value` lines. Keys are case-insensitive, so both
    /// `max_file_size` and `MAX_FILE_SIZE` work. Unknown keys and values that
    /// don't parse are ignored and the default is kept.
    pub fn parse(content: &str) -> Self {
        let mut settings = Settings::default();
        let mut config_map = HashMap::new();

        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') || line.is_empty() {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                config_map.insert(
                    key.trim().to_ascii_lowercase(),
                    value.trim().trim_matches('"').to_string(),
                );
            }
        }

        fn read<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str, slot: &mut T) {
            if let Some(value) = map.get(key) {
                match value.parse::<T>() {
                    Ok(parsed) => *slot = parsed,
                    Err(_) => tracing::warn!(key, value = %value, "ignoring invalid config value"),
                }
            }
        }

        read(&config_map, "port", &mut settings.port);
        read(&config_map, "auto_open_browser", &mut settings.auto_open_browser);
        read(&config_map, "max_file_size", &mut settings.max_file_size);
        read(&config_map, "default_location", &mut settings.default_location);
        read(&config_map, "default_zoom", &mut settings.default_zoom);
        read(&config_map, "random_offset", &mut settings.random_offset);
        read(&config_map, "bounce_animation_duration", &mut settings.bounce_animation_duration);
        read(&config_map, "success_message_duration", &mut settings.success_message_duration);
        read(&config_map, "location_timeout", &mut settings.location_timeout);
        read(&config_map, "debug_mode", &mut settings.debug_mode);

        settings
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Creating config directory")?;
        }
        std::fs::write(&config_path, self.to_ini()).context("Failed to write to config file")?;
        Ok(())
    }

    pub fn to_ini(&self) -> String {
        let mut content = String::new();
        content.push_str("# PhotoPin Configuration File\n");
        content.push_str(&format!("port = {}\n", self.port));
        content.push_str(&format!("auto_open_browser = {}\n", self.auto_open_browser));
        content.push_str(&format!("max_file_size = {}\n", self.max_file_size));
        content.push_str(&format!(
            "default_location = {}, {}\n",
            self.default_location.latitude, self.default_location.longitude
        ));
        content.push_str(&format!("default_zoom = {}\n", self.default_zoom));
        content.push_str(&format!("random_offset = {}\n", self.random_offset));
        content.push_str(&format!("bounce_animation_duration = {}\n", self.bounce_animation_duration));
        content.push_str(&format!("success_message_duration = {}\n", self.success_message_duration));
        content.push_str(&format!("location_timeout = {}\n", self.location_timeout));
        content.push_str(&format!("debug_mode = {}\n", self.debug_mode));
        content
    }

    pub fn bounce_duration(&self) -> Duration {
        Duration::from_millis(self.bounce_animation_duration)
    }

    pub fn success_message_duration(&self) -> Duration {
        Duration::from_millis(self.success_message_duration)
    }

    pub fn location_timeout(&self) -> Duration {
        Duration::from_millis(self.location_timeout)
    }

    pub fn config_path() -> PathBuf {
        crate::utils::get_config_path()
    }
}
