// src/config.rs - Player settings, persisted as JSON in the user config dir
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LandmarkSourceKind {
    Camera,
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Seconds a held gesture must wait before it can fire again.
    pub gesture_cooldown_secs: f64,
    /// Forward/rewind step, in seconds of video.
    pub seek_step_secs: f64,
    pub tick_interval_ms: u64,
    pub camera_index: u32,
    pub landmark_source: LandmarkSourceKind,
    pub max_hands: usize,
    pub initial_volume: u8,
    pub media_extensions: Vec<String>,
    pub output_directory: PathBuf,
    pub logo_path: Option<PathBuf>,
    pub font_path: Option<PathBuf>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            gesture_cooldown_secs: 1.5,
            seek_step_secs: 2.0,
            tick_interval_ms: 16,
            camera_index: 0,
            landmark_source: LandmarkSourceKind::Camera,
            max_hands: 1,
            initial_volume: 100,
            media_extensions: ["mp4", "mov", "avi", "mkv", "webm"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            output_directory: directories::UserDirs::new()
                .and_then(|dirs| dirs.document_dir().map(|p| p.join("GesturePlayer")))
                .unwrap_or_else(|| PathBuf::from("./output")),
            logo_path: None,
            font_path: None,
        }
    }
}

impl PlayerConfig {
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "gestureplayer", "GesturePlayer")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Loads the user config, falling back to defaults when it is missing or
    /// unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => {
                info!("Loaded settings from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Ignoring settings file: {:#}", e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        Ok(config.sanitized())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
            .with_context(|| format!("Cannot write {}", path.display()))?;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()
            .ok_or_else(|| anyhow::anyhow!("No config directory on this system"))?;
        self.save_to(&path)
    }

    fn sanitized(mut self) -> Self {
        if !(self.gesture_cooldown_secs.is_finite() && self.gesture_cooldown_secs > 0.0) {
            self.gesture_cooldown_secs = Self::default().gesture_cooldown_secs;
        }
        if !(self.seek_step_secs.is_finite() && self.seek_step_secs > 0.0) {
            self.seek_step_secs = Self::default().seek_step_secs;
        }
        self.tick_interval_ms = self.tick_interval_ms.max(1);
        self.max_hands = self.max_hands.max(1);
        self.initial_volume = self.initial_volume.min(100);
        self
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.gesture_cooldown_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn is_media_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.media_extensions.iter().any(|known| known.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("gesture_player_{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: PlayerConfig =
            serde_json::from_str(r#"{ "gesture_cooldown_secs": 1.2, "landmark_source": "simulated" }"#)
                .unwrap();
        assert_eq!(config.gesture_cooldown_secs, 1.2);
        assert_eq!(config.landmark_source, LandmarkSourceKind::Simulated);
        assert_eq!(config.seek_step_secs, 2.0);
        assert_eq!(config.max_hands, 1);
    }

    #[test]
    fn save_then_load() {
        let path = temp_path("config.json");
        let mut config = PlayerConfig::default();
        config.initial_volume = 40;
        config.save_to(&path).unwrap();

        let loaded = PlayerConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn bad_values_are_sanitized() {
        let path = temp_path("config.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{ "gesture_cooldown_secs": -3, "initial_volume": 250, "max_hands": 0 }"#).unwrap();

        let loaded = PlayerConfig::load_from(&path).unwrap();
        assert_eq!(loaded.gesture_cooldown_secs, 1.5);
        assert_eq!(loaded.initial_volume, 100);
        assert_eq!(loaded.max_hands, 1);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(PlayerConfig::load_from(&temp_path("nope.json")).is_err());
    }

    #[test]
    fn media_extension_check_ignores_case() {
        let config = PlayerConfig::default();
        assert!(config.is_media_file(Path::new("clip.MP4")));
        assert!(config.is_media_file(Path::new("/videos/a.mkv")));
        assert!(!config.is_media_file(Path::new("notes.txt")));
        assert!(!config.is_media_file(Path::new("README")));
    }
}
