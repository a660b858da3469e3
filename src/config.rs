use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

/// Contents of the settings file. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub main_window: WindowSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub title: String,
    /// Requested graphics API version. Only reported; wgpu picks the backend.
    pub gl_version: (u32, u32),
    pub window_size: (u32, u32),
    pub aspect_ratio: f32,
    pub resizable: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Orbit Mesh".to_string(),
            gl_version: (3, 3),
            window_size: (1280, 720),
            aspect_ratio: 16.0 / 9.0,
            resizable: true,
        }
    }
}

impl Settings {
    /// Loads settings from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid settings in {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.main_window.window_size, (1280, 720));
        assert_eq!(settings.main_window.gl_version, (3, 3));
    }

    #[test]
    fn partial_table_keeps_other_defaults() {
        let settings = Settings::from_toml(
            r#"
            [main_window]
            title = "Sombrero"
            window_size = [800, 600]
            "#,
        )
        .unwrap();
        assert_eq!(settings.main_window.title, "Sombrero");
        assert_eq!(settings.main_window.window_size, (800, 600));
        assert!(settings.main_window.resizable);
        assert_eq!(settings.main_window.aspect_ratio, 16.0 / 9.0);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[main_window\ntitle = 3").unwrap();
        let err = Settings::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("invalid settings"));
    }

    #[test]
    fn wrong_types_are_rejected() {
        assert!(Settings::from_toml("[main_window]\nresizable = \"yes\"").is_err());
    }
}
