//! Loader & Processing Settings
//!
//! Plain data structs with sensible defaults. Both can be deserialized from
//! JSON so that game configurations can tune them:
//!
//! ```rust,ignore
//! use forge::settings::LoaderSettings;
//!
//! let settings = LoaderSettings::from_json(r#"{ "palette": "gfx/palette.lmp" }"#)?;
//! let settings = LoaderSettings {
//!     image_sprite_extensions: vec!["png".into()],
//!     ..Default::default()
//! };
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::Result;

// ---------------------------------------------------------------------------
// LoaderSettings
// ---------------------------------------------------------------------------

/// Controls how entity models and their skins are loaded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    /// Palette used to expand indexed skins (`.lmp` or `.pcx`), relative to the file system root.
    pub palette: Option<PathBuf>,

    /// Extensions loaded as flat image sprites.
    pub image_sprite_extensions: Vec<String>,

    /// Extensions tried, in order, for skin references without an extension (MD3 shaders).
    pub skin_extensions: Vec<String>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            palette: None,
            image_sprite_extensions: ["png", "jpg", "jpeg", "tga", "bmp", "webp"]
                .into_iter()
                .map(String::from)
                .collect(),
            skin_extensions: ["tga", "png", "jpg", "wal"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl LoaderSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn with_palette(mut self, palette: impl Into<PathBuf>) -> Self {
        self.palette = Some(palette.into());
        self
    }
}

// ---------------------------------------------------------------------------
// ProcessSettings
// ---------------------------------------------------------------------------

/// Controls how the resource manager is driven.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProcessSettings {
    /// Per-frame processing budget in milliseconds. `None` processes everything.
    pub timeout_ms: Option<u64>,

    /// Upper bound on passes made by a synchronous process.
    pub max_sync_passes: usize,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            timeout_ms: Some(20),
            max_sync_passes: 64,
        }
    }
}

impl ProcessSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_settings_from_partial_json() {
        let settings = LoaderSettings::from_json(r#"{ "palette": "gfx/palette.lmp" }"#).unwrap();
        assert_eq!(settings.palette, Some(PathBuf::from("gfx/palette.lmp")));
        assert_eq!(
            settings.image_sprite_extensions,
            LoaderSettings::default().image_sprite_extensions
        );
    }

    #[test]
    fn test_process_settings_timeout() {
        assert_eq!(
            ProcessSettings::default().timeout(),
            Some(Duration::from_millis(20))
        );
        let unbounded = ProcessSettings::from_json(r#"{ "timeout_ms": null }"#).unwrap();
        assert_eq!(unbounded.timeout(), None);
    }
}
