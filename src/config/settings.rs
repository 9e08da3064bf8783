use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::capture::DEFAULT_CHUNK_INTERVAL;
use crate::coordinator::{SurfaceParams, DEFAULT_POLL_INTERVAL};

/// Runtime configuration for the recording core.
#[derive(Debug, Clone)]
pub struct Settings {
    /// How much capture goes into one chunk.
    pub chunk_interval: Duration,
    /// How often the coordinator checks the control surface.
    pub poll_interval: Duration,
    /// Geometry and singleton name of the control surface.
    pub surface: SurfaceParams,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_interval: DEFAULT_CHUNK_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            surface: SurfaceParams::default(),
        }
    }
}

/// Optional overlay read from a TOML file; anything absent keeps its default.
#[derive(Debug, Clone, Default, Deserialize)]
struct TomlSettings {
    chunk_interval_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    surface: Option<TomlSurface>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TomlSurface {
    name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

impl Settings {
    /// Load settings from a TOML file, falling back to defaults for missing
    /// keys. A missing file yields plain defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let overlay: TomlSettings = toml::from_str(contents)?;
        let mut settings = Self::default();

        if let Some(ms) = overlay.chunk_interval_ms {
            settings.chunk_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = overlay.poll_interval_ms {
            settings.poll_interval = Duration::from_millis(ms);
        }
        if let Some(surface) = overlay.surface {
            if let Some(name) = surface.name {
                settings.surface.name = name;
            }
            if let Some(width) = surface.width {
                settings.surface.width = width;
            }
            if let Some(height) = surface.height {
                settings.surface.height = height;
            }
        }

        Ok(settings)
    }
}
