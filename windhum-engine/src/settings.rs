//! YAML settings file.
//!
//! ```yaml
//! turbine:
//!   distance_m: 300.0
//!   rpm: 15.0
//!   output_profile: laptop
//! audio:
//!   device: null
//!   tick_interval_ms: 16
//!   variant: extended
//! export:
//!   directory: .
//!   file_name: wind_turbine_10s.wav
//!   duration_secs: 10.0
//! ```
//!
//! Every section and field is optional; missing values take their defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::export::{DEFAULT_CAPTURE, DEFAULT_FILE_NAME};
use crate::mapping::MappingVariant;
use crate::ticker::DEFAULT_TICK;
use crate::turbine::TurbineSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Output device name; `None` selects the host default.
    pub device: Option<String>,
    /// Meter redraw period.
    pub tick_interval_ms: u64,
    pub variant: MappingVariant,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            device: None,
            tick_interval_ms: DEFAULT_TICK.as_millis() as u64,
            variant: MappingVariant::default(),
        }
    }
}

impl AudioSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub directory: PathBuf,
    pub file_name: String,
    pub duration_secs: f32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            file_name: DEFAULT_FILE_NAME.to_string(),
            duration_secs: DEFAULT_CAPTURE.as_secs_f32(),
        }
    }
}

impl ExportSettings {
    /// Capture length; invalid values fall back to the default.
    pub fn duration(&self) -> Duration {
        Duration::try_from_secs_f32(self.duration_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_CAPTURE)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorSettings {
    pub turbine: TurbineSettings,
    pub audio: AudioSettings,
    pub export: ExportSettings,
}

impl SimulatorSettings {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        log::debug!("loading settings from {}", path.display());
        let contents = fs::read_to_string(path)
            .map_err(|source| SettingsError::Read { path: path.to_path_buf(), source })?;
        serde_yml::from_str(&contents)
            .map_err(|source| SettingsError::Parse { path: path.to_path_buf(), source })
    }

    /// Like [`from_file`](Self::from_file), but a missing file yields defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let yaml = serde_yml::to_string(self)?;
        fs::write(path, yaml).map_err(|source| SettingsError::Write { path: path.to_path_buf(), source })
    }
}
