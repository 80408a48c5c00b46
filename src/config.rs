//! Persisted engine settings loaded from `config.toml`.
//!
//! Every field carries a serde default so configs written by older builds
//! keep loading as settings evolve. Values that still need calibration
//! (notably the DTW missing-hand penalty) live here rather than as buried
//! constants.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs;

/// Default filename used to store the engine configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Engine settings that belong in the TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub capture: CaptureSettings,
    #[serde(default)]
    pub dtw: DtwSettings,
    #[serde(default)]
    pub classifier: ClassifierSettings,
    #[serde(default)]
    pub training: TrainingSettings,
}

/// Recording window and tick behavior for the sequence recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Target interval between recorded frames, in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Countdown shown before the hand-wait phase, in seconds.
    #[serde(default = "default_countdown_seconds")]
    pub countdown_seconds: u64,
    /// How long to wait for a hand to appear before rejecting the session.
    #[serde(default = "default_wait_for_hand_timeout_ms")]
    pub wait_for_hand_timeout_ms: u64,
    /// Sequences shorter than this many frames are rejected at save time.
    #[serde(default = "default_min_sequence_frames")]
    pub min_sequence_frames: usize,
}

/// Distance engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DtwSettings {
    /// Local-cost penalty applied per hand present in exactly one frame.
    ///
    /// Calibration note: the magnitude was not derived from data; tune it
    /// against recorded sessions before trusting borderline matches.
    #[serde(default = "default_missing_hand_penalty")]
    pub missing_hand_penalty: f32,
    /// Optional Sakoe-Chiba band half-width. `None` evaluates the full
    /// alignment grid; `auto_band` suggests a width when enabling this.
    #[serde(default)]
    pub band_window: Option<usize>,
}

/// k-NN voting parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSettings {
    /// Neighbor count used for voting. Small odd values work best.
    #[serde(default = "default_k")]
    pub k: usize,
}

/// Training validation thresholds and export shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSettings {
    /// Classes below this sequence count block training entirely.
    #[serde(default = "default_min_sequences_per_class")]
    pub min_sequences_per_class: usize,
    /// Classes below this count train with a logged warning.
    #[serde(default = "default_recommended_sequences_per_class")]
    pub recommended_sequences_per_class: usize,
    /// Frame count used by the fixed-length export representation.
    #[serde(default = "default_downsample_frames")]
    pub downsample_frames: usize,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            countdown_seconds: default_countdown_seconds(),
            wait_for_hand_timeout_ms: default_wait_for_hand_timeout_ms(),
            min_sequence_frames: default_min_sequence_frames(),
        }
    }
}

impl Default for DtwSettings {
    fn default() -> Self {
        Self {
            missing_hand_penalty: default_missing_hand_penalty(),
            band_window: None,
        }
    }
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self { k: default_k() }
    }
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            min_sequences_per_class: default_min_sequences_per_class(),
            recommended_sequences_per_class: default_recommended_sequences_per_class(),
            downsample_frames: default_downsample_frames(),
        }
    }
}

fn default_tick_interval_ms() -> u64 {
    33
}

fn default_countdown_seconds() -> u64 {
    3
}

fn default_wait_for_hand_timeout_ms() -> u64 {
    10_000
}

fn default_min_sequence_frames() -> usize {
    10
}

fn default_missing_hand_penalty() -> f32 {
    8.0
}

fn default_k() -> usize {
    3
}

fn default_min_sequences_per_class() -> usize {
    2
}

fn default_recommended_sequences_per_class() -> usize {
    5
}

fn default_downsample_frames() -> usize {
    30
}

/// Errors raised while loading or saving the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No application directory available: {0}")]
    AppDir(#[from] app_dirs::AppDirError),
    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write config at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Config at {path} is not valid TOML: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl EngineConfig {
    /// Load the config from the default `.mudra` location, falling back to
    /// defaults when no file exists yet.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = app_dirs::app_root_dir()?.join(CONFIG_FILE_NAME);
        Self::load_from(&path)
    }

    /// Load the config from an explicit path; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Persist the config as TOML at an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let raw = toml::to_string_pretty(self)?;
        std::fs::write(path, raw).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
