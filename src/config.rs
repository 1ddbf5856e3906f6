//! Configuration for the motion recorder.

use crate::collector::types::SensorType;
use crate::core::export::ExportFormat;
use crate::core::live_window::{DEFAULT_CHART_WINDOW, DEFAULT_LIVE_CAPACITY};
use crate::relay::RelayConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Lowest accepted sampling rate in Hz.
pub const MIN_SAMPLING_RATE: u32 = 1;
/// Highest accepted sampling rate in Hz.
pub const MAX_SAMPLING_RATE: u32 = 100;

pub const DEFAULT_SAMPLING_RATE: u32 = 50;

/// Activity labels offered out of the box.
pub const DEFAULT_ACTIVITIES: [&str; 5] = ["Walking", "Running", "Biking", "Standing", "Sitting"];

/// Main configuration for the recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Requested sampling rate in Hz
    pub sampling_rate: u32,

    /// Which sensors to start when recording
    pub selected_sensors: SensorSelection,

    /// Format used by `export` when none is given
    pub export_format: ExportFormat,

    /// Entries kept in the live window
    pub live_window_capacity: usize,

    /// Entries shown by a live chart
    pub chart_window: usize,

    /// Known activity labels
    pub activities: Vec<String>,

    /// Stream relay endpoint
    pub relay: RelayConfig,

    /// Directory exported files are written to
    pub export_path: PathBuf,

    /// Directory for persisted statistics
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("motion-recorder");

        Self {
            sampling_rate: DEFAULT_SAMPLING_RATE,
            selected_sensors: SensorSelection::default(),
            export_format: ExportFormat::default(),
            live_window_capacity: DEFAULT_LIVE_CAPACITY,
            chart_window: DEFAULT_CHART_WINDOW,
            activities: DEFAULT_ACTIVITIES.iter().map(|a| a.to_string()).collect(),
            relay: RelayConfig::default(),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("motion-recorder")
            .join("config.json")
    }

    /// Path of the persisted statistics file.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("stats.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path).map_err(|e| ConfigError::Io(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_sampling_rate(self.sampling_rate)
    }

    /// Add an activity label to the catalog.
    pub fn add_activity(&mut self, name: &str) -> Result<(), ConfigError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::InvalidActivity(
                "activity name is empty".to_string(),
            ));
        }
        if self.activities.iter().any(|a| a == name) {
            return Err(ConfigError::InvalidActivity(format!(
                "activity '{name}' already exists"
            )));
        }
        self.activities.push(name.to_string());
        Ok(())
    }
}

pub fn validate_sampling_rate(rate: u32) -> Result<(), ConfigError> {
    if (MIN_SAMPLING_RATE..=MAX_SAMPLING_RATE).contains(&rate) {
        Ok(())
    } else {
        Err(ConfigError::InvalidSamplingRate(rate))
    }
}

/// Set of sensors to start when recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorSelection(BTreeSet<SensorType>);

impl Default for SensorSelection {
    fn default() -> Self {
        Self([SensorType::Accelerometer, SensorType::Gyroscope].into_iter().collect())
    }
}

impl SensorSelection {
    pub fn all() -> Self {
        Self(SensorType::ALL.into_iter().collect())
    }

    /// Parse a comma-separated list such as `accelerometer,gyroscope` or `all`.
    pub fn from_csv(s: &str) -> Result<Self, ConfigError> {
        let mut selected = BTreeSet::new();
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            if name.eq_ignore_ascii_case("all") {
                return Ok(Self::all());
            }
            let sensor = name
                .parse::<SensorType>()
                .map_err(|_| ConfigError::UnknownSensor(name.to_string()))?;
            selected.insert(sensor);
        }
        Ok(Self(selected))
    }

    pub fn contains(&self, sensor: SensorType) -> bool {
        self.0.contains(&sensor)
    }

    pub fn iter(&self) -> impl Iterator<Item = SensorType> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<SensorType> for SensorSelection {
    fn from_iter<I: IntoIterator<Item = SensorType>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
    #[error("Sampling rate {0} Hz is outside 1-100 Hz")]
    InvalidSamplingRate(u32),
    #[error("Unknown sensor type: {0}")]
    UnknownSensor(String),
    #[error("Invalid activity: {0}")]
    InvalidActivity(String),
}
