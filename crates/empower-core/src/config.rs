//! Settings and configuration storage.
//!
//! Settings tune the stream pipeline (rounding, change thresholds, sampling
//! intervals, control settle time). Configuration documents (the N2K
//! configuration and the engine list) come from an external discovery
//! collaborator; [`ConfigStorage`] abstracts where they are read from so the
//! graph host does not care whether they live in files or are pushed over IPC.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::n2k::{EngineConfiguration, N2kConfiguration};

/// Errors that can occur during configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// The requested configuration was not found.
    NotFound(String),
    /// Failed to read configuration.
    ReadError(String),
    /// Failed to write configuration.
    WriteError(String),
    /// Configuration data is invalid.
    InvalidData(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "Configuration not found: {}", key),
            ConfigError::ReadError(msg) => write!(f, "Read error: {}", msg),
            ConfigError::WriteError(msg) => write!(f, "Write error: {}", msg),
            ConfigError::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Abstract configuration storage.
///
/// All methods are synchronous; async wrappers belong to the host.
pub trait ConfigStorage: Send + Sync {
    /// Load pipeline settings.
    fn load_settings(&self) -> Result<EmpowerSettings, ConfigError>;

    /// Save pipeline settings.
    fn save_settings(&self, settings: &EmpowerSettings) -> Result<(), ConfigError>;

    /// Load the N2K device configuration.
    fn load_n2k_config(&self) -> Result<N2kConfiguration, ConfigError>;

    /// Load the engine list.
    fn load_engine_config(&self) -> Result<EngineConfiguration, ConfigError>;
}

// ============================================================================
// Settings
// ============================================================================

/// Physical quantities with their own rounding and change threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Quantity {
    Voltage,
    Current,
    Temperature,
    Pressure,
    Frequency,
    Power,
    Volume,
    CapacityRemaining,
}

/// Rounding precision and minimum absolute change for one quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericFilter {
    /// Decimal places kept after rounding.
    pub decimals: u32,
    /// Smallest change from the last emitted value that is propagated.
    pub min_change: f64,
}

impl NumericFilter {
    pub const fn new(decimals: u32, min_change: f64) -> Self {
        Self {
            decimals,
            min_change,
        }
    }
}

/// Per-quantity numeric filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSettings {
    pub voltage: NumericFilter,
    pub current: NumericFilter,
    pub temperature: NumericFilter,
    pub pressure: NumericFilter,
    pub frequency: NumericFilter,
    pub power: NumericFilter,
    pub volume: NumericFilter,
    pub capacity_remaining: NumericFilter,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            voltage: NumericFilter::new(1, 0.1),
            current: NumericFilter::new(1, 0.1),
            temperature: NumericFilter::new(1, 0.5),
            pressure: NumericFilter::new(0, 100.0),
            frequency: NumericFilter::new(1, 0.1),
            power: NumericFilter::new(0, 10.0),
            volume: NumericFilter::new(1, 0.5),
            capacity_remaining: NumericFilter::new(0, 1.0),
        }
    }
}

impl FilterSettings {
    /// The filter configured for `quantity`.
    pub fn get(&self, quantity: Quantity) -> NumericFilter {
        match quantity {
            Quantity::Voltage => self.voltage,
            Quantity::Current => self.current,
            Quantity::Temperature => self.temperature,
            Quantity::Pressure => self.pressure,
            Quantity::Frequency => self.frequency,
            Quantity::Power => self.power,
            Quantity::Volume => self.volume,
            Quantity::CapacityRemaining => self.capacity_remaining,
        }
    }
}

/// GNSS location sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GnssSettings {
    pub sample_interval_ms: u64,
}

impl Default for GnssSettings {
    fn default() -> Self {
        Self {
            sample_interval_ms: 1000,
        }
    }
}

impl GnssSettings {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

/// Circuit control protocol timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlSettings {
    /// Wait between the actuation and release legs.
    pub settle_ms: u64,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self { settle_ms: 100 }
    }
}

impl ControlSettings {
    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// All pipeline settings. Every field has a default, so `{}` is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmpowerSettings {
    pub filters: FilterSettings,
    pub gnss: GnssSettings,
    pub control: ControlSettings,
    /// Fail a build when a looked-up device channel has never been populated.
    pub strict_channels: bool,
}

// ============================================================================
// File storage
// ============================================================================

/// File-based storage rooted at a directory:
/// `settings.json`, `n2k.json`, `engines.json`.
#[derive(Debug, Clone)]
pub struct FileConfigStorage {
    root: PathBuf,
}

impl FileConfigStorage {
    pub const SETTINGS_FILE: &'static str = "settings.json";
    pub const N2K_FILE: &'static str = "n2k.json";
    pub const ENGINES_FILE: &'static str = "engines.json";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> Result<T, ConfigError> {
        let path = self.root.join(file);
        let text = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::NotFound(path.display().to_string()),
            _ => ConfigError::ReadError(format!("{}: {}", path.display(), e)),
        })?;
        serde_json::from_str(&text)
            .map_err(|e| ConfigError::InvalidData(format!("{}: {}", path.display(), e)))
    }

    fn write<T: Serialize>(&self, file: &str, value: &T) -> Result<(), ConfigError> {
        let path = self.root.join(file);
        let text = serde_json::to_string_pretty(value)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        std::fs::write(&path, text)
            .map_err(|e| ConfigError::WriteError(format!("{}: {}", path.display(), e)))
    }
}

impl ConfigStorage for FileConfigStorage {
    fn load_settings(&self) -> Result<EmpowerSettings, ConfigError> {
        match self.read(Self::SETTINGS_FILE) {
            Err(ConfigError::NotFound(_)) => Ok(EmpowerSettings::default()),
            other => other,
        }
    }

    fn save_settings(&self, settings: &EmpowerSettings) -> Result<(), ConfigError> {
        self.write(Self::SETTINGS_FILE, settings)
    }

    fn load_n2k_config(&self) -> Result<N2kConfiguration, ConfigError> {
        self.read(Self::N2K_FILE)
    }

    fn load_engine_config(&self) -> Result<EngineConfiguration, ConfigError> {
        match self.read(Self::ENGINES_FILE) {
            Err(ConfigError::NotFound(_)) => Ok(EngineConfiguration::default()),
            other => other,
        }
    }
}
