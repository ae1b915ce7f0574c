//! Runtime configuration for seatboard-daemon.
//!
//! Read once at startup from `~/.seatboard/daemon.toml`. A missing file means
//! defaults; every section and field is optional.

use seatboard_core::SeatLayout;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CONFIG_RELATIVE_PATH: &str = ".seatboard/daemon.toml";
const DEFAULT_DB_RELATIVE_PATH: &str = ".seatboard/daemon/students.db";

#[derive(Debug, Clone, Deserialize)]
pub struct ClockConfig {
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

fn default_tick_interval_secs() -> u64 {
    60
}

impl ClockConfig {
    /// Clamped to at least one second.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn db_path(&self) -> Result<PathBuf, String> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => {
                let home =
                    dirs::home_dir().ok_or_else(|| "Home directory not found".to_string())?;
                Ok(home.join(DEFAULT_DB_RELATIVE_PATH))
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DaemonConfig {
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Replaces the built-in reading-room layout when present.
    #[serde(default)]
    pub layout: Option<SeatLayout>,
}

impl DaemonConfig {
    pub fn seat_layout(&self) -> SeatLayout {
        self.layout.clone().unwrap_or_else(SeatLayout::reading_room)
    }
}

pub fn default_config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or_else(|| "Home directory not found".to_string())?;
    Ok(home.join(DEFAULT_CONFIG_RELATIVE_PATH))
}

pub fn load_config(path: Option<PathBuf>) -> Result<DaemonConfig, String> {
    let config_path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };

    if !config_path.exists() {
        return Ok(DaemonConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|err| {
        format!(
            "Failed to read daemon config {}: {}",
            config_path.display(),
            err
        )
    })?;
    toml::from_str::<DaemonConfig>(&content).map_err(|err| {
        format!(
            "Failed to parse daemon config {}: {}",
            config_path.display(),
            err
        )
    })
}
