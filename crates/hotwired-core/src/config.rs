use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::shutter::{LinePins, Position, PositionState};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub shutter: ShutterConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub compat: CompatConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub accessory: AccessoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path (holds the IPC socket)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Wiring and travel characteristics of the shutter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutterConfig {
    /// Kernel GPIO number wired to the remote's "up" button
    #[serde(default = "default_pin_up")]
    pub pin_up: u32,
    /// Kernel GPIO number wired to the remote's "down" button
    #[serde(default = "default_pin_down")]
    pub pin_down: u32,
    /// Kernel GPIO number wired to the remote's "my" (preset / stop) button
    #[serde(default = "default_pin_my_position")]
    pub pin_my_position: u32,
    /// Full travel time from closed to open, in seconds
    #[serde(default = "default_movement_duration")]
    pub movement_duration_up: f64,
    /// Full travel time from open to closed, in seconds
    #[serde(default = "default_movement_duration")]
    pub movement_duration_down: f64,
    /// Position assumed at startup: "up" means open, anything else closed
    #[serde(default = "default_position")]
    pub default_position: String,
}

impl Default for ShutterConfig {
    fn default() -> Self {
        Self {
            pin_up: default_pin_up(),
            pin_down: default_pin_down(),
            pin_my_position: default_pin_my_position(),
            movement_duration_up: default_movement_duration(),
            movement_duration_down: default_movement_duration(),
            default_position: default_position(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Milliseconds per unit of movement duration between two 10% steps.
    /// With durations in seconds, 100 makes ten steps cover a full travel.
    #[serde(default = "default_step_scale_ms")]
    pub step_scale_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            step_scale_ms: default_step_scale_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatConfig {
    /// Report DECREASING while opening fully (target 100), as the legacy
    /// accessory always did. Also selects the "down" duration for that move.
    #[serde(default = "default_true")]
    pub open_reports_decreasing: bool,
}

impl Default for CompatConfig {
    fn default() -> Self {
        Self {
            open_reports_decreasing: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Line backend: "sysfs" or "mock"
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Root of the sysfs GPIO class directory
    #[serde(default = "default_gpio_root")]
    pub gpio_root: PathBuf,
    /// Lines idle high and are pulled low for a button press
    #[serde(default = "default_true")]
    pub active_low: bool,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            gpio_root: default_gpio_root(),
            active_low: default_true(),
        }
    }
}

/// Identification reported to hosts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessoryConfig {
    #[serde(default = "default_accessory_name")]
    pub name: String,
    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_serial_number")]
    pub serial_number: String,
}

impl Default for AccessoryConfig {
    fn default() -> Self {
        Self {
            name: default_accessory_name(),
            manufacturer: default_manufacturer(),
            model: default_model(),
            serial_number: default_serial_number(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hotwired")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_pin_up() -> u32 {
    17
}

fn default_pin_down() -> u32 {
    27
}

fn default_pin_my_position() -> u32 {
    22
}

fn default_movement_duration() -> f64 {
    20.0
}

fn default_position() -> String {
    "down".to_string()
}

fn default_step_scale_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

fn default_backend() -> String {
    "sysfs".to_string()
}

fn default_gpio_root() -> PathBuf {
    PathBuf::from("/sys/class/gpio")
}

fn default_accessory_name() -> String {
    "Shutter".to_string()
}

fn default_manufacturer() -> String {
    "Somfy".to_string()
}

fn default_model() -> String {
    "Telis 1 RTS".to_string()
}

fn default_serial_number() -> String {
    "1337".to_string()
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &std::path::Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from file or return defaults
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path, falling back to defaults
    /// when the file does not exist
    pub fn load_from(path: &std::path::Path) -> crate::Result<Self> {
        let config: Self = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> crate::Result<()> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = self.to_toml()?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    pub fn to_toml(&self) -> crate::Result<String> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Reject wiring and timing values the controller cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        let s = &self.shutter;
        if s.pin_up == s.pin_down || s.pin_up == s.pin_my_position || s.pin_down == s.pin_my_position {
            return Err(crate::Error::Config(format!(
                "shutter pins must be distinct (up={}, down={}, my_position={})",
                s.pin_up, s.pin_down, s.pin_my_position
            )));
        }

        for (name, value) in [
            ("movement_duration_up", s.movement_duration_up),
            ("movement_duration_down", s.movement_duration_down),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(crate::Error::Config(format!(
                    "{} must be a positive number of seconds, got {}",
                    name, value
                )));
            }
        }

        if self.timing.step_scale_ms == 0 {
            return Err(crate::Error::Config("timing.step_scale_ms must be greater than 0".to_string()));
        }

        match self.hardware.backend.as_str() {
            "sysfs" | "mock" => Ok(()),
            other => Err(crate::Error::Config(format!(
                "unknown hardware backend '{}' (expected \"sysfs\" or \"mock\")",
                other
            ))),
        }
    }

    /// Build the immutable controller settings
    pub fn controller_config(&self) -> ControllerConfig {
        let default_position = if self.shutter.default_position == "up" {
            Position::OPEN
        } else {
            Position::CLOSED
        };

        ControllerConfig {
            pins: LinePins {
                up: self.shutter.pin_up,
                down: self.shutter.pin_down,
                preset: self.shutter.pin_my_position,
            },
            duration_up: self.shutter.movement_duration_up,
            duration_down: self.shutter.movement_duration_down,
            step_scale_ms: self.timing.step_scale_ms,
            default_position,
            open_state: if self.compat.open_reports_decreasing {
                PositionState::Decreasing
            } else {
                PositionState::Increasing
            },
        }
    }

    /// Get the configuration file path
    /// Always uses ~/.config/hotwired/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("hotwired")
            .join("config.toml")
    }

    /// Get the Unix socket path for IPC
    pub fn socket_path(&self) -> PathBuf {
        self.data_dir().join("hotwired.sock")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }
}

/// Settings the movement controller is constructed with
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub pins: LinePins,
    /// Full travel time up, in duration units (seconds by default)
    pub duration_up: f64,
    /// Full travel time down, in duration units (seconds by default)
    pub duration_down: f64,
    pub step_scale_ms: u64,
    pub default_position: Position,
    /// State reported while moving to fully open
    pub open_state: PositionState,
}

impl ControllerConfig {
    /// Period between two estimator ticks for a movement in `state`
    pub fn step_interval(&self, state: PositionState) -> Duration {
        let base = if state == PositionState::Increasing {
            self.duration_up
        } else {
            self.duration_down
        };
        self.scaled(base)
    }

    /// Quiet period after which the last debounced target is applied
    pub fn debounce_window(&self) -> Duration {
        self.scaled((self.duration_up + self.duration_down) / 2.0)
    }

    // Timers cannot run with a zero period
    fn scaled(&self, units: f64) -> Duration {
        Duration::from_millis((units * self.step_scale_ms as f64).round().max(1.0) as u64)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        AppConfig::default().controller_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.accessory.manufacturer, "Somfy");
        assert_eq!(config.accessory.model, "Telis 1 RTS");
    }

    #[test]
    fn test_parse_partial_file() {
        let config: AppConfig = toml::from_str(
            r#"
            [shutter]
            pin_up = 5
            pin_down = 6
            pin_my_position = 13
            movement_duration_up = 24
            movement_duration_down = 20
            default_position = "up"
            "#,
        )
        .unwrap();

        assert_eq!(config.shutter.pin_up, 5);
        assert_eq!(config.shutter.movement_duration_up, 24.0);
        assert_eq!(config.timing.step_scale_ms, 100);
        assert!(config.compat.open_reports_decreasing);

        let controller = config.controller_config();
        assert_eq!(controller.default_position, Position::OPEN);
        assert_eq!(controller.pins.preset, 13);
    }

    #[test]
    fn test_default_position_other_than_up_is_closed() {
        let mut config = AppConfig::default();
        config.shutter.default_position = "open".to_string();
        assert_eq!(config.controller_config().default_position, Position::CLOSED);
    }

    #[test]
    fn test_rejects_shared_pins() {
        let mut config = AppConfig::default();
        config.shutter.pin_down = config.shutter.pin_up;
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_rejects_non_positive_duration() {
        let mut config = AppConfig::default();
        config.shutter.movement_duration_down = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let mut config = AppConfig::default();
        config.hardware.backend = "i2c".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_step_interval_and_debounce_window() {
        let mut config = AppConfig::default();
        config.shutter.movement_duration_up = 20.0;
        config.shutter.movement_duration_down = 16.0;
        let controller = config.controller_config();

        assert_eq!(controller.step_interval(PositionState::Increasing), Duration::from_millis(2000));
        assert_eq!(controller.step_interval(PositionState::Decreasing), Duration::from_millis(1600));
        assert_eq!(controller.debounce_window(), Duration::from_millis(1800));
    }

    #[test]
    fn test_open_state_flag() {
        let mut config = AppConfig::default();
        assert_eq!(config.controller_config().open_state, PositionState::Decreasing);
        config.compat.open_reports_decreasing = false;
        assert_eq!(config.controller_config().open_state, PositionState::Increasing);
    }

    #[test]
    fn test_socket_path_in_data_dir() {
        let mut config = AppConfig::default();
        config.general.data_dir = PathBuf::from("/var/lib/hotwired");
        assert_eq!(config.socket_path(), PathBuf::from("/var/lib/hotwired/hotwired.sock"));
    }
}
