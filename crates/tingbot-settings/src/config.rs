//! Configuration for the Tingbot controller
//!
//! Supports JSON and TOML files, picked by extension. Every section has
//! defaults matching the stock board, so a file only needs the keys that
//! differ.
//!
//! Configuration is organized into sections:
//! - Modules to start (buttons, backlight)
//! - Backlight range and animation
//! - Button wiring
//! - GPIO tool invocation

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SettingsError};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "TINGBOT_CONFIG";

/// Optional controller components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    /// Button tracker
    Buttons,
    /// Backlight controller
    Backlight,
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buttons => write!(f, "buttons"),
            Self::Backlight => write!(f, "backlight"),
        }
    }
}

/// Backlight settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacklightSettings {
    /// Lowest duty value a request is clamped to
    pub min_brightness: u32,
    /// Highest duty value a request is clamped to
    pub max_brightness: u32,
    /// Animation length in milliseconds
    pub tween_duration_ms: u64,
    /// Animate changes instead of jumping
    pub tweening_enabled: bool,
    /// BCM pin driving the backlight
    pub pwm_pin: u8,
    /// PWM range programmed at startup
    pub pwm_range: u32,
}

impl BacklightSettings {
    pub fn tween_duration(&self) -> Duration {
        Duration::from_millis(self.tween_duration_ms)
    }
}

impl Default for BacklightSettings {
    fn default() -> Self {
        Self {
            min_brightness: 0,
            max_brightness: 65536,
            tween_duration_ms: 400,
            tweening_enabled: false,
            pwm_pin: 18,
            pwm_range: 65536,
        }
    }
}

/// Button wiring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonSettings {
    /// BCM pins of the buttons, left to right
    pub pins: [u8; 4],
    /// A low read means pressed
    pub active_low: bool,
}

impl Default for ButtonSettings {
    fn default() -> Self {
        Self {
            pins: [17, 23, 24, 14],
            active_low: true,
        }
    }
}

/// How the GPIO command-line tool is invoked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareSettings {
    /// Name or path of the wiringPi `gpio` utility
    pub gpio_command: String,
    /// Prefix every command with `sudo`
    pub use_sudo: bool,
}

impl Default for HardwareSettings {
    fn default() -> Self {
        Self {
            gpio_command: "gpio".to_string(),
            use_sudo: true,
        }
    }
}

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Components to construct
    pub modules: Vec<Module>,
    pub backlight: BacklightSettings,
    pub buttons: ButtonSettings,
    pub hardware: HardwareSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            modules: vec![Module::Buttons, Module::Backlight],
            backlight: BacklightSettings::default(),
            buttons: ButtonSettings::default(),
            hardware: HardwareSettings::default(),
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a module should be constructed
    pub fn is_enabled(&self, module: Module) -> bool {
        self.modules.contains(&module)
    }

    /// Default config file location, `<config dir>/tingbot/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("tingbot").join("config.toml"))
            .ok_or_else(|| SettingsError::ConfigDirectory("no config directory".to_string()))
    }

    /// Load the config named by `TINGBOT_CONFIG`, else the default file,
    /// else built-in defaults
    pub fn load_or_default() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load_from_file(Path::new(&path));
        }
        match Self::default_path() {
            Ok(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let format = Format::of(path)?;
        let content = std::fs::read_to_string(path)?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let content = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.modules.is_empty() {
            return Err(SettingsError::invalid("modules", "at least one module is required"));
        }

        let backlight = &self.backlight;
        if backlight.min_brightness >= backlight.max_brightness {
            return Err(SettingsError::invalid(
                "backlight.max_brightness",
                format!(
                    "must be greater than min_brightness ({})",
                    backlight.min_brightness
                ),
            ));
        }
        if backlight.tween_duration_ms == 0 {
            return Err(SettingsError::invalid(
                "backlight.tween_duration_ms",
                "must be > 0",
            ));
        }
        if backlight.pwm_range == 0 {
            return Err(SettingsError::invalid("backlight.pwm_range", "must be > 0"));
        }

        let mut seen = HashSet::new();
        for pin in self.buttons.pins {
            if !seen.insert(pin) {
                return Err(SettingsError::invalid(
                    "buttons.pins",
                    format!("pin {} is used twice", pin),
                ));
            }
        }

        if self.hardware.gpio_command.trim().is_empty() {
            return Err(SettingsError::invalid("hardware.gpio_command", "must not be empty"));
        }

        Ok(())
    }
}

enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            _ => Err(SettingsError::UnsupportedFormat(format!(
                "{} (expected .json or .toml)",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_board() {
        let config = Config::default();
        assert!(config.is_enabled(Module::Buttons));
        assert!(config.is_enabled(Module::Backlight));
        assert_eq!(config.backlight.min_brightness, 0);
        assert_eq!(config.backlight.max_brightness, 65536);
        assert_eq!(config.backlight.tween_duration(), Duration::from_millis(400));
        assert!(!config.backlight.tweening_enabled);
        assert_eq!(config.buttons.pins, [17, 23, 24, 14]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let mut config = Config::default();
        config.backlight.min_brightness = 100;
        config.backlight.max_brightness = 100;
        assert!(matches!(
            config.validate(),
            Err(SettingsError::InvalidSetting { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_pins() {
        let mut config = Config::default();
        config.buttons.pins = [17, 17, 24, 14];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_duration_and_no_modules() {
        let mut config = Config::default();
        config.backlight.tween_duration_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.modules.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            modules = ["backlight"]

            [backlight]
            tweening_enabled = true
            "#,
        )
        .expect("valid toml");

        assert!(!config.is_enabled(Module::Buttons));
        assert!(config.backlight.tweening_enabled);
        assert_eq!(config.backlight.max_brightness, 65536);
        assert_eq!(config.hardware.gpio_command, "gpio");
    }

    #[test]
    fn test_unsupported_extension() {
        let result = Config::load_from_file(Path::new("/tmp/tingbot.yaml"));
        assert!(matches!(result, Err(SettingsError::UnsupportedFormat(_))));
    }
}
