//! Runtime configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::Fixed;

/// Highest `xdg_shell` unstable version implemented
pub const XDG_SHELL_UNSTABLE_VERSION: i32 = 5;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file exists but could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`Config`]
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Compositor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name advertised through `wl_seat.name`
    pub seat_name: String,

    /// Output description
    pub output: OutputConfig,

    /// `xdg_shell` negotiation
    pub xdg_shell: XdgShellConfig,

    /// Host scroll conversion
    pub scroll: ScrollConfig,

    /// Keyboard conversion
    pub keyboard: KeyboardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seat_name: "seat0".to_string(),
            output: OutputConfig::default(),
            xdg_shell: XdgShellConfig::default(),
            scroll: ScrollConfig::default(),
            keyboard: KeyboardConfig::default(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// `wl_output.geometry` make
    pub make: String,

    /// `wl_output.geometry` model
    pub model: String,

    /// Refresh rate in mHz (0 = unknown)
    pub refresh_mhz: i32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            make: "Nestway".to_string(),
            model: "Embedded".to_string(),
            refresh_mhz: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XdgShellConfig {
    /// Highest unstable version accepted by `use_unstable_version`
    pub max_version: i32,
}

impl Default for XdgShellConfig {
    fn default() -> Self {
        Self { max_version: XDG_SHELL_UNSTABLE_VERSION }
    }
}

impl XdgShellConfig {
    /// Configured maximum, never above what the core implements
    pub fn effective_max_version(&self) -> i32 {
        self.max_version.min(XDG_SHELL_UNSTABLE_VERSION)
    }
}

/// Scroll conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Axis value sent for one discrete scroll step
    pub discrete_step: f64,

    /// Multiplier applied to smooth scroll deltas
    pub smooth_factor: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            discrete_step: 10.0,
            smooth_factor: 10.0,
        }
    }
}

impl ScrollConfig {
    pub fn discrete_to_fixed(&self, steps: f64) -> Fixed {
        Fixed::from_f64(steps * self.discrete_step)
    }

    pub fn smooth_to_fixed(&self, delta: f64) -> Fixed {
        Fixed::from_f64(delta * self.smooth_factor)
    }
}

/// Keyboard conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    /// Subtracted from host hardware keycodes to get evdev codes
    pub evdev_offset: u32,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self { evdev_offset: 8 }
    }
}

impl KeyboardConfig {
    pub fn to_evdev(&self, hardware_keycode: u32) -> u32 {
        hardware_keycode.saturating_sub(self.evdev_offset)
    }
}

impl Config {
    /// Parse a configuration document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a configuration file
    pub fn from_path(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from file, falling back to defaults
    pub fn load() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("nestway/config.toml")),
            Some(PathBuf::from("/etc/nestway/config.toml")),
        ];

        for path in config_paths.into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            match Self::from_path(&path) {
                Ok(config) => {
                    tracing::info!(?path, seat = %config.seat_name, "loaded configuration");
                    return config;
                }
                Err(e) => {
                    tracing::warn!(?path, error = %e, "failed to load config");
                }
            }
        }

        tracing::info!("using default configuration");
        Self::default()
    }
}

/// Helper for getting XDG directories
mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_has_expected_values() {
        let config = Config::default();

        assert_eq!(config.seat_name, "seat0");
        assert_eq!(config.xdg_shell.max_version, 5);
        assert_eq!(config.keyboard.evdev_offset, 8);
        assert!((config.scroll.discrete_step - 10.0).abs() < f64::EPSILON);
        assert!((config.scroll.smooth_factor - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn scroll_conversion_uses_fixed_point() {
        let scroll = ScrollConfig::default();

        assert_eq!(scroll.discrete_to_fixed(-1.0), Fixed::from_int(-10));
        assert_eq!(scroll.smooth_to_fixed(0.5), Fixed::from_int(5));
    }

    #[test]
    fn evdev_offset_saturates() {
        let keyboard = KeyboardConfig::default();

        assert_eq!(keyboard.to_evdev(38), 30);
        assert_eq!(keyboard.to_evdev(3), 0);
    }

    #[test]
    fn max_version_is_capped() {
        let shell = XdgShellConfig { max_version: 9 };
        assert_eq!(shell.effective_max_version(), 5);

        let shell = XdgShellConfig { max_version: 4 };
        assert_eq!(shell.effective_max_version(), 4);
    }

    // ========== TOML tests ==========

    #[test]
    fn config_toml_roundtrip() {
        let mut config = Config::default();
        config.seat_name = "seat1".to_string();
        config.output.make = "Acme".to_string();
        config.scroll.smooth_factor = 4.0;

        let toml_str = toml::to_string(&config).expect("Failed to serialize");
        let parsed = Config::from_toml_str(&toml_str).expect("Failed to deserialize");

        assert_eq!(parsed, config);
    }

    #[test]
    fn config_partial_toml_uses_defaults() {
        let partial_toml = r#"
            seat_name = "nested"

            [output]
            model = "Panel"
        "#;

        let parsed = Config::from_toml_str(partial_toml).expect("Failed to parse partial TOML");

        assert_eq!(parsed.seat_name, "nested");
        assert_eq!(parsed.output.model, "Panel");
        assert_eq!(parsed.output.make, "Nestway");
        assert_eq!(parsed.keyboard.evdev_offset, 8);
    }

    #[test]
    fn config_invalid_toml_returns_error() {
        let result = Config::from_toml_str("this is not valid { toml [");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_read_error() {
        let result = Config::from_path(std::path::Path::new("/nonexistent/nestway.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
