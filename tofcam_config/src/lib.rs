//! TOML configuration for the camera tools.
//!
//! Every section is optional and falls back to the values the sensor ships
//! with; `Config::validate` rejects out-of-range values without panicking.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Device {
    /// Serial device path (`/dev/ttyUSB0`, `COM3`, ...).
    pub path: String,
    pub read_timeout_ms: u64,
}

impl Default for Device {
    fn default() -> Self {
        Self {
            path: "/dev/ttyUSB0".to_string(),
            read_timeout_ms: 1000,
        }
    }
}

/// Auto-ranging tuning; see the driver docs for the control law.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Range {
    pub sat: u32,
    pub pct: u32,
    pub ihi: u32,
    pub roi_x: usize,
    pub roi_y: usize,
    pub roi_w: usize,
    pub roi_h: usize,
}

impl Default for Range {
    fn default() -> Self {
        Self {
            sat: 80,
            pct: 50,
            ihi: 150,
            roi_x: 25,
            roi_y: 25,
            roi_w: 50,
            roi_h: 50,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Smooth {
    pub time_constant: f32,
    pub noise_floor: f32,
    pub flicker_limit: u8,
}

impl Default for Smooth {
    fn default() -> Self {
        Self {
            time_constant: 0.1,
            noise_floor: 64.0,
            flicker_limit: 32,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Latch {
    pub budget_ms: u64,
}

impl Default for Latch {
    fn default() -> Self {
        Self { budget_ms: 500 }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Logging {
    /// Path to a log file (JSON lines); console-only when unset.
    pub file: Option<String>,
    /// "error" | "warn" | "info" | "debug" | "trace"
    pub level: Option<String>,
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub device: Device,
    pub range: Range,
    pub smooth: Smooth,
    pub latch: Latch,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.path.is_empty() {
            return Err(ConfigError::Invalid("device.path must not be empty"));
        }
        if self.device.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid("device.read_timeout_ms must be >= 1"));
        }
        if self.range.roi_w == 0 || self.range.roi_h == 0 {
            return Err(ConfigError::Invalid("range ROI must have non-zero area"));
        }
        if self.range.roi_x + self.range.roi_w > 100 || self.range.roi_y + self.range.roi_h > 100 {
            return Err(ConfigError::Invalid("range ROI must fit the 100x100 frame"));
        }
        if self.range.ihi == 0 || self.range.ihi > 255 {
            return Err(ConfigError::Invalid("range.ihi must be in 1..=255"));
        }
        if self.range.pct > 100 || self.range.sat > 100 {
            return Err(ConfigError::Invalid("range.pct and range.sat are percentages"));
        }
        if !self.smooth.time_constant.is_finite()
            || self.smooth.time_constant <= 0.0
            || self.smooth.time_constant > 1.0
        {
            return Err(ConfigError::Invalid("smooth.time_constant must be in (0, 1]"));
        }
        if !self.smooth.noise_floor.is_finite() || self.smooth.noise_floor < 0.0 {
            return Err(ConfigError::Invalid("smooth.noise_floor must be >= 0"));
        }
        if let Some(level) = self.logging.level.as_deref() {
            if !matches!(level, "error" | "warn" | "info" | "debug" | "trace") {
                return Err(ConfigError::Invalid("logging.level is not a known level"));
            }
        }
        if let Some(rotation) = self.logging.rotation.as_deref() {
            if !matches!(rotation, "never" | "daily" | "hourly") {
                return Err(ConfigError::Invalid("logging.rotation is not a known policy"));
            }
        }
        Ok(())
    }
}
