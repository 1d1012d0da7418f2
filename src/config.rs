//! Panel configuration stored as JSON.
//!
//! Every key is optional; missing keys take the defaults of the reference
//! wiring (Raspberry Pi GPIO 0-13, bit-banged, brightness 128).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::display::DisplayOptions;
use crate::engine::FRAME_BUDGET;
use crate::error::ConfigError;
use crate::framebuffer::{BufferMode, SCAN_ROWS};
use crate::pins::PinMap;

/// How packed rows reach the panel's colour lines.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShiftConfig {
    /// Each data line and the clock written individually.
    #[default]
    BitBang,
    /// The six data lines and the clock requested as one multi-line handle.
    Parallel,
    /// Rows streamed to an SPI shift peripheral.
    Spi { device: PathBuf, speed_hz: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub brightness: i32,
    pub dwell_us: u64,
    pub buffer_mode: BufferMode,
    pub gpio_chip: PathBuf,
    pub pins: PinMap,
    pub shift: ShiftConfig,
}

impl Default for PanelConfig {
    fn default() -> Self {
        PanelConfig {
            brightness: 128,
            dwell_us: 25,
            buffer_mode: BufferMode::Single,
            gpio_chip: PathBuf::from("/dev/gpiochip0"),
            pins: PinMap::default(),
            shift: ShiftConfig::default(),
        }
    }
}

impl PanelConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Like [`PanelConfig::load`], but a missing or unreadable file yields
    /// the defaults.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::IOError(err)) => {
                info!("no config at {} ({}), using defaults", path.display(), err);
                Self::default()
            }
            Err(err) => {
                warn!("config {} is invalid ({}), using defaults", path.display(), err);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dwell_us == 0 {
            return Err(ConfigError::ZeroDwell);
        }
        if self.dwell() * SCAN_ROWS as u32 > FRAME_BUDGET {
            return Err(ConfigError::FrameBudget {
                dwell_us: self.dwell_us,
            });
        }
        if let Some((offset, first, second)) = self.pins.find_duplicate() {
            return Err(ConfigError::DuplicatePin { offset, first, second });
        }
        Ok(())
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_micros(self.dwell_us)
    }

    pub fn display_options(&self) -> DisplayOptions {
        DisplayOptions {
            brightness: self.brightness,
            dwell: self.dwell(),
            buffer_mode: self.buffer_mode,
        }
    }
}
