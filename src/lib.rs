//! Driver for 64x64 HUB75 RGB LED panels (1/32 scan).
//!
//! A [`Hub75Display`] owns the framebuffer and a refresh thread that scans the
//! panel row-pair by row-pair. Application threads draw with `set_pixel`,
//! `fill_rect` and `clear` at any time; the refresh thread picks the change up
//! on the next row it scans.
//!
//! ```no_run
//! use hub75_pimatrix::{gpio, PanelConfig};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), hub75_pimatrix::Error> {
//! let config = PanelConfig::load_or_default(Path::new("config.json"));
//! let mut display = gpio::open_display(&config)?;
//! display.set_pixel(10, 10, 255, 0, 0);
//! display.start()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod display;
pub mod engine;
pub mod error;
pub mod framebuffer;
pub mod gpio;
pub mod pins;
pub mod quantize;
pub mod scheduler;
pub mod shift;
pub mod virtual_panel;

pub use config::{PanelConfig, ShiftConfig};
pub use display::{DisplayOptions, Hub75Display};
pub use engine::{RefreshStats, RowScanEngine, StatusCallback};
pub use error::{ConfigError, Error, PanelError};
pub use framebuffer::{BufferMode, Color, Framebuffer, PANEL_HEIGHT, PANEL_WIDTH, SCAN_ROWS};
pub use pins::{ControlLines, Line, PanelPins, PinMap};
pub use scheduler::{RefreshScheduler, SchedulerState};
pub use shift::{BitBangShift, ColumnShift, SpiShift};
pub use virtual_panel::VirtualPanel;
