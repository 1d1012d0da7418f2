use std::path::PathBuf;
use thiserror::Error;

use crate::pins::Line;

/// Problems detected while building a panel. None of these are recoverable
/// in place; initialization has to be aborted.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unsupported panel size {width}x{height}, only 64x64 1/32-scan panels are driven")]
    InvalidDimensions { width: usize, height: usize },

    #[error("GPIO offset {offset} is assigned to both {first} and {second}")]
    DuplicatePin { offset: u32, first: Line, second: Line },

    #[error("row dwell time must be non-zero")]
    ZeroDwell,

    #[error("row dwell of {dwell_us}us gives a frame longer than 1/60 s")]
    FrameBudget { dwell_us: u64 },

    #[error("cannot open SPI device {}", device.display())]
    Spi {
        device: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Gpio(#[from] gpio_cdev::Error),
}

/// Runtime fault reported by the peripheral layer while scanning. The
/// refresh loop logs and counts these and keeps scanning, so they reach the
/// application only through the status callback.
#[derive(Error, Debug)]
pub enum PanelError {
    #[error("write to {line} failed ({kind:?}): {detail}")]
    Pin {
        line: Line,
        kind: embedded_hal::digital::ErrorKind,
        detail: String,
    },

    #[error("column shift transfer failed: {0}")]
    Shift(#[from] std::io::Error),

    #[error("scan row {0} is outside 0..32")]
    RowOutOfRange(usize),
}

impl PanelError {
    pub fn pin<E: embedded_hal::digital::Error>(line: Line, err: E) -> Self {
        PanelError::Pin {
            line,
            kind: err.kind(),
            detail: format!("{:?}", err),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to spawn the refresh thread")]
    Spawn(#[source] std::io::Error),
}
