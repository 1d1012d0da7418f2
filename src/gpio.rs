//! Linux GPIO character device backend.

use std::io;

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use gpio_cdev::{Chip, LineHandle, LineRequestFlags, MultiLineHandle};
use log::info;

use crate::config::{PanelConfig, ShiftConfig};
use crate::display::Hub75Display;
use crate::engine::RowScanEngine;
use crate::error::{ConfigError, Error, PanelError};
use crate::pins::{ControlLines, Line, PinMap};
use crate::shift::{BitBangShift, ColumnShift, SpiShift};

/// Column shift strategy chosen at runtime from the configuration.
pub type DynShift = Box<dyn ColumnShift + Send>;

#[derive(Debug)]
pub struct CdevPinError(pub gpio_cdev::Error);

impl embedded_hal::digital::Error for CdevPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// One requested output line.
pub struct CdevPin {
    handle: LineHandle,
}

impl CdevPin {
    pub fn request(
        chip: &mut Chip,
        offset: u32,
        line: Line,
        initial: u8,
    ) -> Result<Self, ConfigError> {
        let handle = chip
            .get_line(offset)?
            .request(LineRequestFlags::OUTPUT, initial, &consumer(line))?;
        Ok(CdevPin { handle })
    }
}

impl ErrorType for CdevPin {
    type Error = CdevPinError;
}

impl OutputPin for CdevPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.handle.set_value(0).map_err(CdevPinError)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.handle.set_value(1).map_err(CdevPinError)
    }
}

fn consumer(line: Line) -> String {
    format!("hub75-{}", line).to_lowercase()
}

/// Data lines and clock requested together, so a column takes two writes.
pub struct CdevParallelShift {
    handle: MultiLineHandle,
    values: [u8; 7],
}

const PARALLEL_CLOCK: usize = 6;

impl CdevParallelShift {
    pub fn request(chip: &mut Chip, pins: &PinMap) -> Result<Self, ConfigError> {
        let mut offsets: Vec<u32> = Line::DATA.iter().map(|&line| pins.offset(line)).collect();
        offsets.push(pins.clk);

        let handle = chip
            .get_lines(&offsets)?
            .request(LineRequestFlags::OUTPUT, &[0; 7], "hub75-data")?;
        Ok(CdevParallelShift { handle, values: [0; 7] })
    }

    fn write(&mut self) -> Result<(), PanelError> {
        self.handle.set_values(&self.values).map_err(|e| {
            PanelError::Shift(io::Error::new(io::ErrorKind::Other, e.to_string()))
        })
    }
}

impl ColumnShift for CdevParallelShift {
    fn shift_row(&mut self, words: &[u8]) -> Result<(), PanelError> {
        for &word in words {
            for bit in 0..PARALLEL_CLOCK {
                self.values[bit] = (word >> bit) & 1;
            }
            self.values[PARALLEL_CLOCK] = 0;
            self.write()?;
            self.values[PARALLEL_CLOCK] = 1;
            self.write()?;
        }
        self.values[PARALLEL_CLOCK] = 0;
        self.write()
    }
}

/// Requests every panel line from the configured GPIO chip and builds a
/// stopped display. Output enable starts high so the panel is dark.
///
/// Attach a fault callback with [`Hub75Display::set_status_callback`] before
/// starting refresh.
pub fn open_display(config: &PanelConfig) -> Result<Hub75Display<CdevPin, DynShift>, Error> {
    config.validate()?;

    let mut chip = Chip::new(&config.gpio_chip).map_err(ConfigError::from)?;
    let pins = &config.pins;

    let mut request = |line: Line, initial: u8| {
        CdevPin::request(&mut chip, pins.offset(line), line, initial)
    };
    let latch = request(Line::Latch, 0)?;
    let output_enable = request(Line::OutputEnable, 1)?;
    let address = [
        request(Line::A, 0)?,
        request(Line::B, 0)?,
        request(Line::C, 0)?,
        request(Line::D, 0)?,
        request(Line::E, 0)?,
    ];
    let lines = ControlLines::new(latch, output_enable, address);

    let shift: DynShift = match &config.shift {
        ShiftConfig::BitBang => {
            let data = [
                request(Line::R1, 0)?,
                request(Line::G1, 0)?,
                request(Line::B1, 0)?,
                request(Line::R2, 0)?,
                request(Line::G2, 0)?,
                request(Line::B2, 0)?,
            ];
            let clock = request(Line::Clock, 0)?;
            Box::new(BitBangShift::new(data, clock))
        }
        ShiftConfig::Parallel => Box::new(CdevParallelShift::request(&mut chip, pins)?),
        ShiftConfig::Spi { device, speed_hz } => Box::new(SpiShift::open(device, *speed_hz)?),
    };

    info!(
        "panel lines requested on {} ({:?} shift)",
        config.gpio_chip.display(),
        config.shift
    );
    let engine = RowScanEngine::new(lines, shift, config.dwell());
    Ok(Hub75Display::new(engine, &config.display_options())?)
}
