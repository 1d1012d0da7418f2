//! Strategies for clocking one packed row into the panel's shift registers.

use std::io::Write;
use std::path::Path;

use embedded_hal::digital::{OutputPin, PinState};
use log::info;
use spidev::{SpiModeFlags, Spidev, SpidevOptions};

use crate::error::{ConfigError, PanelError};
use crate::pins::{Line, DATA_LINES};

/// Moves one row of packed six-bit words into the panel, first word first.
///
/// Implementations must return only after the last column is in the shift
/// registers, since the engine latches right afterwards.
pub trait ColumnShift {
    fn shift_row(&mut self, words: &[u8]) -> Result<(), PanelError>;
}

impl<S: ColumnShift + ?Sized> ColumnShift for Box<S> {
    fn shift_row(&mut self, words: &[u8]) -> Result<(), PanelError> {
        (**self).shift_row(words)
    }
}

/// Software shifting: each colour line and the clock are driven one by one.
pub struct BitBangShift<P> {
    data: [P; DATA_LINES],
    clock: P,
    last: Option<u8>,
}

impl<P: OutputPin> BitBangShift<P> {
    pub fn new(data: [P; DATA_LINES], clock: P) -> Self {
        BitBangShift {
            data,
            clock,
            last: None,
        }
    }

    fn write_word(&mut self, word: u8) -> Result<(), PanelError> {
        for (bit, (pin, line)) in self.data.iter_mut().zip(Line::DATA).enumerate() {
            let level = (word >> bit) & 1;
            // data lines keep their level, skip writes that change nothing
            if let Some(last) = self.last {
                if (last >> bit) & 1 == level {
                    continue;
                }
            }
            pin.set_state(PinState::from(level == 1))
                .map_err(|e| PanelError::pin(line, e))?;
        }
        Ok(())
    }
}

impl<P: OutputPin> ColumnShift for BitBangShift<P> {
    fn shift_row(&mut self, words: &[u8]) -> Result<(), PanelError> {
        for &word in words {
            if let Err(err) = self.write_word(word) {
                self.last = None;
                return Err(err);
            }
            self.last = Some(word);
            self.clock
                .set_high()
                .map_err(|e| PanelError::pin(Line::Clock, e))?;
            self.clock
                .set_low()
                .map_err(|e| PanelError::pin(Line::Clock, e))?;
        }
        Ok(())
    }
}

/// Streams packed rows to an SPI-attached shift peripheral which drives the
/// six colour lines and the clock itself.
pub struct SpiShift {
    spi: Spidev,
}

impl SpiShift {
    pub fn open(device: &Path, speed_hz: u32) -> Result<Self, ConfigError> {
        let spi_err = |source| ConfigError::Spi {
            device: device.to_path_buf(),
            source,
        };

        let mut spi = Spidev::open(device).map_err(spi_err)?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(speed_hz)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        spi.configure(&options).map_err(spi_err)?;

        info!("SPI column shift on {} at {} Hz", device.display(), speed_hz);
        Ok(SpiShift { spi })
    }
}

impl ColumnShift for SpiShift {
    fn shift_row(&mut self, words: &[u8]) -> Result<(), PanelError> {
        self.spi.write_all(words)?;
        Ok(())
    }
}
