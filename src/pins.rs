//! HUB75 pin roles and the control-line bundle driven by the scan engine.

use std::fmt;

use embedded_hal::digital::{OutputPin, PinState};
use serde::{Deserialize, Serialize};

use crate::error::PanelError;
use crate::shift::BitBangShift;

pub const ADDRESS_LINES: usize = 5;
pub const DATA_LINES: usize = 6;
pub const LINE_COUNT: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Line {
    R1,
    G1,
    B1,
    R2,
    G2,
    B2,
    Clock,
    Latch,
    OutputEnable,
    A,
    B,
    C,
    D,
    E,
}

impl Line {
    pub const ALL: [Line; LINE_COUNT] = [
        Line::R1,
        Line::G1,
        Line::B1,
        Line::R2,
        Line::G2,
        Line::B2,
        Line::Clock,
        Line::Latch,
        Line::OutputEnable,
        Line::A,
        Line::B,
        Line::C,
        Line::D,
        Line::E,
    ];

    /// Data lines in packed-word bit order.
    pub const DATA: [Line; DATA_LINES] =
        [Line::R1, Line::G1, Line::B1, Line::R2, Line::G2, Line::B2];

    /// Address lines, least significant bit first.
    pub const ADDRESS: [Line; ADDRESS_LINES] = [Line::A, Line::B, Line::C, Line::D, Line::E];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Line::R1 => "R1",
            Line::G1 => "G1",
            Line::B1 => "B1",
            Line::R2 => "R2",
            Line::G2 => "G2",
            Line::B2 => "B2",
            Line::Clock => "CLK",
            Line::Latch => "LAT",
            Line::OutputEnable => "OE",
            Line::A => "A",
            Line::B => "B",
            Line::C => "C",
            Line::D => "D",
            Line::E => "E",
        };
        f.write_str(name)
    }
}

/// GPIO offsets for every panel line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinMap {
    pub r1: u32,
    pub g1: u32,
    pub b1: u32,
    pub r2: u32,
    pub g2: u32,
    pub b2: u32,
    pub clk: u32,
    pub lat: u32,
    pub oe: u32,
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub d: u32,
    pub e: u32,
}

impl Default for PinMap {
    fn default() -> Self {
        PinMap {
            r1: 0,
            g1: 1,
            b1: 2,
            r2: 3,
            g2: 4,
            b2: 5,
            clk: 6,
            lat: 7,
            oe: 8,
            a: 9,
            b: 10,
            c: 11,
            d: 12,
            e: 13,
        }
    }
}

impl PinMap {
    pub fn offset(&self, line: Line) -> u32 {
        match line {
            Line::R1 => self.r1,
            Line::G1 => self.g1,
            Line::B1 => self.b1,
            Line::R2 => self.r2,
            Line::G2 => self.g2,
            Line::B2 => self.b2,
            Line::Clock => self.clk,
            Line::Latch => self.lat,
            Line::OutputEnable => self.oe,
            Line::A => self.a,
            Line::B => self.b,
            Line::C => self.c,
            Line::D => self.d,
            Line::E => self.e,
        }
    }

    /// Returns the first pair of lines that share a GPIO offset.
    pub fn find_duplicate(&self) -> Option<(u32, Line, Line)> {
        for (i, &first) in Line::ALL.iter().enumerate() {
            for &second in &Line::ALL[i + 1..] {
                if self.offset(first) == self.offset(second) {
                    return Some((self.offset(first), first, second));
                }
            }
        }
        None
    }
}

/// Every pin of one panel connector.
pub struct PanelPins<P> {
    pub data: [P; DATA_LINES],
    pub clock: P,
    pub latch: P,
    pub output_enable: P,
    pub address: [P; ADDRESS_LINES],
}

impl<P: OutputPin> PanelPins<P> {
    /// Splits the connector for software shifting of the colour lines.
    pub fn into_bit_bang(self) -> (ControlLines<P>, BitBangShift<P>) {
        (
            ControlLines::new(self.latch, self.output_enable, self.address),
            BitBangShift::new(self.data, self.clock),
        )
    }
}

/// Latch, output enable and row address lines.
pub struct ControlLines<P> {
    latch: P,
    output_enable: P,
    address: [P; ADDRESS_LINES],
}

impl<P: OutputPin> ControlLines<P> {
    pub fn new(latch: P, output_enable: P, address: [P; ADDRESS_LINES]) -> Self {
        ControlLines {
            latch,
            output_enable,
            address,
        }
    }

    /// OE is active low: driving it high turns every LED off.
    pub fn blank(&mut self) -> Result<(), PanelError> {
        self.output_enable
            .set_high()
            .map_err(|e| PanelError::pin(Line::OutputEnable, e))
    }

    pub fn unblank(&mut self) -> Result<(), PanelError> {
        self.output_enable
            .set_low()
            .map_err(|e| PanelError::pin(Line::OutputEnable, e))
    }

    pub fn select_row(&mut self, row: usize) -> Result<(), PanelError> {
        for (bit, (pin, line)) in self.address.iter_mut().zip(Line::ADDRESS).enumerate() {
            let state = PinState::from((row >> bit) & 1 == 1);
            pin.set_state(state).map_err(|e| PanelError::pin(line, e))?;
        }
        Ok(())
    }

    pub fn pulse_latch(&mut self) -> Result<(), PanelError> {
        self.latch
            .set_high()
            .map_err(|e| PanelError::pin(Line::Latch, e))?;
        self.latch
            .set_low()
            .map_err(|e| PanelError::pin(Line::Latch, e))
    }
}
