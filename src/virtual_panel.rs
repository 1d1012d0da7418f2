//! In-process model of a HUB75 panel driven through [`VirtualPin`]s.
//!
//! The model follows the wire protocol rather than the framebuffer: data lines
//! are sampled on clock rising edges, latch copies the shift register into the
//! output drivers, and a row-pair becomes visible when output enable goes low
//! with that row address selected. It also counts protocol violations that
//! would ghost on real hardware.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};

use crate::framebuffer::{PANEL_HEIGHT, PANEL_WIDTH, SCAN_ROWS};
use crate::pins::{Line, PanelPins, LINE_COUNT};
use crate::quantize::{BLUE_BIT, GREEN_BIT, LOWER_SHIFT, RED_BIT};

/// One pin level change seen by the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinEvent {
    pub line: Line,
    pub high: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualPinError {
    pub line: Line,
}

impl embedded_hal::digital::Error for VirtualPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

struct PanelState {
    levels: [bool; LINE_COUNT],
    shift_register: Vec<u8>,
    output_register: Vec<u8>,
    shown: Vec<u8>,
    clock_pulses: u64,
    latch_pulses: u64,
    rows_lit: u64,
    violations: u64,
    pending_faults: HashMap<Line, u32>,
    trace: Option<Vec<PinEvent>>,
}

impl PanelState {
    fn new() -> Self {
        let mut levels = [false; LINE_COUNT];
        // OE idles high so the panel starts dark
        levels[Line::OutputEnable.index()] = true;
        PanelState {
            levels,
            shift_register: Vec::with_capacity(PANEL_WIDTH),
            output_register: vec![0; PANEL_WIDTH],
            shown: vec![0; SCAN_ROWS * PANEL_WIDTH],
            clock_pulses: 0,
            latch_pulses: 0,
            rows_lit: 0,
            violations: 0,
            pending_faults: HashMap::new(),
            trace: None,
        }
    }

    fn level(&self, line: Line) -> bool {
        self.levels[line.index()]
    }

    fn lit(&self) -> bool {
        !self.level(Line::OutputEnable)
    }

    fn address(&self) -> usize {
        Line::ADDRESS
            .iter()
            .enumerate()
            .map(|(bit, &line)| (self.level(line) as usize) << bit)
            .sum()
    }

    fn data_word(&self) -> u8 {
        Line::DATA
            .iter()
            .enumerate()
            .map(|(bit, &line)| (self.level(line) as u8) << bit)
            .sum()
    }

    fn show_selected_row(&mut self) {
        let start = self.address() * PANEL_WIDTH;
        let out = self.output_register.clone();
        self.shown[start..start + PANEL_WIDTH].copy_from_slice(&out);
        self.rows_lit += 1;
    }

    fn drive(&mut self, line: Line, high: bool) -> Result<(), VirtualPinError> {
        if let Some(left) = self.pending_faults.get_mut(&line) {
            if *left > 0 {
                *left -= 1;
                return Err(VirtualPinError { line });
            }
        }

        let was_high = self.level(line);
        if let Some(trace) = self.trace.as_mut() {
            trace.push(PinEvent { line, high });
        }

        match line {
            Line::A | Line::B | Line::C | Line::D | Line::E if was_high != high && self.lit() => {
                self.violations += 1;
            }
            _ => {}
        }
        self.levels[line.index()] = high;

        match line {
            Line::Clock if high && !was_high => {
                self.clock_pulses += 1;
                let word = self.data_word();
                if self.shift_register.len() == PANEL_WIDTH {
                    self.shift_register.remove(0);
                }
                self.shift_register.push(word);
            }
            Line::Latch if high && !was_high => {
                self.latch_pulses += 1;
                if self.lit() {
                    self.violations += 1;
                }
                let mut latched = vec![0; PANEL_WIDTH];
                latched[..self.shift_register.len()].copy_from_slice(&self.shift_register);
                self.output_register = latched;
                self.shift_register.clear();
            }
            Line::OutputEnable if !high && was_high => self.show_selected_row(),
            _ => {}
        }
        Ok(())
    }
}

/// Shared handle to a simulated panel. Clones observe the same panel.
#[derive(Clone)]
pub struct VirtualPanel {
    state: Arc<Mutex<PanelState>>,
}

impl Default for VirtualPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualPanel {
    pub fn new() -> Self {
        VirtualPanel {
            state: Arc::new(Mutex::new(PanelState::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PanelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pin(&self, line: Line) -> VirtualPin {
        VirtualPin {
            line,
            state: Arc::clone(&self.state),
        }
    }

    /// A full connector wired to this panel.
    pub fn pins(&self) -> PanelPins<VirtualPin> {
        PanelPins {
            data: Line::DATA.map(|line| self.pin(line)),
            clock: self.pin(Line::Clock),
            latch: self.pin(Line::Latch),
            output_enable: self.pin(Line::OutputEnable),
            address: Line::ADDRESS.map(|line| self.pin(line)),
        }
    }

    pub fn level(&self, line: Line) -> bool {
        self.lock().level(line)
    }

    pub fn output_enabled(&self) -> bool {
        self.lock().lit()
    }

    pub fn clock_pulses(&self) -> u64 {
        self.lock().clock_pulses
    }

    pub fn latch_pulses(&self) -> u64 {
        self.lock().latch_pulses
    }

    /// Times output was enabled, i.e. row-pairs lit.
    pub fn rows_lit(&self) -> u64 {
        self.lock().rows_lit
    }

    /// Address changes or latch pulses while output was enabled.
    pub fn ghosting_violations(&self) -> u64 {
        self.lock().violations
    }

    /// Words clocked in since the last latch.
    pub fn shift_register(&self) -> Vec<u8> {
        self.lock().shift_register.clone()
    }

    /// Packed word row-pair `row` displayed at column `col` when it was last lit.
    pub fn shown_word(&self, row: usize, col: usize) -> u8 {
        self.lock().shown[row * PANEL_WIDTH + col]
    }

    /// R, G, B on/off as last displayed at `(x, y)`.
    pub fn shown_pixel(&self, x: usize, y: usize) -> (bool, bool, bool) {
        let word = self.shown_word(y % SCAN_ROWS, x);
        let bits = if y < SCAN_ROWS { word } else { word >> LOWER_SHIFT };
        (bits & RED_BIT != 0, bits & GREEN_BIT != 0, bits & BLUE_BIT != 0)
    }

    /// Makes the next `count` writes to `line` fail.
    pub fn fail_next(&self, line: Line, count: u32) {
        self.lock().pending_faults.insert(line, count);
    }

    pub fn start_trace(&self) {
        self.lock().trace = Some(Vec::new());
    }

    pub fn take_trace(&self) -> Vec<PinEvent> {
        self.lock().trace.take().unwrap_or_default()
    }

    /// Text rendering of what the panel last displayed, one character per LED.
    pub fn render_ascii(&self) -> String {
        let mut out = String::with_capacity((PANEL_WIDTH + 3) * (PANEL_HEIGHT + 2));
        let border = "=".repeat(PANEL_WIDTH + 2);
        let _ = writeln!(out, "{}", border);
        for y in 0..PANEL_HEIGHT {
            out.push('|');
            for x in 0..PANEL_WIDTH {
                out.push(match self.shown_pixel(x, y) {
                    (false, false, false) => ' ',
                    (true, false, false) => 'R',
                    (false, true, false) => 'G',
                    (false, false, true) => 'B',
                    (true, true, false) => 'Y',
                    (true, false, true) => 'M',
                    (false, true, true) => 'C',
                    (true, true, true) => '#',
                });
            }
            out.push_str("|\n");
        }
        let _ = writeln!(out, "{}", border);
        out
    }
}

pub struct VirtualPin {
    line: Line,
    state: Arc<Mutex<PanelState>>,
}

impl ErrorType for VirtualPin {
    type Error = VirtualPinError;
}

impl OutputPin for VirtualPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.drive(self.line, false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.drive(self.line, true)
    }
}
