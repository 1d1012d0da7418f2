//! The pixel API drawing code talks to.

use std::sync::Arc;
use std::time::Duration;

use embedded_hal::digital::OutputPin;
use log::info;

use crate::engine::{RefreshStats, RowScanEngine, StatusCallback, DEFAULT_DWELL};
use crate::error::{ConfigError, Error};
use crate::framebuffer::{BufferMode, Color, Framebuffer, PANEL_HEIGHT, PANEL_WIDTH};
use crate::pins::PanelPins;
use crate::scheduler::{RefreshScheduler, SchedulerState};
use crate::shift::{BitBangShift, ColumnShift};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    /// Clamped to 0..=255 when applied.
    pub brightness: i32,
    pub dwell: Duration,
    pub buffer_mode: BufferMode,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        DisplayOptions {
            brightness: 255,
            dwell: DEFAULT_DWELL,
            buffer_mode: BufferMode::Single,
        }
    }
}

/// A 64x64 HUB75 panel with its framebuffer and refresh thread.
///
/// Pixel calls never block and may come from any thread holding the display
/// or a [`Framebuffer`] handle from [`Hub75Display::framebuffer`]. Refresh
/// does not run until [`Hub75Display::start`].
pub struct Hub75Display<P: OutputPin, S: ColumnShift> {
    framebuffer: Arc<Framebuffer>,
    scheduler: RefreshScheduler<P, S>,
}

impl<P: OutputPin> Hub75Display<P, BitBangShift<P>> {
    /// Display driven entirely through individual pins.
    pub fn from_pins(pins: PanelPins<P>, options: &DisplayOptions) -> Result<Self, ConfigError> {
        let (lines, shift) = pins.into_bit_bang();
        Hub75Display::new(RowScanEngine::new(lines, shift, options.dwell), options)
    }
}

impl<P: OutputPin, S: ColumnShift> Hub75Display<P, S> {
    pub fn new(engine: RowScanEngine<P, S>, options: &DisplayOptions) -> Result<Self, ConfigError> {
        if options.dwell.is_zero() {
            return Err(ConfigError::ZeroDwell);
        }
        let framebuffer = Framebuffer::new(PANEL_WIDTH, PANEL_HEIGHT, options.buffer_mode)?;
        let framebuffer = Arc::new(framebuffer);
        framebuffer.set_brightness(options.brightness);

        info!(
            "HUB75 display: {}x{}, {:?} buffer, row dwell {}us",
            PANEL_WIDTH,
            PANEL_HEIGHT,
            options.buffer_mode,
            options.dwell.as_micros()
        );
        Ok(Hub75Display {
            scheduler: RefreshScheduler::new(Arc::clone(&framebuffer), engine),
            framebuffer,
        })
    }

    pub fn width(&self) -> usize {
        self.framebuffer.width()
    }

    pub fn height(&self) -> usize {
        self.framebuffer.height()
    }

    /// Shared handle for drawing from other threads.
    pub fn framebuffer(&self) -> Arc<Framebuffer> {
        Arc::clone(&self.framebuffer)
    }

    pub fn set_pixel(&self, x: i32, y: i32, r: u8, g: u8, b: u8) {
        self.framebuffer.set_pixel(x, y, Color::new(r, g, b));
    }

    pub fn get_pixel(&self, x: i32, y: i32) -> Option<Color> {
        self.framebuffer.pixel(x, y)
    }

    pub fn clear(&self) {
        self.framebuffer.clear();
    }

    pub fn clear_to(&self, r: u8, g: u8, b: u8) {
        self.framebuffer.clear_to(Color::new(r, g, b));
    }

    #[allow(clippy::too_many_arguments)]
    pub fn fill_rect(&self, x: i32, y: i32, w: i32, h: i32, r: u8, g: u8, b: u8) {
        self.framebuffer.fill_rect(x, y, w, h, Color::new(r, g, b));
    }

    pub fn set_brightness(&self, value: i32) -> u8 {
        self.framebuffer.set_brightness(value)
    }

    pub fn brightness(&self) -> u8 {
        self.framebuffer.brightness()
    }

    pub fn test_pattern(&self) {
        self.framebuffer.test_pattern();
    }

    /// See [`Framebuffer::present`].
    pub fn present(&self) {
        self.framebuffer.present();
    }

    pub fn show(&self) {
        self.present();
    }

    /// Scans a single frame on the calling thread when refresh is stopped.
    pub fn refresh_once(&mut self) -> bool {
        self.scheduler.refresh_once()
    }

    /// Called from the refresh thread for each fault it logs. Only takes
    /// effect while refresh is stopped; returns `false` otherwise.
    pub fn set_status_callback(&mut self, callback: Option<StatusCallback>) -> bool {
        self.scheduler.set_status_callback(callback)
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn stats(&self) -> Arc<RefreshStats> {
        self.scheduler.stats()
    }
}

impl<P, S> Hub75Display<P, S>
where
    P: OutputPin + Send + 'static,
    S: ColumnShift + Send + 'static,
{
    pub fn start(&mut self) -> Result<(), Error> {
        self.scheduler.start()
    }
}
