//! Pixel storage shared between drawing threads and the refresh thread.
//!
//! Every pixel is one `AtomicU32` holding `0x00RRGGBB`, so a pixel is stored
//! and loaded in a single operation: a reader sees either the old or the new
//! colour of a pixel, never a mix of their channel bytes. Nothing protects a
//! multi-pixel update in [`BufferMode::Single`]; a frame scanned while a
//! drawing is half done shows part of each. [`BufferMode::Double`] keeps a
//! second plane and swaps the two at a frame boundary in [`Framebuffer::present`].

use std::sync::atomic::{fence, AtomicBool, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::quantize;

pub const PANEL_WIDTH: usize = 64;
pub const PANEL_HEIGHT: usize = 64;
/// Row addresses on a 1/32-scan panel; each lights `r` and `r + SCAN_ROWS`.
pub const SCAN_ROWS: usize = PANEL_HEIGHT / 2;
pub const BYTES_PER_PIXEL: usize = 3;

const PRESENT_POLL: Duration = Duration::from_micros(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);
    pub const RED: Color = Color::new(255, 0, 0);
    pub const GREEN: Color = Color::new(0, 255, 0);
    pub const BLUE: Color = Color::new(0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b }
    }

    fn to_word(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    fn from_word(word: u32) -> Self {
        Color::new((word >> 16) as u8, (word >> 8) as u8, word as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferMode {
    /// The refresh thread scans the plane drawing happens in.
    #[default]
    Single,
    /// Drawing goes to a back plane which becomes visible on `present()`.
    Double,
}

type Plane = Box<[AtomicU32]>;

pub struct Framebuffer {
    width: usize,
    height: usize,
    mode: BufferMode,
    planes: Vec<Plane>,
    front: AtomicUsize,
    brightness: AtomicU8,
    swap_requested: AtomicBool,
    swaps: AtomicU64,
    scanner_attached: AtomicBool,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize, mode: BufferMode) -> Result<Self, ConfigError> {
        if width != PANEL_WIDTH || height != PANEL_HEIGHT {
            return Err(ConfigError::InvalidDimensions { width, height });
        }

        let plane_count = match mode {
            BufferMode::Single => 1,
            BufferMode::Double => 2,
        };
        let planes = (0..plane_count)
            .map(|_| (0..width * height).map(|_| AtomicU32::new(0)).collect())
            .collect();

        Ok(Framebuffer {
            width,
            height,
            mode,
            planes,
            front: AtomicUsize::new(0),
            brightness: AtomicU8::new(255),
            swap_requested: AtomicBool::new(false),
            swaps: AtomicU64::new(0),
            scanner_attached: AtomicBool::new(false),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn mode(&self) -> BufferMode {
        self.mode
    }

    /// Size of the RGB byte image, `width * height * 3`.
    pub fn byte_len(&self) -> usize {
        self.width * self.height * BYTES_PER_PIXEL
    }

    pub fn brightness(&self) -> u8 {
        self.brightness.load(Ordering::Relaxed)
    }

    /// Clamps to 0..=255 and returns the stored value. Pixels keep their
    /// unscaled colour; the new gain applies from the next scanned row.
    pub fn set_brightness(&self, value: i32) -> u8 {
        let value = value.clamp(0, 255) as u8;
        self.brightness.store(value, Ordering::Relaxed);
        value
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y * self.width + x)
    }

    fn front_plane(&self) -> &[AtomicU32] {
        &self.planes[self.front.load(Ordering::Acquire)]
    }

    fn back_plane(&self) -> &[AtomicU32] {
        let back = match self.mode {
            BufferMode::Single => 0,
            BufferMode::Double => self.front.load(Ordering::Acquire) ^ 1,
        };
        &self.planes[back]
    }

    /// Writes outside the panel are ignored.
    pub fn set_pixel(&self, x: i32, y: i32, color: Color) {
        if let Some(idx) = self.index(x, y) {
            self.back_plane()[idx].store(color.to_word(), Ordering::Relaxed);
        }
    }

    /// The colour last written at `(x, y)`, unscaled.
    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        self.index(x, y)
            .map(|idx| Color::from_word(self.back_plane()[idx].load(Ordering::Relaxed)))
    }

    pub fn clear(&self) {
        self.clear_to(Color::BLACK);
    }

    pub fn clear_to(&self, color: Color) {
        let word = color.to_word();
        for px in self.back_plane().iter() {
            px.store(word, Ordering::Relaxed);
        }
    }

    /// Fills the part of the rectangle that lies on the panel.
    pub fn fill_rect(&self, x: i32, y: i32, w: i32, h: i32, color: Color) {
        if w <= 0 || h <= 0 {
            return;
        }
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = x.saturating_add(w).min(self.width as i32);
        let y1 = y.saturating_add(h).min(self.height as i32);
        for py in y0..y1 {
            for px in x0..x1 {
                self.set_pixel(px, py, color);
            }
        }
    }

    /// Red, green and blue horizontal bands.
    pub fn test_pattern(&self) {
        self.clear();
        let bands = [(0, 21, Color::RED), (21, 21, Color::GREEN), (42, 22, Color::BLUE)];
        for (top, rows, color) in bands {
            self.fill_rect(0, top, self.width as i32, rows, color);
        }
    }

    /// Copy of the drawing plane as R, G, B bytes in row-major order.
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        let mut raw = Vec::with_capacity(self.byte_len());
        for px in self.back_plane().iter() {
            let c = Color::from_word(px.load(Ordering::Relaxed));
            raw.extend_from_slice(&[c.r, c.g, c.b]);
        }
        raw
    }

    /// Hands the drawn frame to the refresh thread.
    ///
    /// With a single plane this is only a memory barrier: the refresh thread
    /// already reads the live pixels. With two planes it waits until the
    /// refresh thread swaps planes at its next frame boundary (or swaps
    /// directly when nothing is scanning), then copies the presented frame
    /// into the new back plane so drawing continues from it.
    pub fn present(&self) {
        match self.mode {
            BufferMode::Single => fence(Ordering::SeqCst),
            BufferMode::Double => {
                let generation = self.swaps.load(Ordering::Acquire);
                self.swap_requested.store(true, Ordering::Release);
                while self.swaps.load(Ordering::Acquire) == generation {
                    if !self.scanner_attached.load(Ordering::Acquire) {
                        self.complete_pending_swap();
                        continue;
                    }
                    thread::sleep(PRESENT_POLL);
                }

                let front = self.front_plane();
                let back = self.back_plane();
                for (dst, src) in back.iter().zip(front.iter()) {
                    dst.store(src.load(Ordering::Relaxed), Ordering::Relaxed);
                }
            }
        }
    }

    /// Number of completed plane swaps.
    pub fn swap_count(&self) -> u64 {
        self.swaps.load(Ordering::Acquire)
    }

    /// Flips the planes if a `present()` is waiting. Only called between frames.
    pub(crate) fn complete_pending_swap(&self) -> bool {
        if self.mode == BufferMode::Single || !self.swap_requested.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.front.fetch_xor(1, Ordering::AcqRel);
        self.swaps.fetch_add(1, Ordering::Release);
        true
    }

    pub(crate) fn attach_scanner(&self, attached: bool) {
        self.scanner_attached.store(attached, Ordering::Release);
    }

    /// Colour the refresh thread sees at `(x, y)`, `None` off the panel.
    pub fn scanned_pixel(&self, x: i32, y: i32) -> Option<Color> {
        self.index(x, y)
            .map(|idx| Color::from_word(self.front_plane()[idx].load(Ordering::Relaxed)))
    }

    /// Quantizes scan row `row` and its lower partner into `words`, one packed
    /// word per column.
    pub(crate) fn pack_row_pair(&self, row: usize, words: &mut [u8]) {
        let brightness = self.brightness();
        let plane = self.front_plane();
        let upper = &plane[row * self.width..(row + 1) * self.width];
        let lower = &plane[(row + SCAN_ROWS) * self.width..(row + SCAN_ROWS + 1) * self.width];

        for ((word, u), l) in words.iter_mut().zip(upper).zip(lower) {
            *word = quantize::pack_pair(
                Color::from_word(u.load(Ordering::Relaxed)),
                Color::from_word(l.load(Ordering::Relaxed)),
                brightness,
            );
        }
    }
}
