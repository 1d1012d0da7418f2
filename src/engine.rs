//! Row-pair scanning of the framebuffer onto the panel.
//!
//! Per scan row: blank, shift the packed row-pair, select the address, latch,
//! light, dwell. The address and latch only ever change while the panel is
//! blanked, otherwise the previous row's data ghosts onto the new row.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use embedded_hal::digital::OutputPin;
use log::{debug, warn};

use crate::error::PanelError;
use crate::framebuffer::{Framebuffer, PANEL_WIDTH, SCAN_ROWS};
use crate::pins::ControlLines;
use crate::shift::ColumnShift;

pub const DEFAULT_DWELL: Duration = Duration::from_micros(25);
/// Longest frame that still refreshes at 60 Hz.
pub const FRAME_BUDGET: Duration = Duration::from_micros(16_666);

const FAULT_LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Called from the refresh thread for each fault that gets logged.
pub type StatusCallback = Arc<dyn Fn(&PanelError) + Send + Sync>;

/// Counters published by the refresh thread.
#[derive(Debug, Default)]
pub struct RefreshStats {
    frames: AtomicU64,
    faults: AtomicU64,
    last_frame_us: AtomicU64,
}

impl RefreshStats {
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Acquire)
    }

    pub fn last_frame_time(&self) -> Duration {
        Duration::from_micros(self.last_frame_us.load(Ordering::Relaxed))
    }
}

/// Logs the first fault, then at most one line per interval with the number
/// of faults that were not logged in between.
struct FaultLog {
    last_logged: Option<Instant>,
    suppressed: u64,
    callback: Option<StatusCallback>,
}

impl FaultLog {
    fn record(&mut self, err: &PanelError) {
        let now = Instant::now();
        let due = match self.last_logged {
            Some(at) => now.duration_since(at) >= FAULT_LOG_INTERVAL,
            None => true,
        };
        if !due {
            self.suppressed += 1;
            return;
        }

        if self.suppressed > 0 {
            warn!("panel fault: {} ({} more since last report)", err, self.suppressed);
        } else {
            warn!("panel fault: {}", err);
        }
        if let Some(callback) = &self.callback {
            callback(err);
        }
        self.last_logged = Some(now);
        self.suppressed = 0;
    }
}

pub struct RowScanEngine<P, S> {
    lines: ControlLines<P>,
    shift: S,
    dwell: Duration,
    words: Vec<u8>,
    faults: FaultLog,
    over_budget: bool,
}

impl<P: OutputPin, S: ColumnShift> RowScanEngine<P, S> {
    pub fn new(lines: ControlLines<P>, shift: S, dwell: Duration) -> Self {
        RowScanEngine {
            lines,
            shift,
            dwell,
            words: vec![0; PANEL_WIDTH],
            faults: FaultLog {
                last_logged: None,
                suppressed: 0,
                callback: None,
            },
            over_budget: false,
        }
    }

    pub fn with_status_callback(mut self, callback: StatusCallback) -> Self {
        self.faults.callback = Some(callback);
        self
    }

    pub fn set_status_callback(&mut self, callback: Option<StatusCallback>) {
        self.faults.callback = callback;
    }

    pub fn dwell(&self) -> Duration {
        self.dwell
    }

    /// Packed words of the row-pair shifted last.
    pub fn words(&self) -> &[u8] {
        &self.words
    }

    pub fn blank(&mut self) -> Result<(), PanelError> {
        self.lines.blank()
    }

    /// Shows one row-pair and holds it lit for the dwell time.
    pub fn scan_row(&mut self, fb: &Framebuffer, row: usize) -> Result<(), PanelError> {
        if row >= SCAN_ROWS {
            return Err(PanelError::RowOutOfRange(row));
        }

        self.lines.blank()?;
        fb.pack_row_pair(row, &mut self.words);
        self.shift.shift_row(&self.words)?;
        self.lines.select_row(row)?;
        self.lines.pulse_latch()?;
        self.lines.unblank()?;
        spin_for(self.dwell);
        Ok(())
    }

    /// Scans every row-pair once, checking `keep_running` after each row.
    /// Returns `false` if cancelled before the last row. The panel is blanked
    /// on return either way.
    pub fn scan_frame(
        &mut self,
        fb: &Framebuffer,
        stats: &RefreshStats,
        keep_running: &AtomicBool,
    ) -> bool {
        if fb.complete_pending_swap() {
            debug!("front buffer swapped at frame boundary");
        }

        let started = Instant::now();
        for row in 0..SCAN_ROWS {
            if let Err(err) = self.scan_row(fb, row) {
                self.fault(stats, &err);
            }
            if !keep_running.load(Ordering::Acquire) {
                self.blank_reporting(stats);
                return false;
            }
        }
        self.blank_reporting(stats);

        let elapsed = started.elapsed();
        stats
            .last_frame_us
            .store(elapsed.as_micros() as u64, Ordering::Relaxed);
        stats.frames.fetch_add(1, Ordering::AcqRel);
        self.check_budget(elapsed);
        true
    }

    /// One uncancellable frame, for driving the panel without the refresh thread.
    pub fn refresh_frame(&mut self, fb: &Framebuffer, stats: &RefreshStats) {
        let always = AtomicBool::new(true);
        self.scan_frame(fb, stats, &always);
    }

    fn fault(&mut self, stats: &RefreshStats, err: &PanelError) {
        stats.faults.fetch_add(1, Ordering::AcqRel);
        self.faults.record(err);
        // leave the panel dark rather than lit with a half-written row
        if let Err(err) = self.lines.blank() {
            stats.faults.fetch_add(1, Ordering::AcqRel);
            self.faults.record(&err);
        }
    }

    fn blank_reporting(&mut self, stats: &RefreshStats) {
        if let Err(err) = self.lines.blank() {
            stats.faults.fetch_add(1, Ordering::AcqRel);
            self.faults.record(&err);
        }
    }

    /// Warns on the first frame over budget, then stays quiet until a frame
    /// comes in under it again. Returns whether it warned.
    fn check_budget(&mut self, elapsed: Duration) -> bool {
        if elapsed <= FRAME_BUDGET {
            self.over_budget = false;
            return false;
        }
        if self.over_budget {
            return false;
        }
        warn!(
            "frame took {}us, over the {}us budget for 60 Hz; lower the row dwell",
            elapsed.as_micros(),
            FRAME_BUDGET.as_micros()
        );
        self.over_budget = true;
        true
    }
}

/// Busy-waits; sleeping would hand the core to the scheduler for far longer
/// than a row's dwell.
fn spin_for(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}
