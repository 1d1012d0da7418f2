use std::thread;
use std::time::{Duration, Instant};

use hub75_pimatrix::virtual_panel::VirtualPin;
use hub75_pimatrix::{
    BitBangShift, BufferMode, DisplayOptions, Hub75Display, RefreshStats, VirtualPanel,
};

pub type VirtualDisplay = Hub75Display<VirtualPin, BitBangShift<VirtualPin>>;

const FRAME_WAIT: Duration = Duration::from_secs(10);

pub fn display(panel: &VirtualPanel, buffer_mode: BufferMode) -> VirtualDisplay {
    let options = DisplayOptions {
        brightness: 255,
        dwell: Duration::from_micros(5),
        buffer_mode,
    };
    Hub75Display::from_pins(panel.pins(), &options).unwrap()
}

/// Blocks until the refresh thread has completed at least `count` frames.
pub fn wait_for_frames(stats: &RefreshStats, count: u64) {
    let deadline = Instant::now() + FRAME_WAIT;
    while stats.frames() < count {
        assert!(Instant::now() < deadline, "refresh stalled at {} frames", stats.frames());
        thread::sleep(Duration::from_millis(1));
    }
}
