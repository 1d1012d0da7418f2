mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use common::{display, wait_for_frames};
use embedded_hal::digital::{ErrorType, OutputPin};
use hub75_pimatrix::virtual_panel::{VirtualPin, VirtualPinError};
use hub75_pimatrix::{
    BitBangShift, BufferMode, Color, DisplayOptions, Hub75Display, Line, PanelError, PanelPins,
    SchedulerState, StatusCallback, VirtualPanel,
};

/// Virtual pin whose driver panics on the next blanking edge once `trip` is
/// set, leaving the panel lit.
struct TrippingPin {
    inner: VirtualPin,
    trip: Option<Arc<AtomicBool>>,
    low: bool,
}

impl ErrorType for TrippingPin {
    type Error = VirtualPinError;
}

impl OutputPin for TrippingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.low = true;
        self.inner.set_low()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if let Some(trip) = &self.trip {
            if self.low && trip.swap(false, Ordering::AcqRel) {
                panic!("pin driver crashed");
            }
        }
        self.low = false;
        self.inner.set_high()
    }
}

fn plain(inner: VirtualPin) -> TrippingPin {
    TrippingPin {
        inner,
        trip: None,
        low: false,
    }
}

type TrippingDisplay = Hub75Display<TrippingPin, BitBangShift<TrippingPin>>;

fn tripping_display(panel: &VirtualPanel, mode: BufferMode) -> (TrippingDisplay, Arc<AtomicBool>) {
    let trip = Arc::new(AtomicBool::new(false));
    let pins = panel.pins();
    let pins = PanelPins {
        data: pins.data.map(plain),
        clock: plain(pins.clock),
        latch: plain(pins.latch),
        output_enable: TrippingPin {
            inner: pins.output_enable,
            trip: Some(Arc::clone(&trip)),
            low: false,
        },
        address: pins.address.map(plain),
    };
    let options = DisplayOptions {
        dwell: Duration::from_micros(5),
        buffer_mode: mode,
        ..DisplayOptions::default()
    };
    (Hub75Display::from_pins(pins, &options).unwrap(), trip)
}

fn crash_refresh_thread(display: &TrippingDisplay, trip: &AtomicBool) {
    trip.store(true, Ordering::Release);
    let deadline = Instant::now() + Duration::from_secs(10);
    while display.is_running() {
        assert!(Instant::now() < deadline, "refresh thread survived the crash");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test_log::test]
fn stop_leaves_panel_blanked() {
    let panel = VirtualPanel::new();
    let mut display = display(&panel, BufferMode::Single);
    display.test_pattern();

    display.start().unwrap();
    assert!(display.is_running());
    wait_for_frames(&display.stats(), 2);
    display.stop();

    assert_eq!(display.state(), SchedulerState::Stopped);
    assert!(panel.level(Line::OutputEnable));
    assert!(!panel.output_enabled());
    assert_eq!(panel.ghosting_violations(), 0);
    assert_eq!(display.stats().faults(), 0);
}

#[test_log::test]
fn stop_without_start_is_a_no_op() {
    let panel = VirtualPanel::new();
    let mut display = display(&panel, BufferMode::Single);

    display.stop();
    display.stop();
    assert_eq!(display.state(), SchedulerState::Stopped);
    assert_eq!(panel.clock_pulses(), 0);
}

#[test_log::test]
fn start_twice_keeps_one_refresh_thread() {
    let panel = VirtualPanel::new();
    let mut display = display(&panel, BufferMode::Single);

    display.start().unwrap();
    display.start().unwrap();
    assert!(display.is_running());
    wait_for_frames(&display.stats(), 1);

    display.stop();
    display.stop();
    assert!(!display.is_running());
    assert!(panel.level(Line::OutputEnable));
}

#[test_log::test]
fn refresh_can_be_restarted() {
    let panel = VirtualPanel::new();
    let mut display = display(&panel, BufferMode::Single);
    let stats = display.stats();

    display.start().unwrap();
    wait_for_frames(&stats, 1);
    display.stop();
    let after_first = stats.frames();

    display.start().unwrap();
    wait_for_frames(&stats, after_first + 2);
    display.stop();
    assert!(stats.frames() >= after_first + 2);
}

#[test_log::test]
fn manual_refresh_is_refused_while_running() {
    let panel = VirtualPanel::new();
    let mut display = display(&panel, BufferMode::Single);

    assert!(display.refresh_once());
    display.start().unwrap();
    assert!(!display.refresh_once());
    display.stop();
    assert!(display.refresh_once());
}

#[test_log::test]
fn drawing_while_running_reaches_the_panel() {
    let panel = VirtualPanel::new();
    let mut display = display(&panel, BufferMode::Single);
    let stats = display.stats();

    display.start().unwrap();
    wait_for_frames(&stats, 1);
    display.set_pixel(5, 7, 255, 0, 0);
    display.set_pixel(60, 40, 0, 255, 255);
    let drawn_at = stats.frames();
    wait_for_frames(&stats, drawn_at + 2);
    display.stop();

    assert_eq!(panel.shown_pixel(5, 7), (true, false, false));
    assert_eq!(panel.shown_pixel(60, 40), (false, true, true));
    assert_eq!(panel.shown_pixel(0, 0), (false, false, false));
}

#[test_log::test]
fn dropping_a_running_display_stops_refresh() {
    let panel = VirtualPanel::new();
    let mut display = display(&panel, BufferMode::Single);
    display.clear_to(255, 255, 255);
    display.start().unwrap();
    wait_for_frames(&display.stats(), 1);

    drop(display);
    assert!(panel.level(Line::OutputEnable));
    let pulses = panel.clock_pulses();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(panel.clock_pulses(), pulses);
}

#[test_log::test]
fn present_after_refresh_thread_died_does_not_block() {
    let panel = VirtualPanel::new();
    let (mut display, trip) = tripping_display(&panel, BufferMode::Double);
    let stats = display.stats();
    display.start().unwrap();
    wait_for_frames(&stats, 1);

    crash_refresh_thread(&display, &trip);
    assert_eq!(display.state(), SchedulerState::Stopped);

    display.set_pixel(3, 3, 0, 255, 0);
    display.present();
    assert_eq!(display.framebuffer().scanned_pixel(3, 3), Some(Color::GREEN));

    // start replaces the dead thread
    let frames = stats.frames();
    display.start().unwrap();
    assert!(display.is_running());
    wait_for_frames(&stats, frames + 2);
    display.stop();
    assert_eq!(panel.shown_pixel(3, 3), (false, true, false));
    assert!(panel.level(Line::OutputEnable));
}

#[test_log::test]
fn dropping_after_refresh_thread_died_blanks_panel() {
    let panel = VirtualPanel::new();
    let (mut display, trip) = tripping_display(&panel, BufferMode::Single);
    display.clear_to(255, 255, 255);
    display.start().unwrap();
    wait_for_frames(&display.stats(), 1);

    crash_refresh_thread(&display, &trip);
    assert!(panel.output_enabled());

    drop(display);
    assert!(panel.level(Line::OutputEnable));
    assert!(!panel.output_enabled());
}

#[test_log::test]
fn status_callback_installed_on_display_sees_faults() {
    let panel = VirtualPanel::new();
    let mut display = display(&panel, BufferMode::Single);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: StatusCallback = Arc::new(move |err: &PanelError| {
        sink.lock().unwrap().push(err.to_string());
    });

    assert!(display.set_status_callback(Some(callback)));
    panel.fail_next(Line::Latch, 1);
    display.start().unwrap();
    assert!(!display.set_status_callback(None));
    wait_for_frames(&display.stats(), 2);
    display.stop();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].contains("LAT"));
    assert_eq!(display.stats().faults(), 1);
}
