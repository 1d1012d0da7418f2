mod common;

use common::{display, wait_for_frames};
use hub75_pimatrix::{BufferMode, Color, VirtualPanel};

#[test_log::test]
fn back_plane_stays_hidden_until_present() {
    let panel = VirtualPanel::new();
    let mut display = display(&panel, BufferMode::Double);
    let stats = display.stats();

    display.start().unwrap();
    display.clear_to(255, 0, 0);
    wait_for_frames(&stats, 3);
    display.stop();

    assert_eq!(panel.shown_pixel(0, 0), (false, false, false));
    assert_eq!(panel.shown_pixel(63, 63), (false, false, false));
    assert_eq!(display.framebuffer().swap_count(), 0);
}

#[test_log::test]
fn present_swaps_at_a_frame_boundary() {
    let panel = VirtualPanel::new();
    let mut display = display(&panel, BufferMode::Double);
    let stats = display.stats();

    display.start().unwrap();
    display.clear_to(255, 0, 0);
    display.set_pixel(10, 50, 0, 255, 0);
    display.present();
    let presented_at = stats.frames();
    wait_for_frames(&stats, presented_at + 2);
    display.stop();

    let fb = display.framebuffer();
    assert_eq!(fb.swap_count(), 1);
    assert_eq!(panel.shown_pixel(0, 0), (true, false, false));
    assert_eq!(panel.shown_pixel(10, 50), (false, true, false));
    assert_eq!(panel.ghosting_violations(), 0);

    // the new back plane starts as a copy of what is shown
    assert_eq!(display.get_pixel(10, 50), Some(Color::GREEN));
    assert_eq!(fb.scanned_pixel(10, 50), Some(Color::GREEN));
}

#[test_log::test]
fn present_without_refresh_swaps_immediately() {
    let panel = VirtualPanel::new();
    let mut display = display(&panel, BufferMode::Double);
    let fb = display.framebuffer();

    display.fill_rect(0, 0, 8, 8, 0, 0, 255);
    assert_eq!(fb.scanned_pixel(3, 3), Some(Color::BLACK));
    display.show();
    assert_eq!(fb.swap_count(), 1);
    assert_eq!(fb.scanned_pixel(3, 3), Some(Color::BLUE));

    display.refresh_once();
    assert_eq!(panel.shown_pixel(3, 3), (false, false, true));
    assert_eq!(panel.shown_pixel(8, 8), (false, false, false));
}

#[test_log::test]
fn repeated_presents_alternate_planes() {
    let panel = VirtualPanel::new();
    let mut display = display(&panel, BufferMode::Double);
    let stats = display.stats();
    display.start().unwrap();

    for (i, color) in [Color::RED, Color::GREEN, Color::BLUE].into_iter().enumerate() {
        display.clear_to(color.r, color.g, color.b);
        display.present();
        assert_eq!(display.framebuffer().swap_count(), i as u64 + 1);
    }
    wait_for_frames(&stats, stats.frames() + 2);
    display.stop();

    assert_eq!(panel.shown_pixel(30, 30), (false, false, true));
}
