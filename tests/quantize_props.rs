use hub75_pimatrix::quantize::{self, quantize_channel};
use hub75_pimatrix::{BufferMode, Color, Framebuffer, PANEL_HEIGHT, PANEL_WIDTH};
use proptest::prelude::*;

fn framebuffer() -> Framebuffer {
    Framebuffer::new(PANEL_WIDTH, PANEL_HEIGHT, BufferMode::Single).unwrap()
}

fn color() -> impl Strategy<Value = Color> {
    (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(r, g, b)| Color::new(r, g, b))
}

proptest! {
    #[test]
    fn set_pixel_reads_back(x in 0..64i32, y in 0..64i32, c in color()) {
        let fb = framebuffer();
        fb.set_pixel(x, y, c);
        prop_assert_eq!(fb.pixel(x, y), Some(c));
    }

    #[test]
    fn writes_off_panel_change_nothing(
        x in prop_oneof![i32::MIN..0, 64..i32::MAX],
        y in any::<i32>(),
        c in color(),
    ) {
        let fb = framebuffer();
        fb.set_pixel(x, y, c);
        fb.set_pixel(y, x, c);
        prop_assert!(fb.to_rgb_bytes().iter().all(|&b| b == 0));
        prop_assert_eq!(fb.pixel(x, y), None);
    }

    #[test]
    fn full_brightness_thresholds_at_128(c in any::<u8>()) {
        prop_assert_eq!(quantize_channel(c, 255), c >= 128);
    }

    #[test]
    fn brighter_never_turns_a_channel_off(c in any::<u8>(), lo in any::<u8>(), hi in any::<u8>()) {
        let (lo, hi) = (lo.min(hi), lo.max(hi));
        if quantize_channel(c, lo) {
            prop_assert!(quantize_channel(c, hi));
        }
    }

    #[test]
    fn brightness_is_clamped(value in any::<i32>()) {
        let fb = framebuffer();
        let stored = fb.set_brightness(value);
        prop_assert_eq!(i32::from(stored), value.clamp(0, 255));
        prop_assert_eq!(fb.brightness(), stored);
    }

    #[test]
    fn pair_word_fits_six_bits(upper in color(), lower in color(), b in any::<u8>()) {
        let word = quantize::pack_pair(upper, lower, b);
        prop_assert!(word < 64);
        prop_assert_eq!(word & 0b111, quantize::quantize(upper, b));
        prop_assert_eq!(word >> quantize::LOWER_SHIFT, quantize::quantize(lower, b));
    }
}
