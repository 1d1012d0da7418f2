//! Colour quantization for a panel whose wiring carries one bit per channel.
//!
//! Brightness is a gain applied before a fixed threshold, so dimming a channel
//! below half intensity switches it off instead of lowering it.

use crate::framebuffer::Color;

/// Scaled channel values at or above this light the LED.
pub const THRESHOLD: u8 = 128;

pub const RED_BIT: u8 = 0b001;
pub const GREEN_BIT: u8 = 0b010;
pub const BLUE_BIT: u8 = 0b100;

/// Shift applied to the lower half's bits inside a packed word.
pub const LOWER_SHIFT: u8 = 3;

/// `(c * (brightness + 1)) >> 8`; brightness 255 leaves the channel untouched.
pub fn scale(channel: u8, brightness: u8) -> u8 {
    ((channel as u16 * (brightness as u16 + 1)) >> 8) as u8
}

pub fn quantize_channel(channel: u8, brightness: u8) -> bool {
    scale(channel, brightness) >= THRESHOLD
}

/// Three-bit R/G/B pattern for one pixel.
pub fn quantize(color: Color, brightness: u8) -> u8 {
    let mut bits = 0;
    if quantize_channel(color.r, brightness) {
        bits |= RED_BIT;
    }
    if quantize_channel(color.g, brightness) {
        bits |= GREEN_BIT;
    }
    if quantize_channel(color.b, brightness) {
        bits |= BLUE_BIT;
    }
    bits
}

/// Packs an upper/lower pixel pair into the six-bit word shifted per column.
pub fn pack_pair(upper: Color, lower: Color, brightness: u8) -> u8 {
    quantize(upper, brightness) | (quantize(lower, brightness) << LOWER_SHIFT)
}

/// Full-intensity colour whose quantization yields `bits` at brightness >= 128.
pub fn expand(bits: u8) -> Color {
    let level = |mask| if bits & mask != 0 { 255 } else { 0 };
    Color::new(level(RED_BIT), level(GREEN_BIT), level(BLUE_BIT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_at_full_brightness() {
        assert!(!quantize_channel(127, 255));
        assert!(quantize_channel(128, 255));
        assert_eq!(quantize(Color::new(127, 127, 127), 255), 0);
        assert_eq!(quantize(Color::new(128, 128, 128), 255), 0b111);
    }

    #[test]
    fn half_brightness_keeps_saturated_channels_on() {
        assert_eq!(scale(255, 128), 128);
        assert!(quantize_channel(255, 128));
        assert!(!quantize_channel(255, 127));
        assert!(!quantize_channel(254, 128));
    }

    #[test]
    fn zero_brightness_is_dark() {
        for c in 0..=255u8 {
            assert!(!quantize_channel(c, 0));
        }
    }

    #[test]
    fn full_brightness_is_unity_gain() {
        for c in 0..=255u8 {
            assert_eq!(scale(c, 255), c);
        }
    }

    #[test]
    fn pair_layout() {
        let word = pack_pair(Color::new(255, 0, 0), Color::new(0, 0, 255), 255);
        assert_eq!(word, RED_BIT | (BLUE_BIT << LOWER_SHIFT));
        assert_eq!(word, 0b100_001);
    }

    #[test]
    fn expand_round_trips_above_half_brightness() {
        for brightness in 128..=255u8 {
            for bits in 0..8u8 {
                assert_eq!(quantize(expand(bits), brightness), bits);
            }
        }
    }
}
