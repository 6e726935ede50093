//! JET color palette (dark blue -> cyan -> yellow -> dark red).

use image::Rgb;

/// Color for a normalized intensity.
#[inline]
pub fn jet(value: u8) -> Rgb<u8> {
    JET_LUT[value as usize]
}

static JET_LUT: [Rgb<u8>; 256] = build_lut();

const fn channel(x: i32, center: i32) -> u8 {
    // piecewise linear ramp: 1.5 - |4x - c| on x in [0, 1], scaled by 255
    // with x = i / 255 this is (1.5 * 255 - |4i - c * 255|) / 255 * 255
    let dist = 4 * x - center * 255;
    let dist = if dist < 0 { -dist } else { dist };
    let v = 3 * 255 - 2 * dist;
    // v is twice the channel value in [0, 255] units
    let v = (v + 1) / 2;
    if v < 0 {
        0
    } else if v > 255 {
        255
    } else {
        v as u8
    }
}

const fn build_lut() -> [Rgb<u8>; 256] {
    let mut lut = [Rgb([0u8, 0, 0]); 256];
    let mut i = 0;
    while i < 256 {
        let x = i as i32;
        lut[i] = Rgb([channel(x, 3), channel(x, 2), channel(x, 1)]);
        i += 1;
    }
    lut
}
