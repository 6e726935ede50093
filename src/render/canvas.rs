//! Clipped drawing primitives on `RgbImage`.
//!
//! Every helper tolerates coordinates outside the image and empty images.

use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect as PixelRect;
use nalgebra::Point2;

/// Glyph cell edge in font pixels.
const GLYPH_SIZE: u32 = 8;

fn is_empty(img: &RgbImage) -> bool {
    img.width() == 0 || img.height() == 0
}

/// Per-pass offsets spreading `thickness` around zero.
fn spread(thickness: u32) -> impl Iterator<Item = i64> {
    let thickness = i64::from(thickness.max(1));
    let start = -(thickness - 1) / 2;
    start..start + thickness
}

/// Cut the segment down to the part inside the image (Liang-Barsky).
fn clip_segment(
    img: &RgbImage,
    from: (i64, i64),
    to: (i64, i64),
) -> Option<((f32, f32), (f32, f32))> {
    let (x0, y0) = (from.0 as f64, from.1 as f64);
    let (dx, dy) = (to.0 as f64 - x0, to.1 as f64 - y0);
    let (max_x, max_y) = (f64::from(img.width() - 1), f64::from(img.height() - 1));

    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in [(-dx, x0), (dx, max_x - x0), (-dy, y0), (dy, max_y - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            if t > t1 {
                return None;
            }
            t0 = t0.max(t);
        } else {
            if t < t0 {
                return None;
            }
            t1 = t1.min(t);
        }
    }

    let at = |t: f64| ((x0 + t * dx).round() as f32, (y0 + t * dy).round() as f32);
    Some((at(t0), at(t1)))
}

fn draw_segment(img: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    if let Some((start, end)) = clip_segment(img, from, to) {
        draw_line_segment_mut(img, start, end, color);
    }
}

/// Draw a segment `thickness` pixels wide.
pub fn draw_thick_line(
    img: &mut RgbImage,
    from: Point2<i32>,
    to: Point2<i32>,
    thickness: u32,
    color: Rgb<u8>,
) {
    if is_empty(img) {
        return;
    }

    let (fx, fy) = (i64::from(from.x), i64::from(from.y));
    let (tx, ty) = (i64::from(to.x), i64::from(to.y));
    let mostly_horizontal = (tx - fx).abs() >= (ty - fy).abs();
    for offset in spread(thickness) {
        let (dx, dy) = if mostly_horizontal {
            (0, offset)
        } else {
            (offset, 0)
        };
        draw_segment(img, (fx + dx, fy + dy), (tx + dx, ty + dy), color);
    }
}

/// Draw connected segments through `points`; fewer than two points draw nothing.
pub fn draw_polyline(img: &mut RgbImage, points: &[Point2<i32>], thickness: u32, color: Rgb<u8>) {
    for w in points.windows(2) {
        draw_thick_line(img, w[0], w[1], thickness, color);
    }
}

/// Outline the box with TLBR pixel corners, growing inwards.
pub fn draw_box(img: &mut RgbImage, tlbr: [i32; 4], thickness: u32, color: Rgb<u8>) {
    if is_empty(img) {
        return;
    }

    let (width, height) = (i64::from(img.width()), i64::from(img.height()));
    let [x1, y1, x2, y2] = tlbr.map(i64::from);
    for inset in 0..i64::from(thickness.max(1)) {
        let (l, t, r, b) = (x1 + inset, y1 + inset, x2 - inset, y2 - inset);
        if l > r || t > b {
            break;
        }
        if r < 0 || b < 0 || l >= width || t >= height {
            continue;
        }
        // edges off the image are parked one pixel outside it
        let (l, t, r, b) = (l.max(-1), t.max(-1), r.min(width), b.min(height));
        let rect = PixelRect::at(l as i32, t as i32).of_size((r - l + 1) as u32, (b - t + 1) as u32);
        draw_hollow_rect_mut(img, rect, color);
    }
}

/// Fill the `width`x`height` area at `(x, y)`, clipped to the image.
pub fn fill_rect(img: &mut RgbImage, x: i32, y: i32, width: u32, height: u32, color: Rgb<u8>) {
    let (x, y) = (i64::from(x), i64::from(y));
    let (left, top) = (x.max(0), y.max(0));
    let right = (x + i64::from(width)).min(i64::from(img.width()));
    let bottom = (y + i64::from(height)).min(i64::from(img.height()));
    if left >= right || top >= bottom {
        return;
    }

    let rect = PixelRect::at(left as i32, top as i32)
        .of_size((right - left) as u32, (bottom - top) as u32);
    draw_filled_rect_mut(img, rect, color);
}

/// Pixel size of `text` drawn at `scale`.
pub fn text_size(text: &str, scale: u32) -> (u32, u32) {
    let scale = scale.max(1);
    let chars = text.chars().count() as u32;
    (chars * GLYPH_SIZE * scale, GLYPH_SIZE * scale)
}

/// Draw `text` with its top-left corner at `(x, y)` using an 8x8 bitmap font.
///
/// Characters without a glyph are drawn as `?`.
pub fn draw_text(img: &mut RgbImage, text: &str, x: i32, y: i32, scale: u32, color: Rgb<u8>) {
    if is_empty(img) {
        return;
    }

    let scale = i64::from(scale.max(1));
    let cell = i64::from(GLYPH_SIZE) * scale;
    let (width, height) = (i64::from(img.width()), i64::from(img.height()));
    let (x, y) = (i64::from(x), i64::from(y));

    for (i, c) in text.chars().enumerate() {
        let glyph = BASIC_FONTS
            .get(c)
            .or_else(|| BASIC_FONTS.get('?'))
            .unwrap_or([0; 8]);
        let gx = x + i as i64 * cell;
        if gx >= width {
            break;
        }

        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..i64::from(GLYPH_SIZE) {
                if bits & (1 << col) == 0 {
                    continue;
                }
                let px = gx + col * scale;
                let py = y + row as i64 * scale;
                for sy in py.max(0)..(py + scale).min(height) {
                    for sx in px.max(0)..(px + scale).min(width) {
                        img.put_pixel(sx as u32, sy as u32, color);
                    }
                }
            }
        }
    }
}

/// Draw `text` over a filled background padded by two font pixels.
pub fn draw_label(
    img: &mut RgbImage,
    text: &str,
    x: i32,
    y: i32,
    scale: u32,
    color: Rgb<u8>,
    background: Rgb<u8>,
) {
    let (w, h) = text_size(text, scale);
    let pad = 2 * scale.max(1);
    fill_rect(
        img,
        x.saturating_sub(pad as i32),
        y.saturating_sub(pad as i32),
        w + 2 * pad,
        h + 2 * pad,
        background,
    );
    draw_text(img, text, x, y, scale, color);
}
