//! Session-long visit density grid.

use std::path::Path;

use image::{Rgb, RgbImage};
use nalgebra::Point2;
use ndarray::{Array2, Zip};

use crate::analytics::colormap::jet;
use crate::error::{Error, Result};

/// Additive density grid with one cell per frame pixel.
///
/// Cells only ever grow. Normalization happens on a derived byte image each
/// time the map is rendered, never in place.
#[derive(Debug, Clone)]
pub struct HeatmapAccumulator {
    grid: Array2<f32>,
    radius: i64,
}

impl HeatmapAccumulator {
    /// Create a zeroed `width`x`height` grid stamping disks of `radius` pixels.
    pub fn new(width: u32, height: u32, radius: u32) -> Self {
        Self {
            grid: Array2::zeros((height as usize, width as usize)),
            radius: i64::from(radius),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.grid.ncols() as u32
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.grid.nrows() as u32
    }

    #[inline]
    pub fn radius(&self) -> u32 {
        self.radius as u32
    }

    #[inline]
    pub fn grid(&self) -> &Array2<f32> {
        &self.grid
    }

    /// Stamp a filled disk of value `1.0` centered on `point`.
    ///
    /// Points outside the grid are ignored and `false` is returned. Covered
    /// cells are clipped to the grid; overlapping stamps add up.
    pub fn add_point(&mut self, point: Point2<i32>) -> bool {
        let (rows, cols) = self.grid.dim();
        let (x, y) = (point.x, point.y);
        if x < 0 || y < 0 || x as usize >= cols || y as usize >= rows {
            return false;
        }

        let (x, y, r) = (i64::from(x), i64::from(y), self.radius);
        let y0 = (y - r).max(0);
        let y1 = (y + r).min(rows as i64 - 1);
        let x0 = (x - r).max(0);
        let x1 = (x + r).min(cols as i64 - 1);

        for cy in y0..=y1 {
            let dy = cy - y;
            for cx in x0..=x1 {
                let dx = cx - x;
                if dx * dx + dy * dy <= r * r {
                    self.grid[[cy as usize, cx as usize]] += 1.0;
                }
            }
        }
        true
    }

    /// Min-max normalize the grid into `[0, 255]`, truncating to bytes.
    ///
    /// A flat grid (including all zeros) maps every cell to `0`.
    pub fn normalized(&self) -> Array2<u8> {
        let (min, max) = self
            .grid
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        let range = max - min;
        if !range.is_finite() || range <= f32::EPSILON {
            return Array2::zeros(self.grid.dim());
        }

        self.grid
            .mapv(|v| ((v - min) / range * 255.0).clamp(0.0, 255.0) as u8)
    }

    /// Color-mapped density image, without any frame underneath.
    pub fn colorize(&self) -> RgbImage {
        let normalized = self.normalized();
        let mut image = RgbImage::new(self.width(), self.height());
        for ((row, col), &value) in normalized.indexed_iter() {
            image.put_pixel(col as u32, row as u32, jet(value));
        }
        image
    }

    /// Blend the color map over a copy of `frame`.
    ///
    /// The color map gets weight `alpha`, the frame `1 - alpha`.
    pub fn render(&self, frame: &RgbImage, alpha: f32) -> Result<RgbImage> {
        let mut out = frame.clone();
        self.blend_onto(&mut out, alpha)?;
        Ok(out)
    }

    /// In-place variant of [`render`](Self::render).
    pub fn blend_onto(&self, frame: &mut RgbImage, alpha: f32) -> Result<()> {
        if frame.dimensions() != (self.width(), self.height()) {
            return Err(Error::FrameSize {
                width: self.width(),
                height: self.height(),
                got_width: frame.width(),
                got_height: frame.height(),
            });
        }

        let alpha = alpha.clamp(0.0, 1.0);
        let normalized = self.normalized();
        Zip::indexed(&normalized).for_each(|(row, col), &value| {
            let color = jet(value);
            let pixel = frame.get_pixel_mut(col as u32, row as u32);
            *pixel = blend(*pixel, color, alpha);
        });
        Ok(())
    }

    /// Write the color map as a standalone image; format follows the extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.colorize().save(path.as_ref())?;
        Ok(())
    }
}

#[inline]
fn blend(base: Rgb<u8>, over: Rgb<u8>, alpha: f32) -> Rgb<u8> {
    let mix = |b: u8, o: u8| (o as f32 * alpha + b as f32 * (1.0 - alpha)).round() as u8;
    Rgb([
        mix(base.0[0], over.0[0]),
        mix(base.0[1], over.0[1]),
        mix(base.0[2], over.0[2]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_point_stamps_disk() {
        let mut heatmap = HeatmapAccumulator::new(20, 20, 2);
        assert!(heatmap.add_point(Point2::new(10, 10)));

        // radius 2 disk covers 13 cells
        assert_eq!(heatmap.grid().sum(), 13.0);
        assert_eq!(heatmap.grid()[[10, 10]], 1.0);
        assert_eq!(heatmap.grid()[[10, 12]], 1.0);
        assert_eq!(heatmap.grid()[[12, 12]], 0.0);
    }

    #[test]
    fn test_add_point_outside_is_ignored() {
        let mut heatmap = HeatmapAccumulator::new(20, 10, 3);
        assert!(!heatmap.add_point(Point2::new(20, 5)));
        assert!(!heatmap.add_point(Point2::new(5, -1)));
        assert_eq!(heatmap.grid().sum(), 0.0);
    }

    #[test]
    fn test_stamp_near_border_is_clipped() {
        let mut heatmap = HeatmapAccumulator::new(10, 10, 1);
        assert!(heatmap.add_point(Point2::new(0, 0)));
        // center plus right and bottom neighbours
        assert_eq!(heatmap.grid().sum(), 3.0);
    }

    #[test]
    fn test_overlapping_stamps_accumulate() {
        let mut heatmap = HeatmapAccumulator::new(10, 10, 0);
        heatmap.add_point(Point2::new(4, 4));
        heatmap.add_point(Point2::new(4, 4));
        assert_eq!(heatmap.grid()[[4, 4]], 2.0);
    }

    #[test]
    fn test_accumulation_is_order_independent() {
        let points = [
            Point2::new(3, 3),
            Point2::new(5, 4),
            Point2::new(3, 3),
            Point2::new(8, 1),
        ];

        let mut forward = HeatmapAccumulator::new(12, 8, 2);
        let mut backward = HeatmapAccumulator::new(12, 8, 2);
        points.iter().for_each(|&p| {
            forward.add_point(p);
        });
        points.iter().rev().for_each(|&p| {
            backward.add_point(p);
        });

        assert_eq!(forward.grid(), backward.grid());
    }

    #[test]
    fn test_grid_never_decreases() {
        let mut heatmap = HeatmapAccumulator::new(16, 16, 3);
        let mut previous = heatmap.grid().clone();
        for i in 0..10 {
            heatmap.add_point(Point2::new(i, 15 - i));
            let current = heatmap.grid().clone();
            assert!(Zip::from(&current).and(&previous).all(|&c, &p| c >= p));
            previous = current;
        }
    }

    #[test]
    fn test_zero_grid_normalizes_uniformly() {
        let heatmap = HeatmapAccumulator::new(8, 6, 4);
        assert!(heatmap.normalized().iter().all(|&v| v == 0));

        let colored = heatmap.colorize();
        let first = *colored.get_pixel(0, 0);
        assert!(colored.pixels().all(|p| *p == first));
        assert_eq!(first, jet(0));
    }

    #[test]
    fn test_normalization_spans_full_range() {
        let mut heatmap = HeatmapAccumulator::new(10, 10, 0);
        heatmap.add_point(Point2::new(1, 1));
        heatmap.add_point(Point2::new(1, 1));
        heatmap.add_point(Point2::new(2, 2));

        let normalized = heatmap.normalized();
        assert_eq!(normalized[[1, 1]], 255);
        // 127.5 truncates
        assert_eq!(normalized[[2, 2]], 127);
        assert_eq!(normalized[[0, 0]], 0);
    }

    #[test]
    fn test_radius_beyond_frame_covers_whole_grid() {
        let mut heatmap = HeatmapAccumulator::new(6, 4, 50_000);
        assert!(heatmap.add_point(Point2::new(3, 2)));
        assert!(heatmap.grid().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_render_blends_with_alpha() {
        let heatmap = HeatmapAccumulator::new(4, 4, 1);
        let frame = RgbImage::from_pixel(4, 4, Rgb([200, 100, 0]));

        let same = heatmap.render(&frame, 0.0).unwrap();
        assert_eq!(same, frame);

        let full = heatmap.render(&frame, 1.0).unwrap();
        assert!(full.pixels().all(|p| *p == jet(0)));

        let half = heatmap.render(&frame, 0.5).unwrap();
        let expected = blend(Rgb([200, 100, 0]), jet(0), 0.5);
        assert_eq!(*half.get_pixel(2, 3), expected);
    }

    #[test]
    fn test_render_rejects_mismatched_frame() {
        let heatmap = HeatmapAccumulator::new(4, 4, 1);
        let frame = RgbImage::new(5, 4);
        assert!(matches!(
            heatmap.render(&frame, 0.3),
            Err(Error::FrameSize { .. })
        ));
    }

    #[test]
    fn test_save_writes_png() {
        let mut heatmap = HeatmapAccumulator::new(32, 24, 4);
        heatmap.add_point(Point2::new(16, 12));

        let path = std::env::temp_dir().join(format!(
            "retail-analytics-heatmap-{}.png",
            std::process::id()
        ));
        heatmap.save(&path).unwrap();

        let loaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(loaded.dimensions(), (32, 24));
        assert_eq!(*loaded.get_pixel(16, 12), jet(255));
        std::fs::remove_file(&path).ok();
    }
}
