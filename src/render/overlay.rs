//! Per-frame annotation of tracks, trails, the counting line and statistics.

use image::{Rgb, RgbImage};
use nalgebra::Point2;
use tracing::warn;

use crate::analytics::{CountingLine, HeatmapAccumulator, TrackStateStore};
use crate::integration::TrackedObject;

use super::canvas::{draw_box, draw_label, draw_polyline, draw_thick_line, text_size};

/// Colors and sizes used by [`FrameRenderer`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderStyle {
    pub box_color: Rgb<u8>,
    pub trail_color: Rgb<u8>,
    pub line_color: Rgb<u8>,
    pub text_color: Rgb<u8>,
    pub text_background: Rgb<u8>,
    /// Stroke width of boxes, trails and the counting line
    pub thickness: u32,
    /// Bitmap font magnification
    pub text_scale: u32,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            box_color: Rgb([0, 255, 0]),
            trail_color: Rgb([0, 200, 255]),
            line_color: Rgb([255, 0, 255]),
            text_color: Rgb([255, 255, 255]),
            text_background: Rgb([0, 0, 0]),
            thickness: 2,
            text_scale: 2,
        }
    }
}

/// Figures printed in the statistics block.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub live_count: usize,
    pub entries: u64,
    pub exits: u64,
    /// Processing rate; omitted from the block when `None`
    pub fps: Option<f32>,
}

impl FrameStats {
    /// Text rows of the statistics block, top to bottom.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Live count: {}", self.live_count),
            format!("Entries: {}  Exits: {}", self.entries, self.exits),
        ];
        if let Some(fps) = self.fps {
            lines.push(format!("FPS: {fps:.1}"));
        }
        lines
    }
}

/// Everything drawn onto one frame.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    /// Tracks reported for this frame; unconfirmed ones are skipped
    pub tracks: &'a [TrackedObject],
    /// Source of the trails
    pub store: &'a TrackStateStore,
    pub line: Option<&'a CountingLine>,
    pub heatmap: Option<&'a HeatmapAccumulator>,
    /// Weight of the heatmap colors in the blend
    pub heatmap_alpha: f32,
    pub stats: FrameStats,
}

/// Stateless frame annotator.
///
/// Layers are drawn in a fixed order: boxes with `ID n` labels, trails, the
/// counting line, the heatmap blend, then the statistics block on top.
#[derive(Debug, Clone, Default)]
pub struct FrameRenderer {
    style: RenderStyle,
}

impl FrameRenderer {
    pub fn new(style: RenderStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &RenderStyle {
        &self.style
    }

    /// Annotate `frame` in place.
    pub fn render(&self, frame: &mut RgbImage, scene: &Scene<'_>) {
        let style = &self.style;
        let confirmed = || scene.tracks.iter().filter(|t| t.confirmed);

        for track in confirmed() {
            let tlbr = track.bbox.to_pixel_tlbr();
            draw_box(frame, tlbr, style.thickness, style.box_color);

            let label = format!("ID {}", track.track_id);
            let (_, label_height) = text_size(&label, style.text_scale);
            let y = tlbr[1]
                .saturating_sub(label_height as i32 + 6)
                .max(2 * style.text_scale as i32);
            draw_label(
                frame,
                &label,
                tlbr[0],
                y,
                style.text_scale,
                style.box_color,
                style.text_background,
            );
        }

        for track in confirmed() {
            if let Some(history) = scene.store.history(track.track_id) {
                let points: Vec<Point2<i32>> = history.to_vec();
                draw_polyline(frame, &points, style.thickness, style.trail_color);
            }
        }

        if let Some(line) = scene.line {
            draw_thick_line(frame, line.p1, line.p2, style.thickness, style.line_color);
        }

        if let Some(heatmap) = scene.heatmap {
            if let Err(e) = heatmap.blend_onto(frame, scene.heatmap_alpha) {
                warn!("skipping heatmap overlay: {e}");
            }
        }

        self.draw_stats(frame, &scene.stats);
    }

    fn draw_stats(&self, frame: &mut RgbImage, stats: &FrameStats) {
        let style = &self.style;
        let (_, row_height) = text_size(" ", style.text_scale);
        let step = (row_height + 6 * style.text_scale) as i32;

        let mut y = 6 * style.text_scale as i32;
        for line in stats.lines() {
            draw_label(
                frame,
                &line,
                6 * style.text_scale as i32,
                y,
                style.text_scale,
                style.text_color,
                style.text_background,
            );
            y += step;
        }
    }
}
