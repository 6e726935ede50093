use nalgebra::Point2;

/// Bounding box representation with format conversion utilities.
///
/// Stored as top-left corner plus dimensions; detectors and trackers
/// usually hand over TLBR corners, which [`Rect::from_tlbr`] accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    /// Top-left x coordinate
    pub x: f32,
    /// Top-left y coordinate
    pub y: f32,
    /// Width of the bounding box
    pub width: f32,
    /// Height of the bounding box
    pub height: f32,
}

impl Rect {
    /// Create a Rect from TLBR format (top-left x, top-left y, bottom-right x, bottom-right y).
    #[inline]
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    /// Convert to TLBR format: (x1, y1, x2, y2).
    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    /// Corners truncated to whole pixels, as drawn on a frame.
    ///
    /// Coordinates beyond the `i32` range saturate.
    #[inline]
    pub fn to_pixel_tlbr(&self) -> [i32; 4] {
        let [x1, y1, x2, y2] = self.to_tlbr();
        [x1 as i32, y1 as i32, x2 as i32, y2 as i32]
    }

    /// Integer centroid of the pixel-truncated corners.
    ///
    /// This is the point recorded in track histories, counted against the
    /// line and stamped into the heatmap.
    #[inline]
    pub fn centroid(&self) -> Point2<i32> {
        let [x1, y1, x2, y2] = self.to_pixel_tlbr().map(i64::from);
        // the midpoint of two i32 values always fits back into i32
        Point2::new(((x1 + x2) / 2) as i32, ((y1 + y2) / 2) as i32)
    }
}
