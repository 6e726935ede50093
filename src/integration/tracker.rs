//! Tracker boundary.

use image::RgbImage;

use crate::analytics::{Rect, TrackId};

use super::Detection;

/// A track reported by the external tracker for the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObject {
    /// Persistent identifier assigned by the tracker
    pub track_id: TrackId,
    /// Current bounding box
    pub bbox: Rect,
    /// Whether the tracker considers the track stable
    pub confirmed: bool,
}

impl TrackedObject {
    pub fn new(track_id: TrackId, bbox: Rect, confirmed: bool) -> Self {
        Self {
            track_id,
            bbox,
            confirmed,
        }
    }
}

/// Trait for multi-object trackers.
///
/// The tracker owns identity assignment; the analytics pipeline only
/// consumes its output and ignores unconfirmed tracks.
pub trait Tracker {
    /// Error type for tracking failures.
    type Error;

    /// Associate this frame's detections with existing tracks.
    fn update(
        &mut self,
        detections: &[Detection],
        frame: &RgbImage,
    ) -> Result<Vec<TrackedObject>, Self::Error>;
}
