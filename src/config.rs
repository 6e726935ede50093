//! Session configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analytics::{CrossingPolicy, DirectionConvention, LineSpec};
use crate::error::{Error, Result};

/// Largest accepted heatmap stamp radius, in pixels.
pub const MAX_HEATMAP_RADIUS: u32 = 8192;

/// Configuration for an analytics session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Minimum detector confidence handed to the tracker
    pub confidence_threshold: f32,
    /// Detector label kept for tracking
    pub target_label: String,
    pub line: LineSpec,
    pub direction: DirectionConvention,
    pub policy: CrossingPolicy,
    /// Bound on each track's centroid trail
    pub max_history: usize,
    /// Disk radius, in pixels, stamped per visit
    pub heatmap_radius: u32,
    /// Blend the running heatmap over every annotated frame
    pub overlay_heatmap: bool,
    /// Weight of the color map when blended over a frame
    pub heatmap_alpha: f32,
    /// Frames the tracker keeps a lost track before forgetting it
    pub tracker_max_age: u32,
    /// Forget track state not updated within `tracker_max_age` frames
    pub evict_stale_tracks: bool,
    /// Seconds between console status lines
    pub status_interval_secs: f32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.35,
            target_label: "person".to_string(),
            line: LineSpec::default(),
            direction: DirectionConvention::default(),
            policy: CrossingPolicy::default(),
            max_history: 30,
            heatmap_radius: 8,
            overlay_heatmap: true,
            heatmap_alpha: 0.3,
            tracker_max_age: 30,
            evict_stale_tracks: true,
            status_interval_secs: 2.0,
        }
    }
}

impl AnalyticsConfig {
    /// Load a configuration from a JSON file; missing fields take defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&text).map_err(|e| {
            Error::Config(format!("{}: {e}", path.as_ref().display()))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::Config(format!(
                "confidence threshold must lie in [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.heatmap_alpha) {
            return Err(Error::Config(format!(
                "heatmap alpha must lie in [0, 1], got {}",
                self.heatmap_alpha
            )));
        }
        if self.heatmap_radius > MAX_HEATMAP_RADIUS {
            return Err(Error::Config(format!(
                "heatmap radius must be at most {MAX_HEATMAP_RADIUS} pixels, got {}",
                self.heatmap_radius
            )));
        }
        if self.max_history == 0 {
            return Err(Error::Config("max history must be at least 1".to_string()));
        }
        if self.target_label.is_empty() {
            return Err(Error::Config("target label must not be empty".to_string()));
        }
        if !(self.status_interval_secs.is_finite() && self.status_interval_secs >= 0.0) {
            return Err(Error::Config(format!(
                "status interval must be a non-negative number of seconds, got {}",
                self.status_interval_secs
            )));
        }
        self.line.validate()
    }
}
