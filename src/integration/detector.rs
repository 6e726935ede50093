//! Detector boundary.

use image::RgbImage;

use crate::analytics::Rect;

/// Candidate object produced by a detector.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Bounding box (constructed from TLBR corners by most backends)
    pub bbox: Rect,
    /// Detection confidence score
    pub score: f32,
    /// Class label, e.g. `"person"`
    pub label: String,
}

impl Detection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32, label: impl Into<String>) -> Self {
        Self {
            bbox: Rect::from_tlbr(x1, y1, x2, y2),
            score,
            label: label.into(),
        }
    }
}

/// Trait for object detection backends.
///
/// Implement this trait to feed any detection model into the analytics
/// pipeline.
///
/// # Example
///
/// ```ignore
/// use retail_analytics::{Detection, Detector};
///
/// struct MyDetector {
///     // Your model here
/// }
///
/// impl Detector for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, frame: &image::RgbImage) -> Result<Vec<Detection>, Self::Error> {
///         // Run inference and return every candidate box
///         Ok(vec![])
///     }
/// }
/// ```
pub trait Detector {
    /// Error type for detection failures.
    type Error;

    /// Run inference on one frame and return all candidate boxes.
    ///
    /// Filtering by label and confidence is done by the pipeline, not here.
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, Self::Error>;
}

/// Keep detections with the wanted label and a score of at least `threshold`.
pub fn filter_detections(detections: Vec<Detection>, label: &str, threshold: f32) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|det| det.label == label && det.score >= threshold)
        .collect()
}
