//! Integration module connecting detection and tracking backends to the
//! analytics core.
//!
//! The [`Detector`] and [`Tracker`] traits are the only seams the pipeline
//! needs; [`ReplayDetector`] and [`ReplayTracker`] implement them from
//! recorded JSON-lines dumps.

mod builder;
mod detector;
mod pipeline;
mod replay;
mod tracker;

pub use builder::DetectionBuilder;
pub use detector::{Detection, Detector, filter_detections};
pub use pipeline::{AnalyticsPipeline, FrameUpdate, ProcessedFrame};
pub use replay::{DetectionRecord, FrameDump, FrameRecord, ReplayDetector, ReplayTracker, TrackRecord};
pub use tracker::{TrackedObject, Tracker};
