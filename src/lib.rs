//! Retail foot-traffic analytics over tracked video detections.
//!
//! Confirmed tracks from an external detector and tracker are turned into
//! entry/exit counts across a counting line, a session-long visit heatmap and
//! annotated output frames.

pub mod analytics;
pub mod config;
pub mod driver;
pub mod error;
pub mod integration;
pub mod render;
pub mod report;
pub mod video;

pub use analytics::{
    CountingLine, CrossingEvent, CrossingPolicy, Direction, DirectionConvention,
    HeatmapAccumulator, LineCrossingCounter, LineSpec, Rect, Side, TrackHistory, TrackId,
    TrackState, TrackStateStore,
};
pub use config::AnalyticsConfig;
pub use driver::{Driver, DriverState, SessionSummary, StopReason};
pub use error::{Error, Result};
pub use integration::{
    AnalyticsPipeline, Detection, DetectionBuilder, Detector, FrameUpdate, ProcessedFrame,
    ReplayDetector, ReplayTracker, TrackedObject, Tracker,
};
pub use render::{FrameRenderer, FrameStats, RenderStyle};
pub use report::EventLog;
pub use video::{FrameSink, FrameSource, MemorySink, MemorySource, Preview, SourceProperties};
