//! AnalyticsPipeline: detection, tracking and aggregation for one session.

use image::RgbImage;
use tracing::{debug, trace};

use crate::analytics::{
    CountingLine, CrossingEvent, HeatmapAccumulator, LineCrossingCounter, TrackStateStore,
};
use crate::config::AnalyticsConfig;
use crate::error::{Error, Result};
use crate::render::{FrameRenderer, FrameStats, Scene};

use super::{Detector, TrackedObject, Tracker, filter_detections};

/// What changed while observing one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameUpdate {
    /// 1-based index of the observed frame
    pub frame_index: u64,
    /// Confirmed tracks in this frame
    pub live_count: usize,
    /// Crossings counted in this frame, in track order
    pub crossings: Vec<CrossingEvent>,
    /// Track states forgotten after this frame
    pub evicted: usize,
}

/// Result of [`AnalyticsPipeline::process_frame`].
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    /// Annotated copy of the input frame
    pub image: RgbImage,
    /// Tracks reported by the tracker, confirmed or not
    pub tracks: Vec<TrackedObject>,
    pub update: FrameUpdate,
}

/// Session state plus the detector and tracker feeding it.
///
/// The counting line, the track store, the counters and the heatmap all live
/// here and are only mutated from [`observe`](Self::observe).
pub struct AnalyticsPipeline<D: Detector, T: Tracker> {
    config: AnalyticsConfig,
    detector: D,
    tracker: T,
    renderer: FrameRenderer,
    counter: Option<LineCrossingCounter>,
    heatmap: Option<HeatmapAccumulator>,
    store: TrackStateStore,
    frame_index: u64,
    live_count: usize,
}

impl<D: Detector, T: Tracker> AnalyticsPipeline<D, T> {
    /// Create a pipeline; absolute counting lines are resolved immediately.
    pub fn new(detector: D, tracker: T, config: AnalyticsConfig) -> Result<Self> {
        config.validate()?;

        let counter = (!config.line.needs_frame_size()).then(|| {
            LineCrossingCounter::new(config.line.resolve(0, 0), config.policy, config.direction)
        });

        Ok(Self {
            store: TrackStateStore::new(config.max_history),
            config,
            detector,
            tracker,
            renderer: FrameRenderer::default(),
            counter,
            heatmap: None,
            frame_index: 0,
            live_count: 0,
        })
    }

    /// Replace the default renderer.
    pub fn with_renderer(mut self, renderer: FrameRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// Size the session for `width`x`height` frames.
    ///
    /// Resolves a ratio line and allocates the heatmap. Later calls are no-ops.
    pub fn prepare(&mut self, width: u32, height: u32) {
        let config = &self.config;

        self.counter.get_or_insert_with(|| {
            let line = config.line.resolve(width, height);
            debug!(?line, width, height, "counting line resolved");
            LineCrossingCounter::new(line, config.policy, config.direction)
        });
        self.heatmap
            .get_or_insert_with(|| HeatmapAccumulator::new(width, height, config.heatmap_radius));
    }

    /// Fold one frame of tracker output into the session state.
    ///
    /// Unconfirmed tracks are ignored. Crossings are only counted once the
    /// line is resolved and visits only stamped once the heatmap exists; both
    /// hold after [`prepare`](Self::prepare).
    pub fn observe(&mut self, tracks: &[TrackedObject]) -> FrameUpdate {
        self.frame_index += 1;
        self.store.begin_frame(self.frame_index);

        let mut update = FrameUpdate {
            frame_index: self.frame_index,
            ..Default::default()
        };

        for track in tracks.iter().filter(|t| t.confirmed) {
            let centroid = track.bbox.centroid();
            let state = self.store.record_position(track.track_id, centroid);

            if let Some(counter) = self.counter.as_mut() {
                if let Some(event) = counter.update(track.track_id, centroid, state) {
                    update.crossings.push(event);
                }
            }
            if let Some(heatmap) = self.heatmap.as_mut() {
                heatmap.add_point(centroid);
            }
            update.live_count += 1;
        }

        if self.config.evict_stale_tracks {
            update.evicted = self.store.evict_stale(u64::from(self.config.tracker_max_age));
            if update.evicted > 0 {
                debug!(evicted = update.evicted, remaining = self.store.len(), "stale tracks evicted");
            }
        }

        self.live_count = update.live_count;
        update
    }

    /// Run detection, tracking, aggregation and rendering on one frame.
    ///
    /// `fps` is printed in the statistics block when given.
    pub fn process_frame(&mut self, frame: &RgbImage, fps: Option<f32>) -> Result<ProcessedFrame>
    where
        D::Error: std::error::Error + Send + Sync + 'static,
        T::Error: std::error::Error + Send + Sync + 'static,
    {
        self.prepare(frame.width(), frame.height());
        if let Some(heatmap) = &self.heatmap {
            if (heatmap.width(), heatmap.height()) != frame.dimensions() {
                return Err(Error::FrameSize {
                    width: heatmap.width(),
                    height: heatmap.height(),
                    got_width: frame.width(),
                    got_height: frame.height(),
                });
            }
        }

        let detections = self
            .detector
            .detect(frame)
            .map_err(|e| Error::Detector(e.into()))?;
        let total = detections.len();
        let detections = filter_detections(
            detections,
            &self.config.target_label,
            self.config.confidence_threshold,
        );

        let tracks = self
            .tracker
            .update(&detections, frame)
            .map_err(|e| Error::Tracker(e.into()))?;
        trace!(total, kept = detections.len(), tracks = tracks.len(), "frame inferred");

        let update = self.observe(&tracks);

        let mut image = frame.clone();
        let scene = Scene {
            tracks: &tracks,
            store: &self.store,
            line: self.line(),
            heatmap: self.heatmap.as_ref().filter(|_| self.config.overlay_heatmap),
            heatmap_alpha: self.config.heatmap_alpha,
            stats: FrameStats {
                live_count: update.live_count,
                entries: self.entries(),
                exits: self.exits(),
                fps,
            },
        };
        self.renderer.render(&mut image, &scene);

        Ok(ProcessedFrame {
            image,
            tracks,
            update,
        })
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Entries counted so far.
    pub fn entries(&self) -> u64 {
        self.counter.as_ref().map_or(0, |c| c.entries())
    }

    /// Exits counted so far.
    pub fn exits(&self) -> u64 {
        self.counter.as_ref().map_or(0, |c| c.exits())
    }

    /// Confirmed tracks in the most recent frame.
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// Number of frames observed.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// The counting line, once resolved.
    pub fn line(&self) -> Option<&CountingLine> {
        self.counter.as_ref().map(|c| c.line())
    }

    pub fn counter(&self) -> Option<&LineCrossingCounter> {
        self.counter.as_ref()
    }

    pub fn heatmap(&self) -> Option<&HeatmapAccumulator> {
        self.heatmap.as_ref()
    }

    pub fn store(&self) -> &TrackStateStore {
        &self.store
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::convert::Infallible;

    use nalgebra::Point2;

    use super::*;
    use crate::analytics::{CrossingPolicy, Direction, DirectionConvention, LineSpec, Rect};
    use crate::integration::Detection;

    struct MockDetector {
        detections: Vec<Detection>,
    }

    impl Detector for MockDetector {
        type Error = Infallible;

        fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>, Self::Error> {
            Ok(self.detections.clone())
        }
    }

    /// Replays scripted frames and remembers what it was fed.
    #[derive(Default)]
    struct ScriptedTracker {
        frames: VecDeque<Vec<TrackedObject>>,
        received: Vec<Vec<Detection>>,
    }

    impl Tracker for ScriptedTracker {
        type Error = Infallible;

        fn update(
            &mut self,
            detections: &[Detection],
            _frame: &RgbImage,
        ) -> Result<Vec<TrackedObject>, Self::Error> {
            self.received.push(detections.to_vec());
            Ok(self.frames.pop_front().unwrap_or_default())
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl std::fmt::Display for Broken {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("model crashed")
        }
    }

    impl std::error::Error for Broken {}

    struct BrokenDetector;

    impl Detector for BrokenDetector {
        type Error = Broken;

        fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>, Self::Error> {
            Err(Broken)
        }
    }

    /// Track whose box has its centroid at `(x, y)`.
    fn at(id: u64, x: i32, y: i32) -> TrackedObject {
        let (x, y) = (x as f32, y as f32);
        TrackedObject::new(id, Rect::from_tlbr(x - 10.0, y - 20.0, x + 10.0, y + 20.0), true)
    }

    fn pipeline(config: AnalyticsConfig) -> AnalyticsPipeline<MockDetector, ScriptedTracker> {
        let detector = MockDetector { detections: vec![] };
        let mut pipeline = AnalyticsPipeline::new(detector, ScriptedTracker::default(), config).unwrap();
        pipeline.prepare(640, 480);
        pipeline
    }

    fn signed(entry_is_positive: bool) -> AnalyticsConfig {
        AnalyticsConfig {
            direction: DirectionConvention::Signed { entry_is_positive },
            ..Default::default()
        }
    }

    #[test]
    fn test_track_crossing_downwards_is_an_entry() {
        let mut pipeline = pipeline(signed(true));

        pipeline.observe(&[at(1, 300, 150)]);
        let update = pipeline.observe(&[at(1, 300, 250)]);

        assert_eq!(update.crossings.len(), 1);
        assert_eq!(update.crossings[0].direction, Direction::Entry);
        assert_eq!((pipeline.entries(), pipeline.exits()), (1, 0));
    }

    #[test]
    fn test_oscillation_under_both_policies() {
        let path = [199, 201, 199, 201];

        let mut repeatable = pipeline(AnalyticsConfig::default());
        let mut one_shot = pipeline(AnalyticsConfig {
            policy: CrossingPolicy::OneShot,
            ..Default::default()
        });

        for y in path {
            repeatable.observe(&[at(1, 300, y)]);
            one_shot.observe(&[at(1, 300, y)]);
        }

        assert_eq!(repeatable.entries() + repeatable.exits(), 3);
        assert_eq!(one_shot.entries() + one_shot.exits(), 1);
    }

    #[test]
    fn test_opposite_tracks() {
        let mut pipeline = pipeline(signed(true));

        pipeline.observe(&[at(1, 200, 150), at(2, 400, 250)]);
        pipeline.observe(&[at(1, 200, 250), at(2, 400, 150)]);

        assert_eq!((pipeline.entries(), pipeline.exits()), (1, 1));
        assert_eq!(pipeline.live_count(), 2);
    }

    #[test]
    fn test_unconfirmed_tracks_are_ignored() {
        let mut pipeline = pipeline(AnalyticsConfig::default());
        let mut tentative = at(5, 300, 150);
        tentative.confirmed = false;

        let update = pipeline.observe(&[tentative]);
        assert_eq!(update.live_count, 0);
        assert!(pipeline.store().is_empty());
        assert!(pipeline.heatmap().unwrap().grid().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut pipeline = pipeline(AnalyticsConfig {
            max_history: 3,
            ..Default::default()
        });

        for x in [10, 20, 30, 40, 50] {
            pipeline.observe(&[at(1, x, 100)]);
        }

        let history = pipeline.store().history(1).unwrap().to_vec();
        assert_eq!(
            history,
            vec![Point2::new(30, 100), Point2::new(40, 100), Point2::new(50, 100)]
        );
    }

    #[test]
    fn test_stale_tracks_are_evicted() {
        let mut pipeline = pipeline(AnalyticsConfig {
            tracker_max_age: 2,
            ..Default::default()
        });

        pipeline.observe(&[at(1, 300, 150)]);
        pipeline.observe(&[]);
        pipeline.observe(&[]);
        assert!(pipeline.store().get(1).is_some());

        let update = pipeline.observe(&[]);
        assert_eq!(update.evicted, 1);
        assert!(pipeline.store().get(1).is_none());
    }

    #[test]
    fn test_ratio_line_resolves_on_prepare() {
        let config = AnalyticsConfig {
            line: LineSpec::Ratios {
                p1: [0.5, 0.6],
                p2: [0.5, 0.2],
            },
            ..Default::default()
        };
        let detector = MockDetector { detections: vec![] };
        let mut pipeline = AnalyticsPipeline::new(detector, ScriptedTracker::default(), config).unwrap();
        assert!(pipeline.line().is_none());

        pipeline.prepare(640, 480);
        let line = pipeline.line().unwrap();
        assert_eq!((line.p1, line.p2), (Point2::new(320, 288), Point2::new(320, 96)));
    }

    #[test]
    fn test_process_frame_filters_detections() {
        let detector = MockDetector {
            detections: vec![
                Detection::new(10.0, 20.0, 50.0, 80.0, 0.9, "person"),
                Detection::new(10.0, 20.0, 50.0, 80.0, 0.2, "person"),
                Detection::new(10.0, 20.0, 50.0, 80.0, 0.9, "cart"),
            ],
        };
        let mut tracker = ScriptedTracker::default();
        tracker.frames.push_back(vec![at(7, 30, 50)]);

        let mut pipeline =
            AnalyticsPipeline::new(detector, tracker, AnalyticsConfig::default()).unwrap();
        let frame = RgbImage::new(640, 480);
        let processed = pipeline.process_frame(&frame, Some(30.0)).unwrap();

        assert_eq!(pipeline.tracker().received[0].len(), 1);
        assert_eq!(processed.update.live_count, 1);
        assert_eq!(processed.image.dimensions(), (640, 480));
        assert_ne!(processed.image, frame);
        assert!(pipeline.heatmap().unwrap().grid()[[50, 30]] > 0.0);
    }

    #[test]
    fn test_far_off_frame_box_is_tracked_without_overflow() {
        let mut tracker = ScriptedTracker::default();
        tracker.frames.push_back(vec![TrackedObject::new(
            1,
            Rect::from_tlbr(2.0e9, 0.0, 2.1e9, 10.0),
            true,
        )]);
        tracker.frames.push_back(vec![at(1, 300, 250)]);

        let detector = MockDetector { detections: vec![] };
        let mut pipeline =
            AnalyticsPipeline::new(detector, tracker, AnalyticsConfig::default()).unwrap();
        let frame = RgbImage::new(640, 480);

        let first = pipeline.process_frame(&frame, None).unwrap();
        assert_eq!(first.update.live_count, 1);
        assert_eq!(pipeline.heatmap().unwrap().grid().sum(), 0.0);

        // the trail now runs from far outside into the frame
        pipeline.process_frame(&frame, None).unwrap();
        assert_eq!(pipeline.store().history(1).unwrap().len(), 2);
    }

    #[test]
    fn test_process_frame_rejects_resized_frames() {
        let mut pipeline = pipeline(AnalyticsConfig::default());
        let err = pipeline.process_frame(&RgbImage::new(320, 240), None).unwrap_err();
        assert!(matches!(err, Error::FrameSize { width: 640, .. }));
    }

    #[test]
    fn test_detector_failure_is_reported() {
        let mut pipeline = AnalyticsPipeline::new(
            BrokenDetector,
            ScriptedTracker::default(),
            AnalyticsConfig::default(),
        )
        .unwrap();

        let err = pipeline.process_frame(&RgbImage::new(64, 64), None).unwrap_err();
        assert!(matches!(err, Error::Detector(_)));
        assert_eq!(err.to_string(), "detector failed: model crashed");
    }
}
