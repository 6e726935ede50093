//! Session driver: pulls frames through the pipeline until the source ends.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::integration::{AnalyticsPipeline, Detector, Tracker};
use crate::report::{EventLog, SessionStartEvent, StatusEvent, SummaryEvent};
use crate::video::{FrameSink, FrameSource, Preview};

/// Lifecycle of a [`Driver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Initializing,
    Running,
    Finalizing,
    Stopped,
}

/// Why the frame loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    QuitRequested,
    Interrupted,
}

/// Totals reported when a session ends.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    /// Frames processed and written
    pub frames: u64,
    pub entries: u64,
    pub exits: u64,
    /// Live count of the last processed frame
    pub live_count: usize,
    /// Where the heatmap image was saved, if anywhere
    pub heatmap_path: Option<PathBuf>,
    pub stop_reason: StopReason,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entries: {} | Exits: {} | Live count: {}",
            self.entries, self.exits, self.live_count
        )
    }
}

/// Runs one analytics session from a frame source to a frame sink.
///
/// One frame is in flight at a time. The stop flag is polled once per
/// iteration, so an interrupt always lets the current frame finish and the
/// session finalize normally.
pub struct Driver<S, K, D, T>
where
    S: FrameSource,
    K: FrameSink,
    D: Detector,
    T: Tracker,
{
    source: S,
    sink: K,
    pipeline: AnalyticsPipeline<D, T>,
    preview: Option<Box<dyn Preview>>,
    events: Option<EventLog>,
    stop: Arc<AtomicBool>,
    heatmap_path: Option<PathBuf>,
    status_interval: Duration,
    state: DriverState,
    summary: Option<SessionSummary>,
}

impl<S, K, D, T> Driver<S, K, D, T>
where
    S: FrameSource,
    K: FrameSink,
    D: Detector,
    T: Tracker,
    D::Error: std::error::Error + Send + Sync + 'static,
    T::Error: std::error::Error + Send + Sync + 'static,
{
    /// Size the pipeline from the source's properties.
    pub fn new(source: S, sink: K, mut pipeline: AnalyticsPipeline<D, T>) -> Self {
        let props = source.properties();
        if props.width > 0 && props.height > 0 {
            pipeline.prepare(props.width, props.height);
        } else {
            debug!("source did not report its size, deferring to the first frame");
        }

        let status_interval = Duration::try_from_secs_f32(pipeline.config().status_interval_secs)
            .unwrap_or(Duration::from_secs(2));

        Self {
            source,
            sink,
            pipeline,
            preview: None,
            events: None,
            stop: Arc::new(AtomicBool::new(false)),
            heatmap_path: None,
            status_interval,
            state: DriverState::Initializing,
            summary: None,
        }
    }

    /// Show every annotated frame; a quit request from the preview ends the loop.
    pub fn with_preview(mut self, preview: Box<dyn Preview>) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn with_event_log(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    /// Share a flag that ends the loop once set.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Save the final heatmap image to `path`.
    pub fn with_heatmap_output<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.heatmap_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn pipeline(&self) -> &AnalyticsPipeline<D, T> {
        &self.pipeline
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Run until the source ends, a quit is requested or the stop flag is set.
    ///
    /// The sink is closed and the heatmap saved even when the loop fails; the
    /// loop's error is then returned. Once stopped, the source and sink are
    /// never touched again: later calls return the same summary, or
    /// [`Error::SessionStopped`] when the session ended in a failure.
    pub fn run(&mut self) -> Result<SessionSummary> {
        if self.state == DriverState::Stopped {
            return self.summary.clone().ok_or(Error::SessionStopped);
        }

        self.state = DriverState::Running;
        let outcome = self.run_frames();

        self.state = DriverState::Finalizing;
        let finalized = self.finalize();
        self.state = DriverState::Stopped;

        let stop_reason = match outcome {
            Ok(reason) => reason,
            Err(e) => {
                if let Err(fin) = &finalized {
                    warn!("finalization after failure also failed: {fin}");
                }
                return Err(e);
            }
        };

        let summary = SessionSummary {
            frames: self.pipeline.frame_index(),
            entries: self.pipeline.entries(),
            exits: self.pipeline.exits(),
            live_count: self.pipeline.live_count(),
            heatmap_path: finalized?,
            stop_reason,
        };
        debug!(frames = summary.frames, stop_reason = ?summary.stop_reason, "{summary}");
        self.summary = Some(summary.clone());
        Ok(summary)
    }

    fn run_frames(&mut self) -> Result<StopReason> {
        let props = self.source.properties();
        info!(
            width = props.width,
            height = props.height,
            fps = props.fps,
            "session started"
        );
        if let Some(events) = self.events.as_mut() {
            events.write_event(&SessionStartEvent {
                event: "session_start",
                width: props.width,
                height: props.height,
                fps: props.fps,
                config: self.pipeline.config(),
            })?;
        }

        let start = Instant::now();
        let mut last_status = Instant::now();
        let mut frames: u64 = 0;

        loop {
            if self.stop.load(Ordering::SeqCst) {
                info!("interrupted, finishing session");
                return Ok(StopReason::Interrupted);
            }

            let Some(frame) = self.source.next_frame()? else {
                debug!(frames, "end of stream");
                return Ok(StopReason::EndOfStream);
            };

            let elapsed = start.elapsed().as_secs_f32();
            let fps = (frames > 0 && elapsed > 0.0).then(|| frames as f32 / elapsed);

            let processed = self.pipeline.process_frame(&frame, fps)?;
            frames += 1;

            if let Some(events) = self.events.as_mut() {
                for crossing in &processed.update.crossings {
                    events.crossing(
                        processed.update.frame_index,
                        crossing,
                        self.pipeline.entries(),
                        self.pipeline.exits(),
                    )?;
                }
            }

            self.sink.write(&processed.image)?;

            if let Some(preview) = self.preview.as_mut() {
                if preview.show(&processed.image)? {
                    info!("quit requested from preview");
                    return Ok(StopReason::QuitRequested);
                }
            }

            if last_status.elapsed() >= self.status_interval {
                last_status = Instant::now();
                self.report_status(frames, start.elapsed())?;
            }
        }
    }

    fn report_status(&mut self, frame: u64, elapsed: Duration) -> Result<()> {
        let (live_count, entries, exits) = (
            self.pipeline.live_count(),
            self.pipeline.entries(),
            self.pipeline.exits(),
        );
        info!("Live Count: {live_count} | In: {entries} | Out: {exits}");

        if let Some(events) = self.events.as_mut() {
            events.write_event(&StatusEvent {
                event: "status",
                frame,
                elapsed_secs: elapsed.as_secs_f64(),
                live_count,
                entries,
                exits,
            })?;
        }
        Ok(())
    }

    /// Close the sink, save the heatmap and log the session totals.
    fn finalize(&mut self) -> Result<Option<PathBuf>> {
        self.sink.finish()?;

        let heatmap_path = match (&self.heatmap_path, self.pipeline.heatmap()) {
            (Some(path), Some(heatmap)) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                heatmap.save(path)?;
                debug!(path = %path.display(), "heatmap saved");
                Some(path.clone())
            }
            (Some(path), None) => {
                warn!("no frame size known, heatmap not saved to {}", path.display());
                None
            }
            (None, _) => None,
        };

        if let Some(events) = self.events.as_mut() {
            events.write_event(&SummaryEvent {
                event: "summary",
                frames: self.pipeline.frame_index(),
                entries: self.pipeline.entries(),
                exits: self.pipeline.exits(),
                live_count: self.pipeline.live_count(),
                heatmap: heatmap_path.as_ref().and_then(|p| p.to_str()),
            })?;
            events.flush()?;
        }

        Ok(heatmap_path)
    }
}
