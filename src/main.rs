use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use retail_analytics::video::{FrameSink, FrameSource, ImageSequenceSink, ImageSequenceSource, Preview};
use retail_analytics::{
    AnalyticsConfig, AnalyticsPipeline, CrossingPolicy, DirectionConvention, Driver, EventLog,
    LineSpec, ReplayDetector, ReplayTracker, SessionSummary, SourceProperties,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];

#[derive(Parser, Debug)]
#[command(
    name = "retail-analytics",
    about = "Count entries and exits across a line, accumulate a visit heatmap and annotate video"
)]
struct Args {
    /// Directory of frame images, or a video file, URL or camera index (opencv-backend)
    #[arg(long)]
    source: String,
    /// Annotated output: a directory of PNG frames, or a video file (opencv-backend)
    #[arg(long, default_value = "outputs/annotated")]
    output: PathBuf,
    #[arg(long, default_value = "outputs/heatmap.png")]
    heatmap_output: PathBuf,
    /// JSON-lines dump of tracker output, one record per frame
    #[arg(long, value_name = "PATH")]
    tracks: PathBuf,
    /// JSON-lines dump of detector output; defaults to the tracks dump
    #[arg(long, value_name = "PATH")]
    detections: Option<PathBuf>,
    /// Base configuration file; flags below override it
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Detector confidence threshold
    #[arg(long)]
    conf: Option<f32>,
    /// Counting line in pixels
    #[arg(
        long,
        num_args = 4,
        value_names = ["X1", "Y1", "X2", "Y2"],
        allow_negative_numbers = true,
        conflicts_with = "line_ratios"
    )]
    line: Option<Vec<i32>>,
    /// Counting line as frame ratios "x1,y1,x2,y2"
    #[arg(long, value_parser = parse_ratios)]
    line_ratios: Option<[f32; 4]>,
    #[arg(long, value_enum)]
    direction: Option<DirectionArg>,
    /// Count negative-to-positive crossings as entries (signed convention)
    #[arg(long)]
    entry_positive: bool,
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,
    /// Trail length per track
    #[arg(long)]
    max_trail: Option<usize>,
    /// Frames after which an unseen track is forgotten
    #[arg(long)]
    max_age: Option<u32>,
    /// Keep every track's state for the whole session
    #[arg(long)]
    no_evict: bool,
    #[arg(long)]
    heatmap_radius: Option<u32>,
    #[arg(long)]
    heatmap_alpha: Option<f32>,
    /// Leave the heatmap off the annotated frames
    #[arg(long)]
    no_heatmap_overlay: bool,
    /// Frame rate of image-sequence sources
    #[arg(long, default_value_t = 30.0)]
    fps: f64,
    /// Seconds between status lines
    #[arg(long)]
    status_interval: Option<f32>,
    /// Show annotated frames in a window (opencv-backend)
    #[arg(long)]
    display: bool,
    /// Write session events as JSON lines
    #[arg(long, value_name = "PATH")]
    log_json: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DirectionArg {
    Signed,
    Ascending,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    OneShot,
    Repeatable,
}

fn parse_ratios(s: &str) -> Result<[f32; 4], String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f32>().map_err(|e| format!("{v:?}: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    values
        .try_into()
        .map_err(|v: Vec<f32>| format!("expected 4 comma-separated ratios, got {}", v.len()))
}

fn build_config(args: &Args) -> Result<AnalyticsConfig> {
    let mut config = match &args.config {
        Some(path) => AnalyticsConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AnalyticsConfig::default(),
    };

    if let Some(conf) = args.conf {
        config.confidence_threshold = conf;
    }
    if let Some(line) = &args.line {
        config.line = LineSpec::Absolute {
            p1: [line[0], line[1]],
            p2: [line[2], line[3]],
        };
    }
    if let Some([x1, y1, x2, y2]) = args.line_ratios {
        config.line = LineSpec::Ratios {
            p1: [x1, y1],
            p2: [x2, y2],
        };
    }
    match (args.direction, args.entry_positive) {
        (Some(DirectionArg::Ascending), _) => config.direction = DirectionConvention::Ascending,
        (Some(DirectionArg::Signed), entry_is_positive) | (None, entry_is_positive @ true) => {
            config.direction = DirectionConvention::Signed { entry_is_positive }
        }
        (None, false) => {}
    }
    if let Some(policy) = args.policy {
        config.policy = match policy {
            PolicyArg::OneShot => CrossingPolicy::OneShot,
            PolicyArg::Repeatable => CrossingPolicy::Repeatable,
        };
    }
    if let Some(max_trail) = args.max_trail {
        config.max_history = max_trail;
    }
    if let Some(max_age) = args.max_age {
        config.tracker_max_age = max_age;
    }
    if args.no_evict {
        config.evict_stale_tracks = false;
    }
    if let Some(radius) = args.heatmap_radius {
        config.heatmap_radius = radius;
    }
    if let Some(alpha) = args.heatmap_alpha {
        config.heatmap_alpha = alpha;
    }
    if args.no_heatmap_overlay {
        config.overlay_heatmap = false;
    }
    if let Some(interval) = args.status_interval {
        config.status_interval_secs = interval;
    }

    config.validate()?;
    Ok(config)
}

fn is_video_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn open_source(source: &str, fps: f64) -> Result<Box<dyn FrameSource>> {
    let path = Path::new(source);
    if path.is_dir() {
        return Ok(Box::new(ImageSequenceSource::open(path, fps)?));
    }
    open_video_source(source)
}

fn open_sink(output: &Path, props: SourceProperties) -> Result<Box<dyn FrameSink>> {
    if is_video_path(output) {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        return open_video_sink(output, props);
    }
    Ok(Box::new(ImageSequenceSink::create(output, props.width, props.height)?))
}

#[cfg(feature = "opencv-backend")]
fn open_video_source(source: &str) -> Result<Box<dyn FrameSource>> {
    use retail_analytics::video::VideoCaptureSource;
    Ok(Box::new(VideoCaptureSource::open(source)?))
}

#[cfg(not(feature = "opencv-backend"))]
fn open_video_source(source: &str) -> Result<Box<dyn FrameSource>> {
    Err(retail_analytics::Error::SourceUnavailable(format!(
        "{source}: not a frame directory; video sources need the opencv-backend feature"
    ))
    .into())
}

#[cfg(feature = "opencv-backend")]
fn open_video_sink(output: &Path, props: SourceProperties) -> Result<Box<dyn FrameSink>> {
    use retail_analytics::video::VideoWriterSink;
    let path = output.to_str().context("Output path is not valid UTF-8")?;
    Ok(Box::new(VideoWriterSink::create(path, props)?))
}

#[cfg(not(feature = "opencv-backend"))]
fn open_video_sink(output: &Path, _props: SourceProperties) -> Result<Box<dyn FrameSink>> {
    anyhow::bail!(
        "{}: video output needs the opencv-backend feature; pass a directory instead",
        output.display()
    )
}

#[cfg(feature = "opencv-backend")]
fn open_preview() -> Option<Box<dyn Preview>> {
    use retail_analytics::video::HighGuiPreview;
    match HighGuiPreview::open("Retail Analytics") {
        Ok(preview) => Some(Box::new(preview)),
        Err(err) => {
            warn!("Failed to open display window: {err}. Running headless.");
            None
        }
    }
}

#[cfg(not(feature = "opencv-backend"))]
fn open_preview() -> Option<Box<dyn Preview>> {
    warn!("Display needs the opencv-backend feature. Running headless.");
    None
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("retail_analytics=info")),
        )
        .with_target(false)
        .init();
    let args = Args::parse();
    run(args)
}

fn run(args: Args) -> Result<()> {
    let config = build_config(&args)?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("Failed to install Ctrl-C handler")?;
    }

    let detections = args.detections.as_ref().unwrap_or(&args.tracks);
    let detector = ReplayDetector::open(detections).context("Failed to load detector")?;
    let tracker = ReplayTracker::open(&args.tracks).context("Failed to load tracker")?;

    let source = open_source(&args.source, args.fps)
        .with_context(|| format!("Failed to open input source: {}", args.source))?;
    let props = source.properties();
    let sink = open_sink(&args.output, props)
        .with_context(|| format!("Failed to open output: {}", args.output.display()))?;

    let pipeline = AnalyticsPipeline::new(detector, tracker, config)?;
    let mut driver = Driver::new(source, sink, pipeline)
        .with_stop_flag(stop)
        .with_heatmap_output(&args.heatmap_output);

    if args.display {
        if let Some(preview) = open_preview() {
            driver = driver.with_preview(preview);
        }
    }
    if let Some(path) = &args.log_json {
        let events = EventLog::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        driver = driver.with_event_log(events);
    }

    let summary = driver.run()?;
    println!("{}", final_report(&summary, &args.output));
    Ok(())
}

/// Closing lines printed to stdout regardless of the log level.
fn final_report(summary: &SessionSummary, output: &Path) -> String {
    let mut lines = vec![
        "Processing complete.".to_string(),
        format!("Annotated output saved to: {}", output.display()),
    ];
    if let Some(path) = &summary.heatmap_path {
        lines.push(format!("Heatmap saved to: {}", path.display()));
    }
    lines.push(summary.to_string());
    lines.join("\n")
}
