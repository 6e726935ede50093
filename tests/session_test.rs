use std::io::Write;
use std::path::PathBuf;

use image::RgbImage;
use retail_analytics::integration::FrameDump;
use retail_analytics::{
    AnalyticsConfig, AnalyticsPipeline, CrossingPolicy, DirectionConvention, Driver, EventLog,
    MemorySink, MemorySource, ReplayDetector, ReplayTracker, SessionSummary, SourceProperties,
    StopReason,
};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("retail-analytics-it-{name}-{}", std::process::id()))
}

/// One JSON line per frame; each entry is `(track id, centroid x, centroid y)`.
fn dump(frames: &[&[(u64, i32, i32)]]) -> String {
    let mut out = String::new();
    for (idx, tracks) in frames.iter().enumerate() {
        let tracks: Vec<String> = tracks
            .iter()
            .map(|&(id, x, y)| {
                format!(
                    r#"{{"id": {id}, "bbox": [{}, {}, {}, {}]}}"#,
                    x - 10,
                    y - 20,
                    x + 10,
                    y + 20
                )
            })
            .collect();
        out.push_str(&format!(
            "{{\"frame\": {}, \"tracks\": [{}]}}\n",
            idx + 1,
            tracks.join(", ")
        ));
    }
    out
}

fn run_session(
    frames: &[&[(u64, i32, i32)]],
    config: AnalyticsConfig,
    heatmap: Option<PathBuf>,
) -> (SessionSummary, MemorySink) {
    let dump = FrameDump::from_reader(dump(frames).as_bytes()).unwrap();
    let pipeline = AnalyticsPipeline::new(
        ReplayDetector::new(dump.clone()),
        ReplayTracker::new(dump),
        config,
    )
    .unwrap();

    let props = SourceProperties::new(WIDTH, HEIGHT, 25.0);
    let source = MemorySource::new(props, vec![RgbImage::new(WIDTH, HEIGHT); frames.len()]);
    let mut driver = Driver::new(source, MemorySink::new(), pipeline);
    if let Some(path) = heatmap {
        driver = driver.with_heatmap_output(path);
    }

    let summary = driver.run().unwrap();
    let sink = driver.sink().clone();
    (summary, sink)
}

fn entry_positive() -> AnalyticsConfig {
    AnalyticsConfig {
        direction: DirectionConvention::Signed {
            entry_is_positive: true,
        },
        ..Default::default()
    }
}

#[test]
fn test_single_crossing_counts_one_entry() {
    let (summary, sink) = run_session(&[&[(1, 300, 150)], &[(1, 300, 250)]], entry_positive(), None);

    assert_eq!((summary.entries, summary.exits), (1, 0));
    assert_eq!(summary.frames, 2);
    assert_eq!(sink.frames().len(), 2);
    assert!(sink.is_finished());
}

#[test]
fn test_oscillation_depends_on_policy() {
    let path: [&[(u64, i32, i32)]; 4] = [
        &[(1, 300, 199)],
        &[(1, 300, 201)],
        &[(1, 300, 199)],
        &[(1, 300, 201)],
    ];

    let (repeatable, _) = run_session(&path, AnalyticsConfig::default(), None);
    assert_eq!(repeatable.entries + repeatable.exits, 3);
    // Directions alternate: 2 of one kind, 1 of the other.
    assert_eq!(repeatable.entries.max(repeatable.exits), 2);

    let one_shot = AnalyticsConfig {
        policy: CrossingPolicy::OneShot,
        ..Default::default()
    };
    let (one_shot, _) = run_session(&path, one_shot, None);
    assert_eq!(one_shot.entries + one_shot.exits, 1);
}

#[test]
fn test_opposite_directions() {
    let (summary, _) = run_session(
        &[
            &[(1, 200, 150), (2, 400, 250)],
            &[(1, 200, 250), (2, 400, 150)],
        ],
        entry_positive(),
        None,
    );

    assert_eq!((summary.entries, summary.exits), (1, 1));
    assert_eq!(summary.live_count, 2);
}

#[test]
fn test_zero_frame_source_saves_uniform_heatmap() {
    let heatmap = scratch("empty").join("heatmap.png");
    let (summary, sink) = run_session(&[], AnalyticsConfig::default(), Some(heatmap.clone()));

    assert_eq!(summary.frames, 0);
    assert_eq!(summary.stop_reason, StopReason::EndOfStream);
    assert!(sink.frames().is_empty());
    assert_eq!(summary.to_string(), "Entries: 0 | Exits: 0 | Live count: 0");
    assert_eq!(summary.heatmap_path.as_deref(), Some(heatmap.as_path()));

    let saved = image::open(&heatmap).unwrap().to_rgb8();
    assert_eq!(saved.dimensions(), (WIDTH, HEIGHT));
    let first = *saved.get_pixel(0, 0);
    assert!(saved.pixels().all(|p| *p == first));

    std::fs::remove_dir_all(heatmap.parent().unwrap()).unwrap();
}

#[test]
fn test_trail_keeps_last_points() {
    let config = AnalyticsConfig {
        max_history: 3,
        ..Default::default()
    };
    let dump = FrameDump::from_reader(
        dump(&[
            &[(1, 10, 100)],
            &[(1, 20, 100)],
            &[(1, 30, 100)],
            &[(1, 40, 100)],
            &[(1, 50, 100)],
        ])
        .as_bytes(),
    )
    .unwrap();
    let pipeline = AnalyticsPipeline::new(
        ReplayDetector::new(dump.clone()),
        ReplayTracker::new(dump),
        config,
    )
    .unwrap();
    let props = SourceProperties::new(WIDTH, HEIGHT, 25.0);
    let source = MemorySource::new(props, vec![RgbImage::new(WIDTH, HEIGHT); 5]);
    let mut driver = Driver::new(source, MemorySink::new(), pipeline);
    driver.run().unwrap();

    let xs: Vec<i32> = driver
        .pipeline()
        .store()
        .history(1)
        .unwrap()
        .iter()
        .map(|p| p.x)
        .collect();
    assert_eq!(xs, vec![30, 40, 50]);
}

#[test]
fn test_event_log_records_session() {
    let path = scratch("events.jsonl");
    let dump = FrameDump::from_reader(dump(&[&[(3, 300, 150)], &[(3, 300, 250)]]).as_bytes()).unwrap();
    let pipeline = AnalyticsPipeline::new(
        ReplayDetector::new(dump.clone()),
        ReplayTracker::new(dump),
        entry_positive(),
    )
    .unwrap();
    let props = SourceProperties::new(WIDTH, HEIGHT, 25.0);
    let source = MemorySource::new(props, vec![RgbImage::new(WIDTH, HEIGHT); 2]);
    let mut driver = Driver::new(source, MemorySink::new(), pipeline)
        .with_event_log(EventLog::create(&path).unwrap());
    driver.run().unwrap();

    let events: Vec<serde_json::Value> = std::fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let kinds: Vec<&str> = events.iter().map(|e| e["event"].as_str().unwrap()).collect();

    assert_eq!(kinds.first(), Some(&"session_start"));
    assert_eq!(kinds.last(), Some(&"summary"));
    let crossing = events.iter().find(|e| e["event"] == "crossing").unwrap();
    assert_eq!(crossing["track_id"], 3);
    assert_eq!(crossing["direction"], "entry");
    assert_eq!(crossing["frame"], 2);

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_replay_from_files() {
    let dir = scratch("files");
    std::fs::create_dir_all(&dir).unwrap();
    let tracks = dir.join("tracks.jsonl");
    let mut file = std::fs::File::create(&tracks).unwrap();
    file.write_all(dump(&[&[(1, 300, 150)], &[(1, 300, 250)]]).as_bytes())
        .unwrap();
    drop(file);

    let pipeline = AnalyticsPipeline::new(
        ReplayDetector::open(&tracks).unwrap(),
        ReplayTracker::open(&tracks).unwrap(),
        entry_positive(),
    )
    .unwrap();
    let props = SourceProperties::new(WIDTH, HEIGHT, 0.0);
    let source = MemorySource::new(props, vec![RgbImage::new(WIDTH, HEIGHT); 2]);
    let mut driver = Driver::new(source, MemorySink::new(), pipeline);

    let summary = driver.run().unwrap();
    assert_eq!(summary.entries, 1);

    std::fs::remove_dir_all(&dir).unwrap();
}
