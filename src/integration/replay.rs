//! Detector and tracker that replay recorded per-frame output.
//!
//! Dumps are JSON lines, one record per frame:
//!
//! ```text
//! {"frame": 1, "detections": [{"bbox": [x1, y1, x2, y2], "score": 0.9, "label": "person"}],
//!  "tracks": [{"id": 4, "bbox": [x1, y1, x2, y2], "confirmed": true}]}
//! ```
//!
//! Frames are numbered from 1 in processing order. Frames without a record
//! replay as empty; both lists may be omitted from a record.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::analytics::{Rect, TrackId};
use crate::error::{Error, Result};

use super::{Detection, DetectionBuilder, Detector, TrackedObject, Tracker};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// TLBR corners
    pub bbox: [f32; 4],
    pub score: f32,
    #[serde(default = "default_label")]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: TrackId,
    /// TLBR corners
    pub bbox: [f32; 4],
    #[serde(default = "default_confirmed")]
    pub confirmed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame: u64,
    #[serde(default)]
    pub detections: Vec<DetectionRecord>,
    #[serde(default)]
    pub tracks: Vec<TrackRecord>,
}

fn default_label() -> String {
    "person".to_string()
}

fn default_confirmed() -> bool {
    true
}

/// Recorded detections and tracks indexed by frame number.
#[derive(Debug, Clone, Default)]
pub struct FrameDump {
    frames: HashMap<u64, FrameRecord>,
}

impl FrameDump {
    /// Parse JSON lines; blank lines are skipped and repeated frame numbers merge.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut frames: HashMap<u64, FrameRecord> = HashMap::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let record: FrameRecord = serde_json::from_str(&line).map_err(|source| Error::Dump {
                line: idx + 1,
                source,
            })?;

            let entry = frames.entry(record.frame).or_insert_with(|| FrameRecord {
                frame: record.frame,
                ..Default::default()
            });
            entry.detections.extend(record.detections);
            entry.tracks.extend(record.tracks);
        }

        Ok(Self { frames })
    }

    /// Load a dump file; a missing or unreadable file makes `role` unavailable.
    pub fn open<P: AsRef<Path>>(path: P, role: &'static str) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::CollaboratorUnavailable {
            role,
            reason: format!("{}: {e}", path.display()),
        })?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn get(&self, frame: u64) -> Option<&FrameRecord> {
        self.frames.get(&frame)
    }

    /// Number of frames with a record.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Detector returning the recorded detections of each successive frame.
#[derive(Debug, Clone)]
pub struct ReplayDetector {
    dump: FrameDump,
    cursor: u64,
}

impl ReplayDetector {
    pub fn new(dump: FrameDump) -> Self {
        Self { dump, cursor: 0 }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(FrameDump::open(path, "detector")?))
    }
}

impl Detector for ReplayDetector {
    type Error = Infallible;

    fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>, Self::Error> {
        self.cursor += 1;
        let Some(record) = self.dump.get(self.cursor) else {
            return Ok(Vec::new());
        };

        Ok(record
            .detections
            .iter()
            .map(|det| {
                let [x1, y1, x2, y2] = det.bbox;
                DetectionBuilder::new()
                    .tlbr(x1, y1, x2, y2)
                    .score(det.score)
                    .label(det.label.clone())
                    .build()
            })
            .collect())
    }
}

/// Tracker returning the recorded tracks of each successive frame.
///
/// The detections passed in are ignored: identities come from the recording.
#[derive(Debug, Clone)]
pub struct ReplayTracker {
    dump: FrameDump,
    cursor: u64,
}

impl ReplayTracker {
    pub fn new(dump: FrameDump) -> Self {
        Self { dump, cursor: 0 }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(FrameDump::open(path, "tracker")?))
    }
}

impl Tracker for ReplayTracker {
    type Error = Infallible;

    fn update(
        &mut self,
        _detections: &[Detection],
        _frame: &RgbImage,
    ) -> Result<Vec<TrackedObject>, Self::Error> {
        self.cursor += 1;
        let Some(record) = self.dump.get(self.cursor) else {
            return Ok(Vec::new());
        };

        Ok(record
            .tracks
            .iter()
            .map(|track| {
                let [x1, y1, x2, y2] = track.bbox;
                TrackedObject::new(track.id, Rect::from_tlbr(x1, y1, x2, y2), track.confirmed)
            })
            .collect())
    }
}
