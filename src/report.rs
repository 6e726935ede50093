//! JSON-lines event log of a session.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::analytics::{CrossingEvent, Direction, TrackId};
use crate::config::AnalyticsConfig;
use crate::error::Result;

#[derive(Debug, Serialize)]
pub struct SessionStartEvent<'a> {
    pub event: &'static str,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub config: &'a AnalyticsConfig,
}

#[derive(Debug, Serialize)]
pub struct CrossingLog {
    pub event: &'static str,
    pub frame: u64,
    pub track_id: TrackId,
    pub direction: Direction,
    pub entries: u64,
    pub exits: u64,
}

#[derive(Debug, Serialize)]
pub struct StatusEvent {
    pub event: &'static str,
    pub frame: u64,
    pub elapsed_secs: f64,
    pub live_count: usize,
    pub entries: u64,
    pub exits: u64,
}

#[derive(Debug, Serialize)]
pub struct SummaryEvent<'a> {
    pub event: &'static str,
    pub frames: u64,
    pub entries: u64,
    pub exits: u64,
    pub live_count: usize,
    pub heatmap: Option<&'a str>,
}

/// One JSON object per line, written as the session runs.
pub struct EventLog {
    writer: Box<dyn Write>,
}

impl EventLog {
    pub fn new<W: Write + 'static>(writer: W) -> Self {
        Self {
            writer: Box::new(writer),
        }
    }

    /// Create (or truncate) a log file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self::new(BufWriter::new(file)))
    }

    pub fn write_event<T: Serialize>(&mut self, event: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event).map_err(io::Error::from)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn crossing(&mut self, frame: u64, event: &CrossingEvent, entries: u64, exits: u64) -> Result<()> {
        self.write_event(&CrossingLog {
            event: "crossing",
            frame,
            track_id: event.track_id,
            direction: event.direction,
            entries,
            exits,
        })
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog").finish_non_exhaustive()
    }
}
