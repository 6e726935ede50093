//! Frame sinks and the live preview seam.

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::debug;

use crate::error::{Error, Result};

/// Destination of annotated frames.
pub trait FrameSink {
    /// Write one frame at the session's dimensions.
    fn write(&mut self, frame: &RgbImage) -> Result<()>;

    /// Flush and close the output.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<K: FrameSink + ?Sized> FrameSink for Box<K> {
    fn write(&mut self, frame: &RgbImage) -> Result<()> {
        (**self).write(frame)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// Live display of annotated frames.
pub trait Preview {
    /// Show `frame`; returns `true` when the viewer asked to quit.
    fn show(&mut self, frame: &RgbImage) -> Result<bool>;
}

impl<V: Preview + ?Sized> Preview for Box<V> {
    fn show(&mut self, frame: &RgbImage) -> Result<bool> {
        (**self).show(frame)
    }
}

/// Keeps every frame in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    frames: Vec<RgbImage>,
    finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[RgbImage] {
        &self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_frames(self) -> Vec<RgbImage> {
        self.frames
    }
}

impl FrameSink for MemorySink {
    fn write(&mut self, frame: &RgbImage) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

/// Writes numbered PNG files (`frame_000001.png`, ...) into a directory.
#[derive(Debug, Clone)]
pub struct ImageSequenceSink {
    dir: PathBuf,
    width: u32,
    height: u32,
    written: u64,
}

impl ImageSequenceSink {
    /// Create the directory if needed; frames must be `width`x`height`.
    pub fn create<P: AsRef<Path>>(dir: P, width: u32, height: u32) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::FrameWrite(format!("{}: {e}", dir.display())))?;

        Ok(Self {
            dir,
            width,
            height,
            written: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Frames written so far.
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl FrameSink for ImageSequenceSink {
    fn write(&mut self, frame: &RgbImage) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(Error::FrameSize {
                width: self.width,
                height: self.height,
                got_width: frame.width(),
                got_height: frame.height(),
            });
        }

        let path = self.dir.join(format!("frame_{:06}.png", self.written + 1));
        frame
            .save(&path)
            .map_err(|e| Error::FrameWrite(format!("{}: {e}", path.display())))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        debug!(frames = self.written, dir = %self.dir.display(), "image sequence closed");
        Ok(())
    }
}
