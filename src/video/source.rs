//! Frame sources.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::debug;

use crate::error::{Error, Result};

/// Frame rate assumed when a source reports none.
pub const DEFAULT_FPS: f64 = 30.0;

/// File extensions read by [`ImageSequenceSource`].
const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Geometry and rate of a frame source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceProperties {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl SourceProperties {
    /// A non-finite or non-positive `fps` falls back to [`DEFAULT_FPS`].
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            DEFAULT_FPS
        };
        Self { width, height, fps }
    }
}

/// A blocking sequence of RGB frames.
pub trait FrameSource {
    fn properties(&self) -> SourceProperties;

    /// Next frame, or `None` at end of stream.
    ///
    /// End of stream is not an error; genuine read failures are.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn properties(&self) -> SourceProperties {
        (**self).properties()
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        (**self).next_frame()
    }
}

/// Frames held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    properties: SourceProperties,
    frames: VecDeque<RgbImage>,
}

impl MemorySource {
    pub fn new(properties: SourceProperties, frames: Vec<RgbImage>) -> Self {
        Self {
            properties,
            frames: frames.into(),
        }
    }

    /// Frames not yet handed out.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for MemorySource {
    fn properties(&self) -> SourceProperties {
        self.properties
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }
}

/// The image files of a directory, read in file name order.
///
/// Dimensions are taken from the first file; every later frame must match.
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    paths: VecDeque<PathBuf>,
    properties: SourceProperties,
}

impl ImageSequenceSource {
    pub fn open<P: AsRef<Path>>(dir: P, fps: f64) -> Result<Self> {
        let dir = dir.as_ref();
        let unavailable = |reason: String| Error::SourceUnavailable(format!("{}: {reason}", dir.display()));

        let entries = std::fs::read_dir(dir).map_err(|e| unavailable(e.to_string()))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        paths.sort();

        let Some(first) = paths.first() else {
            return Err(unavailable("no image files".to_string()));
        };
        let (width, height) = image::image_dimensions(first).map_err(|e| unavailable(e.to_string()))?;
        debug!(frames = paths.len(), width, height, "image sequence opened");

        Ok(Self {
            paths: paths.into(),
            properties: SourceProperties::new(width, height, fps),
        })
    }

    /// Frames not yet read.
    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for ImageSequenceSource {
    fn properties(&self) -> SourceProperties {
        self.properties
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };

        let frame = image::open(&path)
            .map_err(|e| Error::FrameRead(format!("{}: {e}", path.display())))?
            .to_rgb8();

        let SourceProperties { width, height, .. } = self.properties;
        if frame.dimensions() != (width, height) {
            return Err(Error::FrameSize {
                width,
                height,
                got_width: frame.width(),
                got_height: frame.height(),
            });
        }
        Ok(Some(frame))
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("retail-analytics-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_fps_defaults() {
        assert_eq!(SourceProperties::new(1, 1, 0.0).fps, DEFAULT_FPS);
        assert_eq!(SourceProperties::new(1, 1, -5.0).fps, DEFAULT_FPS);
        assert_eq!(SourceProperties::new(1, 1, f64::NAN).fps, DEFAULT_FPS);
        assert_eq!(SourceProperties::new(1, 1, 25.0).fps, 25.0);
    }

    #[test]
    fn test_memory_source_drains() {
        let props = SourceProperties::new(4, 4, 30.0);
        let mut source = MemorySource::new(props, vec![RgbImage::new(4, 4), RgbImage::new(4, 4)]);

        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_image_sequence_reads_sorted_files() {
        let dir = scratch_dir("sequence");
        RgbImage::from_pixel(6, 4, image::Rgb([2, 2, 2])).save(dir.join("b.png")).unwrap();
        RgbImage::from_pixel(6, 4, image::Rgb([1, 1, 1])).save(dir.join("a.png")).unwrap();
        std::fs::write(dir.join("notes.txt"), "skip me").unwrap();

        let mut source = ImageSequenceSource::open(&dir, 0.0).unwrap();
        assert_eq!(source.properties(), SourceProperties::new(6, 4, DEFAULT_FPS));
        assert_eq!(source.remaining(), 2);

        assert_eq!(source.next_frame().unwrap().unwrap().get_pixel(0, 0).0, [1, 1, 1]);
        assert_eq!(source.next_frame().unwrap().unwrap().get_pixel(0, 0).0, [2, 2, 2]);
        assert!(source.next_frame().unwrap().is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_image_sequence_rejects_mismatched_frame() {
        let dir = scratch_dir("mismatch");
        RgbImage::new(6, 4).save(dir.join("0.png")).unwrap();
        RgbImage::new(3, 3).save(dir.join("1.png")).unwrap();

        let mut source = ImageSequenceSource::open(&dir, 30.0).unwrap();
        assert!(source.next_frame().is_ok());
        assert!(matches!(source.next_frame(), Err(Error::FrameSize { .. })));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_or_empty_directory_is_unavailable() {
        let err = ImageSequenceSource::open("/nonexistent/retail-analytics/frames", 30.0).unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(_)));

        let dir = scratch_dir("empty");
        let err = ImageSequenceSource::open(&dir, 30.0).unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(_)));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
