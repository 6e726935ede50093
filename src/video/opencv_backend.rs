//! OpenCV capture, encoding and preview window.
//!
//! Enabled with the `opencv-backend` feature. Frames cross the boundary as
//! RGB `RgbImage`s; conversion to and from OpenCV's BGR layout happens here.

use image::RgbImage;
use opencv::core::{AlgorithmHint, Mat, Size};
use opencv::prelude::*;
use opencv::{highgui, imgproc, videoio};
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::{FrameSink, FrameSource, Preview, SourceProperties};

fn read_err(e: opencv::Error) -> Error {
    Error::FrameRead(e.to_string())
}

fn write_err(e: opencv::Error) -> Error {
    Error::FrameWrite(e.to_string())
}

/// Convert an OpenCV BGR frame to RGB.
pub fn mat_to_rgb(mat: &Mat) -> Result<RgbImage> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(
        mat,
        &mut rgb,
        imgproc::COLOR_BGR2RGB,
        0,
        AlgorithmHint::ALGO_HINT_DEFAULT,
    )
    .map_err(read_err)?;

    let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
    let data = rgb.data_bytes().map_err(read_err)?.to_vec();
    RgbImage::from_raw(width, height, data)
        .ok_or_else(|| Error::FrameRead(format!("unexpected {width}x{height} frame layout")))
}

/// Convert an RGB frame to an OpenCV BGR `Mat`.
pub fn rgb_to_mat(frame: &RgbImage) -> Result<Mat> {
    let flat = Mat::from_slice(frame.as_raw()).map_err(write_err)?;
    let rgb = flat.reshape(3, frame.height() as i32).map_err(write_err)?;

    let mut bgr = Mat::default();
    imgproc::cvt_color(
        &rgb,
        &mut bgr,
        imgproc::COLOR_RGB2BGR,
        0,
        AlgorithmHint::ALGO_HINT_DEFAULT,
    )
    .map_err(write_err)?;
    Ok(bgr)
}

/// Video file, stream URL or camera read through `VideoCapture`.
pub struct VideoCaptureSource {
    capture: videoio::VideoCapture,
    properties: SourceProperties,
    frame: Mat,
}

impl VideoCaptureSource {
    /// Open `source`; an integer is taken as a camera index.
    pub fn open(source: &str) -> Result<Self> {
        let unavailable = |reason: String| Error::SourceUnavailable(format!("{source}: {reason}"));

        let capture = match source.parse::<i32>() {
            Ok(index) => videoio::VideoCapture::new(index, videoio::CAP_ANY),
            Err(_) => videoio::VideoCapture::from_file(source, videoio::CAP_ANY),
        }
        .map_err(|e| unavailable(e.to_string()))?;

        if !capture.is_opened().map_err(|e| unavailable(e.to_string()))? {
            return Err(unavailable("capture did not open".to_string()));
        }

        let prop = |id: i32| capture.get(id).unwrap_or(0.0);
        let properties = SourceProperties::new(
            prop(videoio::CAP_PROP_FRAME_WIDTH) as u32,
            prop(videoio::CAP_PROP_FRAME_HEIGHT) as u32,
            prop(videoio::CAP_PROP_FPS),
        );
        info!(
            source,
            width = properties.width,
            height = properties.height,
            fps = properties.fps,
            "video source opened"
        );

        Ok(Self {
            capture,
            properties,
            frame: Mat::default(),
        })
    }
}

impl FrameSource for VideoCaptureSource {
    fn properties(&self) -> SourceProperties {
        self.properties
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if !self.capture.read(&mut self.frame).map_err(read_err)? || self.frame.empty() {
            return Ok(None);
        }
        mat_to_rgb(&self.frame).map(Some)
    }
}

/// `mp4v`-encoded video file.
pub struct VideoWriterSink {
    writer: videoio::VideoWriter,
    width: u32,
    height: u32,
}

impl VideoWriterSink {
    pub fn create(path: &str, properties: SourceProperties) -> Result<Self> {
        let SourceProperties { width, height, fps } = properties;

        let fourcc = videoio::VideoWriter::fourcc('m', 'p', '4', 'v').map_err(write_err)?;
        let writer = videoio::VideoWriter::new(
            path,
            fourcc,
            fps,
            Size::new(width as i32, height as i32),
            true,
        )
        .map_err(write_err)?;

        if !writer.is_opened().map_err(write_err)? {
            return Err(Error::FrameWrite(format!("{path}: writer did not open")));
        }
        debug!(path, width, height, fps, "video writer opened");

        Ok(Self {
            writer,
            width,
            height,
        })
    }
}

impl FrameSink for VideoWriterSink {
    fn write(&mut self, frame: &RgbImage) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(Error::FrameSize {
                width: self.width,
                height: self.height,
                got_width: frame.width(),
                got_height: frame.height(),
            });
        }
        let bgr = rgb_to_mat(frame)?;
        self.writer.write(&bgr).map_err(write_err)
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.release().map_err(write_err)
    }
}

/// HighGUI window; `q` or Esc requests quit.
pub struct HighGuiPreview {
    window: String,
}

impl HighGuiPreview {
    pub fn open(window: &str) -> Result<Self> {
        highgui::named_window(window, highgui::WINDOW_AUTOSIZE)
            .map_err(|e| Error::FrameWrite(format!("display window: {e}")))?;
        Ok(Self {
            window: window.to_string(),
        })
    }
}

impl Preview for HighGuiPreview {
    fn show(&mut self, frame: &RgbImage) -> Result<bool> {
        let bgr = rgb_to_mat(frame)?;
        highgui::imshow(&self.window, &bgr).map_err(write_err)?;

        let key = highgui::wait_key(1).map_err(write_err)?;
        Ok(key == 27 || key == i32::from(b'q'))
    }
}

impl Drop for HighGuiPreview {
    fn drop(&mut self) {
        let _ = highgui::destroy_window(&self.window);
    }
}
