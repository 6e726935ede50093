//! Frame acquisition and emission.
//!
//! The default build reads and writes image sequences; the `opencv-backend`
//! feature adds video files, streams, cameras and a preview window.

mod sink;
mod source;

#[cfg(feature = "opencv-backend")]
mod opencv_backend;

pub use sink::{FrameSink, ImageSequenceSink, MemorySink, Preview};
pub use source::{DEFAULT_FPS, FrameSource, ImageSequenceSource, MemorySource, SourceProperties};

#[cfg(feature = "opencv-backend")]
pub use opencv_backend::{HighGuiPreview, VideoCaptureSource, VideoWriterSink, mat_to_rgb, rgb_to_mat};
