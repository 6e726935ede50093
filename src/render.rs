//! Frame annotation: drawing primitives and the per-frame renderer.

mod canvas;
mod overlay;

pub use canvas::{draw_box, draw_label, draw_polyline, draw_text, draw_thick_line, fill_rect, text_size};
pub use overlay::{FrameRenderer, FrameStats, RenderStyle, Scene};
