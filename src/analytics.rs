//! Stateful aggregation core: track histories, line crossings and visit density.

mod colormap;
mod counter;
mod heatmap;
mod line;
mod rect;
mod track_state;
mod track_store;

pub use colormap::jet;
pub use counter::{
    CrossingEvent, CrossingPolicy, Direction, DirectionConvention, LineCrossingCounter,
};
pub use heatmap::HeatmapAccumulator;
pub use line::{CountingLine, LineSpec, Side};
pub use rect::Rect;
pub use track_state::{TrackHistory, TrackState};
pub use track_store::{TrackId, TrackStateStore};
