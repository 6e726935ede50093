//! Counting line geometry.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Half-plane of the counting line a point lies in.
///
/// The ordering matters for [`DirectionConvention::Ascending`]
/// (`Negative < Positive`).
///
/// [`DirectionConvention::Ascending`]: crate::analytics::DirectionConvention::Ascending
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
    Negative,
    Positive,
}

impl Side {
    /// Numeric sign of the side (`-1` or `+1`).
    #[inline]
    pub fn signum(self) -> i8 {
        match self {
            Side::Negative => -1,
            Side::Positive => 1,
        }
    }
}

/// Straight line between two fixed pixel positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountingLine {
    pub p1: Point2<i32>,
    pub p2: Point2<i32>,
}

impl CountingLine {
    pub fn new(p1: Point2<i32>, p2: Point2<i32>) -> Self {
        Self { p1, p2 }
    }

    /// 2D cross product of `(p2 - p1)` and `(point - p1)`.
    #[inline]
    pub fn cross(&self, point: Point2<i32>) -> i64 {
        let [p1, p2, point] = [self.p1, self.p2, point].map(|p| p.cast::<i64>());
        let d: Vector2<i64> = p2 - p1;
        let v: Vector2<i64> = point - p1;
        d.x * v.y - d.y * v.x
    }

    /// Side of the line `point` lies on, or `None` when exactly on it.
    #[inline]
    pub fn side(&self, point: Point2<i32>) -> Option<Side> {
        match self.cross(point).signum() {
            1 => Some(Side::Positive),
            -1 => Some(Side::Negative),
            _ => None,
        }
    }
}

/// How the counting line is configured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineSpec {
    /// Endpoints in absolute pixel coordinates.
    Absolute { p1: [i32; 2], p2: [i32; 2] },
    /// Endpoints as fractions of the frame width and height.
    Ratios { p1: [f32; 2], p2: [f32; 2] },
}

impl Default for LineSpec {
    fn default() -> Self {
        LineSpec::Absolute {
            p1: [100, 200],
            p2: [500, 200],
        }
    }
}

impl LineSpec {
    /// Whether the line can only be built once frame dimensions are known.
    pub fn needs_frame_size(&self) -> bool {
        matches!(self, LineSpec::Ratios { .. })
    }

    /// Resolve to pixel coordinates for a `width`x`height` frame.
    ///
    /// Ratios are scaled and truncated; absolute endpoints ignore the frame size.
    pub fn resolve(&self, width: u32, height: u32) -> CountingLine {
        match *self {
            LineSpec::Absolute { p1, p2 } => {
                CountingLine::new(Point2::new(p1[0], p1[1]), Point2::new(p2[0], p2[1]))
            }
            LineSpec::Ratios { p1, p2 } => {
                let scale = |r: [f32; 2]| {
                    Point2::new((r[0] * width as f32) as i32, (r[1] * height as f32) as i32)
                };
                CountingLine::new(scale(p1), scale(p2))
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            LineSpec::Absolute { p1, p2 } => {
                if p1 == p2 {
                    return Err(Error::Config(
                        "counting line endpoints must differ".to_string(),
                    ));
                }
            }
            LineSpec::Ratios { p1, p2 } => {
                let in_unit = |v: f32| (0.0..=1.0).contains(&v);
                if !p1.iter().chain(p2.iter()).all(|&v| in_unit(v)) {
                    return Err(Error::Config(format!(
                        "line ratios must lie in [0, 1], got {p1:?} -> {p2:?}"
                    )));
                }
                if p1 == p2 {
                    return Err(Error::Config(
                        "counting line endpoints must differ".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}
