//! Per-track state kept between frames.

use std::collections::VecDeque;

use nalgebra::Point2;

use crate::analytics::line::Side;

/// Sliding window over the most recent centroids of a track.
///
/// Points are kept in temporal order (oldest first); pushing onto a full
/// window evicts the oldest point.
#[derive(Debug, Clone)]
pub struct TrackHistory {
    points: VecDeque<Point2<i32>>,
    capacity: usize,
}

impl TrackHistory {
    /// Create an empty history holding at most `capacity` points.
    ///
    /// A zero capacity is treated as one so the latest position is always kept.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a point, returning the evicted one when the window was full.
    pub fn push(&mut self, point: Point2<i32>) -> Option<Point2<i32>> {
        let evicted = if self.points.len() == self.capacity {
            self.points.pop_front()
        } else {
            None
        };
        self.points.push_back(point);
        evicted
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent point.
    #[inline]
    pub fn last(&self) -> Option<&Point2<i32>> {
        self.points.back()
    }

    /// Iterate oldest to newest.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Point2<i32>> {
        self.points.iter()
    }

    /// Copy of the window, oldest first.
    pub fn to_vec(&self) -> Vec<Point2<i32>> {
        self.points.iter().copied().collect()
    }
}

/// Mutable state of a single track identifier.
#[derive(Debug, Clone)]
pub struct TrackState {
    /// Bounded centroid trail
    pub history: TrackHistory,
    /// Side of the counting line at the last off-line observation
    pub last_side: Option<Side>,
    /// Set once the track registered its crossing under the one-shot policy
    pub counted: bool,
    /// Frame index of the most recent position update
    pub last_seen: u64,
}

impl TrackState {
    pub fn new(max_history: usize) -> Self {
        Self {
            history: TrackHistory::with_capacity(max_history),
            last_side: None,
            counted: false,
            last_seen: 0,
        }
    }
}
