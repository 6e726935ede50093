//! Owner of every track's state for the session.

use std::collections::HashMap;

use nalgebra::Point2;

use crate::analytics::track_state::{TrackHistory, TrackState};

/// Track identifier as reported by the external tracker.
pub type TrackId = u64;

/// Map from track identifier to its mutable state.
///
/// Entries are created on first sight. They are only removed through
/// [`TrackStateStore::evict_stale`]; without it the store grows with every
/// identifier the tracker ever reports.
#[derive(Debug, Clone)]
pub struct TrackStateStore {
    tracks: HashMap<TrackId, TrackState>,
    max_history: usize,
    frame_index: u64,
}

impl TrackStateStore {
    /// Create a store whose histories hold at most `max_history` points.
    pub fn new(max_history: usize) -> Self {
        Self {
            tracks: HashMap::new(),
            max_history,
            frame_index: 0,
        }
    }

    /// Set the frame index stamped on subsequent position updates.
    pub fn begin_frame(&mut self, frame_index: u64) {
        self.frame_index = frame_index;
    }

    /// Return the state for `track_id`, creating an empty one if needed.
    pub fn get_or_create(&mut self, track_id: TrackId) -> &mut TrackState {
        let max_history = self.max_history;
        let frame_index = self.frame_index;
        self.tracks.entry(track_id).or_insert_with(|| {
            let mut state = TrackState::new(max_history);
            state.last_seen = frame_index;
            state
        })
    }

    /// Append `point` to the track's bounded history.
    pub fn record_position(&mut self, track_id: TrackId, point: Point2<i32>) -> &mut TrackState {
        let frame_index = self.frame_index;
        let state = self.get_or_create(track_id);
        state.history.push(point);
        state.last_seen = frame_index;
        state
    }

    /// Drop every track not updated within the last `max_age` frames.
    ///
    /// Returns the number of removed entries.
    pub fn evict_stale(&mut self, max_age: u64) -> usize {
        let now = self.frame_index;
        let before = self.tracks.len();
        self.tracks
            .retain(|_, state| now.saturating_sub(state.last_seen) <= max_age);
        before - self.tracks.len()
    }

    #[inline]
    pub fn get(&self, track_id: TrackId) -> Option<&TrackState> {
        self.tracks.get(&track_id)
    }

    #[inline]
    pub fn history(&self, track_id: TrackId) -> Option<&TrackHistory> {
        self.tracks.get(&track_id).map(|state| &state.history)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[inline]
    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TrackId, &TrackState)> {
        self.tracks.iter()
    }
}
