//! Directional crossing counter.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analytics::line::{CountingLine, Side};
use crate::analytics::track_state::TrackState;
use crate::analytics::track_store::TrackId;

/// Whether a track may contribute more than one crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossingPolicy {
    /// A track is counted at most once in its lifetime.
    OneShot,
    /// Every side change is counted, including oscillations.
    #[default]
    Repeatable,
}

/// How a side change maps to an entry or an exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DirectionConvention {
    /// Negative to positive is an entry when `entry_is_positive` holds and an
    /// exit otherwise; the opposite transition is the complementary event.
    Signed { entry_is_positive: bool },
    /// Moving to the numerically greater side (`-1 -> +1`) is an entry.
    Ascending,
}

impl Default for DirectionConvention {
    fn default() -> Self {
        DirectionConvention::Signed {
            entry_is_positive: false,
        }
    }
}

impl DirectionConvention {
    /// Classify a transition between two different sides.
    pub fn classify(self, from: Side, to: Side) -> Direction {
        match self {
            DirectionConvention::Signed { entry_is_positive } => {
                let towards_positive = from == Side::Negative && to == Side::Positive;
                if towards_positive == entry_is_positive {
                    Direction::Entry
                } else {
                    Direction::Exit
                }
            }
            DirectionConvention::Ascending => {
                if to > from {
                    Direction::Entry
                } else {
                    Direction::Exit
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Entry,
    Exit,
}

/// A counted crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossingEvent {
    pub track_id: TrackId,
    pub direction: Direction,
}

/// Counts entries and exits across a [`CountingLine`].
#[derive(Debug, Clone)]
pub struct LineCrossingCounter {
    line: CountingLine,
    policy: CrossingPolicy,
    convention: DirectionConvention,
    entries: u64,
    exits: u64,
}

impl LineCrossingCounter {
    pub fn new(line: CountingLine, policy: CrossingPolicy, convention: DirectionConvention) -> Self {
        Self {
            line,
            policy,
            convention,
            entries: 0,
            exits: 0,
        }
    }

    #[inline]
    pub fn line(&self) -> &CountingLine {
        &self.line
    }

    #[inline]
    pub fn policy(&self) -> CrossingPolicy {
        self.policy
    }

    #[inline]
    pub fn convention(&self) -> DirectionConvention {
        self.convention
    }

    #[inline]
    pub fn entries(&self) -> u64 {
        self.entries
    }

    #[inline]
    pub fn exits(&self) -> u64 {
        self.exits
    }

    /// Side of the line `point` lies on, `None` when exactly on it.
    #[inline]
    pub fn side(&self, point: Point2<i32>) -> Option<Side> {
        self.line.side(point)
    }

    /// Feed the latest position of a track and count a crossing if one happened.
    ///
    /// The first off-line observation only initialises `state.last_side`. A
    /// point exactly on the line keeps the previous side, so it can never
    /// flip the sign on its own.
    pub fn update(
        &mut self,
        track_id: TrackId,
        point: Point2<i32>,
        state: &mut TrackState,
    ) -> Option<CrossingEvent> {
        let current = self.line.side(point);

        let Some(previous) = state.last_side else {
            state.last_side = current;
            return None;
        };

        let current = current.unwrap_or(previous);
        let mut event = None;

        if current != previous {
            let counts = match self.policy {
                CrossingPolicy::Repeatable => true,
                CrossingPolicy::OneShot => !state.counted,
            };

            if counts {
                let direction = self.convention.classify(previous, current);
                match direction {
                    Direction::Entry => self.entries += 1,
                    Direction::Exit => self.exits += 1,
                }
                if self.policy == CrossingPolicy::OneShot {
                    state.counted = true;
                }
                debug!(track_id, ?direction, entries = self.entries, exits = self.exits, "line crossed");
                event = Some(CrossingEvent {
                    track_id,
                    direction,
                });
            }
        }

        state.last_side = Some(current);
        event
    }
}
