//! Game-phase provider contract.
//!
//! Day number and high-level phase are owned by the surrounding game-state
//! collaborator; the core only reads them, to compute nightly targets and to
//! gate zone spawning to the night phase.

use serde::{Deserialize, Serialize};

/// High-level phase of the game day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    #[default]
    Day,
    Dusk,
    Night,
    Dawn,
}

/// External provider of the current day number and phase.
pub trait GameCalendar {
    /// One-based day counter.
    fn day(&self) -> u32;
    fn phase(&self) -> GamePhase;
}

/// Fixed calendar snapshot, handy for drivers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedCalendar {
    pub day: u32,
    pub phase: GamePhase,
}

impl FixedCalendar {
    #[must_use]
    pub const fn night(day: u32) -> Self {
        Self {
            day,
            phase: GamePhase::Night,
        }
    }
}

impl GameCalendar for FixedCalendar {
    fn day(&self) -> u32 {
        self.day
    }

    fn phase(&self) -> GamePhase {
        self.phase
    }
}
