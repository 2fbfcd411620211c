//! Reaction-time minigame (QTE) and the single-slot pending handle.
//!
//! The game is a shared resource: at most one anomaly instance may be pending
//! on it at a time, tracked by [`ReactionSlot`] with ownership checked by
//! identity. There is no queue; a second attempt while the slot is held is
//! silently ignored by the scheduler.

use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::data::ConfigError;
use crate::events::{EventBus, ReactionResult};

/// Input the player can press during a reaction round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKey {
    Up,
    Down,
    Left,
    Right,
}

/// Reaction-game tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionConfig {
    #[serde(default = "ReactionConfig::default_sequence_len")]
    pub sequence_len: usize,
    /// Seconds allowed per step before the round fails.
    #[serde(default = "ReactionConfig::default_step_seconds")]
    pub step_seconds: f64,
    /// Initial window during which no input or timeout is evaluated; absorbs
    /// the interaction that started the round.
    #[serde(default = "ReactionConfig::default_grace_seconds")]
    pub grace_seconds: f64,
    #[serde(default = "ReactionConfig::default_input_pool")]
    pub input_pool: Vec<InputKey>,
}

impl ReactionConfig {
    const fn default_sequence_len() -> usize {
        4
    }

    const fn default_step_seconds() -> f64 {
        1.2
    }

    const fn default_grace_seconds() -> f64 {
        0.35
    }

    fn default_input_pool() -> Vec<InputKey> {
        vec![InputKey::Up, InputKey::Down, InputKey::Left, InputKey::Right]
    }

    /// Validate tuning invariants.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sequence_len == 0 {
            return Err(ConfigError::EmptyReactionSequence);
        }
        if self.step_seconds <= 0.0 {
            return Err(ConfigError::NonPositiveStepTime(self.step_seconds));
        }
        if self.grace_seconds < 0.0 {
            return Err(ConfigError::NegativeGracePeriod(self.grace_seconds));
        }
        if self.input_pool.is_empty() {
            return Err(ConfigError::EmptyInputPool);
        }
        Ok(())
    }
}

impl Default for ReactionConfig {
    fn default() -> Self {
        Self {
            sequence_len: Self::default_sequence_len(),
            step_seconds: Self::default_step_seconds(),
            grace_seconds: Self::default_grace_seconds(),
            input_pool: Self::default_input_pool(),
        }
    }
}

/// Timed input-sequence minigame. Inactive → Running → Inactive per round;
/// restartable, with every `start` regenerating the sequence.
#[derive(Debug)]
pub struct ReactionGame {
    cfg: ReactionConfig,
    bus: EventBus,
    sequence: SmallVec<[InputKey; 8]>,
    step: usize,
    step_remaining: f64,
    grace_remaining: f64,
    running: bool,
}

impl ReactionGame {
    #[must_use]
    pub fn new(cfg: ReactionConfig, bus: EventBus) -> Self {
        Self {
            cfg,
            bus,
            sequence: SmallVec::new(),
            step: 0,
            step_remaining: 0.0,
            grace_remaining: 0.0,
            running: false,
        }
    }

    /// Begin a round: draw a fresh sequence from the input pool (with
    /// replacement), reset the step index, arm the per-step timer and the
    /// initial grace window.
    pub fn start<R: Rng>(&mut self, rng: &mut R) {
        self.sequence.clear();
        for _ in 0..self.cfg.sequence_len {
            let pick = self.cfg.input_pool[rng.gen_range(0..self.cfg.input_pool.len())];
            self.sequence.push(pick);
        }
        self.step = 0;
        self.step_remaining = self.cfg.step_seconds;
        self.grace_remaining = self.cfg.grace_seconds;
        self.running = true;
    }

    /// Advance timers. Returns the round outcome when this tick ends it.
    pub fn tick(&mut self, dt: f64) -> Option<bool> {
        if !self.running {
            return None;
        }
        let mut dt = dt.max(0.0);
        if self.grace_remaining > 0.0 {
            self.grace_remaining -= dt;
            if self.grace_remaining > 0.0 {
                return None;
            }
            // Leftover time past the grace window counts against the step.
            dt = -self.grace_remaining;
            self.grace_remaining = 0.0;
        }
        self.step_remaining -= dt;
        if self.step_remaining <= 0.0 {
            return Some(self.finish(false));
        }
        None
    }

    /// Feed one input press. Returns the round outcome when it ends the
    /// round; inputs during the grace window are absorbed.
    pub fn handle_input(&mut self, key: InputKey) -> Option<bool> {
        if !self.running || self.grace_remaining > 0.0 {
            return None;
        }
        if self.sequence.get(self.step) == Some(&key) {
            self.step += 1;
            if self.step >= self.sequence.len() {
                return Some(self.finish(true));
            }
            self.step_remaining = self.cfg.step_seconds;
            return None;
        }
        // First wrong key fails, no partial credit.
        Some(self.finish(false))
    }

    fn finish(&mut self, success: bool) -> bool {
        self.running = false;
        self.bus.publish(&ReactionResult { success });
        success
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Input expected at the current step, for HUD presentation.
    #[must_use]
    pub fn expected_input(&self) -> Option<InputKey> {
        if self.running {
            self.sequence.get(self.step).copied()
        } else {
            None
        }
    }

    #[must_use]
    pub const fn step_index(&self) -> usize {
        self.step
    }

    #[must_use]
    pub fn total_steps(&self) -> usize {
        self.sequence.len()
    }

    /// Seconds left on the current step, grace window included.
    #[must_use]
    pub fn remaining_time(&self) -> f64 {
        if self.running {
            self.step_remaining + self.grace_remaining.max(0.0)
        } else {
            0.0
        }
    }
}

/// Explicit single-slot handle for the globally-unique pending reaction.
/// Acquire and release are checked by identity so cancellation paths cannot
/// leave a stuck lock behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionSlot {
    holder: Option<String>,
}

impl ReactionSlot {
    /// Take the slot for `id`. Succeeds when free or already held by `id`.
    pub fn acquire(&mut self, id: &str) -> bool {
        match self.holder.as_deref() {
            None => {
                self.holder = Some(id.to_string());
                true
            }
            Some(holder) => holder == id,
        }
    }

    /// Release the slot if `id` holds it.
    pub fn release(&mut self, id: &str) -> bool {
        if self.holder.as_deref() == Some(id) {
            self.holder = None;
            return true;
        }
        false
    }

    #[must_use]
    pub fn holder(&self) -> Option<&str> {
        self.holder.as_deref()
    }

    #[must_use]
    pub const fn is_held(&self) -> bool {
        self.holder.is_some()
    }

    /// Unconditional reset, used when tearing the night down.
    pub fn clear(&mut self) {
        self.holder = None;
    }
}
