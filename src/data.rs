//! Authoring data for anomaly points and variants.
//!
//! Loaded once before the scheduler runs and treated as read-only at runtime,
//! except through the documented administrative setters on
//! [`crate::point::AnomalyPoint`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::world::Prop;

/// Fixed number of variant slots per point.
pub const VARIANT_SLOTS: usize = 3;

/// Perturbation applied to a prop while a variant is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    Reposition,
    Rotate,
    Rescale,
    Recolor,
    Hide,
    Flip,
    SpawnEffect,
}

/// One configured perturbation a point can host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSpec {
    pub id: String,
    pub kind: VariantKind,
    /// Position or Euler-rotation offset, depending on `kind`.
    #[serde(default)]
    pub offset: [f32; 3],
    /// Componentwise scale factor for rescale variants.
    #[serde(default = "default_multiplier")]
    pub multiplier: [f32; 3],
    /// Target surface color for recolor variants.
    #[serde(default)]
    pub color: Option<[f32; 4]>,
    /// Effect handle instantiated by spawn-effect variants.
    #[serde(default)]
    pub effect: Option<String>,
    /// One-shot sound cue played on apply; presentation hint only.
    #[serde(default)]
    pub sound: Option<String>,
    /// Resolution is gated behind the reaction game.
    #[serde(default)]
    pub requires_reaction: bool,
    /// A failed reaction round requests game over instead of allowing retry.
    #[serde(default)]
    pub fatal_on_failure: bool,
}

fn default_multiplier() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

impl VariantSpec {
    /// Minimal variant of the given kind, useful for authoring tools and tests.
    #[must_use]
    pub fn new(id: &str, kind: VariantKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            offset: [0.0; 3],
            multiplier: default_multiplier(),
            color: None,
            effect: None,
            sound: None,
            requires_reaction: false,
            fatal_on_failure: false,
        }
    }
}

/// Authoring record for one anomaly point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSpec {
    pub id: String,
    /// Candidate variants; empty slots stay selectable-around, never selected.
    #[serde(default)]
    pub variants: Vec<Option<VariantSpec>>,
    /// One non-negative weight per slot; weight 0 excludes the slot.
    #[serde(default)]
    pub weights: Vec<f32>,
    #[serde(default = "default_true")]
    pub anti_repeat: bool,
    /// Debug override: bypasses randomness when set to a populated slot.
    #[serde(default)]
    pub forced_variant: Option<usize>,
    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: f64,
    /// Rest state of the perturbed world object.
    #[serde(default)]
    pub prop: Prop,
}

fn default_true() -> bool {
    true
}

fn default_cooldown() -> f64 {
    90.0
}

impl PointSpec {
    #[must_use]
    pub fn new(id: &str) -> Self {
        let mut spec = Self {
            id: id.to_string(),
            variants: Vec::new(),
            weights: Vec::new(),
            anti_repeat: true,
            forced_variant: None,
            cooldown_seconds: default_cooldown(),
            prop: Prop::default(),
        };
        spec.normalize();
        spec
    }

    /// Enforce the array invariant: exactly [`VARIANT_SLOTS`] variant slots,
    /// a weight per slot, previously entered weights preserved, new slots
    /// defaulting to weight 1, negatives clamped to 0.
    pub fn normalize(&mut self) {
        self.variants.resize(VARIANT_SLOTS, None);
        self.weights.resize(VARIANT_SLOTS, 1.0);
        for weight in &mut self.weights {
            if !weight.is_finite() || *weight < 0.0 {
                *weight = 0.0;
            }
        }
    }
}

/// Container for the full authored pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PoolData {
    pub points: Vec<PointSpec>,
}

impl PoolData {
    /// Empty pool (useful for tests).
    #[must_use]
    pub fn empty() -> Self {
        Self { points: Vec::new() }
    }

    /// Load pool data from a JSON string, normalizing every point.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into valid pool data.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut data: Self = serde_json::from_str(json)?;
        for point in &mut data.points {
            point.normalize();
        }
        Ok(data)
    }

    /// Build pool data from pre-constructed point specs.
    #[must_use]
    pub fn from_points(mut points: Vec<PointSpec>) -> Self {
        for point in &mut points {
            point.normalize();
        }
        Self { points }
    }
}

/// Errors raised when session configuration invariants are violated.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("night base count must be at least 1")]
    ZeroBaseCount,
    #[error("night day interval must be at least 1")]
    ZeroDayInterval,
    #[error("zone probability must be within 0.0..=1.0 (got {0:.2})")]
    ZoneProbability(f64),
    #[error("zone request count must be at least 1")]
    ZeroRequestCount,
    #[error("zone cooldown must not be negative (got {0:.2})")]
    NegativeZoneCooldown(f64),
    #[error("reaction sequence length must be at least 1")]
    EmptyReactionSequence,
    #[error("reaction step time must be positive (got {0:.2})")]
    NonPositiveStepTime(f64),
    #[error("reaction grace period must not be negative (got {0:.2})")]
    NegativeGracePeriod(f64),
    #[error("reaction input pool is empty")]
    EmptyInputPool,
}
