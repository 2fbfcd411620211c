//! Spatial trigger requesting extra activations on player entry.
//!
//! The actor filter (only the player-tagged body enters) belongs to the
//! engine layer; the core is handed already-filtered entry notifications.

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::ConfigError;
use crate::phase::GamePhase;
use crate::scheduler::NightScheduler;

/// Zone tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Chance in `0.0..=1.0` that an entry attempts a spawn at all.
    #[serde(default = "ZoneConfig::default_probability")]
    pub probability: f64,
    /// Activations requested per successful entry.
    #[serde(default = "ZoneConfig::default_request_count")]
    pub request_count: usize,
    #[serde(default = "ZoneConfig::default_cooldown_seconds")]
    pub cooldown_seconds: f64,
    /// Maximum successful triggers per night.
    #[serde(default = "ZoneConfig::default_per_night_cap")]
    pub per_night_cap: u32,
    /// Point ids this zone may activate; empty means the whole pool.
    #[serde(default)]
    pub allowed: Vec<String>,
}

impl ZoneConfig {
    const fn default_probability() -> f64 {
        0.5
    }

    const fn default_request_count() -> usize {
        1
    }

    const fn default_cooldown_seconds() -> f64 {
        120.0
    }

    const fn default_per_night_cap() -> u32 {
        2
    }

    /// Validate zone invariants.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(ConfigError::ZoneProbability(self.probability));
        }
        if self.request_count == 0 {
            return Err(ConfigError::ZeroRequestCount);
        }
        if self.cooldown_seconds < 0.0 {
            return Err(ConfigError::NegativeZoneCooldown(self.cooldown_seconds));
        }
        Ok(())
    }
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            probability: Self::default_probability(),
            request_count: Self::default_request_count(),
            cooldown_seconds: Self::default_cooldown_seconds(),
            per_night_cap: Self::default_per_night_cap(),
            allowed: Vec::new(),
        }
    }
}

/// Proximity gate that asks the scheduler for bounded extra activations.
#[derive(Debug, Clone)]
pub struct ZoneTrigger {
    cfg: ZoneConfig,
    last_triggered_at: f64,
    uses_tonight: u32,
}

impl ZoneTrigger {
    #[must_use]
    pub fn new(cfg: ZoneConfig) -> Self {
        Self {
            cfg,
            last_triggered_at: f64::NEG_INFINITY,
            uses_tonight: 0,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ZoneConfig {
        &self.cfg
    }

    #[must_use]
    pub const fn uses_tonight(&self) -> u32 {
        self.uses_tonight
    }

    /// Whether the zone is still inside its own cooldown window.
    #[must_use]
    pub fn is_cooling(&self, now: f64) -> bool {
        now - self.last_triggered_at < self.cfg.cooldown_seconds
    }

    /// Called at night start; the cooldown stamp persists, the usage counter
    /// does not.
    pub fn reset_night(&mut self) {
        self.uses_tonight = 0;
    }

    /// Player entered the zone volume. Gated on the night phase, the zone
    /// cooldown, the per-night cap, and a probability roll; on success the
    /// scheduler is asked for up to `request_count` activations from the
    /// allowed subset (whole pool when none is configured).
    ///
    /// Returns the number of points actually activated. A zero-activation
    /// result consumes neither cooldown nor usage budget, so the zone can
    /// retry as soon as the pool has eligible points again.
    pub fn on_player_enter<R: Rng>(
        &mut self,
        phase: GamePhase,
        scheduler: &mut NightScheduler,
        now: f64,
        rng: &mut R,
    ) -> usize {
        if phase != GamePhase::Night {
            debug!("zone entry outside the night phase; ignoring");
            return 0;
        }
        if self.is_cooling(now) {
            return 0;
        }
        if self.uses_tonight >= self.cfg.per_night_cap {
            debug!("zone reached its per-night cap of {}", self.cfg.per_night_cap);
            return 0;
        }
        if !rng.gen_bool(self.cfg.probability) {
            return 0;
        }

        let candidates = if self.cfg.allowed.is_empty() {
            scheduler.point_ids()
        } else {
            self.cfg.allowed.clone()
        };
        let spawned =
            scheduler.try_spawn_from_allowed(&candidates, self.cfg.request_count, now, rng);
        if spawned > 0 {
            self.last_triggered_at = now;
            self.uses_tonight += 1;
        }
        spawned
    }
}
