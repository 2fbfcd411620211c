//! Session facade wiring the scheduler, reaction game, zones, RNG streams,
//! and the accumulated clock behind one driver-facing surface.
//!
//! The embedding engine owns the frame loop and calls `tick`, `interact`,
//! `reaction_input`, and `player_entered_zone`; everything outbound flows
//! through the shared [`EventBus`].

use serde::{Deserialize, Serialize};

use crate::data::{ConfigError, PoolData};
use crate::events::{AnomalyResolved, EventBus};
use crate::phase::GameCalendar;
use crate::reaction::{InputKey, ReactionConfig, ReactionGame};
use crate::rng::RngBundle;
use crate::scheduler::{InteractOutcome, NightConfig, NightScheduler};
use crate::zone::{ZoneConfig, ZoneTrigger};

/// Full session tuning: the difficulty curve, the optional reaction minigame,
/// and any number of zone triggers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub night: NightConfig,
    /// `None` disables the reaction gate; gated variants resolve immediately.
    #[serde(default)]
    pub reaction: Option<ReactionConfig>,
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
}

impl SessionConfig {
    /// Validate every nested config.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found in the night curve, the reaction
    /// tuning, or any zone.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.night.validate()?;
        if let Some(reaction) = &self.reaction {
            reaction.validate()?;
        }
        for zone in &self.zones {
            zone.validate()?;
        }
        Ok(())
    }
}

/// One playable night-cycle session over a fixed point pool.
#[derive(Debug)]
pub struct NightSession {
    bus: EventBus,
    scheduler: NightScheduler,
    reaction: Option<ReactionGame>,
    zones: Vec<ZoneTrigger>,
    rng: RngBundle,
    clock: f64,
}

impl NightSession {
    /// Build a session from a user seed, a point pool, and validated tuning.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the tuning fails validation.
    pub fn new(
        seed: u64,
        pool: PoolData,
        cfg: SessionConfig,
        bus: EventBus,
    ) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let scheduler = NightScheduler::new(bus.clone(), cfg.night, pool);
        let reaction = cfg
            .reaction
            .map(|reaction_cfg| ReactionGame::new(reaction_cfg, bus.clone()));
        let zones = cfg.zones.into_iter().map(ZoneTrigger::new).collect();
        Ok(Self {
            bus,
            scheduler,
            reaction,
            zones,
            rng: RngBundle::from_user_seed(seed),
            clock: 0.0,
        })
    }

    /// Advance the session clock and the reaction timers. A round that ends
    /// on this tick routes its outcome into the scheduler.
    pub fn tick(&mut self, dt: f64) {
        self.clock += dt.max(0.0);
        if let Some(reaction) = &mut self.reaction
            && let Some(success) = reaction.tick(dt)
        {
            self.scheduler.on_reaction_result(success, self.clock);
        }
    }

    /// Begin the night for the calendar's current day: zone budgets reset,
    /// then the scheduler activates its random set.
    pub fn start_night(&mut self, calendar: &impl GameCalendar) {
        for zone in &mut self.zones {
            zone.reset_night();
        }
        let mut rng = self.rng.nightly();
        self.scheduler.start_night(calendar.day(), self.clock, &mut *rng);
    }

    /// Player interaction with a point. Starts the reaction round when the
    /// scheduler gates on it.
    pub fn interact(&mut self, point_id: &str) -> InteractOutcome {
        let reaction_available = self.reaction.is_some();
        let outcome = self.scheduler.interact(point_id, self.clock, reaction_available);
        if outcome == InteractOutcome::ReactionStarted
            && let Some(reaction) = &mut self.reaction
        {
            let mut rng = self.rng.reaction();
            reaction.start(&mut *rng);
        }
        outcome
    }

    /// Feed one input press to the running reaction round, routing an ending
    /// outcome into the scheduler.
    pub fn reaction_input(&mut self, key: InputKey) {
        let Some(reaction) = &mut self.reaction else {
            return;
        };
        if let Some(success) = reaction.handle_input(key) {
            self.scheduler.on_reaction_result(success, self.clock);
        }
    }

    /// Player entered the zone volume at `index`. Returns the number of
    /// points actually activated; an out-of-range index is a no-op.
    pub fn player_entered_zone(&mut self, index: usize, calendar: &impl GameCalendar) -> usize {
        let Some(zone) = self.zones.get_mut(index) else {
            return 0;
        };
        let mut rng = self.rng.zone();
        zone.on_player_enter(calendar.phase(), &mut self.scheduler, self.clock, &mut *rng)
    }

    /// Accept an externally-produced resolution report, e.g. from a scripted
    /// sequence outside the interaction path.
    pub fn report_resolved(&mut self, event: &AnomalyResolved) {
        self.scheduler.on_resolved_event(event);
    }

    /// Accumulated session seconds.
    #[must_use]
    pub const fn now(&self) -> f64 {
        self.clock
    }

    #[must_use]
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    #[must_use]
    pub const fn scheduler(&self) -> &NightScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut NightScheduler {
        &mut self.scheduler
    }

    #[must_use]
    pub const fn reaction(&self) -> Option<&ReactionGame> {
        self.reaction.as_ref()
    }

    #[must_use]
    pub fn zone(&self, index: usize) -> Option<&ZoneTrigger> {
        self.zones.get(index)
    }
}
