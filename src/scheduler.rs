//! Nightly anomaly scheduling, resolution accounting, and completion.

use log::{debug, warn};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::data::{ConfigError, PoolData};
use crate::events::{AnomalyResolved, EventBus, FatalFailure, NightCompleted, NightProgress};
use crate::instance::AnomalyInstance;
use crate::point::AnomalyPoint;
use crate::reaction::ReactionSlot;

/// Difficulty curve for nightly target counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightConfig {
    /// Anomalies activated on day 1.
    #[serde(default = "NightConfig::default_base_count")]
    pub base_count: u32,
    /// Days between each +1 to the target count.
    #[serde(default = "NightConfig::default_day_interval")]
    pub day_interval: u32,
}

impl NightConfig {
    const fn default_base_count() -> u32 {
        2
    }

    const fn default_day_interval() -> u32 {
        2
    }

    /// Validate curve invariants.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when either field is zero.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.base_count == 0 {
            return Err(ConfigError::ZeroBaseCount);
        }
        if self.day_interval == 0 {
            return Err(ConfigError::ZeroDayInterval);
        }
        Ok(())
    }
}

impl Default for NightConfig {
    fn default() -> Self {
        Self {
            base_count: Self::default_base_count(),
            day_interval: Self::default_day_interval(),
        }
    }
}

/// Result of a player interaction with a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractOutcome {
    /// Nothing happened: unknown point, inactive instance, or the reaction
    /// slot is occupied by another instance.
    Ignored,
    /// The anomaly resolved immediately.
    Resolved,
    /// The instance went pending; the caller should start the reaction game.
    ReactionStarted,
}

#[derive(Debug)]
struct PoolEntry {
    point: AnomalyPoint,
    instance: AnomalyInstance,
}

/// Owns the point/instance pool, decides nightly activation counts, enforces
/// the reaction-slot mutual exclusion, deduplicates resolution reports, and
/// aggregates progress into the night-completed signal.
#[derive(Debug)]
pub struct NightScheduler {
    bus: EventBus,
    cfg: NightConfig,
    entries: Vec<PoolEntry>,
    active: HashSet<String>,
    resolved: HashSet<String>,
    slot: ReactionSlot,
}

impl NightScheduler {
    #[must_use]
    pub fn new(bus: EventBus, cfg: NightConfig, pool: PoolData) -> Self {
        let entries = pool
            .points
            .into_iter()
            .map(|spec| {
                let instance = AnomalyInstance::new(&spec.id, spec.prop.clone());
                PoolEntry {
                    point: AnomalyPoint::new(spec),
                    instance,
                }
            })
            .collect();
        Self {
            bus,
            cfg,
            entries,
            active: HashSet::new(),
            resolved: HashSet::new(),
            slot: ReactionSlot::default(),
        }
    }

    /// Reset every point and instance, then activate the night's random set
    /// and publish the opening progress event. A night with nothing to
    /// activate publishes the degenerate `(0, 0)` progress and completes
    /// immediately; callers treat such a night as instantly won.
    pub fn start_night<R: Rng>(&mut self, day: u32, now: f64, rng: &mut R) {
        self.reset_all();
        let activated = self.activate_random_set(day, now, rng);
        self.bus.publish(&NightProgress {
            resolved: 0,
            total: activated,
        });
        if activated == 0 {
            debug!("night started with an empty eligible pool; completing immediately");
            self.bus.publish(&NightCompleted);
        }
    }

    /// Deactivate every instance, reset points, clear both identity sets and
    /// the reaction slot. Cooldown stamps persist across nights.
    pub fn reset_all(&mut self) {
        for entry in &mut self.entries {
            entry.instance.deactivate(&mut self.slot);
            entry.point.reset();
        }
        self.active.clear();
        self.resolved.clear();
        self.slot.clear();
    }

    /// Nightly target: `clamp(base + (day - 1) / interval, 1, pool)`.
    #[must_use]
    pub fn target_count(&self, day: u32) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        let bonus = day.saturating_sub(1) / self.cfg.day_interval.max(1);
        let target = self.cfg.base_count.saturating_add(bonus).max(1);
        (target as usize).min(self.entries.len())
    }

    fn activate_random_set<R: Rng>(&mut self, day: u32, now: f64, rng: &mut R) -> usize {
        let target = self.target_count(day);
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        order.shuffle(rng);

        let mut activated = 0;
        for index in order {
            if activated >= target {
                break;
            }
            if self.try_activate_entry(index, now, rng) {
                activated += 1;
            }
        }
        activated
    }

    fn try_activate_entry<R: Rng>(&mut self, index: usize, now: f64, rng: &mut R) -> bool {
        let entry = &mut self.entries[index];
        if !entry.point.can_activate(now) {
            return false;
        }
        let Some(variant_index) = entry.point.pick_variant_index(rng) else {
            debug!("skipping point {} with no configured variants", entry.point.id());
            return false;
        };
        let Some(variant) = entry.point.variant(variant_index).cloned() else {
            return false;
        };
        if !entry.instance.activate(&variant) {
            return false;
        }
        entry.point.mark_active(variant_index);
        self.active.insert(entry.point.id().to_string());
        true
    }

    /// Player interaction entry point.
    ///
    /// Immediate resolution publishes [`AnomalyResolved`] before the instance
    /// deactivates, then stamps the point cooldown and runs progress
    /// accounting. Reaction-gated variants acquire the single pending slot;
    /// contention is silently ignored this frame. When no reaction subsystem
    /// is available (`reaction_available == false`) the gate falls back to
    /// immediate resolution.
    pub fn interact(&mut self, point_id: &str, now: f64, reaction_available: bool) -> InteractOutcome {
        let Some(index) = self.index_of(point_id) else {
            debug!("interaction with unknown point {point_id}");
            return InteractOutcome::Ignored;
        };
        if !self.entries[index].instance.can_interact() {
            return InteractOutcome::Ignored;
        }
        if self.entries[index].instance.requires_reaction() && reaction_available {
            if !self.slot.acquire(point_id) {
                debug!("reaction slot busy ({:?}); ignoring {point_id}", self.slot.holder());
                return InteractOutcome::Ignored;
            }
            self.entries[index].instance.mark_pending();
            return InteractOutcome::ReactionStarted;
        }
        self.resolve_entry(index, now);
        InteractOutcome::Resolved
    }

    /// Route a reaction-game outcome to the pending instance, if any.
    /// Results arriving while nothing is pending are stale and ignored.
    pub fn on_reaction_result(&mut self, success: bool, now: f64) {
        let Some(holder) = self.slot.holder().map(str::to_string) else {
            debug!("reaction result with no pending instance; ignoring");
            return;
        };
        let Some(index) = self.index_of(&holder) else {
            self.slot.clear();
            return;
        };
        if success {
            self.resolve_entry(index, now);
            return;
        }
        let fatal = self.entries[index].instance.fatal_on_failure();
        self.entries[index].instance.clear_pending(&mut self.slot);
        if fatal {
            self.bus.publish(&FatalFailure { id: holder });
        }
    }

    /// Idempotent resolution accounting. Reports with no source identity are
    /// rejected with a warning; sources outside the active set and duplicates
    /// are no-ops. The first acceptance publishes updated progress, and the
    /// night completes once every active instance has resolved.
    pub fn on_resolved_event(&mut self, event: &AnomalyResolved) {
        if event.source.is_empty() {
            warn!("resolution report without a source identity; rejecting");
            return;
        }
        if !self.active.contains(&event.source) {
            debug!("resolution report for inactive source {}; ignoring", event.source);
            return;
        }
        if !self.resolved.insert(event.source.clone()) {
            debug!("duplicate resolution report for {}; ignoring", event.source);
            return;
        }
        let progress = NightProgress {
            resolved: self.resolved.len(),
            total: self.active.len(),
        };
        self.bus.publish(&progress);
        if progress.resolved >= progress.total {
            self.bus.publish(&NightCompleted);
        }
    }

    fn resolve_entry(&mut self, index: usize, now: f64) {
        let event = AnomalyResolved {
            id: self.entries[index].instance.resolve_id().to_string(),
            source: self.entries[index].instance.id().to_string(),
        };
        self.bus.publish(&event);
        let entry = &mut self.entries[index];
        entry.instance.deactivate(&mut self.slot);
        entry.point.on_resolved(now);
        self.on_resolved_event(&event);
    }

    /// Activate up to `request` points from `candidates`, first-N-eligible in
    /// the given order, and return the count actually activated. Used by zone
    /// triggers; at least one activation refreshes the progress event so
    /// observers see the new total.
    pub fn try_spawn_from_allowed<R: Rng>(
        &mut self,
        candidates: &[String],
        request: usize,
        now: f64,
        rng: &mut R,
    ) -> usize {
        let mut spawned = 0;
        for id in candidates {
            if spawned >= request {
                break;
            }
            let Some(index) = self.index_of(id) else {
                debug!("zone candidate {id} is not in the pool; skipping");
                continue;
            };
            if self.try_activate_entry(index, now, rng) {
                spawned += 1;
            }
        }
        if spawned > 0 {
            self.bus.publish(&NightProgress {
                resolved: self.resolved.len(),
                total: self.active.len(),
            });
        }
        spawned
    }

    fn index_of(&self, point_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.point.id() == point_id)
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }

    /// Anomalies still unresolved tonight.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.active.len().saturating_sub(self.resolved.len())
    }

    #[must_use]
    pub fn active_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.active.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn point_ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.point.id().to_string())
            .collect()
    }

    #[must_use]
    pub fn point(&self, point_id: &str) -> Option<&AnomalyPoint> {
        self.index_of(point_id).map(|index| &self.entries[index].point)
    }

    /// Mutable point access for administrative tooling
    /// (`apply_cooldown_remaining`, debug-forced variants).
    pub fn point_mut(&mut self, point_id: &str) -> Option<&mut AnomalyPoint> {
        self.index_of(point_id)
            .map(|index| &mut self.entries[index].point)
    }

    #[must_use]
    pub fn instance(&self, point_id: &str) -> Option<&AnomalyInstance> {
        self.index_of(point_id)
            .map(|index| &self.entries[index].instance)
    }

    /// Id of the instance currently pending on the reaction game, if any.
    #[must_use]
    pub fn pending_reaction_id(&self) -> Option<&str> {
        self.slot.holder()
    }

    #[must_use]
    pub const fn config(&self) -> &NightConfig {
        &self.cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PointSpec, VariantKind, VariantSpec};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn simple_point(id: &str) -> PointSpec {
        let mut spec = PointSpec::new(id);
        spec.variants = vec![
            Some(VariantSpec::new(&format!("{id}_hide"), VariantKind::Hide)),
            Some(VariantSpec::new(&format!("{id}_flip"), VariantKind::Flip)),
            None,
        ];
        spec.cooldown_seconds = 30.0;
        spec
    }

    fn pool_of(count: usize) -> PoolData {
        PoolData::from_points((0..count).map(|i| simple_point(&format!("p{i}"))).collect())
    }

    struct Capture {
        progress: Rc<RefCell<Vec<NightProgress>>>,
        completed: Rc<RefCell<u32>>,
    }

    fn capture(bus: &EventBus) -> Capture {
        let progress = Rc::new(RefCell::new(Vec::new()));
        let completed = Rc::new(RefCell::new(0_u32));
        {
            let progress = Rc::clone(&progress);
            bus.subscribe::<NightProgress, _>(move |event| progress.borrow_mut().push(*event));
        }
        {
            let completed = Rc::clone(&completed);
            bus.subscribe::<NightCompleted, _>(move |_| *completed.borrow_mut() += 1);
        }
        Capture { progress, completed }
    }

    fn scheduler_with(pool: PoolData, cfg: NightConfig) -> (NightScheduler, Capture) {
        let bus = EventBus::new();
        let events = capture(&bus);
        (NightScheduler::new(bus, cfg, pool), events)
    }

    #[test]
    fn target_count_follows_the_day_curve() {
        let cfg = NightConfig {
            base_count: 3,
            day_interval: 2,
        };
        let (scheduler, _) = scheduler_with(pool_of(5), cfg);
        assert_eq!(scheduler.target_count(1), 3);
        assert_eq!(scheduler.target_count(2), 3);
        assert_eq!(scheduler.target_count(3), 4);
        assert_eq!(scheduler.target_count(5), 5);
        assert_eq!(scheduler.target_count(30), 5, "clamped to pool size");
    }

    #[test]
    fn start_night_activates_the_target_and_publishes_progress() {
        let cfg = NightConfig {
            base_count: 3,
            day_interval: 2,
        };
        let (mut scheduler, events) = scheduler_with(pool_of(5), cfg);
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        scheduler.start_night(1, 0.0, &mut rng);

        assert_eq!(scheduler.active_count(), 3);
        assert_eq!(scheduler.resolved_count(), 0);
        assert_eq!(scheduler.remaining(), 3);
        assert_eq!(
            events.progress.borrow().as_slice(),
            &[NightProgress {
                resolved: 0,
                total: 3
            }]
        );
        assert_eq!(*events.completed.borrow(), 0);

        for id in scheduler.active_ids() {
            let point = scheduler.point(id).expect("active point exists");
            assert!(point.is_active());
        }
    }

    #[test]
    fn degenerate_night_completes_immediately() {
        let (mut scheduler, events) = scheduler_with(PoolData::empty(), NightConfig::default());
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        scheduler.start_night(1, 0.0, &mut rng);

        assert_eq!(scheduler.active_count(), 0);
        assert_eq!(
            events.progress.borrow().as_slice(),
            &[NightProgress {
                resolved: 0,
                total: 0
            }]
        );
        assert_eq!(*events.completed.borrow(), 1);
    }

    #[test]
    fn unconfigured_points_are_skipped_not_fatal() {
        let mut pool = pool_of(2);
        pool.points.push(PointSpec::new("bare"));
        let cfg = NightConfig {
            base_count: 3,
            day_interval: 2,
        };
        let (mut scheduler, _) = scheduler_with(pool, cfg);
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        scheduler.start_night(1, 0.0, &mut rng);

        assert_eq!(scheduler.active_count(), 2, "only configured points activate");
        assert!(!scheduler.point("bare").expect("in pool").is_active());
    }

    #[test]
    fn cooling_points_are_ineligible() {
        let cfg = NightConfig {
            base_count: 3,
            day_interval: 2,
        };
        let (mut scheduler, _) = scheduler_with(pool_of(3), cfg);
        scheduler
            .point_mut("p0")
            .expect("in pool")
            .apply_cooldown_remaining(0.0, 10.0);

        let mut rng = ChaCha20Rng::seed_from_u64(8);
        scheduler.start_night(1, 0.0, &mut rng);
        assert_eq!(scheduler.active_count(), 2);
        assert!(!scheduler.point("p0").expect("in pool").is_active());
    }

    #[test]
    fn resolution_accounting_is_idempotent() {
        let cfg = NightConfig {
            base_count: 3,
            day_interval: 2,
        };
        let (mut scheduler, events) = scheduler_with(pool_of(3), cfg);
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        scheduler.start_night(1, 0.0, &mut rng);

        let first = scheduler.active_ids()[0].to_string();
        let event = AnomalyResolved {
            id: first.clone(),
            source: first,
        };
        scheduler.on_resolved_event(&event);
        scheduler.on_resolved_event(&event);

        assert_eq!(scheduler.resolved_count(), 1, "duplicate counted once");
        // Opening progress plus exactly one acceptance.
        assert_eq!(events.progress.borrow().len(), 2);
    }

    #[test]
    fn reports_without_identity_or_outside_the_active_set_are_rejected() {
        let (mut scheduler, events) = scheduler_with(pool_of(3), NightConfig::default());
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        scheduler.start_night(1, 0.0, &mut rng);

        scheduler.on_resolved_event(&AnomalyResolved {
            id: String::from("x"),
            source: String::new(),
        });
        scheduler.on_resolved_event(&AnomalyResolved {
            id: String::from("ghost"),
            source: String::from("ghost"),
        });

        assert_eq!(scheduler.resolved_count(), 0);
        assert_eq!(events.progress.borrow().len(), 1, "only the opening event");
    }

    #[test]
    fn third_resolution_completes_the_night_exactly_once() {
        let cfg = NightConfig {
            base_count: 3,
            day_interval: 2,
        };
        let (mut scheduler, events) = scheduler_with(pool_of(3), cfg);
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        scheduler.start_night(1, 0.0, &mut rng);
        assert_eq!(scheduler.active_count(), 3);

        let ids: Vec<String> = scheduler.active_ids().iter().map(ToString::to_string).collect();
        for (count, id) in ids.iter().enumerate() {
            assert_eq!(scheduler.interact(id, 10.0, false), InteractOutcome::Resolved);
            if count < 2 {
                assert_eq!(*events.completed.borrow(), 0, "not before the last");
            }
        }
        assert_eq!(*events.completed.borrow(), 1);
        assert_eq!(scheduler.remaining(), 0);

        // Resolved points are cooling and inactive again.
        let point = scheduler.point(&ids[0]).expect("in pool");
        assert!(!point.is_active());
        assert!(!point.can_activate(10.0));
        assert!(point.can_activate(40.0));
    }

    #[test]
    fn interacting_with_an_idle_point_is_ignored() {
        let (mut scheduler, _) = scheduler_with(pool_of(2), NightConfig::default());
        assert_eq!(scheduler.interact("p0", 0.0, false), InteractOutcome::Ignored);
        assert_eq!(scheduler.interact("nope", 0.0, false), InteractOutcome::Ignored);
    }

    #[test]
    fn try_spawn_takes_the_first_eligible_in_order() {
        let (mut scheduler, _) = scheduler_with(pool_of(4), NightConfig::default());
        scheduler
            .point_mut("p1")
            .expect("in pool")
            .apply_cooldown_remaining(0.0, 60.0);

        let candidates: Vec<String> = ["p0", "p1", "p2", "p3"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let spawned = scheduler.try_spawn_from_allowed(&candidates, 2, 0.0, &mut rng);

        assert_eq!(spawned, 2);
        assert!(scheduler.point("p0").expect("in pool").is_active());
        assert!(!scheduler.point("p1").expect("in pool").is_active(), "cooling skipped");
        assert!(scheduler.point("p2").expect("in pool").is_active());
        assert_eq!(scheduler.active_count(), 2);
    }

    #[test]
    fn try_spawn_returns_zero_when_nothing_is_eligible() {
        let (mut scheduler, events) = scheduler_with(pool_of(2), NightConfig::default());
        for id in ["p0", "p1"] {
            scheduler
                .point_mut(id)
                .expect("in pool")
                .apply_cooldown_remaining(0.0, 60.0);
        }
        let candidates = vec![String::from("p0"), String::from("p1")];
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        assert_eq!(scheduler.try_spawn_from_allowed(&candidates, 2, 0.0, &mut rng), 0);
        assert!(events.progress.borrow().is_empty(), "no progress refresh on zero spawns");
    }

    #[test]
    fn reset_all_clears_night_state_but_keeps_cooldowns() {
        let (mut scheduler, _) = scheduler_with(pool_of(3), NightConfig::default());
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        scheduler.start_night(1, 0.0, &mut rng);
        let id = scheduler.active_ids()[0].to_string();
        scheduler.interact(&id, 5.0, false);

        scheduler.reset_all();
        assert_eq!(scheduler.active_count(), 0);
        assert_eq!(scheduler.resolved_count(), 0);
        assert!(scheduler.pending_reaction_id().is_none());
        let point = scheduler.point(&id).expect("in pool");
        assert!(!point.can_activate(6.0), "cooldown stamp survives the reset");
    }
}
