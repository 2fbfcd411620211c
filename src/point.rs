//! Anomaly point: cooldown gating and weighted variant selection.

use rand::Rng;

use crate::data::{PointSpec, VariantSpec};

/// A named, spatially-fixed slot that can host one of several anomaly
/// variants. Created at load time and never destroyed during a session; only
/// the active flag is reset between nights, cooldown stamps persist.
#[derive(Debug, Clone)]
pub struct AnomalyPoint {
    spec: PointSpec,
    is_active: bool,
    last_variant: Option<usize>,
    last_resolved_at: f64,
}

impl AnomalyPoint {
    /// Wrap an authored spec, normalizing its variant/weight arrays.
    #[must_use]
    pub fn new(mut spec: PointSpec) -> Self {
        spec.normalize();
        Self {
            spec,
            is_active: false,
            last_variant: None,
            // Far-past sentinel so the point starts ready.
            last_resolved_at: f64::NEG_INFINITY,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.spec.id
    }

    #[must_use]
    pub const fn spec(&self) -> &PointSpec {
        &self.spec
    }

    #[must_use]
    pub fn variant(&self, index: usize) -> Option<&VariantSpec> {
        self.spec.variants.get(index).and_then(Option::as_ref)
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub const fn last_variant(&self) -> Option<usize> {
        self.last_variant
    }

    /// Eligible for activation: inactive and past its cooldown window.
    #[must_use]
    pub fn can_activate(&self, now: f64) -> bool {
        !self.is_active && now - self.last_resolved_at >= self.spec.cooldown_seconds
    }

    /// Seconds until the cooldown elapses; zero when ready.
    #[must_use]
    pub fn cooldown_remaining(&self, now: f64) -> f64 {
        (self.last_resolved_at + self.spec.cooldown_seconds - now).max(0.0)
    }

    /// Select a variant slot.
    ///
    /// A valid forced index bypasses randomness. Otherwise a weighted draw
    /// runs over the populated slots, excluding the previously picked slot
    /// when anti-repeat is enabled and more than one candidate exists. If
    /// every effective weight is zero the pick falls back to a uniform draw,
    /// nudged to the next populated slot when it lands on the excluded index.
    ///
    /// Returns `None` only when no slot is populated.
    pub fn pick_variant_index<R: Rng>(&self, rng: &mut R) -> Option<usize> {
        if let Some(forced) = self.spec.forced_variant
            && self.variant(forced).is_some()
        {
            return Some(forced);
        }

        let populated: Vec<usize> = self
            .spec
            .variants
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|_| index))
            .collect();
        if populated.is_empty() {
            return None;
        }

        let excluded = if self.spec.anti_repeat && populated.len() > 1 {
            self.last_variant
        } else {
            None
        };
        let effective = |index: usize| -> f32 {
            if Some(index) == excluded {
                0.0
            } else {
                self.spec.weights.get(index).copied().unwrap_or(0.0).max(0.0)
            }
        };

        let total: f32 = populated.iter().map(|&index| effective(index)).sum();
        if total > 0.0 {
            // First slot whose cumulative weight strictly exceeds the roll
            // wins; a zero-weight slot can therefore never be chosen.
            let roll = rng.gen_range(0.0..total);
            let mut cumulative = 0.0_f32;
            for &index in &populated {
                cumulative += effective(index);
                if roll < cumulative {
                    return Some(index);
                }
            }
            // Float accumulation slack; the last populated slot absorbs it.
            return populated.last().copied();
        }

        let mut choice = populated[rng.gen_range(0..populated.len())];
        if Some(choice) == excluded && populated.len() > 1 {
            let position = populated
                .iter()
                .position(|&index| index == choice)
                .unwrap_or(0);
            choice = populated[(position + 1) % populated.len()];
        }
        Some(choice)
    }

    /// Record a successful activation of the given slot.
    pub fn mark_active(&mut self, variant_index: usize) {
        self.is_active = true;
        self.last_variant = Some(variant_index);
    }

    /// Resolution callback: clears the active flag and starts the cooldown.
    pub fn on_resolved(&mut self, now: f64) {
        self.is_active = false;
        self.last_resolved_at = now;
    }

    /// Administrative setter fast-forwarding or rewinding the cooldown clock
    /// by recomputing the resolution stamp from the desired remaining
    /// duration (save/load, debug tools).
    pub fn apply_cooldown_remaining(&mut self, now: f64, remaining: f64) {
        self.last_resolved_at = now + remaining.max(0.0) - self.spec.cooldown_seconds;
    }

    /// Between-nights reset: clears the active flag, keeps cooldown stamps.
    pub fn reset(&mut self) {
        self.is_active = false;
    }

    /// Replace the variant array, re-running the array invariant.
    pub fn set_variants(&mut self, variants: Vec<Option<VariantSpec>>) {
        self.spec.variants = variants;
        self.spec.normalize();
    }

    /// Replace the weight array, re-running the array invariant.
    pub fn set_weights(&mut self, weights: Vec<f32>) {
        self.spec.weights = weights;
        self.spec.normalize();
    }

    /// Set or clear the debug-forced variant index.
    pub fn set_forced_variant(&mut self, index: Option<usize>) {
        self.spec.forced_variant = index;
    }
}
