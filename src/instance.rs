//! Live application of one variant to one point's prop.

use crate::data::{VariantKind, VariantSpec};
use crate::reaction::ReactionSlot;
use crate::world::{Prop, PropSnapshot};

/// Yaw offset applied by flip variants.
const FLIP_YAW_DEGREES: f32 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceState {
    #[default]
    Idle,
    Active,
    PendingReaction,
}

/// The live, applied effect bound to one variant of one point. Owns the
/// revertible prop mutation and the transient spawned-effect handle.
#[derive(Debug, Clone)]
pub struct AnomalyInstance {
    id: String,
    prop: Prop,
    original: Option<PropSnapshot>,
    variant: Option<VariantSpec>,
    state: InstanceState,
}

impl AnomalyInstance {
    #[must_use]
    pub fn new(id: &str, prop: Prop) -> Self {
        Self {
            id: id.to_string(),
            prop,
            original: None,
            variant: None,
            state: InstanceState::Idle,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn state(&self) -> InstanceState {
        self.state
    }

    #[must_use]
    pub const fn prop(&self) -> &Prop {
        &self.prop
    }

    #[must_use]
    pub const fn variant(&self) -> Option<&VariantSpec> {
        self.variant.as_ref()
    }

    /// Identity published in resolution events: the bound point id (instances
    /// are constructed with their point's id), else the variant's own id.
    #[must_use]
    pub fn resolve_id(&self) -> &str {
        if self.id.is_empty() {
            self.variant.as_ref().map_or("", |variant| variant.id.as_str())
        } else {
            &self.id
        }
    }

    /// Apply `variant` and transition to `Active`. No-op unless `Idle`.
    /// The original prop state is cached on the first-ever activation only.
    pub fn activate(&mut self, variant: &VariantSpec) -> bool {
        if self.state != InstanceState::Idle {
            return false;
        }
        if self.original.is_none() {
            self.original = Some(self.prop.snapshot());
        }
        apply_variant(&mut self.prop, variant);
        self.variant = Some(variant.clone());
        self.state = InstanceState::Active;
        true
    }

    /// Revert to the cached original state, drop any spawned effect, release
    /// the reaction slot if this instance holds it, and return to `Idle`.
    pub fn deactivate(&mut self, slot: &mut ReactionSlot) {
        if self.state == InstanceState::Idle {
            return;
        }
        if self.state == InstanceState::PendingReaction {
            slot.release(&self.id);
        }
        if let Some(original) = &self.original {
            self.prop.restore(original);
        }
        self.prop.spawned_effect = None;
        self.variant = None;
        self.state = InstanceState::Idle;
    }

    /// Interaction gate: false when idle, false while a reaction round is
    /// pending (prevents re-entrant reaction starts).
    #[must_use]
    pub fn can_interact(&self) -> bool {
        self.state == InstanceState::Active
    }

    #[must_use]
    pub fn requires_reaction(&self) -> bool {
        self.variant
            .as_ref()
            .is_some_and(|variant| variant.requires_reaction)
    }

    #[must_use]
    pub fn fatal_on_failure(&self) -> bool {
        self.variant
            .as_ref()
            .is_some_and(|variant| variant.fatal_on_failure)
    }

    /// Transition `Active` → `PendingReaction` once the slot is acquired.
    pub fn mark_pending(&mut self) {
        if self.state == InstanceState::Active {
            self.state = InstanceState::PendingReaction;
        }
    }

    /// Leave the pending state without resolving (failed round, retry
    /// allowed), releasing the slot held by this instance.
    pub fn clear_pending(&mut self, slot: &mut ReactionSlot) {
        if self.state == InstanceState::PendingReaction {
            slot.release(&self.id);
            self.state = InstanceState::Active;
        }
    }
}

fn apply_variant(prop: &mut Prop, variant: &VariantSpec) {
    match variant.kind {
        VariantKind::Reposition => prop.transform.translate(variant.offset),
        VariantKind::Rotate => prop.transform.rotate(variant.offset),
        VariantKind::Rescale => prop.transform.rescale(variant.multiplier),
        VariantKind::Recolor => {
            // Only surfaces with a color channel can be recolored.
            if prop.color.is_some()
                && let Some(color) = variant.color
            {
                prop.color = Some(color);
            }
        }
        VariantKind::Hide => prop.visible = false,
        VariantKind::Flip => prop.transform.rotate([0.0, FLIP_YAW_DEGREES, 0.0]),
        VariantKind::SpawnEffect => {
            if prop.spawned_effect.is_none() {
                prop.spawned_effect = variant.effect.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::VariantKind;

    fn colored_prop() -> Prop {
        Prop {
            color: Some([0.5, 0.5, 0.5, 1.0]),
            ..Prop::default()
        }
    }

    fn variant(kind: VariantKind) -> VariantSpec {
        let mut spec = VariantSpec::new("v", kind);
        spec.offset = [1.0, 2.0, 3.0];
        spec.multiplier = [2.0, 0.5, 1.0];
        spec.color = Some([1.0, 0.0, 0.0, 1.0]);
        spec.effect = Some(String::from("fx.mist"));
        spec
    }

    #[test]
    fn every_kind_round_trips_exactly() {
        for kind in [
            VariantKind::Reposition,
            VariantKind::Rotate,
            VariantKind::Rescale,
            VariantKind::Recolor,
            VariantKind::Hide,
            VariantKind::Flip,
            VariantKind::SpawnEffect,
        ] {
            let mut slot = ReactionSlot::default();
            let mut instance = AnomalyInstance::new("p", colored_prop());
            let before = instance.prop().snapshot();

            assert!(instance.activate(&variant(kind)));
            assert_eq!(instance.state(), InstanceState::Active);

            instance.deactivate(&mut slot);
            assert_eq!(instance.state(), InstanceState::Idle);
            assert_eq!(instance.prop().snapshot(), before, "kind {kind:?}");
            assert!(instance.prop().spawned_effect.is_none());
        }
    }

    #[test]
    fn variants_mutate_the_expected_fields() {
        let mut instance = AnomalyInstance::new("p", colored_prop());
        assert!(instance.activate(&variant(VariantKind::Reposition)));
        assert_eq!(instance.prop().transform.position, [1.0, 2.0, 3.0]);

        let mut slot = ReactionSlot::default();
        instance.deactivate(&mut slot);

        assert!(instance.activate(&variant(VariantKind::Flip)));
        assert_eq!(instance.prop().transform.rotation, [0.0, 180.0, 0.0]);
        instance.deactivate(&mut slot);

        assert!(instance.activate(&variant(VariantKind::Hide)));
        assert!(!instance.prop().visible);
        instance.deactivate(&mut slot);

        assert!(instance.activate(&variant(VariantKind::Recolor)));
        assert_eq!(instance.prop().color, Some([1.0, 0.0, 0.0, 1.0]));
        instance.deactivate(&mut slot);

        assert!(instance.activate(&variant(VariantKind::SpawnEffect)));
        assert_eq!(instance.prop().spawned_effect.as_deref(), Some("fx.mist"));
    }

    #[test]
    fn recolor_skips_props_without_a_color_channel() {
        let mut instance = AnomalyInstance::new("p", Prop::default());
        assert!(instance.activate(&variant(VariantKind::Recolor)));
        assert_eq!(instance.prop().color, None);
    }

    #[test]
    fn activate_is_a_no_op_while_active() {
        let mut instance = AnomalyInstance::new("p", colored_prop());
        assert!(instance.activate(&variant(VariantKind::Hide)));
        assert!(!instance.activate(&variant(VariantKind::Flip)), "second activation rejected");
        assert_eq!(instance.variant().map(|v| v.kind), Some(VariantKind::Hide));
    }

    #[test]
    fn original_state_is_cached_once_across_activations() {
        let mut slot = ReactionSlot::default();
        let mut instance = AnomalyInstance::new("p", colored_prop());
        let pristine = instance.prop().snapshot();

        assert!(instance.activate(&variant(VariantKind::Reposition)));
        instance.deactivate(&mut slot);
        assert!(instance.activate(&variant(VariantKind::Rescale)));
        instance.deactivate(&mut slot);

        assert_eq!(instance.prop().snapshot(), pristine);
    }

    #[test]
    fn deactivating_a_pending_instance_releases_the_slot() {
        let mut slot = ReactionSlot::default();
        let mut instance = AnomalyInstance::new("mirror", colored_prop());
        assert!(instance.activate(&variant(VariantKind::Hide)));
        instance.mark_pending();
        assert!(slot.acquire("mirror"));
        assert!(!instance.can_interact(), "pending blocks re-entry");

        instance.deactivate(&mut slot);
        assert!(!slot.is_held(), "cancellation must release the slot");
        assert_eq!(instance.state(), InstanceState::Idle);
    }

    #[test]
    fn clear_pending_returns_to_active_for_retry() {
        let mut slot = ReactionSlot::default();
        let mut instance = AnomalyInstance::new("clock", colored_prop());
        assert!(instance.activate(&variant(VariantKind::Flip)));
        instance.mark_pending();
        assert!(slot.acquire("clock"));

        instance.clear_pending(&mut slot);
        assert_eq!(instance.state(), InstanceState::Active);
        assert!(!slot.is_held());
        assert!(instance.can_interact());
    }
}
