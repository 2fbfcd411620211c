//! Revertible world-state stand-in mutated by anomaly variants.
//!
//! The core never touches a renderer; a [`Prop`] records the transform,
//! visibility, and optional surface color of the world object a point
//! perturbs. Instances snapshot a prop before mutating it and restore the
//! snapshot on deactivation.

use serde::{Deserialize, Serialize};

/// Local transform of a prop, rotation stored as Euler degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default)]
    pub rotation: [f32; 3],
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: default_scale(),
        }
    }
}

impl Transform {
    /// Offset the local position componentwise.
    pub fn translate(&mut self, offset: [f32; 3]) {
        for (axis, delta) in self.position.iter_mut().zip(offset) {
            *axis += delta;
        }
    }

    /// Compose an Euler-degree rotation offset onto the current rotation.
    pub fn rotate(&mut self, offset: [f32; 3]) {
        for (axis, delta) in self.rotation.iter_mut().zip(offset) {
            *axis += delta;
        }
    }

    /// Multiply the local scale componentwise.
    pub fn rescale(&mut self, multiplier: [f32; 3]) {
        for (axis, factor) in self.scale.iter_mut().zip(multiplier) {
            *axis *= factor;
        }
    }
}

/// World object a point perturbs. The rest state is authoring data; the
/// spawned-effect handle is transient runtime state owned by the instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prop {
    #[serde(default)]
    pub transform: Transform,
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// `None` means the surface has no color channel; recolor variants are
    /// skipped for such props.
    #[serde(default)]
    pub color: Option<[f32; 4]>,
    #[serde(skip)]
    pub spawned_effect: Option<String>,
}

fn default_visible() -> bool {
    true
}

impl Default for Prop {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            visible: true,
            color: None,
            spawned_effect: None,
        }
    }
}

/// Pre-activation copy of everything a variant may mutate.
#[derive(Debug, Clone, PartialEq)]
pub struct PropSnapshot {
    pub transform: Transform,
    pub visible: bool,
    pub color: Option<[f32; 4]>,
}

impl Prop {
    #[must_use]
    pub fn snapshot(&self) -> PropSnapshot {
        PropSnapshot {
            transform: self.transform,
            visible: self.visible,
            color: self.color,
        }
    }

    /// Restore the mutated fields from a snapshot. The spawned-effect handle
    /// is not part of the snapshot; callers drop it separately.
    pub fn restore(&mut self, snapshot: &PropSnapshot) {
        self.transform = snapshot.transform;
        self.visible = snapshot.visible;
        self.color = snapshot.color;
    }
}
