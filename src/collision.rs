//! Ray query result structures.
//!
//! These hold the results of the physics queries used for ground probing
//! and interaction probing. Backends fill them in during the sensor phase.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Information about a raycast hit.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq)]
pub struct CollisionData {
    /// Distance from the ray origin to the hit point.
    pub distance: f32,
    /// Normal of the surface at the hit point.
    pub normal: Vec3,
    /// World position of the hit point.
    pub point: Vec3,
    /// Entity that was hit (if any).
    pub entity: Option<Entity>,
}

impl CollisionData {
    /// Create a collision result.
    pub fn new(distance: f32, normal: Vec3, point: Vec3, entity: Option<Entity>) -> Self {
        Self {
            distance,
            normal,
            point,
            entity,
        }
    }
}

/// Bitmask of collision layers a probe is allowed to hit.
///
/// Backends map this onto their own filtering (Rapier collision groups,
/// Avian layers, ...). Bit `n` set means layer `n` is included.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerMask(pub u32);

impl LayerMask {
    /// Every layer.
    pub const ALL: Self = Self(u32::MAX);
    /// No layer. A probe with this mask never hits anything.
    pub const NONE: Self = Self(0);

    /// Mask containing a single layer.
    ///
    /// Indices past the last layer give an empty mask.
    pub const fn layer(index: u32) -> Self {
        Self(bit(index))
    }

    /// Add another layer to the mask. Out-of-range indices are ignored.
    pub const fn with(self, index: u32) -> Self {
        Self(self.0 | bit(index))
    }

    /// Whether `index` is part of this mask.
    pub fn contains(&self, index: u32) -> bool {
        self.0 & bit(index) != 0
    }

    /// Raw bits.
    #[inline]
    pub fn bits(&self) -> u32 {
        self.0
    }
}

const fn bit(index: u32) -> u32 {
    match 1u32.checked_shl(index) {
        Some(bit) => bit,
        None => 0,
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        Self::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collision_data_hit() {
        let cast = CollisionData::new(5.0, Vec3::Y, Vec3::new(10.0, 0.0, 2.0), None);

        assert_eq!(cast.distance, 5.0);
        assert_eq!(cast.normal, Vec3::Y);
        assert_eq!(cast.point, Vec3::new(10.0, 0.0, 2.0));
    }

    #[test]
    fn collision_data_with_entity() {
        let entity = Entity::from_raw(42);
        let cast = CollisionData::new(3.0, Vec3::X, Vec3::ZERO, Some(entity));

        assert_eq!(cast.entity, Some(entity));
    }

    #[test]
    fn layer_mask_membership() {
        let mask = LayerMask::layer(2).with(5);
        assert!(mask.contains(2));
        assert!(mask.contains(5));
        assert!(!mask.contains(0));
        assert!(!mask.contains(40));
        assert_eq!(mask.bits(), 0b100100);
    }

    #[test]
    fn out_of_range_layer_is_empty() {
        assert_eq!(LayerMask::layer(32), LayerMask::NONE);
        assert_eq!(LayerMask::layer(31).with(64), LayerMask::layer(31));
        assert!(!LayerMask::ALL.contains(32));
    }

    #[test]
    fn layer_mask_defaults_to_all() {
        assert_eq!(LayerMask::default(), LayerMask::ALL);
        assert!(!LayerMask::NONE.contains(0));
    }
}
