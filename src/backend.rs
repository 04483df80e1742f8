//! Physics backend abstraction.
//!
//! This module defines the trait that physics backends must implement
//! to work with the character controller. This allows easy swapping
//! between physics engines (Rapier3D, Avian, custom, etc.).

use bevy::prelude::*;

use crate::collision::LayerMask;

/// Trait for physics backend implementations.
///
/// The controller systems only ever talk to the rigid body through this
/// trait. Scene queries are handled by the backend's plugin: it must fill
/// [`GroundSensor::floor`](crate::vertical::GroundSensor) and
/// [`InteractionProbe::hit`](crate::interaction::InteractionProbe) during
/// [`LocomotionSet::Sensors`](crate::LocomotionSet::Sensors), using
/// [`RaycastRequest`]s built by the controller, and push
/// [`CapsuleGeometry`](crate::vertical::CapsuleGeometry) into the collision
/// shape during [`LocomotionSet::FinalApplication`](crate::LocomotionSet::FinalApplication).
///
/// For an example implementation, see the `rapier` module's `Rapier3dBackend`.
pub trait CharacterPhysicsBackend: 'static + Send + Sync {
    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Get the current linear velocity of an entity.
    fn get_velocity(world: &World, entity: Entity) -> Vec3;

    /// Apply an instantaneous velocity change.
    ///
    /// This is a mass-independent change of velocity, not a force that
    /// accumulates over the step.
    fn apply_velocity_change(world: &mut World, entity: Entity, delta: Vec3);

    /// Get the current world rotation of an entity.
    fn get_rotation(world: &World, entity: Entity) -> Quat {
        world
            .get::<GlobalTransform>(entity)
            .map(|t| t.compute_transform().rotation)
            .or_else(|| world.get::<Transform>(entity).map(|t| t.rotation))
            .unwrap_or(Quat::IDENTITY)
    }

    /// Get the fixed timestep delta time.
    ///
    /// Reads the configured timestep rather than the last delta, so systems
    /// see the same value when `FixedUpdate` is run by hand.
    fn get_fixed_timestep(world: &World) -> f32 {
        world
            .get_resource::<Time<Fixed>>()
            .map(|t| t.timestep().as_secs_f32())
            .filter(|&d| d > 0.0)
            .unwrap_or(1.0 / 60.0)
    }
}

/// Helper struct describing a ray query for a backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastRequest {
    /// Origin point of the ray.
    pub origin: Vec3,
    /// Direction of the ray (normalized).
    pub direction: Vec3,
    /// Maximum distance to cast.
    pub max_distance: f32,
    /// Layers the ray may hit.
    pub layers: LayerMask,
    /// Whether trigger/sensor volumes are reported.
    pub include_sensors: bool,
    /// Entity to exclude from results.
    pub exclude: Option<Entity>,
}

impl RaycastRequest {
    /// Create a new raycast request that hits every layer and ignores sensors.
    pub fn new(origin: Vec3, direction: Vec3, max_distance: f32) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
            max_distance,
            layers: LayerMask::ALL,
            include_sensors: false,
            exclude: None,
        }
    }

    /// Restrict the ray to the given layers.
    pub fn with_layers(mut self, layers: LayerMask) -> Self {
        self.layers = layers;
        self
    }

    /// Report hits against sensor volumes as well.
    pub fn including_sensors(mut self) -> Self {
        self.include_sensors = true;
        self
    }

    /// Exclude an entity from the raycast.
    pub fn excluding(mut self, entity: Entity) -> Self {
        self.exclude = Some(entity);
        self
    }

    /// Point along the ray at `distance`.
    pub fn point_at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}
