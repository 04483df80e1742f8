//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature.

use bevy::prelude::*;
use bevy_rapier3d::geometry::Group;
use bevy_rapier3d::prelude::*;

use crate::backend::{CharacterPhysicsBackend, RaycastRequest};
use crate::collision::CollisionData;
use crate::config::{ControllerConfig, InteractionConfig};
use crate::interaction::{interaction_ray, InteractionProbe};
use crate::vertical::{ground_ray, CapsuleGeometry, GroundSensor, Head, VerticalController};
use crate::LocomotionSet;

/// Rapier3D physics backend for the character controller.
///
/// Velocity changes are written straight into [`Velocity::linvel`], so they
/// are independent of the body's mass. Ray queries are handled by dedicated
/// Rapier systems that receive `RapierContext` as a system parameter.
pub struct Rapier3dBackend;

impl CharacterPhysicsBackend for Rapier3dBackend {
    fn plugin() -> impl Plugin {
        Rapier3dBackendPlugin
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Velocity>(entity)
            .map(|v| v.linvel)
            .unwrap_or(Vec3::ZERO)
    }

    fn apply_velocity_change(world: &mut World, entity: Entity, delta: Vec3) {
        if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            vel.linvel += delta;
        }
    }
}

/// Plugin that sets up Rapier3D-specific systems for the character controller.
pub struct Rapier3dBackendPlugin;

impl Plugin for Rapier3dBackendPlugin {
    fn build(&self, app: &mut App) {
        // Sensors: ray queries against the Rapier scene
        app.add_systems(
            FixedUpdate,
            (rapier_ground_detection, rapier_interaction_detection).in_set(LocomotionSet::Sensors),
        );

        // Final application: mirror the interpolated capsule into the collider
        app.add_systems(
            FixedUpdate,
            sync_capsule_collider.in_set(LocomotionSet::FinalApplication),
        );
    }
}

/// Build the collider for a capsule geometry: a Y capsule raised by its
/// center offset.
pub fn capsule_collider(geometry: &CapsuleGeometry) -> Collider {
    Collider::compound(vec![(
        Vec3::new(0.0, geometry.center, 0.0),
        Quat::IDENTITY,
        Collider::capsule_y(geometry.half_segment(), geometry.radius),
    )])
}

fn query_filter(request: &RaycastRequest) -> QueryFilter<'static> {
    let mut filter = QueryFilter::default().groups(CollisionGroups::new(
        Group::ALL,
        Group::from_bits_truncate(request.layers.bits()),
    ));
    if !request.include_sensors {
        filter = filter.exclude_sensors();
    }
    if let Some(entity) = request.exclude {
        filter = filter.exclude_rigid_body(entity);
    }
    filter
}

/// Perform a raycast using RapierContext.
fn rapier_raycast(context: &RapierContext, request: &RaycastRequest) -> Option<CollisionData> {
    if request.direction == Vec3::ZERO {
        return None;
    }
    context
        .cast_ray_and_get_normal(
            request.origin,
            request.direction,
            request.max_distance,
            true, // solid = true so rays starting inside a shape hit at 0
            query_filter(request),
        )
        .map(|(hit_entity, hit)| {
            CollisionData::new(hit.time_of_impact, hit.normal, hit.point, Some(hit_entity))
        })
}

/// Rapier-specific ground probe.
///
/// Casts straight down from the capsule center, ignoring sensors.
fn rapier_ground_detection(
    rapier_context: ReadRapierContext,
    mut q_controllers: Query<(
        Entity,
        &GlobalTransform,
        &VerticalController,
        &ControllerConfig,
        &mut GroundSensor,
    )>,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };

    for (entity, transform, controller, config, mut sensor) in &mut q_controllers {
        let request = ground_ray(entity, transform.translation(), controller, config);
        sensor.floor = rapier_raycast(&context, &request);
    }
}

/// Rapier-specific interaction probe.
///
/// Casts from the head along its configured direction, including sensors.
fn rapier_interaction_detection(
    rapier_context: ReadRapierContext,
    mut q_probes: Query<(Entity, &Head, &InteractionConfig, &mut InteractionProbe)>,
    q_heads: Query<&GlobalTransform>,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };

    for (entity, head, config, mut probe) in &mut q_probes {
        let Ok(head_transform) = q_heads.get(head.0) else {
            probe.hit = None;
            continue;
        };
        let request = interaction_ray(entity, head_transform, config);
        probe.hit = rapier_raycast(&context, &request);
    }
}

/// Rebuild the collider of characters whose capsule geometry changed.
pub fn sync_capsule_collider(
    mut commands: Commands,
    q_changed: Query<(Entity, &CapsuleGeometry), Changed<CapsuleGeometry>>,
) {
    for (entity, geometry) in &q_changed {
        commands.entity(entity).insert(capsule_collider(geometry));
    }
}

/// Bundle for creating a first-person character with Rapier3D physics.
///
/// This bundle provides the Rapier3D components the controller needs: a
/// dynamic rigid body, velocity tracking, locked rotation (yaw is driven
/// through the `Transform` by the look system) and damping. The collider is
/// created from [`CapsuleGeometry`] by the backend.
///
/// # Example
///
/// ```ignore
/// use bevy::prelude::*;
/// use fps_stance_controller::prelude::*;
///
/// fn spawn_player(mut commands: Commands) -> Result<(), ConfigError> {
///     let body = FirstPersonCharacter::default()
///         .spawn(&mut commands, Transform::from_xyz(0.0, 1.0, 0.0))?;
///     commands.entity(body).insert(Rapier3dCharacterBundle::new());
///     Ok(())
/// }
/// ```
///
/// # Defaults
///
/// - `rigid_body`: [`RigidBody::Dynamic`]
/// - `velocity`: Zero velocity
/// - `locked_axes`: [`LockedAxes::ROTATION_LOCKED`]
/// - `damping`: Linear 0.0, Angular 1.0 (planar speed is fully controlled)
/// - `gravity_scale`: 1.0
#[derive(Bundle, Default)]
pub struct Rapier3dCharacterBundle {
    /// The rigid body type. Should typically be [`RigidBody::Dynamic`] for characters.
    pub rigid_body: RigidBody,
    /// Current linear and angular velocity. Controller velocity changes land here.
    pub velocity: Velocity,
    /// Which axes are locked.
    pub locked_axes: LockedAxes,
    /// Damping coefficients for velocity reduction.
    pub damping: Damping,
    /// Scale of the world gravity on this body.
    pub gravity_scale: GravityScale,
}

impl Rapier3dCharacterBundle {
    /// Create a new character bundle with rotation locked.
    pub fn new() -> Self {
        Self {
            rigid_body: RigidBody::Dynamic,
            velocity: Velocity::default(),
            locked_axes: LockedAxes::ROTATION_LOCKED,
            damping: Damping {
                linear_damping: 0.0,
                angular_damping: 1.0,
            },
            gravity_scale: GravityScale(1.0),
        }
    }

    /// Set the rigid body type for the character.
    pub fn with_body(mut self, body: RigidBody) -> Self {
        self.rigid_body = body;
        self
    }

    /// Set the damping coefficients for velocity reduction.
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.damping = Damping {
            linear_damping: linear,
            angular_damping: angular,
        };
        self
    }

    /// Set the gravity scale. Zero disables world gravity for this body.
    pub fn with_gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = GravityScale(scale);
        self
    }
}
