//! Vertical stance control: floating height and crouch/stand interpolation.
//!
//! The body hovers above the ground instead of resting on its capsule. Each
//! physics step the backend probes downward from the capsule center and
//! stores the hit in [`GroundSensor`]; [`apply_float_correction`] then
//! removes the height error with a single velocity change.
//!
//! Crouching never snaps the capsule. A crouch input edge arms a
//! [`StanceTransition`], and [`advance_stance_transition`] interpolates the
//! [`CapsuleGeometry`], the float height and the eye height until the
//! target profile is reached exactly.

use bevy::prelude::*;

use crate::backend::{CharacterPhysicsBackend, RaycastRequest};
use crate::collision::CollisionData;
use crate::config::{CapsuleProfile, ControllerConfig};
use crate::input::{InputEvent, InputPhase};
use crate::state::{Stance, StanceMachine};

const SNAP_FRACTION: f32 = 1e-3;

/// Live collision capsule of a character.
///
/// Written only by [`advance_stance_transition`]. Backends mirror it into
/// their collider shape whenever it changes.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct CapsuleGeometry {
    /// Total height, caps included.
    pub height: f32,
    /// Local Y offset of the capsule center.
    pub center: f32,
    /// Cap radius.
    pub radius: f32,
}

impl CapsuleGeometry {
    pub fn new(profile: CapsuleProfile, radius: f32) -> Self {
        Self {
            height: profile.height,
            center: profile.center,
            radius,
        }
    }

    /// Height/center pair of this capsule.
    pub fn profile(&self) -> CapsuleProfile {
        CapsuleProfile::new(self.height, self.center)
    }

    /// Half length of the capsule's inner segment.
    pub fn half_segment(&self) -> f32 {
        (self.height / 2.0 - self.radius).max(0.0)
    }
}

/// Countdown driving the crouch/stand interpolation.
///
/// `timer` runs from `duration` down to zero. While it is positive the
/// geometry is `start.lerp(target, 1 - timer / duration)`; at zero it is
/// exactly `target`.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct StanceTransition {
    timer: f32,
    duration: f32,
    start: CapsuleProfile,
    target: CapsuleProfile,
}

impl StanceTransition {
    /// An idle transition resting at `profile`.
    pub fn new(duration: f32, profile: CapsuleProfile) -> Self {
        Self {
            timer: 0.0,
            duration: duration.max(0.0),
            start: profile,
            target: profile,
        }
    }

    /// Remaining time of the transition in flight, or zero.
    #[inline]
    pub fn timer(&self) -> f32 {
        self.timer
    }

    #[inline]
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Whether geometry is currently being interpolated.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.timer > 0.0
    }

    /// Profile the transition is heading to (or resting at).
    #[inline]
    pub fn target(&self) -> CapsuleProfile {
        self.target
    }

    /// Profile the transition started from.
    #[inline]
    pub fn start(&self) -> CapsuleProfile {
        self.start
    }

    /// Start a transition towards `to`.
    ///
    /// A transition in flight is reversed: it runs back from where it is and
    /// takes as long as it has already run.
    pub fn arm(&mut self, to: CapsuleProfile) {
        self.timer = if self.timer > 0.0 {
            self.duration - self.timer
        } else {
            self.duration
        };
        self.start = self.target;
        self.target = to;
    }

    /// Advance by `dt` seconds and return the profile for this step.
    pub fn advance(&mut self, dt: f32) -> CapsuleProfile {
        if self.timer <= 0.0 {
            return self.target;
        }
        self.timer -= dt;
        // Remaining time below this share of a step is rounding residue.
        if self.timer <= dt * SNAP_FRACTION || self.duration <= 0.0 {
            self.timer = 0.0;
            return self.target;
        }
        let t = 1.0 - self.timer / self.duration;
        self.start.lerp(self.target, t)
    }
}

/// Result of the downward ground probe.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
pub struct GroundSensor {
    /// Probe hit from the last sensor pass.
    pub floor: Option<CollisionData>,
    /// Whether the probe hit anything this step.
    pub grounded: bool,
}

/// Vertical controller state.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct VerticalController {
    /// Desired probe hit distance. Tracks the live capsule center.
    pub float_height: f32,
    /// Eye height divided by model height.
    pub head_to_height_ratio: f32,
    /// Local Y of the head entity.
    pub eye_height: f32,
    crouched: bool,
}

impl VerticalController {
    /// Standing controller derived from a config.
    pub fn new(config: &ControllerConfig) -> Self {
        let ratio = config.head_to_height_ratio();
        Self {
            float_height: config.standing.center,
            head_to_height_ratio: ratio,
            eye_height: eye_height(config.standing, ratio),
            crouched: false,
        }
    }

    /// Posture the capsule is currently heading to.
    #[inline]
    pub fn is_crouched(&self) -> bool {
        self.crouched
    }
}

/// Points at the camera pivot entity whose local Y follows the eye height.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Eq)]
#[reflect(Component)]
pub struct Head(pub Entity);

/// Eye height for a capsule profile.
#[inline]
pub fn eye_height(profile: CapsuleProfile, head_to_height_ratio: f32) -> f32 {
    profile.top() * head_to_height_ratio
}

/// Build the downward ground probe for a body at `translation`.
pub fn ground_ray(
    entity: Entity,
    translation: Vec3,
    controller: &VerticalController,
    config: &ControllerConfig,
) -> RaycastRequest {
    RaycastRequest::new(
        translation + Vec3::Y * controller.float_height,
        Vec3::NEG_Y,
        config.ground_probe_length,
    )
    .with_layers(config.ground_layers)
    .excluding(entity)
}

/// Vertical velocity change that brings the body to `float_height`.
///
/// Returns `None` when the hit is exactly at the float height.
pub fn float_correction(float_height: f32, distance: f32, gain: f32, vertical_velocity: f32) -> Option<f32> {
    let error = float_height - distance;
    if error == 0.0 {
        return None;
    }
    Some(error * gain - vertical_velocity)
}

/// Bus handler for crouch events. Runs after the stance machine.
///
/// The desired posture follows the resolved stance. While sprinting the
/// posture is left alone.
pub fn on_crouch_input(world: &mut World, entity: Entity, event: &InputEvent) {
    if event.phase == InputPhase::Ongoing {
        return;
    }
    let Some(stance) = world.get::<StanceMachine>(entity).map(StanceMachine::stance) else {
        return;
    };
    if stance == Stance::Sprint {
        return;
    }
    let Some(config) = world.get::<ControllerConfig>(entity).copied() else {
        return;
    };

    let crouched = stance == Stance::Crouch;
    let Some(mut controller) = world.get_mut::<VerticalController>(entity) else {
        return;
    };
    if controller.crouched == crouched {
        return;
    }
    controller.crouched = crouched;

    if let Some(mut transition) = world.get_mut::<StanceTransition>(entity) {
        transition.arm(config.profile(crouched));
        debug!(
            "{entity} {} over {:.3}s",
            if crouched { "crouching" } else { "standing" },
            transition.timer()
        );
    }
}

/// Apply the floating correction and refresh the grounded flag.
///
/// Reads the probe result written by the backend during the sensor phase.
pub fn apply_float_correction<B: CharacterPhysicsBackend>(world: &mut World) {
    let entities: Vec<(Entity, Option<CollisionData>, f32, f32)> = world
        .query::<(Entity, &GroundSensor, &VerticalController, &ControllerConfig)>()
        .iter(world)
        .map(|(e, sensor, controller, config)| (e, sensor.floor, controller.float_height, config.float_gain))
        .collect();

    for (entity, floor, float_height, gain) in entities {
        if let Some(mut sensor) = world.get_mut::<GroundSensor>(entity) {
            sensor.grounded = floor.is_some();
        }
        let Some(floor) = floor else {
            continue;
        };

        let velocity = B::get_velocity(world, entity);
        if let Some(delta) = float_correction(float_height, floor.distance, gain, velocity.y) {
            B::apply_velocity_change(world, entity, Vec3::Y * delta);
        }
    }
}

/// Advance crouch/stand transitions and propagate the capsule.
///
/// Writes the capsule geometry, the float height and the eye height, and
/// moves the [`Head`] entity to the new eye height.
pub fn advance_stance_transition<B: CharacterPhysicsBackend>(world: &mut World) {
    let dt = B::get_fixed_timestep(world);
    let mut head_moves: Vec<(Entity, f32)> = Vec::new();

    let mut query = world.query::<(
        &mut StanceTransition,
        &mut CapsuleGeometry,
        &mut VerticalController,
        Option<&Head>,
    )>();
    for (mut transition, mut geometry, mut controller, head) in query.iter_mut(world) {
        let profile = transition.advance(dt);
        if geometry.profile() == profile {
            continue;
        }
        geometry.height = profile.height;
        geometry.center = profile.center;
        controller.float_height = profile.center;
        controller.eye_height = eye_height(profile, controller.head_to_height_ratio);

        if let Some(head) = head {
            head_moves.push((head.0, controller.eye_height));
        }
    }

    for (head, eye) in head_moves {
        if let Some(mut transform) = world.get_mut::<Transform>(head) {
            transform.translation.y = eye;
        }
    }
}
