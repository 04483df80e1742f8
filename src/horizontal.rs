//! Planar movement.
//!
//! Converts the latest move axis into a target velocity in the body's facing
//! and removes the planar velocity error in one velocity change. Nothing is
//! applied while the ground probe misses, so airborne momentum is kept.

use bevy::prelude::*;

use crate::backend::CharacterPhysicsBackend;
use crate::config::ControllerConfig;
use crate::input::{InputEvent, InputPhase};
use crate::state::StanceMachine;
use crate::vertical::GroundSensor;

/// Planar movement state.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
pub struct HorizontalController {
    /// Latest move axis (`x` strafe right, `y` forward), length at most 1.
    pub move_input: Vec2,
    /// Cached speed of the current stance.
    pub speed: f32,
}

impl HorizontalController {
    /// Controller at walking speed.
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            move_input: Vec2::ZERO,
            speed: config.walk_speed,
        }
    }

    /// World-space target velocity for a body facing `rotation`.
    pub fn target_velocity(&self, rotation: Quat) -> Vec3 {
        planar_direction(rotation, self.move_input) * self.speed
    }
}

/// Rotate a local move axis into a world-space planar direction.
///
/// Forward is local `-Z`. The result has no vertical component.
pub fn planar_direction(rotation: Quat, axis: Vec2) -> Vec3 {
    let world = rotation * Vec3::new(axis.x, 0.0, -axis.y);
    Vec3::new(world.x, 0.0, world.z)
}

/// Bus handler for move events.
pub fn on_move_input(world: &mut World, entity: Entity, event: &InputEvent) {
    let Some(mut controller) = world.get_mut::<HorizontalController>(entity) else {
        return;
    };
    controller.move_input = match event.phase {
        InputPhase::Canceled => Vec2::ZERO,
        _ => event.value.clamp_length_max(1.0),
    };
}

/// Bus handler for crouch and sprint events. Runs after the stance machine
/// and refreshes the cached speed.
pub fn on_stance_input(world: &mut World, entity: Entity, _event: &InputEvent) {
    let Some(stance) = world.get::<StanceMachine>(entity).map(StanceMachine::stance) else {
        return;
    };
    let Some(speed) = world.get::<ControllerConfig>(entity).map(|c| c.speed_for(stance)) else {
        return;
    };
    if let Some(mut controller) = world.get_mut::<HorizontalController>(entity) {
        controller.speed = speed;
    }
}

/// Apply planar movement for grounded characters.
pub fn apply_horizontal_movement<B: CharacterPhysicsBackend>(world: &mut World) {
    let entities: Vec<(Entity, HorizontalController)> = world
        .query::<(Entity, &HorizontalController, &GroundSensor)>()
        .iter(world)
        .filter(|(_, _, sensor)| sensor.grounded)
        .map(|(e, controller, _)| (e, *controller))
        .collect();

    for (entity, controller) in entities {
        let rotation = B::get_rotation(world, entity);
        let target = controller.target_velocity(rotation);
        let velocity = B::get_velocity(world, entity);
        let delta = target - Vec3::new(velocity.x, 0.0, velocity.z);
        if delta != Vec3::ZERO {
            B::apply_velocity_change(world, entity, delta);
        }
    }
}
