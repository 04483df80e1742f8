//! Mouse look.
//!
//! Look events accumulate yaw and pitch on the [`LookController`]. Once per
//! render frame [`apply_look_rotation`] turns the body by the pending yaw and
//! sets the head's pitch absolutely, independent of the physics rate.

use bevy::prelude::*;

use crate::config::LookConfig;
use crate::input::{InputEvent, InputPhase};
use crate::vertical::Head;

/// Accumulated look state. Angles are in degrees.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
pub struct LookController {
    /// Yaw not yet applied to the body. Positive turns right.
    pub yaw_delta: f32,
    /// Absolute head pitch. Positive looks down.
    pub pitch: f32,
}

impl LookController {
    /// Accumulate one look sample.
    pub fn accumulate(&mut self, config: &LookConfig, value: Vec2) {
        let sign_x = if config.invert_x { -1.0 } else { 1.0 };
        let sign_y = if config.invert_y { -1.0 } else { 1.0 };
        self.yaw_delta += value.x * config.sensitivity_x * sign_x;
        self.pitch = (self.pitch + value.y * config.sensitivity_y * sign_y)
            .clamp(config.min_pitch, config.max_pitch);
    }

    /// Take the pending yaw, leaving zero behind.
    pub fn take_yaw(&mut self) -> f32 {
        std::mem::take(&mut self.yaw_delta)
    }

    /// Local rotation of the head for the current pitch.
    pub fn head_rotation(&self) -> Quat {
        Quat::from_rotation_x(-self.pitch.to_radians())
    }
}

/// Bus handler for look events.
pub fn on_look_input(world: &mut World, entity: Entity, event: &InputEvent) {
    if event.phase == InputPhase::Canceled {
        return;
    }
    let config = world.get::<LookConfig>(entity).copied().unwrap_or_default();
    if let Some(mut look) = world.get_mut::<LookController>(entity) {
        look.accumulate(&config, event.value);
    }
}

/// Apply pending yaw to the body and absolute pitch to the head.
pub fn apply_look_rotation(
    mut q_bodies: Query<(&mut Transform, &mut LookController, Option<&Head>)>,
    mut q_heads: Query<&mut Transform, Without<LookController>>,
) {
    for (mut transform, mut look, head) in &mut q_bodies {
        let yaw = look.bypass_change_detection().take_yaw();
        if yaw != 0.0 {
            transform.rotate_y(-yaw.to_radians());
        }

        let Some(head) = head else {
            continue;
        };
        if let Ok(mut head_transform) = q_heads.get_mut(head.0) {
            let rotation = look.head_rotation();
            if head_transform.rotation != rotation {
                head_transform.rotation = rotation;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bevy::ecs::system::RunSystemOnce;

    #[test]
    fn inverted_y_decreases_pitch() {
        let config = LookConfig::default()
            .with_sensitivity(2.0, 2.0)
            .with_invert(false, true);
        let mut look = LookController::default();

        look.accumulate(&config, Vec2::new(0.0, 1.0));

        assert_eq!(look.pitch, -2.0);
    }

    #[test]
    fn pitch_is_clamped() {
        let config = LookConfig::default()
            .with_sensitivity(1.0, 10.0)
            .with_invert(false, false)
            .with_pitch_limits(-30.0, 45.0);
        let mut look = LookController::default();

        for _ in 0..10 {
            look.accumulate(&config, Vec2::Y);
        }
        assert_eq!(look.pitch, 45.0);

        for _ in 0..20 {
            look.accumulate(&config, Vec2::NEG_Y);
        }
        assert_eq!(look.pitch, -30.0);
    }

    #[test]
    fn yaw_accumulates_until_taken() {
        let config = LookConfig::default()
            .with_sensitivity(3.0, 1.0)
            .with_invert(true, false);
        let mut look = LookController::default();

        look.accumulate(&config, Vec2::new(1.0, 0.0));
        look.accumulate(&config, Vec2::new(1.0, 0.0));

        assert_eq!(look.take_yaw(), -6.0);
        assert_eq!(look.take_yaw(), 0.0);
    }

    #[test]
    fn apply_turns_body_and_sets_head_pitch() {
        let mut world = World::new();
        let head = world.spawn(Transform::default()).id();
        let body = world
            .spawn((
                Transform::default(),
                LookController {
                    yaw_delta: 90.0,
                    pitch: 30.0,
                },
                Head(head),
            ))
            .id();

        world.run_system_once(apply_look_rotation).unwrap();

        let forward = world.get::<Transform>(body).unwrap().forward();
        assert_relative_eq!(forward.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(forward.z, 0.0, epsilon = 1e-5);
        assert_eq!(world.get::<LookController>(body).unwrap().yaw_delta, 0.0);

        let head_rotation = world.get::<Transform>(head).unwrap().rotation;
        assert!(head_rotation.abs_diff_eq(Quat::from_rotation_x(-30f32.to_radians()), 1e-6));

        // Pitch is absolute: applying again does not add up.
        world.run_system_once(apply_look_rotation).unwrap();
        let head_rotation = world.get::<Transform>(head).unwrap().rotation;
        assert!(head_rotation.abs_diff_eq(Quat::from_rotation_x(-30f32.to_radians()), 1e-6));
    }

    #[test]
    fn handler_uses_entity_config() {
        let mut world = World::new();
        let entity = world
            .spawn((
                LookController::default(),
                LookConfig::default()
                    .with_sensitivity(2.0, 2.0)
                    .with_invert(false, true),
            ))
            .id();

        on_look_input(
            &mut world,
            entity,
            &InputEvent::axis(crate::input::InputKind::Look, InputPhase::Ongoing, Vec2::Y),
        );

        assert_eq!(world.get::<LookController>(entity).unwrap().pitch, -2.0);
    }
}
