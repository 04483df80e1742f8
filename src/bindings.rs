//! Keyboard and mouse input source.
//!
//! Translates device state into edge-tagged [`InputEvent`]s on the
//! [`InputBus`]. Runs in `PreUpdate`, after Bevy has processed device input.

use bevy::input::mouse::AccumulatedMouseMotion;
use bevy::prelude::*;

use crate::input::{InputBus, InputEvent, InputKind, InputPhase};

/// Key and mouse bindings for the default input source.
#[derive(Resource, Reflect, Debug, Clone, PartialEq)]
#[reflect(Resource)]
pub struct InputBindings {
    pub forward: KeyCode,
    pub back: KeyCode,
    pub left: KeyCode,
    pub right: KeyCode,
    pub crouch: KeyCode,
    pub sprint: KeyCode,
    pub interact: KeyCode,
    /// Scale applied to raw mouse motion before it is published as look input.
    pub look_scale: Vec2,
}

impl Default for InputBindings {
    fn default() -> Self {
        Self {
            forward: KeyCode::KeyW,
            back: KeyCode::KeyS,
            left: KeyCode::KeyA,
            right: KeyCode::KeyD,
            crouch: KeyCode::KeyC,
            sprint: KeyCode::ShiftLeft,
            interact: KeyCode::KeyE,
            look_scale: Vec2::splat(0.1),
        }
    }
}

impl InputBindings {
    /// Move axis from the currently held keys (`x` right, `y` forward).
    pub fn move_axis(&self, keys: &ButtonInput<KeyCode>) -> Vec2 {
        let axis = |positive: KeyCode, negative: KeyCode| {
            (keys.pressed(positive) as i8 - keys.pressed(negative) as i8) as f32
        };
        Vec2::new(axis(self.right, self.left), axis(self.forward, self.back)).clamp_length_max(1.0)
    }

    /// Look axis from raw mouse motion. Up is positive `y`.
    pub fn look_axis(&self, mouse_delta: Vec2) -> Vec2 {
        Vec2::new(mouse_delta.x, -mouse_delta.y) * self.look_scale
    }
}

/// Phase of an axis update from `previous` to `current`, or `None` if unchanged.
pub fn axis_phase(previous: Vec2, current: Vec2) -> Option<InputPhase> {
    if previous == current {
        None
    } else if previous == Vec2::ZERO {
        Some(InputPhase::Started)
    } else if current == Vec2::ZERO {
        Some(InputPhase::Canceled)
    } else {
        Some(InputPhase::Ongoing)
    }
}

fn queue_button(bus: &mut InputBus, keys: &ButtonInput<KeyCode>, key: KeyCode, kind: InputKind) {
    if keys.just_pressed(key) {
        bus.queue(InputEvent::pressed(kind));
    }
    if keys.just_released(key) {
        bus.queue(InputEvent::released(kind));
    }
}

/// Queue this frame's keyboard and mouse input on the bus.
pub fn collect_device_input(
    bindings: Res<InputBindings>,
    keys: Option<Res<ButtonInput<KeyCode>>>,
    mouse: Option<Res<AccumulatedMouseMotion>>,
    mut bus: ResMut<InputBus>,
    mut last_move: Local<Vec2>,
) {
    if let Some(keys) = keys {
        let axis = bindings.move_axis(&keys);
        if let Some(phase) = axis_phase(*last_move, axis) {
            bus.queue(InputEvent::axis(InputKind::Move, phase, axis));
            *last_move = axis;
        }

        queue_button(&mut bus, &keys, bindings.crouch, InputKind::Crouch);
        queue_button(&mut bus, &keys, bindings.sprint, InputKind::Sprint);
        queue_button(&mut bus, &keys, bindings.interact, InputKind::Interact);
    }

    if let Some(mouse) = mouse {
        if mouse.delta != Vec2::ZERO {
            bus.queue(InputEvent::axis(
                InputKind::Look,
                InputPhase::Ongoing,
                bindings.look_axis(mouse.delta),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_app() -> App {
        let mut app = App::new();
        app.init_resource::<InputBus>();
        app.init_resource::<InputBindings>();
        app.init_resource::<ButtonInput<KeyCode>>();
        app.init_resource::<AccumulatedMouseMotion>();
        app.add_systems(Update, collect_device_input);
        app
    }

    fn drain(app: &mut App) -> Vec<InputEvent> {
        let bus = app.world().resource::<InputBus>();
        let events = bus.pending().to_vec();
        app.world_mut().insert_resource(InputBus::new());
        events
    }

    fn keys(app: &mut App) -> Mut<ButtonInput<KeyCode>> {
        app.world_mut().resource_mut::<ButtonInput<KeyCode>>()
    }

    #[test]
    fn axis_phases() {
        assert_eq!(axis_phase(Vec2::ZERO, Vec2::Y), Some(InputPhase::Started));
        assert_eq!(axis_phase(Vec2::Y, Vec2::ONE), Some(InputPhase::Ongoing));
        assert_eq!(axis_phase(Vec2::Y, Vec2::ZERO), Some(InputPhase::Canceled));
        assert_eq!(axis_phase(Vec2::Y, Vec2::Y), None);
    }

    #[test]
    fn opposite_keys_cancel_out() {
        let bindings = InputBindings::default();
        let mut keys = ButtonInput::<KeyCode>::default();
        keys.press(KeyCode::KeyW);
        keys.press(KeyCode::KeyS);
        keys.press(KeyCode::KeyD);
        assert_eq!(bindings.move_axis(&keys), Vec2::X);
    }

    #[test]
    fn diagonal_is_normalized() {
        let bindings = InputBindings::default();
        let mut keys = ButtonInput::<KeyCode>::default();
        keys.press(KeyCode::KeyW);
        keys.press(KeyCode::KeyD);
        assert!((bindings.move_axis(&keys).length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn move_keys_produce_started_then_canceled() {
        let mut app = create_test_app();

        keys(&mut app).press(KeyCode::KeyW);
        app.update();
        assert_eq!(
            drain(&mut app),
            vec![InputEvent::axis(InputKind::Move, InputPhase::Started, Vec2::Y)]
        );

        // Held without change: nothing new.
        keys(&mut app).clear();
        app.update();
        assert!(drain(&mut app).is_empty());

        keys(&mut app).release(KeyCode::KeyW);
        app.update();
        assert_eq!(
            drain(&mut app),
            vec![InputEvent::axis(InputKind::Move, InputPhase::Canceled, Vec2::ZERO)]
        );
    }

    #[test]
    fn button_edges_are_queued() {
        let mut app = create_test_app();

        keys(&mut app).press(KeyCode::KeyC);
        keys(&mut app).press(KeyCode::ShiftLeft);
        app.update();
        assert_eq!(
            drain(&mut app),
            vec![
                InputEvent::pressed(InputKind::Crouch),
                InputEvent::pressed(InputKind::Sprint),
            ]
        );

        keys(&mut app).clear();
        keys(&mut app).release(KeyCode::ShiftLeft);
        app.update();
        assert_eq!(drain(&mut app), vec![InputEvent::released(InputKind::Sprint)]);
    }

    #[test]
    fn mouse_motion_becomes_look_input() {
        let mut app = create_test_app();
        app.world_mut().resource_mut::<AccumulatedMouseMotion>().delta = Vec2::new(10.0, 20.0);

        app.update();

        assert_eq!(
            drain(&mut app),
            vec![InputEvent::axis(
                InputKind::Look,
                InputPhase::Ongoing,
                Vec2::new(1.0, -2.0)
            )]
        );
    }
}
