//! Shared test harness: a mock physics backend over a flat floor.

#![allow(dead_code)]

use std::time::Duration;

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use fps_stance_controller::backend::CharacterPhysicsBackend;
use fps_stance_controller::prelude::*;
use fps_stance_controller::vertical::ground_ray;

/// Linear velocity of a mock body.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct MockVelocity(pub Vec3);

/// Height of the infinite floor plane, or `None` for no floor.
#[derive(Resource, Debug, Clone, Copy)]
pub struct FloorHeight(pub Option<f32>);

/// Move bodies by their velocity at the end of each step.
#[derive(Resource, Debug, Clone, Copy)]
pub struct Integrate(pub bool);

pub struct MockBackend;

impl CharacterPhysicsBackend for MockBackend {
    fn plugin() -> impl Plugin {
        MockBackendPlugin
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world.get::<MockVelocity>(entity).map(|v| v.0).unwrap_or(Vec3::ZERO)
    }

    fn apply_velocity_change(world: &mut World, entity: Entity, delta: Vec3) {
        if let Some(mut velocity) = world.get_mut::<MockVelocity>(entity) {
            velocity.0 += delta;
        }
    }
}

pub struct MockBackendPlugin;

impl Plugin for MockBackendPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(FloorHeight(Some(0.0)));
        app.insert_resource(Integrate(false));
        app.add_systems(FixedUpdate, mock_ground_detection.in_set(LocomotionSet::Sensors));
        app.add_systems(FixedUpdate, mock_integrate.in_set(LocomotionSet::FinalApplication));
    }
}

fn mock_ground_detection(
    floor: Res<FloorHeight>,
    mut q_bodies: Query<(
        Entity,
        &Transform,
        &VerticalController,
        &ControllerConfig,
        &mut GroundSensor,
    )>,
) {
    for (entity, transform, controller, config, mut sensor) in &mut q_bodies {
        let ray = ground_ray(entity, transform.translation, controller, config);
        sensor.floor = floor.0.and_then(|floor_y| {
            let distance = ray.origin.y - floor_y;
            (distance >= 0.0 && distance <= ray.max_distance)
                .then(|| CollisionData::new(distance, Vec3::Y, ray.point_at(distance), None))
        });
    }
}

fn mock_integrate(
    integrate: Res<Integrate>,
    time: Res<Time<Fixed>>,
    mut q_bodies: Query<(&mut Transform, &MockVelocity)>,
) {
    if !integrate.0 {
        return;
    }
    let dt = time.timestep().as_secs_f32();
    for (mut transform, velocity) in &mut q_bodies {
        transform.translation += velocity.0 * dt;
    }
}

/// App with the controller over the mock backend.
///
/// Virtual time does not advance, so `FixedUpdate` only runs through [`step`].
pub fn create_test_app(timestep: f32) -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.add_plugins(TransformPlugin);
    app.add_plugins(FirstPersonControllerPlugin::<MockBackend>::without_device_input());
    app.insert_resource(Time::<Fixed>::from_seconds(timestep as f64));
    app.insert_resource(TimeUpdateStrategy::ManualDuration(Duration::ZERO));
    app.finish();
    app.cleanup();
    app
}

/// Spawn a character at `position` and run one frame so it subscribes.
pub fn spawn_character(app: &mut App, character: FirstPersonCharacter, position: Vec3) -> Entity {
    let entity = {
        let world = app.world_mut();
        let mut commands = world.commands();
        let entity = character
            .spawn(&mut commands, Transform::from_translation(position))
            .unwrap();
        commands.entity(entity).insert(MockVelocity::default());
        entity
    };
    app.world_mut().flush();
    app.update();
    entity
}

/// Queue an input event for the next frame.
pub fn send(app: &mut App, event: InputEvent) {
    app.world_mut().resource_mut::<InputBus>().queue(event);
}

/// Run one render frame (input dispatch and look).
pub fn frame(app: &mut App) {
    app.update();
}

/// Run one physics step.
pub fn step(app: &mut App) {
    app.world_mut().run_schedule(FixedUpdate);
}

pub fn velocity(app: &App, entity: Entity) -> Vec3 {
    app.world().get::<MockVelocity>(entity).unwrap().0
}

pub fn set_velocity(app: &mut App, entity: Entity, velocity: Vec3) {
    app.world_mut().get_mut::<MockVelocity>(entity).unwrap().0 = velocity;
}

pub fn stance(app: &App, entity: Entity) -> Stance {
    app.world().get::<StanceMachine>(entity).unwrap().stance()
}
