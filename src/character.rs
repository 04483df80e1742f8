//! Character assembly.
//!
//! [`FirstPersonCharacter`] validates every config once and produces the
//! body bundle, so step-time systems never see a faulty configuration.

use bevy::prelude::*;

use crate::config::{ConfigError, ControllerConfig, InteractionConfig, LookConfig};
use crate::horizontal::HorizontalController;
use crate::input::ReceivesInput;
use crate::interaction::InteractionProbe;
use crate::look::LookController;
use crate::state::StanceMachine;
use crate::vertical::{CapsuleGeometry, GroundSensor, Head, StanceTransition, VerticalController};

/// Every controller component of a first-person body.
///
/// The physics components (rigid body, velocity, collider) come from the
/// backend, e.g. `Rapier3dCharacterBundle`.
#[derive(Bundle, Clone)]
pub struct FirstPersonBundle {
    pub config: ControllerConfig,
    pub look_config: LookConfig,
    pub interaction_config: InteractionConfig,
    pub stance: StanceMachine,
    pub vertical: VerticalController,
    pub transition: StanceTransition,
    pub geometry: CapsuleGeometry,
    pub ground: GroundSensor,
    pub horizontal: HorizontalController,
    pub look: LookController,
    pub probe: InteractionProbe,
}

/// Builder for a first-person character.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use fps_stance_controller::prelude::*;
///
/// fn spawn_player(mut commands: Commands) {
///     let spawned = FirstPersonCharacter::default()
///         .with_controller(ControllerConfig::default().with_speeds(4.0, 2.0, 7.0))
///         .spawn(&mut commands, Transform::from_xyz(0.0, 1.0, 0.0));
///     if let Err(err) = spawned {
///         error!("player not spawned: {err}");
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FirstPersonCharacter {
    pub controller: ControllerConfig,
    pub look: LookConfig,
    pub interaction: InteractionConfig,
    /// Subscribe the character to the input bus.
    pub receives_input: bool,
}

impl Default for FirstPersonCharacter {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            look: LookConfig::default(),
            interaction: InteractionConfig::default(),
            receives_input: true,
        }
    }
}

impl FirstPersonCharacter {
    pub fn with_controller(mut self, config: ControllerConfig) -> Self {
        self.controller = config;
        self
    }

    pub fn with_look(mut self, config: LookConfig) -> Self {
        self.look = config;
        self
    }

    pub fn with_interaction(mut self, config: InteractionConfig) -> Self {
        self.interaction = config;
        self
    }

    /// Do not subscribe to the input bus (AI or scripted characters).
    pub fn without_input(mut self) -> Self {
        self.receives_input = false;
        self
    }

    /// Validate every config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.controller.validate()?;
        self.look.validate()?;
        self.interaction.validate()
    }

    /// Validate and build the body bundle.
    pub fn build(&self) -> Result<FirstPersonBundle, ConfigError> {
        if let Err(err) = self.validate() {
            error!("rejected character configuration: {err}");
            return Err(err);
        }

        let config = self.controller;
        Ok(FirstPersonBundle {
            config,
            look_config: self.look,
            interaction_config: self.interaction,
            stance: StanceMachine::from_config(&config),
            vertical: VerticalController::new(&config),
            transition: StanceTransition::new(config.crouch_time, config.standing),
            geometry: CapsuleGeometry::new(config.standing, config.capsule_radius),
            ground: GroundSensor::default(),
            horizontal: HorizontalController::new(&config),
            look: LookController::default(),
            probe: InteractionProbe::default(),
        })
    }

    /// Spawn the body with `transform` and its head pivot as a child.
    ///
    /// Returns the body entity. Backend physics components can be inserted
    /// on it afterwards.
    pub fn spawn(&self, commands: &mut Commands, transform: Transform) -> Result<Entity, ConfigError> {
        let bundle = self.build()?;
        let eye_height = bundle.vertical.eye_height;

        let body = commands.spawn((Name::new("Player"), transform, bundle)).id();
        let head = commands
            .spawn((
                Name::new("Head"),
                Transform::from_xyz(0.0, eye_height, 0.0),
                ChildOf(body),
            ))
            .id();
        let mut body_commands = commands.entity(body);
        body_commands.insert(Head(head));
        if self.receives_input {
            body_commands.insert(ReceivesInput);
        }

        debug!("spawned first-person character {body} with head {head}");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CapsuleProfile;

    #[test]
    fn build_starts_standing() {
        let bundle = FirstPersonCharacter::default().build().unwrap();
        let standing = CapsuleProfile::STANDING;

        assert_eq!(bundle.geometry.profile(), standing);
        assert_eq!(bundle.vertical.float_height, standing.center);
        assert_eq!(bundle.stance.stance(), crate::state::Stance::Walk);
        assert_eq!(bundle.horizontal.speed, bundle.config.walk_speed);
        assert!(!bundle.transition.is_active());
    }

    #[test]
    fn invalid_probe_rejected_at_build() {
        let character = FirstPersonCharacter::default()
            .with_controller(ControllerConfig::default().with_float(25.0, 0.0));
        assert!(matches!(
            character.build(),
            Err(ConfigError::NotPositive {
                field: "ground_probe_length",
                ..
            })
        ));
    }

    #[test]
    fn invalid_interaction_rejected_at_build() {
        let character = FirstPersonCharacter::default()
            .with_interaction(InteractionConfig::default().with_range(0.0));
        assert!(character.build().is_err());
    }

    #[test]
    fn spawn_creates_head_child() {
        let mut world = World::new();
        let body = {
            let mut commands = world.commands();
            FirstPersonCharacter::default()
                .spawn(&mut commands, Transform::default())
                .unwrap()
        };
        world.flush();

        let head = world.get::<Head>(body).unwrap().0;
        assert_eq!(world.get::<ChildOf>(head).unwrap().parent(), body);
        assert!(world.get::<ReceivesInput>(body).is_some());

        let eye = world.get::<Transform>(head).unwrap().translation.y;
        assert_eq!(eye, world.get::<VerticalController>(body).unwrap().eye_height);
    }

    #[test]
    fn spawn_without_input() {
        let mut world = World::new();
        let body = {
            let mut commands = world.commands();
            FirstPersonCharacter::default()
                .without_input()
                .spawn(&mut commands, Transform::default())
                .unwrap()
        };
        world.flush();

        assert!(world.get::<ReceivesInput>(body).is_none());
    }
}
