//! # `fps_stance_controller`
//!
//! A first-person floating rigidbody character controller with stance control
//! and physics backend abstraction.
//!
//! This crate provides a character controller that:
//! - Switches between Walk, Crouch and Sprint stances from input edges
//! - Floats above ground by cancelling the height error with a velocity change
//! - Interpolates the capsule and eye height across crouch/stand transitions
//! - Delivers input through an ordered publish/subscribe bus
//! - Rotates the body and head from mouse look at render rate
//! - Probes for interactable objects and plays their reaction sequences
//! - Abstracts physics backend for easy swapping (Rapier3D included)
//!
//! ## Architecture
//!
//! Input is collected in `PreUpdate` and dispatched once per frame in
//! `Update`. Handlers only record intent (stance, move axis, look angles,
//! transition arming). The physics work runs in `FixedUpdate`, ordered by
//! [`LocomotionSet`]:
//! 1. `Sensors`: the backend casts the ground and interaction rays
//! 2. `Vertical`: float correction and grounded flag, then capsule interpolation
//! 3. `Horizontal`: planar velocity correction, only while grounded
//! 4. `Interaction`: interactable target refresh
//! 5. `FinalApplication`: the backend pushes the capsule into its collider
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use fps_stance_controller::prelude::*;
//!
//! let character = FirstPersonCharacter::default()
//!     .with_controller(ControllerConfig::default().with_hold_to_crouch(true));
//! let bundle = character.build().expect("valid configuration");
//! assert_eq!(bundle.stance.stance(), Stance::Walk);
//! ```

use bevy::prelude::*;

pub mod backend;
pub mod bindings;
pub mod character;
pub mod collision;
pub mod config;
pub mod horizontal;
pub mod input;
pub mod interaction;
pub mod look;
pub mod settings;
pub mod state;
pub mod vertical;

#[cfg(feature = "rapier3d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::backend::{CharacterPhysicsBackend, RaycastRequest};
    pub use crate::bindings::InputBindings;
    pub use crate::character::{FirstPersonBundle, FirstPersonCharacter};
    pub use crate::collision::{CollisionData, LayerMask};
    pub use crate::config::{CapsuleProfile, ConfigError, ControllerConfig, InteractionConfig, LookConfig};
    pub use crate::horizontal::HorizontalController;
    pub use crate::input::{InputBus, InputEvent, InputKind, InputPhase, ReceivesInput};
    pub use crate::interaction::{
        AnimationParam, Interactable, Interacted, InteractionProbe, Reaction, ReactionFired, ReactionKind,
    };
    pub use crate::look::LookController;
    pub use crate::settings::{
        AudioVolumes, MixerVolumeChanged, PersistenceError, Preferences, SaveSlot, SetVolume, SettingsPlugin,
        VolumeChannel,
    };
    pub use crate::state::{Airborne, Grounded, Stance, StanceMachine};
    pub use crate::vertical::{CapsuleGeometry, GroundSensor, Head, StanceTransition, VerticalController};
    pub use crate::{FirstPersonControllerPlugin, LocomotionSet};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::{Rapier3dBackend, Rapier3dCharacterBundle};
}

/// Ordered phases of the physics step.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocomotionSet {
    /// Backend ray queries.
    Sensors,
    /// Float correction and crouch/stand interpolation.
    Vertical,
    /// Planar movement.
    Horizontal,
    /// Interaction target refresh.
    Interaction,
    /// Backend write-back (collider shape).
    FinalApplication,
}

/// Main plugin for the first-person controller.
///
/// This plugin is generic over a physics backend `B` which provides the
/// velocity access and the scene queries.
///
/// # Type Parameters
/// - `B`: The physics backend implementation (e.g., `Rapier3dBackend`)
///
/// # Examples
///
/// With Rapier3D backend:
/// ```rust,no_run
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use fps_stance_controller::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
///     .add_plugins(FirstPersonControllerPlugin::<Rapier3dBackend>::default())
///     .run();
/// ```
pub struct FirstPersonControllerPlugin<B: backend::CharacterPhysicsBackend> {
    /// Install the keyboard/mouse input source.
    pub device_input: bool,
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::CharacterPhysicsBackend> Default for FirstPersonControllerPlugin<B> {
    fn default() -> Self {
        Self {
            device_input: true,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::CharacterPhysicsBackend> FirstPersonControllerPlugin<B> {
    /// Plugin without the keyboard/mouse source. Events must be queued on
    /// the [`input::InputBus`] by other means.
    pub fn without_device_input() -> Self {
        Self {
            device_input: false,
            ..default()
        }
    }
}

impl<B: backend::CharacterPhysicsBackend> Plugin for FirstPersonControllerPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<config::ControllerConfig>();
        app.register_type::<config::LookConfig>();
        app.register_type::<config::InteractionConfig>();
        app.register_type::<state::StanceMachine>();
        app.register_type::<state::Grounded>();
        app.register_type::<state::Airborne>();
        app.register_type::<vertical::CapsuleGeometry>();
        app.register_type::<vertical::StanceTransition>();
        app.register_type::<vertical::GroundSensor>();
        app.register_type::<vertical::VerticalController>();
        app.register_type::<vertical::Head>();
        app.register_type::<horizontal::HorizontalController>();
        app.register_type::<look::LookController>();
        app.register_type::<interaction::InteractionProbe>();
        app.register_type::<interaction::Interactable>();
        app.register_type::<input::ReceivesInput>();
        app.register_type::<bindings::InputBindings>();

        // Add the physics backend plugin
        app.add_plugins(B::plugin());

        app.init_resource::<input::InputBus>();
        app.add_event::<interaction::ReactionFired>();
        app.add_observer(interaction::start_reactions);

        if self.device_input {
            app.init_resource::<bindings::InputBindings>();
            app.add_systems(PreUpdate, bindings::collect_device_input);
        }

        // Render cadence: subscriptions, dispatch, camera
        app.add_systems(
            Update,
            (
                input::detach_input_subscriptions,
                input::attach_input_subscriptions,
                input::dispatch_input,
                look::apply_look_rotation,
                interaction::advance_reactions,
            )
                .chain(),
        );

        // Physics cadence
        app.configure_sets(
            FixedUpdate,
            (
                LocomotionSet::Sensors,
                LocomotionSet::Vertical,
                LocomotionSet::Horizontal,
                LocomotionSet::Interaction,
                LocomotionSet::FinalApplication,
            )
                .chain(),
        );
        app.add_systems(
            FixedUpdate,
            (
                vertical::apply_float_correction::<B>,
                vertical::advance_stance_transition::<B>,
                state::sync_state_markers,
            )
                .chain()
                .in_set(LocomotionSet::Vertical),
        );
        app.add_systems(
            FixedUpdate,
            horizontal::apply_horizontal_movement::<B>.in_set(LocomotionSet::Horizontal),
        );
        app.add_systems(
            FixedUpdate,
            interaction::refresh_interaction_target.in_set(LocomotionSet::Interaction),
        );
    }
}
