//! Movement stance and state marker components.
//!
//! [`StanceMachine`] holds the character's current [`Stance`] and applies
//! the crouch/sprint transition rules. It is the only writer of the stance;
//! the vertical and horizontal controllers read it after it has handled the
//! same input event.
//!
//! [`Grounded`] and [`Airborne`] are marker views of the ground sensor, kept
//! in sync once per physics step for use in user queries.

use bevy::prelude::*;

use crate::config::ControllerConfig;
use crate::input::{InputEvent, InputKind, InputPhase};
use crate::vertical::GroundSensor;

/// Discrete movement stance.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Stance {
    #[default]
    Walk,
    Crouch,
    Sprint,
}

/// Stance-changing button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StanceInput {
    Crouch,
    Sprint,
}

impl StanceInput {
    /// Map a bus event kind to a stance button.
    pub fn from_kind(kind: InputKind) -> Option<Self> {
        match kind {
            InputKind::Crouch => Some(StanceInput::Crouch),
            InputKind::Sprint => Some(StanceInput::Sprint),
            _ => None,
        }
    }

    fn stance(self) -> Stance {
        match self {
            StanceInput::Crouch => Stance::Crouch,
            StanceInput::Sprint => Stance::Sprint,
        }
    }
}

/// Walk / Crouch / Sprint state machine.
///
/// Whichever of Crouch and Sprint is active blocks entry into the other
/// until it exits. Each button is either hold-to-activate (press enters,
/// release exits) or toggle (press enters or exits, release does nothing).
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct StanceMachine {
    stance: Stance,
    /// Crouch is active only while held.
    pub hold_to_crouch: bool,
    /// Sprint is active only while held.
    pub hold_to_sprint: bool,
}

impl Default for StanceMachine {
    fn default() -> Self {
        Self::new(false, true)
    }
}

impl StanceMachine {
    /// Create a machine in [`Stance::Walk`].
    pub fn new(hold_to_crouch: bool, hold_to_sprint: bool) -> Self {
        Self {
            stance: Stance::Walk,
            hold_to_crouch,
            hold_to_sprint,
        }
    }

    /// Create a machine using the hold modes of a config.
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(config.hold_to_crouch, config.hold_to_sprint)
    }

    /// Current stance.
    #[inline]
    pub fn stance(&self) -> Stance {
        self.stance
    }

    #[inline]
    pub fn is_crouching(&self) -> bool {
        self.stance == Stance::Crouch
    }

    #[inline]
    pub fn is_sprinting(&self) -> bool {
        self.stance == Stance::Sprint
    }

    fn holds(&self, input: StanceInput) -> bool {
        match input {
            StanceInput::Crouch => self.hold_to_crouch,
            StanceInput::Sprint => self.hold_to_sprint,
        }
    }

    /// Apply a button edge. Returns the new stance if it changed.
    ///
    /// `Ongoing` phases never change the stance.
    pub fn handle(&mut self, input: StanceInput, phase: InputPhase) -> Option<Stance> {
        let entered = input.stance();
        let next = match phase {
            InputPhase::Started => match self.stance {
                Stance::Walk => entered,
                current if current == entered && !self.holds(input) => Stance::Walk,
                // Either already active in hold mode, or the other stance
                // is active and blocks this one.
                current => current,
            },
            InputPhase::Canceled if self.holds(input) && self.stance == entered => Stance::Walk,
            _ => self.stance,
        };

        if next == self.stance {
            None
        } else {
            self.stance = next;
            Some(next)
        }
    }
}

/// Bus handler for crouch and sprint events.
pub fn on_stance_input(world: &mut World, entity: Entity, event: &InputEvent) {
    let Some(input) = StanceInput::from_kind(event.kind) else {
        return;
    };
    let Some(mut machine) = world.get_mut::<StanceMachine>(entity) else {
        return;
    };
    let previous = machine.stance();
    if let Some(stance) = machine.handle(input, event.phase) {
        debug!("{entity} stance {previous:?} -> {stance:?}");
    }
}

/// Marker component indicating the character is grounded.
///
/// Mirrors [`GroundSensor::grounded`] and is updated once per physics step.
/// Mutually exclusive with [`Airborne`].
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Grounded;

/// Marker component indicating the ground probe found nothing.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Airborne;

/// Sync state marker components with the ground sensor.
pub fn sync_state_markers(
    mut commands: Commands,
    q_controllers: Query<(Entity, &GroundSensor, Has<Grounded>, Has<Airborne>)>,
) {
    for (entity, sensor, has_grounded, has_airborne) in &q_controllers {
        if sensor.grounded && !has_grounded {
            commands.entity(entity).insert(Grounded).remove::<Airborne>();
        } else if !sensor.grounded && !has_airborne {
            commands.entity(entity).insert(Airborne).remove::<Grounded>();
        }
    }
}
