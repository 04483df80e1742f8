//! Interaction probe and reaction sequencing.
//!
//! Every physics step the backend casts a ray from the head along
//! [`InteractionConfig::direction`] and stores the hit in
//! [`InteractionProbe::hit`]. [`refresh_interaction_target`] keeps the hit
//! only if it carries [`Interactable`]. An interact press triggers
//! [`Interacted`] on the current target; the default observer starts the
//! target's reaction sequence, which publishes [`ReactionFired`] events one
//! after another, separated by each reaction's delay.

use std::collections::VecDeque;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::backend::RaycastRequest;
use crate::collision::CollisionData;
use crate::config::InteractionConfig;
use crate::input::{InputEvent, InputPhase};

/// Probe state of a character.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
pub struct InteractionProbe {
    /// Raw hit from the last sensor pass.
    pub hit: Option<CollisionData>,
    /// Interactable entity under the probe, if any.
    pub target: Option<Entity>,
}

/// Build the interaction ray for a head at `head` looking along the
/// head-local `config.direction`.
pub fn interaction_ray(body: Entity, head: &GlobalTransform, config: &InteractionConfig) -> RaycastRequest {
    let (_, rotation, translation) = head.to_scale_rotation_translation();
    RaycastRequest::new(translation, rotation * config.direction, config.range)
        .with_layers(config.layers)
        .including_sensors()
        .excluding(body)
}

/// Animator parameter change requested by a reaction.
#[derive(Reflect, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnimationParam {
    Trigger,
    Bool(bool),
    Float(f32),
}

/// What a reaction does when it fires.
#[derive(Reflect, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReactionKind {
    /// Named gameplay event.
    Event(String),
    /// Set an animator parameter.
    Animation { key: String, param: AnimationParam },
    /// Play an audio clip.
    Sound { clip: String, looping: bool },
}

/// One step of an interactable's response.
#[derive(Reflect, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    /// Free-form note for designers.
    #[serde(default)]
    pub description: String,
    /// Seconds to wait after firing before the next reaction fires.
    #[serde(default)]
    pub delay: f32,
    pub kind: ReactionKind,
}

impl Reaction {
    pub fn new(kind: ReactionKind) -> Self {
        Self {
            description: String::new(),
            delay: 0.0,
            kind,
        }
    }

    pub fn with_delay(mut self, seconds: f32) -> Self {
        self.delay = seconds.max(0.0);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Marks an entity the interaction probe can target.
///
/// Holds an ordered list of reactions played one at a time when the entity
/// is interacted with. Interacting again while a sequence is playing does
/// nothing.
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct Interactable {
    pub reactions: Vec<Reaction>,
    #[reflect(ignore)]
    queue: VecDeque<Reaction>,
    reacting: bool,
    delay_remaining: f32,
}

impl Interactable {
    pub fn new(reactions: Vec<Reaction>) -> Self {
        Self {
            reactions,
            ..default()
        }
    }

    /// Append a reaction to the sequence.
    pub fn with_reaction(mut self, reaction: Reaction) -> Self {
        self.reactions.push(reaction);
        self
    }

    /// Whether a reaction sequence is playing.
    #[inline]
    pub fn is_reacting(&self) -> bool {
        self.reacting
    }

    /// Start the reaction sequence. Returns the first reaction to fire.
    ///
    /// Returns `None` if a sequence is already playing or there is nothing
    /// to play.
    pub fn interact(&mut self) -> Option<Reaction> {
        if self.reacting {
            return None;
        }
        self.reacting = true;
        self.queue = self.reactions.iter().cloned().collect();
        self.next_reaction()
    }

    /// Advance the sequence by `dt` seconds and return the reactions that
    /// fire during this interval, in order.
    pub fn tick(&mut self, dt: f32) -> Vec<Reaction> {
        let mut fired = Vec::new();
        if !self.reacting {
            return fired;
        }
        self.delay_remaining -= dt;
        while self.reacting && self.delay_remaining <= 0.0 {
            let overshoot = self.delay_remaining;
            match self.next_reaction() {
                Some(reaction) => {
                    self.delay_remaining += overshoot;
                    fired.push(reaction);
                }
                None => break,
            }
        }
        fired
    }

    fn next_reaction(&mut self) -> Option<Reaction> {
        match self.queue.pop_front() {
            Some(reaction) => {
                self.delay_remaining = reaction.delay;
                Some(reaction)
            }
            None => {
                self.reacting = false;
                self.delay_remaining = 0.0;
                None
            }
        }
    }
}

/// Triggered on an [`Interactable`] when a character interacts with it.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interacted {
    /// The interacting character.
    pub actor: Entity,
}

/// A reaction fired on `source`.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct ReactionFired {
    pub source: Entity,
    pub kind: ReactionKind,
}

/// Keep the probe hit as target only if it is interactable.
pub fn refresh_interaction_target(
    mut q_probes: Query<(Entity, &mut InteractionProbe)>,
    q_interactables: Query<(), With<Interactable>>,
) {
    for (entity, mut probe) in &mut q_probes {
        let target = probe
            .hit
            .and_then(|hit| hit.entity)
            .filter(|hit| q_interactables.contains(*hit));
        if probe.target != target {
            debug!("{entity} interaction target {:?} -> {target:?}", probe.target);
            probe.target = target;
        }
    }
}

/// Bus handler for interact events.
pub fn on_interact_input(world: &mut World, entity: Entity, event: &InputEvent) {
    if event.phase != InputPhase::Started {
        return;
    }
    let Some(target) = world.get::<InteractionProbe>(entity).and_then(|p| p.target) else {
        return;
    };
    if world.get_entity(target).is_err() {
        return;
    }
    world.trigger_targets(Interacted { actor: entity }, target);
}

/// Observer starting the reaction sequence of an interacted entity.
pub fn start_reactions(
    trigger: Trigger<Interacted>,
    mut q_interactables: Query<&mut Interactable>,
    mut fired: EventWriter<ReactionFired>,
) {
    let source = trigger.target();
    let Ok(mut interactable) = q_interactables.get_mut(source) else {
        return;
    };
    if let Some(reaction) = interactable.interact() {
        debug!("{source} reacting: {}", reaction.description);
        fired.write(ReactionFired {
            source,
            kind: reaction.kind,
        });
    }
}

/// Play pending reactions whose delay has elapsed.
pub fn advance_reactions(
    time: Res<Time>,
    mut q_interactables: Query<(Entity, &mut Interactable)>,
    mut fired: EventWriter<ReactionFired>,
) {
    let dt = time.delta_secs();
    for (source, mut interactable) in &mut q_interactables {
        if !interactable.is_reacting() {
            continue;
        }
        for reaction in interactable.tick(dt) {
            fired.write(ReactionFired {
                source,
                kind: reaction.kind,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputKind;
    use approx::assert_relative_eq;
    use bevy::ecs::system::RunSystemOnce;

    fn sound(clip: &str, delay: f32) -> Reaction {
        Reaction::new(ReactionKind::Sound {
            clip: clip.to_string(),
            looping: false,
        })
        .with_delay(delay)
    }

    #[test]
    fn interact_fires_first_reaction() {
        let mut door = Interactable::new(vec![sound("creak", 0.5), sound("slam", 0.0)]);
        let first = door.interact().unwrap();
        assert_eq!(first, sound("creak", 0.5));
        assert!(door.is_reacting());
    }

    #[test]
    fn interact_while_reacting_is_ignored() {
        let mut door = Interactable::new(vec![sound("creak", 1.0)]);
        door.interact();
        assert_eq!(door.interact(), None);
    }

    #[test]
    fn reactions_fire_after_delays() {
        let mut door = Interactable::new(vec![sound("a", 0.5), sound("b", 0.5), sound("c", 0.0)]);
        door.interact();

        assert!(door.tick(0.25).is_empty());
        assert_eq!(door.tick(0.25), vec![sound("b", 0.5)]);
        assert_eq!(door.tick(0.5), vec![sound("c", 0.0)]);
        // The last reaction's delay elapsed on the same tick.
        assert!(!door.is_reacting());
        assert!(door.interact().is_some());
    }

    #[test]
    fn empty_interactable_never_reacts() {
        let mut switch = Interactable::default();
        assert_eq!(switch.interact(), None);
        assert!(!switch.is_reacting());
    }

    #[test]
    fn target_requires_interactable() {
        let mut world = World::new();
        let wall = world.spawn_empty().id();
        let door = world.spawn(Interactable::default()).id();
        let player = world
            .spawn(InteractionProbe {
                hit: Some(CollisionData::new(1.0, Vec3::Z, Vec3::ZERO, Some(wall))),
                target: None,
            })
            .id();

        world.run_system_once(refresh_interaction_target).unwrap();
        assert_eq!(world.get::<InteractionProbe>(player).unwrap().target, None);

        world.get_mut::<InteractionProbe>(player).unwrap().hit =
            Some(CollisionData::new(1.0, Vec3::Z, Vec3::ZERO, Some(door)));
        world.run_system_once(refresh_interaction_target).unwrap();
        assert_eq!(world.get::<InteractionProbe>(player).unwrap().target, Some(door));

        world.get_mut::<InteractionProbe>(player).unwrap().hit = None;
        world.run_system_once(refresh_interaction_target).unwrap();
        assert_eq!(world.get::<InteractionProbe>(player).unwrap().target, None);
    }

    #[test]
    fn interact_press_triggers_target() {
        let mut world = World::new();
        world.init_resource::<Events<ReactionFired>>();
        world.add_observer(start_reactions);
        let door = world
            .spawn(Interactable::new(vec![Reaction::new(ReactionKind::Event("open".into()))]))
            .id();
        let player = world
            .spawn(InteractionProbe {
                hit: None,
                target: Some(door),
            })
            .id();

        on_interact_input(&mut world, player, &InputEvent::released(InputKind::Interact));
        assert!(!world.get::<Interactable>(door).unwrap().is_reacting());

        on_interact_input(&mut world, player, &InputEvent::pressed(InputKind::Interact));
        world.flush();

        let fired: Vec<_> = world
            .resource::<Events<ReactionFired>>()
            .iter_current_update_events()
            .cloned()
            .collect();
        assert_eq!(
            fired,
            vec![ReactionFired {
                source: door,
                kind: ReactionKind::Event("open".into()),
            }]
        );
    }

    #[test]
    fn interact_without_target_does_nothing() {
        let mut world = World::new();
        world.init_resource::<Events<ReactionFired>>();
        world.add_observer(start_reactions);
        let player = world.spawn(InteractionProbe::default()).id();

        on_interact_input(&mut world, player, &InputEvent::pressed(InputKind::Interact));

        assert!(world.resource::<Events<ReactionFired>>().is_empty());
    }

    #[test]
    fn interaction_ray_follows_head() {
        let head = GlobalTransform::from(
            Transform::from_xyz(0.0, 1.6, 0.0)
                .with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2)),
        );
        let body = Entity::from_raw(9);
        let ray = interaction_ray(body, &head, &InteractionConfig::default());

        assert_relative_eq!(ray.origin.y, 1.6, epsilon = 1e-5);
        assert_relative_eq!(ray.direction.x, -1.0, epsilon = 1e-5);
        assert!(ray.include_sensors);
        assert_eq!(ray.exclude, Some(body));
        assert_eq!(ray.max_distance, 2.0);
    }
}
