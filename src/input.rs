//! Input event bus.
//!
//! Input sources queue edge-tagged [`InputEvent`]s on the [`InputBus`]
//! resource. Once per render frame [`dispatch_input`] delivers every queued
//! event, in arrival order, to the handlers subscribed to its [`InputKind`].
//! Handlers run synchronously and in subscription order, so a handler
//! subscribed later observes the state written by one subscribed earlier
//! (the stance handler runs before the speed refresh, for example).
//!
//! Subscriptions are keyed by entity. Characters subscribe when they gain
//! [`ReceivesInput`] and are unsubscribed when it is removed or the entity
//! is despawned.

use bevy::prelude::*;

/// Logical input actions.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    /// Planar movement axis (`x` strafe, `y` forward).
    Move,
    /// Look axis (`x` yaw, `y` pitch).
    Look,
    /// Crouch button.
    Crouch,
    /// Sprint button.
    Sprint,
    /// Interact button.
    Interact,
}

impl InputKind {
    #[inline]
    fn index(self) -> usize {
        match self {
            InputKind::Move => 0,
            InputKind::Look => 1,
            InputKind::Crouch => 2,
            InputKind::Sprint => 3,
            InputKind::Interact => 4,
        }
    }
}

/// Edge tag of an input event.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputPhase {
    /// The action was just activated (button press, axis left zero).
    Started,
    /// The action is still active with a new value.
    Ongoing,
    /// The action was released (button release, axis back to zero).
    Canceled,
}

/// A single input event.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct InputEvent {
    /// Which action fired.
    pub kind: InputKind,
    /// Edge tag.
    pub phase: InputPhase,
    /// Axis payload. Zero for buttons.
    pub value: Vec2,
}

impl InputEvent {
    /// Create an axis event.
    pub fn axis(kind: InputKind, phase: InputPhase, value: Vec2) -> Self {
        Self { kind, phase, value }
    }

    /// Create a button event.
    pub fn button(kind: InputKind, phase: InputPhase) -> Self {
        Self {
            kind,
            phase,
            value: Vec2::ZERO,
        }
    }

    /// Button press.
    pub fn pressed(kind: InputKind) -> Self {
        Self::button(kind, InputPhase::Started)
    }

    /// Button release.
    pub fn released(kind: InputKind) -> Self {
        Self::button(kind, InputPhase::Canceled)
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.phase == InputPhase::Started
    }

    #[inline]
    pub fn is_canceled(&self) -> bool {
        self.phase == InputPhase::Canceled
    }
}

/// Callback invoked for every dispatched event of a subscribed kind.
///
/// Receives the world (without the [`InputBus`] resource, which is held by the
/// dispatcher), the subscribed entity and the event.
pub type InputHandler = fn(&mut World, Entity, &InputEvent);

/// Handle returned by [`InputBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Clone, Copy)]
struct Subscription {
    id: SubscriptionId,
    entity: Entity,
    handler: InputHandler,
}

/// Publish/subscribe table for input events.
#[derive(Resource)]
pub struct InputBus {
    subscribers: [Vec<Subscription>; 5],
    pending: Vec<InputEvent>,
    next_id: u64,
    player_enabled: bool,
}

impl Default for InputBus {
    fn default() -> Self {
        Self {
            subscribers: Default::default(),
            pending: Vec::new(),
            next_id: 0,
            player_enabled: true,
        }
    }
}

impl InputBus {
    /// Create an empty bus with player input enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind` on behalf of `entity`.
    ///
    /// Handlers of the same kind are notified in the order they subscribed.
    pub fn subscribe(&mut self, kind: InputKind, entity: Entity, handler: InputHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers[kind.index()].push(Subscription { id, entity, handler });
        id
    }

    /// Remove a single subscription. Returns whether it existed.
    pub fn unsubscribe(&mut self, kind: InputKind, id: SubscriptionId) -> bool {
        let list = &mut self.subscribers[kind.index()];
        let before = list.len();
        list.retain(|s| s.id != id);
        list.len() != before
    }

    /// Remove every subscription held by `entity`.
    pub fn unsubscribe_entity(&mut self, entity: Entity) -> usize {
        let mut removed = 0;
        for list in &mut self.subscribers {
            let before = list.len();
            list.retain(|s| s.entity != entity);
            removed += before - list.len();
        }
        removed
    }

    /// Number of subscribers for a kind.
    pub fn subscriber_count(&self, kind: InputKind) -> usize {
        self.subscribers[kind.index()].len()
    }

    /// Whether `entity` holds any subscription.
    pub fn is_subscribed(&self, entity: Entity) -> bool {
        self.subscribers
            .iter()
            .any(|list| list.iter().any(|s| s.entity == entity))
    }

    /// Buffer an event for this frame's dispatch pass.
    pub fn queue(&mut self, event: InputEvent) {
        self.pending.push(event);
    }

    /// Events waiting for the next dispatch pass.
    pub fn pending(&self) -> &[InputEvent] {
        &self.pending
    }

    /// Enable or disable player input. While disabled, dispatch drops events.
    pub fn set_player_enabled(&mut self, enabled: bool) {
        self.player_enabled = enabled;
    }

    /// Whether player input is currently delivered.
    pub fn player_enabled(&self) -> bool {
        self.player_enabled
    }

    /// Deliver `event` to every current subscriber of its kind.
    ///
    /// Takes `&self`: the subscriber lists cannot change while a dispatch is
    /// running.
    pub fn dispatch(&self, world: &mut World, event: &InputEvent) {
        if !self.player_enabled {
            return;
        }
        for subscription in &self.subscribers[event.kind.index()] {
            (subscription.handler)(world, subscription.entity, event);
        }
    }

    fn take_pending(&mut self) -> Vec<InputEvent> {
        std::mem::take(&mut self.pending)
    }
}

/// Marker: the entity's controllers receive input from the bus.
///
/// Adding it subscribes the character's handlers; removing it (or despawning
/// the entity) unsubscribes them.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct ReceivesInput;

/// Deliver every queued event. Events not delivered this pass are dropped.
pub fn dispatch_input(world: &mut World) {
    if !world.contains_resource::<InputBus>() {
        return;
    }
    world.resource_scope(|world, mut bus: Mut<InputBus>| {
        let events = bus.take_pending();
        for event in &events {
            bus.dispatch(world, event);
        }
    });
}

/// Subscribe the handlers of characters that just gained [`ReceivesInput`].
///
/// Notification order per kind follows the data flow: the stance machine
/// first, then the vertical and horizontal controllers that read the
/// resolved stance.
pub fn attach_input_subscriptions(
    mut bus: ResMut<InputBus>,
    q_added: Query<Entity, Added<ReceivesInput>>,
) {
    for entity in &q_added {
        if bus.is_subscribed(entity) {
            continue;
        }
        bus.subscribe(InputKind::Crouch, entity, crate::state::on_stance_input);
        bus.subscribe(InputKind::Sprint, entity, crate::state::on_stance_input);
        bus.subscribe(InputKind::Crouch, entity, crate::vertical::on_crouch_input);
        bus.subscribe(InputKind::Crouch, entity, crate::horizontal::on_stance_input);
        bus.subscribe(InputKind::Sprint, entity, crate::horizontal::on_stance_input);
        bus.subscribe(InputKind::Move, entity, crate::horizontal::on_move_input);
        bus.subscribe(InputKind::Look, entity, crate::look::on_look_input);
        bus.subscribe(InputKind::Interact, entity, crate::interaction::on_interact_input);
        debug!("subscribed input handlers for {entity}");
    }
}

/// Drop the subscriptions of characters that lost [`ReceivesInput`].
pub fn detach_input_subscriptions(
    mut bus: ResMut<InputBus>,
    mut removed: RemovedComponents<ReceivesInput>,
) {
    for entity in removed.read() {
        let count = bus.unsubscribe_entity(entity);
        if count > 0 {
            debug!("removed {count} input subscriptions for {entity}");
        }
    }
}
