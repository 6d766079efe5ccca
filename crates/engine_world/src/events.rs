//! Entity and component mutation events.
//!
//! The world owns two buses: a single-address, queue-enabled bus for
//! entity lifecycle, and a by-id bus for component mutations, addressed
//! by the component's [`TypeId32`]. Only component types opted in via
//! [`WorldContext::setup_component_events`](crate::WorldContext::setup_component_events)
//! produce component events.

use engine_bus::{BusOptions, EventBus};
use engine_core::TypeId32;

use crate::entity::Entity;
use crate::world::WorldContext;

/// Entity lifecycle interface.
///
/// `on_entity_create` fires after the entity exists;
/// `on_entity_destroy` fires before any of its state is torn down.
pub trait EntityEvents: Send + Sync {
    /// A new entity was created.
    fn on_entity_create(&self, _entity: Entity) {}

    /// An entity is about to be destroyed.
    fn on_entity_destroy(&self, _entity: Entity) {}
}

/// Component mutation interface.
///
/// Handlers receive the world so they can inspect (and cautiously
/// mutate) surrounding state. Construct and update fire after the
/// value is installed; destroy fires while the value is still present.
pub trait ComponentEvents: Send + Sync {
    /// A component was added to `entity`.
    fn on_component_construct(&self, _world: &mut WorldContext, _entity: Entity) {}

    /// An existing component on `entity` was overwritten.
    fn on_component_update(&self, _world: &mut WorldContext, _entity: Entity) {}

    /// The component on `entity` is about to be removed.
    fn on_component_destroy(&self, _world: &mut WorldContext, _entity: Entity) {}
}

/// Bus carrying [`EntityEvents`].
pub type EntityEventBus = EventBus<dyn EntityEvents>;

/// Bus carrying [`ComponentEvents`], addressed by component type id.
pub type ComponentEventBus = EventBus<dyn ComponentEvents, TypeId32>;

/// Build the entity lifecycle bus: one anonymous address, queueing
/// enabled so consumers can defer reactions to end of frame.
#[must_use]
pub fn entity_event_bus() -> EntityEventBus {
    EventBus::new(BusOptions::new("entity-events").with_event_queue())
}

/// Build the component mutation bus: one address per component type.
#[must_use]
pub fn component_event_bus() -> ComponentEventBus {
    EventBus::new(BusOptions::new("component-events").by_id())
}
