//! The world: entity lifecycle, typed component surface, and views.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, error, warn};

use engine_core::TypeId32;

use crate::component::{Component, ComponentSet};
use crate::entity::{Entity, EntityAllocator};
use crate::events::{
    ComponentEventBus, EntityEventBus, component_event_bus, entity_event_bus,
};
use crate::name::Name;
use crate::storage::{ComponentStore, SparseSet};

/// Mutation contract violations.
#[derive(Debug, Error)]
pub enum WorldError {
    /// The entity handle does not refer to a live entity.
    #[error("entity {0} is not alive")]
    EntityNotAlive(Entity),
    /// `add` on an entity that already has the component.
    #[error("entity {entity} already has component '{component}'")]
    DuplicateComponent {
        /// The target entity.
        entity: Entity,
        /// The component type name.
        component: &'static str,
    },
    /// The entity does not carry the requested component.
    #[error("component '{component}' not found on entity {entity}")]
    ComponentNotFound {
        /// The target entity.
        entity: Entity,
        /// The component type name.
        component: &'static str,
    },
}

/// Forwarder record for a component type opted into observation.
struct ObservedType {
    type_name: &'static str,
}

enum Mutation {
    Construct,
    Update,
    Destroy,
}

/// The entity-component container.
///
/// Owns the entity allocator, one storage per component type, and the
/// two mutation-event buses. Not internally locked; main-thread-only
/// by contract. The buses it hands out are themselves shareable.
pub struct WorldContext {
    allocator: EntityAllocator,
    stores: HashMap<TypeId32, Box<dyn ComponentStore>>,
    observed: HashMap<TypeId32, ObservedType>,
    /// Guard against re-entrant destruction from destroy handlers.
    destroying: HashSet<Entity>,
    entity_events: EntityEventBus,
    component_events: ComponentEventBus,
}

impl Default for WorldContext {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldContext {
    /// Create an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            stores: HashMap::new(),
            observed: HashMap::new(),
            destroying: HashSet::new(),
            entity_events: entity_event_bus(),
            component_events: component_event_bus(),
        }
    }

    /// The entity lifecycle bus.
    #[must_use]
    pub fn entity_events(&self) -> &EntityEventBus {
        &self.entity_events
    }

    /// The component mutation bus, addressed by component type id.
    #[must_use]
    pub fn component_events(&self) -> &ComponentEventBus {
        &self.component_events
    }

    // -- Entity lifecycle --

    /// Create a new entity and broadcast its creation.
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.allocator.allocate();
        let bus = self.entity_events.clone();
        bus.broadcast(|h| h.on_entity_create(entity));
        entity
    }

    /// Create a new entity carrying a [`Name`] component.
    pub fn create_entity_named(&mut self, name: &str) -> Entity {
        let entity = self.allocator.allocate();
        let _ = self.add(entity, Name::new(name));
        let bus = self.entity_events.clone();
        bus.broadcast(|h| h.on_entity_create(entity));
        entity
    }

    /// Destroy an entity.
    ///
    /// The destroy broadcast and per-component destroy events all fire
    /// while the entity's state is still intact; storage is cleared
    /// afterwards. Re-entrant destruction of the same entity from a
    /// destroy handler is refused.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<(), WorldError> {
        self.ensure_alive(entity)?;
        if !self.destroying.insert(entity) {
            warn!(entity = %entity, "re-entrant destroy ignored");
            return Ok(());
        }
        let bus = self.entity_events.clone();
        bus.broadcast(|h| h.on_entity_destroy(entity));
        self.remove_all_components(entity);
        self.allocator.deallocate(entity);
        self.destroying.remove(&entity);
        Ok(())
    }

    /// Returns `true` if `entity` refers to a live entity.
    #[must_use]
    pub fn valid(&self, entity: Entity) -> bool {
        self.allocator.is_alive(entity)
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.allocator.live_count()
    }

    /// All live entities, in slot order.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.allocator.live_entities()
    }

    /// Destroy every entity and drop all storage and forwarders.
    ///
    /// Component destroy events still fire; entity destroy events do
    /// not.
    pub fn clear(&mut self) {
        for entity in self.allocator.live_entities() {
            self.remove_all_components(entity);
            self.allocator.deallocate(entity);
        }
        self.stores.clear();
        for observed in self.observed.values() {
            debug!(component = observed.type_name, "dropping component event forwarder");
        }
        self.observed.clear();
    }

    // -- Component surface --

    /// Attach a component. Fails when the entity already has one.
    ///
    /// Fires a construct event for observed types.
    pub fn add<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), WorldError> {
        self.ensure_alive(entity)?;
        let store = self.store_mut_or_insert::<T>();
        if store.contains(entity) {
            error!(entity = %entity, component = T::type_name(), "add refused, component already present");
            return Err(WorldError::DuplicateComponent {
                entity,
                component: T::type_name(),
            });
        }
        store.insert(entity, value);
        self.notify(Mutation::Construct, T::type_id(), entity);
        Ok(())
    }

    /// Attach a component, overwriting any existing value.
    ///
    /// Fires an update event when a value was replaced, a construct
    /// event otherwise.
    pub fn add_or_replace<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<(), WorldError> {
        self.ensure_alive(entity)?;
        let replaced = self.store_mut_or_insert::<T>().insert(entity, value).is_some();
        let mutation = if replaced {
            Mutation::Update
        } else {
            Mutation::Construct
        };
        self.notify(mutation, T::type_id(), entity);
        Ok(())
    }

    /// Overwrite an existing component. Fails when absent.
    ///
    /// Fires an update event.
    pub fn replace<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), WorldError> {
        self.ensure_alive(entity)?;
        let store = self.store_mut_or_insert::<T>();
        if !store.contains(entity) {
            error!(entity = %entity, component = T::type_name(), "replace refused, component absent");
            return Err(WorldError::ComponentNotFound {
                entity,
                component: T::type_name(),
            });
        }
        store.insert(entity, value);
        self.notify(Mutation::Update, T::type_id(), entity);
        Ok(())
    }

    /// Read a component. `None` for invalid entities or absent
    /// components.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        if !self.valid(entity) {
            return None;
        }
        self.store::<T>().and_then(|store| store.get(entity))
    }

    /// Mutably borrow a component. Mutation through this path fires no
    /// events; use [`replace`](Self::replace) when observers must see
    /// the change.
    #[must_use]
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        if !self.valid(entity) {
            return None;
        }
        self.store_mut::<T>().and_then(|store| store.get_mut(entity))
    }

    /// Detach a component. Fails when absent.
    ///
    /// The destroy event fires before the slot is cleared.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<(), WorldError> {
        self.ensure_alive(entity)?;
        if !self.contains_by_id(T::type_id(), entity) {
            error!(entity = %entity, component = T::type_name(), "remove refused, component absent");
            return Err(WorldError::ComponentNotFound {
                entity,
                component: T::type_name(),
            });
        }
        self.remove_by_id(T::type_id(), entity);
        Ok(())
    }

    /// Detach every component in the set that is present; absent ones
    /// are skipped.
    pub fn remove_many<S: ComponentSet>(&mut self, entity: Entity) -> Result<(), WorldError> {
        self.ensure_alive(entity)?;
        for type_id in S::type_ids() {
            if self.contains_by_id(type_id, entity) {
                self.remove_by_id(type_id, entity);
            }
        }
        Ok(())
    }

    /// Returns `true` if the entity carries component `T`.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.contains_by_id(T::type_id(), entity)
    }

    /// Returns `true` if the entity carries any component in the set.
    #[must_use]
    pub fn has_any<S: ComponentSet>(&self, entity: Entity) -> bool {
        S::type_ids()
            .iter()
            .any(|type_id| self.contains_by_id(*type_id, entity))
    }

    /// Returns `true` if the entity carries every component in the set.
    #[must_use]
    pub fn has_all<S: ComponentSet>(&self, entity: Entity) -> bool {
        S::type_ids()
            .iter()
            .all(|type_id| self.contains_by_id(*type_id, entity))
    }

    // -- Views --

    /// Iterate entities carrying `T`, in storage order.
    ///
    /// Storage order is deterministic for a given mutation history, so
    /// repeated views over the same set iterate identically.
    pub fn view<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.store::<T>().into_iter().flat_map(|store| store.iter())
    }

    /// Iterate entities carrying `T` with mutable access.
    ///
    /// Mutation through a view fires no events.
    pub fn view_mut<T: Component>(&mut self) -> impl Iterator<Item = (Entity, &mut T)> + '_ {
        self.store_mut::<T>()
            .into_iter()
            .flat_map(|store| store.iter_mut())
    }

    /// Iterate entities carrying both `A` and `B`, in `A`'s storage
    /// order.
    pub fn view2<A: Component, B: Component>(
        &self,
    ) -> impl Iterator<Item = (Entity, &A, &B)> + '_ {
        let second = self.store::<B>();
        self.store::<A>()
            .into_iter()
            .flat_map(|store| store.iter())
            .filter_map(move |(entity, a)| {
                second
                    .and_then(|store| store.get(entity))
                    .map(|b| (entity, a, b))
            })
    }

    /// Iterate entities carrying `T` but not `X`.
    pub fn view_excluding<T: Component, X: Component>(
        &self,
    ) -> impl Iterator<Item = (Entity, &T)> + '_ {
        let excluded = self.store::<X>();
        self.view::<T>()
            .filter(move |(entity, _)| !excluded.is_some_and(|store| store.contains(*entity)))
    }

    // -- Component events --

    /// Opt component type `T` into mutation events.
    ///
    /// Only opted-in types fire construct/update/destroy; the forwarder
    /// record lives with the store until [`clear`](Self::clear).
    pub fn setup_component_events<T: Component>(&mut self) {
        if self.observed.contains_key(&T::type_id()) {
            return;
        }
        debug!(component = T::type_name(), "component events enabled");
        self.observed.insert(
            T::type_id(),
            ObservedType {
                type_name: T::type_name(),
            },
        );
    }

    /// Returns `true` when `T` fires mutation events.
    #[must_use]
    pub fn observes<T: Component>(&self) -> bool {
        self.observed.contains_key(&T::type_id())
    }

    // -- Internals --

    fn ensure_alive(&self, entity: Entity) -> Result<(), WorldError> {
        if self.valid(entity) {
            Ok(())
        } else {
            error!(entity = %entity, "operation on dead entity");
            Err(WorldError::EntityNotAlive(entity))
        }
    }

    fn contains_by_id(&self, type_id: TypeId32, entity: Entity) -> bool {
        self.stores
            .get(&type_id)
            .is_some_and(|store| store.contains(entity))
    }

    /// Fire the destroy event (observed types), then clear the slot.
    fn remove_by_id(&mut self, type_id: TypeId32, entity: Entity) {
        self.notify(Mutation::Destroy, type_id, entity);
        if let Some(store) = self.stores.get_mut(&type_id) {
            store.remove_entity(entity);
        }
    }

    fn remove_all_components(&mut self, entity: Entity) {
        let present: Vec<TypeId32> = self
            .stores
            .iter()
            .filter(|(_, store)| store.contains(entity))
            .map(|(type_id, _)| *type_id)
            .collect();
        for type_id in present {
            self.remove_by_id(type_id, entity);
        }
    }

    fn notify(&mut self, mutation: Mutation, type_id: TypeId32, entity: Entity) {
        if !self.observed.contains_key(&type_id) {
            return;
        }
        let bus = self.component_events.clone();
        let world = &mut *self;
        match mutation {
            Mutation::Construct => {
                bus.event(&type_id, |h| h.on_component_construct(world, entity));
            }
            Mutation::Update => {
                bus.event(&type_id, |h| h.on_component_update(world, entity));
            }
            Mutation::Destroy => {
                bus.event(&type_id, |h| h.on_component_destroy(world, entity));
            }
        }
    }

    fn store<T: Component>(&self) -> Option<&SparseSet<T>> {
        self.stores
            .get(&T::type_id())
            .and_then(|store| store.as_any().downcast_ref())
    }

    fn store_mut<T: Component>(&mut self) -> Option<&mut SparseSet<T>> {
        self.stores
            .get_mut(&T::type_id())
            .and_then(|store| store.as_any_mut().downcast_mut())
    }

    fn store_mut_or_insert<T: Component>(&mut self) -> &mut SparseSet<T> {
        let store = self
            .stores
            .entry(T::type_id())
            .or_insert_with(|| Box::new(SparseSet::<T>::new()));
        store
            .as_any_mut()
            .downcast_mut()
            .expect("storage type matches component id")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use engine_bus::IdBusHandler;

    use super::*;
    use crate::events::ComponentEvents;

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {
        fn type_name() -> &'static str {
            "Position"
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Velocity {
        x: f32,
        y: f32,
    }
    impl Component for Velocity {
        fn type_name() -> &'static str {
            "Velocity"
        }
    }

    #[derive(Default)]
    struct MutationCounter {
        constructs: AtomicU32,
        updates: AtomicU32,
        destroys: AtomicU32,
    }

    impl ComponentEvents for MutationCounter {
        fn on_component_construct(&self, _world: &mut WorldContext, _entity: Entity) {
            self.constructs.fetch_add(1, Ordering::Relaxed);
        }
        fn on_component_update(&self, _world: &mut WorldContext, _entity: Entity) {
            self.updates.fetch_add(1, Ordering::Relaxed);
        }
        fn on_component_destroy(&self, _world: &mut WorldContext, _entity: Entity) {
            self.destroys.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn observe<T: Component>(
        world: &mut WorldContext,
    ) -> (Arc<MutationCounter>, IdBusHandler<dyn ComponentEvents, TypeId32>) {
        world.setup_component_events::<T>();
        let counter = Arc::new(MutationCounter::default());
        let mut handler = IdBusHandler::new(world.component_events().clone(), counter.clone());
        handler.connect(T::type_id());
        (counter, handler)
    }

    #[test]
    fn test_add_get_remove_roundtrip() {
        let mut world = WorldContext::new();
        let entity = world.create_entity();
        world.add(entity, Position { x: 1.0, y: 2.0 }).unwrap();
        assert_eq!(world.get::<Position>(entity), Some(&Position { x: 1.0, y: 2.0 }));
        assert!(world.has::<Position>(entity));
        world.remove::<Position>(entity).unwrap();
        assert!(world.get::<Position>(entity).is_none());
    }

    #[test]
    fn test_duplicate_add_rejected() {
        let mut world = WorldContext::new();
        let entity = world.create_entity();
        world.add(entity, Position { x: 0.0, y: 0.0 }).unwrap();
        assert!(matches!(
            world.add(entity, Position { x: 1.0, y: 1.0 }),
            Err(WorldError::DuplicateComponent { .. })
        ));
    }

    #[test]
    fn test_accessors_reject_dead_entities() {
        let mut world = WorldContext::new();
        let entity = world.create_entity();
        world.add(entity, Position { x: 0.0, y: 0.0 }).unwrap();
        world.destroy_entity(entity).unwrap();

        assert!(!world.valid(entity));
        assert!(world.get::<Position>(entity).is_none());
        assert!(matches!(
            world.add(entity, Position { x: 0.0, y: 0.0 }),
            Err(WorldError::EntityNotAlive(_))
        ));
    }

    #[test]
    fn test_component_event_completeness() {
        // Every add fires exactly one construct, every overwrite one
        // update, every removal one destroy.
        let mut world = WorldContext::new();
        let (counter, _handler) = observe::<Position>(&mut world);

        let entity = world.create_entity();
        world.add(entity, Position { x: 0.0, y: 0.0 }).unwrap();
        assert_eq!(counter.constructs.load(Ordering::Relaxed), 1);

        world.add_or_replace(entity, Position { x: 1.0, y: 0.0 }).unwrap();
        assert_eq!(counter.updates.load(Ordering::Relaxed), 1);

        world.replace(entity, Position { x: 2.0, y: 0.0 }).unwrap();
        assert_eq!(counter.updates.load(Ordering::Relaxed), 2);

        world.remove::<Position>(entity).unwrap();
        assert_eq!(counter.destroys.load(Ordering::Relaxed), 1);

        // add_or_replace on a missing component constructs.
        world.add_or_replace(entity, Position { x: 3.0, y: 0.0 }).unwrap();
        assert_eq!(counter.constructs.load(Ordering::Relaxed), 2);

        // Entity destruction fires the component destroy.
        world.destroy_entity(entity).unwrap();
        assert_eq!(counter.destroys.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_unobserved_types_fire_nothing() {
        let mut world = WorldContext::new();
        let (counter, _handler) = observe::<Position>(&mut world);

        let entity = world.create_entity();
        world.add(entity, Velocity { x: 1.0, y: 0.0 }).unwrap();
        world.add_or_replace(entity, Velocity { x: 2.0, y: 0.0 }).unwrap();
        world.remove::<Velocity>(entity).unwrap();

        assert_eq!(counter.constructs.load(Ordering::Relaxed), 0);
        assert_eq!(counter.updates.load(Ordering::Relaxed), 0);
        assert_eq!(counter.destroys.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_destroy_event_sees_component() {
        // Destroy fires before the slot is cleared.
        struct Inspector {
            saw_value: AtomicU32,
        }
        impl ComponentEvents for Inspector {
            fn on_component_destroy(&self, world: &mut WorldContext, entity: Entity) {
                if world.get::<Position>(entity).is_some() {
                    self.saw_value.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        let mut world = WorldContext::new();
        world.setup_component_events::<Position>();
        let inspector = Arc::new(Inspector {
            saw_value: AtomicU32::new(0),
        });
        let mut handler = IdBusHandler::new(world.component_events().clone(), inspector.clone()
            as Arc<dyn ComponentEvents>);
        handler.connect(Position::type_id());

        let entity = world.create_entity();
        world.add(entity, Position { x: 0.0, y: 0.0 }).unwrap();
        world.remove::<Position>(entity).unwrap();
        assert_eq!(inspector.saw_value.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_entity_lifecycle_events() {
        use crate::events::EntityEvents;

        #[derive(Default)]
        struct Lifecycle {
            created: AtomicU32,
            destroyed: AtomicU32,
        }
        impl EntityEvents for Lifecycle {
            fn on_entity_create(&self, _entity: Entity) {
                self.created.fetch_add(1, Ordering::Relaxed);
            }
            fn on_entity_destroy(&self, _entity: Entity) {
                self.destroyed.fetch_add(1, Ordering::Relaxed);
            }
        }

        let mut world = WorldContext::new();
        let lifecycle = Arc::new(Lifecycle::default());
        let connection = world
            .entity_events()
            .connect(lifecycle.clone() as Arc<dyn EntityEvents>, ())
            .unwrap();

        let entity = world.create_entity();
        assert_eq!(lifecycle.created.load(Ordering::Relaxed), 1);
        world.destroy_entity(entity).unwrap();
        assert_eq!(lifecycle.destroyed.load(Ordering::Relaxed), 1);

        world.entity_events().disconnect(connection);
    }

    #[test]
    fn test_clear_skips_entity_events() {
        use crate::events::EntityEvents;

        #[derive(Default)]
        struct Lifecycle {
            destroyed: AtomicU32,
        }
        impl EntityEvents for Lifecycle {
            fn on_entity_destroy(&self, _entity: Entity) {
                self.destroyed.fetch_add(1, Ordering::Relaxed);
            }
        }

        let mut world = WorldContext::new();
        let lifecycle = Arc::new(Lifecycle::default());
        let connection = world
            .entity_events()
            .connect(lifecycle.clone() as Arc<dyn EntityEvents>, ())
            .unwrap();

        world.create_entity();
        world.create_entity();
        world.clear();

        assert_eq!(lifecycle.destroyed.load(Ordering::Relaxed), 0);
        assert_eq!(world.entity_count(), 0);
        world.entity_events().disconnect(connection);
    }

    #[test]
    fn test_views_match_component_sets() {
        let mut world = WorldContext::new();
        let a = world.create_entity();
        let b = world.create_entity();
        let c = world.create_entity();

        world.add(a, Position { x: 1.0, y: 0.0 }).unwrap();
        world.add(b, Position { x: 2.0, y: 0.0 }).unwrap();
        world.add(b, Velocity { x: 0.5, y: 0.0 }).unwrap();
        world.add(c, Velocity { x: 0.1, y: 0.0 }).unwrap();

        let with_position: Vec<Entity> = world.view::<Position>().map(|(e, _)| e).collect();
        assert_eq!(with_position, vec![a, b]);

        let with_both: Vec<Entity> = world.view2::<Position, Velocity>().map(|(e, _, _)| e).collect();
        assert_eq!(with_both, vec![b]);

        let without_velocity: Vec<Entity> = world
            .view_excluding::<Position, Velocity>()
            .map(|(e, _)| e)
            .collect();
        assert_eq!(without_velocity, vec![a]);

        assert!(world.has_all::<(Position, Velocity)>(b));
        assert!(!world.has_all::<(Position, Velocity)>(a));
        assert!(world.has_any::<(Position, Velocity)>(c));
    }

    #[test]
    fn test_view_order_is_stable() {
        let mut world = WorldContext::new();
        let entities: Vec<Entity> = (0..4).map(|_| world.create_entity()).collect();
        for (index, &entity) in entities.iter().enumerate() {
            world
                .add(entity, Position { x: index as f32, y: 0.0 })
                .unwrap();
        }
        let first: Vec<Entity> = world.view::<Position>().map(|(e, _)| e).collect();
        let second: Vec<Entity> = world.view::<Position>().map(|(e, _)| e).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_remove_many_skips_absent_components() {
        let mut world = WorldContext::new();
        let (counter, _handler) = observe::<Position>(&mut world);
        let entity = world.create_entity();
        world.add(entity, Position { x: 0.0, y: 0.0 }).unwrap();

        world.remove_many::<(Position, Velocity)>(entity).unwrap();
        assert!(!world.has::<Position>(entity));
        assert_eq!(counter.destroys.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_named_entity_carries_name() {
        let mut world = WorldContext::new();
        let entity = world.create_entity_named("camera");
        assert_eq!(world.get::<Name>(entity), Some(&Name::new("camera")));
    }

    #[test]
    fn test_get_mut_is_silent() {
        let mut world = WorldContext::new();
        let (counter, _handler) = observe::<Position>(&mut world);
        let entity = world.create_entity();
        world.add(entity, Position { x: 0.0, y: 0.0 }).unwrap();

        if let Some(position) = world.get_mut::<Position>(entity) {
            position.x = 9.0;
        }
        assert_eq!(counter.updates.load(Ordering::Relaxed), 0);
        assert_eq!(world.get::<Position>(entity).map(|p| p.x), Some(9.0));
    }
}
