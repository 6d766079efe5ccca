//! The scene manager: hierarchy observer and cache owner.
//!
//! Connected to the world's component bus at the `Hierarchy` address.
//! Every construct/update/destroy event is integrity-checked against
//! the current world; valid mutations patch the sibling/parent pointers
//! of the surrounding entities (silently, firing no nested events) and queue
//! cache refreshes that are drained before the observer returns, so any
//! later consumer of the same event sees a consistent cache.
//!
//! Updates are treated as remove-then-add against the cached copy of
//! the entity's previous hierarchy; the cache exists precisely to diff
//! them.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error};

use engine_bus::IdBusHandler;
use engine_core::{HashString, TypeId32};
use engine_world::{Component, ComponentEvents, Entity, WorldContext};

use crate::hierarchy::Hierarchy;
use crate::scene::Scene;

/// A queued cache refresh, drained before the observer returns.
enum CacheUpdate {
    /// Recompute the children vector of an entity.
    Children(Entity),
    /// Recompute root membership of an entity.
    Roots(Entity),
}

#[derive(Default)]
struct SceneState {
    entities: HashSet<Entity>,
    roots: HashSet<Entity>,
    children_map: HashMap<Entity, Vec<Entity>>,
    /// Last-seen hierarchy per entity, used to diff updates and to
    /// drive removal when the live component is already gone.
    component_cache: HashMap<Entity, Hierarchy>,
    dfs_tree: Vec<(Entity, u32)>,
    pending: VecDeque<CacheUpdate>,
}

/// Maintains the scene caches by observing `Hierarchy` mutations.
///
/// Construct with [`SceneManager::new`], then [`install`](Self::install)
/// it on a world; keep the returned bus binding alive for as long as
/// the scene should react.
#[derive(Default)]
pub struct SceneManager {
    state: Mutex<SceneState>,
}

impl SceneManager {
    /// The identifier this system announces itself under.
    pub const NAME: HashString = HashString::new("SceneManager");

    /// Create a manager with empty caches.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Subscribe to `Hierarchy` events on `world`.
    ///
    /// Opts `Hierarchy` into component observation and returns the bus
    /// binding; dropping the binding detaches the scene from the world.
    #[must_use]
    pub fn install(
        self: &Arc<Self>,
        world: &mut WorldContext,
    ) -> IdBusHandler<dyn ComponentEvents, TypeId32> {
        world.setup_component_events::<Hierarchy>();
        let mut handler =
            IdBusHandler::new(world.component_events().clone(), self.clone() as Arc<dyn ComponentEvents>);
        handler.connect(Hierarchy::type_id());
        debug!(system = %Self::NAME, "scene manager installed");
        handler
    }

    /// Drop every cache. Does not touch the world's components.
    pub fn shutdown(&self) {
        let mut state = self.state();
        state.entities.clear();
        state.roots.clear();
        state.children_map.clear();
        state.component_cache.clear();
        state.dfs_tree.clear();
        state.pending.clear();
    }

    fn state(&self) -> MutexGuard<'_, SceneState> {
        self.state.lock().expect("scene state poisoned")
    }
}

// -- Structural helpers -----------------------------------------------------
//
// These run with the cache lock held. They mutate hierarchies through
// `get_mut`, which fires no component events, so the lock is never
// re-entered.

/// Apply `patch` to an entity's hierarchy and mirror the result into
/// the component cache.
fn patch(
    world: &mut WorldContext,
    state: &mut SceneState,
    entity: Entity,
    apply: impl FnOnce(&mut Hierarchy),
) {
    if let Some(hierarchy) = world.get_mut::<Hierarchy>(entity) {
        apply(hierarchy);
        let snapshot = *hierarchy;
        state.component_cache.insert(entity, snapshot);
    } else {
        error!(entity = %entity, "patch target has no hierarchy component");
    }
}

/// The child list encoded by `hierarchy`, in sibling order.
fn child_chain(world: &WorldContext, hierarchy: &Hierarchy) -> Vec<Entity> {
    let mut children = Vec::new();
    let mut cursor = hierarchy.first_child;
    while !cursor.is_null() {
        children.push(cursor);
        cursor = world
            .get::<Hierarchy>(cursor)
            .map_or(Entity::NULL, |h| h.next_sibling);
    }
    children
}

/// Integrity check for a hierarchy about to enter the scene.
///
/// Violations are logged individually; the caller ignores the mutation
/// on `false` and the caches stay at the last good state.
fn validate(world: &WorldContext, state: &SceneState, entity: Entity, hierarchy: &Hierarchy) -> bool {
    let in_scene = |target: Entity| state.entities.contains(&target);

    if !hierarchy.parent.is_null() && !in_scene(hierarchy.parent) {
        error!(entity = %entity, parent = %hierarchy.parent, "parent is not in the scene");
        return false;
    }
    if !hierarchy.prev_sibling.is_null() && !in_scene(hierarchy.prev_sibling) {
        error!(entity = %entity, sibling = %hierarchy.prev_sibling, "prev sibling is not in the scene");
        return false;
    }
    if !hierarchy.next_sibling.is_null() && !in_scene(hierarchy.next_sibling) {
        error!(entity = %entity, sibling = %hierarchy.next_sibling, "next sibling is not in the scene");
        return false;
    }
    if !hierarchy.first_child.is_null() && !in_scene(hierarchy.first_child) {
        error!(entity = %entity, child = %hierarchy.first_child, "first child is not in the scene");
        return false;
    }

    // Walking up from the new parent must never come back to the entity.
    let mut cursor = hierarchy.parent;
    while !cursor.is_null() {
        if cursor == entity {
            error!(entity = %entity, parent = %hierarchy.parent, "hierarchy would create a cycle");
            return false;
        }
        cursor = world
            .get::<Hierarchy>(cursor)
            .map_or(Entity::NULL, |h| h.parent);
    }

    if !hierarchy.prev_sibling.is_null() || !hierarchy.next_sibling.is_null() {
        if hierarchy.parent.is_null() {
            error!(entity = %entity, "hierarchy has siblings but no parent");
            return false;
        }
        if !hierarchy.prev_sibling.is_null() {
            let Some(prev) = world.get::<Hierarchy>(hierarchy.prev_sibling) else {
                error!(entity = %entity, "prev sibling has no hierarchy component");
                return false;
            };
            if prev.parent != hierarchy.parent {
                error!(entity = %entity, "prev sibling has a different parent");
                return false;
            }
            if prev.next_sibling != hierarchy.next_sibling {
                error!(entity = %entity, "prev sibling does not precede the declared next sibling");
                return false;
            }
        }
        if !hierarchy.next_sibling.is_null() {
            let Some(next) = world.get::<Hierarchy>(hierarchy.next_sibling) else {
                error!(entity = %entity, "next sibling has no hierarchy component");
                return false;
            };
            if next.parent != hierarchy.parent {
                error!(entity = %entity, "next sibling has a different parent");
                return false;
            }
            if next.prev_sibling != hierarchy.prev_sibling {
                error!(entity = %entity, "next sibling does not follow the declared prev sibling");
                return false;
            }
        }
    } else if !hierarchy.parent.is_null() {
        let Some(parent) = world.get::<Hierarchy>(hierarchy.parent) else {
            error!(entity = %entity, "parent has no hierarchy component");
            return false;
        };
        if !parent.first_child.is_null() {
            error!(
                entity = %entity,
                parent = %hierarchy.parent,
                "parent already has children but no insertion position was given"
            );
            return false;
        }
    }

    true
}

/// Link `entity` into the structure encoded by its hierarchy.
///
/// Patches the surrounding entities only; cache refreshes are queued on
/// `state.pending`.
fn add_internal(world: &mut WorldContext, state: &mut SceneState, entity: Entity) {
    let Some(hierarchy) = world.get::<Hierarchy>(entity).copied() else {
        error!(entity = %entity, "add target has no hierarchy component");
        return;
    };
    let parent = hierarchy.parent;
    let mut prev = hierarchy.prev_sibling;
    let mut next = hierarchy.next_sibling;

    if !parent.is_null() {
        if prev.is_null() {
            patch(world, state, parent, |h| h.first_child = entity);
        }
        state.pending.push_back(CacheUpdate::Children(parent));
    }

    // Resolve a missing sibling pointer from the other side's chain.
    if prev.is_null() && !next.is_null() {
        prev = world
            .get::<Hierarchy>(next)
            .map_or(Entity::NULL, |h| h.prev_sibling);
    }
    if !prev.is_null() && next.is_null() {
        next = world
            .get::<Hierarchy>(prev)
            .map_or(Entity::NULL, |h| h.next_sibling);
    }

    if !prev.is_null() {
        patch(world, state, prev, |h| h.next_sibling = entity);
        state.pending.push_back(CacheUpdate::Roots(prev));
    }
    if !next.is_null() {
        patch(world, state, next, |h| h.prev_sibling = entity);
        state.pending.push_back(CacheUpdate::Roots(next));
    }

    // Adopt the entities on the child chain: rewrite their parent, and
    // detach the first child from its previous sibling in its old list.
    let children = child_chain(world, &hierarchy);
    let mut is_first = true;
    for child in children {
        if is_first {
            let old_prev = world
                .get::<Hierarchy>(child)
                .map_or(Entity::NULL, |h| h.prev_sibling);
            if !old_prev.is_null() {
                let old_parent = world
                    .get::<Hierarchy>(old_prev)
                    .map_or(Entity::NULL, |h| h.parent);
                patch(world, state, old_prev, |h| h.next_sibling = Entity::NULL);
                if !old_parent.is_null() {
                    state.pending.push_back(CacheUpdate::Children(old_parent));
                }
            }
            patch(world, state, child, |h| {
                h.parent = entity;
                h.prev_sibling = Entity::NULL;
            });
            state.pending.push_back(CacheUpdate::Children(entity));
            is_first = false;
        } else {
            patch(world, state, child, |h| h.parent = entity);
        }
        state.pending.push_back(CacheUpdate::Roots(child));
    }

    state.pending.push_back(CacheUpdate::Roots(entity));
}

/// Unlink the structure encoded by `hierarchy`.
///
/// Children are promoted to the former parent (or become roots) and the
/// predecessor/successor siblings are re-linked around them. The dying
/// entity's own component is not touched.
fn remove_internal(world: &mut WorldContext, state: &mut SceneState, hierarchy: &Hierarchy) {
    let parent = hierarchy.parent;
    let prev = hierarchy.prev_sibling;
    let next = hierarchy.next_sibling;

    let children = child_chain(world, hierarchy);

    if !parent.is_null() {
        if prev.is_null() {
            // The promoted children take over the head of the child
            // list; without children the successor does.
            let head = children.first().copied().unwrap_or(next);
            patch(world, state, parent, |h| h.first_child = head);
        }
        state.pending.push_back(CacheUpdate::Children(parent));
    }

    for &child in &children {
        patch(world, state, child, |h| h.parent = parent);
        state.pending.push_back(CacheUpdate::Roots(child));
    }

    let first = children.first().copied().unwrap_or(Entity::NULL);
    let last = children.last().copied().unwrap_or(Entity::NULL);

    if !prev.is_null() {
        if first.is_null() {
            patch(world, state, prev, |h| h.next_sibling = next);
        } else {
            patch(world, state, first, |h| h.prev_sibling = prev);
            patch(world, state, prev, |h| h.next_sibling = first);
        }
    }
    if !next.is_null() {
        if last.is_null() {
            patch(world, state, next, |h| h.prev_sibling = prev);
        } else {
            patch(world, state, last, |h| h.next_sibling = next);
            patch(world, state, next, |h| h.prev_sibling = last);
        }
    }
}

/// Recompute the children vector of `entity` from its child chain.
fn update_children_map(world: &WorldContext, state: &mut SceneState, entity: Entity) {
    if entity.is_null() {
        error!("children refresh queued for the null entity");
        return;
    }
    let Some(hierarchy) = world.get::<Hierarchy>(entity) else {
        error!(entity = %entity, "children refresh target has no hierarchy component");
        return;
    };
    let children = child_chain(world, hierarchy);
    if children.is_empty() {
        state.children_map.remove(&entity);
    } else {
        state.children_map.insert(entity, children);
    }
}

/// Recompute root membership of `entity`.
fn update_roots(world: &WorldContext, state: &mut SceneState, entity: Entity) {
    if entity.is_null() {
        error!("root refresh queued for the null entity");
        return;
    }
    let Some(hierarchy) = world.get::<Hierarchy>(entity) else {
        error!(entity = %entity, "root refresh target has no hierarchy component");
        return;
    };
    if hierarchy.parent.is_null() {
        state.roots.insert(entity);
    } else {
        state.roots.remove(&entity);
    }
}

fn drain_pending(world: &WorldContext, state: &mut SceneState) {
    while let Some(update) = state.pending.pop_front() {
        match update {
            CacheUpdate::Children(entity) => update_children_map(world, state, entity),
            CacheUpdate::Roots(entity) => update_roots(world, state, entity),
        }
    }
}

/// Rebuild the depth-annotated DFS from roots and children map.
///
/// Roots are visited in entity order so the traversal is deterministic.
fn rebuild_tree(state: &mut SceneState) {
    let mut roots: Vec<Entity> = state.roots.iter().copied().collect();
    roots.sort_unstable();

    state.dfs_tree.clear();
    state.dfs_tree.reserve(state.entities.len());
    for root in roots {
        let mut stack = vec![(root, 0u32)];
        while let Some((current, depth)) = stack.pop() {
            state.dfs_tree.push((current, depth));
            if let Some(children) = state.children_map.get(&current) {
                for &child in children.iter().rev() {
                    stack.push((child, depth + 1));
                }
            }
        }
    }

    if state.dfs_tree.len() != state.entities.len() {
        error!(
            tree = state.dfs_tree.len(),
            entities = state.entities.len(),
            "scene tree inconsistent with entity set"
        );
    }
}

// -- Event observer ---------------------------------------------------------

impl ComponentEvents for SceneManager {
    fn on_component_construct(&self, world: &mut WorldContext, entity: Entity) {
        let Some(hierarchy) = world.get::<Hierarchy>(entity).copied() else {
            error!(entity = %entity, "construct event without a hierarchy component");
            return;
        };
        let mut state = self.state();
        if !validate(world, &state, entity, &hierarchy) {
            error!(entity = %entity, "invalid hierarchy on construct, ignored");
            return;
        }
        add_internal(world, &mut state, entity);
        state.entities.insert(entity);
        state.component_cache.insert(entity, hierarchy);
        drain_pending(world, &mut state);
        rebuild_tree(&mut state);
    }

    fn on_component_update(&self, world: &mut WorldContext, entity: Entity) {
        let Some(hierarchy) = world.get::<Hierarchy>(entity).copied() else {
            error!(entity = %entity, "update event without a hierarchy component");
            return;
        };
        {
            let mut state = self.state();
            if !validate(world, &state, entity, &hierarchy) {
                error!(entity = %entity, "invalid hierarchy on update, ignored");
                return;
            }
            // First sighting (no cached copy) falls straight through to
            // the construct path.
            if let Some(cached) = state.component_cache.get(&entity).copied() {
                remove_internal(world, &mut state, &cached);
                drain_pending(world, &mut state);
            }
        }
        self.on_component_construct(world, entity);
    }

    fn on_component_destroy(&self, world: &mut WorldContext, entity: Entity) {
        let mut state = self.state();
        let Some(cached) = state.component_cache.get(&entity).copied() else {
            return;
        };
        // Destroy fires before the slot is cleared, so the live value
        // is normally still readable; the cache covers the rest.
        let hierarchy = world.get::<Hierarchy>(entity).copied().unwrap_or(cached);
        remove_internal(world, &mut state, &hierarchy);
        drain_pending(world, &mut state);
        state.component_cache.remove(&entity);
        state.roots.remove(&entity);
        state.entities.remove(&entity);
        state.children_map.remove(&entity);
        rebuild_tree(&mut state);
    }
}

// -- Query surface ----------------------------------------------------------

impl Scene for SceneManager {
    fn entity_count(&self) -> usize {
        self.state().entities.len()
    }

    fn contains(&self, entity: Entity) -> bool {
        if entity.is_null() {
            error!("contains query for the null entity");
            return false;
        }
        self.state().entities.contains(&entity)
    }

    fn add_entity(&self, world: &mut WorldContext, entity: Entity) {
        if entity.is_null() {
            error!("cannot add the null entity to the scene");
            return;
        }
        if !world.has::<Hierarchy>(entity) {
            let _ = world.add(entity, Hierarchy::default());
        }
    }

    fn add_entities(&self, world: &mut WorldContext, entities: &[Entity]) {
        if entities.iter().any(|entity| entity.is_null()) {
            error!("cannot add the null entity to the scene");
            return;
        }
        for &entity in entities {
            self.add_entity(world, entity);
        }
    }

    fn remove_entity(&self, world: &mut WorldContext, entity: Entity) {
        if entity.is_null() {
            error!("cannot remove the null entity from the scene");
            return;
        }
        if world.has::<Hierarchy>(entity) {
            let _ = world.remove::<Hierarchy>(entity);
        }
    }

    fn remove_entities(&self, world: &mut WorldContext, entities: &[Entity]) {
        if entities.iter().any(|entity| entity.is_null()) {
            error!("cannot remove the null entity from the scene");
            return;
        }
        for &entity in entities {
            self.remove_entity(world, entity);
        }
    }

    fn hierarchy_path(&self, world: &WorldContext, entity: Entity) -> Vec<Entity> {
        let mut ancestors = Vec::new();
        let mut cursor = entity;
        while let Some(hierarchy) = world.get::<Hierarchy>(cursor) {
            if hierarchy.parent.is_null() {
                break;
            }
            ancestors.push(hierarchy.parent);
            cursor = hierarchy.parent;
        }
        ancestors.reverse();
        ancestors
    }

    fn is_ancestor(&self, world: &WorldContext, entity: Entity, ancestor: Entity) -> bool {
        let mut cursor = entity;
        while let Some(hierarchy) = world.get::<Hierarchy>(cursor) {
            if hierarchy.parent.is_null() {
                break;
            }
            if hierarchy.parent == ancestor {
                return true;
            }
            cursor = hierarchy.parent;
        }
        false
    }

    fn entity_root(&self, world: &WorldContext, entity: Entity) -> Entity {
        let mut cursor = entity;
        while let Some(hierarchy) = world.get::<Hierarchy>(cursor) {
            if hierarchy.parent.is_null() {
                break;
            }
            cursor = hierarchy.parent;
        }
        cursor
    }

    fn root_entities(&self) -> Vec<Entity> {
        self.state().roots.iter().copied().collect()
    }

    fn root_entities_sorted(&self, compare: &dyn Fn(Entity, Entity) -> Ordering) -> Vec<Entity> {
        let mut roots = self.root_entities();
        roots.sort_by(|a, b| compare(*a, *b));
        roots
    }

    fn children(&self, entity: Entity) -> Vec<Entity> {
        self.state()
            .children_map
            .get(&entity)
            .cloned()
            .unwrap_or_default()
    }

    fn depth(&self, world: &WorldContext, entity: Entity) -> usize {
        let mut depth = 0;
        let mut cursor = entity;
        while let Some(hierarchy) = world.get::<Hierarchy>(cursor) {
            if hierarchy.parent.is_null() {
                break;
            }
            depth += 1;
            cursor = hierarchy.parent;
        }
        depth
    }

    fn entity_tree(&self) -> Vec<(Entity, u32)> {
        self.state().dfs_tree.clone()
    }

    fn set_parent(&self, world: &mut WorldContext, entity: Entity, parent: Entity, prev_sibling: Entity) {
        if entity.is_null() || parent.is_null() {
            error!("set_parent requires a live entity and parent");
            return;
        }
        if prev_sibling == entity {
            error!(entity = %entity, "entity cannot be inserted after itself");
            return;
        }
        if !self.contains(parent) {
            self.add_entity(world, parent);
        }
        if !prev_sibling.is_null() && !self.contains(prev_sibling) {
            self.add_entity(world, prev_sibling);
        }

        let mut hierarchy = world.get::<Hierarchy>(entity).copied().unwrap_or_default();
        let next = if prev_sibling.is_null() {
            match world.get::<Hierarchy>(parent) {
                Some(parent_hierarchy) => parent_hierarchy.first_child,
                None => {
                    error!(parent = %parent, "set_parent target parent has no hierarchy");
                    return;
                }
            }
        } else {
            match world.get::<Hierarchy>(prev_sibling) {
                Some(prev_hierarchy) => prev_hierarchy.next_sibling,
                None => {
                    error!(sibling = %prev_sibling, "set_parent prev sibling has no hierarchy");
                    return;
                }
            }
        };
        if next == entity {
            // Already at the requested position.
            return;
        }

        hierarchy.parent = parent;
        hierarchy.prev_sibling = prev_sibling;
        hierarchy.next_sibling = next;
        let _ = world.add_or_replace(entity, hierarchy);
    }

    fn patch_entity_hierarchy(&self, entity: Entity, patch: &mut dyn FnMut(Entity)) {
        let order = {
            let state = self.state();
            let mut order = Vec::new();
            let mut stack = vec![entity];
            while let Some(current) = stack.pop() {
                order.push(current);
                if let Some(children) = state.children_map.get(&current) {
                    for &child in children.iter().rev() {
                        stack.push(child);
                    }
                }
            }
            order
        };
        for target in order {
            patch(target);
        }
    }
}
