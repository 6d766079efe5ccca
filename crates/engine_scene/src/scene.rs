//! The scene query surface.

use std::cmp::Ordering;

use engine_world::{Entity, WorldContext};

/// Queries and mutations over the scene tree.
///
/// The implementation does not own the world: queries that walk
/// components borrow it immutably, mutators borrow it mutably. Cached
/// queries (`root_entities`, `children`, `entity_tree`) answer from the
/// observer-maintained caches and need no world at all.
///
/// Resolvable via `ServiceRegistry::get::<dyn Scene>()` once the scene
/// manager is installed.
pub trait Scene: Send + Sync {
    /// Number of entities in the scene.
    fn entity_count(&self) -> usize;

    /// Returns `true` if `entity` is part of the scene.
    fn contains(&self, entity: Entity) -> bool;

    /// Add an entity to the scene by attaching a default `Hierarchy`.
    fn add_entity(&self, world: &mut WorldContext, entity: Entity);

    /// Add several entities to the scene.
    fn add_entities(&self, world: &mut WorldContext, entities: &[Entity]);

    /// Remove an entity from the scene by detaching its `Hierarchy`.
    fn remove_entity(&self, world: &mut WorldContext, entity: Entity);

    /// Remove several entities from the scene.
    fn remove_entities(&self, world: &mut WorldContext, entities: &[Entity]);

    /// Ancestors of `entity` from the root down to its parent,
    /// exclusive of `entity` itself.
    fn hierarchy_path(&self, world: &WorldContext, entity: Entity) -> Vec<Entity>;

    /// Returns `true` if `ancestor` is a strict ancestor of `entity`.
    fn is_ancestor(&self, world: &WorldContext, entity: Entity, ancestor: Entity) -> bool;

    /// The topmost ancestor of `entity` (`entity` itself for roots).
    fn entity_root(&self, world: &WorldContext, entity: Entity) -> Entity;

    /// The scene roots, in no particular order.
    fn root_entities(&self) -> Vec<Entity>;

    /// The scene roots, sorted with `compare`.
    fn root_entities_sorted(&self, compare: &dyn Fn(Entity, Entity) -> Ordering) -> Vec<Entity>;

    /// First-level children of `entity`, in sibling order.
    fn children(&self, entity: Entity) -> Vec<Entity>;

    /// Distance from `entity` to its root.
    fn depth(&self, world: &WorldContext, entity: Entity) -> usize;

    /// Pre-order DFS of the whole scene with per-entity depths.
    fn entity_tree(&self) -> Vec<(Entity, u32)>;

    /// Re-parent `entity` under `parent`, inserted after
    /// `prev_sibling` ([`Entity::NULL`] inserts at the front).
    ///
    /// Missing `Hierarchy` components on `parent` or `prev_sibling` are
    /// added automatically; the new next-sibling is derived from the
    /// insertion point.
    fn set_parent(&self, world: &mut WorldContext, entity: Entity, parent: Entity, prev_sibling: Entity);

    /// Apply `patch` to `entity` and every descendant, in pre-order.
    ///
    /// The traversal order is captured before `patch` first runs, so
    /// the callback may freely mutate the world or the scene.
    fn patch_entity_hierarchy(&self, entity: Entity, patch: &mut dyn FnMut(Entity));
}
