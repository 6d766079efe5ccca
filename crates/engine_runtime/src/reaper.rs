//! End-of-frame entity destruction.
//!
//! Gameplay marks entities with `DeadTag` instead of destroying them
//! mid-frame; the reaper runs at [`TickOrder::Last`] and destroys every
//! marked entity after all other systems have ticked.

use tracing::debug;

use engine_world::{DeadTag, Entity, WorldContext};

use crate::tick::{TickEvents, TickOrder};

/// Destroys `DeadTag` entities at the end of each frame.
#[derive(Debug, Default)]
pub struct EntityReaper;

impl TickEvents for EntityReaper {
    fn on_tick(&self, world: &mut WorldContext, _dt: f32) {
        let dead: Vec<Entity> = world.view::<DeadTag>().map(|(entity, _)| entity).collect();
        if dead.is_empty() {
            return;
        }
        debug!(count = dead.len(), "reaping dead entities");
        for entity in dead {
            let _ = world.destroy_entity(entity);
        }
    }

    fn tick_order(&self) -> u32 {
        TickOrder::Last.order()
    }
}
