//! Entity handles and slot allocation.
//!
//! An [`Entity`] is a `u32` split into a 20-bit slot index and a 12-bit
//! generation. Destroying an entity bumps its slot's generation, so a
//! stale handle to a recycled slot no longer validates.

use std::fmt;

use serde::{Deserialize, Serialize};

const INDEX_BITS: u32 = 20;
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;
const GENERATION_MASK: u32 = (1 << (32 - INDEX_BITS)) - 1;

/// An opaque entity handle.
///
/// Entities carry no data of their own; components attached through the
/// world give them meaning. Handles are only created by the world's
/// allocator. [`Entity::NULL`] is the one reserved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(u32);

impl Entity {
    /// The reserved null handle. Never refers to a live entity.
    pub const NULL: Entity = Entity(u32::MAX);

    /// Rebuild a handle from its raw bits. Intended for tooling and
    /// tests; live handles come from the world.
    #[must_use]
    pub const fn from_raw(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw bits of the handle.
    #[must_use]
    pub const fn to_raw(self) -> u32 {
        self.0
    }

    /// The slot index part of the handle.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 & INDEX_MASK
    }

    /// The generation part of the handle.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.0 >> INDEX_BITS
    }

    /// Returns `true` unless this is [`Entity::NULL`].
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
    }

    pub(crate) const fn compose(index: u32, generation: u32) -> Self {
        Self(((generation & GENERATION_MASK) << INDEX_BITS) | (index & INDEX_MASK))
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Entity(null)")
        } else {
            write!(f, "Entity({}:{})", self.index(), self.generation())
        }
    }
}

/// Slot allocator with free-list recycling.
///
/// Lives inside the world; entities are created and destroyed only
/// through the store so that lifecycle events always fire.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free: Vec<u32>,
}

impl EntityAllocator {
    /// Create an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh handle, recycling a destroyed slot when one is
    /// available.
    pub fn allocate(&mut self) -> Entity {
        if let Some(index) = self.free.pop() {
            self.alive[index as usize] = true;
            return Entity::compose(index, self.generations[index as usize]);
        }
        let index = self.generations.len() as u32;
        debug_assert!(index < INDEX_MASK, "entity slot space exhausted");
        self.generations.push(0);
        self.alive.push(true);
        Entity::compose(index, 0)
    }

    /// Release a handle, bumping the slot generation so stale handles
    /// stop validating. Returns `false` for handles that are not alive.
    pub fn deallocate(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let index = entity.index() as usize;
        self.generations[index] = (self.generations[index] + 1) & GENERATION_MASK;
        self.alive[index] = false;
        self.free.push(entity.index());
        true
    }

    /// Returns `true` if `entity` refers to a live slot of the matching
    /// generation.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        if entity.is_null() {
            return false;
        }
        let index = entity.index() as usize;
        index < self.generations.len()
            && self.alive[index]
            && self.generations[index] == entity.generation()
    }

    /// Number of live entities.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.generations.len() - self.free.len()
    }

    /// All live handles, in slot order.
    #[must_use]
    pub fn live_entities(&self) -> Vec<Entity> {
        self.generations
            .iter()
            .enumerate()
            .filter(|&(index, _)| self.alive[index])
            .map(|(index, &generation)| Entity::compose(index as u32, generation))
            .collect()
    }

    /// Release every live handle.
    pub fn clear(&mut self) {
        for entity in self.live_entities() {
            self.deallocate(entity);
        }
    }
}
