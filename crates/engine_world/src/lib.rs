//! # engine_world
//!
//! The entity store: opaque generation-tagged entity handles, one
//! sparse-set storage per component type, lazy views, and mutation
//! events delivered over [`engine_bus`] buses.
//!
//! - [`Entity`] — 32-bit handle, slot index + generation.
//! - [`Component`] — the contract all stored data satisfies.
//! - [`WorldContext`] — entity lifecycle, typed component surface,
//!   views, and construct/update/destroy notifications for component
//!   types opted in via [`WorldContext::setup_component_events`].
//!
//! The store is not internally locked; it follows the engine's
//! main-thread-only contract. The event buses it owns are shareable
//! handles, so observers can be attached from anywhere.

pub mod component;
pub mod entity;
pub mod events;
pub mod name;
pub mod storage;
pub mod tag;
pub mod world;

pub use component::{Component, ComponentSet};
pub use entity::{Entity, EntityAllocator};
pub use events::{
    ComponentEventBus, ComponentEvents, EntityEventBus, EntityEvents, component_event_bus,
    entity_event_bus,
};
pub use name::Name;
pub use tag::{ActiveTag, DeadTag, Renaming, SelectTag};
pub use world::{WorldContext, WorldError};
